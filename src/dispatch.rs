//! Dispatcher: classify one normalised line, run exactly one handler, and
//! render its [`Outcome`] through the sink.
//!
//! Handlers never fail: every adapter error is turned into a sentence here.

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::console::Sink;
use crate::intent::{self, Intent};
use crate::reminders::ReminderStore;
use crate::services::spotify::PlaybackAction;
use crate::services::wiki::Article;
use crate::services::{Outcome, ServiceError, Services};

/// Whether the session keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub const HELP_TEXT: &str = "\
Here are the commands I can understand:
- time: Get the current time.
- date: Get the current date.
- search [query]: Search the web.
- open [website URL]: Open a website.
- news about [topic]: Get news headlines about a topic.
- wikipedia [query]: Search and provide information from Wikipedia.
- joke: Tell a joke.
- play spotify [song/artist]: Play a song or artist on Spotify.
- pause spotify: Pause the current song on Spotify.
- next spotify: Play the next song on Spotify.
- previous spotify: Play the previous song on Spotify.
- download [YouTube URL or query]: Download a YouTube video.
- remind me to [task] at [time]: Set a reminder.
- clear: Clear the console screen.
- help: Display this help message.
- exit: Exit the assistant.";

pub struct Dispatcher {
    user_name: String,
    services: Services,
    reminders: ReminderStore,
    sink: Sink,
}

impl Dispatcher {
    pub fn new(user_name: impl Into<String>, services: Services, sink: Sink) -> Self {
        Self {
            user_name: user_name.into(),
            services,
            reminders: ReminderStore::new(),
            sink,
        }
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn reminders(&self) -> &ReminderStore {
        &self.reminders
    }

    /// Handle one already-normalised line.
    pub async fn handle(&mut self, line: &str) -> Flow {
        let intent = intent::classify(line);
        info!(intent = intent.name(), "dispatching");
        match intent {
            Intent::Time => self.sink.say(&time_message(Local::now())),
            Intent::Date => self.sink.say(&date_message(Local::now())),
            Intent::Search(q) => self.search(&q).await,
            Intent::Open(target) => self.open(&target),
            Intent::News(topic) => self.news(&topic).await,
            Intent::NewsTopicMissing => self.sink.say("Please specify a topic for the news."),
            Intent::Encyclopedia(q) => self.encyclopedia(&q).await,
            Intent::Joke => self.joke().await,
            Intent::SpotifyPlay(q) => self.play(&q).await,
            Intent::SpotifyPause => self.playback(PlaybackAction::Pause).await,
            Intent::SpotifyNext => self.playback(PlaybackAction::Next).await,
            Intent::SpotifyPrevious => self.playback(PlaybackAction::Previous).await,
            Intent::Download(q) => self.download(&q).await,
            Intent::Remind { task, time } => {
                self.sink.say(&format!("Reminder set for {time}: {task}"));
                self.reminders.add(task, time);
                debug!(count = self.reminders.len(), "reminder stored");
            }
            Intent::ReminderFormatHint => self.sink.say(
                "I'm sorry, I didn't understand the reminder. \
                 Please use the format 'remind me to [task] at [time]'.",
            ),
            Intent::Clear => self.sink.clear(),
            Intent::Help => self.sink.say(HELP_TEXT),
            Intent::Exit => {
                self.sink.say(&format!("Goodbye {}, have a great day!", self.user_name));
                return Flow::Exit;
            }
            Intent::Unrecognized => self.sink.say("I'm sorry, I didn't understand that."),
        }
        Flow::Continue
    }

    async fn search(&self, query: &str) {
        let text = match self.services.search.first_result(query).await {
            Outcome::Found(hit) => format!("Here is what I found: {}", hit.url),
            Outcome::NotFound => format!("I couldn't find anything for '{query}'."),
            Outcome::Failed(e) => failed("search", format!("Error searching the web: {e}"), &e),
        };
        self.sink.say(&text);
    }

    fn open(&self, target: &str) {
        let text = match self.services.browser.open(target) {
            Outcome::Found(resolved) => format!("Opening {resolved}"),
            Outcome::NotFound => "Please tell me what to open.".to_string(),
            Outcome::Failed(e) => failed("open", format!("Could not open '{target}': {e}"), &e),
        };
        self.sink.say(&text);
    }

    async fn news(&self, topic: &str) {
        match self.services.news.headlines(topic).await {
            Outcome::Found(articles) => {
                for a in articles {
                    self.sink.say(&format!("Title: {}", a.title));
                    self.sink.say(&format!(
                        "Description: {}",
                        a.description.as_deref().unwrap_or("No description available.")
                    ));
                    self.sink.say("...");
                }
            }
            Outcome::NotFound => self.sink.say(&format!("No news articles found for '{topic}'.")),
            Outcome::Failed(e) => self.sink.say(&failed(
                "news",
                format!("An error occurred while fetching news: {e}"),
                &e,
            )),
        }
    }

    async fn encyclopedia(&self, query: &str) {
        let text = match self.services.wiki.lookup(query).await {
            Outcome::Found(Article::Summary { title, text }) => format!("{title}: {text}"),
            Outcome::Found(Article::Ambiguous { options }) => format!(
                "Your query is too ambiguous. Did you mean: {}?",
                options.join(", ")
            ),
            Outcome::Found(Article::MissingPage) => {
                format!("No page found for '{query}'. Please try another query.")
            }
            Outcome::NotFound => format!("No results found for '{query}' on Wikipedia."),
            Outcome::Failed(e) => failed("encyclopedia", format!("An error occurred: {e}"), &e),
        };
        self.sink.say(&text);
    }

    async fn joke(&self) {
        let text = match self.services.jokes.tell().await {
            Outcome::Found(joke) => joke,
            Outcome::NotFound => "I couldn't think of a joke right now: no joke available".into(),
            Outcome::Failed(e) => {
                failed("jokes", format!("I couldn't think of a joke right now: {e}"), &e)
            }
        };
        self.sink.say(&text);
    }

    async fn play(&mut self, query: &str) {
        let text = match self.services.spotify.play(query).await {
            Outcome::Found(t) => format!("Playing {} by {}", t.name, t.artist),
            Outcome::NotFound => format!("Could not find '{query}' on Spotify."),
            Outcome::Failed(e) => failed("spotify", format!("Error playing track: {e}"), &e),
        };
        self.sink.say(&text);
    }

    async fn playback(&mut self, action: PlaybackAction) {
        let (done, error_prefix) = match action {
            PlaybackAction::Pause => ("Paused Spotify playback.", "Error pausing playback"),
            PlaybackAction::Next => ("Playing next track on Spotify.", "Error playing next track"),
            PlaybackAction::Previous => {
                ("Playing previous track on Spotify.", "Error playing previous track")
            }
        };
        let text = match self.services.spotify.control(action).await {
            Outcome::Found(()) => done.to_string(),
            Outcome::NotFound => format!("{error_prefix}: no active playback device"),
            Outcome::Failed(e) => failed("spotify", format!("{error_prefix}: {e}"), &e),
        };
        self.sink.say(&text);
    }

    async fn download(&self, query: &str) {
        let text = match self.services.video.download(query).await {
            Outcome::Found(v) => format!("Downloaded video: {}", v.title),
            Outcome::NotFound => "Failed to download video. Error: no video found".to_string(),
            Outcome::Failed(e) => {
                failed("download", format!("Failed to download video. Error: {e}"), &e)
            }
        };
        self.sink.say(&text);
    }
}

fn failed(service: &str, message: String, err: &ServiceError) -> String {
    warn!(service, error = %err, "service call failed");
    message
}

fn time_message(now: DateTime<Local>) -> String {
    format!("The current time is {}", now.format("%H:%M:%S"))
}

fn date_message(now: DateTime<Local>) -> String {
    format!("The current date is {}", now.format("%d/%m/%Y"))
}
