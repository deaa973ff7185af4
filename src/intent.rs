//! Intent classification: the ordered keyword rule table.
//!
//! A line is lowercased and trimmed ([`normalize`]), then tested against
//! [`RULES`] top to bottom. The first rule whose predicate holds builds the
//! [`Intent`]; nothing after it is consulted. Lines matching no rule are
//! [`Intent::Unrecognized`].
//!
//! Matching is plain substring containment, so order decides conflicts:
//! `"play some news about spotify"` is a news request because the news rule
//! sits above the streaming rules. Do not reorder the table.
//!
//! Argument extraction comes in two flavours:
//! - keyword stripping: every occurrence of the keyword is removed, then the
//!   remainder is trimmed once (inner whitespace is left alone);
//! - regex capture: the rule fails closed into a guidance intent when the
//!   pattern does not match, and no service is called.

use std::sync::LazyLock;

use regex::Regex;

static NEWS_TOPIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)news about (.+)").expect("news regex is valid"));
static WIKI_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(wikipedia|about|tell me about)\b").expect("wiki regex is valid")
});
static REMINDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"remind me to (.+) at (.+)").expect("reminder regex is valid"));

/// What a line asks for, with its extracted argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Time,
    Date,
    Search(String),
    Open(String),
    News(String),
    NewsTopicMissing,
    Encyclopedia(String),
    Joke,
    SpotifyPlay(String),
    SpotifyPause,
    SpotifyNext,
    SpotifyPrevious,
    Download(String),
    Remind { task: String, time: String },
    ReminderFormatHint,
    Clear,
    Help,
    Exit,
    Unrecognized,
}

impl Intent {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Time => "time",
            Intent::Date => "date",
            Intent::Search(_) => "search",
            Intent::Open(_) => "open",
            Intent::News(_) => "news",
            Intent::NewsTopicMissing => "news_topic_missing",
            Intent::Encyclopedia(_) => "encyclopedia",
            Intent::Joke => "joke",
            Intent::SpotifyPlay(_) => "spotify_play",
            Intent::SpotifyPause => "spotify_pause",
            Intent::SpotifyNext => "spotify_next",
            Intent::SpotifyPrevious => "spotify_previous",
            Intent::Download(_) => "download",
            Intent::Remind { .. } => "remind",
            Intent::ReminderFormatHint => "reminder_format_hint",
            Intent::Clear => "clear",
            Intent::Help => "help",
            Intent::Exit => "exit",
            Intent::Unrecognized => "unrecognized",
        }
    }
}

/// Rule predicate over a normalised line.
#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    Contains(&'static str),
    /// At least one keyword present.
    Any(&'static [&'static str]),
    /// Every keyword present.
    All(&'static [&'static str]),
}

impl Predicate {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Predicate::Contains(k) => line.contains(k),
            Predicate::Any(ks) => ks.iter().any(|k| line.contains(k)),
            Predicate::All(ks) => ks.iter().all(|k| line.contains(k)),
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub when: Predicate,
    extract: fn(&str) -> Intent,
}

impl Rule {
    pub fn extract(&self, line: &str) -> Intent {
        (self.extract)(line)
    }
}

/// The rule table, in precedence order.
pub static RULES: [Rule; 16] = [
    Rule {
        name: "time",
        when: Predicate::Contains("time"),
        extract: time,
    },
    Rule {
        name: "date",
        when: Predicate::Contains("date"),
        extract: date,
    },
    Rule {
        name: "search",
        when: Predicate::Contains("search"),
        extract: search,
    },
    Rule {
        name: "open",
        when: Predicate::Contains("open"),
        extract: open,
    },
    Rule {
        name: "news",
        when: Predicate::Contains("news"),
        extract: news,
    },
    Rule {
        name: "encyclopedia",
        when: Predicate::Any(&["wikipedia", "about", "tell me about"]),
        extract: encyclopedia,
    },
    Rule {
        name: "joke",
        when: Predicate::Contains("joke"),
        extract: joke,
    },
    Rule {
        name: "spotify_play",
        when: Predicate::All(&["play", "spotify"]),
        extract: spotify_play,
    },
    Rule {
        name: "spotify_pause",
        when: Predicate::All(&["pause", "spotify"]),
        extract: spotify_pause,
    },
    Rule {
        name: "spotify_next",
        when: Predicate::All(&["next", "spotify"]),
        extract: spotify_next,
    },
    Rule {
        name: "spotify_previous",
        when: Predicate::All(&["previous", "spotify"]),
        extract: spotify_previous,
    },
    Rule {
        name: "download",
        when: Predicate::Contains("download"),
        extract: download,
    },
    Rule {
        name: "reminder",
        when: Predicate::Any(&["reminder", "remind me"]),
        extract: reminder,
    },
    Rule {
        name: "clear",
        when: Predicate::Contains("clear"),
        extract: clear,
    },
    Rule {
        name: "help",
        when: Predicate::Contains("help"),
        extract: help,
    },
    Rule {
        name: "exit",
        when: Predicate::Contains("exit"),
        extract: exit,
    },
];

/// Lowercase and trim a raw input line.
pub fn normalize(line: &str) -> String {
    line.to_lowercase().trim().to_string()
}

/// First rule whose predicate holds for `line`.
pub fn matching_rule(line: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.when.matches(line))
}

/// Classify an already-normalised line.
pub fn classify(line: &str) -> Intent {
    matching_rule(line)
        .map(|rule| rule.extract(line))
        .unwrap_or(Intent::Unrecognized)
}

fn strip(line: &str, keywords: &[&str]) -> String {
    keywords
        .iter()
        .fold(line.to_string(), |acc, k| acc.replace(k, ""))
        .trim()
        .to_string()
}

// ── extractors ────────────────────────────────────────────────────────────────

fn time(_: &str) -> Intent {
    Intent::Time
}

fn date(_: &str) -> Intent {
    Intent::Date
}

fn search(line: &str) -> Intent {
    Intent::Search(strip(line, &["search"]))
}

fn open(line: &str) -> Intent {
    Intent::Open(strip(line, &["open"]))
}

fn news(line: &str) -> Intent {
    match NEWS_TOPIC.captures(line).and_then(|c| c.get(1)) {
        Some(topic) => Intent::News(topic.as_str().trim().to_string()),
        None => Intent::NewsTopicMissing,
    }
}

fn encyclopedia(line: &str) -> Intent {
    Intent::Encyclopedia(WIKI_KEYWORDS.replace_all(line, "").trim().to_string())
}

fn joke(_: &str) -> Intent {
    Intent::Joke
}

fn spotify_play(line: &str) -> Intent {
    Intent::SpotifyPlay(strip(line, &["play", "spotify"]))
}

fn spotify_pause(_: &str) -> Intent {
    Intent::SpotifyPause
}

fn spotify_next(_: &str) -> Intent {
    Intent::SpotifyNext
}

fn spotify_previous(_: &str) -> Intent {
    Intent::SpotifyPrevious
}

fn download(line: &str) -> Intent {
    Intent::Download(strip(line, &["download"]))
}

fn reminder(line: &str) -> Intent {
    match REMINDER.captures(line) {
        Some(c) => Intent::Remind {
            task: c[1].trim().to_string(),
            time: c[2].trim().to_string(),
        },
        None => Intent::ReminderFormatHint,
    }
}

fn clear(_: &str) -> Intent {
    Intent::Clear
}

fn help(_: &str) -> Intent {
    Intent::Help
}

fn exit(_: &str) -> Intent {
    Intent::Exit
}
