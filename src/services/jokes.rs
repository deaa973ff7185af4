//! Joke adapter: one joke per call, no state kept between calls.

use rand_core::{OsRng, RngCore};
use reqwest::Client;
use serde::Deserialize;

use crate::config::JokesConfig;

use super::{DummyMode, Outcome, ServiceError, build_http_client, check_status, unknown_provider};

const BUILTIN: &[&str] = &[
    "There are only 10 kinds of people in this world: those who know binary and those who don't.",
    "A programmer's partner says: \"Go to the store, get a loaf of bread, and if they have eggs, get a dozen.\" The programmer comes home with twelve loaves.",
    "Why do programmers confuse Halloween and Christmas? Because OCT 31 == DEC 25.",
    "I would tell you a UDP joke, but you might not get it.",
    "Debugging: being the detective in a crime movie where you are also the murderer.",
    "There are two hard things in computer science: cache invalidation, naming things, and off-by-one errors.",
    "The best thing about a boolean is that even if you are wrong, you are only off by a bit.",
    "A SQL query walks into a bar, goes up to two tables and asks: \"Can I join you?\"",
    "How many programmers does it take to change a light bulb? None, that's a hardware problem.",
    "To understand recursion, you must first understand recursion.",
    "Knock knock. Race condition. Who's there?",
    "My code doesn't have bugs. It just develops random unexpected features.",
    "Why did the developer go broke? Because they used up all their cache.",
    "It works on my machine. Then we'll ship your machine.",
    "The borrow checker and I have an understanding: it's always right.",
];

pub enum Jokes {
    Builtin,
    JokeApi { client: Client, endpoint: String },
    Dummy(DummyMode),
}

impl Jokes {
    pub fn build(config: &JokesConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "builtin" => Ok(Jokes::Builtin),
            "jokeapi" => Ok(Jokes::JokeApi {
                client: build_http_client(config.timeout_seconds).map_err(|e| e.to_string())?,
                endpoint: config.api_base_url.clone(),
            }),
            "dummy" => Ok(Jokes::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("jokes", other)),
        }
    }

    pub async fn tell(&self) -> Outcome<String> {
        match self {
            Jokes::Builtin => Outcome::Found(pick_builtin(OsRng.next_u32())),
            Jokes::JokeApi { client, endpoint } => fetch_joke(client, endpoint).await.into(),
            Jokes::Dummy(mode) => mode.outcome(|| {
                "Why did the dummy cross the road? To test the other side.".to_string()
            }),
        }
    }
}

fn pick_builtin(roll: u32) -> String {
    BUILTIN[roll as usize % BUILTIN.len()].to_string()
}

#[derive(Debug, Deserialize)]
struct JokeApiResponse {
    #[serde(default)]
    error: bool,
    joke: Option<String>,
    message: Option<String>,
}

async fn fetch_joke(client: &Client, endpoint: &str) -> Result<Option<String>, ServiceError> {
    let res = client
        .get(endpoint)
        .query(&[("type", "single"), ("safe-mode", "")])
        .send()
        .await?;
    let body: JokeApiResponse = check_status(res).await?.json().await?;
    if body.error {
        return Err(ServiceError::Decode(
            body.message.unwrap_or_else(|| "joke service reported an error".into()),
        ));
    }
    Ok(body.joke.filter(|j| !j.trim().is_empty()))
}
