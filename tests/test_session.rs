//! End-to-end sessions over an in-memory reader with dummy providers.

use deskmate::config::Config;
use deskmate::console::{Sink, Transcript};
use deskmate::dispatch::Dispatcher;
use deskmate::services::{DummyMode, Services};
use deskmate::session::{Session, SessionEnd};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn run_session(input: &str, mode: DummyMode) -> (SessionEnd, Transcript, usize) {
    let (sink, transcript) = Sink::capture("Jarvis");
    let dispatcher = Dispatcher::new("Ada", Services::dummy(mode), sink);
    let mut session = Session::new("Ada", "Jarvis", dispatcher);
    let end = session.run(input.as_bytes(), CancellationToken::new()).await;
    let reminders = session.dispatcher().reminders().len();
    (end, transcript, reminders)
}

#[tokio::test]
async fn test_full_conversation() {
    let input = "\
good morning
Hey Jarvis
search rust language
tell me the news about elections
remind me to call mom at 5pm
play some news about spotify
exit
joke
";
    let (end, t, reminders) = run_session(input, DummyMode::Echo).await;
    assert_eq!(end, SessionEnd::ExitRequested);
    assert_eq!(reminders, 1);

    let lines = t.lines();
    assert_eq!(
        lines[0],
        "Jarvis: Hello Ada, I am Jarvis, your personal assistant. How can I help you today?"
    );
    assert_eq!(lines[1], "Jarvis: Yes Ada?");
    assert_eq!(
        lines[2],
        "Jarvis: Here is what I found: https://example.com/search?q=rust+language"
    );
    assert_eq!(lines[3], "Jarvis: Title: Dummy headline about elections");
    assert_eq!(lines[4], "Jarvis: Description: No description available.");
    assert_eq!(lines[5], "Jarvis: ...");
    assert_eq!(lines[6], "Jarvis: Reminder set for 5pm: call mom");
    assert_eq!(lines[7], "Jarvis: Title: Dummy headline about spotify");
    assert_eq!(lines.last().map(String::as_str), Some("Jarvis: Goodbye Ada, have a great day!"));
    assert!(!lines.iter().any(|l| l.contains("dummy cross the road")));
}

#[tokio::test]
async fn test_failures_are_reported_not_fatal() {
    let input = "jarvis\nsearch rust\nwikipedia rust\nnews about rust\npause spotify\nhelp\n";
    let (end, t, _) = run_session(input, DummyMode::Fail("network down".into())).await;
    assert_eq!(end, SessionEnd::EndOfInput);

    let lines = t.lines();
    assert!(lines[2].starts_with("Jarvis: Error searching the web: "));
    assert!(lines[3].starts_with("Jarvis: An error occurred: "));
    assert!(lines[4].starts_with("Jarvis: An error occurred while fetching news: "));
    assert!(lines[5].starts_with("Jarvis: Error pausing playback: "));
    assert!(lines[6].starts_with("Jarvis: Here are the commands I can understand:"));
}

#[tokio::test]
async fn test_empty_results_differ_from_errors() {
    let input = "jarvis\nsearch rust\nwikipedia rust\n";
    let (_, t, _) = run_session(input, DummyMode::Empty).await;
    let lines = t.lines();
    assert_eq!(lines[2], "Jarvis: I couldn't find anything for 'rust'.");
    assert_eq!(lines[3], "Jarvis: No results found for 'rust' on Wikipedia.");
}

#[tokio::test]
async fn test_uppercase_wake_word_is_normalised() {
    let (_, t, _) = run_session("JARVIS\n", DummyMode::Echo).await;
    assert_eq!(t.lines()[1], "Jarvis: Yes Ada?");
}

#[tokio::test]
async fn test_offline_config_builds_dummy_services() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::offline("Ada", "Jarvis", dir.path()).unwrap();
    let services = Services::build(&cfg).unwrap();
    let (sink, t) = Sink::capture(cfg.assistant_name.clone());
    let dispatcher = Dispatcher::new(cfg.user_name.clone(), services, sink);
    let mut session = Session::new(&cfg.user_name, &cfg.assistant_name, dispatcher);
    let end = session
        .run(&b"jarvis\ntell me a joke\nexit\n"[..], CancellationToken::new())
        .await;
    assert_eq!(end, SessionEnd::ExitRequested);
    assert_eq!(t.lines()[2], "Jarvis: Why did the dummy cross the road? To test the other side.");
}

#[tokio::test]
async fn test_blank_lines_after_wake_are_unrecognized() {
    let (end, t, _) = run_session("jarvis\n\n   \n", DummyMode::Echo).await;
    assert_eq!(end, SessionEnd::EndOfInput);
    let lines = t.lines();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[2], "Jarvis: I'm sorry, I didn't understand that.");
    assert_eq!(lines[3], "Jarvis: I'm sorry, I didn't understand that.");
}

#[tokio::test]
async fn test_shutdown_interrupts_slow_service_call() {
    // Accepts connections into the backlog but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::offline("Ada", "Jarvis", dir.path()).unwrap();
    cfg.news.provider = "newsapi".into();
    cfg.news.api_base_url = format!("http://127.0.0.1:{port}/v2/top-headlines");
    cfg.news.api_key = Some("test-key".into());
    cfg.news.timeout_seconds = 60;

    let (sink, t) = Sink::capture("Jarvis");
    let dispatcher = Dispatcher::new("Ada", Services::build(&cfg).unwrap(), sink);
    let mut session = Session::new("Ada", "Jarvis", dispatcher);

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let end = tokio::time::timeout(
        Duration::from_secs(10),
        session.run(&b"jarvis\nnews about rust\nexit\n"[..], shutdown),
    )
    .await
    .expect("session should stop soon after shutdown");

    assert_eq!(end, SessionEnd::Interrupted);
    assert_eq!(t.lines().len(), 2);
    drop(listener);
}
