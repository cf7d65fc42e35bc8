//! Viewer integration tests
//!
//! Entry cycling and cancellation as seen from the display.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use ticker_core::{DisplayOp, Feed, RecordingDisplay, StaticFeedSource, Viewer, ViewerSettings};

const URL: &str = "http://news.example/rss";

fn settings(width: usize) -> ViewerSettings {
    ViewerSettings {
        width,
        dwell: Duration::from_millis(100),
        scroll_interval: Duration::from_millis(10),
    }
}

/// Second row of every write, with consecutive repeats collapsed
fn shown_titles(display: &RecordingDisplay) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for frame in display.writes() {
        let title = frame
            .split('\n')
            .nth(1)
            .unwrap_or_default()
            .trim_end()
            .to_string();
        if titles.last() != Some(&title) {
            titles.push(title);
        }
    }
    titles
}

#[tokio::test(start_paused = true)]
async fn test_wraps_to_first_entry_after_last() {
    let source = StaticFeedSource::new().with_titles(URL, ["e1", "e2", "e3", "e4", "e5"]);
    let display = Arc::new(RecordingDisplay::new());
    let mut viewer = Viewer::new(display.clone(), Arc::new(source), settings(16)).unwrap();

    viewer.start(Feed::new("News", URL)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(650)).await;
    viewer.stop().await;

    let titles = shown_titles(&display);
    assert_eq!(titles[..6], ["e1", "e2", "e3", "e4", "e5", "e1"]);
}

#[tokio::test(start_paused = true)]
async fn test_each_entry_dwells_for_configured_time() {
    let source = StaticFeedSource::new().with_titles(URL, ["first", "second"]);
    let display = Arc::new(RecordingDisplay::new());
    let mut viewer = Viewer::new(display.clone(), Arc::new(source), settings(16)).unwrap();

    viewer.start(Feed::new("News", URL)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(95)).await;
    assert_eq!(shown_titles(&display), vec!["first"]);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(shown_titles(&display), vec!["first", "second"]);
    viewer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_long_title_scrolls_within_entry() {
    let source =
        StaticFeedSource::new().with_titles(URL, ["A headline far wider than the panel"]);
    let display = Arc::new(RecordingDisplay::new());
    let mut viewer = Viewer::new(display.clone(), Arc::new(source), settings(8)).unwrap();

    viewer.start(Feed::new("News", URL)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(35)).await;
    viewer.stop().await;

    let writes = display.writes();
    assert!(writes.len() >= 3);
    assert_eq!(writes[0], "News    \nA headli");
    assert_eq!(writes[1], "News    \n headlin");
    assert_eq!(writes[2], "News    \nheadline");
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_running_feed() {
    let source = StaticFeedSource::new()
        .with_titles(URL, ["old"])
        .with_titles("http://other.example/rss", ["new"]);
    let display = Arc::new(RecordingDisplay::new());
    let mut viewer = Viewer::new(display.clone(), Arc::new(source), settings(16)).unwrap();

    viewer.start(Feed::new("News", URL)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    viewer
        .start(Feed::new("Other", "http://other.example/rss"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(viewer.current_feed().map(Feed::name), Some("Other"));
    viewer.stop().await;

    // after the second clear only the new feed is drawn
    let ops = display.ops();
    let last_clear = ops.iter().rposition(|op| *op == DisplayOp::Clear).unwrap();
    assert!(ops[last_clear + 1..].iter().all(|op| match op {
        DisplayOp::Write(frame) => frame.starts_with("Other"),
        _ => false,
    }));
}
