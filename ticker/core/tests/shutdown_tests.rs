//! Shutdown sequence integration tests
//!
//! The display, button source and shutdown action all append to one shared
//! journal so the relative order of the teardown steps can be checked. Both
//! exits are covered: the shutdown button (notice, delay, action) and an
//! interrupt (blank the panel, no action).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use ticker_core::{
    ButtonPresser, ButtonSource, ChannelButtons, Control, Controller, Display, DisplayError, Feed,
    FeedList, ShutdownAction, ShutdownPhase, ShutdownRendezvous, ShutdownSequence,
    StaticFeedSource, SwitchListener, Viewer, ViewerSettings,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct JournalDisplay {
    journal: Journal,
}

impl JournalDisplay {
    fn log(&self, entry: impl Into<String>) -> Result<(), DisplayError> {
        self.journal.lock().push(entry.into());
        Ok(())
    }
}

impl Display for JournalDisplay {
    fn clear(&self) -> Result<(), DisplayError> {
        self.log("clear")
    }

    fn write(&self, text: &str) -> Result<(), DisplayError> {
        self.log(format!("write:{}", text.trim_end()))
    }

    fn backlight_on(&self) -> Result<(), DisplayError> {
        self.log("backlight_on")
    }

    fn backlight_off(&self) -> Result<(), DisplayError> {
        self.log("backlight_off")
    }

    fn cursor_on(&self) -> Result<(), DisplayError> {
        self.log("cursor_on")
    }

    fn cursor_off(&self) -> Result<(), DisplayError> {
        self.log("cursor_off")
    }

    fn blink_on(&self) -> Result<(), DisplayError> {
        self.log("blink_on")
    }

    fn blink_off(&self) -> Result<(), DisplayError> {
        self.log("blink_off")
    }
}

/// Channel buttons that note when the listener lets go of them
struct JournalButtons {
    inner: ChannelButtons,
    journal: Journal,
}

#[async_trait]
impl ButtonSource for JournalButtons {
    async fn next_press(&mut self) -> Option<Control> {
        self.inner.next_press().await
    }
}

impl Drop for JournalButtons {
    fn drop(&mut self) {
        self.journal.lock().push("deactivated".to_string());
    }
}

struct JournalAction {
    journal: Journal,
}

#[async_trait]
impl ShutdownAction for JournalAction {
    fn describe(&self) -> String {
        "journal".to_string()
    }

    async fn execute(&self) -> anyhow::Result<()> {
        self.journal.lock().push("action".to_string());
        Ok(())
    }
}

struct Rig {
    journal: Journal,
    display: Arc<JournalDisplay>,
    controller: Controller,
    rendezvous: Arc<ShutdownRendezvous>,
    listener: SwitchListener,
    presser: ButtonPresser,
    released: Arc<AtomicUsize>,
}

async fn rig() -> Rig {
    let journal: Journal = Arc::default();
    let display = Arc::new(JournalDisplay {
        journal: Arc::clone(&journal),
    });
    let url = "http://news.example/rss";
    let source = StaticFeedSource::new().with_titles(url, ["One", "Two"]);
    let settings = ViewerSettings {
        width: 16,
        dwell: Duration::from_millis(50),
        scroll_interval: Duration::from_millis(10),
    };
    let viewer = Viewer::new(display.clone(), Arc::new(source), settings).unwrap();
    let feeds = FeedList::new(vec![Feed::new("News", url)]).unwrap();
    let controller = Controller::launch(viewer, feeds, 0).await.unwrap();

    let rendezvous = Arc::new(ShutdownRendezvous::new());
    let released = Arc::new(AtomicUsize::new(0));
    let mut listener = SwitchListener::new();
    {
        let rendezvous = Arc::clone(&rendezvous);
        let released = Arc::clone(&released);
        listener.register(Control::Shutdown, move || {
            let rendezvous = Arc::clone(&rendezvous);
            let released = Arc::clone(&released);
            async move {
                rendezvous.request().await;
                released.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let (presser, inner) = ChannelButtons::pair();
    listener
        .activate(JournalButtons {
            inner,
            journal: Arc::clone(&journal),
        })
        .unwrap();

    Rig {
        journal,
        display,
        controller,
        rendezvous,
        listener,
        presser,
        released,
    }
}

fn position(journal: &[String], entry: &str) -> usize {
    journal
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("'{entry}' missing from {journal:?}"))
}

#[tokio::test(start_paused = true)]
async fn test_teardown_runs_in_order() {
    let mut rig = rig().await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let sequence = ShutdownSequence::new(
        rig.display.clone(),
        Box::new(JournalAction {
            journal: Arc::clone(&rig.journal),
        }),
    );
    assert!(rig.presser.press(Control::Shutdown));
    sequence
        .run(&rig.rendezvous, &mut rig.listener, &rig.controller)
        .await
        .unwrap();

    let journal = rig.journal.lock().clone();
    let deactivated = position(&journal, "deactivated");
    let tail = &journal[journal.len() - 7..];
    assert_eq!(
        tail,
        [
            "blink_off",
            "cursor_off",
            "backlight_off",
            "clear",
            "write:Shutdown In 5",
            "clear",
            "action",
        ]
    );
    assert!(deactivated < journal.len() - 7);
    assert_eq!(sequence.phase(), ShutdownPhase::ShuttingDown);
    assert!(!rig.listener.is_active());
    assert!(rig.presser.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_notice_held_for_delay() {
    let mut rig = rig().await;
    let sequence = ShutdownSequence::new(
        rig.display.clone(),
        Box::new(JournalAction {
            journal: Arc::clone(&rig.journal),
        }),
    )
    .with_notice("Bye")
    .with_delay(Duration::from_secs(3));

    rig.presser.press(Control::Shutdown);
    let started = tokio::time::Instant::now();
    sequence
        .run(&rig.rendezvous, &mut rig.listener, &rig.controller)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(rig.journal.lock().contains(&"write:Bye".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_shutdown_presses_do_not_hang() {
    let mut rig = rig().await;

    for _ in 0..3 {
        rig.presser.press(Control::Shutdown);
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    // only the first press waits at the rendezvous
    assert_eq!(rig.released.load(Ordering::SeqCst), 2);
    assert!(rig.rendezvous.is_requested());

    let sequence = ShutdownSequence::new(
        rig.display.clone(),
        Box::new(JournalAction {
            journal: Arc::clone(&rig.journal),
        }),
    )
    .with_delay(Duration::from_millis(100));
    sequence
        .run(&rig.rendezvous, &mut rig.listener, &rig.controller)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(rig.released.load(Ordering::SeqCst), 3);
    let actions = rig
        .journal
        .lock()
        .iter()
        .filter(|e| e.as_str() == "action")
        .count();
    assert_eq!(actions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_blanks_panel_without_action() {
    let mut rig = rig().await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let sequence = ShutdownSequence::new(
        rig.display.clone(),
        Box::new(JournalAction {
            journal: Arc::clone(&rig.journal),
        }),
    );
    let interrupt = CancellationToken::new();
    interrupt.cancel();

    let started = tokio::time::Instant::now();
    sequence
        .run_until(
            &rig.rendezvous,
            &mut rig.listener,
            &rig.controller,
            interrupt.cancelled(),
        )
        .await
        .unwrap();

    let journal = rig.journal.lock().clone();
    let deactivated = position(&journal, "deactivated");
    assert_eq!(
        journal[journal.len() - 4..],
        ["blink_off", "cursor_off", "backlight_off", "clear"]
    );
    assert!(deactivated < journal.len() - 4);
    assert!(!journal.contains(&"action".to_string()));
    assert!(!journal.iter().any(|e| e == "write:Shutdown In 5"));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(sequence.phase(), ShutdownPhase::Exited);
    assert!(!rig.listener.is_active());
    assert!(!rig.controller.is_viewing().await);
}

#[tokio::test(start_paused = true)]
async fn test_button_wins_over_pending_interrupt() {
    let mut rig = rig().await;
    let sequence = ShutdownSequence::new(
        rig.display.clone(),
        Box::new(JournalAction {
            journal: Arc::clone(&rig.journal),
        }),
    )
    .with_delay(Duration::from_millis(100));
    let interrupt = CancellationToken::new();

    rig.presser.press(Control::Shutdown);
    sequence
        .run_until(
            &rig.rendezvous,
            &mut rig.listener,
            &rig.controller,
            interrupt.cancelled(),
        )
        .await
        .unwrap();

    assert_eq!(sequence.phase(), ShutdownPhase::ShuttingDown);
    assert_eq!(rig.journal.lock().last().map(String::as_str), Some("action"));
}
