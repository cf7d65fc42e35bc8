//! Buttons and the Switch Listener
//!
//! Three logical controls drive the ticker: a rocker switch for next and
//! previous feed, and a separate button that requests shutdown. A
//! [`ButtonSource`] produces presses; the [`SwitchListener`] dispatches each
//! press to the handlers registered for that control.
//!
//! Every handler invocation runs as its own task, so two presses in quick
//! succession run their handlers concurrently. Whatever they call into
//! (the controller) is responsible for serializing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A logical control on the device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    /// Advance to the next feed
    Next,
    /// Return to the previous feed
    Previous,
    /// Request shutdown
    Shutdown,
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next => write!(f, "next"),
            Self::Previous => write!(f, "previous"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Errors from the switch listener
#[derive(Debug, Error)]
pub enum ButtonError {
    /// `activate` was called on an active listener
    #[error("Switch listener is already active")]
    AlreadyActive,

    /// Terminal setup for keyboard buttons failed
    #[error("Button input unavailable: {0}")]
    Io(#[from] std::io::Error),

    /// A key name in the bindings was not recognized
    #[error("Unknown key name '{0}'")]
    UnknownKey(String),
}

/// Produces button presses
#[async_trait]
pub trait ButtonSource: Send {
    /// Wait for the next press; `None` once the source is exhausted
    ///
    /// Must be cancel-safe: the listener may drop this future between
    /// presses when it is deactivated.
    async fn next_press(&mut self) -> Option<Control>;
}

type Handler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct ActiveListener {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Dispatches button presses to registered handlers
#[derive(Default)]
pub struct SwitchListener {
    handlers: HashMap<Control, Vec<Handler>>,
    active: Option<ActiveListener>,
}

impl SwitchListener {
    /// Create a listener with no handlers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` whenever `control` is pressed
    ///
    /// Registrations made while active take effect on the next activation.
    pub fn register<F, Fut>(&mut self, control: Control, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move || handler().boxed());
        self.handlers.entry(control).or_default().push(handler);
    }

    /// Start dispatching presses from `source`
    ///
    /// # Errors
    ///
    /// Returns [`ButtonError::AlreadyActive`] if the listener is already
    /// running.
    pub fn activate<S>(&mut self, source: S) -> Result<(), ButtonError>
    where
        S: ButtonSource + 'static,
    {
        if self.active.is_some() {
            return Err(ButtonError::AlreadyActive);
        }

        let cancel = CancellationToken::new();
        let handlers = self.handlers.clone();
        let task = tokio::spawn(dispatch(source, handlers, cancel.clone()));

        self.active = Some(ActiveListener { cancel, task });
        info!("Switch listener activated");
        Ok(())
    }

    /// Stop dispatching and wait for the dispatch loop to exit
    ///
    /// After this returns no new handler invocation starts. Handlers already
    /// running are not interrupted. The button source is dropped before this
    /// returns.
    pub async fn deactivate(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!(error = %e, "Switch listener task ended abnormally");
        }
        info!("Switch listener deactivated");
    }

    /// Whether presses are being dispatched
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

async fn dispatch<S: ButtonSource>(
    mut source: S,
    handlers: HashMap<Control, Vec<Handler>>,
    cancel: CancellationToken,
) {
    loop {
        let press = tokio::select! {
            () = cancel.cancelled() => break,
            press = source.next_press() => press,
        };

        let Some(control) = press else {
            debug!("Button source closed");
            break;
        };

        debug!(%control, "Button pressed");
        for handler in handlers.get(&control).into_iter().flatten() {
            tokio::spawn(handler());
        }
    }
}

/// Button source fed through a channel
///
/// Useful for tests and for bridging input devices that run on their own
/// thread. Create with [`ChannelButtons::pair`], which also returns the
/// [`ButtonPresser`] used to inject presses.
pub struct ChannelButtons {
    rx: mpsc::UnboundedReceiver<Control>,
}

/// Sending half of a [`ChannelButtons`] source
#[derive(Clone)]
pub struct ButtonPresser {
    tx: mpsc::UnboundedSender<Control>,
}

impl ChannelButtons {
    /// Create a connected presser and source
    #[must_use]
    pub fn pair() -> (ButtonPresser, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ButtonPresser { tx }, Self { rx })
    }
}

impl ButtonPresser {
    /// Press `control`; returns false once the source has been dropped
    pub fn press(&self, control: Control) -> bool {
        self.tx.send(control).is_ok()
    }

    /// Whether the source has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl ButtonSource for ChannelButtons {
    async fn next_press(&mut self) -> Option<Control> {
        self.rx.recv().await
    }
}

/// Key codes bound to each control
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyBindings {
    /// Keys for [`Control::Next`]
    pub next: Vec<KeyCode>,
    /// Keys for [`Control::Previous`]
    pub previous: Vec<KeyCode>,
    /// Keys for [`Control::Shutdown`]
    pub shutdown: Vec<KeyCode>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            next: vec![KeyCode::Right, KeyCode::Char('n')],
            previous: vec![KeyCode::Left, KeyCode::Char('p')],
            shutdown: vec![KeyCode::Char('q'), KeyCode::Esc],
        }
    }
}

impl KeyBindings {
    /// Build bindings from key names such as `"Right"`, `"Esc"` or `"n"`
    ///
    /// # Errors
    ///
    /// Returns [`ButtonError::UnknownKey`] for a name that is not a single
    /// character or a known key.
    pub fn from_names(
        next: &[String],
        previous: &[String],
        shutdown: &[String],
    ) -> Result<Self, ButtonError> {
        let parse_all = |names: &[String]| -> Result<Vec<KeyCode>, ButtonError> {
            names.iter().map(|name| parse_key(name)).collect()
        };
        Ok(Self {
            next: parse_all(next)?,
            previous: parse_all(previous)?,
            shutdown: parse_all(shutdown)?,
        })
    }

    /// Control bound to a key event, if any
    ///
    /// Ctrl+C never resolves to a control; see [`is_interrupt`].
    #[must_use]
    pub fn resolve(&self, key: &KeyEvent) -> Option<Control> {
        if is_interrupt(key) {
            return None;
        }
        if self.next.contains(&key.code) {
            Some(Control::Next)
        } else if self.previous.contains(&key.code) {
            Some(Control::Previous)
        } else if self.shutdown.contains(&key.code) {
            Some(Control::Shutdown)
        } else {
            None
        }
    }
}

/// Whether `key` is Ctrl+C, which raw mode delivers as a key instead of
/// SIGINT
#[must_use]
pub fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

/// Parse a key name into a key code
///
/// # Errors
///
/// Returns [`ButtonError::UnknownKey`] if the name is not recognized.
pub fn parse_key(name: &str) -> Result<KeyCode, ButtonError> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(KeyCode::Char(c));
    }

    match name.to_lowercase().as_str() {
        "right" => Ok(KeyCode::Right),
        "left" => Ok(KeyCode::Left),
        "up" => Ok(KeyCode::Up),
        "down" => Ok(KeyCode::Down),
        "esc" | "escape" => Ok(KeyCode::Esc),
        "enter" | "return" => Ok(KeyCode::Enter),
        "space" => Ok(KeyCode::Char(' ')),
        "tab" => Ok(KeyCode::Tab),
        "backspace" => Ok(KeyCode::Backspace),
        _ => Err(ButtonError::UnknownKey(name.to_string())),
    }
}

/// Terminal keyboard acting as the device's buttons
///
/// Puts the terminal in raw mode for its lifetime. Ctrl+C is not a button:
/// it cancels the `interrupt` token, like SIGINT would without raw mode.
pub struct KeyboardButtons {
    events: EventStream,
    bindings: KeyBindings,
    interrupt: CancellationToken,
}

impl KeyboardButtons {
    /// Enter raw mode and start reading key events
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be switched to raw mode
    /// (for example when stdin is not a terminal).
    pub fn new(bindings: KeyBindings, interrupt: CancellationToken) -> Result<Self, ButtonError> {
        terminal::enable_raw_mode()?;
        Ok(Self {
            events: EventStream::new(),
            bindings,
            interrupt,
        })
    }
}

impl Drop for KeyboardButtons {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

#[async_trait]
impl ButtonSource for KeyboardButtons {
    async fn next_press(&mut self) -> Option<Control> {
        while let Some(event) = self.events.next().await {
            match event {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if is_interrupt(&key) {
                        info!("Ctrl+C pressed");
                        self.interrupt.cancel();
                    } else if let Some(control) = self.bindings.resolve(&key) {
                        return Some(control);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Keyboard input failed");
                    return None;
                }
            }
        }
        None
    }
}
