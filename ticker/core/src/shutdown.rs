//! Shutdown Coordination
//!
//! The shutdown button fires on a listener task, but the listener cannot tear
//! itself down from inside its own callback. Instead the callback and the
//! main flow meet at a [`ShutdownRendezvous`]: the main flow parks there right
//! after activating the listener, and is released when the button arrives.
//! The main flow then runs the [`ShutdownSequence`]:
//!
//! ```text
//! Listening ─► RendezvousComplete ─► Deactivating ─► StoppingViewer
//!           ─► Notifying ─► Delaying ─► ShuttingDown
//! ```
//!
//! Only the first shutdown press takes part in the rendezvous. Later presses
//! return immediately, so a bouncing button cannot wedge a callback task.
//!
//! An interrupt (a signal, or Ctrl+C at the console) is not the shutdown
//! button. [`ShutdownSequence::run_until`] treats it as "blank the panel and
//! exit": the listener and viewer are stopped, but no notice is shown and the
//! shutdown action never runs.
//!
//! ```text
//! Listening ─► Interrupted ─► Deactivating ─► StoppingViewer ─► Exited
//! ```

use std::future::Future;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::process::Command;
use tokio::sync::Barrier;
use tracing::{debug, info, warn};

use crate::buttons::SwitchListener;
use crate::controller::Controller;
use crate::display::Display;

/// Notice shown before powering off
pub const DEFAULT_NOTICE: &str = "Shutdown In 5";

/// Delay between the notice and the shutdown action
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Two-party meeting point between the shutdown button and the main flow
pub struct ShutdownRendezvous {
    barrier: Barrier,
    requested: AtomicBool,
    waiting: AtomicBool,
}

impl Default for ShutdownRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownRendezvous {
    /// Create an unused rendezvous
    #[must_use]
    pub fn new() -> Self {
        Self {
            barrier: Barrier::new(2),
            requested: AtomicBool::new(false),
            waiting: AtomicBool::new(false),
        }
    }

    /// Event side: arrive and wait for the main flow
    ///
    /// Only the first call participates; later calls return at once.
    pub async fn request(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already requested");
            return;
        }
        info!("Shutdown requested");
        self.barrier.wait().await;
    }

    /// Main side: arrive and wait for a shutdown request
    ///
    /// Meant to be called once. A second call returns at once.
    pub async fn wait(&self) {
        if self.waiting.swap(true, Ordering::SeqCst) {
            return;
        }
        self.barrier.wait().await;
    }

    /// Whether a shutdown has been requested
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Process-level shutdown state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Buttons active, waiting at the rendezvous
    Listening,
    /// Both parties arrived
    RendezvousComplete,
    /// Switch listener being deactivated
    Deactivating,
    /// Viewer being stopped and the panel blanked
    StoppingViewer,
    /// Shutdown notice on the panel
    Notifying,
    /// Waiting before the shutdown action
    Delaying,
    /// Shutdown action invoked (terminal)
    ShuttingDown,
    /// Interrupt received instead of the shutdown button
    Interrupted,
    /// Panel blanked after an interrupt; the process exits (terminal)
    Exited,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Listening => "listening",
            Self::RendezvousComplete => "rendezvous-complete",
            Self::Deactivating => "deactivating",
            Self::StoppingViewer => "stopping-viewer",
            Self::Notifying => "notifying",
            Self::Delaying => "delaying",
            Self::ShuttingDown => "shutting-down",
            Self::Interrupted => "interrupted",
            Self::Exited => "exited",
        };
        write!(f, "{label}")
    }
}

/// The final step of the program
#[async_trait]
pub trait ShutdownAction: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Perform the action
    async fn execute(&self) -> anyhow::Result<()>;
}

/// Runs an OS command, `shutdown -h now` by default
#[derive(Clone, Debug)]
pub struct SystemShutdown {
    program: String,
    args: Vec<String>,
}

impl SystemShutdown {
    /// Halt the machine, going through `sudo` unless already root
    #[must_use]
    pub fn halt() -> Self {
        // SAFETY: geteuid has no preconditions and cannot fail
        let euid = unsafe { libc::geteuid() };
        let shutdown = ["shutdown", "-h", "now"].map(String::from);
        let (program, args) = if euid == 0 {
            (shutdown[0].clone(), shutdown[1..].to_vec())
        } else {
            ("sudo".to_string(), shutdown.to_vec())
        };
        Self { program, args }
    }

    /// Run an arbitrary command line; `None` if `command` is empty
    #[must_use]
    pub fn from_command(command: Vec<String>) -> Option<Self> {
        let mut parts = command.into_iter();
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl ShutdownAction for SystemShutdown {
    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn execute(&self) -> anyhow::Result<()> {
        info!(command = %self.describe(), "Running shutdown command");
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("'{}' exited with {status}", self.describe());
        }
        Ok(())
    }
}

/// Leaves the machine running; the process simply exits
#[derive(Clone, Copy, Debug, Default)]
pub struct ExitOnly;

#[async_trait]
impl ShutdownAction for ExitOnly {
    fn describe(&self) -> String {
        "exit".to_string()
    }

    async fn execute(&self) -> anyhow::Result<()> {
        info!("Poweroff disabled; exiting");
        Ok(())
    }
}

/// Orderly teardown after the shutdown button
pub struct ShutdownSequence {
    display: Arc<dyn Display>,
    action: Box<dyn ShutdownAction>,
    notice: String,
    delay: Duration,
    phase: RwLock<ShutdownPhase>,
}

impl ShutdownSequence {
    /// Create a sequence with the default notice and delay
    pub fn new(display: Arc<dyn Display>, action: Box<dyn ShutdownAction>) -> Self {
        Self {
            display,
            action,
            notice: DEFAULT_NOTICE.to_string(),
            delay: DEFAULT_DELAY,
            phase: RwLock::new(ShutdownPhase::Listening),
        }
    }

    /// Set the notice shown before the delay
    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = notice.into();
        self
    }

    /// Set the delay between notice and action
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.read()
    }

    fn enter(&self, phase: ShutdownPhase) {
        *self.phase.write() = phase;
        debug!(%phase, "Shutdown phase");
    }

    /// Wait at the rendezvous, then tear everything down and run the action
    ///
    /// Display failures along the way are logged and do not stop the
    /// sequence; only a failing shutdown action is returned.
    ///
    /// # Errors
    ///
    /// Returns the shutdown action's error.
    pub async fn run(
        &self,
        rendezvous: &ShutdownRendezvous,
        listener: &mut SwitchListener,
        controller: &Controller,
    ) -> anyhow::Result<()> {
        self.run_until(rendezvous, listener, controller, std::future::pending())
            .await
    }

    /// Like [`ShutdownSequence::run`], but `interrupted` completing first
    /// only blanks the panel and returns
    ///
    /// # Errors
    ///
    /// Returns the shutdown action's error. The interrupt path never fails.
    pub async fn run_until<F>(
        &self,
        rendezvous: &ShutdownRendezvous,
        listener: &mut SwitchListener,
        controller: &Controller,
        interrupted: F,
    ) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.enter(ShutdownPhase::Listening);
        let button = tokio::select! {
            () = rendezvous.wait() => true,
            () = interrupted => false,
        };
        self.enter(if button {
            ShutdownPhase::RendezvousComplete
        } else {
            ShutdownPhase::Interrupted
        });

        self.enter(ShutdownPhase::Deactivating);
        listener.deactivate().await;

        self.enter(ShutdownPhase::StoppingViewer);
        if let Err(e) = controller.stop().await {
            warn!(error = %e, "Failed to stop viewer cleanly");
        }

        if !button {
            self.enter(ShutdownPhase::Exited);
            info!("Interrupted; display blanked, exiting without shutdown action");
            return Ok(());
        }

        self.enter(ShutdownPhase::Notifying);
        if let Err(e) = self.display.write(&self.notice) {
            warn!(error = %e, "Failed to show shutdown notice");
        }

        self.enter(ShutdownPhase::Delaying);
        tokio::time::sleep(self.delay).await;
        if let Err(e) = self.display.clear() {
            warn!(error = %e, "Failed to clear display");
        }

        self.enter(ShutdownPhase::ShuttingDown);
        info!(action = %self.action.describe(), "Shutting down");
        self.action.execute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rendezvous_releases_both_sides() {
        let rendezvous = Arc::new(ShutdownRendezvous::new());

        let main = {
            let rendezvous = Arc::clone(&rendezvous);
            tokio::spawn(async move { rendezvous.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!main.is_finished());

        rendezvous.request().await;
        main.await.unwrap();
        assert!(rendezvous.is_requested());
    }

    #[tokio::test]
    async fn test_event_first_waits_for_main() {
        let rendezvous = Arc::new(ShutdownRendezvous::new());

        let event = {
            let rendezvous = Arc::clone(&rendezvous);
            tokio::spawn(async move { rendezvous.request().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!event.is_finished());

        rendezvous.wait().await;
        event.await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_requests_return_immediately() {
        let rendezvous = Arc::new(ShutdownRendezvous::new());
        let main = {
            let rendezvous = Arc::clone(&rendezvous);
            tokio::spawn(async move { rendezvous.wait().await })
        };

        rendezvous.request().await;
        main.await.unwrap();

        // bounce: must not block on a barrier nobody else will reach
        tokio::time::timeout(Duration::from_secs(1), rendezvous.request())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), rendezvous.wait())
            .await
            .unwrap();
    }

    #[test]
    fn test_system_shutdown_from_command() {
        let action = SystemShutdown::from_command(vec![
            "systemctl".to_string(),
            "poweroff".to_string(),
        ])
        .unwrap();
        assert_eq!(action.describe(), "systemctl poweroff");
        assert!(SystemShutdown::from_command(Vec::new()).is_none());
    }

    #[test]
    fn test_halt_command_shape() {
        let described = SystemShutdown::halt().describe();
        assert!(described.ends_with("shutdown -h now"));
    }

    #[tokio::test]
    async fn test_system_shutdown_reports_failure() {
        let action = SystemShutdown::from_command(vec!["false".to_string()]).unwrap();
        assert!(action.execute().await.is_err());

        let action = SystemShutdown::from_command(vec!["true".to_string()]).unwrap();
        assert!(action.execute().await.is_ok());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(ShutdownPhase::StoppingViewer.to_string(), "stopping-viewer");
        assert_eq!(ShutdownPhase::ShuttingDown.to_string(), "shutting-down");
        assert_eq!(ShutdownPhase::Exited.to_string(), "exited");
    }
}
