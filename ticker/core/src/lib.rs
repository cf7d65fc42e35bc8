//! Ticker Core - Feed Scrolling for Character Displays
//!
//! This crate holds everything the feed ticker does apart from process
//! wiring: fetching feeds, scrolling entries on a small character display,
//! switching feeds from hardware buttons, and the orderly shutdown sequence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Buttons                                  │
//! │   KeyboardButtons / ChannelButtons ──► SwitchListener (task)      │
//! │          Next │ Previous                     │ Shutdown           │
//! └───────────────┼──────────────────────────────┼────────────────────┘
//!                 ▼                              ▼
//! ┌───────────────────────────────┐   ┌──────────────────────────────┐
//! │          Controller           │   │      ShutdownRendezvous      │
//! │  fair lock ► index ± 1 mod n  │   │  main flow ◄──► button task  │
//! │          stop ► start         │   └──────────────┬───────────────┘
//! └───────────────┬───────────────┘                  ▼
//!                 ▼                     ┌──────────────────────────────┐
//! ┌───────────────────────────────┐     │       ShutdownSequence       │
//! │            Viewer             │     │ deactivate ► stop ► notice   │
//! │  FeedSource ► worker task     │     │      ► delay ► action        │
//! │    Scroller ► Display         │     └──────────────────────────────┘
//! └───────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Viewer`]: Runs one background worker that scrolls a feed's entries
//! - [`Controller`]: Owns the feed list and serializes every switch
//! - [`ShutdownSequence`]: Tears the ticker down after the shutdown button
//! - [`Display`]: Character display seam ([`ConsoleDisplay`], [`RecordingDisplay`])
//! - [`FeedSource`]: Feed fetching seam ([`HttpFeedSource`], [`StaticFeedSource`])
//! - [`SwitchListener`]: Dispatches button presses to handlers
//!
//! # Module Overview
//!
//! - [`feed`]: Feed, feed list and entry value types
//! - [`source`]: Fetching and parsing RSS/Atom feeds
//! - [`scroller`]: Marquee frames for text wider than the display
//! - [`display`]: Display trait and implementations
//! - [`viewer`]: Background feed viewer
//! - [`controller`]: Feed switching
//! - [`buttons`]: Button sources and the switch listener
//! - [`shutdown`]: Rendezvous and shutdown sequence
//! - [`config`]: Configuration file, environment and CLI overrides

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buttons;
pub mod config;
pub mod controller;
pub mod display;
pub mod feed;
pub mod scroller;
pub mod shutdown;
pub mod source;
pub mod viewer;

// Re-exports for convenience
pub use buttons::{
    is_interrupt, ButtonError, ButtonPresser, ButtonSource, ChannelButtons, Control,
    KeyBindings, KeyboardButtons, SwitchListener,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, ShutdownSettings, TickerConfig,
};
pub use controller::{Controller, ControllerError};
pub use display::{ConsoleDisplay, Display, DisplayError, DisplayOp, RecordingDisplay};
pub use feed::{EntryLookup, Feed, FeedEntries, FeedEntry, FeedList};
pub use scroller::Scroller;
pub use shutdown::{
    ExitOnly, ShutdownAction, ShutdownPhase, ShutdownRendezvous, ShutdownSequence,
    SystemShutdown,
};
pub use source::{FeedSource, FetchError, HttpFeedSource, StaticFeedSource};
pub use viewer::{Viewer, ViewerError, ViewerSettings};
