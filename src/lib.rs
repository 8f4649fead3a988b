//! Abstract time with a manually triggered clock for deterministic tests.
//!
//! Code that depends on the passage of time can run unmodified against real
//! time in production and be driven event-by-event in tests. The manual
//! clock never fires anything because time passed: a test driver declares
//! that a named event occurred, and whichever operations were registered
//! under that [`EventId`] are released, no matter which side arrived first.
//!
//! # Overview
//!
//! The main type is [`TimeHandle`], a cheap-to-clone handle providing the
//! full time surface: `now`, `after`, `sleep`, tickers, timers, callback
//! timers and cancellable deadline contexts. Every time-producing operation
//! takes a caller-assigned [`EventId`].
//!
//! A manual handle comes with a [`ManualController`] for the test driver:
//! `trigger` fires events, `advance`/`queue_nows` steer the clock's notional
//! "now", `unregister` clears ids for reuse.
//!
//! ```rust
//! use manual_time::TimeHandle;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let (time, ctrl) = TimeHandle::manual();
//!
//! let worker = {
//!     let time = time.clone();
//!     tokio::spawn(async move {
//!         time.sleep(Duration::from_secs(30), 1).await;
//!         // woken by ctrl.trigger below, instantly
//!     })
//! };
//!
//! // Let the worker register, then fire its event.
//! tokio::task::yield_now().await;
//! ctrl.trigger([1]);
//! worker.await.unwrap();
//! # }
//! ```
//!
//! # Triggering, not advancing
//!
//! Advancing "now" is bookkeeping for stamped timestamps; it does not fire
//! timers. Decoupling "what time the event claims to have happened at" from
//! "when the event actually fired" is what makes interleavings of many
//! concurrent actors testable deterministically. A trigger that arrives
//! before anything is registered on its id is not lost: it becomes pending
//! credit that the next registration consumes synchronously.
//!
//! # Known limitation
//!
//! Ids are not reuse-safe while a previous registration is outstanding: the
//! first registration owns the id until it is discarded or unregistered.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]
#![forbid(unsafe_code)]

mod config;
mod context;
mod controller;
mod event;
mod handle;
mod inner;
mod manual;
mod realtime;
mod sleep;
mod ticker;
mod timer;
mod trigger;

pub use config::{ManualConfig, TimeConfig};
pub use context::{CancelHandle, CancelReason, TimeContext};
pub use controller::ManualController;
pub use event::EventId;
pub use handle::TimeHandle;
pub use sleep::{TimeAfter, TimeSleep};
pub use ticker::TimeTicker;
pub use timer::TimeTimer;
