//! History reporting shared by every engine.
//!
//! Each engine describes what it does as a stream of typed history events
//! and hands each one, synchronously and in order, to a [`Reporter`]. The
//! engines never look at what the reporter does with an event, so any sink
//! can be plugged in:
//!
//! - [`NullReporter`]: discard everything
//! - [`BufferingReporter`]: keep events (or a projection of them) in memory
//! - [`ChannelReporter`]: forward to a queue drained by another thread
//! - [`WriterReporter`]: write a textual rendering to an output stream
//! - [`TracingReporter`]: forward to the `tracing` ecosystem
//! - [`FnReporter`]: call an arbitrary closure
//!
//! # Example
//!
//! ```rust
//! use behavior::reporter::{BufferingReporter, Reporter};
//!
//! let buffer = BufferingReporter::new();
//! buffer.report("first");
//! buffer.report("second");
//!
//! assert_eq!(buffer.events(), vec!["first", "second"]);
//! ```

mod sinks;

pub use sinks::{BufferingReporter, ChannelReporter, TracingReporter, WriterFormat, WriterReporter};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// Common contract of the events emitted by the engines.
///
/// Events are created by an engine at the moment the action they describe
/// happens; callers only ever receive them.
pub trait HistoryEvent: Clone + Debug + Display + Serialize + Send + Sync + 'static {
    /// When the action happened.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Receiver of history events.
///
/// `report` is called in-line by the engine, so implementations must return
/// promptly and must not panic: a panicking reporter aborts the engine call
/// that produced the event.
pub trait Reporter<E>: Send + Sync {
    fn report(&self, event: E);
}

/// Reporter handle as stored by executions.
pub type SharedReporter<E> = Arc<dyn Reporter<E>>;

impl<E, R> Reporter<E> for Arc<R>
where
    R: Reporter<E> + ?Sized,
{
    fn report(&self, event: E) {
        (**self).report(event)
    }
}

/// Reporter that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl<E> Reporter<E> for NullReporter {
    fn report(&self, _event: E) {}
}

/// Reporter backed by a closure.
///
/// # Example
///
/// ```rust
/// use behavior::reporter::{FnReporter, Reporter};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// let reporter = FnReporter::new(move |_event: u32| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// reporter.report(7);
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct FnReporter<F> {
    callback: F,
}

impl<F> FnReporter<F> {
    pub fn new(callback: F) -> Self {
        FnReporter { callback }
    }
}

impl<E, F> Reporter<E> for FnReporter<F>
where
    F: Fn(E) + Send + Sync,
{
    fn report(&self, event: E) {
        (self.callback)(event)
    }
}

/// Wrap a closure into a [`SharedReporter`].
pub fn shared<E, F>(callback: F) -> SharedReporter<E>
where
    E: 'static,
    F: Fn(E) + Send + Sync + 'static,
{
    Arc::new(FnReporter::new(callback))
}

/// Shared handle to a [`NullReporter`].
pub fn discard<E: 'static>() -> SharedReporter<E> {
    Arc::new(NullReporter)
}
