//! Reporter sinks.

use super::{HistoryEvent, Reporter};
use parking_lot::Mutex;
use std::io::Write;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::Level;

/// Selector applied to each event before it is buffered.
type Selector<E, T> = Box<dyn Fn(E) -> T + Send + Sync>;

/// Reporter that appends events to an in-memory list.
///
/// An optional selector projects each event before it is stored, e.g. to
/// keep only the visited state of a chain walk.
///
/// # Example
///
/// ```rust
/// use behavior::reporter::{BufferingReporter, Reporter};
///
/// let lengths = BufferingReporter::with_selector(|word: &str| word.len());
/// lengths.report("one");
/// lengths.report("three");
///
/// assert_eq!(lengths.events(), vec![3, 5]);
/// ```
pub struct BufferingReporter<E, T = E> {
    events: Mutex<Vec<T>>,
    selector: Selector<E, T>,
}

impl<E: 'static> BufferingReporter<E, E> {
    /// Create a buffer that stores events unchanged.
    pub fn new() -> Self {
        Self::with_selector(|event| event)
    }
}

impl<E: 'static> Default for BufferingReporter<E, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, T> BufferingReporter<E, T> {
    /// Create a buffer that stores `selector(event)` for every event.
    pub fn with_selector<F>(selector: F) -> Self
    where
        F: Fn(E) -> T + Send + Sync + 'static,
    {
        BufferingReporter {
            events: Mutex::new(Vec::new()),
            selector: Box::new(selector),
        }
    }

    /// Snapshot of everything buffered so far, oldest first.
    pub fn events(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.events.lock().clone()
    }

    /// Take everything buffered so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<E, T: Send> Reporter<E> for BufferingReporter<E, T> {
    fn report(&self, event: E) {
        let value = (self.selector)(event);
        self.events.lock().push(value);
    }
}

/// Reporter that forwards events into an unbounded FIFO queue.
///
/// Sending never blocks, so the engine is never held up by a slow consumer.
/// The receiving half may live on another thread or task; once it is dropped
/// further events are discarded.
pub struct ChannelReporter<E> {
    sender: UnboundedSender<E>,
}

impl<E> ChannelReporter<E> {
    /// Create a reporter and the receiver that drains it.
    pub fn new() -> (Self, UnboundedReceiver<E>) {
        let (sender, receiver) = unbounded_channel();
        (ChannelReporter { sender }, receiver)
    }

    /// Wrap an existing sender.
    pub fn from_sender(sender: UnboundedSender<E>) -> Self {
        ChannelReporter { sender }
    }
}

impl<E: Send> Reporter<E> for ChannelReporter<E> {
    fn report(&self, event: E) {
        if self.sender.send(event).is_err() {
            tracing::trace!("history receiver dropped, event discarded");
        }
    }
}

/// Rendering used by [`WriterReporter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriterFormat {
    /// One `Display` rendering per line.
    #[default]
    Text,
    /// One JSON object per line.
    JsonLines,
}

/// Reporter that writes each event to an output stream.
///
/// Write failures are logged and otherwise ignored; a broken stream must not
/// abort the engine.
pub struct WriterReporter<W> {
    writer: Mutex<W>,
    format: WriterFormat,
}

impl<W: Write + Send> WriterReporter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_format(writer, WriterFormat::Text)
    }

    pub fn with_format(writer: W, format: WriterFormat) -> Self {
        WriterReporter {
            writer: Mutex::new(writer),
            format,
        }
    }

    pub fn format(&self) -> WriterFormat {
        self.format
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<E: HistoryEvent, W: Write + Send> Reporter<E> for WriterReporter<W> {
    fn report(&self, event: E) {
        let mut writer = self.writer.lock();
        let result = match self.format {
            WriterFormat::Text => writeln!(writer, "{event}"),
            WriterFormat::JsonLines => serde_json::to_writer(&mut *writer, &event)
                .map_err(std::io::Error::from)
                .and_then(|()| writeln!(writer)),
        };
        if let Err(error) = result {
            tracing::warn!(%error, "failed to write history event");
        }
    }
}

/// Reporter that forwards events to `tracing`.
#[derive(Clone, Copy, Debug)]
pub struct TracingReporter {
    level: Level,
}

impl TracingReporter {
    pub fn new(level: Level) -> Self {
        TracingReporter { level }
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        TracingReporter::new(Level::INFO)
    }
}

impl<E: HistoryEvent> Reporter<E> for TracingReporter {
    fn report(&self, event: E) {
        let timestamp = event.timestamp();
        if self.level == Level::ERROR {
            tracing::error!(%timestamp, "{event}");
        } else if self.level == Level::WARN {
            tracing::warn!(%timestamp, "{event}");
        } else if self.level == Level::INFO {
            tracing::info!(%timestamp, "{event}");
        } else if self.level == Level::DEBUG {
            tracing::debug!(%timestamp, "{event}");
        } else {
            tracing::trace!(%timestamp, "{event}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::Serialize;
    use std::fmt;

    #[derive(Clone, Debug, Serialize)]
    struct Ping {
        at: DateTime<Utc>,
        seq: u32,
    }

    impl fmt::Display for Ping {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "ping #{}", self.seq)
        }
    }

    impl HistoryEvent for Ping {
        fn timestamp(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn ping(seq: u32) -> Ping {
        Ping {
            at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            seq,
        }
    }

    #[test]
    fn buffer_keeps_order() {
        let buffer = BufferingReporter::new();
        buffer.report(ping(1));
        buffer.report(ping(2));

        let seqs: Vec<u32> = buffer.events().iter().map(|p| p.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn buffer_selector_projects_events() {
        let buffer = BufferingReporter::with_selector(|p: Ping| p.seq * 2);
        buffer.report(ping(1));
        buffer.report(ping(5));

        assert_eq!(buffer.events(), vec![2, 10]);
    }

    #[test]
    fn drain_empties_the_buffer() {
        let buffer = BufferingReporter::new();
        buffer.report(1);
        buffer.report(2);

        assert_eq!(buffer.drain(), vec![1, 2]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn channel_forwards_in_fifo_order() {
        let (reporter, mut receiver) = ChannelReporter::new();
        reporter.report(ping(1));
        reporter.report(ping(2));

        assert_eq!(receiver.try_recv().unwrap().seq, 1);
        assert_eq!(receiver.try_recv().unwrap().seq, 2);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn channel_ignores_dropped_receiver() {
        let (reporter, receiver) = ChannelReporter::new();
        drop(receiver);
        reporter.report(ping(1));
    }

    #[test]
    fn writer_renders_text_lines() {
        let reporter = WriterReporter::new(Vec::new());
        reporter.report(ping(1));
        reporter.report(ping(2));

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(output, "ping #1\nping #2\n");
    }

    #[test]
    fn writer_renders_json_lines() {
        let reporter = WriterReporter::with_format(Vec::new(), WriterFormat::JsonLines);
        reporter.report(ping(3));

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let line = output.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["seq"], 3);
    }

    #[test]
    fn tracing_reporter_does_not_panic_without_subscriber() {
        let reporter = TracingReporter::new(Level::DEBUG);
        reporter.report(ping(1));
        assert_eq!(reporter.level(), Level::DEBUG);
    }
}
