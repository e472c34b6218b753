use crate::buffer::RingBuffer;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use std::fmt::Debug;
use std::thread::{self, JoinHandle};

/// Create a linked completion signal pair
///
/// The signal fires when the [`CompletionHandle`] is dropped, which can
/// only happen once.
pub fn completion() -> (CompletionHandle, Completion) {
    let (tx, rx) = bounded(0);
    (CompletionHandle { _tx: tx }, Completion { rx })
}

/// Fires its [`Completion`] when dropped
#[derive(Debug)]
pub struct CompletionHandle {
    _tx: Sender<()>,
}

/// Observes whether a task has finished
#[derive(Debug, Clone)]
pub struct Completion {
    rx: Receiver<()>,
}

impl Completion {
    /// Non-blocking check of the completion signal
    pub fn is_done(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the signal fires
    pub fn wait(&self) {
        while self.rx.recv().is_ok() {}
    }
}

/// Drains a sequence into a ring buffer
pub struct Writer<T: Send> {
    buffer: RingBuffer<T>,
    metrics: StageMetrics,
}

impl<T: Send + Debug + 'static> Writer<T> {
    /// Create a writer pushing into `buffer`
    pub fn new(buffer: RingBuffer<T>) -> Self {
        Self {
            buffer,
            metrics: StageMetrics::new("writer"),
        }
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Push every value from `input` in arrival order until it closes
    ///
    /// `done` is dropped on return, signalling that no further pushes will
    /// happen.
    pub fn run(self, input: Receiver<T>, done: CompletionHandle) {
        log::info!("writer begin");
        for value in input.iter() {
            self.metrics.record_received();
            log::debug!("writer pushing {value:?}");
            if let Some(lost) = self.buffer.push(value) {
                log::debug!("writer overwrote unread {lost:?}");
                self.metrics.record_evicted();
            }
            self.metrics.record_emitted();
        }
        log::info!("writer end");
        drop(done);
    }

    /// Spawn the writer on its own thread, returning its completion signal
    pub fn spawn(self, input: Receiver<T>) -> Result<(Completion, JoinHandle<()>)> {
        let (handle, done) = completion();
        let name = String::from("writer");
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(input, handle))
            .map_err(|source| PipelineError::Spawn { name, source })?;
        Ok((done, join))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_completion_fires_on_drop() {
        let (handle, done) = completion();
        let observer = done.clone();
        assert!(!done.is_done());
        drop(handle);
        assert!(done.is_done());
        assert!(observer.is_done());
        done.wait();
    }

    #[test]
    fn test_writer_pushes_in_order_then_signals() {
        let buffer = RingBuffer::new(8);
        let (tx, rx) = bounded(0);
        let writer = Writer::new(buffer.clone());
        let metrics = writer.metrics().clone();
        let (done, handle) = writer.spawn(rx).unwrap();

        for v in [3, 6, 9] {
            tx.send(v).unwrap();
        }
        assert!(!done.is_done());
        drop(tx);
        done.wait();
        handle.join().unwrap();

        assert!(done.is_done());
        assert_eq!(buffer.pop(), Some(3));
        assert_eq!(buffer.pop(), Some(6));
        assert_eq!(buffer.pop(), Some(9));
        assert_eq!(metrics.total_received(), 3);
        assert_eq!(metrics.total_evicted(), 0);
    }

    #[test]
    fn test_writer_counts_overwrites() {
        let buffer = RingBuffer::new(2);
        let (tx, rx) = bounded(0);
        let writer = Writer::new(buffer.clone());
        let metrics = writer.metrics().clone();
        let (done, handle) = writer.spawn(rx).unwrap();

        for v in 1..=5 {
            tx.send(v).unwrap();
        }
        drop(tx);
        handle.join().unwrap();

        assert!(done.is_done());
        assert_eq!(metrics.total_evicted(), 3);
        assert_eq!(metrics.total_rejected(), 0);
        assert_eq!(metrics.total_emitted(), 5);
        assert_eq!(buffer.pop(), Some(4));
        assert_eq!(buffer.pop(), Some(5));
        assert_eq!(buffer.pop_timeout(Duration::from_millis(1)), None);
    }
}
