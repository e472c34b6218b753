use crate::buffer::RingBuffer;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::writer::Completion;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::fmt::Debug;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How the reader waits between pops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Sleep for the poll interval, then pop once
    #[default]
    Poll,
    /// Wait up to the poll interval for a push, then pop once
    ///
    /// Still one pop per wake-up, so a producer that outpaces the sink loses
    /// data to overwrites exactly as with [`ReadStrategy::Poll`].
    Notify,
}

/// What the reader does once the writer has finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Keep popping once per tick until the buffer reports empty
    #[default]
    Flush,
    /// Stop on the first tick that observes the writer finished; unread
    /// values are lost
    BestEffort,
}

/// Reader lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Polling,
    Stopped,
}

/// Drains a ring buffer into a sequence on a fixed interval
pub struct Reader<T: Send> {
    buffer: RingBuffer<T>,
    poll_interval: Duration,
    strategy: ReadStrategy,
    drain: DrainPolicy,
    metrics: StageMetrics,
}

impl<T: Send + Debug + 'static> Reader<T> {
    /// Create a polling reader with the default strategy and drain policy
    pub fn new(buffer: RingBuffer<T>, poll_interval: Duration) -> Self {
        Self {
            buffer,
            poll_interval,
            strategy: ReadStrategy::default(),
            drain: DrainPolicy::default(),
            metrics: StageMetrics::new("reader"),
        }
    }

    /// Set how the reader waits between pops
    pub fn with_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set what the reader does once the writer has finished
    pub fn with_drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    fn wait_and_pop(&self) -> Option<T> {
        match self.strategy {
            ReadStrategy::Poll => {
                thread::sleep(self.poll_interval);
                self.buffer.pop()
            }
            ReadStrategy::Notify => self.buffer.pop_timeout(self.poll_interval),
        }
    }

    /// One poll cycle
    fn tick(&self, writer_done: &Completion, output: &Sender<T>) -> ReaderState {
        let value = match self.drain {
            DrainPolicy::BestEffort => {
                if self.strategy == ReadStrategy::Poll {
                    thread::sleep(self.poll_interval);
                    if writer_done.is_done() {
                        return ReaderState::Stopped;
                    }
                    self.buffer.pop()
                } else {
                    if writer_done.is_done() {
                        return ReaderState::Stopped;
                    }
                    self.wait_and_pop()
                }
            }
            DrainPolicy::Flush => {
                // observed before popping, so an empty pop afterwards means
                // the writer's last push has already been taken
                let finished = writer_done.is_done();
                match self.wait_and_pop() {
                    Some(value) => Some(value),
                    None if finished => return ReaderState::Stopped,
                    None => None,
                }
            }
        };

        let Some(value) = value else {
            return ReaderState::Polling;
        };

        self.metrics.record_received();
        log::debug!("reader forwarding {value:?}");
        let start = Instant::now();
        if output.send(value).is_err() {
            log::warn!("reader: output sink closed early");
            return ReaderState::Stopped;
        }
        self.metrics.record_latency(start.elapsed());
        self.metrics.record_emitted();
        ReaderState::Polling
    }

    /// Poll until stopped; `output` closes when this returns
    pub fn run(self, writer_done: Completion, output: Sender<T>) {
        log::info!(
            "reader begin: interval={:?} strategy={:?} drain={:?}",
            self.poll_interval,
            self.strategy,
            self.drain
        );
        let mut state = ReaderState::Polling;
        while state == ReaderState::Polling {
            state = self.tick(&writer_done, &output);
        }

        let unread = self.buffer.len();
        if unread > 0 {
            log::info!("reader end: {unread} unread value(s) left in buffer");
        } else {
            log::info!("reader end");
        }
    }

    /// Spawn the reader on its own thread, returning its output sequence
    pub fn spawn(self, writer_done: Completion) -> Result<(Receiver<T>, JoinHandle<()>)> {
        let (tx, rx) = bounded(0);
        let name = String::from("reader");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(writer_done, tx))
            .map_err(|source| PipelineError::Spawn { name, source })?;
        Ok((rx, handle))
    }
}
