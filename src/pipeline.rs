use crate::buffer::RingBuffer;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::io::{spawn_line_source, spawn_sink, Sink};
use crate::metrics::{MetricsSnapshot, PipelineReport, StageMetrics};
use crate::reader::{DrainPolicy, ReadStrategy, Reader};
use crate::stage::{non_negative, parse_integers, positive_multiple_of_three, StageRunner};
use crate::writer::Writer;
use crossbeam::channel::Receiver;
use std::io::BufRead;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

fn join_task<T>(name: &str, handle: JoinHandle<T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| PipelineError::ThreadPanicked(name.to_owned()))
}

/// The three filter stages running over a token sequence
pub struct FilterChain {
    handles: Vec<(String, JoinHandle<()>)>,
    metrics: Vec<StageMetrics>,
}

impl FilterChain {
    /// Spawn parse → non-negative → positive-multiple-of-three
    ///
    /// Returns the filtered sequence, which closes once `tokens` closes and
    /// every stage has finished.
    pub fn spawn(tokens: Receiver<String>) -> Result<(Receiver<i64>, Self)> {
        let mut chain = Self {
            handles: Vec::with_capacity(3),
            metrics: Vec::with_capacity(3),
        };

        let parse = StageRunner::new(parse_integers());
        chain.metrics.push(parse.metrics().clone());
        let (ints, handle) = parse.spawn(tokens)?;
        chain.handles.push(("parse".into(), handle));

        let non_negative = StageRunner::new(non_negative());
        chain.metrics.push(non_negative.metrics().clone());
        let (naturals, handle) = non_negative.spawn(ints)?;
        chain.handles.push(("non_negative".into(), handle));

        let multiple_of_three = StageRunner::new(positive_multiple_of_three());
        chain.metrics.push(multiple_of_three.metrics().clone());
        let (filtered, handle) = multiple_of_three.spawn(naturals)?;
        chain.handles.push(("multiple_of_three".into(), handle));

        Ok((filtered, chain))
    }

    /// Get the metrics of each stage, in chain order
    pub fn metrics(&self) -> &[StageMetrics] {
        &self.metrics
    }

    /// Wait for every stage to finish
    pub fn join(self) -> Result<Vec<MetricsSnapshot>> {
        for (name, handle) in self.handles {
            join_task(&name, handle)?;
        }
        Ok(self.metrics.iter().map(StageMetrics::snapshot).collect())
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::from_config(PipelineConfig::default())
    }

    /// Create a builder starting from an existing configuration
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Set the ring buffer capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the reader's poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set how the reader waits between pops
    pub fn with_read_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.config.read_strategy = strategy;
        self
    }

    /// Set what the reader does once input has ended
    pub fn with_drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.config.drain_policy = drain;
        self
    }

    /// Validate the configuration and allocate the ring buffer
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        Ok(Pipeline {
            buffer: RingBuffer::new(self.config.capacity),
            config: self.config,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured pipeline: filters → writer → ring buffer → reader
pub struct Pipeline {
    config: PipelineConfig,
    buffer: RingBuffer<i64>,
}

impl Pipeline {
    /// Get the pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get a handle on the ring buffer between writer and reader
    pub fn buffer(&self) -> RingBuffer<i64> {
        self.buffer.clone()
    }

    fn launch(self, tokens: Receiver<String>) -> Result<(Receiver<i64>, RunningPipeline)> {
        let started = Instant::now();
        log::info!("pipeline begin: {:?}", self.config);

        let (filtered, filters) = FilterChain::spawn(tokens)?;

        let writer = Writer::new(self.buffer.clone());
        let writer_metrics = writer.metrics().clone();
        let (writer_done, writer_handle) = writer.spawn(filtered)?;

        let reader = Reader::new(self.buffer.clone(), self.config.poll_interval)
            .with_strategy(self.config.read_strategy)
            .with_drain_policy(self.config.drain_policy);
        let reader_metrics = reader.metrics().clone();
        let (output, reader_handle) = reader.spawn(writer_done)?;

        Ok((
            output,
            RunningPipeline {
                output: None,
                filters,
                writer: writer_handle,
                reader: reader_handle,
                writer_metrics,
                reader_metrics,
                buffer: self.buffer,
                started,
            },
        ))
    }

    /// Start every task over an existing token sequence
    pub fn start(self, tokens: Receiver<String>) -> Result<RunningPipeline> {
        let (output, mut running) = self.launch(tokens)?;
        running.output = Some(output);
        Ok(running)
    }

    /// Run the whole pipeline from `input` to `sink`
    ///
    /// Blocks until the sink has consumed the reader's last value and every
    /// task has finished.
    pub fn run<R, S>(self, input: R, sink: S) -> Result<PipelineReport>
    where
        R: BufRead + Send + 'static,
        S: Sink,
    {
        let (tokens, source) = spawn_line_source(input)?;
        let (output, running) = self.launch(tokens)?;
        let sink = spawn_sink(sink, output)?;

        let delivered = join_task("sink", sink)??;
        let mut report = running.wait()?;
        join_task("source", source)??;

        report.delivered = delivered;
        log::info!("pipeline end: {} value(s) delivered", delivered);
        Ok(report)
    }
}

/// A started pipeline
pub struct RunningPipeline {
    output: Option<Receiver<i64>>,
    filters: FilterChain,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    writer_metrics: StageMetrics,
    reader_metrics: StageMetrics,
    buffer: RingBuffer<i64>,
    started: Instant,
}

impl RunningPipeline {
    /// Take the reader's output sequence
    ///
    /// Must be taken and drained, otherwise [`RunningPipeline::wait`] drops
    /// it and the reader stops at its next forward.
    pub fn take_output(&mut self) -> Option<Receiver<i64>> {
        self.output.take()
    }

    /// Get the ring buffer between writer and reader
    pub fn buffer(&self) -> &RingBuffer<i64> {
        &self.buffer
    }

    /// Wait for every task to finish and summarize the run
    pub fn wait(mut self) -> Result<PipelineReport> {
        drop(self.output.take());

        let mut tasks = self.filters.join()?;
        join_task("writer", self.writer)?;
        join_task("reader", self.reader)?;
        tasks.push(self.writer_metrics.snapshot());
        tasks.push(self.reader_metrics.snapshot());

        Ok(PipelineReport {
            tasks,
            buffer: self.buffer.stats(),
            delivered: self.reader_metrics.total_emitted(),
            elapsed: self.started.elapsed(),
        })
    }
}
