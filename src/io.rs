//! Input and output adapters at the two ends of the pipeline.

use crate::error::{PipelineError, Result};
use crossbeam::channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A line consisting of exactly this text ends the input
pub const END_MARKER: &str = "end";

/// Read whitespace-separated tokens line by line on a dedicated thread
///
/// The token sequence closes at end of input or at a line equal to
/// [`END_MARKER`], whichever comes first. Input is read as raw bytes and
/// bytes that are not valid UTF-8 are replaced, so a malformed token reaches
/// the parse stage and is dropped there. A read error closes the sequence
/// and is returned from the join handle.
pub fn spawn_line_source<R>(mut input: R) -> Result<(Receiver<String>, JoinHandle<Result<()>>)>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = bounded(0);
    let name = String::from("source");
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || -> Result<()> {
            log::info!("source begin");
            let mut line = Vec::new();
            loop {
                line.clear();
                if input.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                let text = strip_line_ending(&line);
                if text == END_MARKER.as_bytes() {
                    break;
                }
                for raw in text.split(u8::is_ascii_whitespace).filter(|t| !t.is_empty()) {
                    let token = String::from_utf8_lossy(raw).into_owned();
                    log::debug!("source token {token:?}");
                    if tx.send(token).is_err() {
                        log::warn!("source: pipeline closed early");
                        return Ok(());
                    }
                }
            }
            log::info!("source end");
            Ok(())
        })
        .map_err(|source| PipelineError::Spawn { name, source })?;
    Ok((rx, handle))
}

/// Drop a trailing `\n` or `\r\n`
fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Consumer at the end of the pipeline
pub trait Sink: Send + 'static {
    /// Surface one value
    fn consume(&mut self, value: i64) -> Result<()>;

    /// Called once after the value sequence closes
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one value per line
pub struct ConsoleSink<W: Write + Send + 'static> {
    out: W,
}

impl<W: Write + Send + 'static> ConsoleSink<W> {
    /// Create a sink writing to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Get the underlying writer back
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleSink<std::io::Stdout> {
    /// Create a sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> Sink for ConsoleSink<W> {
    fn consume(&mut self, value: i64) -> Result<()> {
        writeln!(self.out, "{value}")?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Collects values in memory; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    values: Arc<Mutex<Vec<i64>>>,
}

impl CollectSink {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the values collected so far
    pub fn values(&self) -> Vec<i64> {
        self.values.lock().clone()
    }
}

impl Sink for CollectSink {
    fn consume(&mut self, value: i64) -> Result<()> {
        self.values.lock().push(value);
        Ok(())
    }
}

/// Feed every value into `sink` on a dedicated thread
///
/// The join handle yields the number of values consumed once `values`
/// closes. This is the pipeline's completion signal.
pub fn spawn_sink<S: Sink>(mut sink: S, values: Receiver<i64>) -> Result<JoinHandle<Result<u64>>> {
    let name = String::from("sink");
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || -> Result<u64> {
            log::info!("sink begin");
            let mut count = 0u64;
            for value in values.iter() {
                log::debug!("sink received {value}");
                sink.consume(value)?;
                count += 1;
            }
            sink.finish()?;
            log::info!("sink end: {count} value(s)");
            Ok(count)
        })
        .map_err(|source| PipelineError::Spawn { name, source })
}
