use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::marker::PhantomData;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Trait for a processing stage in the pipeline
pub trait Stage: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Map one input to at most one output; `None` drops the input
    fn process(&mut self, input: Self::Input) -> Option<Self::Output>;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// A stage that maps each input and keeps it only if the mapping succeeds
pub struct FilterStage<A, B, F>
where
    F: FnMut(A) -> Option<B> + Send + 'static,
{
    name: String,
    filter: F,
    _types: PhantomData<fn(A) -> B>,
}

impl<A, B, F> FilterStage<A, B, F>
where
    F: FnMut(A) -> Option<B> + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, filter: F) -> Self {
        Self {
            name: name.into(),
            filter,
            _types: PhantomData,
        }
    }
}

impl<A, B, F> Stage for FilterStage<A, B, F>
where
    A: Send + 'static,
    B: Send + 'static,
    F: FnMut(A) -> Option<B> + Send + 'static,
{
    type Input = A;
    type Output = B;

    fn process(&mut self, input: A) -> Option<B> {
        (self.filter)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parses tokens as integers, dropping anything that doesn't parse
pub fn parse_integers() -> impl Stage<Input = String, Output = i64> {
    FilterStage::new("parse", |token: String| token.parse::<i64>().ok())
}

/// Keeps integers that are zero or greater
pub fn non_negative() -> impl Stage<Input = i64, Output = i64> {
    FilterStage::new("non_negative", |n: i64| (n >= 0).then_some(n))
}

/// Keeps positive multiples of three
///
/// This subsumes [`non_negative`]; both stay in the chain so each condition
/// remains a separately composable stage.
pub fn positive_multiple_of_three() -> impl Stage<Input = i64, Output = i64> {
    FilterStage::new("multiple_of_three", |n: i64| (n > 0 && n % 3 == 0).then_some(n))
}

/// Runs a stage on its own thread between two sequences
pub struct StageRunner<S: Stage> {
    stage: S,
    metrics: StageMetrics,
}

impl<S: Stage> StageRunner<S> {
    /// Create a new stage runner
    pub fn new(stage: S) -> Self {
        let metrics = StageMetrics::new(stage.name());
        Self { stage, metrics }
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Process `input` until it closes, forwarding kept values to `output`
    ///
    /// Returns early if every receiver of `output` has hung up. The output
    /// sequence closes when this returns and `output` is dropped.
    pub fn run(mut self, input: Receiver<S::Input>, output: Sender<S::Output>) {
        let name = self.metrics.name().to_owned();
        log::info!("stage {name} begin");

        for item in input.iter() {
            self.metrics.record_received();
            let start = Instant::now();
            let kept = self.stage.process(item);
            self.metrics.record_latency(start.elapsed());

            match kept {
                Some(value) => {
                    log::debug!("stage {name} kept value");
                    if output.send(value).is_err() {
                        log::warn!("stage {name}: downstream closed early");
                        break;
                    }
                    self.metrics.record_emitted();
                }
                None => {
                    log::debug!("stage {name} dropped value");
                    self.metrics.record_rejected();
                }
            }
        }

        log::info!("stage {name} end");
    }

    /// Spawn the stage on a named thread, returning its output sequence
    pub fn spawn(self, input: Receiver<S::Input>) -> Result<(Receiver<S::Output>, JoinHandle<()>)> {
        let (tx, rx) = bounded(0);
        let name = format!("stage-{}", self.metrics.name());
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(input, tx))
            .map_err(|source| PipelineError::Spawn { name, source })?;
        Ok((rx, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage() {
        let mut stage = parse_integers();
        assert_eq!(stage.process("42".into()), Some(42));
        assert_eq!(stage.process("-7".into()), Some(-7));
        assert_eq!(stage.process("+3".into()), Some(3));
        assert_eq!(stage.process("abc".into()), None);
        assert_eq!(stage.process("".into()), None);
        assert_eq!(stage.process("1.5".into()), None);
        assert_eq!(stage.name(), "parse");
    }

    #[test]
    fn test_non_negative_stage() {
        let mut stage = non_negative();
        assert_eq!(stage.process(0), Some(0));
        assert_eq!(stage.process(5), Some(5));
        assert_eq!(stage.process(-1), None);
    }

    #[test]
    fn test_multiple_of_three_stage() {
        let mut stage = positive_multiple_of_three();
        assert_eq!(stage.process(9), Some(9));
        assert_eq!(stage.process(0), None);
        assert_eq!(stage.process(4), None);
        assert_eq!(stage.process(-3), None);
    }

    #[test]
    fn test_custom_filter_stage() {
        let mut seen = 0;
        let mut stage = FilterStage::new("count", move |s: &'static str| {
            seen += 1;
            Some((s, seen))
        });
        assert_eq!(stage.process("a"), Some(("a", 1)));
        assert_eq!(stage.process("b"), Some(("b", 2)));
        assert_eq!(stage.name(), "count");
    }

    #[test]
    fn test_stage_runner_closes_with_input() {
        let (tx, rx) = bounded(0);
        let runner = StageRunner::new(non_negative());
        let metrics = runner.metrics().clone();
        let (out, handle) = runner.spawn(rx).unwrap();

        let feeder = thread::spawn(move || {
            for n in [3, -1, 0, -8, 4] {
                tx.send(n).unwrap();
            }
        });

        let collected: Vec<i64> = out.iter().collect();
        feeder.join().unwrap();
        handle.join().unwrap();

        assert_eq!(collected, vec![3, 0, 4]);
        assert_eq!(metrics.total_received(), 5);
        assert_eq!(metrics.total_emitted(), 3);
        assert_eq!(metrics.total_rejected(), 2);
    }

    #[test]
    fn test_stage_runner_stops_when_downstream_hangs_up() {
        let (tx, rx) = bounded(0);
        let (out, handle) = StageRunner::new(non_negative()).spawn(rx).unwrap();
        drop(out);

        // the runner exits on its first send, after which input is disconnected
        let mut sent = 0;
        while tx.send(1).is_ok() {
            sent += 1;
        }
        handle.join().unwrap();
        assert!(sent >= 1);
    }
}
