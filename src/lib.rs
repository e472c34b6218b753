//! A filtering stream pipeline decoupled by an overwrite-on-full ring buffer.
//!
//! Tokens flow through three filter stages, each on its own thread and
//! connected by rendezvous channels. A writer pushes the surviving integers
//! into a fixed-capacity [`RingBuffer`]; a reader pops from it on a fixed
//! interval and forwards values to a [`Sink`].
//!
//! ```text
//! source ─► parse ─► non_negative ─► multiple_of_three ─► writer
//!                                                          │ push
//!                                                     RingBuffer
//!                                                          │ pop (every poll interval)
//!                                              sink ◄─ reader
//! ```
//!
//! # Features
//!
//! - Lock-protected ring buffer that overwrites its oldest value when full
//! - Generic filter stages composed over crossbeam channels
//! - Polling or push-notified reader with a configurable drain policy
//! - Per-task metrics and a run report
//!
//! The buffer never blocks the writer. When the reader falls behind, the
//! oldest unread values are lost and the survivors keep their order.
//!
//! # Example
//!
//! ```no_run
//! use ring_pipeline::{CollectSink, PipelineBuilder};
//! use std::io::Cursor;
//! use std::time::Duration;
//!
//! let sink = CollectSink::new();
//! let report = PipelineBuilder::new()
//!     .with_capacity(3)
//!     .with_poll_interval(Duration::from_millis(10))
//!     .build()?
//!     .run(Cursor::new("3 6 -3 9 0 abc 12\nend\n"), sink.clone())?;
//!
//! println!("{:?}", sink.values());
//! println!("{}", report.format());
//! # Ok::<(), ring_pipeline::PipelineError>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod reader;
pub mod stage;
pub mod writer;

// Re-exports for convenience
pub use buffer::{BufferStats, RingBuffer};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use io::{CollectSink, ConsoleSink, Sink};
pub use metrics::{MetricsSnapshot, PipelineReport, StageMetrics};
pub use pipeline::{FilterChain, Pipeline, PipelineBuilder, RunningPipeline};
pub use reader::{DrainPolicy, ReadStrategy, Reader, ReaderState};
pub use stage::{FilterStage, Stage, StageRunner};
pub use writer::{Completion, CompletionHandle, Writer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
