//! The canonical Q∞ data path: forward {compress → encrypt → index →
//! audit → store}, inverse {retrieve → verify → decrypt → decompress}.
//!
//! The executor threads each step's output into the next, validates the
//! input/output hash linkage between adjacent steps, records a ledger
//! summary per pipeline, and keeps an execution trace the replay
//! comparator re-runs and diffs within tolerance.

pub mod error;
pub mod executor;
pub mod replay;
pub mod runner;
pub mod step;
pub mod trace;

pub use error::{PipelineError, PipelineResult};
pub use executor::{PipelineExecutor, PipelineRun};
pub use replay::{ReplayComparator, ReplayConfig, ReplayReport, ReplaySeverity};
pub use runner::SandboxStepRunner;
pub use step::{StepContext, StepKind, StepOutput, StepRecord, StepRunner, StepStatus};
pub use trace::{ExecutionTrace, TraceStep, TraceStore};
