//! Core data model for the evotrace telemetry and learning engine.
//!
//! This crate has no I/O of its own — it only defines the types every other
//! evotrace crate exchanges: tasks, executions, spans, rewards, patterns,
//! adaptations, rollup stats, and A/B experiment records.

mod ab;
mod adaptation;
mod error;
mod execution;
mod ids;
mod pattern;
mod reward;
mod span;
mod stats;
mod task;

pub use ab::{AbExperiment, Assignment, ExperimentStatus, Metric};
pub use adaptation::{Adaptation, AdaptationType};
pub use error::{Error, Result};
pub use execution::{Execution, ExecutionStatus};
pub use ids::{AdaptationId, ExecutionId, ExperimentId, PatternId, RewardId, SpanId, TaskId, TraceId};
pub use pattern::{Complexity, Pattern, PatternData, PatternEvidence, PatternType};
pub use reward::{FeedbackType, Reward};
pub use span::{Attributes, Resource, Span, SpanEvent, SpanKind, SpanLink, SpanStatus, StatusCode};
pub use stats::{EvolutionStats, PeriodType, SkillPerformanceCache, SkillSummary};
pub use task::{Task, TaskStatus};
