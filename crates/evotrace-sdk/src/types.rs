//! Re-exports of the domain types host applications construct and receive
//! back from [`crate::Client`], so most callers need only `use evotrace_sdk::*`
//! or `use evotrace_sdk::types::*`.

pub use evotrace_engine::{SpanHandle, StartSpanParams};
pub use evotrace_learning::{
    Analysis, AnalysisOutcome, Candidate, EvolutionCatalog, EvolutionConfig, FeedbackInput, ImportSummary, Metric as LearningMetric,
    MetricsView, Optimizer, Severity, VariantStats,
};
pub use evotrace_store::SkillRecommendation;
pub use evotrace_types::{
    AbExperiment, Adaptation, AdaptationType, Assignment, Attributes, Complexity, EvolutionStats, Execution, ExecutionId, ExecutionStatus,
    ExperimentId, ExperimentStatus, FeedbackType, Metric, Pattern, PatternId, PatternType, Reward, Span, SpanEvent, SpanId, SpanKind, SpanLink,
    SpanStatus, StatusCode, Task, TaskId, TaskStatus,
};
