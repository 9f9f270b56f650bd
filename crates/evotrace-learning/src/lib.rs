mod ab_engine;
mod bootstrap;
mod config;
mod error;
mod feedback;
mod learning_engine;
mod link_manager;
mod metrics_view;
mod optimizer;
mod stats_math;

pub use ab_engine::{AbEngine, Analysis, AnalysisOutcome, VariantStats};
pub use bootstrap::{BootstrapLoader, ImportSummary};
pub use config::{EvolutionCatalog, EvolutionConfig};
pub use error::{Error, Result};
pub use feedback::{FeedbackCollector, FeedbackInput, Severity};
pub use learning_engine::{LearningConfig, LearningEngine};
pub use link_manager::{LinkManager, RewardInput};
pub use metrics_view::{InMemoryMetricsView, Metric, MetricsView};
pub use optimizer::{Candidate, Optimizer};
