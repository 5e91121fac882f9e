pub mod config;
pub mod data;
pub mod evaluation;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod seed;
pub mod validation;
pub mod walkforward;

// Re-export commonly used types
pub use config::{ConfigError, PipelineConfig};
pub use data::{MobilityIndicator, Panel, PanelLoader, PanelRecord};
pub use evaluation::{ComparisonRow, ComparisonTable, Evaluator, JobStatus};
pub use features::{FeatureBuildReport, FeatureBuilder, FeatureRow, FeatureSet};
pub use metrics::{MetricsCalculator, RegressionMetrics, SelectionMetric};
pub use models::{HyperParams, ModelFamily, Regressor, TrainedModel};
pub use pipeline::{Pipeline, PipelineError, PipelineResult};
pub use seed::SeedSequence;
pub use validation::DataIntegrityValidator;
pub use walkforward::{GridSearch, SplitConfig, SplitPlan, TemporalSplitter};
