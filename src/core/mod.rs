//! Core susceptibility processing modules

pub mod align;
pub mod terrain;
pub mod label;
pub mod features;
pub mod forest;
pub mod surface;
pub mod pipeline;

// Re-export main types
pub use align::{Aligner, ResamplingMethod};
pub use terrain::{SlopeProcessor, SlopeParams};
pub use label::{WeakLabelGenerator, WeakLabelParams};
pub use features::{FeatureMatrix, FeatureMatrixBuilder};
pub use forest::{SusceptibilityForest, ForestConfig};
pub use surface::{ProbabilitySurface, SurfaceStatistics};
pub use pipeline::{SusceptibilityPipeline, PipelineParams, CancelToken};
