//! Talus: a raster-based landslide susceptibility estimator
//!
//! This library scores per-pixel landslide susceptibility from
//! co-registered raster layers (elevation, rainfall, and optional
//! vegetation-index and geology bands): layers are aligned onto the
//! elevation grid, terrain slope is derived, heuristic weak labels are
//! generated, a bagged decision-tree ensemble is trained over the valid
//! pixels, and the predicted probabilities are scattered back into a
//! full-grid surface ready for rendering.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    Grid, GridValue, MaskGrid, GeoTransform, LayerRole, PredictionRequest, RasterLayer,
    TalusError, TalusResult, ROLE_ORDER,
};

pub use io::RasterReader;

pub use core::{
    Aligner, CancelToken, FeatureMatrix, FeatureMatrixBuilder, ForestConfig, PipelineParams,
    ProbabilitySurface, ResamplingMethod, SlopeParams, SlopeProcessor, SurfaceStatistics,
    SusceptibilityForest, SusceptibilityPipeline, WeakLabelGenerator, WeakLabelParams,
};
