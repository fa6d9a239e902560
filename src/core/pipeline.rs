use crate::core::align::{Aligner, ResamplingMethod};
use crate::core::features::FeatureMatrixBuilder;
use crate::core::forest::{ForestConfig, SusceptibilityForest};
use crate::core::label::{WeakLabelGenerator, WeakLabelParams};
use crate::core::surface::ProbabilitySurface;
use crate::core::terrain::{SlopeParams, SlopeProcessor};
use crate::types::{LayerRole, PredictionRequest, TalusError, TalusResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag checked between pipeline stages.
///
/// Callers keeping an event loop responsive run the pipeline on a
/// background thread and cancel through a clone of this token. Aborting
/// mid-training is not supported; the check is honored at stage
/// boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn checkpoint(&self) -> TalusResult<()> {
        if self.is_cancelled() {
            Err(TalusError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Configuration of a susceptibility run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Strategy used to bring layers onto the elevation grid
    pub resampling: ResamplingMethod,
    pub slope: SlopeParams,
    pub labels: WeakLabelParams,
    pub forest: ForestConfig,
}

/// End-to-end susceptibility scoring pipeline.
///
/// One blocking invocation per run: align layers, derive slope, generate
/// weak labels, assemble features, train the ensemble, score, and
/// reconstruct the probability surface. All intermediate state is
/// per-invocation; nothing is retained between runs.
pub struct SusceptibilityPipeline {
    params: PipelineParams,
}

impl SusceptibilityPipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    /// Pipeline with the standard configuration
    pub fn standard() -> Self {
        Self::new(PipelineParams::default())
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Run the full pipeline to completion
    pub fn run(&self, request: &PredictionRequest) -> TalusResult<ProbabilitySurface> {
        self.run_cancellable(request, &CancelToken::new())
    }

    /// Run the full pipeline, honoring the token between stages.
    ///
    /// A cancelled run aborts with a typed error and yields nothing; a
    /// raised error from any stage guarantees no partial surface.
    pub fn run_cancellable(
        &self,
        request: &PredictionRequest,
        token: &CancelToken,
    ) -> TalusResult<ProbabilitySurface> {
        log::info!("Starting susceptibility run");

        let elevation = request.require(LayerRole::Elevation)?;
        request.require(LayerRole::Rainfall)?;
        let reference_shape = elevation.shape();
        log::debug!("Reference shape: {:?}", reference_shape);

        // Stage 1: alignment
        token.checkpoint()?;
        let aligner = Aligner::new(self.params.resampling);
        let mut aligned = PredictionRequest::new();
        for role in request.present_roles() {
            let layer = request.require(role)?;
            aligned.insert(aligner.align(layer, reference_shape)?);
        }
        let elevation = aligned.require(LayerRole::Elevation)?;
        let rainfall = aligned.require(LayerRole::Rainfall)?;

        // Stage 2: combined validity mask
        token.checkpoint()?;
        let mask = FeatureMatrixBuilder::combined_mask(&aligned)?;

        // Stage 3: terrain derivative
        token.checkpoint()?;
        let slope_deg = SlopeProcessor::new(self.params.slope.clone())
            .compute_slope(elevation.data(), elevation.mask())?;

        // Stage 4: weak labels
        token.checkpoint()?;
        let labels = WeakLabelGenerator::new(self.params.labels.clone()).generate(
            &slope_deg,
            rainfall.data(),
            rainfall.mask(),
            aligned.get(LayerRole::VegetationIndex).map(|l| l.data()),
        )?;

        // Stage 5: feature assembly
        token.checkpoint()?;
        let (features, label_vector) =
            FeatureMatrixBuilder::build(&aligned, &slope_deg, &mask, &labels)?;

        // Stage 6: ensemble training (last checkpoint before the blocking fit)
        token.checkpoint()?;
        let forest =
            SusceptibilityForest::fit(features.data(), &label_vector, self.params.forest.clone())?;

        // Stage 7: scoring and reconstruction
        token.checkpoint()?;
        let probabilities = forest.predict_proba(features.data())?;
        let surface =
            ProbabilitySurface::reconstruct(reference_shape, features.pixel_index(), &probabilities)?;

        log::info!("Susceptibility run completed");
        Ok(surface)
    }
}
