use crate::types::{Grid, MaskGrid, TalusError, TalusResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Thresholds of the weak-label heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakLabelParams {
    /// Minimum slope for landslide-prone conditions (degrees)
    pub slope_threshold_deg: f32,
    /// Rainfall percentile a pixel must exceed (0-100)
    pub rainfall_percentile: f64,
    /// Maximum vegetation index, applied only when that layer is present
    pub vegetation_threshold: f32,
}

impl Default for WeakLabelParams {
    fn default() -> Self {
        Self {
            slope_threshold_deg: 30.0,
            rainfall_percentile: 80.0,
            vegetation_threshold: 0.3,
        }
    }
}

/// Derives binary training labels from a fixed threshold heuristic
pub struct WeakLabelGenerator {
    params: WeakLabelParams,
}

impl WeakLabelGenerator {
    pub fn new(params: WeakLabelParams) -> Self {
        Self { params }
    }

    /// Generator with the standard thresholds
    pub fn standard() -> Self {
        Self::new(WeakLabelParams::default())
    }

    /// Generate a full-grid label raster (1 = landslide-prone conditions).
    ///
    /// A pixel is labelled 1 iff every present condition holds, combined
    /// as one conjunction: slope above threshold, rainfall above the
    /// percentile of valid rainfall, and (when a vegetation layer is
    /// supplied) vegetation index below threshold. Labels at invalid
    /// pixels are still computed but carry no meaning; the feature
    /// builder samples labels through the combined mask only.
    pub fn generate(
        &self,
        slope_deg: &Grid,
        rainfall: &Grid,
        rainfall_mask: &MaskGrid,
        vegetation: Option<&Grid>,
    ) -> TalusResult<Array2<u8>> {
        let shape = slope_deg.dim();
        if rainfall.dim() != shape {
            return Err(TalusError::ShapeMismatch(format!(
                "rainfall shape {:?} does not match slope shape {:?}",
                rainfall.dim(),
                shape
            )));
        }
        if let Some(veg) = vegetation {
            if veg.dim() != shape {
                return Err(TalusError::ShapeMismatch(format!(
                    "vegetation shape {:?} does not match slope shape {:?}",
                    veg.dim(),
                    shape
                )));
            }
        }

        let rain_threshold = self.rainfall_threshold(rainfall, rainfall_mask)?;
        log::info!(
            "Weak labels: slope > {}, rainfall > {:.3} (P{}), vegetation {}",
            self.params.slope_threshold_deg,
            rain_threshold,
            self.params.rainfall_percentile,
            if vegetation.is_some() {
                format!("< {}", self.params.vegetation_threshold)
            } else {
                "absent".to_string()
            }
        );

        let labels = Array2::from_shape_fn(shape, |(i, j)| {
            let prone = slope_deg[[i, j]] > self.params.slope_threshold_deg
                && rainfall[[i, j]] > rain_threshold
                && vegetation.map_or(true, |veg| veg[[i, j]] < self.params.vegetation_threshold);
            u8::from(prone)
        });

        let positives: usize = labels.iter().map(|&l| l as usize).sum();
        log::debug!("Weak labels: {} positive pixels", positives);

        Ok(labels)
    }

    /// Rainfall threshold: the configured percentile computed over valid
    /// rainfall pixels only, so sentinel-filled nodata cells cannot bias it
    pub fn rainfall_threshold(&self, rainfall: &Grid, mask: &MaskGrid) -> TalusResult<f32> {
        if rainfall.dim() != mask.dim() {
            return Err(TalusError::ShapeMismatch(format!(
                "rainfall shape {:?} does not match mask shape {:?}",
                rainfall.dim(),
                mask.dim()
            )));
        }

        let valid: Vec<f32> = rainfall
            .iter()
            .zip(mask.iter())
            .filter(|(_, &m)| m)
            .map(|(&v, _)| v)
            .collect();

        if valid.is_empty() {
            return Err(TalusError::Numeric(
                "rainfall layer has no valid pixels to estimate the percentile from".to_string(),
            ));
        }

        Ok(percentile(&valid, self.params.rainfall_percentile))
    }
}

/// Percentile with linear interpolation between order statistics
pub fn percentile(values: &[f32], pct: f64) -> f32 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = (rank - lower as f64) as f32;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
