use crate::types::{Grid, TalusError, TalusResult};
use serde::{Deserialize, Serialize};

/// Summary statistics of a probability surface, computed over the valid
/// pixels only; suitable for a status display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceStatistics {
    /// Number of pixels inside the combined validity mask
    pub valid_pixels: usize,
    pub min_probability: f32,
    pub max_probability: f32,
    pub mean_probability: f32,
    /// Fraction of valid pixels with probability above 0.5
    pub high_risk_fraction: f32,
}

/// Full-grid landslide susceptibility probabilities.
///
/// Values lie in [0, 1] at mask-valid pixels and are exactly 0.0
/// everywhere else, so the grid can be handed directly to a numeric
/// rendering collaborator.
#[derive(Debug, Clone)]
pub struct ProbabilitySurface {
    grid: Grid,
    statistics: SurfaceStatistics,
}

impl ProbabilitySurface {
    /// Scatter per-row probabilities back onto a zero-filled grid through
    /// the recorded row-to-pixel mapping
    pub fn reconstruct(
        shape: (usize, usize),
        pixel_index: &[(usize, usize)],
        probabilities: &[f32],
    ) -> TalusResult<Self> {
        if pixel_index.len() != probabilities.len() {
            return Err(TalusError::Processing(format!(
                "{} probabilities for {} indexed pixels",
                probabilities.len(),
                pixel_index.len()
            )));
        }

        let mut grid = Grid::zeros(shape);
        let (rows, cols) = shape;

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut high_risk = 0usize;

        for (&(i, j), &p) in pixel_index.iter().zip(probabilities.iter()) {
            if i >= rows || j >= cols {
                return Err(TalusError::Processing(format!(
                    "pixel index ({}, {}) outside output shape {:?}",
                    i, j, shape
                )));
            }
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(TalusError::Numeric(format!(
                    "probability {} at pixel ({}, {}) outside [0, 1]",
                    p, i, j
                )));
            }
            grid[[i, j]] = p;
            min = min.min(p);
            max = max.max(p);
            sum += p as f64;
            if p > 0.5 {
                high_risk += 1;
            }
        }

        let valid_pixels = pixel_index.len();
        let statistics = if valid_pixels == 0 {
            SurfaceStatistics {
                valid_pixels: 0,
                min_probability: 0.0,
                max_probability: 0.0,
                mean_probability: 0.0,
                high_risk_fraction: 0.0,
            }
        } else {
            SurfaceStatistics {
                valid_pixels,
                min_probability: min,
                max_probability: max,
                mean_probability: (sum / valid_pixels as f64) as f32,
                high_risk_fraction: high_risk as f32 / valid_pixels as f32,
            }
        };

        log::info!(
            "Reconstructed probability surface {:?}: {} valid pixels, mean {:.4}, max {:.4}",
            shape,
            statistics.valid_pixels,
            statistics.mean_probability,
            statistics.max_probability
        );

        Ok(Self { grid, statistics })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn into_grid(self) -> Grid {
        self.grid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.grid.dim()
    }

    pub fn statistics(&self) -> &SurfaceStatistics {
        &self.statistics
    }
}
