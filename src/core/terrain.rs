use crate::types::{Grid, MaskGrid, TalusError, TalusResult};
use serde::{Deserialize, Serialize};

/// Parameters for slope derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlopeParams {
    /// Grid spacing in the row direction
    pub row_spacing: f64,
    /// Grid spacing in the column direction
    pub col_spacing: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        // Index-space differentiation; the heuristic thresholds downstream
        // are calibrated against it
        Self {
            row_spacing: 1.0,
            col_spacing: 1.0,
        }
    }
}

/// Derives slope magnitude from an elevation raster
pub struct SlopeProcessor {
    params: SlopeParams,
}

impl SlopeProcessor {
    pub fn new(params: SlopeParams) -> Self {
        Self { params }
    }

    /// Processor with unit grid spacing
    pub fn standard() -> Self {
        Self::new(SlopeParams::default())
    }

    /// Compute slope in degrees from elevation.
    ///
    /// Masked elevation cells are substituted with 0.0 before
    /// differencing so the gradient stays defined everywhere; their slope
    /// values are discarded downstream via the validity mask. Gradients
    /// use central differences in the interior and one-sided differences
    /// at the edges. Output values lie in [0, 90).
    pub fn compute_slope(&self, elevation: &Grid, mask: &MaskGrid) -> TalusResult<Grid> {
        if elevation.dim() != mask.dim() {
            return Err(TalusError::ShapeMismatch(format!(
                "elevation shape {:?} does not match mask shape {:?}",
                elevation.dim(),
                mask.dim()
            )));
        }

        let (rows, cols) = elevation.dim();
        if rows == 0 || cols == 0 {
            return Err(TalusError::Processing(
                "cannot compute slope of an empty elevation grid".to_string(),
            ));
        }

        log::debug!("Computing slope over {}x{} elevation grid", rows, cols);

        let filled = Grid::from_shape_fn((rows, cols), |(i, j)| {
            if mask[[i, j]] {
                elevation[[i, j]]
            } else {
                0.0
            }
        });

        let d_row = self.params.row_spacing as f32;
        let d_col = self.params.col_spacing as f32;

        let mut slope = Grid::zeros((rows, cols));
        for i in 0..rows {
            for j in 0..cols {
                let g_row = Self::gradient_1d(&filled, i, j, rows, true, d_row);
                let g_col = Self::gradient_1d(&filled, i, j, cols, false, d_col);
                let magnitude = (g_row * g_row + g_col * g_col).sqrt();
                slope[[i, j]] = magnitude.atan().to_degrees();
            }
        }

        Ok(slope)
    }

    /// One-axis finite difference: central in the interior, one-sided at
    /// the edges, zero along degenerate (length-1) axes
    fn gradient_1d(
        grid: &Grid,
        i: usize,
        j: usize,
        axis_len: usize,
        along_rows: bool,
        spacing: f32,
    ) -> f32 {
        if axis_len < 2 {
            return 0.0;
        }

        let at = |k: usize| {
            if along_rows {
                grid[[k, j]]
            } else {
                grid[[i, k]]
            }
        };
        let pos = if along_rows { i } else { j };

        if pos == 0 {
            (at(1) - at(0)) / spacing
        } else if pos == axis_len - 1 {
            (at(axis_len - 1) - at(axis_len - 2)) / spacing
        } else {
            (at(pos + 1) - at(pos - 1)) / (2.0 * spacing)
        }
    }
}
