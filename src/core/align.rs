use crate::types::{Grid, MaskGrid, RasterLayer, TalusError, TalusResult};
use serde::{Deserialize, Serialize};

/// Resampling strategy used to bring a layer onto the reference grid.
///
/// The contract is "preserve the spatial meaning of the reference grid";
/// reinterpreting a buffer under a different shape is never acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResamplingMethod {
    /// Nearest-neighbor sampling, appropriate for categorical layers
    Nearest,
    /// Bilinear interpolation, appropriate for continuous layers
    Bilinear,
}

impl Default for ResamplingMethod {
    fn default() -> Self {
        ResamplingMethod::Bilinear
    }
}

/// Brings raster layers onto a common reference shape
pub struct Aligner {
    method: ResamplingMethod,
}

impl Aligner {
    pub fn new(method: ResamplingMethod) -> Self {
        Self { method }
    }

    /// Aligner with the default bilinear strategy
    pub fn standard() -> Self {
        Self::new(ResamplingMethod::default())
    }

    pub fn method(&self) -> ResamplingMethod {
        self.method
    }

    /// Align one layer to the reference shape.
    ///
    /// A layer that already matches the reference shape is returned
    /// unchanged. Otherwise both data and mask are resampled onto the
    /// reference grid; the mask always by nearest neighbor, the data by
    /// the configured strategy.
    pub fn align(
        &self,
        layer: &RasterLayer,
        reference_shape: (usize, usize),
    ) -> TalusResult<RasterLayer> {
        if layer.shape() == reference_shape {
            return Ok(layer.clone());
        }

        let (ref_rows, ref_cols) = reference_shape;
        let (src_rows, src_cols) = layer.shape();
        if ref_rows == 0 || ref_cols == 0 || src_rows == 0 || src_cols == 0 {
            return Err(TalusError::ShapeMismatch(format!(
                "{} layer: cannot resample {:?} to {:?}",
                layer.role(),
                layer.shape(),
                reference_shape
            )));
        }

        log::info!(
            "Resampling {} layer from {:?} to {:?} ({:?})",
            layer.role(),
            layer.shape(),
            reference_shape,
            self.method
        );

        let row_scale = src_rows as f64 / ref_rows as f64;
        let col_scale = src_cols as f64 / ref_cols as f64;

        let mut data = Grid::zeros(reference_shape);
        let mut mask = MaskGrid::from_elem(reference_shape, false);

        for i in 0..ref_rows {
            for j in 0..ref_cols {
                // Map the target pixel center into fractional source coordinates
                let src_r = ((i as f64 + 0.5) * row_scale - 0.5).clamp(0.0, (src_rows - 1) as f64);
                let src_c = ((j as f64 + 0.5) * col_scale - 0.5).clamp(0.0, (src_cols - 1) as f64);

                let nearest = [
                    src_r.round() as usize,
                    src_c.round() as usize,
                ];
                let nearest = [nearest[0].min(src_rows - 1), nearest[1].min(src_cols - 1)];

                let (value, valid) = match self.method {
                    ResamplingMethod::Nearest => (
                        layer.data()[[nearest[0], nearest[1]]],
                        layer.mask()[[nearest[0], nearest[1]]],
                    ),
                    ResamplingMethod::Bilinear => {
                        Self::sample_bilinear(layer, src_r, src_c, nearest)
                    }
                };

                data[[i, j]] = value;
                mask[[i, j]] = valid;
            }
        }

        let mut aligned = RasterLayer::new(layer.role(), data, mask)?;
        if let Some(gt) = layer.geo_transform() {
            aligned = aligned.with_geo_transform(gt.clone());
        }
        Ok(aligned)
    }

    /// Bilinear sample at fractional source coordinates.
    ///
    /// Falls back to the nearest source pixel when any of the four support
    /// pixels is invalid, so invalid measurements never bleed into the
    /// interpolated value.
    fn sample_bilinear(
        layer: &RasterLayer,
        src_r: f64,
        src_c: f64,
        nearest: [usize; 2],
    ) -> (f32, bool) {
        let (src_rows, src_cols) = layer.shape();

        let r0 = src_r.floor() as usize;
        let c0 = src_c.floor() as usize;
        let r1 = (r0 + 1).min(src_rows - 1);
        let c1 = (c0 + 1).min(src_cols - 1);

        let support_valid = layer.mask()[[r0, c0]]
            && layer.mask()[[r0, c1]]
            && layer.mask()[[r1, c0]]
            && layer.mask()[[r1, c1]];

        if !support_valid {
            return (
                layer.data()[[nearest[0], nearest[1]]],
                layer.mask()[[nearest[0], nearest[1]]],
            );
        }

        let dr = src_r - r0 as f64;
        let dc = src_c - c0 as f64;

        let v00 = layer.data()[[r0, c0]] as f64;
        let v01 = layer.data()[[r0, c1]] as f64;
        let v10 = layer.data()[[r1, c0]] as f64;
        let v11 = layer.data()[[r1, c1]] as f64;

        let interpolated = v00 * (1.0 - dr) * (1.0 - dc)
            + v01 * (1.0 - dr) * dc
            + v10 * dr * (1.0 - dc)
            + v11 * dr * dc;

        (interpolated as f32, true)
    }
}
