use crate::types::{Grid, MaskGrid, PredictionRequest, TalusError, TalusResult};
use ndarray::Array2;

/// Per-pixel feature rows for valid pixels, with the row-to-pixel mapping
/// needed to scatter predictions back onto the grid
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    data: Array2<f32>,
    pixel_index: Vec<(usize, usize)>,
    column_names: Vec<&'static str>,
}

impl FeatureMatrix {
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// Row-major pixel coordinates; row i of the matrix describes
    /// `pixel_index()[i]`
    pub fn pixel_index(&self) -> &[(usize, usize)] {
        &self.pixel_index
    }

    pub fn column_names(&self) -> &[&'static str] {
        &self.column_names
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

/// Assembles feature rows and labels over the combined validity mask
pub struct FeatureMatrixBuilder;

impl FeatureMatrixBuilder {
    /// Logical AND of every present layer's validity mask.
    ///
    /// Recomputed per run; layer masks themselves are never mutated. All
    /// layers must already be aligned to one shape.
    pub fn combined_mask(request: &PredictionRequest) -> TalusResult<MaskGrid> {
        let elevation = request.require(crate::types::LayerRole::Elevation)?;
        let shape = elevation.shape();

        let mut combined = MaskGrid::from_elem(shape, true);
        for role in request.present_roles() {
            let layer = request.require(role)?;
            if layer.shape() != shape {
                return Err(TalusError::ShapeMismatch(format!(
                    "{} layer shape {:?} does not match reference shape {:?}",
                    role,
                    layer.shape(),
                    shape
                )));
            }
            for (c, &m) in combined.iter_mut().zip(layer.mask().iter()) {
                *c = *c && m;
            }
        }
        Ok(combined)
    }

    /// Gather one feature row and one label per true mask cell, walking
    /// the grid in row-major order.
    ///
    /// Columns follow the canonical order `[elevation, slope_deg,
    /// rainfall, vegetation_index?, geology?]`; optional columns appear
    /// only when their layer was supplied. Any non-finite feature value
    /// indicates an upstream masking bug and is surfaced as a numeric
    /// error rather than silently downgraded.
    pub fn build(
        request: &PredictionRequest,
        slope_deg: &Grid,
        mask: &MaskGrid,
        labels: &Array2<u8>,
    ) -> TalusResult<(FeatureMatrix, Vec<u8>)> {
        use crate::types::LayerRole::*;

        let elevation = request.require(Elevation)?;
        let rainfall = request.require(Rainfall)?;
        let vegetation = request.get(VegetationIndex);
        let geology = request.get(Geology);

        let shape = elevation.shape();
        for (name, dim) in [
            ("slope", slope_deg.dim()),
            ("mask", mask.dim()),
            ("labels", labels.dim()),
        ] {
            if dim != shape {
                return Err(TalusError::ShapeMismatch(format!(
                    "{} shape {:?} does not match reference shape {:?}",
                    name, dim, shape
                )));
            }
        }

        let mut column_names = vec!["elevation", "slope_deg", "rainfall"];
        if vegetation.is_some() {
            column_names.push("vegetation_index");
        }
        if geology.is_some() {
            column_names.push("geology");
        }
        let n_features = column_names.len();

        let n_rows = mask.iter().filter(|&&m| m).count();
        log::info!(
            "Assembling feature matrix: {} rows x {} columns",
            n_rows,
            n_features
        );

        let mut data = Array2::<f32>::zeros((n_rows, n_features));
        let mut pixel_index = Vec::with_capacity(n_rows);
        let mut label_vector = Vec::with_capacity(n_rows);

        let mut row = 0;
        for ((i, j), &valid) in mask.indexed_iter() {
            if !valid {
                continue;
            }
            data[[row, 0]] = elevation.data()[[i, j]];
            data[[row, 1]] = slope_deg[[i, j]];
            data[[row, 2]] = rainfall.data()[[i, j]];
            let mut col = 3;
            if let Some(veg) = vegetation {
                data[[row, col]] = veg.data()[[i, j]];
                col += 1;
            }
            if let Some(geol) = geology {
                data[[row, col]] = geol.data()[[i, j]];
            }
            pixel_index.push((i, j));
            label_vector.push(labels[[i, j]]);
            row += 1;
        }
        debug_assert_eq!(row, n_rows);

        Self::check_finite(&data, &column_names, &pixel_index)?;

        Ok((
            FeatureMatrix {
                data,
                pixel_index,
                column_names,
            },
            label_vector,
        ))
    }

    fn check_finite(
        data: &Array2<f32>,
        column_names: &[&'static str],
        pixel_index: &[(usize, usize)],
    ) -> TalusResult<()> {
        for ((row, col), &v) in data.indexed_iter() {
            if !v.is_finite() {
                return Err(TalusError::Numeric(format!(
                    "non-finite {} value {} at pixel {:?}",
                    column_names[col], v, pixel_index[row]
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayerRole, RasterLayer};
    use ndarray::arr2;

    fn request_with(veg: bool, geol: bool) -> PredictionRequest {
        let mut request = PredictionRequest::new();
        request.insert(RasterLayer::fully_valid(
            LayerRole::Elevation,
            Grid::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as f32),
        ));
        request.insert(RasterLayer::fully_valid(
            LayerRole::Rainfall,
            Grid::from_elem((2, 3), 7.0),
        ));
        if veg {
            request.insert(RasterLayer::fully_valid(
                LayerRole::VegetationIndex,
                Grid::from_elem((2, 3), 0.2),
            ));
        }
        if geol {
            request.insert(RasterLayer::fully_valid(
                LayerRole::Geology,
                Grid::from_elem((2, 3), 3.0),
            ));
        }
        request
    }

    #[test]
    fn test_row_count_matches_mask_count() {
        let request = request_with(false, false);
        let slope = Grid::from_elem((2, 3), 10.0);
        let mut mask = MaskGrid::from_elem((2, 3), true);
        mask[[0, 1]] = false;
        mask[[1, 2]] = false;
        let labels = Array2::<u8>::zeros((2, 3));

        let (matrix, label_vector) =
            FeatureMatrixBuilder::build(&request, &slope, &mask, &labels).unwrap();
        assert_eq!(matrix.n_rows(), 4);
        assert_eq!(label_vector.len(), 4);
        assert_eq!(matrix.n_features(), 3);
    }

    #[test]
    fn test_row_major_pixel_ordering() {
        let request = request_with(false, false);
        let slope = Grid::from_elem((2, 3), 10.0);
        let mut mask = MaskGrid::from_elem((2, 3), true);
        mask[[0, 0]] = false;
        let labels = Array2::<u8>::zeros((2, 3));

        let (matrix, _) = FeatureMatrixBuilder::build(&request, &slope, &mask, &labels).unwrap();
        assert_eq!(
            matrix.pixel_index(),
            &[(0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
        // Elevation column tracks the row-major walk
        assert_eq!(matrix.data()[[0, 0]], 1.0);
        assert_eq!(matrix.data()[[4, 0]], 5.0);
    }

    #[test]
    fn test_optional_layers_widen_the_matrix() {
        let slope = Grid::from_elem((2, 3), 10.0);
        let mask = MaskGrid::from_elem((2, 3), true);
        let labels = Array2::<u8>::zeros((2, 3));

        for (veg, geol, expected) in [
            (false, false, 3),
            (true, false, 4),
            (false, true, 4),
            (true, true, 5),
        ] {
            let request = request_with(veg, geol);
            let (matrix, _) =
                FeatureMatrixBuilder::build(&request, &slope, &mask, &labels).unwrap();
            assert_eq!(matrix.n_features(), expected);
        }

        let request = request_with(true, true);
        let (matrix, _) = FeatureMatrixBuilder::build(&request, &slope, &mask, &labels).unwrap();
        assert_eq!(
            matrix.column_names(),
            &["elevation", "slope_deg", "rainfall", "vegetation_index", "geology"]
        );
    }

    #[test]
    fn test_combined_mask_is_intersection() {
        let mut request = PredictionRequest::new();
        let elev_mask = arr2(&[[true, true], [false, true]]);
        let rain_mask = arr2(&[[true, false], [true, true]]);
        request.insert(
            RasterLayer::new(LayerRole::Elevation, Grid::zeros((2, 2)), elev_mask).unwrap(),
        );
        request.insert(
            RasterLayer::new(LayerRole::Rainfall, Grid::zeros((2, 2)), rain_mask).unwrap(),
        );

        let combined = FeatureMatrixBuilder::combined_mask(&request).unwrap();
        assert_eq!(combined, arr2(&[[true, false], [false, true]]));
    }

    #[test]
    fn test_non_finite_feature_is_a_numeric_error() {
        let mut request = request_with(false, false);
        let mut rain = Grid::from_elem((2, 3), 7.0);
        rain[[1, 1]] = f32::NAN;
        request.insert(RasterLayer::fully_valid(LayerRole::Rainfall, rain));

        let slope = Grid::from_elem((2, 3), 10.0);
        let mask = MaskGrid::from_elem((2, 3), true);
        let labels = Array2::<u8>::zeros((2, 3));

        let result = FeatureMatrixBuilder::build(&request, &slope, &mask, &labels);
        assert!(matches!(result, Err(TalusError::Numeric(_))));
    }
}
