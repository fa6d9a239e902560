use crate::types::{GeoTransform, LayerRole, MaskGrid, RasterLayer, TalusError, TalusResult};
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// Single-band raster layer reader
pub struct RasterReader;

impl RasterReader {
    /// Read band 1 of a georeferenced raster into a layer.
    ///
    /// Nodata pixels (per the band's declared nodata value) and non-finite
    /// pixels are marked invalid in the layer's mask.
    pub fn load<P: AsRef<Path>>(role: LayerRole, path: P) -> TalusResult<RasterLayer> {
        log::info!("Loading {} layer from: {}", role, path.as_ref().display());

        let dataset = Dataset::open(path.as_ref()).map_err(|e| {
            TalusError::LayerLoad(format!(
                "cannot open {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let (width, height) = dataset.raster_size();
        if width == 0 || height == 0 {
            return Err(TalusError::LayerLoad(format!(
                "{} has an empty raster grid",
                path.as_ref().display()
            )));
        }
        log::debug!("Raster size: {}x{}", width, height);

        let rasterband = dataset.rasterband(1).map_err(|e| {
            TalusError::LayerLoad(format!(
                "{} has no readable first band: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let band_data =
            rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let no_data_value = rasterband.no_data_value().map(|v| v as f32);
        log::debug!("Nodata value: {:?}", no_data_value);

        let data = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| TalusError::LayerLoad(format!("failed to reshape band data: {}", e)))?;

        let mask = Self::build_validity_mask(&data, no_data_value);

        let mut layer = RasterLayer::new(role, data, mask)?;
        if let Ok(gt) = dataset.geo_transform() {
            layer = layer.with_geo_transform(GeoTransform {
                top_left_x: gt[0],
                pixel_width: gt[1],
                rotation_x: gt[2],
                top_left_y: gt[3],
                rotation_y: gt[4],
                pixel_height: gt[5],
            });
        }

        log::info!(
            "Loaded {} layer: {:?}, {} valid pixels",
            role,
            layer.shape(),
            layer.valid_count()
        );
        Ok(layer)
    }

    /// Mark nodata and non-finite pixels invalid
    fn build_validity_mask(data: &Array2<f32>, no_data_value: Option<f32>) -> MaskGrid {
        data.map(|&v| {
            if !v.is_finite() {
                return false;
            }
            match no_data_value {
                Some(nodata) => (v - nodata).abs() > f32::EPSILON,
                None => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_load_nonexistent_file() {
        let result = RasterReader::load(LayerRole::Elevation, "nonexistent.tif");
        assert!(matches!(result, Err(TalusError::LayerLoad(_))));
    }

    #[test]
    fn test_validity_mask_marks_nodata() {
        let data = arr2(&[[1.0f32, -9999.0], [f32::NAN, 4.0]]);
        let mask = RasterReader::build_validity_mask(&data, Some(-9999.0));
        assert!(mask[[0, 0]]);
        assert!(!mask[[0, 1]]);
        assert!(!mask[[1, 0]]);
        assert!(mask[[1, 1]]);
    }

    #[test]
    fn test_validity_mask_without_nodata() {
        let data = arr2(&[[1.0f32, 0.0], [f32::INFINITY, 4.0]]);
        let mask = RasterReader::build_validity_mask(&data, None);
        assert!(mask[[0, 0]]);
        assert!(mask[[0, 1]]);
        assert!(!mask[[1, 0]]);
        assert!(mask[[1, 1]]);
    }
}
