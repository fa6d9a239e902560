use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Real-valued raster data
pub type GridValue = f32;

/// 2D raster data array (rows x cols)
pub type Grid = Array2<GridValue>;

/// 2D validity mask (true = pixel carries a real measurement)
pub type MaskGrid = Array2<bool>;

/// Roles a raster layer can play in a prediction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerRole {
    Elevation,
    Rainfall,
    VegetationIndex,
    Geology,
}

impl LayerRole {
    /// Whether a request is incomplete without this role
    pub fn is_required(&self) -> bool {
        matches!(self, LayerRole::Elevation | LayerRole::Rainfall)
    }
}

impl std::fmt::Display for LayerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerRole::Elevation => write!(f, "elevation"),
            LayerRole::Rainfall => write!(f, "rainfall"),
            LayerRole::VegetationIndex => write!(f, "vegetation-index"),
            LayerRole::Geology => write!(f, "geology"),
        }
    }
}

/// Canonical ordering of layer roles; feature columns follow this order
/// (with the derived slope column inserted after elevation).
pub const ROLE_ORDER: [LayerRole; 4] = [
    LayerRole::Elevation,
    LayerRole::Rainfall,
    LayerRole::VegetationIndex,
    LayerRole::Geology,
];

/// Geospatial transformation parameters of a loaded raster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

/// A named 2D raster band with its validity mask
#[derive(Debug, Clone)]
pub struct RasterLayer {
    role: LayerRole,
    data: Grid,
    mask: MaskGrid,
    geo_transform: Option<GeoTransform>,
}

impl RasterLayer {
    /// Create a layer, enforcing that mask and data dimensions agree
    pub fn new(role: LayerRole, data: Grid, mask: MaskGrid) -> TalusResult<Self> {
        if data.dim() != mask.dim() {
            return Err(TalusError::ShapeMismatch(format!(
                "{} layer: data shape {:?} does not match mask shape {:?}",
                role,
                data.dim(),
                mask.dim()
            )));
        }
        Ok(Self {
            role,
            data,
            mask,
            geo_transform: None,
        })
    }

    /// Create a layer whose pixels are all valid
    pub fn fully_valid(role: LayerRole, data: Grid) -> Self {
        let mask = MaskGrid::from_elem(data.dim(), true);
        Self {
            role,
            data,
            mask,
            geo_transform: None,
        }
    }

    /// Attach the source geotransform (metadata only; the pipeline
    /// operates in pixel space)
    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = Some(geo_transform);
        self
    }

    pub fn role(&self) -> LayerRole {
        self.role
    }

    pub fn data(&self) -> &Grid {
        &self.data
    }

    pub fn mask(&self) -> &MaskGrid {
        &self.mask
    }

    pub fn geo_transform(&self) -> Option<&GeoTransform> {
        self.geo_transform.as_ref()
    }

    /// Shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Number of valid pixels
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Input to a susceptibility run: a capability set of layers keyed by role.
///
/// Elevation and rainfall are mandatory; vegetation-index and geology are
/// optional, and their presence determines the feature width of the model
/// trained for the run.
#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    layers: HashMap<LayerRole, RasterLayer>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a layer under its own role, replacing any previous layer
    /// with the same role
    pub fn insert(&mut self, layer: RasterLayer) {
        self.layers.insert(layer.role(), layer);
    }

    pub fn get(&self, role: LayerRole) -> Option<&RasterLayer> {
        self.layers.get(&role)
    }

    pub fn contains(&self, role: LayerRole) -> bool {
        self.layers.contains_key(&role)
    }

    /// Roles present in this request, in canonical order
    pub fn present_roles(&self) -> Vec<LayerRole> {
        ROLE_ORDER
            .iter()
            .copied()
            .filter(|role| self.layers.contains_key(role))
            .collect()
    }

    /// Fetch a mandatory layer or fail with a typed error
    pub fn require(&self, role: LayerRole) -> TalusResult<&RasterLayer> {
        self.layers
            .get(&role)
            .ok_or(TalusError::MissingLayer(role))
    }
}

/// Error types for susceptibility processing
#[derive(Debug, thiserror::Error)]
pub enum TalusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Layer load error: {0}")]
    LayerLoad(String),

    #[error("Missing required layer: {0}")]
    MissingLayer(LayerRole),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Degenerate training data: {0}")]
    DegenerateTraining(String),

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for susceptibility operations
pub type TalusResult<T> = Result<T, TalusError>;
