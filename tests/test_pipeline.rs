use ndarray::Array2;
use talus::{
    Grid, LayerRole, MaskGrid, PredictionRequest, RasterLayer, SusceptibilityPipeline, TalusError,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 6x6 scene: uniform steep row-ramp elevation, strictly increasing
/// rainfall, two elevation pixels masked invalid
fn steep_wet_request() -> PredictionRequest {
    let elevation = Grid::from_shape_fn((6, 6), |(i, _)| i as f32 * 5.0);
    let mut elevation_mask = MaskGrid::from_elem((6, 6), true);
    elevation_mask[[0, 0]] = false;
    elevation_mask[[0, 1]] = false;

    let rainfall = Grid::from_shape_fn((6, 6), |(i, j)| (i * 6 + j) as f32);

    let mut request = PredictionRequest::new();
    request.insert(RasterLayer::new(LayerRole::Elevation, elevation, elevation_mask).unwrap());
    request.insert(RasterLayer::fully_valid(LayerRole::Rainfall, rainfall));
    request
}

#[test]
fn test_uniform_labels_raise_degenerate_training() {
    init_logging();
    // Elevation ramp: rows 0, 1, 2 hold 0, 1, 2 -> every slope is 45
    // degrees. Constant rainfall means the 80th-percentile threshold
    // equals the constant, no pixel exceeds it, and every label is 0.
    let elevation = Grid::from_shape_fn((3, 3), |(i, _)| i as f32);
    let rainfall = Grid::from_elem((3, 3), 5.0);

    let mut request = PredictionRequest::new();
    request.insert(RasterLayer::fully_valid(LayerRole::Elevation, elevation));
    request.insert(RasterLayer::fully_valid(LayerRole::Rainfall, rainfall));

    match SusceptibilityPipeline::standard().run(&request) {
        Err(TalusError::DegenerateTraining(_)) => {}
        Err(other) => panic!("expected DegenerateTraining, got {:?}", other),
        Ok(surface) => panic!(
            "expected DegenerateTraining, got a surface with stats {:?}",
            surface.statistics()
        ),
    }
}

#[test]
fn test_mixed_labels_produce_bounded_surface() {
    init_logging();
    // Slopes are ~78.7 degrees everywhere; rainfall exceeds its 80th
    // percentile at seven pixels, so both classes are present.
    let request = steep_wet_request();
    let surface = SusceptibilityPipeline::standard().run(&request).unwrap();

    assert_eq!(surface.shape(), (6, 6));
    for &p in surface.grid().iter() {
        assert!((0.0..=1.0).contains(&p), "probability {} out of range", p);
    }

    // Masked-invalid pixels are exactly zero, never NaN
    assert_eq!(surface.grid()[[0, 0]], 0.0);
    assert_eq!(surface.grid()[[0, 1]], 0.0);

    // At least one valid pixel carries a strictly positive probability
    let stats = surface.statistics();
    assert_eq!(stats.valid_pixels, 34);
    assert!(stats.max_probability > 0.0);
}

#[test]
fn test_high_rainfall_pixels_score_higher() {
    init_logging();
    let request = steep_wet_request();
    let surface = SusceptibilityPipeline::standard().run(&request).unwrap();

    // The wettest pixel was labelled prone; the driest valid pixel was not
    let wettest = surface.grid()[[5, 5]];
    let driest = surface.grid()[[0, 2]];
    assert!(
        wettest > driest,
        "wettest pixel {} not above driest {}",
        wettest,
        driest
    );
}

#[test]
fn test_misaligned_rainfall_is_resampled_not_reshaped() {
    init_logging();
    // Rainfall arrives at twice the resolution: each 2x2 block holds the
    // value of the corresponding 6x6 pixel, so bilinear alignment must
    // recover the coarse grid exactly and the run must match the aligned
    // scenario's outcome.
    let elevation = Grid::from_shape_fn((6, 6), |(i, _)| i as f32 * 5.0);
    let rainfall_fine = Grid::from_shape_fn((12, 12), |(i, j)| ((i / 2) * 6 + j / 2) as f32);

    let mut request = PredictionRequest::new();
    request.insert(RasterLayer::fully_valid(LayerRole::Elevation, elevation));
    request.insert(RasterLayer::fully_valid(LayerRole::Rainfall, rainfall_fine));

    let surface = SusceptibilityPipeline::standard().run(&request).unwrap();
    assert_eq!(surface.shape(), (6, 6));
    assert_eq!(surface.statistics().valid_pixels, 36);
    assert!(surface.statistics().max_probability > 0.0);
}

#[test]
fn test_dense_vegetation_suppresses_every_label() {
    init_logging();
    // Same steep, wet scene, but dense vegetation everywhere: the
    // vegetation condition removes every positive label and training
    // becomes degenerate.
    let mut request = steep_wet_request();
    request.insert(RasterLayer::fully_valid(
        LayerRole::VegetationIndex,
        Grid::from_elem((6, 6), 0.9),
    ));

    let result = SusceptibilityPipeline::standard().run(&request);
    assert!(matches!(result, Err(TalusError::DegenerateTraining(_))));
}

#[test]
fn test_optional_layers_flow_through_the_pipeline() {
    init_logging();
    let mut request = steep_wet_request();
    request.insert(RasterLayer::fully_valid(
        LayerRole::VegetationIndex,
        Grid::from_elem((6, 6), 0.1),
    ));
    request.insert(RasterLayer::fully_valid(
        LayerRole::Geology,
        Array2::from_shape_fn((6, 6), |(i, j)| ((i + j) % 4) as f32),
    ));

    let surface = SusceptibilityPipeline::standard().run(&request).unwrap();
    assert_eq!(surface.shape(), (6, 6));
    for &p in surface.grid().iter() {
        assert!((0.0..=1.0).contains(&p));
    }
    assert!(surface.statistics().max_probability > 0.0);
}

#[test]
fn test_error_yields_no_partial_surface() {
    init_logging();
    // A rainfall layer with no valid pixels aborts before training with a
    // typed error; Result semantics guarantee no surface escapes.
    let elevation = Grid::from_shape_fn((4, 4), |(i, _)| i as f32 * 5.0);
    let rainfall = Grid::from_elem((4, 4), 1.0);
    let rainfall_mask = MaskGrid::from_elem((4, 4), false);

    let mut request = PredictionRequest::new();
    request.insert(RasterLayer::fully_valid(LayerRole::Elevation, elevation));
    request.insert(RasterLayer::new(LayerRole::Rainfall, rainfall, rainfall_mask).unwrap());

    let result = SusceptibilityPipeline::standard().run(&request);
    assert!(matches!(result, Err(TalusError::Numeric(_))));
}
