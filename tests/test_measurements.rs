//! Integration tests for the measurement stage and full pipeline runs.
//!
//! Tests cover:
//! - Shape descriptors of a known square
//! - Color histograms restricted to the mask
//! - Size-marker calibration (detect and define modes)
//! - Pipeline runs: combined and individual composition, debug output, ROI errors

mod common;

use image::Rgb;
use phenoscan::analysis::{
    analyze_color, analyze_shape, calibrate, pseudocolor, MarkerConfig, MarkerDetection,
};
use phenoscan::segmentation::{compose, extract_regions, Background};
use phenoscan::{
    ColorConfig, CompositeObject, CompositionMode, PhenoError, Pipeline, PipelineContext,
    RecordGroup, RegionSet,
};
use std::sync::Arc;

use common::*;

fn square_object() -> CompositeObject {
    let mask = rect_mask(100, 100, &[(40, 40, 20, 20)]);
    compose(&extract_regions(&mask)).expect("square composes")
}

fn marker_config(detection: MarkerDetection) -> MarkerConfig {
    MarkerConfig {
        roi: RoiShape::Rectangle {
            x: 0,
            y: 0,
            width: 20,
            height: 20,
        },
        detection,
        background: Background::Black,
        physical_area: 1.0,
        unit: "cm".to_string(),
        min_area: 10,
    }
}

fn detect_white() -> MarkerDetection {
    MarkerDetection::Detect {
        channel: Channel::Value,
        cutoff: 200,
        polarity: Polarity::Light,
    }
}

/// Square plant plus a 10x10 white marker at (5, 5); the main ROI excludes the marker
fn plant_with_marker() -> (image::RgbImage, PipelineConfig) {
    let mut image = square_plant();
    paint_rect(&mut image, 5, 5, 10, 10, MARKER);

    let mut config = PipelineConfig::new(green_recipe());
    config.roi.region = RoiShape::Rectangle {
        x: 30,
        y: 30,
        width: 70,
        height: 70,
    };
    config.analysis.marker = Some(marker_config(detect_white()));
    (image, config)
}

#[test]
fn test_square_shape() -> anyhow::Result<()> {
    let record = analyze_shape((100, 100), &square_object())?;

    assert_eq!(record.group, RecordGroup::Shape);
    assert_eq!(record.get_int("area"), Some(400));
    assert_eq!(record.get_int("width"), Some(20));
    assert_eq!(record.get_int("height"), Some(20));
    assert_eq!(record.get_float("extent"), Some(1.0));
    assert_eq!(record.get_float("centroid_x"), Some(50.0));
    assert_eq!(record.get_float("centroid_y"), Some(50.0));
    assert_eq!(record.get_float("perimeter"), Some(80.0));
    assert_eq!(record.get_float("hull_area"), Some(400.0));
    assert_eq!(record.get_float("solidity"), Some(1.0));
    assert_eq!(record.get_bool("in_bounds"), Some(true));

    let eccentricity = record.get_float("eccentricity").unwrap_or(f64::NAN);
    assert!(eccentricity.abs() < 1e-3, "square eccentricity was {}", eccentricity);

    let header = record.header();
    assert_eq!(header.first(), Some(&"area"));
    assert_eq!(header.last(), Some(&"eccentricity"));
    Ok(())
}

#[test]
fn test_elongated_shape_ellipse() -> anyhow::Result<()> {
    let mask = rect_mask(100, 100, &[(10, 45, 60, 10)]);
    let object = compose(&extract_regions(&mask))?;
    let record = analyze_shape((100, 100), &object)?;

    let major = record.get_float("ellipse_major_axis").unwrap_or(0.0);
    let minor = record.get_float("ellipse_minor_axis").unwrap_or(0.0);
    assert!(major > minor * 5.0, "major {} minor {}", major, minor);
    assert!(record.get_float("ellipse_angle").unwrap_or(f64::NAN).abs() < 1e-6);
    assert!(record.get_float("eccentricity").unwrap_or(0.0) > 0.9);
    Ok(())
}

#[test]
fn test_shape_touching_border_is_out_of_bounds() -> anyhow::Result<()> {
    let mask = rect_mask(50, 50, &[(0, 10, 10, 10)]);
    let object = compose(&extract_regions(&mask))?;
    let record = analyze_shape((50, 50), &object)?;
    assert_eq!(record.get_bool("in_bounds"), Some(false));
    Ok(())
}

#[test]
fn test_shape_of_empty_object() {
    let object = CompositeObject {
        regions: RegionSet::empty(10, 10),
        mask: Mask::new(10, 10),
    };
    assert!(matches!(
        analyze_shape((10, 10), &object),
        Err(PhenoError::EmptyObject)
    ));
}

#[test]
fn test_color_histogram_ignores_unmasked_pixels() -> anyhow::Result<()> {
    let mut image = square_plant();
    paint_rect(&mut image, 0, 0, 10, 10, Rgb([255, 0, 255]));
    let mask = rect_mask(100, 100, &[(40, 40, 20, 20)]);

    let record = analyze_color(&image, &mask, 256, &[Channel::Green, Channel::Red])?;
    assert_eq!(record.group, RecordGroup::Color);
    assert_eq!(record.get_int("pixel_count"), Some(400));
    assert_eq!(record.get_float("green_mean"), Some(200.0));
    assert_eq!(record.get_int("green_peak_bin"), Some(200));

    let histogram = record.get_series("green_histogram").unwrap_or(&[]);
    assert_eq!(histogram.len(), 256);
    assert_eq!(histogram.iter().sum::<u64>(), 400);
    assert_eq!(histogram[200], 400);

    let red = record.get_series("red_histogram").unwrap_or(&[]);
    assert_eq!(red[255], 0);

    let header = record.header();
    assert_eq!(
        header,
        vec![
            "pixel_count",
            "green_mean",
            "green_peak_bin",
            "green_histogram",
            "red_mean",
            "red_peak_bin",
            "red_histogram"
        ]
    );
    Ok(())
}

#[test]
fn test_color_binning_and_errors() -> anyhow::Result<()> {
    let image = square_plant();
    let mask = rect_mask(100, 100, &[(40, 40, 20, 20)]);

    let record = analyze_color(&image, &mask, 8, &[Channel::Green])?;
    let histogram = record.get_series("green_histogram").unwrap_or(&[]);
    assert_eq!(histogram.len(), 8);
    assert_eq!(histogram[200 * 8 / 256], 400);

    assert!(matches!(
        analyze_color(&image, &mask, 0, &[Channel::Green]),
        Err(PhenoError::Configuration { .. })
    ));
    assert!(matches!(
        analyze_color(&image, &Mask::new(100, 100), 256, &[Channel::Green]),
        Err(PhenoError::EmptyObject)
    ));
    assert!(matches!(
        analyze_color(&image, &Mask::new(50, 50), 256, &[Channel::Green]),
        Err(PhenoError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_pseudocolor_paints_masked_pixels_only() -> anyhow::Result<()> {
    let image = square_plant();
    let mask = rect_mask(100, 100, &[(40, 40, 20, 20)]);

    let view = pseudocolor(&image, &mask, Channel::Green, Background::Black)?;
    assert_eq!(*view.get_pixel(5, 5), Rgb([0, 0, 0]));
    // green 200 sits in the warm end of the ramp
    let inside = view.get_pixel(50, 50);
    assert_eq!(inside[0], 255);
    assert_eq!(inside[2], 0);

    assert!(pseudocolor(&image, &Mask::new(10, 10), Channel::Green, Background::White).is_err());
    Ok(())
}

#[test]
fn test_marker_detect_mode() -> anyhow::Result<()> {
    let (image, _) = plant_with_marker();
    let calibration = calibrate(
        &image,
        &marker_config(detect_white()),
        &PipelineContext::default(),
    )?;

    assert_eq!(calibration.marker_area, 100);
    assert!((calibration.area_scale - 0.01).abs() < 1e-12);
    assert!((calibration.length_scale - 0.1).abs() < 1e-12);
    assert!((calibration.physical_area(400) - 4.0).abs() < 1e-9);

    let record = calibration.to_record();
    assert_eq!(record.group, RecordGroup::Marker);
    assert_eq!(record.get_int("marker_area"), Some(100));
    Ok(())
}

#[test]
fn test_marker_define_mode_uses_roi() -> anyhow::Result<()> {
    let image = square_plant();
    let mut config = marker_config(MarkerDetection::Define);
    config.physical_area = 4.0;
    let calibration = calibrate(&image, &config, &PipelineContext::default())?;

    assert_eq!(calibration.marker_area, 400);
    assert!((calibration.area_scale - 0.01).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_marker_not_found() {
    // no white pixels anywhere
    let image = square_plant();
    let result = calibrate(&image, &marker_config(detect_white()), &PipelineContext::default());
    assert!(matches!(result, Err(PhenoError::MarkerNotFound { .. })));

    // too small to qualify
    let mut image = square_plant();
    paint_rect(&mut image, 5, 5, 3, 3, MARKER);
    let result = calibrate(&image, &marker_config(detect_white()), &PipelineContext::default());
    assert!(matches!(result, Err(PhenoError::MarkerNotFound { min_area: 10 })));
}

#[test]
fn test_pipeline_combined_run() -> anyhow::Result<()> {
    let (image, mut config) = plant_with_marker();
    config.analysis.color = Some(ColorConfig {
        channels: vec![Channel::Green],
        ..ColorConfig::default()
    });

    let output = Pipeline::new(config)?.run(&image, "plant.png")?;

    assert_eq!(output.objects.len(), 1);
    assert_eq!(output.selection.kept_area, 400);
    // the marker passes the plant threshold but lies outside the ROI
    assert_eq!(output.mask.foreground_count(), 500);

    let groups: Vec<RecordGroup> = output.records.iter().map(|r| r.group).collect();
    assert_eq!(
        groups,
        vec![RecordGroup::Shape, RecordGroup::Color, RecordGroup::Marker]
    );

    let marker = output
        .records_of(RecordGroup::Marker)
        .next()
        .expect("marker record");
    let calibrated = marker.get_float("calibrated_area").unwrap_or(0.0);
    assert!((calibrated - 4.0).abs() < 1e-9);
    assert_eq!(marker.header().last(), Some(&"calibrated_area"));
    Ok(())
}

#[test]
fn test_pipeline_individual_run() -> anyhow::Result<()> {
    let mut image = blank(100, 60, SOIL);
    paint_rect(&mut image, 60, 10, 10, 10, PLANT);
    paint_rect(&mut image, 10, 10, 20, 20, PLANT);

    let mut config = PipelineConfig::new(green_recipe());
    config.composition = CompositionMode::Individual;
    let output = Pipeline::new(config)?.run(&image, "two.png")?;

    assert_eq!(output.objects.len(), 2);
    let areas: Vec<Option<i64>> = output
        .records_of(RecordGroup::Shape)
        .map(|r| r.get_int("area"))
        .collect();
    // raster order of each object's first pixel
    assert_eq!(areas, vec![Some(400), Some(100)]);
    Ok(())
}

#[test]
fn test_pipeline_nothing_in_roi() -> anyhow::Result<()> {
    let image = square_plant();
    let mut config = PipelineConfig::new(green_recipe());
    config.roi.region = RoiShape::Rectangle {
        x: 0,
        y: 0,
        width: 20,
        height: 20,
    };
    let result = Pipeline::new(config)?.run(&image, "empty.png");
    assert!(matches!(result, Err(PhenoError::EmptyComposition)));
    Ok(())
}

#[test]
fn test_pipeline_roi_outside_image() -> anyhow::Result<()> {
    let image = square_plant();
    let mut config = PipelineConfig::new(green_recipe());
    config.roi.region = RoiShape::Adjusted {
        x_adj: 150,
        y_adj: 0,
        w_adj: 0,
        h_adj: 0,
    };
    let result = Pipeline::new(config)?.run(&image, "small.png");
    assert!(matches!(result, Err(PhenoError::Configuration { .. })));
    Ok(())
}

#[test]
fn test_pipeline_debug_sink_receives_stages() -> anyhow::Result<()> {
    let image = square_plant();
    let mut config = PipelineConfig::new(green_recipe().fill(10));
    config.analysis.color = Some(ColorConfig {
        pseudocolor: Some(Channel::Green),
        ..ColorConfig::default()
    });

    let sink = Arc::new(RecordingSink::default());
    let pipeline = Pipeline::new(config)?.with_debug_sink(sink.clone());
    pipeline.run(&image, "debug.png")?;

    let stages = sink.stages();
    assert_eq!(stages.first().map(String::as_str), Some("input"));
    for expected in [
        "channel_green",
        "threshold",
        "fill",
        "kept",
        "object_01",
        "pseudocolor_green",
    ] {
        assert!(stages.iter().any(|s| s == expected), "missing stage {}", expected);
    }
    Ok(())
}

#[test]
fn test_pipeline_debug_directory() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");
    let pipeline =
        Pipeline::new(PipelineConfig::new(green_recipe()))?.with_debug(debug_dir.clone())?;
    pipeline.run(&square_plant(), "plant.png")?;

    let image_dir = debug_dir.join("plant.png");
    assert!(image_dir.join("00_input.png").exists());
    assert!(std::fs::read_dir(&image_dir)?.count() >= 4);

    // the same id again gets its own subdirectory
    pipeline.run(&square_plant(), "plant.png")?;
    assert!(debug_dir.join("plant.png_2").join("00_input.png").exists());

    // a non-empty directory is refused
    let again = Pipeline::new(PipelineConfig::new(green_recipe()))?.with_debug(debug_dir);
    assert!(again.is_err());
    Ok(())
}

#[test]
fn test_run_partial_returns_mask() -> anyhow::Result<()> {
    let pipeline = Pipeline::new(PipelineConfig::new(green_recipe()))?;
    let mask = pipeline.run_partial(&square_plant())?;
    assert_eq!(mask.foreground_count(), 400);

    let sink = Arc::new(RecordingSink::default());
    let pipeline = pipeline.with_debug_sink(sink.clone());
    pipeline.run_partial(&square_plant())?;
    let stages = sink.stages();
    assert_eq!(stages.first().map(String::as_str), Some("input"));
    assert!(stages.iter().any(|s| s == "threshold"));
    assert!(!stages.iter().any(|s| s == "kept"));
    Ok(())
}

#[test]
fn test_config_from_json() -> anyhow::Result<()> {
    let json = r#"{
        "mask": { "op": "median_blur", "radius": 1,
                  "input": { "op": "threshold", "channel": "green", "cutoff": 128, "polarity": "light" } },
        "roi": { "region": { "shape": "adjusted", "x_adj": 10, "w_adj": -10 }, "containment": "complete" },
        "composition": "individual",
        "analysis": {
            "color": { "bins": 32 },
            "marker": {
                "roi": { "shape": "rectangle", "x": 0, "y": 0, "width": 20, "height": 20 },
                "detection": { "mode": "define" },
                "physical_area": 2.5
            }
        }
    }"#;
    let config = PipelineConfig::from_json_str(json)?;

    assert_eq!(config.composition, CompositionMode::Individual);
    assert!(config.analysis.shape);
    let color = config.analysis.color.as_ref().expect("color section");
    assert_eq!(color.bins, 32);
    assert_eq!(color.channels.len(), 9);
    let marker = config.analysis.marker.as_ref().expect("marker section");
    assert_eq!(marker.unit, "cm");
    assert_eq!(marker.min_area, 10);

    let round_trip = PipelineConfig::from_json_str(&config.to_json()?)?;
    assert_eq!(round_trip, config);

    let bad_bins = json.replace("\"bins\": 32", "\"bins\": 0");
    assert!(matches!(
        PipelineConfig::from_json_str(&bad_bins),
        Err(PhenoError::Configuration { .. })
    ));
    let bad_option = json.replace("\"complete\"", "\"mostly\"");
    assert!(PipelineConfig::from_json_str(&bad_option).is_err());
    Ok(())
}
