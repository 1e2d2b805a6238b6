#[allow(dead_code)]
mod common;

use common::{normalized, registry_with};
use spotcell_core::calibration::Calibration;
use spotcell_core::channel::Role;
use spotcell_core::error::SpotcellError;
use spotcell_core::settings::{
    ChannelDetection, ConsistencyWarning, Measurement, MeasurementSet, ProjectionMethod,
    ProjectionSpec, SegmentationChoice, SettingsResolver,
};

// ---------------------------------------------------------------------------
// Projection and macro fallback
// ---------------------------------------------------------------------------

#[test]
fn test_spot_inherits_quantification_projection() {
    let mut registry = registry_with(2, &[(2, Role::Spot)], &[]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::StdDev);

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let spot = resolved.channel(2).unwrap();
    assert_eq!(spot.config.projection, ProjectionSpec::enabled(ProjectionMethod::StdDev));
    assert!(spot.projection_inherited);
}

#[test]
fn test_own_projection_wins() {
    let mut registry = registry_with(2, &[(2, Role::Spot)], &[]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::StdDev);
    configs.spot_mut(2).unwrap().preprocessing.projection =
        ProjectionSpec::enabled(ProjectionMethod::Sum).with_slices(2, 5);

    let resolver = SettingsResolver::new(&registry, &configs);
    let channel = registry.channel(2).unwrap();
    let (projection, inherited) = resolver.projection_with_source(channel);
    assert_eq!(projection.method, ProjectionMethod::Sum);
    assert_eq!(projection.slice_range.unwrap().max, 5);
    assert!(!inherited);
}

#[test]
fn test_unselected_channel_does_not_inherit() {
    let mut registry = registry_with(2, &[(2, Role::Spot)], &[]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::Max);
    configs.quantification.preprocess_on.set(2, false);

    let resolver = SettingsResolver::new(&registry, &configs);
    let channel = registry.channel(2).unwrap();
    assert_eq!(resolver.projection(channel), ProjectionSpec::disabled());
    assert!(!resolver.projection_with_source(channel).1);
}

#[test]
fn test_quantification_only_channel_is_not_flagged_inherited() {
    let mut registry = registry_with(2, &[], &[1]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::Max);

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let rc = resolved.channel(1).unwrap();
    assert!(rc.config.projection.enabled);
    assert!(!rc.projection_inherited);
    assert_eq!(rc.config.detection, ChannelDetection::QuantificationOnly);
}

#[test]
fn test_macro_fallback() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei)], &[]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.use_macro = true;
    configs.quantification.preprocessing.macro_code = "run(\"Gaussian Blur...\", \"sigma=2\");".into();

    let resolver = SettingsResolver::new(&registry, &configs);
    let nuclei = registry.channel(1).unwrap();
    assert_eq!(
        resolver.preprocess_macro(nuclei).as_deref(),
        Some("run(\"Gaussian Blur...\", \"sigma=2\");")
    );

    let own = configs.nuclei.as_mut().unwrap();
    own.preprocessing.use_macro = true;
    own.preprocessing.macro_code = "run(\"Median...\");".into();
    let resolver = SettingsResolver::new(&registry, &configs);
    assert_eq!(
        resolver.preprocess_macro(nuclei).as_deref(),
        Some("run(\"Median...\");")
    );
}

#[test]
fn test_disabled_macro_is_ignored() {
    let mut registry = registry_with(1, &[(1, Role::Nuclei)], &[]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.macro_code = "run(\"Median...\");".into();
    let resolver = SettingsResolver::new(&registry, &configs);
    assert_eq!(resolver.preprocess_macro(registry.channel(1).unwrap()), None);
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

#[test]
fn test_deselected_channels_get_baseline_only() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei), (2, Role::Spot)], &[]);
    let mut configs = normalized(&mut registry);
    configs.quantification.measure_on.set(1, false);
    configs.quantification.measure_on.set(2, false);

    let resolver = SettingsResolver::new(&registry, &configs);
    let nuclei = resolver.measurements(registry.channel(1).unwrap());
    let spot = resolver.measurements(registry.channel(2).unwrap());
    assert_eq!(
        nuclei,
        MeasurementSet::empty()
            .with(Measurement::Mean)
            .with(Measurement::IntegratedDensity)
            .with(Measurement::Area)
    );
    assert_eq!(
        spot,
        MeasurementSet::empty()
            .with(Measurement::Mean)
            .with(Measurement::IntegratedDensity)
    );
}

#[test]
fn test_selected_channel_uses_its_own_panel() {
    let mut registry = registry_with(2, &[(2, Role::Spot)], &[1]);
    let mut configs = normalized(&mut registry);
    configs.spot_mut(2).unwrap().measurements.insert(Measurement::Median);
    configs.quantification.measurements.insert(Measurement::Skewness);
    configs.quantification.measurements.summary = true;

    let resolver = SettingsResolver::new(&registry, &configs);
    let spot = resolver.measurements(registry.channel(2).unwrap());
    assert!(spot.contains(Measurement::Median));
    assert!(!spot.contains(Measurement::Skewness));

    let quant = resolver.measurements(registry.channel(1).unwrap());
    assert!(quant.contains(Measurement::Skewness));
    assert!(quant.contains(Measurement::Mean));
    assert!(quant.summary);
}

#[test]
fn test_quantified_role_channel_is_also_measured() {
    let plain = registry_with(2, &[(1, Role::Spot)], &[]);
    let mut quantified = registry_with(2, &[(1, Role::Spot)], &[1]);
    let mut configs = normalized(&mut quantified);
    configs.quantification.measurements.insert(Measurement::Skewness);

    let without = SettingsResolver::new(&plain, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let with = SettingsResolver::new(&quantified, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let without = &without.channel(1).unwrap().config;
    let with = &with.channel(1).unwrap().config;

    assert!(without.quantification.is_none());
    assert_ne!(without, with);
    // The spot panel keeps its own set; the quantification pass uses the
    // quantification panel's.
    assert_eq!(with.measurements, without.measurements);
    let quant = with.quantification.as_ref().unwrap();
    assert!(quant.contains(Measurement::Skewness));
    assert!(quant.contains(Measurement::Mean));
    assert!(!with.measurements.contains(Measurement::Skewness));

    let pass = with.as_quantification();
    assert_eq!(pass.detection, ChannelDetection::QuantificationOnly);
    assert_eq!(&pass.measurements, quant);
    assert_eq!(pass.projection, with.projection);
}

#[test]
fn test_quantified_role_channel_measure_selection() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei)], &[1]);
    let mut configs = normalized(&mut registry);
    configs.quantification.measurements.insert(Measurement::Median);
    configs.quantification.measure_on.set(1, false);

    let resolver = SettingsResolver::new(&registry, &configs);
    let channel = registry.channel(1).unwrap();
    assert_eq!(
        resolver.quantification_measurements(channel),
        Some(
            MeasurementSet::empty()
                .with(Measurement::Mean)
                .with(Measurement::IntegratedDensity)
        )
    );
    assert_eq!(resolver.quantification_measurements(registry.channel(2).unwrap()), None);
}

#[test]
fn test_shape_measurements_need_segmentation() {
    let mut registry = registry_with(3, &[(1, Role::Nuclei), (2, Role::Spot)], &[3]);
    let mut configs = normalized(&mut registry);
    configs.spot_mut(2).unwrap().measurements.insert(Measurement::Area);
    configs.quantification.measurements.insert(Measurement::Perimeter);
    configs.nuclei.as_mut().unwrap().measurements.insert(Measurement::Perimeter);

    let resolver = SettingsResolver::new(&registry, &configs);
    let spot = resolver.measurements(registry.channel(2).unwrap());
    assert!(!spot.contains(Measurement::Area));
    assert!(spot.contains(Measurement::StdDev));
    let quant = resolver.measurements(registry.channel(3).unwrap());
    assert_eq!(quant.morphological().count(), 0);
    let nuclei = resolver.measurements(registry.channel(1).unwrap());
    assert!(nuclei.contains(Measurement::Perimeter));
    assert!(nuclei.contains(Measurement::Area));
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn test_resolve_orders_active_channels() {
    let mut registry = registry_with(4, &[(3, Role::Cell), (1, Role::Nuclei)], &[4]);
    let configs = normalized(&mut registry);
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();

    let indices: Vec<usize> = resolved.channels.iter().map(|c| c.channel.index).collect();
    assert_eq!(indices, vec![1, 3, 4]);
    assert_eq!(resolved.nuclei().unwrap().channel.index, 1);
    assert!(!resolved.has_spots());
    assert_eq!(resolved.quantification_only().count(), 1);

    match &resolved.cell().unwrap().config.detection {
        ChannelDetection::Segmentation(s) => assert!(s.cytoplasm.as_ref().unwrap().extract),
        other => panic!("unexpected detection {other:?}"),
    }
}

#[test]
fn test_unused_channel_is_skipped() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei), (2, Role::Spot)], &[]);
    let configs = normalized(&mut registry);
    registry.set_used(2, false).unwrap();
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    assert_eq!(resolved.channels.len(), 1);
    assert!(resolved.channel(2).is_none());
}

#[test]
fn test_spot_without_mode_is_incomplete() {
    let mut registry = registry_with(1, &[(1, Role::Spot)], &[]);
    let mut configs = normalized(&mut registry);
    let spot = configs.spot_mut(1).unwrap();
    spot.use_find_maxima = false;
    spot.use_threshold = false;

    let err = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap_err();
    assert!(matches!(err, SpotcellError::ConfigurationIncomplete(_)));
}

#[test]
fn test_empty_cellpose_model_is_incomplete() {
    let mut registry = registry_with(1, &[(1, Role::Nuclei)], &[]);
    let mut configs = normalized(&mut registry);
    let nuclei = configs.nuclei.as_mut().unwrap();
    nuclei.method = SegmentationChoice::Cellpose;
    nuclei.cellpose.model = "  ".into();

    let err = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap_err();
    assert!(matches!(err, SpotcellError::ConfigurationIncomplete(_)));
}

#[test]
fn test_nothing_active_is_incomplete() {
    let mut registry = registry_with(2, &[], &[]);
    let configs = normalized(&mut registry);
    let err = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap_err();
    assert!(matches!(err, SpotcellError::ConfigurationIncomplete(_)));
}

// ---------------------------------------------------------------------------
// Consistency check
// ---------------------------------------------------------------------------

#[test]
fn test_consistency_warnings() {
    let mut registry = registry_with(3, &[(1, Role::Nuclei), (2, Role::Spot)], &[3]);
    let mut configs = normalized(&mut registry);
    configs.quantification.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::Max);
    configs.quantification.preprocess_on.set(1, false);

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let report = resolved.check_consistency(|_| 5);
    assert_eq!(report.warnings.len(), 2);
    assert!(matches!(
        report.warnings[0],
        ConsistencyWarning::NoProjection { channel: 1, slices: 5, .. }
    ));
    assert!(matches!(
        report.warnings[1],
        ConsistencyWarning::InheritedProjection {
            channel: 2,
            method: ProjectionMethod::Max,
            ..
        }
    ));
    assert_eq!(report.message().lines().count(), 2);
}

#[test]
fn test_single_slice_images_need_no_confirmation() {
    let mut registry = registry_with(1, &[(1, Role::Nuclei)], &[]);
    let configs = normalized(&mut registry);
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let report = resolved.check_consistency(|_| 1);
    assert!(report.is_empty());
    report.confirm(|_| panic!("confirmation must not be asked")).unwrap();
}

#[test]
fn test_slice_range_beyond_stack() {
    let mut registry = registry_with(1, &[(1, Role::Nuclei)], &[]);
    let mut configs = normalized(&mut registry);
    configs.nuclei.as_mut().unwrap().preprocessing.projection =
        ProjectionSpec::enabled(ProjectionMethod::Max).with_slices(1, 12);
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let report = resolved.check_consistency(|_| 8);
    assert_eq!(
        report.warnings,
        vec![ConsistencyWarning::SliceRangeOutOfBounds {
            channel: 1,
            max: 12,
            slices: 8,
        }]
    );
}

#[test]
fn test_declined_confirmation_aborts() {
    let mut registry = registry_with(1, &[(1, Role::Nuclei)], &[]);
    let configs = normalized(&mut registry);
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let report = resolved.check_consistency(|_| 3);
    assert!(!report.is_empty());

    let err = report.confirm(|msg| {
        assert!(msg.contains("no projection"));
        false
    });
    assert!(matches!(err, Err(SpotcellError::RunDeclined)));
    assert!(report.confirm(|_| true).is_ok());
}

#[test]
fn test_resolved_settings_serialize_with_kind_tag() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei), (2, Role::Spot)], &[]);
    let configs = normalized(&mut registry);
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();

    let spot = serde_json::to_value(&resolved.channel(2).unwrap().config).unwrap();
    assert_eq!(spot["detection"]["kind"], "Spots");
    assert_eq!(spot["detection"]["threshold"], serde_json::Value::Null);
    let nuclei = serde_json::to_value(&resolved.channel(1).unwrap().config).unwrap();
    assert_eq!(nuclei["detection"]["kind"], "Segmentation");
    assert_eq!(nuclei["projection"]["enabled"], false);
}
