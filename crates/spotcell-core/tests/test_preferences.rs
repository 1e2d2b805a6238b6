use spotcell_core::calibration::Calibration;
use spotcell_core::channel::Role;
use spotcell_core::preferences::{ConfigStore, MemoryStore, PrefValue, TomlFileStore};
use spotcell_core::settings::{
    CellConfig, Measurement, ProjectionMethod, ProjectionSpec, QuantificationConfig,
    SegmentationConfig, SegmentationMethod, SpotConfig, StarDistParams, ThresholdMethod,
};

#[test]
fn test_typed_getters_fall_back_on_type_mismatch() {
    let mut store = MemoryStore::new();
    store.set("nuclei.save_rois", "yes".into());
    store.set("nuclei.min_size", 12i64.into());
    assert!(store.get_bool("nuclei.save_rois", true));
    assert_eq!(store.get_double("nuclei.min_size", 1.0), 12.0);
    assert_eq!(store.get_int("missing", 3), 3);
    assert_eq!(store.get_string("nuclei.min_size", "x"), "x");
}

#[test]
fn test_file_store_persists_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs").join("spotcell.toml");

    let mut store = TomlFileStore::open(&path).unwrap();
    assert!(!store.is_dirty());
    store.set("spot2.use_threshold", true.into());
    store.set("spot2.prominence", 125.5.into());
    store.set("spot2.slice_max", 9i64.into());
    store.set("calibration.unit", "µm".into());
    assert!(store.is_dirty());
    store.save().unwrap();
    assert!(!store.is_dirty());
    assert_eq!(store.path(), path.as_path());

    let reopened = TomlFileStore::open(&path).unwrap();
    assert_eq!(reopened.get("spot2.use_threshold"), Some(PrefValue::Bool(true)));
    assert_eq!(reopened.get_double("spot2.prominence", 0.0), 125.5);
    assert_eq!(reopened.get_int("spot2.slice_max", 0), 9);
    assert_eq!(reopened.get_string("calibration.unit", ""), "µm");
}

#[test]
fn test_missing_file_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = TomlFileStore::open(&dir.path().join("none.toml")).unwrap();
    assert_eq!(store.get("nuclei.method"), None);
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();
    assert!(TomlFileStore::open(&path).is_err());
}

#[test]
fn test_segmentation_panel_round_trip() {
    let mut config = SegmentationConfig::new(Role::Nuclei, 1);
    config.set_method(SegmentationMethod::StarDist(StarDistParams {
        percentile_high: 99.5,
        model_path: Some("/models/dsb2018".into()),
        ..StarDistParams::default()
    }));
    config.threshold.method = ThresholdMethod::Triangle;
    config.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::Sum).with_slices(2, 7);
    config.preprocessing.use_macro = true;
    config.preprocessing.macro_code = "run(\"Median...\");".into();
    config.measurements.insert(Measurement::Perimeter);
    config.final_validation = true;

    let mut store = MemoryStore::new();
    config.store(&mut store, Role::Nuclei);
    assert_eq!(SegmentationConfig::load(&store, Role::Nuclei, 1), config);

    // Another channel picks up the same nuclei defaults.
    assert_eq!(SegmentationConfig::load(&store, Role::Nuclei, 3).method(), config.method());
    assert_eq!(
        SegmentationConfig::load(&store, Role::Cell, 1),
        SegmentationConfig::new(Role::Cell, 1)
    );
}

#[test]
fn test_cell_panel_round_trip() {
    let mut config = CellConfig::new(2);
    config.cytoplasm.extract = false;
    config.cytoplasm.min_size_percent = 15.0;
    config.segmentation.save_masks = true;

    let mut store = MemoryStore::new();
    config.store(&mut store);
    assert_eq!(CellConfig::load(&store, 2), config);
}

#[test]
fn test_spot_panels_are_namespaced_by_channel() {
    let mut spot = SpotConfig::new(2, "GFP");
    spot.use_threshold = true;
    spot.find_maxima.prominence = 80.0;
    spot.threshold.watershed = true;

    let mut store = MemoryStore::new();
    spot.store(&mut store);
    assert_eq!(SpotConfig::load(&store, 2, "GFP"), spot);
    assert_eq!(SpotConfig::load(&store, 3, "RFP"), SpotConfig::new(3, "RFP"));
}

#[test]
fn test_quantification_and_calibration_round_trip() {
    let mut quant = QuantificationConfig::default();
    quant.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::StdDev);
    quant.measurements.summary_positive_only = true;
    quant.measurements.remove(Measurement::StdDev);

    let calibration = Calibration {
        name: "40x".to_string(),
        pixel_width: 0.16,
        pixel_height: 0.16,
        voxel_depth: 0.5,
        unit: "micron".to_string(),
    };

    let mut store = MemoryStore::new();
    quant.store(&mut store);
    calibration.store(&mut store);
    assert_eq!(QuantificationConfig::load(&store), quant);
    assert_eq!(Calibration::load(&store), calibration);
    assert_eq!(
        Calibration::select(std::slice::from_ref(&calibration), "40x"),
        Some(&calibration)
    );
    assert_eq!(calibration.describe(), "40x (0.16x0.16x0.5 micron)");
}
