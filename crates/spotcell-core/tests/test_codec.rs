#[allow(dead_code)]
mod common;

use common::{normalized, registry_with};
use spotcell_core::calibration::Calibration;
use spotcell_core::channel::{ChannelRegistry, Role};
use spotcell_core::codec::{Codec, ParameterDocument, ParameterLog, TextLogCodec};
use spotcell_core::consts::{DEFAULT_LOG_HEADER, PARAMETER_LOG_FILE};
use spotcell_core::preferences::MemoryStore;
use spotcell_core::settings::{
    CellposeParams, ChannelDetection, Measurement, ProjectionMethod, ProjectionSpec,
    ResolvedConfigurationSet, RoleConfigurationSet, SegmentationChoice, SegmentationMethod,
    SettingsResolver,
};

/// Nuclei on C1 (Cellpose), cell on C2, spots on C3 with both modes, C4
/// quantified with a max projection.
fn sample() -> (ChannelRegistry, RoleConfigurationSet, ResolvedConfigurationSet) {
    let mut registry = registry_with(
        4,
        &[(1, Role::Nuclei), (2, Role::Cell), (3, Role::Spot)],
        &[4],
    );
    registry.set_protein_name(1, "DAPI").unwrap();
    registry.set_protein_name(3, "GFP").unwrap();
    let mut configs = normalized(&mut registry);

    let nuclei = configs.nuclei.as_mut().unwrap();
    nuclei.set_method(SegmentationMethod::Cellpose(CellposeParams {
        diameter: 42.5,
        ..CellposeParams::nuclei()
    }));
    nuclei.final_validation = true;

    let cell = configs.cell.as_mut().unwrap();
    cell.cytoplasm.min_size_percent = 12.0;
    cell.segmentation.measurements.insert(Measurement::Feret);

    let spot = configs.spot_mut(3).unwrap();
    spot.use_threshold = true;
    spot.threshold.watershed = true;
    spot.find_maxima.prominence = 250.0;
    spot.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::Sum).with_slices(3, 9);

    configs.quantification.preprocessing.projection = ProjectionSpec::enabled(ProjectionMethod::Max);
    configs.quantification.measurements.summary = true;

    let calibration = Calibration {
        name: "60x oil".to_string(),
        ..Calibration::default()
    };
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&calibration)
        .unwrap();
    (registry, configs, resolved)
}

#[test]
fn test_encode_layout() {
    let (registry, _, resolved) = sample();
    let text = TextLogCodec.encode(&ParameterDocument::from_resolved(
        DEFAULT_LOG_HEADER,
        &registry,
        &resolved,
    ));
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], DEFAULT_LOG_HEADER);
    assert_eq!(lines[1], "CALIBRATION: 60x oil");
    assert_eq!(lines[2], "CHANNEL 1 (DAPI): used");
    assert_eq!(lines[3], "SEGMENTATION NUCLEI");
    assert!(text.contains("SEGMENTATION CELL\n"));
    assert!(text.contains("SPOT DETECTION\n"));
    assert!(text.contains("\tProjection: Sum\n\tSlices 3-9\n"));
    assert!(text.contains("Use Cellpose:\n\tmodel: nuclei\n\tdiameter: 42.5\n"));
    assert!(text.contains("Cytoplasm: yes\n\tminimal cytoplasm size: 12\n"));
    assert!(text.contains("Measurements (morphological): area feret\n"));
    assert_eq!(text.matches("Quantification  Parameters").count(), 4);
}

#[test]
fn test_round_trip() {
    let (registry, _, resolved) = sample();
    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    let decoded = TextLogCodec.decode(&TextLogCodec.encode(&doc));
    assert_eq!(decoded, doc);
}

#[test]
fn test_multi_line_macros_round_trip() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei)], &[2]);
    let mut configs = normalized(&mut registry);
    let nuclei = configs.nuclei.as_mut().unwrap();
    nuclei.preprocessing.use_macro = true;
    nuclei.preprocessing.macro_code = "run(\"Subtract Background...\", \"rolling=50\");\n\nrun(\"Median...\", \"radius=2\");".into();
    nuclei.macro_segmentation.code = "setAutoThreshold(\"Otsu dark\");\nrun(\"Analyze Particles...\");".into();
    nuclei.macro_segmentation.result_in_manager = true;
    nuclei.method = SegmentationChoice::Macro;
    configs.quantification.preprocessing.use_macro = true;
    configs.quantification.preprocessing.macro_code = "run(\"Smooth\");".into();

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let doc = ParameterDocument::from_resolved("", &registry, &resolved);
    let text = TextLogCodec.encode(&doc);
    assert!(text.contains("\t| setAutoThreshold(\"Otsu dark\");\n"));

    let decoded = TextLogCodec.decode(&text);
    assert_eq!(decoded, doc);
    match &decoded.record(1).unwrap().config.as_ref().unwrap().detection {
        ChannelDetection::Segmentation(seg) => match &seg.method {
            SegmentationMethod::Macro(m) => {
                assert_eq!(m.code.lines().count(), 2);
                assert!(m.result_in_manager);
            }
            other => panic!("unexpected method {other:?}"),
        },
        other => panic!("unexpected detection {other:?}"),
    }
}

#[test]
fn test_unused_channel_is_recorded_without_settings() {
    let mut registry = registry_with(2, &[(1, Role::Spot)], &[2]);
    let configs = normalized(&mut registry);
    registry.set_used(2, false).unwrap();
    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    let text = TextLogCodec.encode(&doc);
    assert!(text.contains("CHANNEL 2 (C2): NOT USED\n"));

    let decoded = TextLogCodec.decode(&text);
    let record = decoded.record(2).unwrap();
    assert!(!record.used);
    assert!(record.config.is_none());
    assert_eq!(decoded, doc);
}

#[test]
fn test_unknown_lines_are_skipped() {
    let text = "\
spotcell parameters
CALIBRATION: No calibration
CHANNEL 1 (DAPI): used
SEGMENTATION NUCLEI
Preprocessing:
\tProjection: none
Use Thresholding:
\tmethod: Otsu
\tunknown key: 7
\tminimum size: 80
Some line from a newer version
Exclude on edges: no
Final user validation: no
save Roi: yes
save mask: no
Quantification  Parameters
Measurements (intensity based): mean integrated_density volume
Measurements (morphological): area
Summary: no
Summary positive only: no
";
    let doc = TextLogCodec.decode(text);
    assert_eq!(doc.header, "spotcell parameters");
    assert_eq!(doc.calibration.as_deref(), Some("No calibration"));
    let config = doc.record(1).unwrap().config.as_ref().unwrap();
    assert_eq!(config.measurements.flags.len(), 3);
    match &config.detection {
        ChannelDetection::Segmentation(seg) => {
            assert!(!seg.exclude_on_edges);
            match &seg.method {
                SegmentationMethod::Threshold(p) => {
                    assert_eq!(p.min_size, 80.0);
                    assert_eq!(p.method.to_string(), "Otsu");
                }
                other => panic!("unexpected method {other:?}"),
            }
        }
        other => panic!("unexpected detection {other:?}"),
    }
}

#[test]
fn test_apply_restores_session() {
    let (registry, configs, resolved) = sample();
    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    let decoded = TextLogCodec.decode(&TextLogCodec.encode(&doc));

    let mut restored_registry = ChannelRegistry::new(4);
    let mut restored = RoleConfigurationSet::default();
    decoded
        .apply(&mut restored_registry, &mut restored, &mut MemoryStore::new())
        .unwrap();

    assert_eq!(restored_registry.channels(), registry.channels());
    assert_eq!(restored.nuclei.as_ref().unwrap().method(), configs.nuclei.as_ref().unwrap().method());
    assert_eq!(restored.cell.as_ref().unwrap().cytoplasm.min_size_percent, 12.0);
    assert!(restored.spot(3).unwrap().use_threshold);

    let again = SettingsResolver::new(&restored_registry, &restored)
        .resolve(&Calibration {
            name: "60x oil".to_string(),
            ..Calibration::default()
        })
        .unwrap();
    assert_eq!(
        ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &restored_registry, &again),
        doc
    );
}

#[test]
fn test_apply_with_unknown_channel_fails() {
    let (registry, _, resolved) = sample();
    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    let mut small = ChannelRegistry::new(2);
    let err = doc.apply(
        &mut small,
        &mut RoleConfigurationSet::default(),
        &mut MemoryStore::new(),
    );
    assert!(err.is_err());
}

#[test]
fn test_log_append_keeps_entries_and_decodes_last() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, resolved) = sample();
    let first = ParameterDocument::from_resolved("first run", &registry, &resolved);
    let mut second = first.clone();
    second.header = "second run".to_string();
    second.calibration = Some("No calibration".to_string());
    second.channels.truncate(2);

    let path = ParameterLog::append(dir.path(), &TextLogCodec.encode(&first)).unwrap();
    ParameterLog::append(dir.path(), &TextLogCodec.encode(&second)).unwrap();
    assert_eq!(path, dir.path().join(PARAMETER_LOG_FILE));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("first run\n"));
    assert!(text.ends_with("\n\n"));
    assert_eq!(text.matches("CALIBRATION:").count(), 2);

    let decoded = TextLogCodec.decode(&text);
    assert_eq!(decoded, second);
}

#[test]
fn test_disabled_projection_keeps_method_and_range() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei)], &[2]);
    let mut configs = normalized(&mut registry);
    let parked = ProjectionSpec {
        enabled: false,
        ..ProjectionSpec::enabled(ProjectionMethod::Sum)
    }
    .with_slices(2, 5);
    configs.nuclei.as_mut().unwrap().preprocessing.projection = parked;

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    let text = TextLogCodec.encode(&doc);
    assert!(text.contains("\tProjection: none (Sum)\n\tSlices 2-5\n"));
    assert!(text.contains("\tProjection: none\n"));

    let decoded = TextLogCodec.decode(&text);
    assert_eq!(decoded.record(1).unwrap().config.as_ref().unwrap().projection, parked);
    assert_eq!(decoded, doc);
}

#[test]
fn test_spot_measurements_round_trip() {
    let mut registry = registry_with(2, &[(1, Role::Nuclei), (2, Role::Spot)], &[]);
    let mut configs = normalized(&mut registry);
    let spot = configs.spot_mut(2).unwrap();
    spot.measurements.insert(Measurement::Area);
    spot.measurements.insert(Measurement::Skewness);

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let measured = &resolved.channel(2).unwrap().config.measurements;
    assert!(!measured.contains(Measurement::Area));
    assert!(measured.contains(Measurement::Skewness));

    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    assert_eq!(TextLogCodec.decode(&TextLogCodec.encode(&doc)), doc);
}

#[test]
fn test_quantified_role_channel_round_trip() {
    let mut registry = registry_with(3, &[(1, Role::Nuclei), (2, Role::Spot)], &[2, 3]);
    let mut configs = normalized(&mut registry);
    configs.quantification.measurements.insert(Measurement::Median);
    configs.quantification.measurements.summary = true;

    let resolved = SettingsResolver::new(&registry, &configs)
        .resolve(&Calibration::default())
        .unwrap();
    let doc = ParameterDocument::from_resolved(DEFAULT_LOG_HEADER, &registry, &resolved);
    let text = TextLogCodec.encode(&doc);
    assert_eq!(text.matches("Quantified: yes\n").count(), 1);

    let decoded = TextLogCodec.decode(&text);
    assert_eq!(decoded, doc);
    let spot = decoded.record(2).unwrap().config.as_ref().unwrap();
    let quant = spot.quantification.as_ref().unwrap();
    assert!(quant.contains(Measurement::Median));
    assert!(quant.summary);
    assert!(!spot.measurements.contains(Measurement::Median));

    let mut restored_registry = ChannelRegistry::new(3);
    let mut restored = RoleConfigurationSet::default();
    decoded
        .apply(&mut restored_registry, &mut restored, &mut MemoryStore::new())
        .unwrap();
    assert!(!restored_registry.channel(1).unwrap().quantify);
    assert!(restored_registry.channel(2).unwrap().quantify);
    assert!(restored_registry.channel(3).unwrap().quantify);
    assert!(restored.quantification.measurements.contains(Measurement::Median));
}
