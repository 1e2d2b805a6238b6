use std::path::PathBuf;

use tracing::debug;

use crate::channel::Role;
use crate::consts::QUANTIFICATION_SECTION;
use crate::settings::measurements::MeasurementSet;
use crate::settings::method::{
    CellposeParams, CytoplasmOptions, FindMaximaParams, MacroSegmentation, SegmentationChoice,
    SegmentationMethod, StarDistParams, ThresholdMethod, ThresholdParams,
};
use crate::settings::projection::{ProjectionMethod, ProjectionSpec};
use crate::settings::resolver::{
    ChannelDetection, ResolvedChannelConfig, SegmentationSettings, SpotSettings,
};

use super::{ChannelRecord, ParameterDocument};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Key {
    Calibration,
    Channel,
    SegmentationNuclei,
    SegmentationCell,
    SpotDetection,
    Preprocessing,
    Projection,
    Slices,
    Macro,
    UseMethod(SegmentationChoice),
    Cytoplasm,
    FindMaxima,
    SpotThreshold,
    ExcludeOnEdges,
    FinalValidation,
    SaveRoi,
    SaveMask,
    Quantification,
    Quantified,
    IntensityMeasurements,
    MorphologicalMeasurements,
    SummaryPositiveOnly,
    Summary,
}

/// Matched against the line with leading whitespace removed, first hit wins.
const PREFIXES: &[(&str, Key)] = &[
    ("CALIBRATION:", Key::Calibration),
    ("CHANNEL ", Key::Channel),
    ("SEGMENTATION NUCLEI", Key::SegmentationNuclei),
    ("SEGMENTATION CELL", Key::SegmentationCell),
    ("SPOT DETECTION", Key::SpotDetection),
    ("Preprocessing:", Key::Preprocessing),
    ("Projection:", Key::Projection),
    ("Slices ", Key::Slices),
    ("Macro:", Key::Macro),
    ("Use Thresholding:", Key::UseMethod(SegmentationChoice::Threshold)),
    ("Use Cellpose:", Key::UseMethod(SegmentationChoice::Cellpose)),
    ("Use StarDist:", Key::UseMethod(SegmentationChoice::StarDist)),
    ("Use Macro:", Key::UseMethod(SegmentationChoice::Macro)),
    ("Cytoplasm:", Key::Cytoplasm),
    ("Use find maxima:", Key::FindMaxima),
    ("Use threshold:", Key::SpotThreshold),
    ("Exclude on edges:", Key::ExcludeOnEdges),
    ("Final user validation:", Key::FinalValidation),
    ("save Roi:", Key::SaveRoi),
    ("save mask:", Key::SaveMask),
    (QUANTIFICATION_SECTION, Key::Quantification),
    ("Quantified:", Key::Quantified),
    ("Measurements (intensity based):", Key::IntensityMeasurements),
    ("Measurements (morphological):", Key::MorphologicalMeasurements),
    ("Summary positive only:", Key::SummaryPositiveOnly),
    ("Summary:", Key::Summary),
];

fn classify(line: &str) -> Option<(Key, &str)> {
    PREFIXES
        .iter()
        .find_map(|&(prefix, key)| line.strip_prefix(prefix).map(|rest| (key, rest.trim())))
}

/// Section owning the tab-indented `key: value` lines that follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Block {
    None,
    Method(SegmentationChoice),
    Cytoplasm,
    FindMaxima,
    SpotThreshold,
}

/// Channel record under construction.
struct RecordBuilder {
    index: usize,
    protein_name: String,
    used: bool,
    role: Role,
    has_config: bool,
    projection: ProjectionSpec,
    macro_lines: Option<Vec<String>>,
    choice: SegmentationChoice,
    threshold: ThresholdParams,
    cellpose: CellposeParams,
    stardist: StarDistParams,
    macro_segmentation: MacroSegmentation,
    cytoplasm: Option<CytoplasmOptions>,
    exclude_on_edges: bool,
    final_validation: bool,
    find_maxima: Option<FindMaximaParams>,
    spot_threshold: Option<ThresholdParams>,
    save_rois: bool,
    save_masks: bool,
    measurements: MeasurementSet,
    quantification: Option<MeasurementSet>,
}

impl RecordBuilder {
    fn new(index: usize, protein_name: String, used: bool) -> Self {
        Self {
            index,
            protein_name,
            used,
            role: Role::Unassigned,
            has_config: false,
            projection: ProjectionSpec::disabled(),
            macro_lines: None,
            choice: SegmentationChoice::default(),
            threshold: ThresholdParams::default(),
            cellpose: CellposeParams::nuclei(),
            stardist: StarDistParams::default(),
            macro_segmentation: MacroSegmentation::default(),
            cytoplasm: None,
            exclude_on_edges: false,
            final_validation: false,
            find_maxima: None,
            spot_threshold: None,
            save_rois: false,
            save_masks: false,
            measurements: MeasurementSet::empty(),
            quantification: None,
        }
    }

    /// Set receiving measurement lines: the quantification pass once a
    /// `Quantified: yes` line was seen.
    fn measurement_target(&mut self) -> &mut MeasurementSet {
        match self.quantification.as_mut() {
            Some(set) => set,
            None => &mut self.measurements,
        }
    }

    /// `CHANNEL <n> (<protein>): used | NOT USED`
    fn from_header(rest: &str) -> Option<Self> {
        let (number, rest) = rest.split_once(' ')?;
        let index = number.trim().parse().ok()?;
        let rest = rest.trim();
        let close = rest.rfind("):")?;
        let protein = rest.strip_prefix('(')?.get(..close - 1)?;
        let used = rest[close + 2..].trim() != "NOT USED";
        Some(Self::new(index, protein.to_string(), used))
    }

    fn param(&mut self, block: Block, key: &str, value: &str) {
        let number = || value.parse::<f64>().ok();
        match (block, key) {
            (Block::Method(SegmentationChoice::Threshold), _) => {
                set_threshold(&mut self.threshold, key, value)
            }
            (Block::SpotThreshold, _) => {
                if let Some(t) = self.spot_threshold.as_mut() {
                    set_threshold(t, key, value);
                }
            }
            (Block::Method(SegmentationChoice::Cellpose), "model") => {
                self.cellpose.model = value.to_string()
            }
            (Block::Method(SegmentationChoice::Cellpose), "diameter") => {
                self.cellpose.diameter = number().unwrap_or(self.cellpose.diameter)
            }
            (Block::Method(SegmentationChoice::Cellpose), "probability threshold") => {
                self.cellpose.prob_threshold = number().unwrap_or(self.cellpose.prob_threshold)
            }
            (Block::Method(SegmentationChoice::Cellpose), "model path") => {
                self.cellpose.model_path = Some(PathBuf::from(value))
            }
            (Block::Method(SegmentationChoice::StarDist), "model") => {
                self.stardist.model = value.to_string()
            }
            (Block::Method(SegmentationChoice::StarDist), "percentile low") => {
                self.stardist.percentile_low = number().unwrap_or(self.stardist.percentile_low)
            }
            (Block::Method(SegmentationChoice::StarDist), "percentile high") => {
                self.stardist.percentile_high = number().unwrap_or(self.stardist.percentile_high)
            }
            (Block::Method(SegmentationChoice::StarDist), "probability threshold") => {
                self.stardist.prob_threshold = number().unwrap_or(self.stardist.prob_threshold)
            }
            (Block::Method(SegmentationChoice::StarDist), "nms threshold") => {
                self.stardist.nms_threshold = number().unwrap_or(self.stardist.nms_threshold)
            }
            (Block::Method(SegmentationChoice::StarDist), "scale") => {
                self.stardist.scale = number().unwrap_or(self.stardist.scale)
            }
            (Block::Method(SegmentationChoice::StarDist), "model path") => {
                self.stardist.model_path = Some(PathBuf::from(value))
            }
            (Block::Method(SegmentationChoice::Macro), "result in ROI manager") => {
                self.macro_segmentation.result_in_manager = is_yes(value)
            }
            (Block::Method(SegmentationChoice::Macro), "instance mask") => {
                self.macro_segmentation.result_is_instance_mask = is_yes(value)
            }
            (Block::Cytoplasm, "minimal cytoplasm size") => {
                if let (Some(c), Some(v)) = (self.cytoplasm.as_mut(), number()) {
                    c.min_size_percent = v;
                }
            }
            (Block::FindMaxima, "prominence") => {
                if let (Some(fm), Some(v)) = (self.find_maxima.as_mut(), number()) {
                    fm.prominence = v;
                }
            }
            _ => {}
        }
    }

    fn macro_code_line(&mut self, line: &str) {
        let code = &mut self.macro_segmentation.code;
        if !code.is_empty() {
            code.push('\n');
        }
        code.push_str(line);
    }

    fn finish(self) -> ChannelRecord {
        let config = if !self.has_config {
            None
        } else {
            let detection = match self.role {
                Role::Nuclei | Role::Cell => {
                    let method = match self.choice {
                        SegmentationChoice::Threshold => {
                            SegmentationMethod::Threshold(self.threshold)
                        }
                        SegmentationChoice::Cellpose => SegmentationMethod::Cellpose(self.cellpose),
                        SegmentationChoice::StarDist => SegmentationMethod::StarDist(self.stardist),
                        SegmentationChoice::Macro => {
                            SegmentationMethod::Macro(self.macro_segmentation)
                        }
                    };
                    ChannelDetection::Segmentation(SegmentationSettings {
                        method,
                        exclude_on_edges: self.exclude_on_edges,
                        final_validation: self.final_validation,
                        save_rois: self.save_rois,
                        save_masks: self.save_masks,
                        cytoplasm: self.cytoplasm,
                    })
                }
                Role::Spot => ChannelDetection::Spots(SpotSettings {
                    find_maxima: self.find_maxima,
                    threshold: self.spot_threshold,
                    save_rois: self.save_rois,
                    save_masks: self.save_masks,
                }),
                Role::Unassigned => ChannelDetection::QuantificationOnly,
            };
            Some(ResolvedChannelConfig {
                projection: self.projection,
                preprocess_macro: self.macro_lines.map(|lines| lines.join("\n")),
                measurements: self.measurements,
                detection,
                quantification: self.quantification,
            })
        };
        ChannelRecord {
            index: self.index,
            protein_name: self.protein_name,
            used: self.used,
            role: self.role,
            config,
        }
    }
}

fn is_yes(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

fn set_threshold(t: &mut ThresholdParams, key: &str, value: &str) {
    match key {
        "method" => t.method = ThresholdMethod::from_name(value).unwrap_or(t.method),
        "minimum size" => t.min_size = value.parse().unwrap_or(t.min_size),
        "watershed" => t.watershed = is_yes(value),
        _ => {}
    }
}

/// `<method>`, `none` or `none (<method>)`.
fn parse_projection(rest: &str) -> ProjectionSpec {
    if let Some(method) = ProjectionMethod::from_name(rest) {
        return ProjectionSpec::enabled(method);
    }
    let method = rest
        .strip_prefix("none")
        .and_then(|r| r.trim().strip_prefix('(')?.strip_suffix(')'))
        .and_then(ProjectionMethod::from_name)
        .unwrap_or_default();
    ProjectionSpec {
        method,
        ..ProjectionSpec::disabled()
    }
}

fn parse_slices(rest: &str) -> Option<(usize, usize)> {
    let (min, max) = rest.split_once('-')?;
    Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
}

/// Decode one log entry. A file holding several appended entries yields the
/// last one.
pub(super) fn decode(text: &str) -> ParameterDocument {
    let mut doc = ParameterDocument::default();
    let mut header = Vec::new();
    let mut current: Option<RecordBuilder> = None;
    let mut block = Block::None;
    let mut inside_macro = false;
    let mut skipped = 0usize;
    // Unrecognized lines since the last key; the header of a following entry.
    let mut tail: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        if inside_macro {
            if trimmed.starts_with("Measurements") || trimmed.starts_with("Use ") {
                inside_macro = false;
            } else {
                if let Some(lines) = current.as_mut().and_then(|r| r.macro_lines.as_mut()) {
                    lines.push(line.to_string());
                }
                continue;
            }
        }

        let Some((key, rest)) = classify(trimmed) else {
            match current.as_mut() {
                None if doc.calibration.is_none() => header.push(line.to_string()),
                Some(record) => {
                    if let (Block::Method(SegmentationChoice::Macro), Some(code)) =
                        (block, trimmed.strip_prefix('|'))
                    {
                        record.macro_code_line(code.strip_prefix(' ').unwrap_or(code));
                    } else if let Some((k, v)) = line
                        .starts_with('\t')
                        .then(|| trimmed.split_once(':'))
                        .flatten()
                    {
                        record.param(block, k.trim(), v.trim());
                    } else {
                        tail.push(line.to_string());
                        skipped += 1;
                    }
                }
                None => skipped += 1,
            }
            continue;
        };

        if key == Key::Calibration {
            // A later entry of an appended log replaces the earlier ones.
            if current.take().is_some() || !doc.channels.is_empty() {
                doc.channels.clear();
                header = tail
                    .drain(..)
                    .skip_while(|l| l.trim().is_empty())
                    .collect();
            }
            doc.calibration = Some(rest.to_string());
            continue;
        }
        tail.clear();
        if key == Key::Channel {
            if let Some(done) = current.take() {
                doc.channels.push(done.finish());
            }
            current = RecordBuilder::from_header(rest);
            if current.is_none() {
                skipped += 1;
            }
            block = Block::None;
            continue;
        }
        let Some(record) = current.as_mut() else {
            skipped += 1;
            continue;
        };
        match key {
            Key::SegmentationNuclei => {
                record.role = Role::Nuclei;
                record.has_config = true;
            }
            Key::SegmentationCell => {
                record.role = Role::Cell;
                record.cellpose = CellposeParams::cell();
                record.has_config = true;
            }
            Key::SpotDetection => {
                record.role = Role::Spot;
                record.threshold = ThresholdParams::for_spots();
                record.has_config = true;
            }
            Key::Preprocessing => block = Block::None,
            Key::Projection => record.projection = parse_projection(rest),
            Key::Slices => {
                if let Some((min, max)) = parse_slices(rest) {
                    record.projection = record.projection.with_slices(min, max);
                }
            }
            Key::Macro => {
                record.macro_lines = Some(Vec::new());
                inside_macro = true;
            }
            Key::UseMethod(choice) => {
                record.choice = choice;
                block = Block::Method(choice);
            }
            Key::Cytoplasm => {
                record.cytoplasm = Some(CytoplasmOptions {
                    extract: is_yes(rest),
                    ..CytoplasmOptions::default()
                });
                block = Block::Cytoplasm;
            }
            Key::FindMaxima => {
                record.find_maxima = is_yes(rest).then(FindMaximaParams::default);
                block = Block::FindMaxima;
            }
            Key::SpotThreshold => {
                record.spot_threshold = is_yes(rest).then(ThresholdParams::for_spots);
                block = Block::SpotThreshold;
            }
            Key::ExcludeOnEdges => record.exclude_on_edges = is_yes(rest),
            Key::FinalValidation => record.final_validation = is_yes(rest),
            Key::SaveRoi => record.save_rois = is_yes(rest),
            Key::SaveMask => record.save_masks = is_yes(rest),
            Key::Quantification => {
                record.has_config = true;
                block = Block::None;
            }
            Key::Quantified => {
                record.quantification = is_yes(rest).then(MeasurementSet::empty);
            }
            Key::IntensityMeasurements | Key::MorphologicalMeasurements => {
                record.measurement_target().insert_tokens(rest)
            }
            Key::Summary => record.measurement_target().summary = is_yes(rest),
            Key::SummaryPositiveOnly => {
                record.measurement_target().summary_positive_only = is_yes(rest)
            }
            Key::Calibration | Key::Channel => {}
        }
    }
    if let Some(done) = current.take() {
        doc.channels.push(done.finish());
    }
    doc.header = header.join("\n");
    debug!(
        channels = doc.channels.len(),
        skipped, "Parameter log decoded"
    );
    doc
}
