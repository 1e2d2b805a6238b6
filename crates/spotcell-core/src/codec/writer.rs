use std::fmt::Write;

use crate::channel::Role;
use crate::consts::QUANTIFICATION_SECTION;
use crate::settings::measurements::MeasurementSet;
use crate::settings::method::{SegmentationMethod, ThresholdParams};
use crate::settings::projection::{ProjectionMethod, ProjectionSpec};
use crate::settings::resolver::{
    ChannelDetection, ResolvedChannelConfig, SegmentationSettings, SpotSettings,
};

use super::{ChannelRecord, ParameterDocument};

pub(super) fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Accumulates lines; `fmt::Write` on `String` cannot fail.
struct Lines(String);

impl Lines {
    fn line(&mut self, text: impl AsRef<str>) {
        self.0.push_str(text.as_ref());
        self.0.push('\n');
    }

    fn param(&mut self, key: &str, value: impl std::fmt::Display) {
        let _ = writeln!(self.0, "\t{key}: {value}");
    }
}

pub(super) fn encode(doc: &ParameterDocument) -> String {
    let mut out = Lines(String::new());
    for line in doc.header.lines() {
        out.line(line);
    }
    if let Some(calibration) = &doc.calibration {
        out.line(format!("CALIBRATION: {calibration}"));
    }
    for record in &doc.channels {
        write_record(&mut out, record);
    }
    out.0
}

fn write_record(out: &mut Lines, record: &ChannelRecord) {
    let state = if record.used { "used" } else { "NOT USED" };
    out.line(format!(
        "CHANNEL {} ({}): {state}",
        record.index, record.protein_name
    ));
    let Some(config) = &record.config else {
        return;
    };
    match &config.detection {
        ChannelDetection::Segmentation(seg) => {
            out.line(if record.role == Role::Cell {
                "SEGMENTATION CELL"
            } else {
                "SEGMENTATION NUCLEI"
            });
            write_preprocessing(out, config);
            write_segmentation(out, seg);
        }
        ChannelDetection::Spots(spots) => {
            out.line("SPOT DETECTION");
            write_preprocessing(out, config);
            write_spots(out, spots);
        }
        ChannelDetection::QuantificationOnly => {}
    }
    out.line(QUANTIFICATION_SECTION);
    if matches!(config.detection, ChannelDetection::QuantificationOnly) {
        write_preprocessing(out, config);
    }
    write_measurements(out, &config.measurements, record.role.is_segmentation());
    if let Some(set) = &config.quantification {
        out.line("Quantified: yes");
        write_measurements(out, set, false);
    }
}

fn write_preprocessing(out: &mut Lines, config: &ResolvedChannelConfig) {
    out.line("Preprocessing:");
    write_projection(out, &config.projection);
    if let Some(code) = &config.preprocess_macro {
        out.line("\tMacro:");
        for line in code.lines() {
            out.line(line);
        }
    }
}

/// A disabled projection keeps a non-default method as `none (<method>)`
/// and its slice range, so re-enabling it after a restore is lossless.
fn write_projection(out: &mut Lines, projection: &ProjectionSpec) {
    if projection.enabled {
        out.param("Projection", projection.method);
    } else if projection.method == ProjectionMethod::default() {
        out.param("Projection", "none");
    } else {
        out.param("Projection", format!("none ({})", projection.method));
    }
    if let Some(range) = projection.slice_range {
        out.line(format!("\tSlices {}-{}", range.min, range.max));
    }
}

fn write_threshold(out: &mut Lines, p: &ThresholdParams) {
    out.param("method", p.method);
    out.param("minimum size", p.min_size);
    out.param("watershed", yes_no(p.watershed));
}

fn write_segmentation(out: &mut Lines, seg: &SegmentationSettings) {
    match &seg.method {
        SegmentationMethod::Threshold(p) => {
            out.line("Use Thresholding:");
            write_threshold(out, p);
        }
        SegmentationMethod::Cellpose(p) => {
            out.line("Use Cellpose:");
            out.param("model", &p.model);
            out.param("diameter", p.diameter);
            out.param("probability threshold", p.prob_threshold);
            if let Some(path) = &p.model_path {
                out.param("model path", path.display());
            }
        }
        SegmentationMethod::StarDist(p) => {
            out.line("Use StarDist:");
            out.param("model", &p.model);
            out.param("percentile low", p.percentile_low);
            out.param("percentile high", p.percentile_high);
            out.param("probability threshold", p.prob_threshold);
            out.param("nms threshold", p.nms_threshold);
            out.param("scale", p.scale);
            if let Some(path) = &p.model_path {
                out.param("model path", path.display());
            }
        }
        SegmentationMethod::Macro(m) => {
            out.line("Use Macro:");
            out.param("result in ROI manager", yes_no(m.result_in_manager));
            out.param("instance mask", yes_no(m.result_is_instance_mask));
            for line in m.code.lines() {
                out.line(format!("\t| {line}"));
            }
        }
    }
    if let Some(cytoplasm) = &seg.cytoplasm {
        out.line(format!("Cytoplasm: {}", yes_no(cytoplasm.extract)));
        if cytoplasm.extract {
            out.param("minimal cytoplasm size", cytoplasm.min_size_percent);
        }
    }
    out.line(format!("Exclude on edges: {}", yes_no(seg.exclude_on_edges)));
    out.line(format!(
        "Final user validation: {}",
        yes_no(seg.final_validation)
    ));
    write_outputs(out, seg.save_rois, seg.save_masks);
}

fn write_spots(out: &mut Lines, spots: &SpotSettings) {
    out.line(format!(
        "Use find maxima: {}",
        yes_no(spots.find_maxima.is_some())
    ));
    if let Some(fm) = &spots.find_maxima {
        out.param("prominence", fm.prominence);
    }
    out.line(format!("Use threshold: {}", yes_no(spots.threshold.is_some())));
    if let Some(t) = &spots.threshold {
        write_threshold(out, t);
    }
    write_outputs(out, spots.save_rois, spots.save_masks);
}

fn write_outputs(out: &mut Lines, save_rois: bool, save_masks: bool) {
    out.line(format!("save Roi: {}", yes_no(save_rois)));
    out.line(format!("save mask: {}", yes_no(save_masks)));
}

fn write_measurements(out: &mut Lines, set: &MeasurementSet, segmentation: bool) {
    out.line(format!(
        "Measurements (intensity based): {}",
        MeasurementSet::tokens(set.intensity())
    ));
    if segmentation {
        out.line(format!(
            "Measurements (morphological): {}",
            MeasurementSet::tokens(set.morphological())
        ));
    }
    out.line(format!("Summary: {}", yes_no(set.summary)));
    out.line(format!(
        "Summary positive only: {}",
        yes_no(set.summary_positive_only)
    ));
}
