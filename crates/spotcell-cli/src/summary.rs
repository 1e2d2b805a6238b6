use console::Style;
use spotcell_core::batch::{BatchOutcome, BatchStatus};
use spotcell_core::experiment::{Experiment, FieldOfView};
use spotcell_core::settings::{ChannelDetection, ConsistencyReport, ResolvedConfigurationSet};

use crate::session::Session;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            warning: Style::new().yellow().bold(),
        }
    }
}

fn rule(len: usize) -> String {
    "\u{2550}".repeat(len)
}

pub fn print_session_summary(session: &Session, resolved: &ResolvedConfigurationSet) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("spotcell session"));
    println!("  {}", s.title.apply_to(rule(16)));
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Calibration"),
        s.value.apply_to(resolved.calibration.describe())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Ending"),
        s.value.apply_to(&session.ending_pattern)
    );
    println!();

    println!("  {}", s.header.apply_to("Channels"));
    for c in &session.channels {
        let label = format!("C{} {}", c.index, c.protein_name);
        match resolved.channel(c.index) {
            Some(rc) => {
                let detection = match &rc.config.detection {
                    ChannelDetection::Segmentation(seg) => seg.method.to_string(),
                    ChannelDetection::Spots(spots) => {
                        let mut modes = Vec::new();
                        if let Some(fm) = &spots.find_maxima {
                            modes.push(format!("find maxima ({})", fm.prominence));
                        }
                        if let Some(t) = &spots.threshold {
                            modes.push(format!("threshold ({})", t.method));
                        }
                        modes.join(" + ")
                    }
                    ChannelDetection::QuantificationOnly => "quantification".to_string(),
                };
                let projection = if rc.config.projection.enabled {
                    rc.config.projection.method.to_string()
                } else {
                    "none".to_string()
                };
                println!(
                    "    {:<16}{:<8}{}  {} {}",
                    s.label.apply_to(label),
                    s.value.apply_to(c.role),
                    s.method.apply_to(detection),
                    s.label.apply_to("projection"),
                    s.value.apply_to(projection),
                );
            }
            None => println!(
                "    {:<16}{}",
                s.label.apply_to(label),
                s.disabled.apply_to(if c.used { "idle" } else { "not used" })
            ),
        }
    }
    println!();
}

pub fn print_plan_summary(fields: &[FieldOfView], experiments: &[Experiment]) {
    let s = Styles::new();
    let used = fields.iter().filter(|f| f.used).count();

    println!("  {}", s.header.apply_to("Plan"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Fields"),
        s.value.apply_to(format!("{used} of {}", fields.len()))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Experiments"),
        s.value.apply_to(experiments.len())
    );
    for e in experiments {
        println!(
            "      {:<4}{:<24}{}",
            s.label.apply_to(e.field),
            s.value.apply_to(&e.name),
            s.method.apply_to(format!(
                "{} images, {} spot channel(s)",
                e.plan_count(),
                e.spots.len()
            ))
        );
    }
    println!();
}

pub fn print_warnings(report: &ConsistencyReport) {
    let s = Styles::new();
    println!("  {}", s.warning.apply_to("Warnings"));
    for w in &report.warnings {
        println!("    {}", s.warning.apply_to(w));
    }
    println!();
}

pub fn print_run_summary(outcome: &BatchOutcome) {
    let s = Styles::new();
    let status = match outcome.status {
        BatchStatus::Completed => s.method.apply_to("completed"),
        BatchStatus::Cancelled => s.disabled.apply_to("cancelled"),
    };
    println!();
    println!(
        "  {:<14}{} ({} of {} fields, {} rows)",
        s.label.apply_to("Run"),
        status,
        outcome.processed,
        outcome.total,
        outcome.tables.total_rows()
    );
}
