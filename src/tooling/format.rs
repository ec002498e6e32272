//! Format command results as text.

use crate::ingest::IngestReport;
use crate::resolve::{Diagnostic, ResolutionReport};
use crate::store::{HashRecord, StoreStats};
use comfy_table::presets::{UTF8_BORDERS_ONLY, UTF8_FULL};
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::Path;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn count_cell(count: usize, bad: bool) -> String {
    if count == 0 {
        format!("{}", count.green())
    } else if bad {
        format!("{}", count.red())
    } else {
        count.to_string()
    }
}

/// Summary of an `update` run.
pub fn format_resolution_summary(report: &ResolutionReport, output: &Path) -> String {
    let stats = &report.stats;
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!(
            "Rebased {} -> {}",
            report.from_version, report.to_version
        ))
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Phase", "Entries"]);
    table.add_row(vec!["Same index".to_string(), stats.direct.to_string()]);
    table.add_row(vec!["Rescanned".to_string(), stats.rescanned.to_string()]);
    table.add_row(vec!["Relocated".to_string(), stats.relocated.to_string()]);
    table.add_row(vec![
        "Unresolved".to_string(),
        count_cell(stats.unresolved, true),
    ]);
    out.push_str(&format!("{}\n\n", table));

    out.push_str(&format!(
        "  Partitions: {} ({} skipped)\n",
        stats.partitions,
        count_cell(stats.skipped_partitions, true)
    ));
    out.push_str(&format!("  Entries: {}\n", stats.entries));
    out.push_str(&format!(
        "  Dropped actors: {}\n",
        count_cell(stats.dropped_actors, true)
    ));
    out.push_str(&format!("  Neighbors searched: {}\n", stats.neighbors_searched));
    out.push_str(&format!("  Written: {}\n", output.display()));

    if !report.unresolved.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Unresolved")));
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Partition", "Index", "Kind", "Type", "Reason"]);
        for entry in &report.unresolved {
            table.add_row(vec![
                entry.partition.clone(),
                entry.index.to_string(),
                entry.kind.to_string(),
                entry.node_type.clone().unwrap_or_else(|| "-".to_string()),
                format!("{:?}", entry.reason),
            ]);
        }
        out.push_str(&format!("{}\n", table));
    }

    let skipped: Vec<String> = report
        .diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::SnapshotNotFound { partition, version } => {
                Some(format!("  {} (no snapshot in {})", partition, version))
            }
            _ => None,
        })
        .collect();
    if !skipped.is_empty() {
        out.push_str(&format!(
            "\n{}\n\n",
            format_section_heading("Skipped partitions")
        ));
        out.push_str(&skipped.join("\n"));
        out.push('\n');
    }
    out
}

/// Registered versions, one per line.
pub fn format_versions(versions: &[String]) -> String {
    if versions.is_empty() {
        return "No versions registered.".to_string();
    }
    versions.join("\n")
}

pub fn format_stats(version: &str, stats: &StoreStats) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Version", "Partitions", "Payload bytes", "Store size on disk"]);
    table.add_row(vec![
        version.to_string(),
        stats.entries.to_string(),
        stats.payload_bytes.to_string(),
        stats.size_on_disk.to_string(),
    ]);
    table.to_string()
}

/// Partition keys of a version with their record counts.
pub fn format_partitions(version: &str, partitions: &[(String, Vec<HashRecord>)]) -> String {
    if partitions.is_empty() {
        return format!("Version {} has no partitions.", version);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Partition", "Records", "Instanced"]);
    for (key, records) in partitions {
        let instanced = records.iter().filter(|r| r.actor_hashes.is_some()).count();
        table.add_row(vec![
            key.clone(),
            records.len().to_string(),
            instanced.to_string(),
        ]);
    }
    table.to_string()
}

/// Full hashes of one partition snapshot.
pub fn format_records(key: &str, records: &[HashRecord]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(key));
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Index", "Structural hash", "Actor hashes"]);
    for (index, record) in records.iter().enumerate() {
        let actors = match &record.actor_hashes {
            Some(actors) => actors
                .iter()
                .map(|h| hex::encode(h.to_be_bytes()))
                .collect::<Vec<_>>()
                .join("\n"),
            None => "-".to_string(),
        };
        table.add_row(vec![
            index.to_string(),
            hex::encode(record.structural_hash.to_be_bytes()),
            actors,
        ]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_ingest_report(report: &IngestReport) -> String {
    let mut out = format!(
        "Ingested version {}: stored={}, skipped={}, failed={}, records={}\n",
        report.version,
        report.stored,
        report.skipped,
        count_cell(report.failures.len(), true),
        report.records
    );
    if !report.failures.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Partition", "Error"]);
        for failure in &report.failures {
            table.add_row(vec![failure.partition.clone(), failure.error.clone()]);
        }
        out.push_str(&format!("\n{}\n", table));
    }
    out
}
