//! `favsync status`: library version and what is on disk.
//!
//! Read-only: the library is scanned directly, without opening it, so
//! no migration runs and exiftool is not started.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use favsync_core::paths::{is_sidecar, sidecar_path, MARKER_FILE};
use favsync_library::marker;
use favsync_library::repository::PART_EXTENSION;
use favsync_library::LATEST_VERSION;

use crate::config::Settings;

/// Arguments for `favsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let root = &settings.library;
        if !root.is_dir() {
            println!(
                "No library at {}. Run `favsync sync` or `favsync migrate` to create one.",
                root.display()
            );
            return Ok(());
        }

        let report = build_report(root)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
struct StatusReport {
    root: PathBuf,
    /// `None` when the marker is missing (a version 0 library).
    version: Option<u32>,
    latest_version: u32,
    assets: usize,
    sidecars: usize,
    missing_sidecars: usize,
    partial_downloads: usize,
    /// Assets still directly under the root.
    unsorted: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "item")]
    item: &'static str,
    #[tabled(rename = "count")]
    count: String,
}

fn build_report(root: &Path) -> Result<StatusReport> {
    let version = marker::load(root)
        .with_context(|| format!("failed to read library marker in {}", root.display()))?
        .map(|m| m.version);
    let mut report = StatusReport {
        root: root.to_path_buf(),
        version,
        latest_version: LATEST_VERSION,
        ..StatusReport::default()
    };
    scan(root, root, &mut report)?;
    Ok(report)
}

fn scan(root: &Path, dir: &Path, report: &mut StatusReport) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();
        if path.is_dir() {
            scan(root, &path, report)?;
            continue;
        }
        if dir == root && path.file_name().is_some_and(|n| n == MARKER_FILE) {
            continue;
        }
        if is_sidecar(&path) {
            report.sidecars += 1;
        } else if path.extension().is_some_and(|ext| ext == PART_EXTENSION) {
            report.partial_downloads += 1;
        } else {
            report.assets += 1;
            if !sidecar_path(&path).is_file() {
                report.missing_sidecars += 1;
            }
            if dir == root {
                report.unsorted += 1;
            }
        }
    }
    Ok(())
}

fn print_table(report: &StatusReport) {
    let version = match report.version {
        Some(v) if v == report.latest_version => format!("v{v}").green().bold(),
        Some(v) => format!("v{v} (run `favsync migrate`)").yellow().bold(),
        None => "v0, no library.json (run `favsync migrate`)".yellow().bold(),
    };
    println!(
        "favsync v{} | library {} | {}",
        env!("CARGO_PKG_VERSION"),
        report.root.display(),
        version
    );

    let rows = vec![
        StatusTableRow {
            item: "assets",
            count: report.assets.to_string(),
        },
        StatusTableRow {
            item: "sidecars",
            count: report.sidecars.to_string(),
        },
        StatusTableRow {
            item: "assets without sidecar",
            count: highlight(report.missing_sidecars),
        },
        StatusTableRow {
            item: "partial downloads",
            count: highlight(report.partial_downloads),
        },
        StatusTableRow {
            item: "unsorted at root",
            count: highlight(report.unsorted),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn highlight(count: usize) -> String {
    if count == 0 {
        count.to_string()
    } else {
        count.to_string().red().bold().to_string()
    }
}
