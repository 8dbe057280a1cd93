//! Writing sweep results as JSON and CSV.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::WrapErr;
use serde::Serialize;

use trafficbench_core::analysis::{SeriesSet, SweepResults};

use crate::util::io::atomic_write_bytes;

/// Everything written for one finished sweep
#[derive(Debug, Serialize)]
pub struct SweepReport<'a> {
    pub name: &'a str,
    pub simulator: &'a str,
    pub repeats: usize,
    pub points_evaluated: usize,
    pub points_kept: usize,
    pub total_runs: usize,
    pub elapsed_secs: f64,
    pub series: &'a SeriesSet,
}

impl<'a> SweepReport<'a> {
    pub fn new(
        name: &'a str,
        simulator: &'a str,
        repeats: usize,
        results: &SweepResults,
        series: &'a SeriesSet,
        elapsed: Duration,
    ) -> Self {
        Self {
            name,
            simulator,
            repeats,
            points_evaluated: results.evaluated,
            points_kept: results.len(),
            total_runs: results.total_runs(),
            elapsed_secs: elapsed.as_secs_f64(),
            series,
        }
    }
}

/// Header row of column labels, then one row per kept point
pub fn render_csv(series: &SeriesSet) -> color_eyre::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(series.labels())?;
    for i in 0..series.len() {
        let row = series.row(i).unwrap_or_default();
        writer.write_record(row.iter().map(f64::to_string))?;
    }
    writer
        .into_inner()
        .map_err(|e| color_eyre::eyre::eyre!("cannot finish CSV: {}", e.error()))
}

/// Write `{out_dir}/{name}.json` and `{out_dir}/{name}.csv`, returning both paths
pub fn write_results(out_dir: &Path, report: &SweepReport<'_>) -> color_eyre::Result<[PathBuf; 2]> {
    fs::create_dir_all(out_dir)
        .wrap_err_with(|| format!("cannot create {}", out_dir.display()))?;

    let json_path = out_dir.join(format!("{}.json", report.name));
    let json = serde_json::to_vec_pretty(report)?;
    atomic_write_bytes(&json_path, &json)
        .wrap_err_with(|| format!("cannot write {}", json_path.display()))?;

    let csv_path = out_dir.join(format!("{}.csv", report.name));
    atomic_write_bytes(&csv_path, &render_csv(report.series)?)
        .wrap_err_with(|| format!("cannot write {}", csv_path.display()))?;

    Ok([json_path, csv_path])
}
