//! Persisting run output
use crate::error::ReportError;
use pacer_core::RunData;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
#[allow(unused)]
use tracing::{debug, info};

const ADHOC_SCENARIO: &str = "adhoc";

/// Write `data` as pretty JSON to `<reports_dir>/<scenario>/<run_id>/data.json` and return the
/// path written.
pub fn write(data: &RunData, reports_dir: &Path) -> Result<PathBuf, ReportError> {
    let scenario = if data.scenario.is_empty() {
        ADHOC_SCENARIO
    } else {
        &data.scenario
    };
    let run_dir = reports_dir.join(scenario).join(&data.run_id);
    fs::create_dir_all(&run_dir)?;

    let path = run_dir.join("data.json");
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    debug!("Wrote report to {}", path.display());
    Ok(path)
}
