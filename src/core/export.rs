use std::io::Write;

use super::types::PathMatrix;
use crate::{Error, Result};

pub const EXPORT_FILE_NAME: &str = "montecarlo.csv";

// Rows end in `\n` except the last.
pub fn paths_to_csv(paths: &PathMatrix) -> Result<String> {
    if paths.is_empty() {
        return Err(Error::EmptyExport);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let header = std::iter::once("month".to_string())
        .chain((1..=paths.path_count()).map(|idx| format!("Sim_{idx}")));
    writer.write_record(header)?;

    for month_idx in 0..paths.months() {
        let row = std::iter::once((month_idx + 1).to_string()).chain(
            paths
                .month_values(month_idx)
                .into_iter()
                .map(two_decimals),
        );
        writer.write_record(row)?;
    }

    let mut bytes = writer.into_inner().map_err(|e| e.into_error())?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(String::from_utf8(bytes)?)
}

pub fn write_paths_csv<W: Write>(paths: &PathMatrix, mut out: W) -> Result<()> {
    let text = paths_to_csv(paths)?;
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Fixed two-decimal rendering that rounds exact half-cent ties away from
/// zero and never prints a negative zero.
fn two_decimals(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    let scaled = value.abs() * 100.0;
    // Only multiples of 1/8 can sit exactly on a half cent.
    if (value * 8.0).fract() == 0.0 && scaled.fract() == 0.5 {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{:.2}", scaled.ceil() / 100.0);
    }
    format!("{value:.2}")
}
