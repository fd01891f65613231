//! Export the results sheet to CSV.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::Write;
use std::path::Path;

use crate::config::ResultHeaders;
use crate::model::row::LedgerRow;

/// Write `rows` to `output_path` under the configured header labels.
///
/// Columns follow the results sheet order; the checkbox is written as
/// `true`/`false`.
pub fn export_results_csv(
    rows: &[LedgerRow],
    headers: &ResultHeaders,
    output_path: &Path,
) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(output_path)?;

    // UTF-8 BOM for Excel
    file.write_all(&[0xEF, 0xBB, 0xBF])?;

    let header = headers
        .to_row()
        .iter()
        .map(|h| csv_escape(h))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(file, "{header}")?;

    for row in rows {
        let result = row.result.to_string();
        let fields = [
            row.selected.to_string(),
            csv_escape(&row.title),
            csv_escape(&row.received_at),
            csv_escape(&row.attachment_name),
            csv_escape(&row.save_name),
            csv_escape(&row.save_folder),
            csv_escape(&result),
            csv_escape(row.file_link.as_deref().unwrap_or("")),
            csv_escape(row.folder_link.as_deref().unwrap_or("")),
        ];
        writeln!(file, "{}", fields.join(","))?;
    }

    tracing::info!(path = %output_path.display(), rows = rows.len(), "Exported results");
    Ok(())
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
