use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::state::data_model::{self, Row};
use crate::state::selection::{CellCoord, SelectionRange};

const TARGET: &str = "gridcore::selection";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardOptions {
    #[serde(default)]
    pub copy_headers: bool,
    /// Field delimiter byte, tab by default.
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,
}

impl Default for ClipboardOptions {
    fn default() -> Self {
        Self {
            copy_headers: false,
            delimiter: default_delimiter(),
        }
    }
}

impl ClipboardOptions {
    fn writer_builder(&self) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary);
        builder
    }
}

/// Renders the union of `ranges` as delimited text, one record per selected
/// row. `rows` are the visible data rows and `fields` the visible column
/// fields, both indexed the same way as the range coordinates. Cells covered
/// by no range are left blank; coordinates outside `rows`/`fields` are
/// skipped. Cells holding the delimiter, a quote or a line break are quoted.
pub fn selection_to_text(
    ranges: &[SelectionRange],
    rows: &[&Row],
    fields: &[String],
    options: &ClipboardOptions,
) -> String {
    let row_indices: BTreeSet<usize> = ranges
        .iter()
        .flat_map(|r| r.row_start..=r.row_end)
        .filter(|idx| *idx < rows.len())
        .collect();
    let column_indices: BTreeSet<usize> = ranges
        .iter()
        .flat_map(|r| r.column_start..=r.column_end)
        .filter(|idx| *idx < fields.len())
        .collect();

    if row_indices.is_empty() || column_indices.is_empty() {
        return String::new();
    }

    let mut writer = options.writer_builder().from_writer(Vec::new());
    if options.copy_headers {
        let headers = column_indices.iter().map(|c| fields[*c].as_str());
        if let Err(err) = writer.write_record(headers) {
            tracing::warn!(target: TARGET, %err, "failed to write header record");
        }
    }

    for row_idx in &row_indices {
        let row = rows[*row_idx];
        let cells = column_indices.iter().map(|col_idx| {
            let cell = CellCoord::new(*row_idx, *col_idx);
            if ranges.iter().any(|r| r.contains(cell)) {
                data_model::display_value(data_model::field_value(row, &fields[*col_idx]))
            } else {
                String::new()
            }
        });
        if let Err(err) = writer.write_record(cells) {
            tracing::warn!(target: TARGET, row = *row_idx, %err, "failed to write record");
        }
    }

    let bytes = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(target: TARGET, err = %err.error(), "failed to flush clipboard text");
            return String::new();
        }
    };
    // The last record terminator is not part of the copied text.
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

fn default_delimiter() -> u8 {
    b'\t'
}
