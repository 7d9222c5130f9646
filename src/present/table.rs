use anyhow::Result;

use crate::database::repo::Document;

const FILENAME_WIDTH: usize = 60;
const ELLIPSIS: &str = "...";

/// Renders documents as an `ID | Filename | Tags` table with a header rule.
pub fn render(documents: &[Document]) -> String {
    let rows: Vec<[String; 3]> = documents
        .iter()
        .map(|doc| {
            [
                doc.id.to_string(),
                truncate(&doc.filename, FILENAME_WIDTH),
                doc.tags.join(", "),
            ]
        })
        .collect();

    let header = ["ID", "Filename", "Tags"];
    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&line(&header.map(String::from), &widths));
    out.push_str(
        &widths
            .iter()
            .map(|w| "=".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+"),
    );
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row, &widths));
    }
    out
}

fn line(cells: &[String; 3], widths: &[usize; 3]) -> String {
    let mut out = format!(
        " {:>id$} | {:<name$} | {:<tags$}",
        cells[0],
        cells[1],
        cells[2],
        id = widths[0],
        name = widths[1],
        tags = widths[2]
    );
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut cut: String = value.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}

pub fn render_json(documents: &[Document]) -> Result<String> {
    Ok(serde_json::to_string_pretty(documents)?)
}
