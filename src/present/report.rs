use crate::catalog::{IndexReport, TagOutcome};
use crate::database::repo::AttachStatus;

pub fn index_lines(report: &IndexReport) -> Vec<String> {
    let mut lines = vec![
        format!("Found {} files to index", report.found),
        format!("Indexed {} new documents", report.inserted),
    ];
    if report.failed > 0 {
        lines.push(format!("{} documents could not be indexed", report.failed));
    }
    lines
}

pub fn tag_lines(outcomes: &[TagOutcome]) -> Vec<String> {
    let mut lines = Vec::new();
    for outcome in outcomes {
        match &outcome.result {
            Ok(tagged) => {
                for (value, status) in &tagged.tags {
                    lines.push(match status {
                        AttachStatus::Attached => {
                            format!("Added '{}' to '{}'", value, tagged.document.filename)
                        }
                        AttachStatus::AlreadyPresent => {
                            format!("'{}' already on '{}'", value, tagged.document.filename)
                        }
                    });
                }
            }
            Err(e) if e.is_not_found() => {
                lines.push(format!("No document with ID {}", outcome.document_id));
            }
            Err(e) => {
                lines.push(format!("Failed to tag document {}: {}", outcome.document_id, e));
            }
        }
    }
    lines
}
