use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::database::repo::Document;

pub fn resolve(document_dir: &Path, document: &Document) -> PathBuf {
    document
        .filename
        .split('/')
        .fold(document_dir.to_path_buf(), |path, part| path.join(part))
}

/// Hands the document's file to the platform's default application.
pub fn open_document(document_dir: &Path, document: &Document) -> Result<()> {
    let path = resolve(document_dir, document);
    if !path.is_file() {
        bail!("{} is catalogued but no longer exists", path.display());
    }

    info!("Opening {:?}", path);
    open::that(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(())
}
