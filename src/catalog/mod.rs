use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::database::repo::{AttachStatus, Document, Store};
use crate::error::{CatalogError, Result};
use crate::ingest::scanner::{filter_accepted, Scanner};

/// Where documents live and which extensions count as documents.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub directory: PathBuf,
    pub extensions: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Files that passed the extension filter.
    pub found: usize,
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct TaggedDocument {
    /// State after tagging.
    pub document: Document,
    pub tags: Vec<(String, AttachStatus)>,
}

#[derive(Debug)]
pub struct TagOutcome {
    pub document_id: i64,
    pub result: Result<TaggedDocument>,
}

pub struct Catalog {
    store: Store,
}

impl Catalog {
    /// Wraps an open store, upgrading it first when it was written by an
    /// older schema. A store with no tables is left untouched.
    pub fn open(mut store: Store) -> Result<Self> {
        if store.is_outdated()? {
            info!("Upgrading catalog schema");
            store.ensure_schema()?;
        }
        Ok(Self { store })
    }

    /// Registers every accepted file under the source directory that is not
    /// catalogued yet. Nothing is inserted when the directory can't be listed.
    pub fn index<S: Scanner + ?Sized>(
        &mut self,
        scanner: &S,
        source: &DocumentSource,
        recursive: bool,
    ) -> Result<IndexReport> {
        if !self.store.exists()? {
            info!("There is no database. Creating a new one");
            self.store.ensure_schema()?;
        }

        let files = scanner.list_files(&source.directory, recursive)?;
        let candidates = filter_accepted(files, &source.extensions);
        info!("Found {} files to index", candidates.len());

        let mut seen = HashSet::new();
        let mut staged = Vec::new();
        for filename in &candidates {
            if !seen.insert(filename.as_str()) {
                continue;
            }
            if self.store.contains_filename(filename)? {
                debug!("Already indexed: {}", filename);
                continue;
            }
            staged.push(filename.clone());
        }

        let summary = self.store.insert_documents(&staged)?;
        if summary.failed > 0 {
            warn!("{} documents could not be inserted", summary.failed);
        }
        info!("Indexed {} new documents", summary.inserted);

        Ok(IndexReport {
            found: candidates.len(),
            inserted: summary.inserted,
            failed: summary.failed,
        })
    }

    /// Tags each document in turn. A missing or failing document is
    /// reported in its outcome and does not stop the others.
    pub fn tag(&mut self, document_ids: &[i64], tag_values: &[String]) -> Vec<TagOutcome> {
        document_ids
            .iter()
            .map(|&document_id| {
                let result = self.tag_document(document_id, tag_values);
                if let Err(ref e) = result {
                    warn!("Tagging document {} failed: {}", document_id, e);
                }
                TagOutcome { document_id, result }
            })
            .collect()
    }

    fn tag_document(&mut self, document_id: i64, tag_values: &[String]) -> Result<TaggedDocument> {
        self.get(document_id)?;
        let tags = self.store.attach_tags(document_id, tag_values)?;
        let document = self.get(document_id)?;
        Ok(TaggedDocument { document, tags })
    }

    pub fn find(&self, name: Option<&str>, tag: Option<&str>) -> Result<Vec<Document>> {
        if !self.store.exists()? {
            return Ok(Vec::new());
        }
        self.store.find(name, tag)
    }

    /// `limit == 0` lists everything.
    pub fn list(&self, limit: i64) -> Result<Vec<Document>> {
        if limit < 0 {
            return Err(CatalogError::Usage(format!(
                "limit must be zero or positive, got {limit}"
            )));
        }
        if !self.store.exists()? {
            return Ok(Vec::new());
        }

        let limit = match limit {
            0 => None,
            n => Some(u32::try_from(n).unwrap_or(u32::MAX)),
        };
        self.store.list(limit)
    }

    pub fn get(&self, id: i64) -> Result<Document> {
        if !self.store.exists()? {
            return Err(CatalogError::document_not_found(id));
        }
        self.store
            .document(id)?
            .ok_or_else(|| CatalogError::document_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::LEGACY_LAYOUT;
    use crate::ingest::scanner::{FsScanner, ScanError};
    use anyhow::Result;
    use std::fs::File;
    use std::path::Path;

    /// Hands back a fixed listing, whatever the directory.
    struct FixedScanner(Vec<&'static str>);

    impl Scanner for FixedScanner {
        fn list_files(
            &self,
            _root: &Path,
            _recursive: bool,
        ) -> std::result::Result<Vec<String>, ScanError> {
            Ok(self.0.iter().map(|f| f.to_string()).collect())
        }
    }

    fn source(exts: &[&str]) -> DocumentSource {
        DocumentSource {
            directory: PathBuf::from("/documents"),
            extensions: exts.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn catalog() -> Result<Catalog> {
        Ok(Catalog::open(Store::open_in_memory()?)?)
    }

    fn filenames(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.filename.as_str()).collect()
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_index_creates_schema_and_reports_counts() -> Result<()> {
        let mut catalog = catalog()?;
        let scanner = FixedScanner(vec!["report.pdf", "notes.txt", "image.png"]);

        let report = catalog.index(&scanner, &source(&["pdf", "txt"]), false)?;

        assert_eq!(report, IndexReport { found: 2, inserted: 2, failed: 0 });
        assert!(catalog.store.exists()?);
        Ok(())
    }

    #[test]
    fn test_index_is_idempotent() -> Result<()> {
        let mut catalog = catalog()?;
        let scanner = FixedScanner(vec!["a.txt", "b.txt"]);

        catalog.index(&scanner, &source(&["txt"]), false)?;
        let second = catalog.index(&scanner, &source(&["txt"]), false)?;

        assert_eq!(second.found, 2);
        assert_eq!(second.inserted, 0);
        Ok(())
    }

    #[test]
    fn test_index_never_duplicates_a_filename() -> Result<()> {
        let mut catalog = catalog()?;
        let scanner = FixedScanner(vec!["a.txt", "b.txt", "a.txt"]);

        let report = catalog.index(&scanner, &source(&["txt"]), false)?;

        assert_eq!(report.inserted, 2);
        assert_eq!(filenames(&catalog.list(0)?), vec!["a.txt", "b.txt"]);
        Ok(())
    }

    #[test]
    fn test_index_missing_directory_inserts_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = catalog()?;
        let source = DocumentSource {
            directory: dir.path().join("missing"),
            extensions: ["txt".to_string()].into_iter().collect(),
        };

        let err = catalog.index(&FsScanner, &source, false).unwrap_err();

        assert!(matches!(err, CatalogError::Configuration(_)));
        assert!(catalog.list(0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_index_recursive_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("2024"))?;
        File::create(dir.path().join("top.txt"))?;
        File::create(dir.path().join("2024").join("taxes.pdf"))?;
        let source = DocumentSource {
            directory: dir.path().to_path_buf(),
            extensions: ["txt".to_string(), "pdf".to_string()].into_iter().collect(),
        };
        let mut catalog = catalog()?;

        let flat = catalog.index(&FsScanner, &source, false)?;
        let deep = catalog.index(&FsScanner, &source, true)?;

        assert_eq!(flat.inserted, 1);
        assert_eq!(deep, IndexReport { found: 2, inserted: 1, failed: 0 });
        assert_eq!(filenames(&catalog.list(0)?), vec!["top.txt", "2024/taxes.pdf"]);
        Ok(())
    }

    #[test]
    fn test_tag_reuses_existing_tag() -> Result<()> {
        let mut catalog = catalog()?;
        catalog.index(&FixedScanner(vec!["a.txt", "b.txt"]), &source(&["txt"]), false)?;

        catalog.tag(&[1], &tags(&["work"]));
        catalog.tag(&[2], &tags(&["work"]));

        let conn = catalog.store.conn();
        let tag_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM Tag WHERE value = 'work'", [], |r| r.get(0))?;
        let links: i64 = conn.query_row("SELECT COUNT(*) FROM association", [], |r| r.get(0))?;
        assert_eq!(tag_rows, 1);
        assert_eq!(links, 2);
        Ok(())
    }

    #[test]
    fn test_tag_partial_failure() -> Result<()> {
        let mut catalog = catalog()?;
        catalog.index(&FixedScanner(vec!["a.txt"]), &source(&["txt"]), false)?;

        let outcomes = catalog.tag(&[1, 9999], &tags(&["urgent"]));

        assert_eq!(outcomes.len(), 2);
        let tagged = outcomes[0].result.as_ref().expect("document 1 tagged");
        assert_eq!(tagged.document.tags, vec!["urgent"]);
        assert_eq!(tagged.tags, vec![("urgent".to_string(), AttachStatus::Attached)]);

        assert_eq!(outcomes[1].document_id, 9999);
        assert!(outcomes[1].result.as_ref().unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_tag_twice_is_idempotent() -> Result<()> {
        let mut catalog = catalog()?;
        catalog.index(&FixedScanner(vec!["a.txt"]), &source(&["txt"]), false)?;

        catalog.tag(&[1], &tags(&["work"]));
        let outcomes = catalog.tag(&[1], &tags(&["work", "work"]));

        let tagged = outcomes[0].result.as_ref().expect("document 1 tagged");
        assert!(tagged.tags.iter().all(|(_, s)| *s == AttachStatus::AlreadyPresent));
        assert_eq!(catalog.get(1)?.tags, vec!["work"]);
        Ok(())
    }

    #[test]
    fn test_tag_before_index_is_not_found() -> Result<()> {
        let mut catalog = catalog()?;

        let outcomes = catalog.tag(&[1], &tags(&["work"]));

        assert!(outcomes[0].result.as_ref().unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_find_filters() -> Result<()> {
        let mut catalog = catalog()?;
        let scanner = FixedScanner(vec!["report.pdf", "report-draft.txt", "notes.txt", "xray.txt"]);
        catalog.index(&scanner, &source(&["pdf", "txt"]), false)?;
        catalog.tag(&[2, 4], &tags(&["y"]));

        assert_eq!(
            filenames(&catalog.find(Some("report"), None)?),
            vec!["report.pdf", "report-draft.txt"]
        );
        assert_eq!(
            filenames(&catalog.find(None, Some("y"))?),
            vec!["report-draft.txt", "xray.txt"]
        );
        assert_eq!(filenames(&catalog.find(Some("x"), Some("y"))?), vec!["xray.txt"]);
        assert_eq!(catalog.find(None, None)?.len(), 4);
        assert!(catalog.find(Some("Report"), None)?.is_empty());
        assert!(catalog.find(None, Some("missing"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_find_on_empty_store() -> Result<()> {
        let catalog = catalog()?;

        assert!(catalog.find(Some("a"), None)?.is_empty());
        assert!(catalog.list(0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_list_bounds() -> Result<()> {
        let names: Vec<&'static str> = vec![
            "01.txt", "02.txt", "03.txt", "04.txt", "05.txt", "06.txt", "07.txt", "08.txt",
            "09.txt", "10.txt", "11.txt", "12.txt", "13.txt", "14.txt", "15.txt",
        ];
        let mut catalog = catalog()?;
        catalog.index(&FixedScanner(names), &source(&["txt"]), false)?;

        let ten = catalog.list(10)?;
        assert_eq!(ten.len(), 10);
        assert_eq!(ten.iter().map(|d| d.id).collect::<Vec<_>>(), (1..=10).collect::<Vec<i64>>());
        assert_eq!(catalog.list(0)?.len(), 15);
        assert_eq!(catalog.list(100)?.len(), 15);
        assert!(matches!(catalog.list(-1), Err(CatalogError::Usage(_))));
        Ok(())
    }

    #[test]
    fn test_tag_failure_keeps_earlier_documents() -> Result<()> {
        let mut catalog = catalog()?;
        let scanner = FixedScanner(vec!["a.txt", "b.txt", "c.txt"]);
        catalog.index(&scanner, &source(&["txt"]), false)?;
        catalog.store.conn().execute_batch(
            "CREATE TRIGGER refuse_second BEFORE INSERT ON association
             WHEN NEW.document_id = 2
             BEGIN SELECT RAISE(ABORT, 'refused'); END;",
        )?;

        let outcomes = catalog.tag(&[1, 2, 3], &tags(&["work"]));

        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(CatalogError::Persistence(_))));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(catalog.get(1)?.tags, vec!["work"]);
        assert!(catalog.get(2)?.tags.is_empty());
        assert_eq!(catalog.get(3)?.tags, vec!["work"]);
        assert_eq!(filenames(&catalog.find(None, Some("work"))?), vec!["a.txt", "c.txt"]);
        Ok(())
    }

    #[test]
    fn test_open_upgrades_legacy_store() -> Result<()> {
        let store = Store::open_in_memory()?;
        store.conn().execute_batch(LEGACY_LAYOUT)?;
        store.conn().execute_batch(
            "INSERT INTO Document (id, filename) VALUES (1, 'a.txt'), (2, 'b.txt'), (3, 'a.txt');
             INSERT INTO Tag (id, value) VALUES (1, 'work');
             INSERT INTO association VALUES (3, 1), (3, 1);",
        )?;

        let mut catalog = Catalog::open(store)?;

        let listed = catalog.list(0)?;
        assert_eq!(filenames(&listed), vec!["a.txt", "b.txt"]);
        assert_eq!(listed[0].name, "a.txt");
        assert_eq!(listed[0].tags, vec!["work"]);
        assert_eq!(filenames(&catalog.find(None, Some("work"))?), vec!["a.txt"]);

        let scanner = FixedScanner(vec!["a.txt", "b.txt", "c.txt"]);
        let report = catalog.index(&scanner, &source(&["txt"]), false)?;
        assert_eq!(report, IndexReport { found: 3, inserted: 1, failed: 0 });

        let outcomes = catalog.tag(&[2], &tags(&["work"]));
        assert!(outcomes[0].result.is_ok());
        assert_eq!(filenames(&catalog.find(None, Some("work"))?), vec!["a.txt", "b.txt"]);
        Ok(())
    }

    #[test]
    fn test_open_leaves_empty_store_alone() -> Result<()> {
        let catalog = catalog()?;

        assert!(!catalog.store.exists()?);
        Ok(())
    }

    #[test]
    fn test_get_missing_document() -> Result<()> {
        let mut catalog = catalog()?;
        catalog.index(&FixedScanner(vec!["a.txt"]), &source(&["txt"]), false)?;

        assert_eq!(catalog.get(1)?.filename, "a.txt");
        assert!(catalog.get(2).unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_report_scenario() -> Result<()> {
        let mut catalog = catalog()?;
        let scanner = FixedScanner(vec!["report.pdf", "notes.txt", "image.png"]);

        let report = catalog.index(&scanner, &source(&["pdf", "txt"]), false)?;
        assert_eq!((report.found, report.inserted), (2, 2));

        let found = catalog.find(Some("report"), None)?;
        assert_eq!(filenames(&found), vec!["report.pdf"]);

        let outcomes = catalog.tag(&[found[0].id], &tags(&["work", "urgent"]));
        assert!(outcomes[0].result.is_ok());

        let work = catalog.find(None, Some("work"))?;
        assert_eq!(filenames(&work), vec!["report.pdf"]);
        assert_eq!(work[0].tags, vec!["urgent", "work"]);
        Ok(())
    }
}
