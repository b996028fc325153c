// Ingestion module
// Reads source documents from a directory and turns them into provenance-tagged chunks

pub mod chunking;


use std::fmt;
use std::fs;
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use chunking::{ChunkingConfig, chunk_document, estimate_token_count};

/// Provenance tag for chunks whose source document name is not known
pub const UNKNOWN_DOCUMENT: &str = "Unknown";

/// A bounded span of text extracted from a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// File name of the document this chunk came from
    pub source_document: String,
    /// Index of this chunk within its document
    pub position: usize,
}

impl Chunk {
    /// The provenance tag to cite, falling back to [`UNKNOWN_DOCUMENT`]
    #[inline]
    pub fn document_name(&self) -> &str {
        if self.source_document.trim().is_empty() {
            UNKNOWN_DOCUMENT
        } else {
            &self.source_document
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from the file extension, ignoring case
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// The full text of one source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

/// A document that was skipped during ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionWarning {
    pub file: PathBuf,
    pub reason: String,
}

impl fmt::Display for IngestionWarning {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped {}: {}", self.file.display(), self.reason)
    }
}

#[derive(Debug, Default)]
pub struct LoadedCorpus {
    pub documents: Vec<LoadedDocument>,
    pub warnings: Vec<IngestionWarning>,
}

/// Load every supported document in `dir`, in file name order.
///
/// Files that cannot be read or parsed are reported as warnings and skipped.
/// Only a missing or unreadable directory is an error.
#[inline]
pub fn load_directory(dir: &Path) -> crate::Result<LoadedCorpus> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && DocumentFormat::from_path(&path).is_some() {
            paths.push(path);
        } else {
            debug!("Ignoring unsupported entry {}", path.display());
        }
    }
    paths.sort();

    let mut corpus = LoadedCorpus::default();
    for path in paths {
        match load_document(&path) {
            Ok(document) if document.text.trim().is_empty() => {
                let warning = IngestionWarning {
                    file: path,
                    reason: "no extractable text".to_string(),
                };
                warn!("{}", warning);
                corpus.warnings.push(warning);
            }
            Ok(document) => {
                debug!(
                    "Loaded {} ({} characters)",
                    document.name,
                    document.text.len()
                );
                corpus.documents.push(document);
            }
            Err(e) => {
                let warning = IngestionWarning {
                    file: path,
                    reason: format!("{:#}", e),
                };
                warn!("{}", warning);
                corpus.warnings.push(warning);
            }
        }
    }

    info!(
        "Loaded {} documents from {} ({} skipped)",
        corpus.documents.len(),
        dir.display(),
        corpus.warnings.len()
    );
    Ok(corpus)
}

/// Read a single document and extract its text
#[inline]
pub fn load_document(path: &Path) -> anyhow::Result<LoadedDocument> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unsupported document type: {}", path.display()))?;

    let text = match format {
        DocumentFormat::Pdf => {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            extract_pdf_text(&bytes)?
        }
        DocumentFormat::PlainText => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
    };

    Ok(LoadedDocument {
        name: document_name(path),
        path: path.to_path_buf(),
        text,
    })
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| UNKNOWN_DOCUMENT.to_string(), ToString::to_string)
}

// The PDF parser panics on some malformed inputs; contain it to the one file.
fn extract_pdf_text(bytes: &[u8]) -> anyhow::Result<String> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(anyhow!("Failed to extract PDF text: {}", e)),
        Err(_) => Err(anyhow!("PDF parser aborted on malformed input")),
    }
}
