use std::fs;
use std::panic;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

/// Characters of each document forwarded into a prompt.
pub const EXCERPT_CHARS: usize = 3000;

const TEXT_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];
const PDF_EXTENSION: &str = "pdf";

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("knowledge base directory {path} is not readable: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read knowledge document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Text,
    Pdf,
}

impl DocumentFormat {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Text)
        } else if ext == PDF_EXTENSION {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    fn read(self, path: &Path) -> Result<String, DocumentError> {
        match self {
            Self::Text => Ok(fs::read_to_string(path)?),
            Self::Pdf => {
                let bytes = fs::read(path)?;
                // Extraction panics on some malformed font programs.
                panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
                    .map_err(|_| DocumentError::Pdf("extractor aborted on malformed content".to_string()))?
                    .map(|text| text.trim().to_string())
                    .map_err(|err| DocumentError::Pdf(err.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeDocument {
    pub name: String,
    pub content: String,
}

impl KnowledgeDocument {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// First [`EXCERPT_CHARS`] characters, cut on a character boundary.
    pub fn excerpt(&self) -> &str {
        match self.content.char_indices().nth(EXCERPT_CHARS) {
            Some((index, _)) => &self.content[..index],
            None => &self.content,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.content.chars().nth(EXCERPT_CHARS).is_some()
    }
}

/// Sales reference material cited by pre-call plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeBase {
    documents: Vec<KnowledgeDocument>,
}

impl KnowledgeBase {
    pub fn new(documents: Vec<KnowledgeDocument>) -> Self {
        Self { documents }
    }

    /// Loads `.md`, `.markdown`, `.txt` and `.pdf` files from `dir`, ordered by file name.
    /// PDF documents contribute their extracted text.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| KnowledgeError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| KnowledgeError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            match DocumentFormat::of(&path) {
                Some(format) if path.is_file() => paths.push((path, format)),
                _ => {
                    debug!(path = %path.display(), "skipping non-document entry");
                }
            }
        }
        paths.sort_by(|a, b| a.0.cmp(&b.0));

        let mut documents = Vec::with_capacity(paths.len());
        for (path, format) in paths {
            let content = format.read(&path).map_err(|source| KnowledgeError::Document {
                path: path.clone(),
                source,
            })?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push(KnowledgeDocument::new(name, content));
        }

        if documents.is_empty() {
            warn!(dir = %dir.display(), "knowledge base directory holds no documents");
        }

        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.documents.iter().map(|doc| doc.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_supported_documents_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("pricing.md"), "# Pricing\nTiered plans.").expect("write");
        fs::write(dir.path().join("competitors.txt"), "Vendor X lacks SSO.").expect("write");
        fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).expect("write");
        fs::create_dir(dir.path().join("archive.md")).expect("mkdir");

        let knowledge = KnowledgeBase::load_dir(dir.path()).expect("loads");
        assert_eq!(knowledge.names(), ["competitors.txt", "pricing.md"]);
        assert_eq!(knowledge.documents()[1].content, "# Pricing\nTiered plans.");
    }

    /// Single-page PDF showing `text` in Helvetica, with a valid xref table.
    fn single_page_pdf(text: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
        }

        let xref = pdf.len();
        let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            table.push_str(&format!("{offset:010} 00000 n \n"));
        }
        table.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        pdf.extend_from_slice(table.as_bytes());
        pdf
    }

    #[test]
    fn pdf_documents_contribute_extracted_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("competitive_intelligence.pdf"),
            single_page_pdf("Usage based pricing wins renewals"),
        )
        .expect("write");
        fs::write(dir.path().join("pricing.md"), "# Pricing").expect("write");

        let knowledge = KnowledgeBase::load_dir(dir.path()).expect("loads");
        assert_eq!(knowledge.names(), ["competitive_intelligence.pdf", "pricing.md"]);
        let extracted = &knowledge.documents()[0].content;
        assert!(
            extracted.contains("Usage based pricing wins renewals"),
            "extracted {extracted:?}"
        );
    }

    #[test]
    fn unreadable_pdf_is_a_document_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("battlecard.pdf");
        fs::write(&path, b"not a pdf at all").expect("write");

        let err = KnowledgeBase::load_dir(dir.path()).expect_err("bad pdf");
        assert!(matches!(
            err,
            KnowledgeError::Document { path: ref failed, source: DocumentError::Pdf(_) } if *failed == path
        ));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = KnowledgeBase::load_dir(dir.path().join("absent")).expect_err("missing dir");
        assert!(matches!(err, KnowledgeError::Directory { .. }));
    }

    #[test]
    fn excerpt_cuts_long_documents_on_char_boundary() {
        let content = "é".repeat(EXCERPT_CHARS + 10);
        let document = KnowledgeDocument::new("long.md", content);
        assert!(document.is_truncated());
        assert_eq!(document.excerpt().chars().count(), EXCERPT_CHARS);

        let short = KnowledgeDocument::new("short.md", "brief");
        assert!(!short.is_truncated());
        assert_eq!(short.excerpt(), "brief");
    }
}
