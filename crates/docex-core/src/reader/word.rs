//! Word (OOXML) reader.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;
use zip::ZipArchive;

use super::{
    io_error, validate_common, FormatStrategy, ReaderLimits, Result, ValidationReport, OLE_MAGIC,
    ZIP_MAGIC,
};
use crate::error::ReaderError;
use crate::models::document::{EncryptionStatus, ExtractedDocument, FileMetadata, TextSource};

const NAME: &str = "word";
const MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const EXTENSIONS: &[&str] = &["docx", "docm"];

const DOCUMENT_PART: &str = "word/document.xml";
const APP_PART: &str = "docProps/app.xml";
const CORE_PART: &str = "docProps/core.xml";

/// Reader for Word documents.
///
/// Password-protected OOXML files are stored as OLE containers, so an OLE
/// signature on a `.docx` means the document is encrypted.
#[derive(Debug, Default)]
pub struct WordReader;

impl WordReader {
    pub fn new() -> Self {
        Self
    }
}

impl FormatStrategy for WordReader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        90
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn validate(&self, path: &Path, limits: &ReaderLimits) -> ValidationReport {
        validate_common(path, limits, "Word", |header| {
            header.starts_with(ZIP_MAGIC) || header.starts_with(OLE_MAGIC)
        })
    }

    fn process(&self, path: &Path) -> Result<ExtractedDocument> {
        let metadata = FileMetadata::from_path(path, MIME).map_err(|e| io_error(path, e))?;
        let mut out = ExtractedDocument::empty(NAME, metadata);

        let header = super::read_header(path, OLE_MAGIC.len()).map_err(|e| io_error(path, e))?;
        if header.starts_with(OLE_MAGIC) {
            out.encryption = EncryptionStatus::Encrypted;
            out.warnings
                .push("document is password protected; no text extracted".to_string());
            return Ok(out);
        }

        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| ReaderError::corrupt(path, e.to_string()))?;

        let body = read_part(&mut archive, DOCUMENT_PART)
            .ok_or_else(|| ReaderError::corrupt(path, format!("missing {}", DOCUMENT_PART)))?;
        out.text = document_text(&body).map_err(|e| ReaderError::corrupt(path, e))?;

        if let Some(app) = read_part(&mut archive, APP_PART) {
            if let Some(pages) = element_text(&app, b"Pages").and_then(|p| p.parse::<u32>().ok()) {
                out.page_count = pages.max(1);
            }
        }
        if let Some(core) = read_part(&mut archive, CORE_PART) {
            for (tag, key) in [(&b"dc:title"[..], "title"), (&b"dc:creator"[..], "author")] {
                if let Some(value) = element_text(&core, tag) {
                    out.metadata.properties.insert(key.to_string(), value);
                }
            }
        }

        if out.has_text() {
            out.text_source = TextSource::Native;
        } else {
            out.warnings.push("document contains no text".to_string());
        }

        debug!(
            "Read {} chars from {} ({} pages)",
            out.text.len(),
            path.display(),
            out.page_count
        );
        Ok(out)
    }
}

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Flatten WordprocessingML body text: paragraphs and breaks become
/// newlines, tabs become tab characters.
fn document_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let part = t.unescape().map_err(|e| e.to_string())?;
                text.push_str(&part);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed document XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

/// Text of the first element named `tag`.
fn element_text(xml: &str, tag: &[u8]) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) if e.name().as_ref() == tag => inside = true,
            Event::Text(t) if inside => {
                let value = t.unescape().ok()?.trim().to_string();
                return (!value.is_empty()).then_some(value);
            }
            Event::End(e) if e.name().as_ref() == tag => return None,
            Event::Eof => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_docx(path: &Path, paragraphs: &[&str], pages: Option<u32>) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        zip.start_file(DOCUMENT_PART, options).unwrap();
        write!(
            zip,
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"urn:w\"><w:body>{}</w:body></w:document>",
            body
        )
        .unwrap();

        if let Some(pages) = pages {
            zip.start_file(APP_PART, options).unwrap();
            write!(zip, "<Properties><Pages>{}</Pages></Properties>", pages).unwrap();
        }

        zip.start_file(CORE_PART, options).unwrap();
        write!(
            zip,
            "<cp:coreProperties xmlns:cp=\"urn:cp\" xmlns:dc=\"urn:dc\"><dc:title>Weekly Threat Brief</dc:title></cp:coreProperties>"
        )
        .unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_document_text_structure() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Incident ID:</w:t><w:tab/><w:t>SEC-2025-001</w:t></w:r></w:p>
            <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line &amp; two</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(
            document_text(xml).unwrap(),
            "Incident ID:\tSEC-2025-001\nLine one\nLine & two"
        );
    }

    #[test]
    fn test_process_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief.docx");
        build_docx(&path, &["Threat Actor: APT29", "Severity: high"], Some(3));

        let reader = WordReader::new();
        assert!(reader.validate(&path, &ReaderLimits::default()).is_valid);

        let doc = reader.process(&path).unwrap();
        assert_eq!(doc.text, "Threat Actor: APT29\nSeverity: high");
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.text_source, TextSource::Native);
        assert_eq!(doc.metadata.properties.get("title").map(String::as_str), Some("Weekly Threat Brief"));
        assert!(doc.spans.is_none());
    }

    #[test]
    fn test_empty_docx_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.docx");
        build_docx(&path, &[], None);

        let doc = WordReader::new().process(&path).unwrap();
        assert!(doc.text.is_empty());
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.text_source, TextSource::None);
        assert_eq!(doc.warnings, vec!["document contains no text".to_string()]);
    }

    #[test]
    fn test_ole_container_is_encrypted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.docx");
        let mut data = OLE_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        std::fs::write(&path, data).unwrap();

        let doc = WordReader::new().process(&path).unwrap();
        assert_eq!(doc.encryption, EncryptionStatus::Encrypted);
        assert!(doc.text.is_empty());
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.docx");
        std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();

        let err = WordReader::new().process(&path).unwrap_err();
        assert!(matches!(err, ReaderError::Corrupt { .. }));
    }
}
