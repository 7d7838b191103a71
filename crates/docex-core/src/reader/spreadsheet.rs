//! Spreadsheet reader (xlsx, xls, ods) using calamine.

use std::path::Path;

use calamine::{open_workbook_auto, DataType, Reader};
use tracing::{debug, warn};

use super::{
    io_error, validate_common, FormatStrategy, ReaderLimits, Result, ValidationReport, OLE_MAGIC,
    ZIP_MAGIC,
};
use crate::error::ReaderError;
use crate::models::document::{EncryptionStatus, ExtractedDocument, FileMetadata, TextSource};

const NAME: &str = "spreadsheet";
const EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Reader for spreadsheet workbooks. Each sheet counts as one page.
///
/// Cells are joined with tabs and rows with newlines. Encryption cannot be
/// detected reliably, so it is always reported as unknown.
#[derive(Debug, Default)]
pub struct SpreadsheetReader;

impl SpreadsheetReader {
    pub fn new() -> Self {
        Self
    }
}

fn mime_for(path: &Path) -> &'static str {
    match super::extension_of(path).as_deref() {
        Some("xls") => "application/vnd.ms-excel",
        Some("ods") => "application/vnd.oasis.opendocument.spreadsheet",
        Some("xlsb") => "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
        _ => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    }
}

impl FormatStrategy for SpreadsheetReader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        80
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn validate(&self, path: &Path, limits: &ReaderLimits) -> ValidationReport {
        validate_common(path, limits, "spreadsheet", |header| {
            header.starts_with(ZIP_MAGIC) || header.starts_with(OLE_MAGIC)
        })
    }

    fn process(&self, path: &Path) -> Result<ExtractedDocument> {
        let metadata = FileMetadata::from_path(path, mime_for(path)).map_err(|e| io_error(path, e))?;
        let mut out = ExtractedDocument::empty(NAME, metadata);
        out.encryption = EncryptionStatus::Unknown;
        out.warnings
            .push("encryption status cannot be determined for spreadsheets".to_string());

        let mut workbook =
            open_workbook_auto(path).map_err(|e| ReaderError::corrupt(path, e.to_string()))?;
        let sheet_names = workbook.sheet_names().to_vec();

        let mut sheets_text = Vec::with_capacity(sheet_names.len());
        for name in &sheet_names {
            let range = match workbook.worksheet_range(name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("Skipping sheet '{}' in {}: {}", name, path.display(), e);
                    out.warnings.push(format!("sheet '{}' could not be read: {}", name, e));
                    continue;
                }
            };

            let rows: Vec<String> = range
                .rows()
                .map(|row| {
                    row.iter()
                        .map(|c| c.as_string().unwrap_or_default())
                        .collect::<Vec<_>>()
                        .join("\t")
                        .trim_end()
                        .to_string()
                })
                .filter(|line| !line.is_empty())
                .collect();
            sheets_text.push(rows.join("\n"));
        }

        out.page_count = sheet_names.len().max(1) as u32;
        out.text = sheets_text.join("\n\n");
        out.metadata
            .properties
            .insert("sheets".to_string(), sheet_names.join(", "));

        if out.has_text() {
            out.text_source = TextSource::Native;
        } else {
            out.warnings.push("workbook contains no cell text".to_string());
        }

        debug!("Read {} sheets from {}", sheet_names.len(), path.display());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Minimal xlsx with one sheet of inline-string cells.
    fn build_xlsx(path: &Path, rows: &[&[&str]]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="IOCs" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/worksheets/sheet1.xml", sheet_xml(rows)),
        ];

        for (name, content) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn sheet_xml(rows: &[&[&str]]) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            xml.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, value) in row.iter().enumerate() {
                let col = (b'A' + c as u8) as char;
                xml.push_str(&format!(
                    "<c r=\"{}{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    col,
                    r + 1,
                    value
                ));
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }

    #[test]
    fn test_process_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iocs.xlsx");
        build_xlsx(&path, &[&["Indicator", "Type"], &["198.51.100.7", "ipv4"]]);

        let reader = SpreadsheetReader::new();
        assert!(reader.validate(&path, &ReaderLimits::default()).is_valid);

        let doc = reader.process(&path).unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.encryption, EncryptionStatus::Unknown);
        assert!(doc.warnings.iter().any(|w| w.contains("encryption")));
        assert_eq!(doc.text, "Indicator\tType\n198.51.100.7\tipv4");
        assert_eq!(doc.metadata.properties.get("sheets").map(String::as_str), Some("IOCs"));
    }

    #[test]
    fn test_empty_workbook_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.xlsx");
        build_xlsx(&path, &[]);

        let doc = SpreadsheetReader::new().process(&path).unwrap();
        assert!(doc.text.is_empty());
        assert_eq!(doc.text_source, TextSource::None);
        assert!(doc.warnings.iter().any(|w| w == "workbook contains no cell text"));
    }

    #[test]
    fn test_garbage_workbook_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"PK\x03\x04 not a workbook").unwrap();

        let err = SpreadsheetReader::new().process(&path).unwrap_err();
        assert!(matches!(err, ReaderError::Corrupt { .. }));
    }

    #[test]
    fn test_mime_by_extension() {
        assert_eq!(mime_for(Path::new("a.xls")), "application/vnd.ms-excel");
        assert_eq!(mime_for(Path::new("a.ods")), "application/vnd.oasis.opendocument.spreadsheet");
    }
}
