//! Plain-text extraction for uploaded course documents.
//!
//! The file extension picks the extractor: `.txt` and `.md` are read as
//! UTF-8, `.json` is parsed and re-serialized, `.pdf` goes through
//! `pdf-extract`, `.docx` is unzipped and its `w:t` runs collected
//! paragraph by paragraph.
//! Anything else is rejected. The returned text is trimmed; its SHA-256 is
//! the document's identity.

use std::io::Read;
use std::path::Path;

use campus_rag_core::RagError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: '{0}'")]
    UnsupportedExtension(String),
    #[error("cannot read file: {0}")]
    Io(String),
    #[error("invalid JSON document: {0}")]
    Json(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

impl From<ExtractError> for RagError {
    fn from(e: ExtractError) -> Self {
        RagError::Processing(e.to_string())
    }
}

/// Lower-cased extension of `path`, without the dot.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Read `path` and return its trimmed text content.
pub fn read_document(path: &Path) -> Result<String, RagError> {
    let ext = file_extension(path);
    if !matches!(ext.as_str(), "txt" | "md" | "json" | "pdf" | "docx") {
        return Err(ExtractError::UnsupportedExtension(ext).into());
    }
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    Ok(extract_text(&bytes, &ext)?)
}

/// Extract text from in-memory `bytes` of the given extension.
pub fn extract_text(bytes: &[u8], ext: &str) -> Result<String, ExtractError> {
    let text = match ext {
        "txt" | "md" => extract_txt(bytes)?,
        "json" => extract_json(bytes)?,
        "pdf" => extract_pdf(bytes)?,
        "docx" => extract_docx(bytes)?,
        other => return Err(ExtractError::UnsupportedExtension(other.to_string())),
    };
    Ok(text.trim().to_string())
}

fn extract_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Io(e.to_string()))
}

fn extract_json(bytes: &[u8]) -> Result<String, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ExtractError::Json(e.to_string()))?;
    serde_json::to_string(&value).map_err(|e| ExtractError::Json(e.to_string()))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraphs(&doc_xml)
}

/// Concatenate `w:t` runs, one line per `w:p` paragraph.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options: zip::write::SimpleFileOptions = Default::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_txt_is_trimmed() {
        let text = extract_text(b"  bonjour le monde \n\n", "txt").unwrap();
        assert_eq!(text, "bonjour le monde");
    }

    #[test]
    fn test_json_is_reserialized() {
        let text = extract_text(b"{ \"a\" : [1, 2] }", "json").unwrap();
        assert_eq!(text, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_json_keeps_document_key_order() {
        let text = extract_text(
            br#"{"titre":"Graphes","chapitre":"Parcours","annexe":"Exercices"}"#,
            "json",
        )
        .unwrap();
        assert_eq!(
            text,
            r#"{"titre":"Graphes","chapitre":"Parcours","annexe":"Exercices"}"#
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            extract_text(b"{ not json", "json"),
            Err(ExtractError::Json(_))
        ));
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>Premier </w:t></w:r><w:r><w:t>paragraphe</w:t></w:r></w:p>
<w:p><w:r><w:t>Second &amp; dernier</w:t></w:r></w:p>
</w:body>
</w:document>"#;
        let text = extract_text(&docx_bytes(xml), "docx").unwrap();
        assert_eq!(text, "Premier paragraphe\nSecond & dernier");
    }

    #[test]
    fn test_docx_without_document_xml() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options: zip::write::SimpleFileOptions = Default::default();
            zip.start_file("other.xml", options).unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(
            extract_text(&cursor.into_inner(), "docx"),
            Err(ExtractError::Docx(_))
        ));
    }

    #[test]
    fn test_unsupported_extension_maps_to_processing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("slides.pptx");
        std::fs::write(&path, b"whatever").unwrap();
        let err = read_document(&path).unwrap_err();
        assert!(matches!(err, RagError::Processing(_)));
        assert!(err.to_string().contains("pptx"));
    }

    #[test]
    fn test_read_txt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Cours.TXT");
        std::fs::write(&path, "Introduction aux réseaux\n").unwrap();
        assert_eq!(read_document(&path).unwrap(), "Introduction aux réseaux");
    }
}
