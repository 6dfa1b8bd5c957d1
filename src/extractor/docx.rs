//! DOCX 텍스트 추출
//!
//! `word/document.xml`의 `<w:t>` 텍스트를 문단(`<w:p>`) 단위로 모아 빈 줄로 잇습니다.
//! 호출자가 `spawn_blocking`에서 실행합니다.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::knowledge::collapse_whitespace;

const DOCUMENT_XML: &str = "word/document.xml";

/// DOCX에서 텍스트 추출 (문단 사이는 빈 줄)
pub fn extract_text_from_docx(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open DOCX: {:?}", path))?;
    let mut archive =
        zip::ZipArchive::new(file).with_context(|| format!("Not a DOCX archive: {:?}", path))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .with_context(|| format!("Missing {} in {:?}", DOCUMENT_XML, path))?
        .read_to_string(&mut xml)
        .with_context(|| format!("Failed to read {} in {:?}", DOCUMENT_XML, path))?;

    let text = document_xml_to_text(&xml)?;
    if text.is_empty() {
        tracing::warn!("No text extracted from DOCX: {:?}", path);
    }
    Ok(text)
}

/// `document.xml` → 평문
pub fn document_xml_to_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().context("Invalid DOCX XML")? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => push_paragraph(&mut paragraphs, &mut current),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" | b"w:br" => current.push(' '),
                _ => {}
            },
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().context("Invalid DOCX text")?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    push_paragraph(&mut paragraphs, &mut current);

    Ok(paragraphs.join("\n\n"))
}

fn push_paragraph(paragraphs: &mut Vec<String>, current: &mut String) {
    let paragraph = collapse_whitespace(current);
    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
    current.clear();
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// 최소 DOCX 작성 (document.xml만)
    pub(crate) fn write_docx(path: &Path, body: &str) {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        zip.start_file(DOCUMENT_XML, zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_document_xml_paragraphs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Plan básico</w:t></w:r><w:r><w:t xml:space="preserve"> cuesta cien</w:t></w:r></w:p>
            <w:p></w:p>
            <w:p><w:r><w:t>Soporte</w:t><w:tab/><w:t>24 h &amp; chat</w:t></w:r></w:p>
        </w:body></w:document>"#;

        assert_eq!(
            document_xml_to_text(xml).unwrap(),
            "Plan básico cuesta cien\n\nSoporte 24 h & chat"
        );
    }

    #[test]
    fn test_text_outside_runs_is_ignored() {
        let xml = "<w:document><w:body><w:p><w:instrText>PAGE</w:instrText><w:t>Hola</w:t></w:p></w:body></w:document>";
        assert_eq!(document_xml_to_text(xml).unwrap(), "Hola");
    }

    #[test]
    fn test_extract_from_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faq.docx");
        write_docx(&path, "<w:p><w:r><w:t>Hacemos envíos.</w:t></w:r></w:p>");

        assert_eq!(extract_text_from_docx(&path).unwrap(), "Hacemos envíos.");
    }

    #[test]
    fn test_not_a_docx_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roto.docx");
        std::fs::write(&path, "no es un zip").unwrap();

        assert!(extract_text_from_docx(&path).is_err());
        assert!(extract_text_from_docx(&dir.path().join("falta.docx")).is_err());
    }
}
