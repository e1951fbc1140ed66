//! Transcript loading.
//!
//! A transcript is normally a Word document exported from a meeting tool.
//! Only body paragraphs are read: paragraphs inside tables, text boxes and
//! headers are not part of the minutes.

use crate::error::{Result, SimonError};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const DOCUMENT_XML: &str = "word/document.xml";
/// Upper bound on the decompressed `document.xml`.
const MAX_DOCUMENT_XML_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptFormat {
    Docx,
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub source_name: String,
    pub format: TranscriptFormat,
    pub text: String,
    pub loaded_at: DateTime<Utc>,
}

impl Transcript {
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Load a transcript from raw upload bytes, detecting the format from the
/// content rather than the file name.
pub fn load(source_name: impl Into<String>, bytes: &[u8]) -> Result<Transcript> {
    let source_name = source_name.into();
    let (format, text) = if bytes.starts_with(ZIP_MAGIC) {
        (TranscriptFormat::Docx, read_docx(bytes)?)
    } else {
        let text = std::str::from_utf8(bytes).map_err(|_| {
            SimonError::InvalidDocument(format!(
                "{source_name}: expected a .docx file or UTF-8 text"
            ))
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        (TranscriptFormat::PlainText, text.replace("\r\n", "\n"))
    };

    if text.trim().is_empty() {
        return Err(SimonError::EmptyTranscript);
    }

    debug!(source = %source_name, ?format, chars = text.len(), "transcript loaded");
    Ok(Transcript {
        source_name,
        format,
        text,
        loaded_at: Utc::now(),
    })
}

/// Read a `.docx` file and return its body paragraphs joined by `\n`.
pub fn read_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SimonError::InvalidDocument(format!("not a docx archive: {e}")))?;
    let entry = archive
        .by_name(DOCUMENT_XML)
        .map_err(|_| SimonError::InvalidDocument(format!("missing {DOCUMENT_XML}")))?;
    if entry.size() > MAX_DOCUMENT_XML_BYTES {
        return Err(SimonError::InvalidDocument(format!(
            "{DOCUMENT_XML} is {} bytes, limit is {MAX_DOCUMENT_XML_BYTES}",
            entry.size()
        )));
    }
    let mut xml = String::new();
    entry
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_string(&mut xml)
        .map_err(|e| SimonError::InvalidDocument(format!("unreadable {DOCUMENT_XML}: {e}")))?;
    Ok(paragraphs(&xml)?.join("\n"))
}

/// Walk WordprocessingML and collect the text of each body paragraph.
fn paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();

    // Element names from the root down to the current position.
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<String> = None;
    let mut run_depth = 0usize;
    let mut in_text = false;
    // Nested content (text boxes, nested paragraphs) inside a body paragraph.
    let mut nested = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            SimonError::InvalidDocument(format!(
                "malformed {DOCUMENT_XML} at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"w:p" if current.is_none() && parent_is_body(&stack) => {
                        current = Some(String::new());
                    }
                    b"w:p" | b"w:txbxContent" if current.is_some() => nested += 1,
                    b"w:r" if current.is_some() && nested == 0 => run_depth += 1,
                    b"w:t" if run_depth > 0 && nested == 0 => in_text = true,
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = e.name();
                if name.as_ref() == b"w:p" && current.is_none() && parent_is_body(&stack) {
                    out.push(String::new());
                } else if let Some(text) = current.as_mut() {
                    if run_depth > 0 && nested == 0 {
                        match name.as_ref() {
                            b"w:tab" => text.push('\t'),
                            b"w:br" | b"w:cr" => text.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            Event::Text(t) if in_text => {
                let unescaped = t.unescape().map_err(|e| {
                    SimonError::InvalidDocument(format!("bad text in {DOCUMENT_XML}: {e}"))
                })?;
                if let Some(text) = current.as_mut() {
                    text.push_str(&unescaped);
                }
            }
            Event::CData(t) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                stack.pop();
                match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:r" if run_depth > 0 && nested == 0 => run_depth -= 1,
                    b"w:p" | b"w:txbxContent" if nested > 0 => nested -= 1,
                    b"w:p" => {
                        if let Some(text) = current.take() {
                            out.push(text);
                        }
                        run_depth = 0;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn parent_is_body(stack: &[Vec<u8>]) -> bool {
    stack.last().is_some_and(|n| n.as_slice() == b"w:body")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {NS}><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    fn docx(xml: &str) -> Vec<u8> {
        let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zw.start_file(DOCUMENT_XML, zip::write::SimpleFileOptions::default())
            .unwrap();
        zw.write_all(xml.as_bytes()).unwrap();
        zw.finish().unwrap().into_inner()
    }

    #[test]
    fn joins_body_paragraphs_with_newlines() {
        let xml = document(
            "<w:p><w:r><w:t>Alice: we need a login page.</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Bob: </w:t></w:r><w:r><w:t>and SSO.</w:t></w:r></w:p>",
        );
        let text = read_docx(&docx(&xml)).unwrap();
        assert_eq!(text, "Alice: we need a login page.\nBob: and SSO.");
    }

    #[test]
    fn empty_paragraphs_become_blank_lines() {
        let xml = document(
            "<w:p><w:r><w:t>one</w:t></w:r></w:p><w:p/><w:p><w:pPr/></w:p><w:p><w:r><w:t>two</w:t></w:r></w:p>",
        );
        assert_eq!(read_docx(&docx(&xml)).unwrap(), "one\n\n\ntwo");
    }

    #[test]
    fn tabs_breaks_and_entities() {
        let xml = document(
            "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
             <w:r><w:t>00:01</w:t><w:tab/><w:t>R&amp;D</w:t><w:br/><w:t>next</w:t></w:r></w:p>",
        );
        assert_eq!(read_docx(&docx(&xml)).unwrap(), "00:01\tR&D\nnext");
    }

    #[test]
    fn hyperlink_runs_are_included_and_deletions_skipped() {
        let xml = document(
            "<w:p><w:hyperlink><w:r><w:t>see wiki</w:t></w:r></w:hyperlink>\
             <w:del><w:r><w:delText>removed</w:delText></w:r></w:del>\
             <w:ins><w:r><w:t> now</w:t></w:r></w:ins></w:p>",
        );
        assert_eq!(read_docx(&docx(&xml)).unwrap(), "see wiki now");
    }

    #[test]
    fn table_and_text_box_paragraphs_are_skipped() {
        let xml = document(
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>\
             <w:p><w:r><w:t>body</w:t></w:r><w:r><w:drawing><w:txbxContent><w:p><w:r><w:t>boxed</w:t></w:r></w:p></w:txbxContent></w:drawing></w:r></w:p>",
        );
        assert_eq!(read_docx(&docx(&xml)).unwrap(), "body");
    }

    #[test]
    fn missing_document_xml_is_invalid() {
        let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zw.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zw.write_all(b"<x/>").unwrap();
        let bytes = zw.finish().unwrap().into_inner();
        assert!(matches!(
            read_docx(&bytes),
            Err(SimonError::InvalidDocument(_))
        ));
    }

    #[test]
    fn load_detects_docx() {
        let xml = document("<w:p><w:r><w:t>hello</w:t></w:r></w:p>");
        let t = load("minutes.docx", &docx(&xml)).unwrap();
        assert_eq!(t.format, TranscriptFormat::Docx);
        assert_eq!(t.text, "hello");
        assert_eq!(t.source_name, "minutes.docx");
    }

    #[test]
    fn load_accepts_plain_text_and_normalizes_newlines() {
        let t = load("minutes.txt", "\u{feff}line one\r\nline two".as_bytes()).unwrap();
        assert_eq!(t.format, TranscriptFormat::PlainText);
        assert_eq!(t.text, "line one\nline two");
        assert_eq!(t.line_count(), 2);
    }

    #[test]
    fn load_rejects_binary_and_empty() {
        assert!(matches!(
            load("x.pdf", &[0xff, 0xfe, 0x00, 0x81]),
            Err(SimonError::InvalidDocument(_))
        ));
        assert!(matches!(
            load("blank.txt", b"  \n "),
            Err(SimonError::EmptyTranscript)
        ));
    }

    #[test]
    fn truncated_zip_is_invalid() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"garbage");
        assert!(matches!(
            load("broken.docx", &bytes),
            Err(SimonError::InvalidDocument(_))
        ));
    }
}
