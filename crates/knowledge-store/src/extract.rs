//! Multi-format text extraction for uploaded documents.
//!
//! Converts raw source bytes into one normalized UTF-8 text blob per
//! document. Markup input is stripped to plain prose; tabular/structured
//! input (JSON, CSV) is serialized to a readable textual form rather than
//! parsed semantically; PDF and DOCX go through their binary parsers.
//!
//! Which binary parsers are available is constructor-time configuration on
//! [`ParserRegistry`]: a rich format whose parser is disabled is fed
//! through as lossy best-effort text with `needs_manual_review` set, so the
//! caller can flag the document instead of dropping it.

use std::io::Read;
use std::path::Path;

use crate::error::StoreError;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Format tag for an uploaded source, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Markdown,
    Json,
    Csv,
    Pdf,
    Docx,
}

impl SourceFormat {
    /// Map a file extension (without the dot, any case) to a format tag.
    pub fn from_extension(ext: &str) -> Option<SourceFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(SourceFormat::Text),
            "md" | "markdown" => Some(SourceFormat::Markdown),
            "json" => Some(SourceFormat::Json),
            "csv" => Some(SourceFormat::Csv),
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            _ => None,
        }
    }

    /// Resolve the format tag for a path, or `UnsupportedFormat`.
    pub fn from_path(path: &Path) -> Result<SourceFormat, StoreError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        SourceFormat::from_extension(ext)
            .ok_or_else(|| StoreError::UnsupportedFormat(format!(".{}", ext)))
    }
}

/// Normalized extraction output.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    /// Set when a rich format was fed through without its parser; the
    /// document should be flagged for manual review.
    pub needs_manual_review: bool,
}

/// Constructor-time parser capability set.
///
/// Rich (binary) parsers can be switched off individually; text-based
/// formats are always available.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    pub pdf: bool,
    pub docx: bool,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self {
            pdf: true,
            docx: true,
        }
    }
}

impl ParserRegistry {
    /// Extract normalized text from source bytes.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ParseFailure`] for corrupt or undecodable content.
    /// - [`StoreError::EmptyContent`] when the extracted text is blank
    ///   after trimming — never a silent success.
    pub fn extract(&self, format: SourceFormat, bytes: &[u8]) -> Result<Extracted, StoreError> {
        let (text, needs_manual_review) = match format {
            SourceFormat::Text => (decode_utf8(bytes)?, false),
            SourceFormat::Markdown => (strip_markdown(&decode_utf8(bytes)?), false),
            SourceFormat::Json => (flatten_json(bytes)?, false),
            SourceFormat::Csv => (prose_csv(&decode_utf8(bytes)?), false),
            SourceFormat::Pdf if self.pdf => (extract_pdf(bytes)?, false),
            SourceFormat::Docx if self.docx => (extract_docx(bytes)?, false),
            // No parser configured for this rich format: best-effort raw.
            SourceFormat::Pdf | SourceFormat::Docx => {
                (String::from_utf8_lossy(bytes).into_owned(), true)
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(StoreError::EmptyContent);
        }
        Ok(Extracted {
            text,
            needs_manual_review,
        })
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, StoreError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| StoreError::ParseFailure(format!("invalid UTF-8: {}", e)))
}

/// Strip markdown syntax (headers, emphasis, links, code fences, quote and
/// list markers) down to plain prose.
fn strip_markdown(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }
        let mut rest = trimmed;
        rest = rest.trim_start_matches('#').trim_start();
        while let Some(stripped) = rest.strip_prefix('>') {
            rest = stripped.trim_start();
        }
        for bullet in ["- ", "* ", "+ "] {
            if let Some(stripped) = rest.strip_prefix(bullet) {
                rest = stripped;
                break;
            }
        }
        out.push(strip_inline(rest));
    }
    out.join("\n")
}

/// Strip inline markdown from one line: `[label](url)` → `label`,
/// `![alt](url)` → `alt`, emphasis and backticks dropped.
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '!' if chars.peek() == Some(&'[') => {}
            '[' => {
                let mut label = String::new();
                for lc in chars.by_ref() {
                    if lc == ']' {
                        break;
                    }
                    label.push(lc);
                }
                if chars.peek() == Some(&'(') {
                    chars.next();
                    for uc in chars.by_ref() {
                        if uc == ')' {
                            break;
                        }
                    }
                }
                out.push_str(&strip_inline(&label));
            }
            '*' | '_' | '`' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Serialize a JSON document to readable `key: value` lines.
///
/// Nested objects use dotted paths, arrays indexed paths. The content is
/// rendered indifferently, not interpreted.
fn flatten_json(bytes: &[u8]) -> Result<String, StoreError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::ParseFailure(format!("invalid JSON: {}", e)))?;
    let mut lines = Vec::new();
    flatten_value(&value, "", &mut lines);
    Ok(lines.join("\n"))
}

fn flatten_value(value: &serde_json::Value, path: &str, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_value(v, &child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_value(v, &format!("{}[{}]", path, i), out);
            }
        }
        serde_json::Value::String(s) => out.push(render_scalar(path, s)),
        other => out.push(render_scalar(path, &other.to_string())),
    }
}

fn render_scalar(path: &str, value: &str) -> String {
    if path.is_empty() {
        value.to_string()
    } else {
        format!("{}: {}", path, value)
    }
}

/// Render CSV rows as readable comma-joined lines.
fn prose_csv(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split(',')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_pdf(bytes: &[u8]) -> Result<String, StoreError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| StoreError::ParseFailure(e.to_string()))
}

/// Extract DOCX body text: walk `w:t` text nodes in `word/document.xml`,
/// separating paragraphs with newlines.
fn extract_docx(bytes: &[u8]) -> Result<String, StoreError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| StoreError::ParseFailure(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| StoreError::ParseFailure("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| StoreError::ParseFailure(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(StoreError::ParseFailure(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_w_t_elements(&doc_xml)
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, StoreError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(StoreError::ParseFailure(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = SourceFormat::from_path(Path::new("deck.pptx")).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(SourceFormat::from_extension("MD"), Some(SourceFormat::Markdown));
        assert_eq!(SourceFormat::from_extension("txt"), Some(SourceFormat::Text));
        assert_eq!(SourceFormat::from_extension("exe"), None);
    }

    #[test]
    fn test_blank_text_is_empty_content() {
        let registry = ParserRegistry::default();
        let err = registry.extract(SourceFormat::Text, b"   \n\t  ").unwrap_err();
        assert!(matches!(err, StoreError::EmptyContent));
    }

    #[test]
    fn test_markdown_stripped_to_prose() {
        let md = "# Title\n\nSome **bold** and _italic_ text with a [link](https://x.dev).\n\n- item one\n> quoted\n";
        let registry = ParserRegistry::default();
        let out = registry.extract(SourceFormat::Markdown, md.as_bytes()).unwrap();
        assert!(out.text.contains("Title"));
        assert!(out.text.contains("Some bold and italic text with a link."));
        assert!(out.text.contains("item one"));
        assert!(out.text.contains("quoted"));
        assert!(!out.text.contains('#'));
        assert!(!out.text.contains("**"));
        assert!(!out.text.contains("https://x.dev"));
    }

    #[test]
    fn test_image_alt_text_kept() {
        assert_eq!(strip_inline("see ![diagram](img.png) here"), "see diagram here");
    }

    #[test]
    fn test_json_flattened_readably() {
        let json = br#"{"plan": {"name": "starter", "price": 29}, "features": ["seo", "api"]}"#;
        let registry = ParserRegistry::default();
        let out = registry.extract(SourceFormat::Json, json).unwrap();
        assert!(out.text.contains("plan.name: starter"));
        assert!(out.text.contains("plan.price: 29"));
        assert!(out.text.contains("features[0]: seo"));
    }

    #[test]
    fn test_invalid_json_is_parse_failure() {
        let registry = ParserRegistry::default();
        let err = registry.extract(SourceFormat::Json, b"{nope").unwrap_err();
        assert!(matches!(err, StoreError::ParseFailure(_)));
    }

    #[test]
    fn test_csv_rows_joined() {
        let csv = "plan,price\nstarter,29\npro,79\n";
        let registry = ParserRegistry::default();
        let out = registry.extract(SourceFormat::Csv, csv.as_bytes()).unwrap();
        assert_eq!(out.text, "plan, price\nstarter, 29\npro, 79");
    }

    #[test]
    fn test_invalid_pdf_is_parse_failure() {
        let registry = ParserRegistry::default();
        let err = registry.extract(SourceFormat::Pdf, b"not a pdf").unwrap_err();
        assert!(matches!(err, StoreError::ParseFailure(_)));
    }

    #[test]
    fn test_invalid_docx_is_parse_failure() {
        let registry = ParserRegistry::default();
        let err = registry.extract(SourceFormat::Docx, b"not a zip").unwrap_err();
        assert!(matches!(err, StoreError::ParseFailure(_)));
    }

    #[test]
    fn test_disabled_rich_parser_falls_back_to_raw() {
        let registry = ParserRegistry {
            pdf: false,
            docx: true,
        };
        let out = registry
            .extract(SourceFormat::Pdf, b"raw fallback bytes")
            .unwrap();
        assert!(out.needs_manual_review);
        assert_eq!(out.text, "raw fallback bytes");
    }
}
