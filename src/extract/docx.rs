//! DOCX text extraction
//!
//! A DOCX file is a ZIP container; the body lives in `word/document.xml`.
//! Text runs (`<w:t>`) are collected in document order and each paragraph
//! (`<w:p>`) ends with a newline. Tabs and breaks count only inside a run;
//! the same element names also appear as tab-stop definitions in paragraph
//! properties.

use std::io::Read;
use std::path::Path;

use crate::errors::{Result, ScopeError};

/// Extract paragraph text from a DOCX file
pub fn extract_docx_text(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .map_err(|e| ScopeError::Extraction(format!("Failed to open DOCX: {}", e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ScopeError::Extraction(format!("Invalid DOCX archive: {}", e)))?;

    let mut doc_xml = archive
        .by_name("word/document.xml")
        .map_err(|_| ScopeError::Extraction("No word/document.xml in DOCX".to_string()))?;

    let mut xml_content = String::new();
    doc_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| ScopeError::Extraction(format!("Failed to read document.xml: {}", e)))?;

    Ok(docx_xml_to_text(&xml_content))
}

/// Convert WordprocessingML body XML to plain text
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut result = String::new();
    let mut in_text = false;
    let mut in_paragraph = false;
    let mut in_run = false;
    let mut chars = xml.chars();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::new();
            for tc in chars.by_ref() {
                if tc == '>' {
                    break;
                }
                tag.push(tc);
            }

            let name = tag.split_whitespace().next().unwrap_or("");
            let self_closing = tag.ends_with('/');

            match name {
                "w:t" if !self_closing => in_text = true,
                "/w:t" => in_text = false,
                "w:p" | "w:p/" => {
                    if self_closing || name == "w:p/" {
                        result.push('\n');
                    } else {
                        in_paragraph = true;
                    }
                }
                "/w:p" => {
                    if in_paragraph {
                        result.push('\n');
                    }
                    in_paragraph = false;
                }
                "w:r" if !self_closing => in_run = true,
                "/w:r" => in_run = false,
                "w:tab/" | "w:tab" if in_run => result.push('\t'),
                "w:br/" | "w:br" if in_run => result.push('\n'),
                _ => {}
            }
        } else if in_text {
            result.push(c);
        }
    }

    decode_entities(&result)
}

/// Decode the predefined XML entities and numeric character references
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|&end| end <= 12)
            .and_then(|end| entity_char(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn entity_char(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"<w:document><w:body><w:p><w:r><w:t>Payroll</w:t></w:r><w:r><w:t xml:space="preserve"> &amp; HR</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Leave requests</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_paragraphs_in_order() {
        let text = docx_xml_to_text(BODY);
        assert_eq!(text, "Payroll & HR\n\nLeave requests\n");
    }

    #[test]
    fn test_tabs_and_breaks() {
        let xml = "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>";
        assert_eq!(docx_xml_to_text(xml), "a\tb\nc\n");
    }

    #[test]
    fn test_tab_stop_definitions_are_not_text() {
        let xml = r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Scope</w:t></w:r></w:p>"#;
        assert_eq!(docx_xml_to_text(xml), "Scope\n");
    }

    #[test]
    fn test_numeric_references_decoded() {
        let xml = "<w:p><w:r><w:t>Client&#8217;s portal &#x2013; v2 &amp;lt;</w:t></w:r></w:p>";
        assert_eq!(docx_xml_to_text(xml), "Client\u{2019}s portal \u{2013} v2 &lt;\n");
    }

    #[test]
    fn test_stray_ampersand_kept() {
        assert_eq!(decode_entities("R&D & QA &#xZZ;"), "R&D & QA &#xZZ;");
    }

    #[test]
    fn test_extract_from_zip_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqs.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        zip.finish().unwrap();

        let text = extract_docx_text(&path).unwrap();
        assert!(text.starts_with("Payroll & HR"));
        assert!(text.contains("Leave requests"));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, "plain text").unwrap();
        assert!(matches!(
            extract_docx_text(&path).unwrap_err(),
            ScopeError::Extraction(_)
        ));
    }
}
