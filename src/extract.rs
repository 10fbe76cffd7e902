//! Text extraction for search indexing.
//!
//! Extraction is a pure function of (bytes, declared extension) -> text. It
//! never fails: corrupt or unsupported content yields an empty string so the
//! metadata-only index fields are still written.

use std::io::Cursor;

use calamine::Reader;

/// Extract indexable text from file content based on its extension tag.
///
/// PDF content yields the embedded text layer; spreadsheets yield every cell
/// value across every sheet, space-joined and trimmed. Everything else yields
/// an empty string -- no OCR, no binary sniffing.
pub fn extract_text(data: &[u8], extension: &str) -> String {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => pdf_text(data),
        "xlsx" | "xls" | "ods" => spreadsheet_text(data),
        _ => String::new(),
    }
}

fn pdf_text(data: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(data) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "PDF text extraction failed");
            String::new()
        }
    }
}

fn spreadsheet_text(data: &[u8]) -> String {
    let cursor = Cursor::new(data.to_vec());
    let mut workbook = match calamine::open_workbook_auto_from_rs(cursor) {
        Ok(workbook) => workbook,
        Err(e) => {
            tracing::debug!(error = %e, "spreadsheet open failed");
            return String::new();
        }
    };

    let mut content = String::new();
    for (_sheet, range) in workbook.worksheets() {
        for row in range.rows() {
            for cell in row {
                let value = cell.to_string();
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if !content.is_empty() {
                    content.push(' ');
                }
                content.push_str(value);
            }
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_yields_empty() {
        assert_eq!(extract_text(b"plain text body", "txt"), "");
        assert_eq!(extract_text(b"\x89PNG\r\n", "png"), "");
        assert_eq!(extract_text(b"anything", ""), "");
    }

    #[test]
    fn corrupt_pdf_yields_empty() {
        assert_eq!(extract_text(b"not a pdf at all", "pdf"), "");
    }

    #[test]
    fn corrupt_spreadsheet_yields_empty() {
        assert_eq!(extract_text(b"not a workbook", "xlsx"), "");
        assert_eq!(extract_text(b"", "xls"), "");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        // Still corrupt input, but must route through the PDF branch without
        // panicking regardless of case.
        assert_eq!(extract_text(b"junk", "PDF"), "");
    }
}
