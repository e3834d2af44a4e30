use crate::chunking::normalize_whitespace;
use crate::error::IngestError;
use crate::models::Document;
use lopdf::Document as PdfDocument;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Loads every readable page of `path` as one [`Document`].
pub fn load_pdf_pages<E: PdfExtractor>(
    extractor: &E,
    path: &Path,
) -> Result<Vec<Document>, IngestError> {
    let source = path.to_string_lossy().to_string();
    let documents = extractor
        .extract_pages(path)?
        .into_iter()
        .map(|page| Document::new(normalize_whitespace(&page.text), source.clone(), Some(page.number)))
        .collect();
    Ok(documents)
}

pub fn load_text_file(path: &Path) -> Result<Document, IngestError> {
    let text = std::fs::read_to_string(path)?;
    Ok(Document::new(
        normalize_whitespace(&text),
        path.to_string_lossy().to_string(),
        None,
    ))
}
