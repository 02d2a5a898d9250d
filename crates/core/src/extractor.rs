use crate::error::IngestError;
use crate::models::Document;
use lopdf::Document as PdfDocument;
use std::fs;
use std::path::Path;

pub const TEXT_EXTENSIONS: [&str; 6] = ["txt", "md", "markdown", "rst", "csv", "log"];
pub const PDF_EXTENSION: &str = "pdf";

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
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

pub trait DocumentReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<Document>, IngestError>;

    fn supports(&self, extension: &str) -> bool;
}

pub struct FileDocumentReader {
    pdf: Box<dyn PdfExtractor>,
}

impl Default for FileDocumentReader {
    fn default() -> Self {
        Self {
            pdf: Box::new(LopdfExtractor),
        }
    }
}

impl FileDocumentReader {
    pub fn with_pdf_extractor(pdf: Box<dyn PdfExtractor>) -> Self {
        Self { pdf }
    }
}

impl DocumentReader for FileDocumentReader {
    fn read(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let extension = file_extension(path)
            .ok_or_else(|| IngestError::UnsupportedExtension(path.display().to_string()))?;
        let file_path = path.to_string_lossy().replace('\\', "/");

        if extension == PDF_EXTENSION {
            let pages = self.pdf.extract_pages(path)?;
            return Ok(pages
                .into_iter()
                .map(|page| Document::new(page.text, file_path.clone(), page.number.to_string()))
                .collect());
        }

        if !self.supports(&extension) {
            return Err(IngestError::UnsupportedExtension(extension));
        }

        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Document::new(text, file_path, "1")])
    }

    fn supports(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        extension == PDF_EXTENSION || TEXT_EXTENSIONS.contains(&extension.as_str())
    }
}

pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
