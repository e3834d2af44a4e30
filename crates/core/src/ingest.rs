use crate::chunking::{split_documents, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::{load_pdf_pages, load_text_file, PdfExtractor};
use crate::index::{build_index, VectorIndex};
use crate::models::{Document, IngestionOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const SAMPLE_FILE_NAME: &str = "sample.txt";

pub const SAMPLE_TEXT: &str = "
    This is a sample document about artificial intelligence.
    AI is transforming various industries including healthcare, finance, and education.
    Machine learning is a subset of AI that focuses on algorithms learning from data.
    ";

/// PDFs directly inside `folder`, sorted by path. Subdirectories are not
/// searched.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
    pub used_sample: bool,
}

/// Loads every page of every PDF in `data_dir`. Unreadable PDFs are skipped
/// and reported. When the folder holds no PDFs at all, a sample text file is
/// written there and loaded instead.
pub fn load_documents<E: PdfExtractor>(
    extractor: &E,
    data_dir: &Path,
) -> Result<LoadReport, IngestError> {
    fs::create_dir_all(data_dir)?;
    let files = discover_pdf_files(data_dir);

    if files.is_empty() {
        warn!(folder = %data_dir.display(), "no pdf files found; writing sample text for testing");
        let sample_path = data_dir.join(SAMPLE_FILE_NAME);
        fs::write(&sample_path, SAMPLE_TEXT)?;
        return Ok(LoadReport {
            documents: vec![load_text_file(&sample_path)?],
            skipped_files: Vec::new(),
            used_sample: true,
        });
    }

    info!(folder = %data_dir.display(), pdf_count = files.len(), "found pdf files");

    let mut report = LoadReport::default();
    for path in files {
        match load_pdf_pages(extractor, &path) {
            Ok(pages) => report.documents.extend(pages),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(page_count = report.documents.len(), "loaded document pages");
    Ok(report)
}

#[derive(Debug)]
pub struct IngestionSummary {
    pub document_count: usize,
    pub chunk_count: usize,
    pub skipped_files: Vec<SkippedPdf>,
    pub used_sample: bool,
    pub index_dir: PathBuf,
}

/// Loads, chunks, embeds and persists everything under `data_dir`, then
/// reloads the persisted index to confirm it is readable.
pub async fn run_ingestion<E: PdfExtractor>(
    extractor: &E,
    data_dir: &Path,
    index_dir: &Path,
    options: &IngestionOptions,
    embedder: &dyn Embedder,
) -> Result<IngestionSummary, IngestError> {
    let config = ChunkingConfig::try_from(options)?;
    let report = load_documents(extractor, data_dir)?;

    if report.documents.is_empty() {
        return Err(IngestError::NoDocuments(data_dir.display().to_string()));
    }

    let chunks = split_documents(&report.documents, config);
    info!(
        chunk_count = chunks.len(),
        chunk_size = config.size,
        chunk_overlap = config.overlap,
        "created text chunks"
    );
    if chunks.is_empty() {
        return Err(IngestError::NoChunks(report.documents.len()));
    }

    let chunk_count = chunks.len();
    let index = build_index(chunks, embedder).await?;
    index.persist(index_dir)?;

    let reloaded = VectorIndex::load(index_dir)?;
    info!(chunk_count = reloaded.len(), "database loading test successful");

    Ok(IngestionSummary {
        document_count: report.documents.len(),
        chunk_count,
        skipped_files: report.skipped_files,
        used_sample: report.used_sample,
        index_dir: index_dir.to_path_buf(),
    })
}
