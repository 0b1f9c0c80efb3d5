//! crates/bizdesk_core/src/ingestion.rs
//!
//! The document desk's file ingestion pipeline.
//!
//! Each file goes through extract, chunk, thumbnail, upload and persist, in
//! that order. Nothing is rolled back: a file that fails halfway may already
//! be in object storage, and files ingested before it in the same batch stay
//! persisted.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::RecursiveChunker;
use crate::domain::{DocumentRecord, PastedText, ProcessedDocument, UploadedFile};
use crate::ports::{ObjectStorage, PortError, PortResult, TextExtractor, ThumbnailGenerator};
use crate::records::{uploaded_document_path, UserRecords};

pub const PASTED_TEXT_NAME: &str = "Pasted Text";
pub const PASTED_TEXT_KIND: &str = "pasted_text";

/// Outcome of a multi-file upload. `failure` names the first file that could
/// not be ingested; files after it were never attempted.
#[derive(Debug)]
pub struct IngestionReport {
    pub processed: Vec<ProcessedDocument>,
    pub failure: Option<(String, PortError)>,
}

impl IngestionReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Chunks of every processed file, in upload order.
    pub fn combined_chunks(&self) -> Vec<String> {
        self.processed
            .iter()
            .flat_map(|doc| doc.chunks.iter().cloned())
            .collect()
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    thumbnails: Arc<dyn ThumbnailGenerator>,
    storage: Arc<dyn ObjectStorage>,
    records: UserRecords,
    chunker: RecursiveChunker,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        thumbnails: Arc<dyn ThumbnailGenerator>,
        storage: Arc<dyn ObjectStorage>,
        records: UserRecords,
        chunker: RecursiveChunker,
    ) -> Self {
        Self {
            extractor,
            thumbnails,
            storage,
            records,
            chunker,
        }
    }

    pub async fn ingest(&self, user_id: Uuid, file: &UploadedFile) -> PortResult<ProcessedDocument> {
        if file.filename.trim().is_empty() {
            return Err(PortError::InvalidInput("Uploaded file has no name".to_string()));
        }
        info!(filename = %file.filename, mime = %file.mime_type, bytes = file.bytes.len(), "Processing upload");

        let text = self.extractor.extract(file).await?;
        let chunks = self.chunker.split_text(&text);

        // A missing preview never blocks ingestion.
        let thumbnail = match self.thumbnails.generate(file).await {
            Ok(png) => Some(png),
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "Thumbnail generation failed");
                None
            }
        };

        let now = Utc::now();
        let path = uploaded_document_path(user_id, &file.filename, now);
        let file_url = self
            .storage
            .upload(&path, &file.bytes, &file.mime_type)
            .await?;

        let record = DocumentRecord {
            filename: file.filename.clone(),
            file_url: Some(file_url.clone()),
            mime_type: file.mime_type.clone(),
            text_content: text,
            chunk_count: chunks.len(),
            uploaded_at: now,
        };
        self.records.add_document(user_id, &record).await?;
        info!(filename = %file.filename, chunks = chunks.len(), "Document ingested");

        Ok(ProcessedDocument {
            filename: file.filename.clone(),
            file_url: Some(file_url),
            chunks,
            thumbnail,
        })
    }

    /// Ingests files one after another and stops at the first failure.
    pub async fn ingest_all(&self, user_id: Uuid, files: &[UploadedFile]) -> IngestionReport {
        let mut processed = Vec::with_capacity(files.len());
        for file in files {
            match self.ingest(user_id, file).await {
                Ok(doc) => processed.push(doc),
                Err(e) => {
                    warn!(filename = %file.filename, error = %e, "Stopping upload batch");
                    return IngestionReport {
                        processed,
                        failure: Some((file.filename.clone(), e)),
                    };
                }
            }
        }
        IngestionReport {
            processed,
            failure: None,
        }
    }

    /// Pasted text skips extraction, thumbnails and storage.
    pub async fn ingest_text(&self, user_id: Uuid, content: &str) -> PortResult<ProcessedDocument> {
        if content.trim().is_empty() {
            return Err(PortError::InvalidInput("Pasted text is empty".to_string()));
        }
        let chunks = self.chunker.split_text(content);
        self.records
            .add_pasted_text(
                user_id,
                &PastedText {
                    kind: PASTED_TEXT_KIND.to_string(),
                    content: content.to_string(),
                    created_at: Utc::now(),
                },
            )
            .await?;
        info!(chunks = chunks.len(), "Pasted text processed");

        Ok(ProcessedDocument {
            filename: PASTED_TEXT_NAME.to_string(),
            file_url: None,
            chunks,
            thumbnail: None,
        })
    }
}
