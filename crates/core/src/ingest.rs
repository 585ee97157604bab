use crate::chunking::{chunk_by_paragraph, ChunkingConfig};
use crate::error::{IngestError, StoreError};
use crate::models::Chunk;
use crate::traits::ChunkSource;
use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use walkdir::WalkDir;

pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderIngestReport {
    pub chunks: Vec<Chunk>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Split every text file under `folder` into chunks for `project_id`.
/// Unreadable files are reported, not fatal. Chunk order is global across
/// the folder so it can double as a stable record id during indexing.
pub fn load_folder_chunks(
    folder: &Path,
    project_id: &str,
    config: ChunkingConfig,
) -> Result<FolderIngestReport, IngestError> {
    config.validate()?;
    let files = discover_text_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no text files found in {}",
            folder.display()
        )));
    }

    let mut chunks = Vec::new();
    let mut skipped_files = Vec::new();
    let mut cursor = 0u64;

    for path in files {
        let build_result = (|| {
            let title = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    IngestError::MissingFileName(format!(
                        "path missing filename: {}",
                        path.display()
                    ))
                })?
                .to_string();

            let content = fs::read_to_string(&path)?;
            let document_id = document_id_for(&path);
            let mut file_chunks = Vec::new();

            for (index, text) in chunk_by_paragraph(&content, config).into_iter().enumerate() {
                file_chunks.push(Chunk {
                    external_id: Some(chunk_id_for(&document_id, cursor, &text)),
                    metadata: json!({
                        "document_id": document_id,
                        "source_path": path.to_string_lossy(),
                        "title": title,
                        "chunk_index": index,
                    }),
                    order: cursor,
                    project_id: project_id.to_string(),
                    text,
                });
                cursor = cursor.saturating_add(1);
            }

            Ok::<_, IngestError>(file_chunks)
        })();

        match build_result {
            Ok(file_chunks) => chunks.extend(file_chunks),
            Err(error) => skipped_files.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(FolderIngestReport {
        chunks,
        skipped_files,
    })
}

fn document_id_for(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn chunk_id_for(document_id: &str, order: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(order.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Chunk store backend holding pre-chunked projects in memory. Serves the
/// paginated pull contract the indexer drives; also the fixture of choice
/// in pipeline tests.
#[derive(Default)]
pub struct InMemoryChunkSource {
    projects: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl InMemoryChunkSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, project_id: &str, chunks: Vec<Chunk>) {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        projects
            .entry(project_id.to_string())
            .or_default()
            .extend(chunks);
    }

    pub fn chunk_count(&self, project_id: &str) -> usize {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects.get(project_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl ChunkSource for InMemoryChunkSource {
    async fn chunks_page(
        &self,
        project_id: &str,
        page_no: usize,
        page_size: usize,
    ) -> Result<Vec<Chunk>, StoreError> {
        if page_no == 0 || page_size == 0 {
            return Ok(Vec::new());
        }

        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        let Some(chunks) = projects.get(project_id) else {
            return Ok(Vec::new());
        };

        let start = (page_no - 1).saturating_mul(page_size);
        if start >= chunks.len() {
            return Ok(Vec::new());
        }

        let end = (start + page_size).min(chunks.len());
        Ok(chunks[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{discover_text_files, load_folder_chunks, InMemoryChunkSource};
    use crate::chunking::ChunkingConfig;
    use crate::models::Chunk;
    use crate::traits::ChunkSource;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn chunk(order: u64) -> Chunk {
        Chunk {
            text: format!("chunk {order}"),
            metadata: json!({}),
            order,
            project_id: "p1".to_string(),
            external_id: None,
        }
    }

    #[test]
    fn discovery_is_recursive_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.txt"), "second")?;
        fs::write(nested.join("a.md"), "first")?;
        fs::write(dir.path().join("skip.bin"), "binary")?;

        let files = discover_text_files(dir.path());
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn folder_chunks_carry_global_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "alpha paragraph\n\nbeta paragraph")?;
        fs::write(dir.path().join("b.txt"), "gamma paragraph")?;

        let config = ChunkingConfig {
            max_chars: 20,
            overlap_chars: 2,
            min_chars: 4,
        };
        let report = load_folder_chunks(dir.path(), "p1", config)?;

        assert!(report.skipped_files.is_empty());
        let orders: Vec<u64> = report.chunks.iter().map(|chunk| chunk.order).collect();
        assert_eq!(orders, (0..report.chunks.len() as u64).collect::<Vec<_>>());
        assert!(report
            .chunks
            .iter()
            .all(|chunk| chunk.external_id.is_some() && chunk.project_id == "p1"));
        Ok(())
    }

    #[test]
    fn ingestion_fails_without_text_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = load_folder_chunks(dir.path(), "p1", ChunkingConfig::default());
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn paging_slices_in_order_and_terminates() {
        let source = InMemoryChunkSource::new();
        source.load("p1", (0..12).map(chunk).collect());

        let first = source.chunks_page("p1", 1, 5).await.unwrap();
        let second = source.chunks_page("p1", 2, 5).await.unwrap();
        let third = source.chunks_page("p1", 3, 5).await.unwrap();
        let fourth = source.chunks_page("p1", 4, 5).await.unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 5);
        assert_eq!(third.len(), 2);
        assert!(fourth.is_empty());
        assert_eq!(first[0].order, 0);
        assert_eq!(third[1].order, 11);
    }

    #[tokio::test]
    async fn unknown_project_yields_empty_pages() {
        let source = InMemoryChunkSource::new();
        let page = source.chunks_page("missing", 1, 10).await.unwrap();
        assert!(page.is_empty());
    }
}
