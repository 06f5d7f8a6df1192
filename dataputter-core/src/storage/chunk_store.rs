use crate::error::{PutterError, Result};
use bytes::Bytes;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Splits a TicketID into one directory level per character.
pub fn chunk_path_components(ticket_id: &str) -> Vec<String> {
    ticket_id.chars().map(|c| c.to_string()).collect()
}

/// Directory that holds a ticket's chunk file.
pub fn chunk_dir(data_root: &Path, ticket_id: &str) -> PathBuf {
    let mut dir = data_root.to_path_buf();
    for component in chunk_path_components(ticket_id) {
        dir.push(component);
    }
    dir
}

/// Full path of a ticket's chunk file: `<dataRoot>/<c>/<c>/.../obj`.
pub fn chunk_file(data_root: &Path, ticket_id: &str) -> PathBuf {
    chunk_dir(data_root, ticket_id).join("obj")
}

/// ChunkStore owns a write node's local directory tree of chunk files.
/// Every TicketID resolves to a unique path, so concurrent writers never
/// target the same file.
pub struct ChunkStore {
    data_root: PathBuf,
}

impl ChunkStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Result<Self> {
        let data_root = data_root.into();
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(&data_root)?;
        Ok(Self { data_root })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Writes a chunk, creating the directory chain (mode 0755) as needed.
    /// The chunk file is mode 0644; re-writing the same ticket truncates
    /// the previous content.
    pub async fn write_chunk(&self, ticket_id: &str, data: &[u8]) -> Result<()> {
        let dir = chunk_dir(&self.data_root, ticket_id);
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(&dir)
            .await?;

        let mut file = fs::OpenOptions::new()
            .mode(FILE_MODE)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.join("obj"))
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        tracing::debug!("Stored {} byte chunk for ticket {}", data.len(), ticket_id);
        Ok(())
    }

    pub async fn read_chunk(&self, ticket_id: &str) -> Result<Bytes> {
        let path = chunk_file(&self.data_root, ticket_id);
        if !path.exists() {
            return Err(PutterError::TicketNotFound(ticket_id.to_string()));
        }
        let data = fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    pub fn chunk_exists(&self, ticket_id: &str) -> bool {
        chunk_file(&self.data_root, ticket_id).exists()
    }

    /// Removes a chunk file. Deleting an absent chunk is a no-op.
    pub async fn delete_chunk(&self, ticket_id: &str) -> Result<()> {
        let path = chunk_file(&self.data_root, ticket_id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}
