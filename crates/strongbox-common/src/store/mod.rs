//! Blob store: writes decrypted file contents under a root directory and
//! computes the CRC-32 the client verifies delivery against.

use crate::error::BlobError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Chunk size used when streaming a file for CRC computation.
const CRC_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem-backed store for uploaded file contents.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a blob store rooted at `root`. The directory is not required
    /// to exist yet; it is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a stored file name to its full path under the store root.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Write `bytes` to `<root>/<file_name>`, creating any missing parent
    /// directories and overwriting an existing file at that path.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BlobError> {
        let path = self.path_for(file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Stream `path` and return its ISO-3309 CRC-32, big-endian encoded as
    /// the wire protocol expects.
    pub async fn crc32(&self, path: &Path) -> Result<[u8; 4], BlobError> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = crc32fast::Hasher::new();
        let mut buf = vec![0u8; CRC_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_creates_parent_dirs_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("nested").join("deeper"));

        let path = store.write("notes.txt", b"first").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"first");

        let path = store.write("notes.txt", b"second").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn crc32_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let path = store.write("notes.txt", b"hello\n").await.unwrap();

        let crc = store.crc32(&path).await.unwrap();
        assert_eq!(crc, 0x363A3020u32.to_be_bytes());
    }

    #[tokio::test]
    async fn crc32_of_empty_file_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let path = store.write("empty.bin", b"").await.unwrap();

        let crc = store.crc32(&path).await.unwrap();
        assert_eq!(crc, 0u32.to_be_bytes());
    }
}
