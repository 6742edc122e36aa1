use std::path::PathBuf;

use anyhow::anyhow;
use bytes::Bytes;
use tokio::fs::{create_dir_all, rename, try_exists, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::trace;
use uuid::Uuid;

/// A file served from the local repository.
pub struct LocalFile {
    pub content_length: u64,
    pub data: ReaderStream<tokio::fs::File>,
}

/// Filesystem-backed local repository using the standard Maven layout below a
/// root directory. Writes go to a temporary sibling first and are renamed
/// into place, so concurrent readers never observe partial files; concurrent
/// writers to the same path are last-writer-wins.
pub struct FsRepository {
    root: PathBuf,
}

impl FsRepository {
    pub fn new(root: impl Into<PathBuf>) -> FsRepository {
        FsRepository { root: root.into() }
    }

    fn file_path(&self, repo_path: &str) -> anyhow::Result<PathBuf> {
        let mut result = self.root.clone();
        for segment in repo_path.split('/') {
            // keep traversal out of the repository root
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(anyhow!("refusing repository path {:?}", repo_path));
            }
            result.push(segment);
        }
        Ok(result)
    }

    pub async fn get(&self, repo_path: &str) -> anyhow::Result<Option<LocalFile>> {
        let path = self.file_path(repo_path)?;
        if !try_exists(&path).await? {
            return Ok(None);
        }

        let file = OpenOptions::new().read(true).open(&path).await?;
        let content_length = file.metadata().await?.len();

        trace!("serving {} from the local repository", repo_path);
        Ok(Some(LocalFile {
            content_length,
            data: ReaderStream::new(file),
        }))
    }

    /// Stores the bytes under the given repository path, replacing any
    /// previous content.
    pub async fn put(&self, repo_path: &str, data: &Bytes) -> anyhow::Result<()> {
        let path = self.file_path(repo_path)?;
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("repository path without a parent directory: {:?}", repo_path))?;
        create_dir_all(parent).await?;

        let temp_path = parent.join(format!(".{}.uploading", Uuid::new_v4().as_hyphenated()));
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        drop(file);

        rename(&temp_path, &path).await?;
        trace!("stored {} bytes at {}", data.len(), repo_path);
        Ok(())
    }
}
