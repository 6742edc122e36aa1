use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use futures::StreamExt;
use futures_core::Stream;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::maven::coordinates::MavenArtifactRef;
use crate::repo::local::FsRepository;
use crate::repo::remote::{RemoteFile, RemoteRepository};

pub type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send + 'static>>;

/// One remote repository as the resolver sees it. [RemoteRepository] is the
/// production implementation; tests drive the resolver with in-memory stubs.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    fn id(&self) -> &str;
    fn serves_snapshots(&self) -> bool;
    fn serves_releases(&self) -> bool;

    /// Fetches a repository-relative path. `Ok(None)` means the remote
    /// answered 404; any other non-success status is an error.
    async fn fetch(&self, path: &str) -> anyhow::Result<Option<RemoteFile>>;
}

/// An artifact located in the local repository or on a remote.
pub struct ResolvedArtifact {
    pub data: ByteStream,
    pub content_length: Option<u64>,
}

/// The seam between the HTTP endpoints and the repositories behind them. The
/// endpoints hold this as a trait object, so tests can run them against an
/// in-memory stub.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Locates the artifact: local repository first, then the remotes in
    /// configuration order, first hit wins. `Ok(None)` means no repository
    /// has it.
    async fn resolve(&self, artifact_ref: &MavenArtifactRef) -> anyhow::Result<Option<ResolvedArtifact>>;

    /// Fetches the given repository-relative metadata path from every remote
    /// concurrently. Remotes answering 404 and remotes failing outright are
    /// dropped; the result holds the raw XML of every remote that answered.
    async fn metadata_documents(&self, path: &str) -> anyhow::Result<Vec<Bytes>>;

    /// Stores uploaded bytes at the given repository path.
    async fn store(&self, repository_path: &str, data: Bytes) -> anyhow::Result<()>;
}

/// Production resolver over a filesystem local repository and the configured
/// remote repositories.
pub struct RepositoryResolver {
    local: FsRepository,
    remotes: Vec<Box<dyn RemoteSource>>,
}

impl RepositoryResolver {
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<RepositoryResolver> {
        let remotes = config
            .remote_repositories
            .iter()
            .map(|spec| {
                RemoteRepository::new(spec, config.outbound_proxy.as_ref())
                    .map(|remote| Box::new(remote) as Box<dyn RemoteSource>)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(RepositoryResolver::new(
            FsRepository::new(&config.local_repository),
            remotes,
        ))
    }

    pub fn new(local: FsRepository, remotes: Vec<Box<dyn RemoteSource>>) -> RepositoryResolver {
        RepositoryResolver { local, remotes }
    }
}

#[async_trait]
impl ArtifactResolver for RepositoryResolver {
    async fn resolve(&self, artifact_ref: &MavenArtifactRef) -> anyhow::Result<Option<ResolvedArtifact>> {
        let repo_path = artifact_ref.repository_path();

        if let Some(local_file) = self.local.get(&repo_path).await? {
            return Ok(Some(ResolvedArtifact {
                content_length: Some(local_file.content_length),
                data: Box::pin(local_file.data.map(|chunk| chunk.map_err(anyhow::Error::from))),
            }));
        }

        let is_snapshot = artifact_ref.coordinates.version.is_snapshot();
        for remote in &self.remotes {
            if is_snapshot && !remote.serves_snapshots() {
                continue;
            }
            if !is_snapshot && !remote.serves_releases() {
                continue;
            }

            match remote.fetch(&repo_path).await {
                Ok(Some(remote_file)) => {
                    debug!("resolved {} via repository {:?}", artifact_ref, remote.id());
                    return Ok(Some(ResolvedArtifact {
                        content_length: remote_file.content_length,
                        data: Box::pin(remote_file.data),
                    }));
                }
                Ok(None) => {}
                Err(e) => {
                    // a broken remote must not shadow the others
                    warn!("repository {:?} failed for {}: {:#}", remote.id(), artifact_ref, e);
                }
            }
        }

        Ok(None)
    }

    async fn metadata_documents(&self, path: &str) -> anyhow::Result<Vec<Bytes>> {
        let fetches = self.remotes.iter().map(|remote| async move {
            match remote.fetch(path).await {
                Ok(Some(remote_file)) => match collect_stream(remote_file.data).await {
                    Ok(document) => Some(document),
                    Err(e) => {
                        warn!("discarding metadata from repository {:?}: {:#}", remote.id(), e);
                        None
                    }
                },
                Ok(None) => None,
                Err(e) => {
                    warn!("repository {:?} failed for metadata {}: {:#}", remote.id(), path, e);
                    None
                }
            }
        });

        Ok(join_all(fetches).await.into_iter().flatten().collect())
    }

    async fn store(&self, repository_path: &str, data: Bytes) -> anyhow::Result<()> {
        self.local.put(repository_path, &data).await
    }
}

async fn collect_stream(stream: impl Stream<Item = anyhow::Result<Bytes>>) -> anyhow::Result<Bytes> {
    let mut stream = Box::pin(stream);
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buffer))
}
