pub mod download;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::repo::resolver::ArtifactResolver;

const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared state of the HTTP endpoints.
pub struct AppState {
    pub resolver: Arc<dyn ArtifactResolver>,
    pub request_timeout: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/repo/*path", get(download::download).put(upload::upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct StatusInfo {
    name: &'static str,
    version: &'static str,
}

async fn status() -> Json<StatusInfo> {
    Json(StatusInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::maven::coordinates::MavenArtifactRef;
    use crate::repo::resolver::{ArtifactResolver, ResolvedArtifact};

    /// In-memory resolver for endpoint tests, in the spirit of a transient
    /// blob store: artifacts are a map from repository path to bytes,
    /// metadata documents are returned verbatim for any metadata path.
    #[derive(Default)]
    pub struct StubResolver {
        pub artifacts: Mutex<HashMap<String, Bytes>>,
        pub metadata: Vec<Bytes>,
        pub stored: Mutex<Vec<(String, Bytes)>>,
        pub delay: Option<Duration>,
    }

    impl StubResolver {
        pub fn empty() -> StubResolver {
            StubResolver::default()
        }

        pub fn with_artifact(repository_path: &str, data: &[u8]) -> StubResolver {
            let stub = StubResolver::default();
            stub.artifacts
                .lock()
                .unwrap()
                .insert(repository_path.to_string(), Bytes::copy_from_slice(data));
            stub
        }

        pub fn with_metadata(documents: Vec<&str>) -> StubResolver {
            StubResolver {
                metadata: documents
                    .into_iter()
                    .map(|document| Bytes::copy_from_slice(document.as_bytes()))
                    .collect(),
                ..StubResolver::default()
            }
        }
    }

    #[async_trait]
    impl ArtifactResolver for StubResolver {
        async fn resolve(
            &self,
            artifact_ref: &MavenArtifactRef,
        ) -> anyhow::Result<Option<ResolvedArtifact>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let data = self
                .artifacts
                .lock()
                .unwrap()
                .get(&artifact_ref.repository_path())
                .cloned();

            Ok(data.map(|data| ResolvedArtifact {
                content_length: Some(data.len() as u64),
                data: Box::pin(futures::stream::once(async move {
                    Ok::<_, anyhow::Error>(data)
                })),
            }))
        }

        async fn metadata_documents(&self, _path: &str) -> anyhow::Result<Vec<Bytes>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.metadata.clone())
        }

        async fn store(&self, repository_path: &str, data: Bytes) -> anyhow::Result<()> {
            self.stored
                .lock()
                .unwrap()
                .push((repository_path.to_string(), data));
            Ok(())
        }
    }

    pub fn test_app(resolver: Arc<StubResolver>) -> Router {
        test_app_with_timeout(resolver, Duration::from_secs(5))
    }

    pub fn test_app_with_timeout(resolver: Arc<StubResolver>, request_timeout: Duration) -> Router {
        router(Arc::new(AppState {
            resolver,
            request_timeout,
        }))
    }
}
