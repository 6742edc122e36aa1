use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use hyper::{Body, Response};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::error::{ProxyError, ProxyResult};
use crate::maven::coordinates::MavenArtifactRef;
use crate::maven::metadata::{merge_metadata, parse_metadata, MetadataDocument};
use crate::maven::paths::{classify_path, ChecksumKind, MetadataRequest, RepoRequest};
use crate::proxy::AppState;
use crate::repo::resolver::ResolvedArtifact;

/// GET handler for `/repo/*path`: artifact requests stream the resolved file,
/// metadata requests merge the documents of every configured remote.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(repo_path): Path<String>,
) -> ProxyResult<Response<Body>> {
    let request = classify_path(&repo_path)?;
    debug!("download request for {}: {:?}", repo_path, request);

    match request {
        RepoRequest::Artifact(artifact_ref) => download_artifact(&state, artifact_ref).await,
        RepoRequest::Metadata(metadata_request) => download_metadata(&state, metadata_request).await,
    }
}

async fn download_artifact(
    state: &AppState,
    artifact_ref: MavenArtifactRef,
) -> ProxyResult<Response<Body>> {
    let resolving = {
        // resolution runs detached: if the deadline fires it is abandoned,
        // not aborted
        let resolver = state.resolver.clone();
        let artifact_ref = artifact_ref.clone();
        tokio::spawn(async move { resolver.resolve(&artifact_ref).await })
    };

    let resolved = match tokio::time::timeout(state.request_timeout, resolving).await {
        Err(_) => return Err(ProxyError::Timeout),
        Ok(Err(join_error)) => return Err(ProxyError::Internal(join_error.into())),
        Ok(Ok(result)) => result?,
    };

    match resolved {
        None => Err(ProxyError::NotFound),
        Some(artifact) => {
            info!("streaming {}", artifact_ref);
            artifact_response(&artifact_ref, artifact)
        }
    }
}

fn artifact_response(
    artifact_ref: &MavenArtifactRef,
    artifact: ResolvedArtifact,
) -> ProxyResult<Response<Body>> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(&artifact_ref.extension));
    if let Some(content_length) = artifact.content_length {
        builder = builder.header(CONTENT_LENGTH, content_length);
    }

    builder
        .body(Body::wrap_stream(artifact.data))
        .map_err(|e| ProxyError::Internal(e.into()))
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pom" | "xml" => "text/xml",
        "jar" | "war" | "ear" => "application/java-archive",
        "sha1" | "md5" | "asc" => "text/plain",
        ext if ext.ends_with(".sha1") || ext.ends_with(".md5") => "text/plain",
        _ => "application/octet-stream",
    }
}

async fn download_metadata(
    state: &AppState,
    metadata_request: MetadataRequest,
) -> ProxyResult<Response<Body>> {
    let document_path = metadata_request.document_path();

    let fetching = {
        let resolver = state.resolver.clone();
        let document_path = document_path.clone();
        tokio::spawn(async move { resolver.metadata_documents(&document_path).await })
    };

    let raw_documents = match tokio::time::timeout(state.request_timeout, fetching).await {
        Err(_) => return Err(ProxyError::Timeout),
        Ok(Err(join_error)) => return Err(ProxyError::Internal(join_error.into())),
        Ok(Ok(result)) => result?,
    };

    let mut documents = Vec::with_capacity(raw_documents.len());
    for raw in &raw_documents {
        let text = std::str::from_utf8(raw).map_err(anyhow::Error::from)?;
        documents.push(parse_metadata(text)?);
    }

    let merged: MetadataDocument = merge_metadata(documents).ok_or(ProxyError::NotFound)?;
    info!(
        "merged metadata for {} from {} remote document(s)",
        document_path,
        raw_documents.len()
    );

    let xml = merged.to_xml();
    match metadata_request.checksum {
        None => metadata_response("text/xml", xml.into_bytes()),
        Some(kind) => {
            // checksums of merged metadata refer to the document this proxy
            // serves, never to any single remote's copy
            metadata_response("text/plain", checksum_of(kind, xml.as_bytes()).into_bytes())
        }
    }
}

fn checksum_of(kind: ChecksumKind, data: &[u8]) -> String {
    match kind {
        ChecksumKind::Sha1 => {
            let mut hasher = Sha1::default();
            hasher.update(data);
            hex::encode(hasher.finalize())
        }
        ChecksumKind::Md5 => hex::encode(md5::compute(data).0),
    }
}

fn metadata_response(content_type: &'static str, body: Vec<u8>) -> ProxyResult<Response<Body>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .map_err(|e| ProxyError::Internal(e.into()))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::{Request, StatusCode};
    use hyper::Body;
    use rstest::*;
    use tower::ServiceExt;

    use crate::proxy::testing::{test_app, test_app_with_timeout, StubResolver};

    const METADATA_A: &str = r#"<metadata><groupId>org.scala-lang</groupId><artifactId>scala-library</artifactId><versioning><latest>2.10.4</latest><release>2.10.4</release><versions><version>2.10.4</version></versions><lastUpdated>20140918132816</lastUpdated></versioning></metadata>"#;
    const METADATA_B: &str = r#"<metadata><groupId>org.scala-lang</groupId><artifactId>scala-library</artifactId><versioning><latest>2.12.0.redhat-610399</latest><release>2.12.0.redhat-610399</release><versions><version>2.12.0.redhat-610399</version></versions><lastUpdated>20141019130841</lastUpdated></versioning></metadata>"#;

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_artifact_round_trips_byte_for_byte() {
        let resolver = Arc::new(StubResolver::with_artifact(
            "org/acme/acme-core/1.0/acme-core-1.0.jar",
            &[0x42],
        ));

        let (status, body) = get(
            test_app(resolver),
            "/repo/org/acme/acme-core/1.0/acme-core-1.0.jar",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, vec![0x42]);
    }

    #[tokio::test]
    async fn test_unresolvable_artifact_is_404() {
        let (status, _) = get(
            test_app(Arc::new(StubResolver::empty())),
            "/repo/org/acme/acme-core/1.0/acme-core-1.0.jar",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[case::single_segment("/repo/not-a-path")]
    #[case::too_few_segments("/repo/acme-core/1.0/acme-core-1.0.jar")]
    #[case::filename_mismatch("/repo/org/acme/acme-core/1.0/other-1.0.jar")]
    #[tokio::test]
    async fn test_malformed_path_is_400(#[case] uri: &str) {
        let (status, _) = get(test_app(Arc::new(StubResolver::empty())), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metadata_documents_are_merged() {
        let resolver = Arc::new(StubResolver::with_metadata(vec![METADATA_A, METADATA_B]));

        let (status, body) = get(
            test_app(resolver),
            "/repo/org/scala-lang/scala-library/maven-metadata.xml",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let xml = String::from_utf8(body).unwrap();
        assert!(xml.contains("<version>2.10.4</version>"));
        assert!(xml.contains("<version>2.12.0.redhat-610399</version>"));
        assert!(xml.contains("<latest>2.12.0.redhat-610399</latest>"));
        assert!(xml.contains("<lastUpdated>20141019130841</lastUpdated>"));
    }

    #[tokio::test]
    async fn test_metadata_checksum_is_computed_over_merged_document() {
        let resolver = Arc::new(StubResolver::with_metadata(vec![METADATA_A, METADATA_B]));
        let app = test_app(resolver.clone());

        let (_, xml) = get(
            app.clone(),
            "/repo/org/scala-lang/scala-library/maven-metadata.xml",
        )
        .await;
        let (status, checksum) = get(
            app,
            "/repo/org/scala-lang/scala-library/maven-metadata.xml.sha1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let mut hasher = sha1::Sha1::default();
        sha1::Digest::update(&mut hasher, &xml);
        let expected = hex::encode(sha1::Digest::finalize(hasher));
        assert_eq!(String::from_utf8(checksum).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_metadata_without_any_remote_document_is_404() {
        let (status, _) = get(
            test_app(Arc::new(StubResolver::empty())),
            "/repo/org/acme/acme-core/maven-metadata.xml",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_remote_metadata_is_500() {
        let resolver = Arc::new(StubResolver::with_metadata(vec!["this is not XML"]));

        let (status, _) = get(
            test_app(resolver),
            "/repo/org/acme/acme-core/maven-metadata.xml",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_slow_resolution_is_504() {
        let resolver = Arc::new(StubResolver {
            delay: Some(Duration::from_secs(60)),
            ..StubResolver::default()
        });

        let (status, _) = get(
            test_app_with_timeout(resolver, Duration::from_millis(20)),
            "/repo/org/acme/acme-core/1.0/acme-core-1.0.jar",
        )
        .await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }
}
