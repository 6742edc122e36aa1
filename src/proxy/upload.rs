use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use hyper::{Body, Response};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::{ProxyError, ProxyResult};
use crate::maven::coordinates::*;
use crate::maven::paths::parse_artifact_path;
use crate::proxy::AppState;

/// Request header a client may set to dictate the reported storage location;
/// it takes precedence over anything derived from the upload itself.
pub const LOCATION_HEADER: &str = "x-location";

/// How the coordinates of an upload were established. Decides whether the
/// response reports the storage location: a client that already sent the full
/// Maven path does not need to be told where its artifact went, one that sent
/// a bare file name does.
enum UploadTarget {
    FromPath(MavenArtifactRef),
    FromArchive(MavenArtifactRef),
    Fallback(String),
}

/// PUT handler for `/repo/*path`.
///
/// A path with slashes must be a full Maven layout path. A bare file name is
/// probed for an embedded `pom.properties`; uploads where that fails land at
/// a generated fallback location rather than failing the request.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(repo_path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ProxyResult<Response<Body>> {
    let target = if repo_path.contains('/') {
        UploadTarget::FromPath(parse_artifact_path(&repo_path)?)
    } else {
        match coordinates_from_archive(&repo_path, &body) {
            Some(artifact_ref) => {
                debug!("derived {} from pom.properties in upload {}", artifact_ref, repo_path);
                UploadTarget::FromArchive(artifact_ref)
            }
            None => UploadTarget::Fallback(fallback_path(&repo_path)),
        }
    };

    let repository_path = match &target {
        UploadTarget::FromPath(artifact_ref) | UploadTarget::FromArchive(artifact_ref) => {
            artifact_ref.repository_path()
        }
        UploadTarget::Fallback(path) => path.clone(),
    };

    info!("storing upload of {} bytes at {}", body.len(), repository_path);
    state.resolver.store(&repository_path, body).await?;

    let location = headers
        .get(LOCATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(match &target {
            UploadTarget::FromArchive(_) => Some(repository_path),
            UploadTarget::FromPath(_) | UploadTarget::Fallback(_) => None,
        });

    let mut builder = Response::builder().status(StatusCode::NO_CONTENT);
    if let Some(location) = location {
        builder = builder.header(LOCATION_HEADER, location);
    }
    builder
        .body(Body::empty())
        .map_err(|e| ProxyError::Internal(e.into()))
}

/// Tries to read Maven coordinates from a `pom.properties` packaged inside an
/// uploaded zip/jar/war. Anything that is not a readable archive carrying
/// such an entry yields `None`.
fn coordinates_from_archive(file_name: &str, body: &Bytes) -> Option<MavenArtifactRef> {
    let mut archive = match ZipArchive::new(Cursor::new(body.as_ref())) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("upload {} is not a readable archive: {}", file_name, e);
            return None;
        }
    };

    let entry_name = archive
        .file_names()
        .find(|name| name.starts_with("META-INF/maven/") && name.ends_with("/pom.properties"))
        .map(str::to_string)?;

    let mut content = String::new();
    match archive.by_name(&entry_name) {
        Ok(mut entry) => {
            if let Err(e) = entry.read_to_string(&mut content) {
                warn!("failed reading {} from upload {}: {}", entry_name, file_name, e);
                return None;
            }
        }
        Err(e) => {
            warn!("failed opening {} from upload {}: {}", entry_name, file_name, e);
            return None;
        }
    }

    let properties = parse_properties(&content);
    let group_id = properties.get("groupId")?;
    let artifact_id = properties.get("artifactId")?;
    let version = properties.get("version")?;

    Some(MavenArtifactRef {
        coordinates: MavenCoordinates {
            group_id: MavenGroupId(group_id.clone()),
            artifact_id: MavenArtifactId(artifact_id.clone()),
            version: MavenVersion(version.clone()),
        },
        classifier: MavenClassifier::Unclassified,
        extension: extension_of(file_name),
    })
}

/// The line-oriented subset of the java.util.Properties format that Maven's
/// archiver actually writes.
fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            extension.to_string()
        }
        _ => "jar".to_string(),
    }
}

/// Landing spot for uploads that carry no usable coordinates.
fn fallback_path(file_name: &str) -> String {
    format!(".uploads/{}/{}", Uuid::new_v4().as_hyphenated(), file_name)
}
