use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ProxyError;
use crate::maven::coordinates::*;

lazy_static! {
    static ref METADATA_FILE_REGEX: Regex = Regex::new(
        r"^maven-metadata(?:-(?P<qualifier>[^/]+?))?\.xml(?:\.(?P<checksum>sha1|md5))?$"
    )
    .unwrap();
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ChecksumKind {
    Sha1,
    Md5,
}
impl ChecksumKind {
    fn from_extension(extension: &str) -> Option<ChecksumKind> {
        match extension {
            "sha1" => Some(ChecksumKind::Sha1),
            "md5" => Some(ChecksumKind::Md5),
            _ => None,
        }
    }
}

/// A request for a `maven-metadata.xml` file - optionally a qualified variant
/// like `maven-metadata-local.xml` and optionally one of its checksum
/// companions.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MetadataRequest {
    /// Repository-relative directory, without trailing slash. May be empty.
    pub dir_path: String,
    /// The full file name as requested, e.g. `maven-metadata-local.xml.sha1`.
    pub file_name: String,
    pub qualifier: Option<String>,
    pub checksum: Option<ChecksumKind>,
}

impl MetadataRequest {
    /// The repository-relative path of the metadata document itself, with any
    /// checksum suffix stripped.
    pub fn document_path(&self) -> String {
        let file_name = match self.checksum {
            None => self.file_name.as_str(),
            Some(_) => match self.file_name.rsplit_once('.') {
                Some((stem, _)) => stem,
                None => self.file_name.as_str(),
            },
        };

        if self.dir_path.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.dir_path, file_name)
        }
    }
}

/// The two kinds of GET request a repository path can express.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum RepoRequest {
    Artifact(MavenArtifactRef),
    Metadata(MetadataRequest),
}

/// Classifies a repository-relative path. Metadata recognition wins over
/// artifact parsing - a `maven-metadata.xml` file name never parses as an
/// artifact anyway, but deciding up front keeps the error messages sane.
pub fn classify_path(path: &str) -> Result<RepoRequest, ProxyError> {
    if let Some(metadata_request) = parse_metadata_path(path) {
        return Ok(RepoRequest::Metadata(metadata_request));
    }
    parse_artifact_path(path).map(RepoRequest::Artifact)
}

/// Recognizes `.../maven-metadata[-qualifier].xml[.sha1|.md5]` paths.
pub fn parse_metadata_path(path: &str) -> Option<MetadataRequest> {
    let (dir_path, file_name) = match path.rfind('/') {
        Some(last_slash) => (&path[..last_slash], &path[last_slash + 1..]),
        None => ("", path),
    };

    let captures = METADATA_FILE_REGEX.captures(file_name)?;

    Some(MetadataRequest {
        dir_path: dir_path.to_string(),
        file_name: file_name.to_string(),
        qualifier: captures.name("qualifier").map(|m| m.as_str().to_string()),
        checksum: captures
            .name("checksum")
            .and_then(|m| ChecksumKind::from_extension(m.as_str())),
    })
}

/// Parses a repository-relative artifact path into a [MavenArtifactRef].
///
/// The layout is `group/segments/artifactId/version/fileName`: the last
/// segment is the file name, the one before it the version, the one before
/// that the artifact id, and everything further up joins with dots into the
/// group id. The file name must start with `artifactId-version`; the rest is
/// `[-classifier].extension` where the classifier runs up to the first dot
/// and the extension keeps every following dot verbatim - so
/// `lib-1.0.tar.gz` has extension `tar.gz`, and a checksum companion like
/// `lib-1.0.xml.sha1` has extension `xml.sha1`.
pub fn parse_artifact_path(path: &str) -> Result<MavenArtifactRef, ProxyError> {
    let invalid = || ProxyError::InvalidRequest(format!("not a valid Maven artifact path: {:?}", path));

    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 4 || segments.iter().any(|s| s.is_empty()) {
        return Err(invalid());
    }

    let file_name = segments[segments.len() - 1];
    let version = segments[segments.len() - 2];
    let artifact_id = segments[segments.len() - 3];
    let group_id = segments[..segments.len() - 3].join(".");

    let prefix = format!("{}-{}", artifact_id, version);
    let rest = file_name.strip_prefix(prefix.as_str()).ok_or_else(invalid)?;

    let (classifier, extension) = if let Some(rest) = rest.strip_prefix('-') {
        let (classifier, extension) = rest.split_once('.').ok_or_else(invalid)?;
        if classifier.is_empty() || extension.is_empty() {
            return Err(invalid());
        }
        (MavenClassifier::Classified(classifier.to_string()), extension)
    } else if let Some(extension) = rest.strip_prefix('.') {
        if extension.is_empty() {
            return Err(invalid());
        }
        (MavenClassifier::Unclassified, extension)
    } else {
        return Err(invalid());
    };

    Ok(MavenArtifactRef {
        coordinates: MavenCoordinates {
            group_id: MavenGroupId(group_id),
            artifact_id: MavenArtifactId(artifact_id.to_string()),
            version: MavenVersion(version.to_string()),
        },
        classifier,
        extension: extension.to_string(),
    })
}
