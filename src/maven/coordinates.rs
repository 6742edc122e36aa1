use std::fmt;

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MavenGroupId(pub String);

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MavenArtifactId(pub String);

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MavenVersion(pub String);
impl MavenVersion {
    pub fn is_snapshot(&self) -> bool {
        self.0.ends_with("-SNAPSHOT")
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MavenCoordinates {
    pub group_id: MavenGroupId,
    pub artifact_id: MavenArtifactId,
    pub version: MavenVersion,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum MavenClassifier {
    Unclassified,
    Classified(String),
}

/// A fully qualified reference to one artifact file: coordinates plus
/// classifier and file extension. The extension is stored without the leading
/// dot but may contain dots of its own - `tar.gz`, or `xml.sha1` for a
/// checksum companion file.
///
/// Renders via [fmt::Display] as the canonical
/// `group:artifact:extension[:classifier]:version` coordinate string.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MavenArtifactRef {
    pub coordinates: MavenCoordinates,
    pub classifier: MavenClassifier,
    pub extension: String,
}

impl MavenArtifactRef {
    /// The relative path of this artifact inside a repository using the
    /// standard layout.
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.coordinates.group_id.0.replace('.', "/"),
            self.coordinates.artifact_id.0,
            self.coordinates.version.0,
            self.file_name(),
        )
    }

    pub fn file_name(&self) -> String {
        let classifier_string = match &self.classifier {
            MavenClassifier::Unclassified => "".to_string(),
            MavenClassifier::Classified(c) => format!("-{}", c),
        };

        format!(
            "{}-{}{}.{}",
            self.coordinates.artifact_id.0,
            self.coordinates.version.0,
            classifier_string,
            self.extension,
        )
    }
}

impl fmt::Display for MavenArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.coordinates.group_id.0, self.coordinates.artifact_id.0, self.extension
        )?;
        if let MavenClassifier::Classified(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        write!(f, ":{}", self.coordinates.version.0)
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    fn artifact_ref(
        group_id: &str,
        artifact_id: &str,
        version: &str,
        classifier: Option<&str>,
        extension: &str,
    ) -> MavenArtifactRef {
        MavenArtifactRef {
            coordinates: MavenCoordinates {
                group_id: MavenGroupId(group_id.to_string()),
                artifact_id: MavenArtifactId(artifact_id.to_string()),
                version: MavenVersion(version.to_string()),
            },
            classifier: match classifier {
                None => MavenClassifier::Unclassified,
                Some(c) => MavenClassifier::Classified(c.to_string()),
            },
            extension: extension.to_string(),
        }
    }

    #[rstest]
    #[case::plain("org.acme", "acme-core", "1.0", None, "jar", "org.acme:acme-core:jar:1.0")]
    #[case::classifier("org.acme", "acme-core", "1.0", Some("sources"), "jar", "org.acme:acme-core:jar:sources:1.0")]
    #[case::dotted_extension("org.acme", "acme-dist", "2.1", None, "tar.gz", "org.acme:acme-dist:tar.gz:2.1")]
    fn test_coordinate_string(
        #[case] group_id: &str,
        #[case] artifact_id: &str,
        #[case] version: &str,
        #[case] classifier: Option<&str>,
        #[case] extension: &str,
        #[case] expected: &str,
    ) {
        let actual = artifact_ref(group_id, artifact_id, version, classifier, extension);
        assert_eq!(actual.to_string(), expected);
    }

    #[rstest]
    #[case::plain("org.acme", "acme-core", "1.0", None, "jar", "org/acme/acme-core/1.0/acme-core-1.0.jar")]
    #[case::classifier("org.acme", "acme-core", "1.0", Some("sources"), "jar", "org/acme/acme-core/1.0/acme-core-1.0-sources.jar")]
    fn test_repository_path(
        #[case] group_id: &str,
        #[case] artifact_id: &str,
        #[case] version: &str,
        #[case] classifier: Option<&str>,
        #[case] extension: &str,
        #[case] expected: &str,
    ) {
        let actual = artifact_ref(group_id, artifact_id, version, classifier, extension);
        assert_eq!(actual.repository_path(), expected);
    }

    #[rstest]
    #[case::release("1.0.0", false)]
    #[case::snapshot("1.0.0-SNAPSHOT", true)]
    #[case::lowercase("1.0.0-snapshot", false)]
    fn test_is_snapshot(#[case] version: &str, #[case] expected: bool) {
        assert_eq!(MavenVersion(version.to_string()).is_snapshot(), expected);
    }
}
