//! Parsing, merging and rendering of `maven-metadata.xml` documents, following
//! the repository metadata schema at
//! https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html
#![allow(non_snake_case)]

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MetadataXml {
    groupId: Option<String>,
    artifactId: Option<String>,
    versioning: Option<VersioningXml>,
}

#[derive(Debug, Deserialize, Default)]
struct VersioningXml {
    latest: Option<String>,
    release: Option<String>,
    versions: Option<VersionsXml>,
    lastUpdated: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct VersionsXml {
    #[serde(default)]
    version: Vec<String>,
}

/// One metadata document in its parsed form - either straight from a remote
/// repository or the result of merging several of them.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MetadataDocument {
    pub group_id: String,
    pub artifact_id: String,
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
    pub last_updated: Option<String>,
}

pub fn parse_metadata(xml: &str) -> anyhow::Result<MetadataDocument> {
    let raw: MetadataXml = serde_xml_rs::from_str(xml).context("malformed maven-metadata.xml")?;
    let versioning = raw.versioning.unwrap_or_default();

    Ok(MetadataDocument {
        group_id: raw.groupId.unwrap_or_default(),
        artifact_id: raw.artifactId.unwrap_or_default(),
        latest: versioning.latest,
        release: versioning.release,
        versions: versioning.versions.unwrap_or_default().version,
        last_updated: versioning.lastUpdated,
    })
}

/// Merges the metadata documents collected from the remote repositories into
/// one. `versions` becomes the union in first-seen order with exact-string
/// deduplication; `latest`, `release` and `lastUpdated` are taken from the
/// contributing document with the greatest `lastUpdated` timestamp. Returns
/// `None` when no repository contributed a document.
pub fn merge_metadata(documents: Vec<MetadataDocument>) -> Option<MetadataDocument> {
    let mut documents = documents.into_iter();
    let mut merged = documents.next()?;

    let own_versions = std::mem::take(&mut merged.versions);
    for version in own_versions {
        push_unique(&mut merged.versions, version);
    }

    for document in documents {
        for version in document.versions {
            push_unique(&mut merged.versions, version);
        }

        if newer(document.last_updated.as_deref(), merged.last_updated.as_deref()) {
            merged.latest = document.latest;
            merged.release = document.release;
            merged.last_updated = document.last_updated;
        }
    }

    Some(merged)
}

fn push_unique(versions: &mut Vec<String>, version: String) {
    if !versions.contains(&version) {
        versions.push(version);
    }
}

/// `lastUpdated` is a 14-digit `yyyyMMddHHmmss` string; compare numerically,
/// falling back to string order for values that do not parse.
fn newer(candidate: Option<&str>, current: Option<&str>) -> bool {
    match (candidate, current) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(candidate), Some(current)) => match (candidate.parse::<u64>(), current.parse::<u64>()) {
            (Ok(candidate), Ok(current)) => candidate > current,
            _ => candidate > current,
        },
    }
}

impl MetadataDocument {
    /// Renders the document in the standard metadata schema.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<metadata>\n");
        xml.push_str(&format!("  <groupId>{}</groupId>\n", escape_xml(&self.group_id)));
        xml.push_str(&format!("  <artifactId>{}</artifactId>\n", escape_xml(&self.artifact_id)));
        xml.push_str("  <versioning>\n");
        if let Some(latest) = &self.latest {
            xml.push_str(&format!("    <latest>{}</latest>\n", escape_xml(latest)));
        }
        if let Some(release) = &self.release {
            xml.push_str(&format!("    <release>{}</release>\n", escape_xml(release)));
        }
        xml.push_str("    <versions>\n");
        for version in &self.versions {
            xml.push_str(&format!("      <version>{}</version>\n", escape_xml(version)));
        }
        xml.push_str("    </versions>\n");
        if let Some(last_updated) = &self.last_updated {
            xml.push_str(&format!("    <lastUpdated>{}</lastUpdated>\n", escape_xml(last_updated)));
        }
        xml.push_str("  </versioning>\n");
        xml.push_str("</metadata>\n");
        xml
    }
}

fn escape_xml(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
