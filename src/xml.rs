// ─────────────────────────────────────────────────────────────────────────────
// wsus-metadata-store
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
// ─────────────────────────────────────────────────────────────────────────────
//! Parses the raw per-package XML blob into the structured fields the
//! secondary indexes are built from (SPEC_FULL §10.5).
//!
//! Parsing is tolerant: a missing optional element yields `None`/empty
//! rather than an error. Only XML that does not parse at all is an error.

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{CmsError, CmsResult};
use crate::record::{DriverMetadataItem, DriverVersion, FeatureScore, FileRecord, Prerequisite};

#[derive(Debug, Deserialize)]
#[serde(rename = "Update")]
struct UpdateXml {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "KbArticle", default)]
    kb_article: Option<String>,
    #[serde(rename = "Prerequisites", default)]
    prerequisites: Option<PrerequisitesXml>,
    #[serde(rename = "Bundles", default)]
    bundles: Option<BundlesXml>,
    #[serde(rename = "Files", default)]
    files: Option<FilesXml>,
    #[serde(rename = "Supersedes", default)]
    supersedes: Option<SupersedesXml>,
    #[serde(rename = "DriverMetadata", default)]
    driver_metadata: Option<DriverMetadataXml>,
}

#[derive(Debug, Default, Deserialize)]
struct PrerequisitesXml {
    #[serde(rename = "Simple", default)]
    simple: Vec<SimplePrereqXml>,
    #[serde(rename = "AtLeastOne", default)]
    at_least_one: Vec<AtLeastOneXml>,
}

#[derive(Debug, Deserialize)]
struct SimplePrereqXml {
    #[serde(rename = "@Guid")]
    guid: Uuid,
}

#[derive(Debug, Deserialize)]
struct AtLeastOneXml {
    #[serde(rename = "@IsCategory", default)]
    is_category: bool,
    #[serde(rename = "Guid", default)]
    guids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct BundlesXml {
    #[serde(rename = "Child", default)]
    children: Vec<ChildXml>,
}

#[derive(Debug, Deserialize)]
struct ChildXml {
    #[serde(rename = "@Guid")]
    guid: Uuid,
    #[serde(rename = "@Revision")]
    revision: i32,
}

#[derive(Debug, Default, Deserialize)]
struct FilesXml {
    #[serde(rename = "File", default)]
    files: Vec<FileXml>,
}

#[derive(Debug, Deserialize)]
struct FileXml {
    #[serde(rename = "@Hash")]
    hash: String,
    #[serde(rename = "@Url")]
    url: String,
    #[serde(rename = "@Size", default)]
    size: u64,
    #[serde(rename = "@Modified", default)]
    modified: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct SupersedesXml {
    #[serde(rename = "Guid", default)]
    guids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct DriverMetadataXml {
    #[serde(rename = "Driver", default)]
    drivers: Vec<DriverXml>,
}

#[derive(Debug, Deserialize)]
struct DriverXml {
    #[serde(rename = "@HardwareId")]
    hardware_id: String,
    #[serde(rename = "@DriverClass", default)]
    driver_class: String,
    #[serde(rename = "Version")]
    version: VersionXml,
    #[serde(rename = "FeatureScore", default)]
    feature_scores: Vec<FeatureScoreXml>,
    #[serde(rename = "TargetComputerHardwareIds", default)]
    target: Option<GuidListXml>,
    #[serde(rename = "DistributionComputerHardwareIds", default)]
    distribution: Option<GuidListXml>,
}

#[derive(Debug, Deserialize)]
struct VersionXml {
    #[serde(rename = "@Date")]
    date: chrono::NaiveDate,
    #[serde(rename = "@Parts")]
    parts: String,
}

#[derive(Debug, Deserialize)]
struct FeatureScoreXml {
    #[serde(rename = "@Os")]
    os: String,
    #[serde(rename = "@Score")]
    score: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GuidListXml {
    #[serde(rename = "Guid", default)]
    guids: Vec<Uuid>,
}

/// Fields extracted from one package's raw XML.
pub struct ParsedXml {
    pub title: String,
    pub kb_article: Option<String>,
    pub prerequisites: Vec<Prerequisite>,
    pub bundled_children_raw: Vec<(Uuid, i32)>,
    pub files: Vec<FileRecord>,
    pub superseded_guids: Vec<Uuid>,
    pub driver_metadata: Option<Vec<DriverMetadataItem>>,
}

pub fn parse(xml: &[u8]) -> CmsResult<ParsedXml> {
    let parsed: UpdateXml =
        quick_xml::de::from_reader(xml).map_err(|e| CmsError::XmlError(e.to_string()))?;

    let prerequisites = parsed
        .prerequisites
        .map(|p| {
            let mut out: Vec<Prerequisite> = p
                .simple
                .into_iter()
                .map(|s| Prerequisite::Simple(s.guid))
                .collect();
            out.extend(p.at_least_one.into_iter().map(|a| Prerequisite::AtLeastOne {
                guids: a.guids,
                is_category: a.is_category,
            }));
            out
        })
        .unwrap_or_default();

    let bundled_children_raw = parsed
        .bundles
        .map(|b| b.children.into_iter().map(|c| (c.guid, c.revision)).collect())
        .unwrap_or_default();

    let files = parsed
        .files
        .map(|f| {
            f.files
                .into_iter()
                .map(|fx| FileRecord {
                    hash: fx.hash,
                    url: fx.url,
                    size: fx.size,
                    modified: fx.modified,
                })
                .collect()
        })
        .unwrap_or_default();

    let superseded_guids = parsed.supersedes.map(|s| s.guids).unwrap_or_default();

    let driver_metadata = parsed.driver_metadata.map(|dm| {
        dm.drivers
            .into_iter()
            .map(|d| {
                let parts = parse_version_parts(&d.version.parts);
                DriverMetadataItem {
                    hardware_id: d.hardware_id.to_lowercase(),
                    version: DriverVersion {
                        date: d.version.date,
                        parts,
                    },
                    driver_class: d.driver_class,
                    feature_scores: d
                        .feature_scores
                        .into_iter()
                        .map(|fs| FeatureScore {
                            os: fs.os,
                            score: fs.score,
                        })
                        .collect(),
                    target_computer_hardware_ids: d.target.map(|g| g.guids).unwrap_or_default(),
                    distribution_computer_hardware_ids: d
                        .distribution
                        .map(|g| g.guids)
                        .unwrap_or_default(),
                }
            })
            .collect()
    });

    Ok(ParsedXml {
        title: parsed.title,
        kb_article: parsed.kb_article.filter(|s| !s.is_empty()),
        prerequisites,
        bundled_children_raw,
        files,
        superseded_guids,
        driver_metadata,
    })
}

fn parse_version_parts(s: &str) -> [u16; 4] {
    let mut parts = [0u16; 4];
    for (i, p) in s.split('.').take(4).enumerate() {
        parts[i] = p.parse().unwrap_or(0);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Update>
        <Title>Patch X</Title>
        <KbArticle>KB101</KbArticle>
        <Prerequisites>
            <Simple Guid="00000000-0000-0000-0000-000000000001"/>
            <AtLeastOne IsCategory="true">
                <Guid>00000000-0000-0000-0000-000000000002</Guid>
                <Guid>00000000-0000-0000-0000-000000000003</Guid>
            </AtLeastOne>
        </Prerequisites>
        <Bundles>
            <Child Guid="00000000-0000-0000-0000-000000000004" Revision="1"/>
        </Bundles>
        <Files>
            <File Hash="abc123" Url="http://example.com/a.cab" Size="10"/>
        </Files>
        <Supersedes>
            <Guid>00000000-0000-0000-0000-000000000005</Guid>
        </Supersedes>
    </Update>"#;

    #[test]
    fn parses_core_fields() {
        let p = parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(p.title, "Patch X");
        assert_eq!(p.kb_article.as_deref(), Some("KB101"));
        assert_eq!(p.prerequisites.len(), 2);
        assert_eq!(p.bundled_children_raw.len(), 1);
        assert_eq!(p.files.len(), 1);
        assert_eq!(p.superseded_guids.len(), 1);
        assert!(p.driver_metadata.is_none());
    }

    #[test]
    fn missing_optional_fields_are_empty_not_errors() {
        let p = parse(b"<Update><Title>Minimal</Title></Update>").unwrap();
        assert_eq!(p.title, "Minimal");
        assert!(p.kb_article.is_none());
        assert!(p.prerequisites.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse(b"<Update><Title>unclosed").is_err());
    }
}
