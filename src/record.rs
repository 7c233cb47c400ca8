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
//! The logical record a producer hands to the sink, and the structured
//! types it is built from (§3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{PackageIdentity, PackageKind};

/// A prerequisite: either a single required GUID, or a disjunction over a
/// list of GUIDs, optionally marked as a category group (§3, §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    Simple(Uuid),
    AtLeastOne { guids: Vec<Uuid>, is_category: bool },
}

/// All-zero GUID sentinel appended to an on-disk `AtLeastOne` entry when
/// `is_category` is true (§9). Preserved exactly for round-trip fidelity.
pub const CATEGORY_SENTINEL: Uuid = Uuid::nil();

impl Prerequisite {
    /// Flatten to the set of GUIDs this prerequisite actually requires one
    /// of (used by the prerequisite graph, §4.7).
    pub fn guids(&self) -> Vec<Uuid> {
        match self {
            Prerequisite::Simple(g) => vec![*g],
            Prerequisite::AtLeastOne { guids, .. } => guids.clone(),
        }
    }

    /// Encode as the on-disk (index, guid-list) shape used by the
    /// prerequisites secondary index (§4.4).
    pub(crate) fn to_wire_guids(&self) -> Vec<Uuid> {
        match self {
            Prerequisite::Simple(g) => vec![*g],
            Prerequisite::AtLeastOne { guids, is_category } => {
                let mut v = guids.clone();
                if *is_category {
                    v.push(CATEGORY_SENTINEL);
                }
                v
            }
        }
    }

    /// Rehydrate from the on-disk (index, guid-list) shape.
    pub(crate) fn from_wire_guids(mut guids: Vec<Uuid>) -> Self {
        if guids.len() == 1 {
            return Prerequisite::Simple(guids[0]);
        }
        let is_category = guids.last() == Some(&CATEGORY_SENTINEL);
        if is_category {
            guids.pop();
        }
        Prerequisite::AtLeastOne { guids, is_category }
    }
}

/// A date + 4-part numeric driver version, ordered date-first then
/// lexicographically by the numeric tuple (SPEC_FULL §10.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverVersion {
    pub date: chrono::NaiveDate,
    pub parts: [u16; 4],
}

/// OS name paired with a numeric ranking score; lower is better (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub os: String,
    pub score: u32,
}

/// One entry in a driver record's metadata vector (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverMetadataItem {
    pub hardware_id: String,
    pub version: DriverVersion,
    pub driver_class: String,
    pub feature_scores: Vec<FeatureScore>,
    pub target_computer_hardware_ids: Vec<Uuid>,
    pub distribution_computer_hardware_ids: Vec<Uuid>,
}

impl DriverMetadataItem {
    /// Intersect target and distribution computer-hardware-ids when both
    /// are present; otherwise use whichever is non-empty (§4.4).
    pub fn computer_hardware_ids(&self) -> Vec<Uuid> {
        let (t, d) = (
            &self.target_computer_hardware_ids,
            &self.distribution_computer_hardware_ids,
        );
        if !t.is_empty() && !d.is_empty() {
            t.iter().filter(|g| d.contains(g)).copied().collect()
        } else if !t.is_empty() {
            t.clone()
        } else {
            d.clone()
        }
    }
}

/// One file entry, keyed primarily by content hash (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub hash: String,
    pub url: String,
    pub size: u64,
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// The logical unit a producer adds to the sink (§3).
#[derive(Debug, Clone)]
pub struct Record {
    pub identity: PackageIdentity,
    pub kind: PackageKind,
    pub title: String,
    pub kb_article: Option<String>,
    pub prerequisites: Vec<Prerequisite>,
    pub bundled_children: Vec<PackageIdentity>,
    pub files: Vec<FileRecord>,
    pub superseded_guids: Vec<Uuid>,
    pub driver_metadata: Option<Vec<DriverMetadataItem>>,
    pub raw_xml: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_prerequisite_round_trips() {
        let p = Prerequisite::Simple(Uuid::from_u128(1));
        let wire = p.to_wire_guids();
        assert_eq!(Prerequisite::from_wire_guids(wire), p);
    }

    #[test]
    fn at_least_one_category_round_trips_with_sentinel() {
        let p = Prerequisite::AtLeastOne {
            guids: vec![Uuid::from_u128(1), Uuid::from_u128(2)],
            is_category: true,
        };
        let wire = p.to_wire_guids();
        assert_eq!(wire.last(), Some(&CATEGORY_SENTINEL));
        assert_eq!(Prerequisite::from_wire_guids(wire), p);
    }

    #[test]
    fn at_least_one_without_category_has_no_sentinel() {
        let p = Prerequisite::AtLeastOne {
            guids: vec![Uuid::from_u128(1), Uuid::from_u128(2)],
            is_category: false,
        };
        let wire = p.to_wire_guids();
        assert!(!wire.contains(&CATEGORY_SENTINEL));
        assert_eq!(Prerequisite::from_wire_guids(wire), p);
    }

    #[test]
    fn computer_hardware_ids_intersects_when_both_present() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let item = DriverMetadataItem {
            hardware_id: "pci\\ven_1".into(),
            version: DriverVersion {
                date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                parts: [1, 0, 0, 0],
            },
            driver_class: "net".into(),
            feature_scores: vec![],
            target_computer_hardware_ids: vec![a, b],
            distribution_computer_hardware_ids: vec![b],
        };
        assert_eq!(item.computer_hardware_ids(), vec![b]);
    }
}
