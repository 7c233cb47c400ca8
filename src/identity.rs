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
//! Package identity, index, and kind — the primitive types everything else
//! in the store is keyed on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A (GUID, revision) pair. Two identities are equal iff both fields match.
/// Ordered by GUID bytes, then revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub guid: Uuid,
    pub revision: i32,
}

impl PackageIdentity {
    pub fn new(guid: Uuid, revision: i32) -> Self {
        Self { guid, revision }
    }

    /// The last byte of the GUID, used to distribute XML entries across
    /// archive subdirectories (§3, I3).
    pub fn shard(&self) -> u8 {
        *self.guid.as_bytes().last().expect("uuid has 16 bytes")
    }

    /// The archive entry path this identity's raw XML lives at.
    pub fn xml_entry_path(&self) -> String {
        format!("{}/{}-{}.xml", self.shard(), self.guid, self.revision)
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.guid
            .as_bytes()
            .cmp(other.guid.as_bytes())
            .then(self.revision.cmp(&other.revision))
    }
}

/// Dense, non-negative index assigned in strict insertion order. Stable
/// within one archive and extends the baseline's contiguous range.
pub type PackageIndex = i32;

/// The five update kinds the store recognizes. The first three are
/// "categories" (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PackageKind {
    Detectoid,
    Classification,
    Product,
    SoftwareUpdate,
    DriverUpdate,
}

impl PackageKind {
    /// Detectoid, Classification, and Product are categories; the rest are not.
    pub fn is_category(&self) -> bool {
        matches!(
            self,
            PackageKind::Detectoid | PackageKind::Classification | PackageKind::Product
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equality_is_structural() {
        let g = Uuid::from_u128(1);
        assert_eq!(PackageIdentity::new(g, 1), PackageIdentity::new(g, 1));
        assert_ne!(PackageIdentity::new(g, 1), PackageIdentity::new(g, 2));
    }

    #[test]
    fn shard_is_last_guid_byte() {
        let g = Uuid::from_bytes([0u8; 15].into_iter().chain([0xAB]).collect::<Vec<_>>().try_into().unwrap());
        let id = PackageIdentity::new(g, 1);
        assert_eq!(id.shard(), 0xAB);
    }

    #[test]
    fn ordering_is_guid_then_revision() {
        let g1 = Uuid::from_u128(1);
        let g2 = Uuid::from_u128(2);
        assert!(PackageIdentity::new(g1, 5) < PackageIdentity::new(g2, 0));
        assert!(PackageIdentity::new(g1, 1) < PackageIdentity::new(g1, 2));
    }
}
