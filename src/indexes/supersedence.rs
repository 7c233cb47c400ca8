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
//! Supersedence (§4.4): `SupersededUpdates` (guid -> superseding index,
//! last-write-wins) and `SupersedingUpdates` (index -> superseded guids),
//! persisted as the two separate `superseded-index.json` /
//! `superseding-index.json` entries (§6).

use uuid::Uuid;

use crate::archive::ArchiveReader;
use crate::error::CmsResult;
use crate::identity::PackageIndex;
use crate::indexes::LazyMap;

pub struct SupersedenceIndex {
    superseded: LazyMap<Uuid, PackageIndex>,
    superseding: LazyMap<PackageIndex, Vec<Uuid>>,
}

impl SupersedenceIndex {
    pub fn new() -> Self {
        Self {
            superseded: LazyMap::new("superseded-index.json"),
            superseding: LazyMap::new("superseding-index.json"),
        }
    }

    /// `superseding_index` supersedes each guid in `superseded_guids`.
    /// Re-supersedence overwrites `SupersededUpdates` (last write wins).
    pub fn record(&self, superseding_index: PackageIndex, superseded_guids: &[Uuid]) {
        if superseded_guids.is_empty() {
            return;
        }
        for guid in superseded_guids {
            self.superseded.put(*guid, superseding_index);
        }
        self.superseding
            .update_or_insert(superseding_index, Vec::new, |list| {
                list.extend(superseded_guids.iter().copied())
            });
    }

    pub fn superseding_index_of_local(&self, archive: &ArchiveReader, guid: Uuid) -> CmsResult<Option<PackageIndex>> {
        self.superseded.get_local(archive, &guid)
    }

    pub fn superseded_guids_of_local(
        &self,
        archive: &ArchiveReader,
        index: PackageIndex,
    ) -> CmsResult<Option<Vec<Uuid>>> {
        self.superseding.get_local(archive, &index)
    }

    pub fn serialize_superseded(&self) -> CmsResult<Vec<u8>> {
        self.superseded.serialize_for_commit(|_| true)
    }

    pub fn serialize_superseding(&self, baseline_indexes_end: PackageIndex) -> CmsResult<Vec<u8>> {
        self.superseding.serialize_for_commit(|k| *k > baseline_indexes_end)
    }
}

impl Default for SupersedenceIndex {
    fn default() -> Self {
        Self::new()
    }
}
