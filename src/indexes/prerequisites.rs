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
//! Prerequisites secondary index (§4.4): one (index, guid-list) entry per
//! top-level prerequisite a package contributes; grouped back into the
//! tagged-sum form on read.

use uuid::Uuid;

use crate::archive::ArchiveReader;
use crate::error::CmsResult;
use crate::identity::PackageIndex;
use crate::indexes::LazyMap;
use crate::record::Prerequisite;

pub struct PrerequisiteIndex {
    map: LazyMap<PackageIndex, Vec<Vec<Uuid>>>,
}

impl PrerequisiteIndex {
    pub fn new() -> Self {
        Self {
            map: LazyMap::new("prerequisites-list.json"),
        }
    }

    /// Record one top-level prerequisite for `index`, appending to any
    /// entries already recorded for it.
    pub fn add(&self, index: PackageIndex, prereq: &Prerequisite) {
        let wire = prereq.to_wire_guids();
        self.map.update_or_insert(index, Vec::new, |entries| entries.push(wire));
    }

    pub fn get_local(
        &self,
        archive: &ArchiveReader,
        index: PackageIndex,
    ) -> CmsResult<Option<Vec<Prerequisite>>> {
        let entries = self.map.get_local(archive, &index)?;
        Ok(entries.map(|lists| lists.into_iter().map(Prerequisite::from_wire_guids).collect()))
    }

    /// As [`get_local`](Self::get_local), but reads whatever is already in
    /// memory without touching the archive (Writing state only).
    pub fn get_memory(&self, index: PackageIndex) -> Option<Vec<Prerequisite>> {
        self.map
            .get_memory(&index)
            .map(|lists| lists.into_iter().map(Prerequisite::from_wire_guids).collect())
    }

    /// Every index this archive has its own prerequisite entries for
    /// (Writing state only, no archive access).
    pub fn own_indexes_memory(&self) -> Vec<PackageIndex> {
        self.map.keys_memory()
    }

    pub fn serialize_for_commit(&self, baseline_indexes_end: PackageIndex) -> CmsResult<Vec<u8>> {
        self.map.serialize_for_commit(|k| *k > baseline_indexes_end)
    }
}

impl Default for PrerequisiteIndex {
    fn default() -> Self {
        Self::new()
    }
}
