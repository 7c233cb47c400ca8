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
//! Driver hardware/feature-score indexes (§4.4): the six
//! `drivers-index/*.json` entries.

use std::collections::HashMap;

use uuid::Uuid;

use crate::archive::ArchiveReader;
use crate::error::CmsResult;
use crate::identity::PackageIndex;
use crate::indexes::{LazyBlob, LazyMap};
use crate::record::{DriverMetadataItem, DriverVersion, FeatureScore};

pub struct DriverIndexes {
    /// Flat list of this archive's own driver-metadata items.
    metadata: LazyBlob<Vec<DriverMetadataItem>>,
    /// updateIndex -> (start offset, count) into `metadata`, local only.
    driver_to_metadata: LazyMap<PackageIndex, (usize, usize)>,
    /// lowercased hardware id -> metadata-local indexes.
    hardware_id_map: LazyMap<String, Vec<usize>>,
    /// metadata-local index -> computer hardware ids.
    computer_hardware_id_map: LazyMap<usize, Vec<Uuid>>,
    version_index: LazyMap<usize, DriverVersion>,
    feature_score_index: LazyMap<usize, Vec<FeatureScore>>,
}

impl DriverIndexes {
    pub fn new() -> Self {
        Self {
            metadata: LazyBlob::new("drivers-index/metadata.json"),
            driver_to_metadata: LazyMap::new("drivers-index/driver-to-metadata-map.json"),
            hardware_id_map: LazyMap::new("drivers-index/hardware-id-index.json"),
            computer_hardware_id_map: LazyMap::new("drivers-index/computer-hardware-id-index.json"),
            version_index: LazyMap::new("drivers-index/version-index.json"),
            feature_score_index: LazyMap::new("drivers-index/feature-score-index.json"),
        }
    }

    /// Append `items` (already parsed from XML) for `index`, wiring up
    /// every derived sub-index.
    pub fn add(&self, index: PackageIndex, items: Vec<DriverMetadataItem>) {
        if items.is_empty() {
            return;
        }
        let start = self.metadata.local_len();
        let count = items.len();
        self.driver_to_metadata.put(index, (start, count));
        for (offset, item) in items.iter().enumerate() {
            let meta_idx = start + offset;
            self.hardware_id_map.update_or_insert(item.hardware_id.clone(), Vec::new, |v| {
                v.push(meta_idx)
            });
            self.computer_hardware_id_map.put(meta_idx, item.computer_hardware_ids());
            self.version_index.put(meta_idx, item.version);
            self.feature_score_index.put(meta_idx, item.feature_scores.clone());
        }
        self.metadata.mutate(|v| v.extend(items));
    }

    pub fn driver_range_local(
        &self,
        archive: &ArchiveReader,
        index: PackageIndex,
    ) -> CmsResult<Option<(usize, usize)>> {
        self.driver_to_metadata.get_local(archive, &index)
    }

    pub fn metadata_at_local(&self, archive: &ArchiveReader, meta_idx: usize) -> CmsResult<Option<DriverMetadataItem>> {
        self.metadata.read(archive, |v| v.get(meta_idx).cloned())
    }

    pub fn metadata_range_local(
        &self,
        archive: &ArchiveReader,
        start: usize,
        count: usize,
    ) -> CmsResult<Vec<DriverMetadataItem>> {
        self.metadata.read(archive, |v| v[start..start + count].to_vec())
    }

    pub fn hardware_id_candidates_local(
        &self,
        archive: &ArchiveReader,
        hardware_id: &str,
    ) -> CmsResult<Vec<usize>> {
        Ok(self
            .hardware_id_map
            .get_local(archive, &hardware_id.to_lowercase())?
            .unwrap_or_default())
    }

    pub fn version_local(&self, archive: &ArchiveReader, meta_idx: usize) -> CmsResult<Option<DriverVersion>> {
        self.version_index.get_local(archive, &meta_idx)
    }

    pub fn feature_scores_local(
        &self,
        archive: &ArchiveReader,
        meta_idx: usize,
    ) -> CmsResult<Option<Vec<FeatureScore>>> {
        self.feature_score_index.get_local(archive, &meta_idx)
    }

    pub fn computer_hardware_ids_local(
        &self,
        archive: &ArchiveReader,
        meta_idx: usize,
    ) -> CmsResult<Option<Vec<Uuid>>> {
        self.computer_hardware_id_map.get_local(archive, &meta_idx)
    }

    /// Resolve `meta_idx` to the update index it belongs to, local to
    /// this archive only. Materialized on read, per design note §9.
    pub fn owning_update_local(
        &self,
        archive: &ArchiveReader,
        meta_idx: usize,
    ) -> CmsResult<Option<PackageIndex>> {
        self.driver_to_metadata.ensure_loaded_then(archive, |map| {
            map.iter()
                .find(|(_, (start, count))| meta_idx >= *start && meta_idx < start + count)
                .map(|(idx, _)| *idx)
        })
    }

    pub fn serialize_metadata(&self) -> CmsResult<Vec<u8>> {
        self.metadata.serialize_for_commit()
    }

    pub fn serialize_driver_to_metadata(&self, baseline_indexes_end: PackageIndex) -> CmsResult<Vec<u8>> {
        self.driver_to_metadata.serialize_for_commit(|k| *k > baseline_indexes_end)
    }

    pub fn serialize_hardware_id_map(&self) -> CmsResult<Vec<u8>> {
        self.hardware_id_map.serialize_for_commit(|_| true)
    }

    pub fn serialize_computer_hardware_id_map(&self) -> CmsResult<Vec<u8>> {
        self.computer_hardware_id_map.serialize_for_commit(|_| true)
    }

    pub fn serialize_version_index(&self) -> CmsResult<Vec<u8>> {
        self.version_index.serialize_for_commit(|_| true)
    }

    pub fn serialize_feature_score_index(&self) -> CmsResult<Vec<u8>> {
        self.feature_score_index.serialize_for_commit(|_| true)
    }
}

impl Default for DriverIndexes {
    fn default() -> Self {
        Self::new()
    }
}
