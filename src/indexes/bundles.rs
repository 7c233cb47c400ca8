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
//! Bundle membership (§4.4): parent→children and child→parents maps, both
//! persisted together in the single `bundles.json` entry (§6), plus the
//! transient `PendingBundledUpdates` set for forward references.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::archive::ArchiveReader;
use crate::error::CmsResult;
use crate::identity::PackageIndex;
use crate::indexes::LazyBlob;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct BundlesOnDisk {
    bundles: HashMap<PackageIndex, Vec<PackageIndex>>,
    is_bundled: HashMap<PackageIndex, Vec<PackageIndex>>,
}

pub struct BundleIndex {
    blob: LazyBlob<BundlesOnDisk>,
    /// child guid -> parent indexes waiting for the child's own record.
    /// Never persisted: I5 requires it empty at commit time.
    pending: Mutex<HashMap<Uuid, Vec<PackageIndex>>>,
}

impl BundleIndex {
    pub fn new() -> Self {
        Self {
            blob: LazyBlob::new("bundles.json"),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// `parent` was just added, bundling `children` (guid, resolved index
    /// if already known). Any child not yet known is recorded as pending.
    pub fn add_parent(&self, parent: PackageIndex, children: &[(Uuid, Option<PackageIndex>)]) {
        for (guid, resolved) in children {
            match resolved {
                Some(child_idx) => self.link(parent, *child_idx),
                None => self
                    .pending
                    .lock()
                    .expect("pending mutex poisoned")
                    .entry(*guid)
                    .or_default()
                    .push(parent),
            }
        }
    }

    /// `child_guid` was just resolved to `child_idx`; wire up any parents
    /// that referenced it before it arrived.
    pub fn resolve_child(&self, child_guid: Uuid, child_idx: PackageIndex) {
        let parents = self
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .remove(&child_guid)
            .unwrap_or_default();
        for parent in parents {
            self.link(parent, child_idx);
        }
    }

    fn link(&self, parent: PackageIndex, child: PackageIndex) {
        self.blob.mutate(|d| {
            d.bundles.entry(parent).or_default().push(child);
            d.is_bundled.entry(child).or_default().push(parent);
        });
    }

    /// I5: commit must observe this set empty.
    pub fn pending_guids(&self) -> Vec<Uuid> {
        self.pending.lock().expect("pending mutex poisoned").keys().copied().collect()
    }

    pub fn bundled_children_local(
        &self,
        archive: &ArchiveReader,
        parent: PackageIndex,
    ) -> CmsResult<Option<Vec<PackageIndex>>> {
        self.blob.read(archive, |d| d.bundles.get(&parent).cloned())
    }

    pub fn bundle_parents_local(
        &self,
        archive: &ArchiveReader,
        child: PackageIndex,
    ) -> CmsResult<Option<Vec<PackageIndex>>> {
        self.blob.read(archive, |d| d.is_bundled.get(&child).cloned())
    }

    pub fn serialize_for_commit(&self, baseline_indexes_end: PackageIndex) -> CmsResult<Vec<u8>> {
        self.blob.mutate(|d| {
            // `bundles` is keyed by parent index, which is always new this
            // delta (an existing parent is always rejected as a duplicate
            // before `add_parent` runs), so this retain is a harmless no-op
            // that documents the invariant rather than enforcing one.
            d.bundles.retain(|k, _| *k > baseline_indexes_end);
            // `is_bundled` is keyed by the *child* index, which can
            // legitimately be <= baseline_indexes_end when a new delta
            // parent bundles a pre-existing baseline child. The (child,
            // parent) association is still new data this delta must
            // persist. `link` only ever reaches this blob through
            // `.mutate()`, which never loads from the archive, so nothing
            // in `d.is_bundled` at commit time was loaded from the
            // baseline to begin with — everything present is new and none
            // of it should be filtered out by key.
        });
        self.blob.serialize_for_commit()
    }
}

impl Default for BundleIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_bundle_resolves_and_clears_pending() {
        let idx = BundleIndex::new();
        let child_guid = Uuid::from_u128(11);
        idx.add_parent(10, &[(child_guid, None)]);
        assert_eq!(idx.pending_guids(), vec![child_guid]);

        idx.resolve_child(child_guid, 11);
        assert!(idx.pending_guids().is_empty());
    }
}
