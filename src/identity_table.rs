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
//! Identity & index tables (§4.2, C1): the bijection between
//! `PackageIdentity` and the dense `PackageIndex` an archive assigns it,
//! plus the per-index kind map.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::identity::{PackageIdentity, PackageIndex, PackageKind};

pub struct IdentityIndexTable {
    identity_to_index: Mutex<HashMap<PackageIdentity, PackageIndex>>,
    index_to_identity: Mutex<HashMap<PackageIndex, PackageIdentity>>,
    kind_map: Mutex<HashMap<PackageIndex, PackageKind>>,
    next_index: Mutex<PackageIndex>,
}

impl IdentityIndexTable {
    /// A fresh table for a root archive (`baseline_indexes_end == -1`) or a
    /// new delta (`baseline_indexes_end` = the baseline's highest index).
    pub fn new(baseline_indexes_end: PackageIndex) -> Self {
        Self {
            identity_to_index: Mutex::new(HashMap::new()),
            index_to_identity: Mutex::new(HashMap::new()),
            kind_map: Mutex::new(HashMap::new()),
            next_index: Mutex::new(baseline_indexes_end + 1),
        }
    }

    /// Rebuild from this archive's own serialized (index, identity) and
    /// (index, kind) lists (§4.2).
    pub fn from_own_lists(
        baseline_indexes_end: PackageIndex,
        pairs: Vec<(PackageIndex, PackageIdentity)>,
        kinds: Vec<(PackageIndex, PackageKind)>,
    ) -> Self {
        let table = Self::new(baseline_indexes_end);
        table.merge_lists(pairs, kinds);
        table
    }

    /// Merge an externally-sourced (index, identity)/(index, kind) list in
    /// (e.g. the baseline's own lists, merged before rebuilding, §4.2).
    pub fn merge_lists(&self, pairs: Vec<(PackageIndex, PackageIdentity)>, kinds: Vec<(PackageIndex, PackageKind)>) {
        let mut i2i = self.identity_to_index.lock().expect("identity table mutex poisoned");
        let mut id2ident = self.index_to_identity.lock().expect("identity table mutex poisoned");
        for (index, identity) in pairs {
            i2i.entry(identity).or_insert(index);
            id2ident.entry(index).or_insert(identity);
        }
        drop(i2i);
        drop(id2ident);
        let mut km = self.kind_map.lock().expect("identity table mutex poisoned");
        for (index, kind) in kinds {
            km.entry(index).or_insert(kind);
        }
    }

    pub fn index_of_local(&self, identity: &PackageIdentity) -> Option<PackageIndex> {
        self.identity_to_index
            .lock()
            .expect("identity table mutex poisoned")
            .get(identity)
            .copied()
    }

    pub fn identity_of_local(&self, index: PackageIndex) -> Option<PackageIdentity> {
        self.index_to_identity
            .lock()
            .expect("identity table mutex poisoned")
            .get(&index)
            .copied()
    }

    pub fn kind_of_local(&self, index: PackageIndex) -> Option<PackageKind> {
        self.kind_map.lock().expect("identity table mutex poisoned").get(&index).copied()
    }

    /// Allocate a fresh index for `identity` if it is new; otherwise return
    /// the index it already has (duplicate adds are silently absorbed, §4.2).
    pub fn insert_or_get(&self, identity: PackageIdentity, kind: PackageKind) -> PackageIndex {
        let mut i2i = self.identity_to_index.lock().expect("identity table mutex poisoned");
        if let Some(existing) = i2i.get(&identity) {
            return *existing;
        }
        let mut next = self.next_index.lock().expect("identity table mutex poisoned");
        let index = *next;
        *next += 1;
        i2i.insert(identity, index);
        drop(i2i);
        self.index_to_identity
            .lock()
            .expect("identity table mutex poisoned")
            .insert(index, identity);
        self.kind_map.lock().expect("identity table mutex poisoned").insert(index, kind);
        index
    }

    /// This archive's own (index, identity) pairs — indexes above
    /// `baseline_indexes_end`, sorted ascending (§4.2, §6).
    pub fn own_identity_pairs(&self, baseline_indexes_end: PackageIndex) -> Vec<(PackageIndex, PackageIdentity)> {
        let map = self.index_to_identity.lock().expect("identity table mutex poisoned");
        let mut pairs: Vec<(PackageIndex, PackageIdentity)> = map
            .iter()
            .filter(|(idx, _)| **idx > baseline_indexes_end)
            .map(|(idx, ident)| (*idx, *ident))
            .collect();
        pairs.sort_by_key(|(idx, _)| *idx);
        pairs
    }

    /// The highest index known to this table, across whatever has been
    /// loaded into it so far. `-1` if empty.
    pub fn max_index(&self) -> PackageIndex {
        self.index_to_identity
            .lock()
            .expect("identity table mutex poisoned")
            .keys()
            .copied()
            .max()
            .unwrap_or(-1)
    }

    pub fn own_kind_pairs(&self, baseline_indexes_end: PackageIndex) -> Vec<(PackageIndex, PackageKind)> {
        let map = self.kind_map.lock().expect("identity table mutex poisoned");
        let mut pairs: Vec<(PackageIndex, PackageKind)> = map
            .iter()
            .filter(|(idx, _)| **idx > baseline_indexes_end)
            .map(|(idx, kind)| (*idx, *kind))
            .collect();
        pairs.sort_by_key(|(idx, _)| *idx);
        pairs
    }
}
