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
//! Secondary indexes (§4.4): in-memory maps with lazy, single-shot load
//! from an archive entry and baseline delegation on miss.
//!
//! Every index read goes through [`chain_get`] — the delta-chain
//! delegation rule ("missing key falls back to baseline") is implemented
//! once here rather than re-derived per index (§9).

pub mod bundles;
pub mod categories;
pub mod drivers;
pub mod files;
pub mod prerequisites;
pub mod supersedence;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::archive::ArchiveReader;
use crate::error::CmsResult;

/// A secondary index keyed by `K`, persisted as a single JSON blob named
/// `entry_name`. Writes go straight into `data`; reads trigger exactly one
/// deserialization of the on-disk blob, guarded by `loaded`.
pub struct LazyMap<K, V> {
    entry_name: &'static str,
    data: Mutex<HashMap<K, V>>,
    loaded: OnceCell<()>,
}

impl<K, V> LazyMap<K, V>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(entry_name: &'static str) -> Self {
        Self {
            entry_name,
            data: Mutex::new(HashMap::new()),
            loaded: OnceCell::new(),
        }
    }

    fn ensure_loaded(&self, archive: &ArchiveReader) -> CmsResult<()> {
        self.loaded.get_or_try_init(|| -> CmsResult<()> {
            if archive.has_entry(self.entry_name) {
                let bytes = archive.get_entry(self.entry_name)?;
                let on_disk: Vec<(K, V)> = serde_json::from_slice(&bytes)?;
                let mut data = self.data.lock().expect("index mutex poisoned");
                for (k, v) in on_disk {
                    data.entry(k).or_insert(v);
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Insert or replace the value for `key` (Writing state).
    pub fn put(&self, key: K, value: V) {
        self.data.lock().expect("index mutex poisoned").insert(key, value);
    }

    /// Fetch-or-insert-then-mutate, for indexes whose entries accumulate
    /// (e.g. a package contributing more than one prerequisite entry).
    pub fn update_or_insert(&self, key: K, default: impl FnOnce() -> V, f: impl FnOnce(&mut V)) {
        let mut data = self.data.lock().expect("index mutex poisoned");
        let entry = data.entry(key).or_insert_with(default);
        f(entry);
    }

    /// Look up `key` in this archive's own (possibly lazily-loaded) map.
    /// Does not consult the baseline — callers compose with [`chain_get`].
    pub fn get_local(&self, archive: &ArchiveReader, key: &K) -> CmsResult<Option<V>> {
        self.ensure_loaded(archive)?;
        Ok(self.data.lock().expect("index mutex poisoned").get(key).cloned())
    }

    /// Look up `key` directly in memory, without touching the archive.
    /// Valid only in the Writing state, where nothing has been loaded from
    /// disk yet — used by commit-time derivations (e.g. category
    /// resolution) that need to read back what was just `put`.
    pub fn get_memory(&self, key: &K) -> Option<V> {
        self.data.lock().expect("index mutex poisoned").get(key).cloned()
    }

    /// All keys currently in memory (Writing state only).
    pub fn keys_memory(&self) -> Vec<K> {
        self.data.lock().expect("index mutex poisoned").keys().cloned().collect()
    }

    /// Ensure the on-disk blob is loaded, then run `f` over the whole map.
    /// Used when a query needs to scan rather than point-look-up (e.g.
    /// resolving a metadata offset range back to its owning index).
    pub fn ensure_loaded_then<R>(
        &self,
        archive: &ArchiveReader,
        f: impl FnOnce(&HashMap<K, V>) -> R,
    ) -> CmsResult<R> {
        self.ensure_loaded(archive)?;
        Ok(f(&self.data.lock().expect("index mutex poisoned")))
    }

    /// Serialize for commit. `keep` decides whether a given key belongs to
    /// this archive (used to strip keys that duplicate the baseline, I7).
    pub fn serialize_for_commit(&self, keep: impl Fn(&K) -> bool) -> CmsResult<Vec<u8>> {
        let data = self.data.lock().expect("index mutex poisoned");
        let filtered: Vec<(&K, &V)> = data.iter().filter(|(k, _)| keep(k)).collect();
        Ok(serde_json::to_vec(&filtered)?)
    }
}

/// A secondary index that is a single flat, lazily-loaded blob rather
/// than a key-value map (used for the driver metadata flat list, §4.4).
pub struct LazyBlob<T> {
    entry_name: &'static str,
    data: Mutex<T>,
    loaded: OnceCell<()>,
}

impl<T> LazyBlob<T>
where
    T: Default + Clone + Serialize + DeserializeOwned,
{
    pub fn new(entry_name: &'static str) -> Self {
        Self {
            entry_name,
            data: Mutex::new(T::default()),
            loaded: OnceCell::new(),
        }
    }

    fn ensure_loaded(&self, archive: &ArchiveReader) -> CmsResult<()> {
        self.loaded.get_or_try_init(|| -> CmsResult<()> {
            if archive.has_entry(self.entry_name) {
                let bytes = archive.get_entry(self.entry_name)?;
                let on_disk: T = serde_json::from_slice(&bytes)?;
                *self.data.lock().expect("index mutex poisoned") = on_disk;
            }
            Ok(())
        })?;
        Ok(())
    }

    pub fn mutate(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.data.lock().expect("index mutex poisoned"));
    }

    pub fn read<R>(&self, archive: &ArchiveReader, f: impl FnOnce(&T) -> R) -> CmsResult<R> {
        self.ensure_loaded(archive)?;
        Ok(f(&self.data.lock().expect("index mutex poisoned")))
    }

    pub fn serialize_for_commit(&self) -> CmsResult<Vec<u8>> {
        Ok(serde_json::to_vec(&*self.data.lock().expect("index mutex poisoned"))?)
    }
}

impl<U> LazyBlob<Vec<U>>
where
    U: Clone + Serialize + DeserializeOwned,
{
    /// Length of the in-memory vec without triggering a load — valid only
    /// while in the Writing state, where nothing has been loaded yet.
    pub fn local_len(&self) -> usize {
        self.data.lock().expect("index mutex poisoned").len()
    }
}

/// The single delta-delegation helper every secondary-index read composes
/// with: if `local` is present, use it; otherwise, if `should_try_baseline`
/// holds, recurse into the baseline; otherwise the key is absent (§4.4, §9).
pub fn chain_get<V>(
    local: Option<V>,
    should_try_baseline: bool,
    baseline_lookup: impl FnOnce() -> CmsResult<Option<V>>,
) -> CmsResult<Option<V>> {
    if local.is_some() {
        return Ok(local);
    }
    if should_try_baseline {
        baseline_lookup()
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::tempdir;

    #[test]
    fn lazy_map_loads_exactly_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.zip");
        let cfg = StoreConfig::default();
        let mut w = crate::archive::ArchiveWriter::create(&path, &cfg).unwrap();
        let entries: Vec<(i32, String)> = vec![(1, "a".into()), (2, "b".into())];
        w.put_entry("titles.json", &serde_json::to_vec(&entries).unwrap())
            .unwrap();
        w.finish().unwrap();

        let reader = ArchiveReader::open(&path).unwrap();
        let map: LazyMap<i32, String> = LazyMap::new("titles.json");
        assert_eq!(map.get_local(&reader, &1).unwrap(), Some("a".to_string()));
        assert_eq!(map.get_local(&reader, &2).unwrap(), Some("b".to_string()));
        assert_eq!(map.get_local(&reader, &3).unwrap(), None);
    }

    #[test]
    fn chain_get_falls_back_within_bound_only() {
        let local: Option<i32> = None;
        let hit = chain_get(local, true, || Ok(Some(42))).unwrap();
        assert_eq!(hit, Some(42));

        let miss = chain_get(None::<i32>, false, || Ok(Some(42))).unwrap();
        assert_eq!(miss, None);

        let present = chain_get(Some(7), true, || Ok(Some(42))).unwrap();
        assert_eq!(present, Some(7));
    }
}
