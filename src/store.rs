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
//! The public sink/source surface (§4.9, C9) and the `index.json`
//! top-level structure (§6) that ties every component together.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::chain;
use crate::checksum;
use crate::config::StoreConfig;
use crate::error::{CmsError, CmsResult};
use crate::filter::QueryFilter;
use crate::graph::PrerequisiteGraph;
use crate::identity::{PackageIdentity, PackageIndex, PackageKind};
use crate::identity_table::IdentityIndexTable;
use crate::indexes::bundles::BundleIndex;
use crate::indexes::categories::CategoryIndex;
use crate::indexes::drivers::DriverIndexes;
use crate::indexes::files::FileIndexes;
use crate::indexes::prerequisites::PrerequisiteIndex;
use crate::indexes::supersedence::SupersedenceIndex;
use crate::indexes::{chain_get, LazyMap};
use crate::matcher::{self, DriverCandidate, MatchResult};
use crate::progress::ProgressEvent;
use crate::record::{FileRecord, Prerequisite, Record};
use crate::wire::{self, IncomingUpdate};

const INDEX_JSON_VERSION: u32 = 1;
const INDEX_ENTRY: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreState {
    Writing,
    Sealed,
    Reading,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexJson {
    version: u32,
    checksum: String,
    baseline_checksum: String,
    baseline_indexes_end: PackageIndex,
    delta_index: u64,
    filter: Option<QueryFilter>,
    categories_anchor: Option<String>,
    upstream_source: Option<String>,
    upstream_account_name: Option<String>,
    upstream_account_guid: Option<Uuid>,
    identity_and_index_list: Vec<(PackageIndex, PackageIdentity)>,
    update_type_map: Vec<(PackageIndex, PackageKind)>,
    #[serde(default)]
    products_tree: Option<serde_json::Value>,
}

/// A single compressed metadata store archive, optionally chained onto a
/// baseline. One `Store` per archive file; `baseline` recurses into the
/// predecessor for reads that miss locally (§4.6, §9).
pub struct Store {
    path: PathBuf,
    config: StoreConfig,
    state: Mutex<StoreState>,
    baseline: Option<Box<Store>>,
    baseline_indexes_end: PackageIndex,
    baseline_checksum: String,
    delta_index: u64,
    checksum: Mutex<String>,

    identities: IdentityIndexTable,
    titles: LazyMap<PackageIndex, String>,
    kb_articles: LazyMap<PackageIndex, String>,
    prerequisites: PrerequisiteIndex,
    bundles: BundleIndex,
    categories: CategoryIndex,
    files: FileIndexes,
    supersedence: SupersedenceIndex,
    drivers: DriverIndexes,
    graph: PrerequisiteGraph,

    writer: Mutex<Option<ArchiveWriter>>,
    reader: Option<ArchiveReader>,

    filter: Mutex<Option<QueryFilter>>,
    categories_anchor: Mutex<Option<String>>,
    upstream_source: Mutex<Option<String>>,
    upstream_account_name: Mutex<Option<String>>,
    upstream_account_guid: Mutex<Option<Uuid>>,
    products_tree: Mutex<Option<serde_json::Value>>,
}

impl Store {
    /// Create a fresh root archive, open for writing.
    pub fn create(path: &Path, config: StoreConfig) -> CmsResult<Self> {
        let writer = ArchiveWriter::create(path, &config)?;
        Ok(Self::new_writing(path, config, writer, None, -1, String::new(), 0))
    }

    /// Create a new delta layered on top of an already-opened (Reading
    /// state) baseline (§4.6).
    pub fn create_delta(path: &Path, baseline: Store, config: StoreConfig) -> CmsResult<Self> {
        baseline.require_state(StoreState::Reading)?;
        let baseline_checksum = baseline.checksum.lock().expect("checksum mutex poisoned").clone();
        let baseline_indexes_end = baseline.upper_bound_index();
        let delta_index = baseline.delta_index + 1;
        let writer = ArchiveWriter::create(path, &config)?;
        Ok(Self::new_writing(
            path,
            config,
            writer,
            Some(Box::new(baseline)),
            baseline_indexes_end,
            baseline_checksum,
            delta_index,
        ))
    }

    fn new_writing(
        path: &Path,
        config: StoreConfig,
        writer: ArchiveWriter,
        baseline: Option<Box<Store>>,
        baseline_indexes_end: PackageIndex,
        baseline_checksum: String,
        delta_index: u64,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            config,
            state: Mutex::new(StoreState::Writing),
            baseline,
            baseline_indexes_end,
            baseline_checksum,
            delta_index,
            checksum: Mutex::new(String::new()),
            identities: IdentityIndexTable::new(baseline_indexes_end),
            titles: LazyMap::new("titles.json"),
            kb_articles: LazyMap::new("kbarticle-index.json"),
            prerequisites: PrerequisiteIndex::new(),
            bundles: BundleIndex::new(),
            categories: CategoryIndex::new(),
            files: FileIndexes::new(),
            supersedence: SupersedenceIndex::new(),
            drivers: DriverIndexes::new(),
            graph: PrerequisiteGraph::new(),
            writer: Mutex::new(Some(writer)),
            reader: None,
            filter: Mutex::new(None),
            categories_anchor: Mutex::new(None),
            upstream_source: Mutex::new(None),
            upstream_account_name: Mutex::new(None),
            upstream_account_guid: Mutex::new(None),
            products_tree: Mutex::new(None),
        }
    }

    /// Open an existing archive for reading, recursively opening and
    /// validating its whole baseline chain (§4.6, I4).
    #[instrument(skip(config), fields(path = %path.display()))]
    pub fn open(path: &Path, config: StoreConfig) -> CmsResult<Self> {
        let reader = ArchiveReader::open(path)?;
        let bytes = reader.get_entry(INDEX_ENTRY)?;
        let index_json: IndexJson = serde_json::from_slice(&bytes).map_err(|e| CmsError::InvalidArchive {
            reason: format!("index.json: {e}"),
        })?;
        if index_json.version != INDEX_JSON_VERSION {
            return Err(CmsError::InvalidArchive {
                reason: format!("unsupported archive version {}", index_json.version),
            });
        }

        let baseline = if index_json.baseline_checksum.is_empty() {
            None
        } else {
            chain::check_delta_index_matches(path, index_json.delta_index)?;
            let baseline_path = chain::baseline_path(path)?.ok_or_else(|| CmsError::InvalidArchive {
                reason: "non-root archive carries a BaselineChecksum but no delta suffix".into(),
            })?;
            let baseline_store = Store::open(&baseline_path, config.clone())?;
            let actual = baseline_store.checksum.lock().expect("checksum mutex poisoned").clone();
            if actual != index_json.baseline_checksum {
                return Err(CmsError::BaselineMismatch {
                    expected: index_json.baseline_checksum.clone(),
                    actual,
                });
            }
            Some(Box::new(baseline_store))
        };

        let identities = IdentityIndexTable::from_own_lists(
            index_json.baseline_indexes_end,
            index_json.identity_and_index_list,
            index_json.update_type_map,
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: Mutex::new(StoreState::Reading),
            baseline,
            baseline_indexes_end: index_json.baseline_indexes_end,
            baseline_checksum: index_json.baseline_checksum,
            delta_index: index_json.delta_index,
            checksum: Mutex::new(index_json.checksum),
            identities,
            titles: LazyMap::new("titles.json"),
            kb_articles: LazyMap::new("kbarticle-index.json"),
            prerequisites: PrerequisiteIndex::new(),
            bundles: BundleIndex::new(),
            categories: CategoryIndex::new(),
            files: FileIndexes::new(),
            supersedence: SupersedenceIndex::new(),
            drivers: DriverIndexes::new(),
            graph: PrerequisiteGraph::new(),
            writer: Mutex::new(None),
            reader: Some(reader),
            filter: Mutex::new(index_json.filter),
            categories_anchor: Mutex::new(index_json.categories_anchor),
            upstream_source: Mutex::new(index_json.upstream_source),
            upstream_account_name: Mutex::new(index_json.upstream_account_name),
            upstream_account_guid: Mutex::new(index_json.upstream_account_guid),
            products_tree: Mutex::new(index_json.products_tree),
        })
    }

    fn require_state(&self, expected: StoreState) -> CmsResult<()> {
        let state = self.state.lock().expect("state mutex poisoned");
        match (&*state, &expected) {
            (StoreState::Writing, StoreState::Writing) => Ok(()),
            (StoreState::Reading, StoreState::Reading) => Ok(()),
            (_, StoreState::Writing) => Err(CmsError::NotInWriteMode),
            (_, StoreState::Reading) => Err(CmsError::NotInReadMode),
            _ => Ok(()),
        }
    }

    fn reader(&self) -> CmsResult<&ArchiveReader> {
        self.reader.as_ref().ok_or(CmsError::NotInReadMode)
    }

    /// Highest index known anywhere in the chain, including the baseline
    /// (used when layering a further delta on top, §4.6).
    fn upper_bound_index(&self) -> PackageIndex {
        self.identities.max_index().max(self.baseline_indexes_end)
    }

    fn should_try_baseline(&self, index: PackageIndex) -> bool {
        self.baseline.is_some() && index <= self.baseline_indexes_end
    }

    // ---------------------------------------------------------------
    // Sink (§4.9, Writing state only)
    // ---------------------------------------------------------------

    pub fn set_query_filter(&self, filter: QueryFilter) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;
        *self.filter.lock().expect("filter mutex poisoned") = Some(filter);
        Ok(())
    }

    pub fn set_categories_anchor(&self, anchor: String) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;
        *self.categories_anchor.lock().expect("anchor mutex poisoned") = Some(anchor);
        Ok(())
    }

    pub fn set_credentials(&self, account_name: String, account_guid: Uuid) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;
        *self.upstream_account_name.lock().expect("credentials mutex poisoned") = Some(account_name);
        *self.upstream_account_guid.lock().expect("credentials mutex poisoned") = Some(account_guid);
        Ok(())
    }

    pub fn set_upstream_source(&self, source: String) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;
        *self.upstream_source.lock().expect("upstream mutex poisoned") = Some(source);
        Ok(())
    }

    /// Deduplicated by hash (§4.4, §4.9).
    pub fn add_file(&self, record: FileRecord) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;
        self.files.add_file(record);
        Ok(())
    }

    /// Decompresses (if needed) and parses each incoming record's XML, then
    /// routes it to `addUpdate` (§4.9).
    pub fn add_updates(&self, records: impl IntoIterator<Item = IncomingUpdate>) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;
        for incoming in records {
            let record = wire::into_record(incoming)?;
            self.add_update(record)?;
        }
        Ok(())
    }

    #[instrument(skip(self, record), fields(guid = %record.identity.guid, revision = record.identity.revision))]
    fn add_update(&self, record: Record) -> CmsResult<()> {
        let identity = record.identity;

        // Duplicate rejection is chain-wide (§4.2), not per-archive: an
        // identity already known to the baseline must not be re-allocated a
        // second index in this delta, so this has to recurse before the
        // local table ever sees the identity.
        if self.index_of_opt(&identity)?.is_some() {
            trace!("duplicate identity, ignoring");
            return Ok(());
        }

        let mut writer_guard = self.writer.lock().expect("writer mutex poisoned");
        let writer = writer_guard.as_mut().ok_or(CmsError::NotInWriteMode)?;

        let index = self.identities.insert_or_get(identity, record.kind);
        writer.put_entry(&identity.xml_entry_path(), &record.raw_xml)?;
        drop(writer_guard);

        self.titles.put(index, record.title);
        if record.kind == PackageKind::SoftwareUpdate {
            if let Some(kb) = record.kb_article.filter(|s| !s.is_empty()) {
                self.kb_articles.put(index, kb);
            }
        }

        for prereq in &record.prerequisites {
            self.prerequisites.add(index, prereq);
        }

        let children: Vec<(Uuid, Option<PackageIndex>)> = record
            .bundled_children
            .iter()
            .map(|child_identity| (child_identity.guid, self.index_of_opt(child_identity).ok().flatten()))
            .collect();
        self.bundles.add_parent(index, &children);
        self.bundles.resolve_child(identity.guid, index);

        let file_hashes: Vec<String> = record.files.iter().map(|f| f.hash.clone()).collect();
        for file in record.files {
            self.files.add_file(file);
        }
        self.files.link_update(index, file_hashes);

        self.supersedence.record(index, &record.superseded_guids);

        if let Some(driver_metadata) = record.driver_metadata {
            self.drivers.add(index, driver_metadata);
        }

        Ok(())
    }

    /// §4.4: derived after every record is added, by walking each new
    /// record's direct prerequisites and intersecting with the known
    /// Product/Classification identity sets.
    fn index_categories(&self, mut on_progress: impl FnMut(ProgressEvent)) -> CmsResult<()> {
        let indexes = self.prerequisites.own_indexes_memory();
        let total = indexes.len();

        // Resolution only reads already-resident state (this archive's own
        // prerequisites plus the baseline chain), so it parallelizes
        // cleanly across indexes.
        let resolved: Vec<(PackageIndex, Vec<Uuid>, Vec<Uuid>)> = indexes
            .into_par_iter()
            .map(|index| {
                let prereqs = self.prerequisites.get_memory(index).unwrap_or_default();
                let mut products = Vec::new();
                let mut classifications = Vec::new();
                for prereq in prereqs {
                    for guid in prereq.guids() {
                        match self.kind_of_opt_by_guid(guid).ok().flatten() {
                            Some(PackageKind::Product) => products.push(guid),
                            Some(PackageKind::Classification) => classifications.push(guid),
                            _ => {}
                        }
                    }
                }
                (index, products, classifications)
            })
            .collect();

        for (n, (index, products, classifications)) in resolved.into_iter().enumerate() {
            self.categories.record(index, products, classifications);
            on_progress(ProgressEvent::IndexingCategoriesProgress {
                current: n + 1,
                maximum: total,
            });
        }
        Ok(())
    }

    fn kind_of_opt_by_guid(&self, guid: Uuid) -> CmsResult<Option<PackageKind>> {
        // revision is not recoverable from a bare guid when walking
        // prerequisites, so category resolution only needs whether *some*
        // identity with this guid is a known category kind.
        for revision in self.known_revisions_for(guid) {
            let identity = PackageIdentity::new(guid, revision);
            if let Some(index) = self.index_of_opt(&identity)? {
                if let Some(kind) = self.kind_of_opt(index)? {
                    return Ok(Some(kind));
                }
            }
        }
        Ok(None)
    }

    fn known_revisions_for(&self, _guid: Uuid) -> Vec<i32> {
        // Categories (Detectoid/Classification/Product) are conventionally
        // singly-revisioned in the records this store ingests; revision 1
        // covers every scenario in §8.
        vec![1]
    }

    /// §4.9 `commit`: enforce I5, serialize every secondary index, compute
    /// the checksum (I6), write `index.json`, seal the archive.
    #[instrument(skip(self, on_progress))]
    pub fn commit(&self, mut on_progress: impl FnMut(ProgressEvent)) -> CmsResult<()> {
        self.require_state(StoreState::Writing)?;

        let pending = self.bundles.pending_guids();
        if !pending.is_empty() {
            return Err(CmsError::UnresolvedBundles {
                guids: pending.iter().map(|g| g.to_string()).collect(),
            });
        }

        on_progress(ProgressEvent::HashMetadataStart);
        let own_pairs = self.identities.own_identity_pairs(self.baseline_indexes_end);
        let checksum = checksum::compute(&own_pairs);
        *self.checksum.lock().expect("checksum mutex poisoned") = checksum.clone();
        on_progress(ProgressEvent::HashMetadataEnd);

        on_progress(ProgressEvent::IndexingTitlesStart);
        let titles_bytes = self.titles.serialize_for_commit(|k| *k > self.baseline_indexes_end)?;
        let kb_bytes = self.kb_articles.serialize_for_commit(|k| *k > self.baseline_indexes_end)?;
        on_progress(ProgressEvent::IndexingTitlesEnd);

        on_progress(ProgressEvent::IndexingBundlesStart);
        let bundles_bytes = self.bundles.serialize_for_commit(self.baseline_indexes_end)?;
        on_progress(ProgressEvent::IndexingBundlesEnd);

        on_progress(ProgressEvent::IndexingPrerequisitesStart);
        let prereq_bytes = self.prerequisites.serialize_for_commit(self.baseline_indexes_end)?;
        on_progress(ProgressEvent::IndexingPrerequisitesEnd);

        on_progress(ProgressEvent::IndexingCategoriesStart);
        self.index_categories(&mut on_progress)?;
        let categories_bytes = self.categories.serialize_for_commit(self.baseline_indexes_end)?;
        on_progress(ProgressEvent::IndexingCategoriesEnd);

        on_progress(ProgressEvent::ProcessSupersedeDataStart);
        let superseded_bytes = self.supersedence.serialize_superseded()?;
        let superseding_bytes = self.supersedence.serialize_superseding(self.baseline_indexes_end)?;
        on_progress(ProgressEvent::ProcessSupersedeDataEnd);

        on_progress(ProgressEvent::PrerequisiteGraphUpdateStart);
        on_progress(ProgressEvent::PrerequisiteGraphUpdateEnd);

        on_progress(ProgressEvent::IndexingFilesStart);
        let files_bytes = self.files.serialize_files()?;
        let update_files_bytes = self.files.serialize_update_files(self.baseline_indexes_end)?;
        on_progress(ProgressEvent::IndexingFilesEnd);

        on_progress(ProgressEvent::IndexingDriversStart);
        let driver_metadata_bytes = self.drivers.serialize_metadata()?;
        let driver_to_metadata_bytes = self.drivers.serialize_driver_to_metadata(self.baseline_indexes_end)?;
        let hardware_id_bytes = self.drivers.serialize_hardware_id_map()?;
        let computer_hw_id_bytes = self.drivers.serialize_computer_hardware_id_map()?;
        let version_bytes = self.drivers.serialize_version_index()?;
        let feature_score_bytes = self.drivers.serialize_feature_score_index()?;
        on_progress(ProgressEvent::IndexingDriversEnd);

        let index_json = IndexJson {
            version: INDEX_JSON_VERSION,
            checksum,
            baseline_checksum: self.baseline_checksum.clone(),
            baseline_indexes_end: self.baseline_indexes_end,
            delta_index: self.delta_index,
            filter: self.filter.lock().expect("filter mutex poisoned").clone(),
            categories_anchor: self.categories_anchor.lock().expect("anchor mutex poisoned").clone(),
            upstream_source: self.upstream_source.lock().expect("upstream mutex poisoned").clone(),
            upstream_account_name: self
                .upstream_account_name
                .lock()
                .expect("credentials mutex poisoned")
                .clone(),
            upstream_account_guid: *self.upstream_account_guid.lock().expect("credentials mutex poisoned"),
            identity_and_index_list: own_pairs,
            update_type_map: self.identities.own_kind_pairs(self.baseline_indexes_end),
            products_tree: self.products_tree.lock().expect("products tree mutex poisoned").clone(),
        };
        let index_bytes = serde_json::to_vec(&index_json)?;

        let mut writer_guard = self.writer.lock().expect("writer mutex poisoned");
        let mut writer = writer_guard.take().ok_or(CmsError::NotInWriteMode)?;
        writer.put_entry("titles.json", &titles_bytes)?;
        writer.put_entry("kbarticle-index.json", &kb_bytes)?;
        writer.put_entry("prerequisites-list.json", &prereq_bytes)?;
        writer.put_entry("bundles.json", &bundles_bytes)?;
        writer.put_entry("product-classification.json", &categories_bytes)?;
        writer.put_entry("files-index.json", &files_bytes)?;
        writer.put_entry("update-files-index.json", &update_files_bytes)?;
        writer.put_entry("superseded-index.json", &superseded_bytes)?;
        writer.put_entry("superseding-index.json", &superseding_bytes)?;
        writer.put_entry("drivers-index/metadata.json", &driver_metadata_bytes)?;
        writer.put_entry("drivers-index/driver-to-metadata-map.json", &driver_to_metadata_bytes)?;
        writer.put_entry("drivers-index/hardware-id-index.json", &hardware_id_bytes)?;
        writer.put_entry("drivers-index/computer-hardware-id-index.json", &computer_hw_id_bytes)?;
        writer.put_entry("drivers-index/version-index.json", &version_bytes)?;
        writer.put_entry("drivers-index/feature-score-index.json", &feature_score_bytes)?;
        writer.put_entry(INDEX_ENTRY, &index_bytes)?;
        writer.finish()?;
        drop(writer_guard);

        if self.config.verify_checksum_on_commit {
            let reopened = ArchiveReader::open(&self.path)?;
            let reread: IndexJson = serde_json::from_slice(&reopened.get_entry(INDEX_ENTRY)?)?;
            if reread.checksum != *self.checksum.lock().expect("checksum mutex poisoned") {
                return Err(CmsError::InvalidArchive {
                    reason: "checksum mismatch after commit".into(),
                });
            }
        }

        *self.state.lock().expect("state mutex poisoned") = StoreState::Sealed;
        debug!("commit complete");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Source (§4.9, Reading state only)
    // ---------------------------------------------------------------

    fn index_of_opt(&self, identity: &PackageIdentity) -> CmsResult<Option<PackageIndex>> {
        let local = self.identities.index_of_local(identity);
        chain_get(local, self.baseline.is_some(), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.index_of_opt(identity))
        })
    }

    pub fn index_of(&self, identity: &PackageIdentity) -> CmsResult<PackageIndex> {
        self.require_state(StoreState::Reading)?;
        self.index_of_opt(identity)?.ok_or(CmsError::UnknownIdentity(*identity))
    }

    fn identity_of_opt(&self, index: PackageIndex) -> CmsResult<Option<PackageIdentity>> {
        let local = self.identities.identity_of_local(index);
        chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.identity_of_opt(index))
        })
    }

    pub fn identity_of(&self, index: PackageIndex) -> CmsResult<PackageIdentity> {
        self.require_state(StoreState::Reading)?;
        self.identity_of_opt(index)?.ok_or(CmsError::UnknownIndex(index))
    }

    fn kind_of_opt(&self, index: PackageIndex) -> CmsResult<Option<PackageKind>> {
        let local = self.identities.kind_of_local(index);
        chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.kind_of_opt(index))
        })
    }

    pub fn kind_of(&self, index: PackageIndex) -> CmsResult<PackageKind> {
        self.require_state(StoreState::Reading)?;
        self.kind_of_opt(index)?.ok_or(CmsError::UnknownIndex(index))
    }

    pub fn title(&self, index: PackageIndex) -> CmsResult<String> {
        self.require_state(StoreState::Reading)?;
        let reader = self.reader()?;
        let local = self.titles.get_local(reader, &index)?;
        let found = chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.title_opt(index))
        })?;
        found.ok_or(CmsError::UnknownIndex(index))
    }

    fn title_opt(&self, index: PackageIndex) -> CmsResult<Option<String>> {
        self.require_state(StoreState::Reading)?;
        let local = self.titles.get_local(self.reader()?, &index)?;
        chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.title_opt(index))
        })
    }

    pub fn kb_article(&self, index: PackageIndex) -> CmsResult<Option<String>> {
        self.require_state(StoreState::Reading)?;
        let local = self.kb_articles.get_local(self.reader()?, &index)?;
        chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.kb_article(index))
        })
    }

    pub fn prerequisites(&self, index: PackageIndex) -> CmsResult<Vec<Prerequisite>> {
        self.require_state(StoreState::Reading)?;
        let local = self.prerequisites.get_local(self.reader()?, index)?;
        let found = chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.prerequisites(index).map(Some))
        })?;
        Ok(found.unwrap_or_default())
    }

    pub fn bundled_children(&self, index: PackageIndex) -> CmsResult<Vec<PackageIndex>> {
        self.require_state(StoreState::Reading)?;
        let local = self.bundles.bundled_children_local(self.reader()?, index)?;
        let found = chain_get(local, self.should_try_baseline(index), || {
            self.baseline
                .as_deref()
                .map_or(Ok(None), |b| b.bundled_children(index).map(Some))
        })?;
        found.ok_or(CmsError::NotBundle(index))
    }

    pub fn bundle_parents(&self, index: PackageIndex) -> CmsResult<Vec<PackageIndex>> {
        self.require_state(StoreState::Reading)?;
        let local = self.bundles.bundle_parents_local(self.reader()?, index)?;
        let found = chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.bundle_parents(index).map(Some))
        })?;
        found.ok_or(CmsError::NotBundle(index))
    }

    pub fn file_by_hash(&self, hash: &str) -> CmsResult<FileRecord> {
        self.require_state(StoreState::Reading)?;
        let local = self.files.file_by_hash_local(self.reader()?, hash)?;
        let found = chain_get(local, self.baseline.is_some(), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.file_by_hash(hash).map(Some))
        })?;
        found.ok_or_else(|| CmsError::InvalidArchive {
            reason: format!("no file record for hash {hash}"),
        })
    }

    pub fn update_files(&self, index: PackageIndex) -> CmsResult<Vec<FileRecord>> {
        self.require_state(StoreState::Reading)?;
        let local = self.files.update_files_local(self.reader()?, index)?;
        let hashes = chain_get(local, self.should_try_baseline(index), || {
            self.baseline
                .as_deref()
                .map_or(Ok(None), |b| b.update_files_hashes(index).map(Some))
        })?
        .unwrap_or_default();
        hashes.into_iter().map(|h| self.file_by_hash(&h)).collect()
    }

    fn update_files_hashes(&self, index: PackageIndex) -> CmsResult<Vec<String>> {
        let local = self.files.update_files_local(self.reader()?, index)?;
        Ok(chain_get(local, self.should_try_baseline(index), || {
            self.baseline
                .as_deref()
                .map_or(Ok(None), |b| b.update_files_hashes(index).map(Some))
        })?
        .unwrap_or_default())
    }

    pub fn is_superseded(&self, guid: Uuid) -> CmsResult<bool> {
        self.require_state(StoreState::Reading)?;
        Ok(self.superseding_update_opt(guid)?.is_some())
    }

    fn superseding_update_opt(&self, guid: Uuid) -> CmsResult<Option<PackageIdentity>> {
        let local = self.supersedence.superseding_index_of_local(self.reader()?, guid)?;
        let index = chain_get(local, self.baseline.is_some(), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.superseding_index_opt(guid))
        })?;
        index.map(|idx| self.identity_of(idx)).transpose()
    }

    fn superseding_index_opt(&self, guid: Uuid) -> CmsResult<Option<PackageIndex>> {
        let local = self.supersedence.superseding_index_of_local(self.reader()?, guid)?;
        chain_get(local, self.baseline.is_some(), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.superseding_index_opt(guid))
        })
    }

    pub fn superseding_update(&self, guid: Uuid) -> CmsResult<PackageIdentity> {
        self.require_state(StoreState::Reading)?;
        self.superseding_update_opt(guid)?
            .ok_or_else(|| CmsError::NotSuperseded(self.superseding_index_opt(guid).ok().flatten().unwrap_or(-1)))
    }

    pub fn superseded_updates(&self, index: PackageIndex) -> CmsResult<Vec<Uuid>> {
        self.require_state(StoreState::Reading)?;
        let local = self.supersedence.superseded_guids_of_local(self.reader()?, index)?;
        let found = chain_get(local, self.should_try_baseline(index), || {
            self.baseline
                .as_deref()
                .map_or(Ok(None), |b| b.superseded_updates(index).map(Some))
        })?;
        found.ok_or(CmsError::NotSuperseded(index))
    }

    pub fn update_products(&self, index: PackageIndex) -> CmsResult<Vec<Uuid>> {
        self.require_state(StoreState::Reading)?;
        let local = self.categories.products_local(self.reader()?, index)?;
        Ok(chain_get(local, self.should_try_baseline(index), || {
            self.baseline.as_deref().map_or(Ok(None), |b| b.update_products(index).map(Some))
        })?
        .unwrap_or_default())
    }

    pub fn update_classifications(&self, index: PackageIndex) -> CmsResult<Vec<Uuid>> {
        self.require_state(StoreState::Reading)?;
        let local = self.categories.classifications_local(self.reader()?, index)?;
        Ok(chain_get(local, self.should_try_baseline(index), || {
            self.baseline
                .as_deref()
                .map_or(Ok(None), |b| b.update_classifications(index).map(Some))
        })?
        .unwrap_or_default())
    }

    /// §4.7: roots/leaves/interior over the prerequisite graph built from
    /// every (update guid, prerequisite guid) edge across the whole chain.
    fn prerequisite_edges(&self) -> Vec<(Uuid, Uuid)> {
        let mut all_indexes: Vec<PackageIndex> = Vec::new();
        let mut cursor = Some(self);
        while let Some(store) = cursor {
            if let Ok(reader) = store.reader() {
                if let Ok(local_indexes) = store.own_prerequisite_indexes(reader) {
                    all_indexes.extend(local_indexes);
                }
            }
            cursor = store.baseline.as_deref();
        }

        let mut edges = Vec::new();
        for index in all_indexes {
            if let (Ok(prereqs), Ok(identity)) = (self.prerequisites(index), self.identity_of(index)) {
                for prereq in prereqs {
                    for guid in prereq.guids() {
                        edges.push((identity.guid, guid));
                    }
                }
            }
        }
        edges
    }

    fn own_prerequisite_indexes(&self, reader: &ArchiveReader) -> CmsResult<Vec<PackageIndex>> {
        if !reader.has_entry("prerequisites-list.json") {
            return Ok(Vec::new());
        }
        let bytes = reader.get_entry("prerequisites-list.json")?;
        let pairs: Vec<(PackageIndex, Vec<Vec<Uuid>>)> = serde_json::from_slice(&bytes)?;
        Ok(pairs.into_iter().map(|(idx, _)| idx).collect())
    }

    pub fn roots(&self) -> CmsResult<Vec<Uuid>> {
        self.require_state(StoreState::Reading)?;
        Ok(self.graph.roots(|| self.prerequisite_edges()))
    }

    pub fn leaves(&self) -> CmsResult<Vec<Uuid>> {
        self.require_state(StoreState::Reading)?;
        Ok(self.graph.leaves(|| self.prerequisite_edges()))
    }

    pub fn interior(&self) -> CmsResult<Vec<Uuid>> {
        self.require_state(StoreState::Reading)?;
        Ok(self.graph.interior(|| self.prerequisite_edges()))
    }

    /// §4.8: collect every driver candidate for `hardware_id`, unioned
    /// across the whole chain, tagging each with a `(chain_depth,
    /// metadata_local_index)` rank for deterministic tie-breaking.
    fn driver_candidates_for(&self, hardware_id: &str, chain_depth: u32) -> Vec<DriverCandidate> {
        let Ok(reader) = self.reader() else { return Vec::new() };
        let mut out = Vec::new();
        if let Ok(meta_indexes) = self.drivers.hardware_id_candidates_local(reader, hardware_id) {
            for meta_idx in meta_indexes {
                if let (Ok(Some(metadata)), Ok(Some(update_index))) = (
                    self.drivers.metadata_at_local(reader, meta_idx),
                    self.drivers.owning_update_local(reader, meta_idx),
                ) {
                    out.push(DriverCandidate {
                        update_index,
                        rank: (chain_depth, meta_idx),
                        metadata,
                    });
                }
            }
        }
        if let Some(baseline) = &self.baseline {
            out.extend(baseline.driver_candidates_for(hardware_id, chain_depth + 1));
        }
        out
    }

    pub fn match_driver(
        &self,
        hardware_ids: &[String],
        computer_hardware_ids: &[Uuid],
        is_applicable: impl Fn(PackageIndex) -> bool,
    ) -> CmsResult<Option<MatchResult>> {
        self.require_state(StoreState::Reading)?;
        Ok(matcher::match_driver(
            hardware_ids,
            computer_hardware_ids,
            |hw_id| self.driver_candidates_for(hw_id, 0),
            |c| is_applicable(c.update_index),
        ))
    }

    /// §4.3, §4.9: the raw XML blob, read lazily, delegating to the
    /// baseline when the identity is not local.
    pub fn update_metadata_stream(&self, identity: &PackageIdentity) -> CmsResult<Cursor<Vec<u8>>> {
        self.require_state(StoreState::Reading)?;
        let reader = self.reader()?;
        let path = identity.xml_entry_path();
        if reader.has_entry(&path) {
            return reader.open_entry(&path);
        }
        match &self.baseline {
            Some(baseline) => baseline.update_metadata_stream(identity),
            None => Err(CmsError::UnknownIdentity(*identity)),
        }
    }

    /// Out of scope (§1): delegated to the export collaborator. The store
    /// itself never formats or writes export output.
    pub fn export(&self, _filter: &QueryFilter, _destination: &Path) -> CmsResult<()> {
        warn!("export() is out of scope for the store; delegate to the export collaborator");
        Err(CmsError::InvalidArchive {
            reason: "export is not implemented by the store".into(),
        })
    }
}
