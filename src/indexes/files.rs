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
//! File indexes (§4.4): content-hash-keyed file records, and the
//! per-update list of files that reference them.

use crate::archive::ArchiveReader;
use crate::error::CmsResult;
use crate::identity::PackageIndex;
use crate::indexes::LazyMap;
use crate::record::FileRecord;

pub struct FileIndexes {
    /// content hash -> file record (hash-keyed, not index-bounded).
    files: LazyMap<String, FileRecord>,
    /// update index -> file hashes it references.
    update_files: LazyMap<PackageIndex, Vec<String>>,
}

impl FileIndexes {
    pub fn new() -> Self {
        Self {
            files: LazyMap::new("files-index.json"),
            update_files: LazyMap::new("update-files-index.json"),
        }
    }

    /// Deduplicated by hash (§4.9 `addFile`).
    pub fn add_file(&self, record: FileRecord) {
        self.files.put(record.hash.clone(), record);
    }

    pub fn link_update(&self, index: PackageIndex, hashes: Vec<String>) {
        if !hashes.is_empty() {
            self.update_files.put(index, hashes);
        }
    }

    pub fn file_by_hash_local(&self, archive: &ArchiveReader, hash: &str) -> CmsResult<Option<FileRecord>> {
        self.files.get_local(archive, &hash.to_string())
    }

    pub fn update_files_local(&self, archive: &ArchiveReader, index: PackageIndex) -> CmsResult<Option<Vec<String>>> {
        self.update_files.get_local(archive, &index)
    }

    pub fn serialize_files(&self) -> CmsResult<Vec<u8>> {
        self.files.serialize_for_commit(|_| true)
    }

    pub fn serialize_update_files(&self, baseline_indexes_end: PackageIndex) -> CmsResult<Vec<u8>> {
        self.update_files.serialize_for_commit(|k| *k > baseline_indexes_end)
    }
}

impl Default for FileIndexes {
    fn default() -> Self {
        Self::new()
    }
}
