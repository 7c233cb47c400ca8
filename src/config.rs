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
//! In-memory store configuration (SPEC_FULL §10.3). Unlike the CLI this
//! store has no surface, there is no on-disk config file — an embedder
//! builds a `StoreConfig` and passes it to `Store::create`/`Store::open`.

use zip::CompressionMethod;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Compression method used for newly written archive entries.
    pub compression: CompressionMethod,
    /// Zstd compression level, ignored for other methods.
    pub zstd_level: i32,
    /// Thread count handed to rayon for the category/title indexing passes.
    /// `0` uses rayon's default (num_cpus).
    pub index_threads: usize,
    /// Whether `commit` verifies the freshly computed checksum against
    /// itself by re-reading it back (defense against a corrupt write).
    pub verify_checksum_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Zstd,
            zstd_level: 3,
            index_threads: 0,
            verify_checksum_on_commit: true,
        }
    }
}
