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
//! Error taxonomy for the compressed metadata store.

use crate::identity::{PackageIdentity, PackageIndex};

/// All failure modes the store can surface. Propagated unchanged to the
/// caller; the store never retries internally.
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    /// `index.json` is truncated, malformed, or carries an unknown version.
    #[error("invalid archive: {reason}")]
    InvalidArchive { reason: String },

    /// A delta's `BaselineChecksum` does not match the baseline's `Checksum`.
    #[error("baseline mismatch: expected checksum {expected}, baseline has {actual}")]
    BaselineMismatch { expected: String, actual: String },

    /// The baseline file a delta points at could not be found on disk.
    #[error("missing baseline: {path}")]
    MissingBaseline { path: String },

    /// The delta-index suffix parsed from a filename disagrees with the
    /// `DeltaIndex` recorded inside `index.json`.
    #[error("corrupt chain name: {filename} implies delta index {parsed}, index.json says {recorded}")]
    CorruptChainName {
        filename: String,
        parsed: u64,
        recorded: u64,
    },

    /// `commit` was called with a non-empty `PendingBundledUpdates` set.
    #[error("unresolved bundle references: {guids:?}")]
    UnresolvedBundles { guids: Vec<String> },

    /// A read was attempted for an identity absent from the whole chain.
    #[error("unknown identity: {0:?}")]
    UnknownIdentity(PackageIdentity),

    /// A read was attempted for an index absent from the whole chain.
    #[error("unknown index: {0:?}")]
    UnknownIndex(PackageIndex),

    /// A supersedence query was made against an update that is not superseded.
    #[error("update is not superseded: {0:?}")]
    NotSuperseded(PackageIndex),

    /// A bundle query was made against an update that is not a bundle member.
    #[error("update is not a bundle: {0:?}")]
    NotBundle(PackageIndex),

    /// A driver query was made against an update that carries no driver metadata.
    #[error("update is not a driver: {0:?}")]
    NotDriver(PackageIndex),

    /// A sink operation was attempted while the archive is not in the Writing state.
    #[error("store is not in write mode")]
    NotInWriteMode,

    /// A source operation was attempted while the archive is not in the Reading state.
    #[error("store is not in read mode")]
    NotInReadMode,

    /// Underlying file-system I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Underlying archive-container failure (corrupt zip, missing entry, ...).
    #[error("archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    /// Underlying JSON (de)serialization failure for an index blob.
    #[error("index serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// The raw XML blob for a record could not be parsed.
    #[error("XML error: {0}")]
    XmlError(String),
}

pub type CmsResult<T> = Result<T, CmsError>;
