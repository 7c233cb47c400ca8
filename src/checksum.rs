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
//! SHA-512 checksum over one archive's own (index, guid, revision) triples
//! (§4.5, I6).

use base64::Engine;
use sha2::{Digest, Sha512};

use crate::identity::{PackageIdentity, PackageIndex};

/// Compute the checksum for `entries` — pairs of (index, identity) that
/// belong to *this* archive only, never the baseline. Order is normalized
/// internally (ascending by index), so callers may pass entries in any
/// order.
pub fn compute(entries: &[(PackageIndex, PackageIdentity)]) -> String {
    let mut sorted: Vec<&(PackageIndex, PackageIdentity)> = entries.iter().collect();
    sorted.sort_by_key(|(idx, _)| *idx);

    let mut hasher = Sha512::new();
    for (index, identity) in sorted {
        hasher.update(index.to_le_bytes());
        hasher.update(identity.revision.to_le_bytes());
        hasher.update(identity.guid.as_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}
