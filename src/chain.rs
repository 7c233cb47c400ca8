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
//! Delta filename scheme and baseline discovery (§4.6, §6).
//!
//! `root.zip`, `root-1.zip`, `root-2.zip`, … — the numeric suffix is the
//! archive's `DeltaIndex`; `0` has no suffix. Baseline discovery
//! decrements the suffix; decrementing `1` drops it entirely.

use std::path::{Path, PathBuf};

use crate::error::{CmsError, CmsResult};

pub struct ParsedChainName {
    pub base_stem: String,
    pub delta_index: u64,
}

pub fn parse_chain_name(path: &Path) -> CmsResult<ParsedChainName> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CmsError::InvalidArchive {
            reason: "archive path has no valid file name".into(),
        })?;
    let stem = file_name.strip_suffix(".zip").unwrap_or(file_name);

    if let Some((base, suffix)) = stem.rsplit_once('-') {
        if let Ok(n) = suffix.parse::<u64>() {
            if n > 0 {
                return Ok(ParsedChainName {
                    base_stem: base.to_string(),
                    delta_index: n,
                });
            }
        }
    }
    Ok(ParsedChainName {
        base_stem: stem.to_string(),
        delta_index: 0,
    })
}

pub fn chain_filename(dir: &Path, base_stem: &str, delta_index: u64) -> PathBuf {
    if delta_index == 0 {
        dir.join(format!("{}.zip", base_stem))
    } else {
        dir.join(format!("{}-{}.zip", base_stem, delta_index))
    }
}

/// `None` for a root archive (`DeltaIndex == 0`); otherwise the filename
/// the baseline must live at.
pub fn baseline_path(path: &Path) -> CmsResult<Option<PathBuf>> {
    let parsed = parse_chain_name(path)?;
    if parsed.delta_index == 0 {
        return Ok(None);
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(Some(chain_filename(dir, &parsed.base_stem, parsed.delta_index - 1)))
}

/// §6: a mismatch between the filename's parsed suffix and `index.json`'s
/// recorded `DeltaIndex` is a fatal `CorruptChainName` error.
pub fn check_delta_index_matches(path: &Path, recorded: u64) -> CmsResult<()> {
    let parsed = parse_chain_name(path)?.delta_index;
    if parsed != recorded {
        return Err(CmsError::CorruptChainName {
            filename: path.display().to_string(),
            parsed,
            recorded,
        });
    }
    Ok(())
}
