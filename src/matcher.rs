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
//! Driver matcher (§4.8): ranks candidates by hardware ID → computer
//! hardware ID → feature score → version.

use uuid::Uuid;

use crate::identity::PackageIndex;
use crate::record::{DriverMetadataItem, DriverVersion, FeatureScore};

/// One candidate gathered from the hardware-id index, anywhere in the
/// delta chain. `rank` breaks ties deterministically: `(chain_depth,
/// metadata_local_index)`, ascending, so candidates from this archive
/// sort before candidates recursed into from the baseline.
#[derive(Debug, Clone)]
pub struct DriverCandidate {
    pub update_index: PackageIndex,
    pub rank: (u32, usize),
    pub metadata: DriverMetadataItem,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub update_index: PackageIndex,
    pub driver: DriverMetadataItem,
    pub matched_hardware_id: String,
    pub matched_computer_hardware_id: Option<Uuid>,
    pub matched_feature_score: Option<FeatureScore>,
    pub matched_version: DriverVersion,
}

/// `hardware_ids` ordered specific-to-generic. `candidates_for` gathers
/// every candidate (this archive's own plus the baseline's, recursively
/// unioned) for one hardware id — the chain-walk itself lives in
/// `Store`, not here. `is_applicable` filters by the caller-supplied
/// applicability predicate (§4.8 step 3).
pub fn match_driver(
    hardware_ids: &[String],
    computer_hardware_ids: &[Uuid],
    mut candidates_for: impl FnMut(&str) -> Vec<DriverCandidate>,
    is_applicable: impl Fn(&DriverCandidate) -> bool,
) -> Option<MatchResult> {
    for hardware_id in hardware_ids {
        let mut candidates: Vec<DriverCandidate> = candidates_for(hardware_id)
            .into_iter()
            .filter(&is_applicable)
            .collect();
        candidates.sort_by_key(|c| c.rank);

        if let Some(result) = match_by_computer_hardware_id(&candidates, computer_hardware_ids, hardware_id) {
            return Some(result);
        }
        if let Some(result) = match_by_simple_hardware_id(&candidates, hardware_id) {
            return Some(result);
        }
    }
    None
}

fn match_by_computer_hardware_id(
    candidates: &[DriverCandidate],
    computer_hardware_ids: &[Uuid],
    hardware_id: &str,
) -> Option<MatchResult> {
    for chid in computer_hardware_ids {
        let matching: Vec<&DriverCandidate> = candidates
            .iter()
            .filter(|c| c.metadata.computer_hardware_ids().contains(chid))
            .collect();
        if matching.is_empty() {
            continue;
        }

        let with_scores: Vec<&DriverCandidate> = matching
            .iter()
            .copied()
            .filter(|c| !c.metadata.feature_scores.is_empty())
            .collect();

        let chosen: Option<&DriverCandidate> = if !with_scores.is_empty() {
            with_scores
                .into_iter()
                .min_by_key(|c| c.metadata.feature_scores.iter().map(|fs| fs.score).min().unwrap())
        } else {
            matching.into_iter().max_by_key(|c| c.metadata.version)
        };

        if let Some(c) = chosen {
            let matched_feature_score = c.metadata.feature_scores.iter().min_by_key(|fs| fs.score).cloned();
            return Some(MatchResult {
                update_index: c.update_index,
                driver: c.metadata.clone(),
                matched_hardware_id: hardware_id.to_string(),
                matched_computer_hardware_id: Some(*chid),
                matched_feature_score,
                matched_version: c.metadata.version,
            });
        }
    }
    None
}

fn match_by_simple_hardware_id(candidates: &[DriverCandidate], hardware_id: &str) -> Option<MatchResult> {
    candidates
        .iter()
        .filter(|c| c.metadata.computer_hardware_ids().is_empty())
        .max_by_key(|c| c.metadata.version)
        .map(|c| MatchResult {
            update_index: c.update_index,
            driver: c.metadata.clone(),
            matched_hardware_id: hardware_id.to_string(),
            matched_computer_hardware_id: None,
            matched_feature_score: None,
            matched_version: c.metadata.version,
        })
}
