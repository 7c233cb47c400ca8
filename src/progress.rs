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
//! Coarse-grained progress tags emitted during `commit` (§6).

/// One tick of the `commitProgress` event stream. Consumers pass a
/// closure to `Sink::commit`; it receives each event as it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    HashMetadataStart,
    HashMetadataEnd,
    IndexingTitlesStart,
    IndexingTitlesEnd,
    IndexingBundlesStart,
    IndexingBundlesEnd,
    IndexingPrerequisitesStart,
    IndexingPrerequisitesEnd,
    IndexingCategoriesStart,
    IndexingCategoriesProgress { current: usize, maximum: usize },
    IndexingCategoriesEnd,
    ProcessSupersedeDataStart,
    ProcessSupersedeDataEnd,
    PrerequisiteGraphUpdateStart,
    PrerequisiteGraphUpdateProgress { current: usize, maximum: usize },
    PrerequisiteGraphUpdateEnd,
    IndexingFilesStart,
    IndexingFilesEnd,
    IndexingDriversStart,
    IndexingDriversEnd,
}
