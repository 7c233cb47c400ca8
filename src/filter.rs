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
//! Query filter and categories anchor (§6): round-tripped through
//! `index.json`, set by the sink, read back by collaborators driving
//! `export` (out of scope here, §1).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub products: Vec<Uuid>,
    pub classifications: Vec<Uuid>,
    pub anchor: Option<String>,
    pub is_categories: bool,
}
