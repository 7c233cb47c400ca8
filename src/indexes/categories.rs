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
//! Product/Classification resolution (§4.4): derived from each new
//! record's direct prerequisites, intersected with the known Product and
//! Classification identity sets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::archive::ArchiveReader;
use crate::error::CmsResult;
use crate::identity::PackageIndex;
use crate::indexes::LazyBlob;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct CategoriesOnDisk {
    products: HashMap<PackageIndex, Vec<Uuid>>,
    classifications: HashMap<PackageIndex, Vec<Uuid>>,
}

pub struct CategoryIndex {
    blob: LazyBlob<CategoriesOnDisk>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self {
            blob: LazyBlob::new("product-classification.json"),
        }
    }

    pub fn record(&self, index: PackageIndex, product_guids: Vec<Uuid>, classification_guids: Vec<Uuid>) {
        self.blob.mutate(|d| {
            if !product_guids.is_empty() {
                d.products.insert(index, product_guids);
            }
            if !classification_guids.is_empty() {
                d.classifications.insert(index, classification_guids);
            }
        });
    }

    pub fn products_local(&self, archive: &ArchiveReader, index: PackageIndex) -> CmsResult<Option<Vec<Uuid>>> {
        self.blob.read(archive, |d| d.products.get(&index).cloned())
    }

    pub fn classifications_local(
        &self,
        archive: &ArchiveReader,
        index: PackageIndex,
    ) -> CmsResult<Option<Vec<Uuid>>> {
        self.blob.read(archive, |d| d.classifications.get(&index).cloned())
    }

    pub fn serialize_for_commit(&self, baseline_indexes_end: PackageIndex) -> CmsResult<Vec<u8>> {
        self.blob.mutate(|d| {
            d.products.retain(|k, _| *k > baseline_indexes_end);
            d.classifications.retain(|k, _| *k > baseline_indexes_end);
        });
        self.blob.serialize_for_commit()
    }
}

impl Default for CategoryIndex {
    fn default() -> Self {
        Self::new()
    }
}
