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
//! Compressed Metadata Store: a persistent, append-friendly, delta-chained
//! archive of Microsoft Update package metadata.
//!
//! A producer ingests [`record::Record`]s through [`store::Store`]'s sink
//! half, commits, and collaborators read it back through the source half —
//! identity lookups, prerequisite/bundle/supersedence/category queries,
//! hardware-ID driver matching, and the raw per-package XML blob.

pub mod archive;
pub mod chain;
pub mod checksum;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod identity;
pub mod identity_table;
pub mod indexes;
pub mod matcher;
pub mod progress;
pub mod record;
pub mod store;
pub mod wire;
pub mod xml;

pub use config::StoreConfig;
pub use error::{CmsError, CmsResult};
pub use filter::QueryFilter;
pub use identity::{PackageIdentity, PackageIndex, PackageKind};
pub use progress::ProgressEvent;
pub use record::{DriverMetadataItem, DriverVersion, FeatureScore, FileRecord, Prerequisite, Record};
pub use store::Store;
pub use wire::IncomingUpdate;
