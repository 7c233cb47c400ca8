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
//! Over-the-wire update records (§4.9 `addUpdates`): the shape a producer
//! hands the sink before XML parsing — optionally gzip-compressed, not yet
//! broken out into prerequisites/bundles/files/etc.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::CmsResult;
use crate::identity::{PackageIdentity, PackageKind};
use crate::record::Record;
use crate::xml;

/// One record as received from upstream, before this store has parsed it.
pub struct IncomingUpdate {
    pub identity: PackageIdentity,
    pub kind: PackageKind,
    pub xml: Vec<u8>,
    /// True if `xml` is gzip-compressed and must be inflated first.
    pub compressed: bool,
}

/// Decompress (if needed) and parse `incoming` into the structured
/// [`Record`] the sink's internal `addUpdate` expects.
pub fn into_record(incoming: IncomingUpdate) -> CmsResult<Record> {
    let raw_xml = if incoming.compressed {
        let mut decoder = GzDecoder::new(incoming.xml.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        out
    } else {
        incoming.xml
    };

    let parsed = xml::parse(&raw_xml)?;
    Ok(Record {
        identity: incoming.identity,
        kind: incoming.kind,
        title: parsed.title,
        kb_article: parsed.kb_article,
        prerequisites: parsed.prerequisites,
        bundled_children: parsed
            .bundled_children_raw
            .into_iter()
            .map(|(guid, revision)| PackageIdentity::new(guid, revision))
            .collect(),
        files: parsed.files,
        superseded_guids: parsed.superseded_guids,
        driver_metadata: parsed.driver_metadata,
        raw_xml,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    #[test]
    fn parses_uncompressed_xml() {
        let incoming = IncomingUpdate {
            identity: PackageIdentity::new(Uuid::from_u128(1), 1),
            kind: PackageKind::SoftwareUpdate,
            xml: b"<Update><Title>Patch</Title></Update>".to_vec(),
            compressed: false,
        };
        let record = into_record(incoming).unwrap();
        assert_eq!(record.title, "Patch");
    }

    #[test]
    fn decompresses_gzip_xml() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"<Update><Title>Patch</Title></Update>").unwrap();
        let compressed = encoder.finish().unwrap();

        let incoming = IncomingUpdate {
            identity: PackageIdentity::new(Uuid::from_u128(1), 1),
            kind: PackageKind::SoftwareUpdate,
            xml: compressed,
            compressed: true,
        };
        let record = into_record(incoming).unwrap();
        assert_eq!(record.title, "Patch");
    }
}
