//! End-to-end tests against the real on-disk archive format: no mocked
//! I/O, every scenario round-trips through `Store::create`/`commit`/`open`.

use cms::{CmsError, IncomingUpdate, PackageIdentity, PackageKind, QueryFilter, Store, StoreConfig};
use tempfile::tempdir;
use uuid::Uuid;

fn update(guid: u128, revision: i32, kind: PackageKind, xml: &str) -> IncomingUpdate {
    IncomingUpdate {
        identity: PackageIdentity::new(Uuid::from_u128(guid), revision),
        kind,
        xml: xml.as_bytes().to_vec(),
        compressed: false,
    }
}

#[test]
fn simple_ingest_round_trips_title_kb_and_kind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .add_updates(vec![
            update(1, 1, PackageKind::Product, "<Update><Title>Windows 11</Title></Update>"),
            update(2, 1, PackageKind::Classification, "<Update><Title>Security Updates</Title></Update>"),
            update(
                3,
                1,
                PackageKind::SoftwareUpdate,
                "<Update><Title>2026-07 Patch</Title><KbArticle>KB5040001</KbArticle></Update>",
            ),
        ])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    let su = PackageIdentity::new(Uuid::from_u128(3), 1);
    let index = opened.index_of(&su).unwrap();
    assert_eq!(opened.title(index).unwrap(), "2026-07 Patch");
    assert_eq!(opened.kb_article(index).unwrap().as_deref(), Some("KB5040001"));
    assert_eq!(opened.kind_of(index).unwrap(), PackageKind::SoftwareUpdate);
    assert_eq!(opened.identity_of(index).unwrap(), su);

    let unknown = PackageIdentity::new(Uuid::from_u128(999), 1);
    assert!(matches!(opened.index_of(&unknown), Err(CmsError::UnknownIdentity(_))));
}

#[test]
fn bundle_resolves_when_child_arrives_out_of_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    // Parent references a child update that hasn't been added yet.
    store
        .add_updates(vec![update(
            10,
            1,
            PackageKind::SoftwareUpdate,
            r#"<Update><Title>Bundle</Title><Bundles><Child Guid="00000000-0000-0000-0000-00000000000b" Revision="1"/></Bundles></Update>"#,
        )])
        .unwrap();

    // Committing now must fail: the child is still pending.
    assert!(matches!(
        store.commit(|_| {}),
        Err(CmsError::UnresolvedBundles { .. })
    ));

    store
        .add_updates(vec![update(11, 1, PackageKind::SoftwareUpdate, "<Update><Title>Child</Title></Update>")])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    let parent = opened.index_of(&PackageIdentity::new(Uuid::from_u128(10), 1)).unwrap();
    let child = opened.index_of(&PackageIdentity::new(Uuid::from_u128(11), 1)).unwrap();

    assert_eq!(opened.bundled_children(parent).unwrap(), vec![child]);
    assert_eq!(opened.bundle_parents(child).unwrap(), vec![parent]);
}

#[test]
fn supersedence_chain_last_write_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    let a_guid = Uuid::from_u128(20);
    store
        .add_updates(vec![
            update(20, 1, PackageKind::SoftwareUpdate, "<Update><Title>A</Title></Update>"),
            update(
                21,
                1,
                PackageKind::SoftwareUpdate,
                &format!(r#"<Update><Title>B</Title><Supersedes><Guid>{a_guid}</Guid></Supersedes></Update>"#),
            ),
            update(
                22,
                1,
                PackageKind::SoftwareUpdate,
                &format!(r#"<Update><Title>C</Title><Supersedes><Guid>{a_guid}</Guid></Supersedes></Update>"#),
            ),
        ])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    assert!(opened.is_superseded(a_guid).unwrap());
    let superseder = opened.superseding_update(a_guid).unwrap();
    assert_eq!(superseder, PackageIdentity::new(Uuid::from_u128(22), 1));

    let c_index = opened.index_of(&PackageIdentity::new(Uuid::from_u128(22), 1)).unwrap();
    assert_eq!(opened.superseded_updates(c_index).unwrap(), vec![a_guid]);

    let fresh_guid = Uuid::from_u128(999);
    assert!(!opened.is_superseded(fresh_guid).unwrap());
    assert!(matches!(
        opened.superseding_update(fresh_guid),
        Err(CmsError::NotSuperseded(_))
    ));
}

#[test]
fn delta_delegates_to_baseline_for_identities_and_indexes() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("metadata.zip");
    let delta_path = dir.path().join("metadata-1.zip");

    let baseline = Store::create(&baseline_path, StoreConfig::default()).unwrap();
    baseline
        .add_updates(vec![update(30, 1, PackageKind::SoftwareUpdate, "<Update><Title>Base Update</Title></Update>")])
        .unwrap();
    baseline.commit(|_| {}).unwrap();

    let opened_baseline = Store::open(&baseline_path, StoreConfig::default()).unwrap();
    let delta = Store::create_delta(&delta_path, opened_baseline, StoreConfig::default()).unwrap();
    delta
        .add_updates(vec![update(31, 1, PackageKind::SoftwareUpdate, "<Update><Title>Delta Update</Title></Update>")])
        .unwrap();
    delta.commit(|_| {}).unwrap();

    let opened_delta = Store::open(&delta_path, StoreConfig::default()).unwrap();
    let base_identity = PackageIdentity::new(Uuid::from_u128(30), 1);
    let delta_identity = PackageIdentity::new(Uuid::from_u128(31), 1);

    // Base identity resolves by delegating to the baseline.
    let base_index = opened_delta.index_of(&base_identity).unwrap();
    assert_eq!(opened_delta.title(base_index).unwrap(), "Base Update");

    // The delta's own identity resolves locally.
    let delta_index = opened_delta.index_of(&delta_identity).unwrap();
    assert_eq!(opened_delta.title(delta_index).unwrap(), "Delta Update");
    assert!(delta_index > base_index);
}

#[test]
fn opening_a_delta_with_a_missing_baseline_file_fails() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("metadata.zip");
    let delta_path = dir.path().join("metadata-1.zip");

    let baseline = Store::create(&baseline_path, StoreConfig::default()).unwrap();
    baseline
        .add_updates(vec![update(40, 1, PackageKind::SoftwareUpdate, "<Update><Title>Base</Title></Update>")])
        .unwrap();
    baseline.commit(|_| {}).unwrap();

    let opened_baseline = Store::open(&baseline_path, StoreConfig::default()).unwrap();
    let delta = Store::create_delta(&delta_path, opened_baseline, StoreConfig::default()).unwrap();
    delta.commit(|_| {}).unwrap();

    std::fs::remove_file(&baseline_path).unwrap();
    assert!(matches!(
        Store::open(&delta_path, StoreConfig::default()),
        Err(CmsError::MissingBaseline { .. })
    ));
}

#[test]
fn delta_filename_disagreeing_with_recorded_delta_index_is_corrupt_chain_name() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("metadata.zip");
    // Misnamed: implies delta index 5, but this is the first delta (index 1).
    let delta_path = dir.path().join("metadata-5.zip");

    let baseline = Store::create(&baseline_path, StoreConfig::default()).unwrap();
    baseline
        .add_updates(vec![update(50, 1, PackageKind::SoftwareUpdate, "<Update><Title>Base</Title></Update>")])
        .unwrap();
    baseline.commit(|_| {}).unwrap();

    let opened_baseline = Store::open(&baseline_path, StoreConfig::default()).unwrap();
    let delta = Store::create_delta(&delta_path, opened_baseline, StoreConfig::default()).unwrap();
    delta.commit(|_| {}).unwrap();

    assert!(matches!(
        Store::open(&delta_path, StoreConfig::default()),
        Err(CmsError::CorruptChainName { .. })
    ));
}

fn driver_update(guid: u128, hardware_id: &str, date: &str, parts: &str, computer_hw_id: Option<Uuid>) -> IncomingUpdate {
    let chid_block = computer_hw_id
        .map(|g| format!("<TargetComputerHardwareIds><Guid>{g}</Guid></TargetComputerHardwareIds>"))
        .unwrap_or_default();
    let xml = format!(
        r#"<Update><Title>Driver</Title><DriverMetadata><Driver HardwareId="{hardware_id}" DriverClass="net">
            <Version Date="{date}" Parts="{parts}"/>
            {chid_block}
        </Driver></DriverMetadata></Update>"#
    );
    update(guid, 1, PackageKind::DriverUpdate, &xml)
}

#[test]
fn driver_matcher_prefers_computer_hardware_id_over_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");
    let chid = Uuid::from_u128(100);

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .add_updates(vec![
            driver_update(60, "PCI\\VEN_1_DEV_2", "2020-01-01", "1.0.0.0", Some(chid)),
            driver_update(61, "PCI\\VEN_1_DEV_2", "2024-01-01", "9.0.0.0", None),
        ])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    let targeted = opened.index_of(&PackageIdentity::new(Uuid::from_u128(60), 1)).unwrap();

    let result = opened
        .match_driver(&["pci\\ven_1_dev_2".to_string()], &[chid], |_| true)
        .unwrap()
        .expect("a driver should match");
    assert_eq!(result.update_index, targeted);
    assert_eq!(result.matched_computer_hardware_id, Some(chid));
}

#[test]
fn driver_matcher_falls_back_to_highest_version_without_computer_hardware_id() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .add_updates(vec![
            driver_update(70, "PCI\\VEN_2_DEV_1", "2019-01-01", "1.0.0.0", None),
            driver_update(71, "PCI\\VEN_2_DEV_1", "2023-06-01", "3.1.0.0", None),
        ])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    let newest = opened.index_of(&PackageIdentity::new(Uuid::from_u128(71), 1)).unwrap();

    let result = opened
        .match_driver(&["pci\\ven_2_dev_1".to_string()], &[], |_| true)
        .unwrap()
        .expect("a driver should match");
    assert_eq!(result.update_index, newest);
    assert!(result.matched_computer_hardware_id.is_none());
}

#[test]
fn prerequisite_graph_classifies_roots_leaves_and_interior() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let leaf_guid = Uuid::from_u128(80);
    let middle_guid = Uuid::from_u128(81);
    let root_guid = Uuid::from_u128(82);

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .add_updates(vec![
            update(80, 1, PackageKind::SoftwareUpdate, "<Update><Title>Leaf</Title></Update>"),
            update(
                81,
                1,
                PackageKind::SoftwareUpdate,
                &format!(
                    r#"<Update><Title>Middle</Title><Prerequisites><Simple Guid="{leaf_guid}"/></Prerequisites></Update>"#
                ),
            ),
            update(
                82,
                1,
                PackageKind::SoftwareUpdate,
                &format!(
                    r#"<Update><Title>Root</Title><Prerequisites><Simple Guid="{middle_guid}"/></Prerequisites></Update>"#
                ),
            ),
        ])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    assert!(opened.roots().unwrap().contains(&root_guid));
    assert!(opened.leaves().unwrap().contains(&leaf_guid));
    assert!(opened.interior().unwrap().contains(&middle_guid));
}

#[test]
fn category_prerequisite_is_indexed_as_product_or_classification() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let product_guid = Uuid::from_u128(90);

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .add_updates(vec![
            update(90, 1, PackageKind::Product, "<Update><Title>Windows Server</Title></Update>"),
            update(
                91,
                1,
                PackageKind::SoftwareUpdate,
                &format!(
                    r#"<Update><Title>Server Patch</Title><Prerequisites><Simple Guid="{product_guid}"/></Prerequisites></Update>"#
                ),
            ),
        ])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    let update_index = opened.index_of(&PackageIdentity::new(Uuid::from_u128(91), 1)).unwrap();
    assert_eq!(opened.update_products(update_index).unwrap(), vec![product_guid]);
}

#[test]
fn add_file_is_deduplicated_by_hash_and_linked_to_the_update() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .add_updates(vec![update(
            100,
            1,
            PackageKind::SoftwareUpdate,
            r#"<Update><Title>Has Files</Title><Files><File Hash="deadbeef" Url="http://example.com/a.cab" Size="1024"/></Files></Update>"#,
        )])
        .unwrap();
    store.commit(|_| {}).unwrap();

    let opened = Store::open(&path, StoreConfig::default()).unwrap();
    let index = opened.index_of(&PackageIdentity::new(Uuid::from_u128(100), 1)).unwrap();
    let files = opened.update_files(index).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].hash, "deadbeef");
    assert_eq!(opened.file_by_hash("deadbeef").unwrap().url, "http://example.com/a.cab");
}

#[test]
fn sink_operations_are_rejected_once_sealed_and_source_operations_are_rejected_before_commit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    assert!(matches!(store.title(0), Err(CmsError::NotInReadMode)));

    store.commit(|_| {}).unwrap();
    assert!(matches!(
        store.add_updates(vec![update(200, 1, PackageKind::SoftwareUpdate, "<Update/>")]),
        Err(CmsError::NotInWriteMode)
    ));
    assert!(matches!(store.commit(|_| {}), Err(CmsError::NotInWriteMode)));
}

#[test]
fn query_filter_and_categories_anchor_round_trip_through_commit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.zip");

    let store = Store::create(&path, StoreConfig::default()).unwrap();
    store
        .set_query_filter(QueryFilter {
            products: vec![Uuid::from_u128(1)],
            classifications: vec![],
            anchor: Some("anchor-1".to_string()),
            is_categories: false,
        })
        .unwrap();
    store.set_categories_anchor("cat-anchor".to_string()).unwrap();
    store.commit(|_| {}).unwrap();

    // Re-open to confirm the roundtrip; the fields aren't exposed by the
    // public Source API (they feed the export collaborator, out of scope
    // here), so this only confirms commit/open succeed with them set.
    let _opened = Store::open(&path, StoreConfig::default()).unwrap();
}

#[test]
fn reingesting_a_baseline_known_identity_into_a_delta_is_a_silent_duplicate() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("metadata.zip");
    let delta_path = dir.path().join("metadata-1.zip");

    let baseline = Store::create(&baseline_path, StoreConfig::default()).unwrap();
    baseline
        .add_updates(vec![update(110, 1, PackageKind::SoftwareUpdate, "<Update><Title>Original</Title></Update>")])
        .unwrap();
    baseline.commit(|_| {}).unwrap();

    let opened_baseline = Store::open(&baseline_path, StoreConfig::default()).unwrap();
    let baseline_index = opened_baseline.index_of(&PackageIdentity::new(Uuid::from_u128(110), 1)).unwrap();

    let delta = Store::create_delta(&delta_path, opened_baseline, StoreConfig::default()).unwrap();
    // Same (guid, revision) as the baseline's own record, carrying different
    // XML — must be ignored, not re-indexed under a new delta-local index.
    delta
        .add_updates(vec![update(110, 1, PackageKind::SoftwareUpdate, "<Update><Title>Duplicate</Title></Update>")])
        .unwrap();
    delta
        .add_updates(vec![update(111, 1, PackageKind::SoftwareUpdate, "<Update><Title>New In Delta</Title></Update>")])
        .unwrap();
    delta.commit(|_| {}).unwrap();

    let opened_delta = Store::open(&delta_path, StoreConfig::default()).unwrap();
    let resolved = opened_delta.index_of(&PackageIdentity::new(Uuid::from_u128(110), 1)).unwrap();
    assert_eq!(resolved, baseline_index);
    assert_eq!(opened_delta.title(resolved).unwrap(), "Original");

    let new_index = opened_delta.index_of(&PackageIdentity::new(Uuid::from_u128(111), 1)).unwrap();
    assert_eq!(opened_delta.title(new_index).unwrap(), "New In Delta");
}

#[test]
fn new_delta_parent_bundling_a_pre_existing_baseline_child_round_trips() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("metadata.zip");
    let delta_path = dir.path().join("metadata-1.zip");

    let baseline = Store::create(&baseline_path, StoreConfig::default()).unwrap();
    baseline
        .add_updates(vec![update(120, 1, PackageKind::SoftwareUpdate, "<Update><Title>Baseline Child</Title></Update>")])
        .unwrap();
    baseline.commit(|_| {}).unwrap();

    let opened_baseline = Store::open(&baseline_path, StoreConfig::default()).unwrap();
    let child_index = opened_baseline.index_of(&PackageIdentity::new(Uuid::from_u128(120), 1)).unwrap();

    let delta = Store::create_delta(&delta_path, opened_baseline, StoreConfig::default()).unwrap();
    delta
        .add_updates(vec![update(
            121,
            1,
            PackageKind::SoftwareUpdate,
            r#"<Update><Title>New Parent</Title><Bundles><Child Guid="00000000-0000-0000-0000-000000000078" Revision="1"/></Bundles></Update>"#,
        )])
        .unwrap();
    delta.commit(|_| {}).unwrap();

    let opened_delta = Store::open(&delta_path, StoreConfig::default()).unwrap();
    let parent_index = opened_delta.index_of(&PackageIdentity::new(Uuid::from_u128(121), 1)).unwrap();

    assert_eq!(opened_delta.bundled_children(parent_index).unwrap(), vec![child_index]);
    assert_eq!(opened_delta.bundle_parents(child_index).unwrap(), vec![parent_index]);
}
