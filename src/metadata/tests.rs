//! Unit tests for the file-backed metadata store.

use super::*;
use crate::volume::VolumeOptions;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct StoreFixture {
    _tmp: TempDir,
    store: FileMetadataStore,
}

#[fixture]
fn store() -> StoreFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().join("volumes"))
        .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
    let store = FileMetadataStore::open(root).unwrap_or_else(|err| panic!("open store: {err}"));
    StoreFixture { _tmp: tmp, store }
}

fn record(share: &str) -> VolumeMetadata {
    let mut options = HashMap::new();
    options.insert(String::from("share"), share.to_owned());
    let mut metadata = validate_options(&options).unwrap_or_else(|err| panic!("validate: {err}"));
    metadata.account = String::from("acct");
    metadata
}

#[rstest]
fn put_then_get_returns_the_record(store: StoreFixture) {
    let stored = record("docshare");
    store.store.put("data1", &stored).expect("put");

    let loaded = store.store.get("data1").expect("get");

    assert_eq!(loaded, stored);
    assert_eq!(loaded.options, VolumeOptions::for_share("docshare"));
}

#[rstest]
fn get_missing_volume_is_not_found(store: StoreFixture) {
    let err = store.store.get("ghost").expect_err("missing record");
    assert_eq!(
        err,
        MetadataError::NotFound {
            name: String::from("ghost")
        }
    );
}

#[rstest]
fn put_replaces_existing_record_without_leaving_staging_files(store: StoreFixture) {
    store.store.put("data1", &record("first")).expect("first put");
    store.store.put("data1", &record("second")).expect("second put");

    assert_eq!(store.store.get("data1").expect("get").share(), "second");
    let files = std::fs::read_dir(store.store.root())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(files, vec![String::from("data1.json")]);
}

#[rstest]
fn list_returns_sorted_names_and_ignores_foreign_files(store: StoreFixture) {
    store.store.put("zeta", &record("z")).expect("put zeta");
    store.store.put("alpha", &record("a")).expect("put alpha");
    std::fs::write(store.store.root().join("notes.txt"), "ignored").expect("write stray file");

    assert_eq!(
        store.store.list().expect("list"),
        vec![String::from("alpha"), String::from("zeta")]
    );
}

#[rstest]
fn delete_removes_record_and_reports_missing(store: StoreFixture) {
    store.store.put("data1", &record("docshare")).expect("put");

    store.store.delete("data1").expect("delete");

    assert!(matches!(store.store.get("data1"), Err(MetadataError::NotFound { .. })));
    assert!(matches!(
        store.store.delete("data1"),
        Err(MetadataError::NotFound { .. })
    ));
}

#[rstest]
fn corrupt_record_is_reported_as_malformed(store: StoreFixture) {
    std::fs::write(store.store.root().join("broken.json"), "{not json").expect("write corrupt");

    let err = store.store.get("broken").expect_err("corrupt record");
    assert!(matches!(err, MetadataError::Malformed { .. }), "{err:?}");
}

#[test]
fn validate_rejects_missing_share() {
    let err = validate_options(&HashMap::new()).expect_err("share is required");
    assert_eq!(
        err,
        MetadataError::InvalidOptions(String::from("missing volume option: 'share'"))
    );
}
