use chatsocket_core::{
    Account, AccountDetail, AccountState, AccountStorage, JsonAccountStore, StoreError,
    StoreOptions,
};
use std::fs;
use std::path::Path;

fn candidate(username: &str, hash: &str, display_name: &str) -> Account {
    Account::new(username, hash, AccountDetail::new(display_name, ""))
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn sequential_adds_allocate_ids_in_call_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonAccountStore::open(dir.path().join("accounts.json")).unwrap();

    let ana = store.add(candidate("ana", "h1", "Ana"));
    let bob = store.add(candidate("bob", "h2", "Bob"));
    let cid = store.add(candidate("cid", "h3", "Cid"));

    assert_eq!((ana.id, bob.id, cid.id), (0, 1, 2));
    for account in store.find_all() {
        assert_eq!(account.detail.account_id, account.id);
    }
}

#[test]
fn add_overwrites_caller_supplied_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonAccountStore::open(dir.path().join("accounts.json")).unwrap();

    let mut account = candidate("ana", "h1", "Ana");
    account.id = 42;
    account.detail.account_id = 99;

    let stored = store.add(account);
    assert_eq!(stored.id, 0);
    assert_eq!(stored.detail.account_id, 0);
    assert!(store.find_by_id(42).is_none());
}

#[test]
fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server").join("data").join("accounts.json");

    let store = JsonAccountStore::open(&path).unwrap();
    assert!(store.is_empty());
    assert!(path.parent().unwrap().is_dir());
    assert!(!path.exists());

    store.add(candidate("ana", "h1", "Ana"));
    assert!(path.is_file());
}

#[test]
fn open_fails_when_parent_cannot_be_created() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let err = JsonAccountStore::open(blocker.join("accounts.json")).unwrap_err();
    assert!(matches!(err, StoreError::Initialization { .. }), "{err}");
}

#[test]
fn open_rejects_malformed_file_instead_of_starting_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    fs::write(&path, b"{ not json").unwrap();

    let err = JsonAccountStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Load { .. }), "{err}");
    assert_eq!(fs::read(&path).unwrap(), b"{ not json");
}

#[test]
fn open_rejects_json_that_is_not_an_account_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    fs::write(&path, br#"{"id": 0, "username": "ana"}"#).unwrap();

    let err = JsonAccountStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Load { .. }), "{err}");
}

#[test]
fn reload_keeps_accounts_and_resets_presence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");

    {
        let store = JsonAccountStore::open(&path).unwrap();
        store.add(candidate("ana", "h1", "Ana"));
        store.add(candidate("bob", "h2", "Bob"));
        assert!(store.set_state(0, AccountState::Online));
        store.update_detail(1, &AccountDetail::new("Bobby", "away"));
        assert_eq!(store.find_by_id(0).unwrap().detail.state, AccountState::Online);
    }

    let reopened = JsonAccountStore::open(&path).unwrap();
    let accounts = reopened.find_all();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].username, "ana");
    assert_eq!(accounts[1].detail.display_name, "Bobby");
    assert_eq!(accounts[1].detail.status, "away");
    assert!(accounts
        .iter()
        .all(|account| account.detail.state == AccountState::Offline));

    let next = reopened.add(candidate("cid", "h3", "Cid"));
    assert_eq!(next.id, 2);
}

#[test]
fn load_resets_persisted_online_state_and_resyncs_account_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    fs::write(
        &path,
        br#"[{"id":5,"username":"ana","passwordHash":"h1","detail":{"accountId":1,"displayName":"Ana","status":"","state":"ONLINE"}}]"#,
    )
    .unwrap();

    let store = JsonAccountStore::open(&path).unwrap();
    let ana = store.find_by_id(5).unwrap();
    assert_eq!(ana.detail.account_id, 5);
    assert_eq!(ana.detail.state, AccountState::Offline);
    assert_eq!(store.add(candidate("bob", "h2", "Bob")).id, 6);
}

#[test]
fn saved_file_is_a_pretty_printed_full_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = JsonAccountStore::open(&path).unwrap();

    store.add(candidate("ana", "h1", "Ana"));
    store.add(candidate("bob", "h2", "Bob"));

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains('\n'));

    let json = read_json(&path);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["id"], 1);
    assert_eq!(items[1]["username"], "bob");
    assert_eq!(items[1]["passwordHash"], "h2");
    assert_eq!(items[1]["detail"]["displayName"], "Bob");
}

#[test]
fn compact_option_writes_single_line_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let options = StoreOptions {
        pretty: false,
        ..StoreOptions::default()
    };
    let store = JsonAccountStore::open_with_options(&path, options).unwrap();

    store.add(candidate("ana", "h1", "Ana"));

    let raw = fs::read_to_string(&path).unwrap();
    assert!(!raw.contains('\n'));
    assert_eq!(JsonAccountStore::open(&path).unwrap().len(), 1);
}

#[test]
fn lookups_return_first_match_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonAccountStore::open(dir.path().join("accounts.json")).unwrap();

    store.add(candidate("ana", "first", "Ana"));
    store.add(candidate("ana", "second", "Ana 2"));

    assert_eq!(store.find_by_username("ana").unwrap().password_hash, "first");
    assert!(store.find_by_username("Ana").is_none());
    assert!(store.find_by_id(7).is_none());
}

#[test]
fn find_all_returns_detached_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonAccountStore::open(dir.path().join("accounts.json")).unwrap();
    store.add(candidate("ana", "h1", "Ana"));

    let mut snapshot = store.find_all();
    snapshot[0].username = "mallory".to_string();
    store.add(candidate("bob", "h2", "Bob"));

    assert_eq!(snapshot.len(), 1);
    assert_eq!(store.find_by_id(0).unwrap().username, "ana");
    assert_eq!(store.len(), 2);
}

#[test]
fn update_detail_changes_only_display_name_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonAccountStore::open(dir.path().join("accounts.json")).unwrap();
    store.add(candidate("ana", "h1", "Ana"));
    store.set_state(0, AccountState::Online);

    let mut detail = AccountDetail::new("Ana B.", "coding");
    detail.account_id = 99;
    detail.state = AccountState::Offline;
    store.update_detail(0, &detail);

    let ana = store.find_by_id(0).unwrap();
    assert_eq!(ana.detail.display_name, "Ana B.");
    assert_eq!(ana.detail.status, "coding");
    assert_eq!(ana.detail.account_id, 0);
    assert_eq!(ana.detail.state, AccountState::Online);
    assert_eq!(ana.password_hash, "h1");
}

#[test]
fn update_password_hash_persists_new_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = JsonAccountStore::open(&path).unwrap();
    store.add(candidate("ana", "h1", "Ana"));

    store.update_password_hash(0, "h9");

    assert_eq!(store.find_by_id(0).unwrap().password_hash, "h9");
    assert_eq!(read_json(&path)[0]["passwordHash"], "h9");
}

#[test]
fn update_unknown_id_leaves_content_unchanged_but_still_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = JsonAccountStore::open(&path).unwrap();
    store.add(candidate("ana", "h1", "Ana"));
    let before = store.find_all();
    let saves_before = store.persist_status().saves;

    store.update_detail(42, &AccountDetail::new("Ghost", "boo"));
    store.update_password_hash(42, "h9");

    assert_eq!(store.find_all(), before);
    assert_eq!(store.persist_status().saves, saves_before + 2);
}

#[test]
fn update_unknown_id_skips_save_when_persist_on_miss_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let options = StoreOptions {
        persist_on_miss: false,
        ..StoreOptions::default()
    };
    let store = JsonAccountStore::open_with_options(&path, options).unwrap();

    store.update_detail(0, &AccountDetail::new("Ghost", "boo"));

    assert_eq!(store.persist_status().saves, 0);
    assert!(!path.exists());
}

#[test]
fn set_state_is_not_persisted_and_reports_miss() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = JsonAccountStore::open(&path).unwrap();
    store.add(candidate("ana", "h1", "Ana"));
    let saves = store.persist_status().saves;

    assert!(store.set_state(0, AccountState::Online));
    assert!(!store.set_state(3, AccountState::Online));

    assert_eq!(store.persist_status().saves, saves);
    assert_eq!(read_json(&path)[0]["detail"]["state"], "OFFLINE");
}

#[test]
fn persistence_failure_is_swallowed_and_reported_through_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = JsonAccountStore::open(&path).unwrap();
    store.add(candidate("ana", "h1", "Ana"));

    // A directory at the target path makes the rename fail.
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();
    fs::write(path.join("keep"), b"x").unwrap();

    let bob = store.add(candidate("bob", "h2", "Bob"));
    assert_eq!(bob.id, 1);
    assert_eq!(store.len(), 2);

    let status = store.persist_status();
    assert_eq!(status.saves, 1);
    assert_eq!(status.failures, 1);
    assert!(status.last_failure.unwrap().contains("cannot save store file"));

    let err = store.flush().unwrap_err();
    assert!(matches!(err, StoreError::Persist { .. }), "{err}");
    assert_eq!(store.persist_status().failures, 2);
}

#[test]
fn flush_writes_current_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = JsonAccountStore::open(&path).unwrap();
    store.add(candidate("ana", "h1", "Ana"));
    fs::remove_file(&path).unwrap();

    store.flush().unwrap();

    assert_eq!(read_json(&path).as_array().unwrap().len(), 1);
}

#[test]
fn deleting_the_file_between_runs_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    {
        let store = JsonAccountStore::open(&path).unwrap();
        store.add(candidate("ana", "h1", "Ana"));
    }
    fs::remove_file(&path).unwrap();

    let store = JsonAccountStore::open(&path).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.add(candidate("bob", "h2", "Bob")).id, 0);
}

#[test]
fn add_after_max_id_allocates_distinct_ids_without_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    fs::write(
        &path,
        br#"[{"id":4294967295,"username":"ana","passwordHash":"h1","detail":{"displayName":"Ana","status":""}}]"#,
    )
    .unwrap();

    let store = JsonAccountStore::open(&path).unwrap();
    let bob = store.add(candidate("bob", "h2", "Bob"));
    let cid = store.add(candidate("cid", "h3", "Cid"));

    assert_eq!(bob.id, 0);
    assert_eq!(cid.id, 1);
    let ids = store
        .find_all()
        .into_iter()
        .map(|account| account.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![u32::MAX, 0, 1]);

    let reopened = JsonAccountStore::open(&path).unwrap();
    assert_eq!(reopened.find_by_id(1).unwrap().username, "cid");
}

#[test]
fn directory_at_store_path_opens_empty_and_reports_failed_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    fs::create_dir(&path).unwrap();

    let store = JsonAccountStore::open(&path).unwrap();
    assert!(store.is_empty());

    let ana = store.add(candidate("ana", "h1", "Ana"));
    assert_eq!(ana.id, 0);
    assert_eq!(store.len(), 1);

    let status = store.persist_status();
    assert_eq!(status.saves, 0);
    assert_eq!(status.failures, 1);
    assert!(status.last_failure.is_some());
    assert!(path.is_dir());
}
