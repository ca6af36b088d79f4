// Tests for database functionality

use adlens_core::data::{Database, SCHEMA_VERSION, SessionStatus};
use adlens_scanner::{AdRecord, AdStore, Identifier, ScanError, Target, TargetKind};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn sample_ad(ad_id: &str, advertiser: &str) -> AdRecord {
    let mut ad = AdRecord::new(1_700_000_000_000);
    ad.id = Some(Identifier::new(ad_id));
    ad.title = Some(advertiser.to_string());
    ad.message = "Fresh bread every morning".to_string();
    ad.advertiser = Some(advertiser.to_string());
    ad.targets = vec![
        Target::new(TargetKind::Age),
        Target::with_segment(TargetKind::Region, "Ohio"),
    ];
    ad
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_exists_and_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));
    let db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));
    drop(db);

    Database::drop(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_schema_version_recorded() {
    let (_temp_dir, db) = create_test_db();
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let db = Database::new(&db_path).unwrap();
        db.insert_ads(&[sample_ad("1", "Bakery")]).unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    assert_eq!(db.get_ads_count().unwrap(), 1);
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
}

// ============================================================================
// Ad Tests
// ============================================================================

#[test]
fn test_insert_and_get_ads() {
    let (_temp_dir, db) = create_test_db();
    let ads = vec![sample_ad("1", "Bakery"), sample_ad("2", "Garage")];

    assert_eq!(db.insert_ads(&ads).unwrap(), 2);

    let stored = db.get_ads().unwrap();
    assert_eq!(stored, ads);
}

#[test]
fn test_ad_without_id_or_targets() {
    let (_temp_dir, db) = create_test_db();
    let mut ad = AdRecord::new(42);
    ad.message = "No disclosure".to_string();

    db.insert_ads(&[ad.clone()]).unwrap();

    let stored = db.get_ads().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], ad);
    assert!(!stored[0].has_targeting());
}

#[test]
fn test_clear_ads() {
    let (_temp_dir, db) = create_test_db();
    db.insert_ads(&[sample_ad("1", "Bakery"), sample_ad("2", "Garage")])
        .unwrap();

    assert_eq!(db.clear_ads().unwrap(), 2);
    assert_eq!(db.get_ads_count().unwrap(), 0);
    assert!(db.get_ads().unwrap().is_empty());
}

// ============================================================================
// Target Tests
// ============================================================================

#[test]
fn test_insert_and_get_targets() {
    let (_temp_dir, db) = create_test_db();
    let targets = vec![
        Target::with_segment(TargetKind::Interest, "Cycling"),
        Target::new(TargetKind::Website),
        Target::with_segment(TargetKind::EngagedWithContent, "Recipes"),
    ];

    db.insert_targets(&targets).unwrap();

    assert_eq!(db.get_targets().unwrap(), targets);
    assert_eq!(db.get_targets_count().unwrap(), 3);
}

#[test]
fn test_target_counts_by_kind() {
    let (_temp_dir, db) = create_test_db();
    db.insert_targets(&[
        Target::with_segment(TargetKind::Interest, "Cycling"),
        Target::with_segment(TargetKind::Interest, "Baking"),
        Target::new(TargetKind::Age),
    ])
    .unwrap();

    let counts = db.get_target_counts_by_kind().unwrap();
    assert_eq!(counts[0], ("Interest".to_string(), 2));
    assert_eq!(counts[1], ("Age".to_string(), 1));
}

#[test]
fn test_unknown_kind_reads_back_as_unknown() {
    let (_temp_dir, db) = create_test_db();
    db.get_connection()
        .execute(
            "INSERT INTO targets (kind, segment, stored_at) VALUES ('Horoscope', 'Leo', 0)",
            [],
        )
        .unwrap();

    let targets = db.get_targets().unwrap();
    assert_eq!(targets[0].kind, TargetKind::Unknown);
    assert_eq!(targets[0].segment.as_deref(), Some("Leo"));
}

#[test]
fn test_clear_targets() {
    let (_temp_dir, db) = create_test_db();
    db.insert_targets(&[Target::new(TargetKind::Age)]).unwrap();

    assert_eq!(db.clear_targets().unwrap(), 1);
    assert_eq!(db.get_targets_count().unwrap(), 0);
}

// ============================================================================
// Settings Tests
// ============================================================================

#[test]
fn test_monitor_enabled_by_default() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.monitor_enabled().unwrap());
}

#[test]
fn test_monitor_toggle() {
    let (_temp_dir, db) = create_test_db();

    db.set_monitor_enabled(false).unwrap();
    assert!(!db.monitor_enabled().unwrap());

    db.set_monitor_enabled(true).unwrap();
    assert!(db.monitor_enabled().unwrap());
}

#[test]
fn test_start_date_initialised_once() {
    let (_temp_dir, db) = create_test_db();
    assert_eq!(db.get_start_date().unwrap(), None);

    let first = db.init_start_date().unwrap();
    db.get_connection()
        .execute("UPDATE settings SET value = '1000' WHERE key = 'start_date'", [])
        .unwrap();

    assert_eq!(db.init_start_date().unwrap(), 1000);
    assert!(first > 1000);
}

#[test]
fn test_reset_start_date() {
    let (_temp_dir, db) = create_test_db();
    db.get_connection()
        .execute(
            "INSERT INTO settings (key, value) VALUES ('start_date', '1000')",
            [],
        )
        .unwrap();

    let reset = db.reset_start_date().unwrap();
    assert!(reset > 1000);
    assert_eq!(db.get_start_date().unwrap(), Some(reset));
}

// ============================================================================
// Session Tests
// ============================================================================

#[test]
fn test_session_lifecycle() {
    let (_temp_dir, db) = create_test_db();

    let session_id = db.create_session("feed.html").unwrap();
    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.source, "feed.html");
    assert!(session.end_time.is_none());

    db.complete_session(&session_id, 3).unwrap();
    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.ads_found, 3);
    assert!(session.end_time.is_some());
}

#[test]
fn test_fail_session() {
    let (_temp_dir, db) = create_test_db();

    let session_id = db.create_session("feed.html").unwrap();
    db.fail_session(&session_id).unwrap();

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
}

#[test]
fn test_missing_session() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.get_session("nope").unwrap().is_none());
}

#[test]
fn test_attached_session_tags_rows() {
    let (_temp_dir, mut db) = create_test_db();
    let session_id = db.create_session("feed.html").unwrap();

    db.attach_session(Some(session_id.clone()));
    db.insert_ads(&[sample_ad("1", "Bakery")]).unwrap();
    db.attach_session(None);
    db.insert_ads(&[sample_ad("2", "Garage")]).unwrap();

    let tagged: i64 = db
        .get_connection()
        .query_row(
            "SELECT COUNT(*) FROM ads WHERE session_id = ?1",
            [&session_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tagged, 1);
}

// ============================================================================
// AdStore Tests
// ============================================================================

#[test]
fn test_database_as_ad_store() {
    let (_temp_dir, mut db) = create_test_db();

    {
        let store: &mut dyn AdStore = &mut db;
        assert!(store.is_monitor_enabled().unwrap());
        store.store_ads(&[sample_ad("1", "Bakery")]).unwrap();
        store
            .store_targets(&[Target::with_segment(TargetKind::Region, "Ohio")])
            .unwrap();
    }

    assert_eq!(db.get_ads_count().unwrap(), 1);
    assert_eq!(db.get_targets_count().unwrap(), 1);

    db.set_monitor_enabled(false).unwrap();
    assert!(!AdStore::is_monitor_enabled(&db).unwrap());
}

#[test]
fn test_store_batch_is_all_or_nothing() {
    let (_temp_dir, mut db) = create_test_db();
    db.get_connection()
        .execute("DROP TABLE targets", [])
        .unwrap();

    let result = AdStore::store_batch(
        &mut db,
        &[sample_ad("1", "Bakery")],
        &[Target::with_segment(TargetKind::Region, "Ohio")],
    );

    assert!(matches!(result, Err(ScanError::Storage(_))));
    assert_eq!(db.get_ads_count().unwrap(), 0);
}

#[test]
fn test_insert_batch_writes_both_tables() {
    let (_temp_dir, db) = create_test_db();
    db.insert_batch(
        &[sample_ad("1", "Bakery"), sample_ad("2", "Florist")],
        &[Target::new(TargetKind::Like)],
    )
    .unwrap();

    assert_eq!(db.get_ads_count().unwrap(), 2);
    assert_eq!(db.get_targets_count().unwrap(), 1);
}
