use dbo_core::{Compound, DboError, KeySource, INSERTED_RECORD_KEY};
use dbo_schema::{Record, Value};
use dbo_test_utils::{settings, setup_facade, FakeScreen};
use std::sync::Arc;

const LOCATOR: &str = "id=person-row@data-key";

fn screen(key: &str) -> Arc<FakeScreen> {
    Arc::new(FakeScreen::new().with(LOCATOR, key))
}

fn compound(h: &dbo_test_utils::Harness, sync: bool) -> Compound {
    let mut compound = Compound::new(Record::new().with("name", "Ann"), Arc::clone(&h.person));
    compound.sync = sync;
    compound
}

#[tokio::test]
async fn test_narrowing_stores_captured_key_verbatim() {
    for sync in [true, false] {
        let h = setup_facade(settings(Some("alpha"), false));
        let outcome = h
            .facade
            .insert_record_capture_key(
                KeySource::locator(LOCATOR).unwrap(),
                compound(&h, sync),
                screen("42"),
            )
            .await
            .await
            .unwrap();

        assert_eq!(outcome.record.get("id"), Some(&Value::from("42")));
        let stored = &h.store.rows("person")[0];
        assert_eq!(stored.get("id"), Some(&Value::from("42")));
        assert_eq!(stored.get("instance"), Some(&Value::from("alpha")));
    }
}

#[tokio::test]
async fn test_string_normalized_match_succeeds() {
    // no narrowing: the store generates 1, the screen shows "1"
    for sync in [true, false] {
        let h = setup_facade(settings(None, false));
        let outcome = h
            .facade
            .insert_record_capture_key(
                KeySource::locator(LOCATOR).unwrap(),
                compound(&h, sync),
                screen("1"),
            )
            .await
            .await
            .unwrap();
        assert_eq!(outcome.generated_key, Some(Value::Integer(1)));
        assert_eq!(
            h.facade.variables().value(INSERTED_RECORD_KEY),
            Some(Value::Integer(1))
        );
    }
}

#[tokio::test]
async fn test_mismatch_reports_both_values() {
    for (narrow_by, always) in [(None, false), (Some("alpha"), true)] {
        let h = setup_facade(settings(narrow_by, always));
        h.seed_people((0..42).map(|i| Record::new().with("name", format!("p{i}"))))
            .await;

        // store generates 43, screen shows "42"
        let err = h
            .facade
            .insert_record_capture_key(
                KeySource::locator(LOCATOR).unwrap(),
                compound(&h, true),
                screen("42"),
            )
            .await
            .await
            .unwrap_err();
        match &err {
            DboError::KeyReconciliation {
                captured,
                generated,
                ..
            } => {
                assert_eq!(captured, &Value::from("42"));
                assert_eq!(generated, &Value::Integer(43));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_post_write());
        assert_eq!(h.store.rows("person").len(), 43);
    }
}

#[tokio::test]
async fn test_extractor_source() {
    let h = setup_facade(settings(None, false));
    let source = KeySource::extractor(|_ctx| Ok(Value::Integer(1)));
    let outcome = h
        .facade
        .insert_record_capture_key(source, compound(&h, false), Arc::new(FakeScreen::new()))
        .await
        .await
        .unwrap();
    assert_eq!(outcome.record.get("id"), Some(&Value::Integer(1)));
}

#[tokio::test]
async fn test_table_without_narrow_column_unsupported() {
    for (narrow_by, always) in [(None, false), (Some("alpha"), false), (Some("alpha"), true)] {
        let h = setup_facade(settings(narrow_by, always));
        let screen = screen("1");
        let err = h
            .facade
            .insert_record_capture_key(
                KeySource::locator(LOCATOR).unwrap(),
                Compound::new(Record::new().with("body", "x"), Arc::clone(&h.note)).sync(),
                Arc::clone(&screen) as Arc<dyn dbo_core::AutomationContext>,
            )
            .await
            .await
            .unwrap_err();
        assert!(matches!(err, DboError::UnsupportedOperation(_)));
        assert_eq!(h.store.calls(), 0);
        assert!(screen.reads().is_empty());
    }
}

#[tokio::test]
async fn test_composite_key_unsupported() {
    let h = setup_facade(settings(Some("alpha"), false));
    let err = h
        .facade
        .insert_record_capture_key(
            KeySource::locator(LOCATOR).unwrap(),
            Compound::new(Record::new().with("club_id", 1), Arc::clone(&h.membership)),
            screen("1"),
        )
        .await
        .await
        .unwrap_err();
    assert!(matches!(err, DboError::UnsupportedOperation(_)));
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_preset_key_is_duplicate_assignment() {
    let h = setup_facade(settings(Some("alpha"), false));
    let err = h
        .facade
        .insert_record_capture_key(
            KeySource::locator(LOCATOR).unwrap(),
            Compound::new(Record::new().with("id", 5), Arc::clone(&h.person)),
            screen("5"),
        )
        .await
        .await
        .unwrap_err();
    assert!(matches!(err, DboError::DuplicateKeyAssignment { .. }));
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_missing_element_is_automation_error() {
    let h = setup_facade(settings(Some("alpha"), false));
    let err = h
        .facade
        .insert_record_capture_key(
            KeySource::locator("id=elsewhere@data-key").unwrap(),
            compound(&h, true),
            screen("1"),
        )
        .await
        .await
        .unwrap_err();
    assert!(matches!(err, DboError::Automation(_)));
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_largest_captured_key_is_stored() {
    for sync in [true, false] {
        let h = setup_facade(settings(Some("alpha"), false));
        let key = i64::MAX.to_string();
        let outcome = h
            .facade
            .insert_record_capture_key(
                KeySource::locator(LOCATOR).unwrap(),
                compound(&h, sync),
                screen(&key),
            )
            .await
            .await
            .unwrap();
        assert_eq!(outcome.record.get("id"), Some(&Value::from(key.as_str())));

        let err = h
            .facade
            .insert_record(Record::new().with("name", "Bob"), Arc::clone(&h.person), sync)
            .await
            .await
            .unwrap_err();
        assert!(matches!(err, DboError::Storage(dbo_core::StorageError::Constraint(_))));
    }
}
