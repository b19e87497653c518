//! End-to-end store behavior for both record kinds against in-memory SQLite.

use roster_storage::connection::Database;
use roster_storage::models::{Staff, Subject};
use roster_storage::{
    CredentialSelector, DeleteMode, EntityStore, ListRequest, StaffStore, SubjectStore,
    Visibility,
};
use rstest::rstest;

fn staff(id: &str, email: &str, phone: &str) -> Staff {
    Staff {
        id: id.to_string(),
        first_name: "Sam".to_string(),
        last_name: "Lee".to_string(),
        phone_number: phone.to_string(),
        email: Some(email.to_string()),
        password: "initial".to_string(),
        refresh_token: "session".to_string(),
        role: "manager".to_string(),
        salary: 1500.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_subject_lifecycle_scenario() {
    let db = Database::in_memory().await.unwrap();
    let store = SubjectStore::new(db.pool().clone());

    let subject = Subject {
        id: "u1".to_string(),
        first_name: "A".to_string(),
        last_name: "B".to_string(),
        phone_number: "+1000".to_string(),
        ..Default::default()
    };
    store.create(&subject).await.unwrap();

    let found = store.get("id", "u1", Visibility::Live).await.unwrap();
    assert_eq!(found.phone_number, "+1000");
    assert!(found.updated_at.is_none());
    assert!(found.deleted_at.is_none());
    let created_at = found.created_at;

    let changed = Subject {
        gender: "male".to_string(),
        ..found
    };
    store.update(&changed).await.unwrap();
    let found = store.get("id", "u1", Visibility::Live).await.unwrap();
    assert_eq!(found.gender, "male");
    assert_eq!(found.phone_number, "+1000");
    assert_eq!(found.created_at, created_at);
    assert!(found.updated_at.is_some());

    assert!(store.delete("id", "u1", DeleteMode::Soft).await.unwrap());
    assert!(
        store
            .get("id", "u1", Visibility::Live)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        store
            .get("id", "u1", Visibility::All)
            .await
            .unwrap()
            .deleted_at
            .is_some()
    );
    assert!(!store.check_field("id", "u1").await.unwrap());

    db.close().await;
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(7)]
#[tokio::test]
async fn test_pages_cover_match_set_exactly_once(#[case] limit: i64) {
    let db = Database::in_memory().await.unwrap();
    let store = SubjectStore::new(db.pool().clone());

    for i in 0..7 {
        let subject = Subject {
            id: format!("u{i}"),
            // duplicate names so ordering relies on the id tiebreaker
            first_name: if i % 2 == 0 { "Ann" } else { "Bob" }.to_string(),
            phone_number: format!("+{i}"),
            ..Default::default()
        };
        store.create(&subject).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let req = ListRequest::new().page(page, limit).order_by("first_name");
        let records = store.list(&req).await.unwrap();
        if records.is_empty() {
            break;
        }
        assert!(records.iter().all(|r| r.count == 7));
        seen.extend(records.into_iter().map(|r| r.id));
        page += 1;
    }

    seen.sort();
    let mut expected: Vec<String> = (0..7).map(|i| format!("u{i}")).collect();
    expected.sort();
    assert_eq!(seen, expected);

    db.close().await;
}

#[tokio::test]
async fn test_list_without_pagination_returns_full_set() {
    let db = Database::in_memory().await.unwrap();
    let store = SubjectStore::new(db.pool().clone());

    for i in 0..4 {
        store
            .create(&Subject {
                id: format!("u{i}"),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let records = store.list(&ListRequest::new().page(0, 2)).await.unwrap();
    assert_eq!(records.len(), 4);

    db.close().await;
}

#[tokio::test]
async fn test_staff_update_whitelist() {
    let db = Database::in_memory().await.unwrap();
    let store = StaffStore::new(db.pool().clone());
    store
        .create(&staff("s1", "sam@example.com", "+10"))
        .await
        .unwrap();

    let mut changed = staff("s1", "other@example.com", "+99");
    changed.role = "owner".to_string();
    changed.salary = 2500.0;
    changed.work_years = 4;
    changed.biography = "Joined early".to_string();
    changed.password = "overwritten".to_string();
    changed.refresh_token = "overwritten".to_string();
    store.update(&changed).await.unwrap();

    let found = store.get("id", "s1", Visibility::Live).await.unwrap();
    assert_eq!(found.salary, 2500.0);
    assert_eq!(found.work_years, 4);
    assert_eq!(found.biography, "Joined early");
    assert_eq!(found.role, "manager");
    assert_eq!(found.email.as_deref(), Some("sam@example.com"));
    assert_eq!(found.phone_number, "+10");
    assert_eq!(found.password, "initial");
    assert_eq!(found.refresh_token, "session");

    db.close().await;
}

#[tokio::test]
async fn test_staff_prefix_search_on_folded_columns() {
    let db = Database::in_memory().await.unwrap();
    let store = StaffStore::new(db.pool().clone());

    let mut a = staff("s1", "ÉMILE@example.com", "+1");
    a.last_name = "Жуков".to_string();
    a.role = "Директор".to_string();
    store.create(&a).await.unwrap();
    store
        .create(&staff("s2", "sam@example.com", "+2"))
        .await
        .unwrap();

    for (field, prefix) in [("last_name", "жук"), ("role", "дИр"), ("email", "émile@")] {
        let records = store
            .list(&ListRequest::new().prefix(field, prefix))
            .await
            .unwrap();
        assert_eq!(records.len(), 1, "{field} {prefix}");
        assert_eq!(records[0].id, "s1");
        assert_eq!(records[0].count, 1);
    }

    db.close().await;
}

#[rstest]
#[case(CredentialSelector::by_email("sam@example.com"))]
#[case(CredentialSelector::by_phone("+10"))]
#[case(CredentialSelector::by_phone("+404").with_email("sam@example.com"))]
#[tokio::test]
async fn test_staff_credential_selectors(#[case] selector: CredentialSelector) {
    let db = Database::in_memory().await.unwrap();
    let store = StaffStore::new(db.pool().clone());
    store
        .create(&staff("s1", "sam@example.com", "+10"))
        .await
        .unwrap();

    assert!(store.change_credential(&selector, "rotated").await.unwrap());

    let found = store.get("id", "s1", Visibility::Live).await.unwrap();
    assert_eq!(found.password, "rotated");
    assert!(found.updated_at.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_staff_credential_skips_retired_rows() {
    let db = Database::in_memory().await.unwrap();
    let store = StaffStore::new(db.pool().clone());
    store
        .create(&staff("s1", "sam@example.com", "+10"))
        .await
        .unwrap();
    store.delete("id", "s1", DeleteMode::Soft).await.unwrap();

    let changed = store
        .change_credential(&CredentialSelector::by_email("sam@example.com"), "x")
        .await
        .unwrap();
    assert!(!changed);

    let found = store.get("id", "s1", Visibility::All).await.unwrap();
    assert_eq!(found.password, "initial");

    db.close().await;
}

#[tokio::test]
async fn test_delete_by_non_id_field_affects_all_matches() {
    let db = Database::in_memory().await.unwrap();
    let store = StaffStore::new(db.pool().clone());
    let mut a = staff("s1", "a@example.com", "+1");
    let mut b = staff("s2", "b@example.com", "+2");
    a.role = "temp".to_string();
    b.role = "temp".to_string();
    store.create(&a).await.unwrap();
    store.create(&b).await.unwrap();
    store
        .create(&staff("s3", "c@example.com", "+3"))
        .await
        .unwrap();

    assert!(store.delete("role", "temp", DeleteMode::Soft).await.unwrap());

    let live = store.list(&ListRequest::new()).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, "s3");

    db.close().await;
}

#[tokio::test]
async fn test_kinds_are_isolated() {
    let db = Database::in_memory().await.unwrap();
    let subjects = SubjectStore::new(db.pool().clone());
    let staff_store = StaffStore::new(db.pool().clone());

    subjects
        .create(&Subject {
            id: "x1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    staff_store
        .create(&staff("x1", "x@example.com", "+1"))
        .await
        .unwrap();

    assert!(subjects.check_field("id", "x1").await.unwrap());
    assert!(staff_store.check_field("id", "x1").await.unwrap());
    assert!(subjects.delete("id", "x1", DeleteMode::Hard).await.unwrap());
    assert!(staff_store.check_field("id", "x1").await.unwrap());

    db.close().await;
}
