//! Relation cascades: deferred foreign keys, shared-child reference
//! counting, unlinking and the fan-in guard.

mod common;

use common::{RecordingDriver, handle, new_profile, new_user, session};
use unitwork_core::{EntitySchema, RelationSchema, Schema, Value};
use unitwork_session::{Session, Status};

#[test]
fn test_child_foreign_key_waits_for_parent_generated_key() {
    let driver = RecordingDriver::new("main");
    let session = session(driver.clone());

    let profile = new_profile("avatar.png");
    let user = new_user("ann@example.com", 100.0);
    user.borrow_mut().profile = Some(handle(&profile));

    let mut tx = session.transaction();
    tx.store(&handle(&user)).unwrap();
    tx.run().unwrap();

    assert_eq!(user.borrow().id, Some(1));
    assert_eq!(profile.borrow().id, Some(2));
    assert_eq!(profile.borrow().user_id, Some(1));
    assert_eq!(
        driver.row("profile", 2).unwrap().get("user_id"),
        Some(&Value::Int(1))
    );
    assert_eq!(
        driver.ops(),
        vec!["begin", "insert user", "insert profile", "commit"]
    );
}

#[test]
fn test_shared_child_survives_until_last_unlink() {
    let driver = RecordingDriver::new("main");
    let session = session(driver.clone());

    let shared = new_profile("avatar.png");
    let mut tx = session.transaction();
    tx.store(&handle(&shared)).unwrap();
    tx.run().unwrap();

    let ann = new_user("ann@example.com", 100.0);
    ann.borrow_mut().profile = Some(handle(&shared));
    let mut tx = session.transaction();
    tx.store(&handle(&ann)).unwrap();
    tx.run().unwrap();

    let bob = new_user("bob@example.com", 200.0);
    bob.borrow_mut().profile = Some(handle(&shared));
    let mut tx = session.transaction();
    tx.store(&handle(&bob)).unwrap();
    tx.run().unwrap();

    let state = session.heap().borrow().get(&handle(&shared)).unwrap();
    assert_eq!(state.ref_count(), 2);

    // First unlink: one reference remains, the row must survive.
    ann.borrow_mut().profile = None;
    let mut tx = session.transaction();
    tx.store(&handle(&ann)).unwrap();
    tx.run().unwrap();

    assert_eq!(driver.count_ops("delete profile"), 0);
    assert_eq!(driver.table_len("profile"), 1);
    assert_eq!(state.ref_count(), 1);
    // The skipped delete must not leave the survivor marked for deletion.
    assert_eq!(state.status(), Status::Loaded);

    // Last unlink: the shared child is actually deleted, exactly once.
    bob.borrow_mut().profile = None;
    let mut tx = session.transaction();
    tx.store(&handle(&bob)).unwrap();
    tx.run().unwrap();

    assert_eq!(driver.count_ops("delete profile"), 1);
    assert_eq!(driver.table_len("profile"), 0);
    assert!(session.heap().borrow().get(&handle(&shared)).is_none());
}

#[test]
fn test_replacing_child_deletes_the_previous_one() {
    let driver = RecordingDriver::new("main");
    let session = session(driver.clone());

    let first = new_profile("old.png");
    let user = new_user("ann@example.com", 100.0);
    user.borrow_mut().profile = Some(handle(&first));

    let mut tx = session.transaction();
    tx.store(&handle(&user)).unwrap();
    tx.run().unwrap();
    let first_id = first.borrow().id.unwrap();

    let second = new_profile("new.png");
    user.borrow_mut().profile = Some(handle(&second));

    let mut tx = session.transaction();
    tx.store(&handle(&user)).unwrap();
    tx.run().unwrap();

    assert!(driver.row("profile", first_id).is_none());
    let second_id = second.borrow().id.unwrap();
    assert_eq!(
        driver.row("profile", second_id).unwrap().get("user_id"),
        Some(&Value::Int(1))
    );
    assert!(session.heap().borrow().get(&handle(&first)).is_none());
    assert!(session.heap().borrow().get(&handle(&second)).is_some());
}

#[test]
fn test_linking_tracked_child_writes_only_the_foreign_key() {
    let driver = RecordingDriver::new("main");
    let session = session(driver.clone());

    let profile = new_profile("avatar.png");
    let mut tx = session.transaction();
    tx.store(&handle(&profile)).unwrap();
    tx.run().unwrap();

    let user = new_user("ann@example.com", 100.0);
    user.borrow_mut().profile = Some(handle(&profile));
    let mut tx = session.transaction();
    tx.store(&handle(&user)).unwrap();
    tx.run().unwrap();

    // The already-stored child is not inserted again.
    assert_eq!(driver.count_ops("insert profile"), 1);
    assert_eq!(driver.count_ops("update profile"), 1);
    assert_eq!(
        driver.row("profile", 1).unwrap().get("user_id"),
        Some(&Value::Int(2))
    );
}

#[test]
fn test_cascade_disabled_leaves_child_untouched() {
    let schema = Schema::new()
        .define(
            EntitySchema::new(
                "user",
                "default",
                "user",
                "id",
                vec!["id".into(), "email".into(), "balance".into()],
            )
            .relation(
                RelationSchema::has_one("profile", "profile", "id", "user_id").cascade(false),
            ),
        )
        .define(EntitySchema::new(
            "profile",
            "default",
            "profile",
            "id",
            vec!["id".into(), "user_id".into(), "image".into()],
        ));

    let driver = RecordingDriver::new("main");
    let session = Session::single(schema, driver.clone());

    let profile = new_profile("avatar.png");
    let user = new_user("ann@example.com", 100.0);
    user.borrow_mut().profile = Some(handle(&profile));

    let mut tx = session.transaction();
    tx.store(&handle(&user)).unwrap();
    tx.run().unwrap();

    assert_eq!(driver.count_ops("insert profile"), 0);
    assert!(session.heap().borrow().get(&handle(&profile)).is_none());
    assert!(session.heap().borrow().get(&handle(&user)).is_some());
}

#[test]
fn test_fan_in_guard_suppresses_redundant_relinks() {
    let schema = Schema::new()
        .define(
            EntitySchema::new(
                "user",
                "default",
                "user",
                "id",
                vec!["id".into(), "email".into(), "balance".into()],
            )
            .relation(
                RelationSchema::has_one("profile", "profile", "id", "user_id").fan_in(1),
            ),
        )
        .define(EntitySchema::new(
            "profile",
            "default",
            "profile",
            "id",
            vec!["id".into(), "user_id".into(), "image".into()],
        ));

    let driver = RecordingDriver::new("main");
    let session = Session::single(schema, driver.clone());

    let shared = new_profile("avatar.png");
    let mut tx = session.transaction();
    tx.store(&handle(&shared)).unwrap();
    tx.run().unwrap();

    let ann = new_user("ann@example.com", 100.0);
    ann.borrow_mut().profile = Some(handle(&shared));
    let mut tx = session.transaction();
    tx.store(&handle(&ann)).unwrap();
    tx.run().unwrap();

    // Second link exceeds the guard: the reference is counted but the
    // child is not re-persisted.
    let bob = new_user("bob@example.com", 200.0);
    bob.borrow_mut().profile = Some(handle(&shared));
    let mut tx = session.transaction();
    tx.store(&handle(&bob)).unwrap();
    tx.run().unwrap();

    assert_eq!(driver.count_ops("update profile"), 1);
    let state = session.heap().borrow().get(&handle(&shared)).unwrap();
    assert_eq!(state.ref_count(), 2);
}
