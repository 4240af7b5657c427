/// Integration tests for objects the world refuses to place
/// A refused placement leaves a placeholder, errors at most once per add,
/// and is retried by cleanup and rebuilds

use stageplan_engine::{
    shared::{attributes, Position, WorldSlot},
    NotificationKind,
};
use stageplan_test::{assert_live, build_new, object_of, spec, test_project};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn position() -> Position {
    Position::new(5, 5)
}

/// Test that one failed placement marks the rest of the add as errored with one notification
#[test]
fn failed_placement_marks_later_stages() {
    init_logger();
    let mut project = test_project(4);
    project.world_mut().block(3, position());

    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, position()));

    assert_live!(project, entity, 2);
    assert!(project.has_error_at(entity, 3), "The blocked stage should be errored");
    assert!(project.has_error_at(entity, 4), "Stages after a failed add are errored too");
    let failures = project
        .take_notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::PlacementFailed)
        .count();
    assert_eq!(failures, 1, "Only the first failure should be reported");

    let placeholder = project.content().registry().slot(entity, 3);
    assert!(
        matches!(placeholder, Some(WorldSlot::Errored { placeholder: Some(_) })),
        "A placeholder should stand in, got {:?}",
        placeholder
    );
}

/// Test that cleanup retries every errored slot and clears those that now fit
#[test]
fn cleanup_clears_errors_when_unblocked() {
    init_logger();
    let mut project = test_project(4);
    project.world_mut().block(3, position());
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, position()));

    assert_eq!(project.cleanup_errors(), 1, "Only the stage after the blocked one can be placed");
    assert!(project.has_error_at(entity, 3));
    assert_live!(project, entity, 4);

    project.world_mut().unblock(3, position());
    assert_eq!(project.cleanup_errors(), 1);
    assert!(!project.has_error_at(entity, 3));
    assert_live!(project, entity, 3);
    assert!(project.content().registry().errored_slots().is_empty());
}

/// Test that a normal refresh leaves errored slots alone
#[test]
fn refresh_does_not_retry_errored_slots() {
    init_logger();
    let mut project = test_project(3);
    project.world_mut().block(2, position());
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, position()));
    project.world_mut().unblock(2, position());

    let object = object_of(&project, entity, 1);
    project.world_mut().edit(object, "override", 4);
    project.on_object_updated(object, 1, None);

    assert!(project.has_error_at(entity, 2), "Only cleanup or a rebuild retries placement");
}

/// Test that rebuilding a stage retries placement and replaces stray objects
#[test]
fn rebuild_retries_and_replaces() {
    init_logger();
    let mut project = test_project(3);
    project.world_mut().block(2, position());
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, position()));
    project.world_mut().unblock(2, position());

    project.rebuild(entity, 2);

    let object = assert_live!(project, entity, 2);
    project.rebuild(entity, 2);
    let rebuilt = assert_live!(project, entity, 2);
    assert_ne!(object, rebuilt, "A rebuild replaces the object");
    assert_eq!(project.world().object_count(), 3);
}
