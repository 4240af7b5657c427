/// Integration tests for world notifications flowing into a Project
/// These tests drive a TestWorld the way a player would and check that the
/// staged model and every stage's world objects end up consistent

use stageplan_engine::{
    shared::{attributes, AttributeValue, EntityId, Position},
    NotificationKind, Project, ReconcileOutcome,
};
use stageplan_test::{
    assert_absent, assert_live, assert_preview, build, build_new, object_of, spec, test_project,
    TestWorld,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn origin() -> Position {
    Position::new(0, 0)
}

fn live_value(project: &Project<TestWorld>, entity: EntityId, stage: u32, key: &str) -> Option<AttributeValue> {
    let object = assert_live!(project, entity, stage);
    project
        .world()
        .object(object)
        .and_then(|found| found.spec.value.get(key).cloned())
}

/// Test that building an object creates an entity live in every later stage
#[test]
fn building_materializes_later_stages() {
    init_logger();
    let mut project = test_project(3);

    let entity = build_new(&mut project, 2, spec(attributes! { "name" => "inserter" }, origin()));

    assert_preview!(project, entity, 1);
    assert_live!(project, entity, 2);
    assert_live!(project, entity, 3);
    assert_eq!(project.world().object_count(), 3, "One preview and two live objects expected");
    assert_eq!(project.content().entity(entity).map(|e| e.first_stage()), Some(2));
}

/// Test that objects of unregistered prototypes are left alone
#[test]
fn unknown_prototype_is_ignored() {
    init_logger();
    let mut project = test_project(3);

    let (_, outcome) = build(&mut project, 1, spec(attributes! { "name" => "pipe" }, origin()));

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert!(project.content().is_empty(), "No entity should be created for an unknown prototype");
}

/// Test that an edit at the first stage reaches every later stage
#[test]
fn update_at_first_stage_propagates() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 1);
    project.world_mut().edit(object, "override", 5);
    let outcome = project.on_object_updated(object, 1, None);

    assert_eq!(outcome, ReconcileOutcome::Updated { entity, changed: true });
    for stage in 1..=3 {
        assert_eq!(
            live_value(&project, entity, stage, "override"),
            Some(AttributeValue::Int(5)),
            "Stage {} should show the edited value",
            stage
        );
    }
    assert!(
        !project.content().entity(entity).unwrap().has_stage_diffs(),
        "An edit at the first stage changes the base value only"
    );
}

/// Test that an edit at a later stage becomes a stage diff and leaves earlier stages alone
#[test]
fn update_at_later_stage_records_diff() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(
        &mut project,
        1,
        spec(attributes! { "name" => "inserter", "override" => 1 }, origin()),
    );

    let object = object_of(&project, entity, 2);
    project.world_mut().edit(object, "override", 7);
    project.on_object_updated(object, 2, None);

    let staged = project.content().entity(entity).unwrap();
    assert_eq!(
        staged.diff_at(2).and_then(|d| d.get("override")).and_then(|v| v.value()),
        Some(&AttributeValue::Int(7))
    );
    assert_eq!(live_value(&project, entity, 1, "override"), Some(AttributeValue::Int(1)));
    assert_eq!(live_value(&project, entity, 3, "override"), Some(AttributeValue::Int(7)));
}

/// Test that an update reporting the current value changes nothing
#[test]
fn unchanged_update_is_a_no_op() {
    init_logger();
    let mut project = test_project(2);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));
    project.world_mut().reset_counters();

    let object = object_of(&project, entity, 1);
    let outcome = project.on_object_updated(object, 1, None);

    assert_eq!(outcome, ReconcileOutcome::Updated { entity, changed: false });
    assert_eq!(project.world().sync_count(2), 0, "Nothing should be pushed to stage 2");
}

/// Test that changes made to a removed higher-stage copy are kept in the stage diff
#[test]
fn deletion_above_first_stage_keeps_copy_changes() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(
        &mut project,
        1,
        spec(attributes! { "name" => "inserter", "override" => 1 }, origin()),
    );

    let object = object_of(&project, entity, 2);
    project.world_mut().edit(object, "override", 7);
    let outcome = project.on_object_deleted(object, 2, None);

    assert_eq!(outcome, ReconcileOutcome::DeletionForbidden(entity));
    let staged = project.content().entity(entity).unwrap();
    assert_eq!(
        staged.diff_at(2).and_then(|d| d.get("override")).and_then(|v| v.value()),
        Some(&AttributeValue::Int(7)),
        "The lost copy's edit should become the stage 2 diff"
    );
    let restored = assert_live!(project, entity, 2);
    assert_ne!(restored, object, "A new object should stand in for the removed one");
    assert_eq!(live_value(&project, entity, 1, "override"), Some(AttributeValue::Int(1)));
    assert_eq!(live_value(&project, entity, 2, "override"), Some(AttributeValue::Int(7)));
    assert_eq!(live_value(&project, entity, 3, "override"), Some(AttributeValue::Int(7)));
}

/// Test that removing a higher-stage copy is reverted with a notification
#[test]
fn deletion_above_first_stage_is_forbidden() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 2);
    project.world_mut().remove(object);
    let outcome = project.on_object_deleted(object, 2, None);

    assert_eq!(outcome, ReconcileOutcome::DeletionForbidden(entity));
    let restored = assert_live!(project, entity, 2);
    assert_ne!(restored, object, "A new object should stand in for the removed one");
    let notifications = project.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::DeletionForbidden);
    assert_eq!(notifications[0].stage, 2);
}

/// Test that deleting an entity without history at its first stage removes it everywhere
#[test]
fn deletion_at_first_stage_removes_entity() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 1);
    project.world_mut().remove(object);
    let outcome = project.on_object_deleted(object, 1, None);

    assert_eq!(outcome, ReconcileOutcome::Deleted(entity));
    assert!(project.content().entity(entity).is_none());
    assert_eq!(project.world().object_count(), 0, "Every copy should be gone from the world");
}

/// Test that deleting an entity with stage diffs keeps it as a settings remnant
#[test]
fn deletion_with_diffs_leaves_settings_remnant() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));
    let object = object_of(&project, entity, 2);
    project.world_mut().edit(object, "override", 2);
    project.on_object_updated(object, 2, None);

    let first = object_of(&project, entity, 1);
    project.world_mut().remove(first);
    let outcome = project.on_object_deleted(first, 1, None);

    assert_eq!(outcome, ReconcileOutcome::MadeSettingsRemnant(entity));
    assert!(project.content().entity(entity).unwrap().is_settings_remnant());
    for stage in 1..=3 {
        assert_preview!(project, entity, stage);
    }
}

/// Test that building the same prototype where the entity already stands adopts the object
#[test]
fn overbuilding_adopts_object() {
    init_logger();
    let mut project = test_project(2);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 2);
    project.world_mut().remove(object);
    let (rebuilt, outcome) = build(&mut project, 2, spec(attributes! { "name" => "inserter" }, origin()));

    assert_eq!(outcome, ReconcileOutcome::Overbuilt(entity));
    assert_eq!(assert_live!(project, entity, 2), rebuilt);
    assert_eq!(project.content().len(), 1);
}

/// Test that overbuilding with a compatible prototype upgrades from that stage on
#[test]
fn overbuilding_with_compatible_prototype_upgrades() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 2);
    project.world_mut().remove(object);
    let (_, outcome) = build(&mut project, 2, spec(attributes! { "name" => "fast-inserter" }, origin()));

    assert_eq!(outcome, ReconcileOutcome::Upgraded(entity));
    let staged = project.content().entity(entity).unwrap();
    assert_eq!(staged.name_at(1), "inserter");
    assert_eq!(staged.name_at(2), "fast-inserter");
    assert_eq!(
        live_value(&project, entity, 3, "name"),
        Some(AttributeValue::from("fast-inserter"))
    );
}

/// Test that an incompatible name change from the world is refused
#[test]
fn incompatible_rename_is_rejected() {
    init_logger();
    let mut project = test_project(2);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 1);
    project.world_mut().edit(object, "name", "assembler");
    project.on_object_updated(object, 1, None);

    assert_eq!(project.content().entity(entity).unwrap().name(), "inserter");
    let notifications = project.take_notifications();
    assert!(
        notifications
            .iter()
            .any(|n| matches!(n.kind, NotificationKind::UpgradeRejected(_))),
        "An upgrade rejection should be reported"
    );
    assert_eq!(live_value(&project, entity, 1, "name"), Some(AttributeValue::from("inserter")));
}

/// Test that explicit upgrades apply from the marked stage onward
#[test]
fn marked_upgrade_applies_from_stage() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let object = object_of(&project, entity, 2);
    let outcome = project.on_object_marked_for_upgrade(object, 2, "fast-inserter", None);

    assert_eq!(outcome, ReconcileOutcome::Upgraded(entity));
    assert_eq!(live_value(&project, entity, 1, "name"), Some(AttributeValue::from("inserter")));
    assert_eq!(
        live_value(&project, entity, 2, "name"),
        Some(AttributeValue::from("fast-inserter"))
    );

    let rejected = project.on_object_marked_for_upgrade(object_of(&project, entity, 1), 1, "assembler", None);
    assert_eq!(rejected, ReconcileOutcome::UpgradeRejected(entity));
}

/// Test that world notifications are ignored while updates are blocked
#[test]
fn blocked_updates_are_ignored() {
    init_logger();
    let mut project = test_project(2);
    project.set_world_updates_blocked(true);

    let (_, outcome) = build(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert!(project.content().is_empty());
}

/// Test that the user can move an entity's first stage and the world follows
#[test]
fn moving_first_stage_updates_world() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let previous = project.move_entity_to_stage(entity, 2).expect("move up is allowed");

    assert_eq!(previous, 1);
    assert_preview!(project, entity, 1);
    assert_live!(project, entity, 2);

    project.move_entity_to_stage(entity, 1).expect("move back is allowed");
    assert_live!(project, entity, 1);
}

/// Test that a last stage removes the entity from the stages after it
#[test]
fn last_stage_removes_later_copies() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, origin()));

    let previous = project.set_entity_last_stage(entity, Some(2)).expect("last stage is valid");

    assert_eq!(previous, None);
    assert_live!(project, entity, 2);
    assert_absent!(project, entity, 3);

    project.set_entity_last_stage(entity, None).expect("clearing is valid");
    assert_live!(project, entity, 3);
}

/// Test that resetting a stage drops its diff and restores the inherited value
#[test]
fn reset_stage_restores_inherited_value() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(
        &mut project,
        1,
        spec(attributes! { "name" => "inserter", "override" => 1 }, origin()),
    );
    let object = object_of(&project, entity, 2);
    project.world_mut().edit(object, "override", 2);
    project.on_object_updated(object, 2, None);

    assert_eq!(project.reset_stage(entity, 2), Ok(true));

    assert_eq!(live_value(&project, entity, 2, "override"), Some(AttributeValue::Int(1)));
    assert_eq!(live_value(&project, entity, 3, "override"), Some(AttributeValue::Int(1)));
}

/// Test that moving a diff down applies it from the earlier stage on
#[test]
fn move_value_down_applies_earlier() {
    init_logger();
    let mut project = test_project(3);
    let entity = build_new(
        &mut project,
        1,
        spec(attributes! { "name" => "inserter", "override" => 1 }, origin()),
    );
    let object = object_of(&project, entity, 3);
    project.world_mut().edit(object, "override", 3);
    project.on_object_updated(object, 3, None);

    assert_eq!(project.move_value_down(entity, 3), Ok(Some(1)));

    for stage in 1..=3 {
        assert_eq!(live_value(&project, entity, stage, "override"), Some(AttributeValue::Int(3)));
    }
}
