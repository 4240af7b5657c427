/// Integration tests for undo records produced by player actions
/// Records are only kept for actions with a player, and undoing a record
/// yields the record that redoes it

use stageplan_engine::{
    shared::{attributes, AttributeValue, Direction, EntityId, PlayerId, Position},
    Project, ReconcileOutcome, UndoHandler,
};
use stageplan_test::{assert_live, object_of, spec, test_project, TestWorld};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const PLAYER: PlayerId = PlayerId(1);

fn build_as_player(project: &mut Project<TestWorld>) -> EntityId {
    let object = project
        .world_mut()
        .place(1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));
    match project.on_object_created(object, 1, Some(PLAYER)) {
        ReconcileOutcome::Created(entity) => entity,
        other => panic!("Expected a new entity, got {:?}", other),
    }
}

/// Test that actions without a player leave no undo record
#[test]
fn anonymous_actions_are_not_recorded() {
    init_logger();
    let mut project = test_project(2);
    let object = project
        .world_mut()
        .place(1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));
    project.on_object_created(object, 1, None);

    assert!(project.take_undo_records().is_empty());
}

/// Test that undoing a build deletes the entity and redoing it brings it back
#[test]
fn undo_and_redo_build() {
    init_logger();
    let mut project = test_project(3);
    build_as_player(&mut project);

    let mut records = project.take_undo_records();
    assert_eq!(records.len(), 1);
    let record = records.remove(0);
    assert_eq!(record.handler, UndoHandler::DeleteEntity);
    assert_eq!(record.player, PLAYER);

    let redo = project.undo(record).expect("the entity exists");
    assert!(project.content().is_empty(), "Undo should delete the entity");
    assert_eq!(project.world().object_count(), 0);
    assert_eq!(redo.handler, UndoHandler::RestoreEntity);

    let again = project.redo(redo).expect("the entity can be restored");
    assert_eq!(again.handler, UndoHandler::DeleteEntity);
    let (restored, _) = project.content().entities().next().expect("one entity restored");
    for stage in 1..=3 {
        assert_live!(project, restored, stage);
    }
}

/// Test that undoing an attribute edit restores the previous value everywhere
#[test]
fn undo_attribute_edit() {
    init_logger();
    let mut project = test_project(2);
    let entity = build_as_player(&mut project);
    project.take_undo_records();

    let object = object_of(&project, entity, 1);
    project.world_mut().edit(object, "override", 5);
    project.on_object_updated(object, 1, Some(PLAYER));

    let record = project.take_undo_records().pop().expect("the edit is recorded");
    assert_eq!(record.handler, UndoHandler::RestoreStagedData);

    let redo = project.undo(record).expect("staged data is replaced");
    for stage in 1..=2 {
        let object = assert_live!(project, entity, stage);
        assert_eq!(
            project.world().object(object).and_then(|o| o.spec.value.get("override")),
            None,
            "Stage {} should lose the edit",
            stage
        );
    }

    project.redo(redo).expect("staged data is replaced again");
    let object = assert_live!(project, entity, 2);
    assert_eq!(
        project.world().object(object).and_then(|o| o.spec.value.get("override").cloned()),
        Some(AttributeValue::Int(5))
    );
}

/// Test that undoing a rotation turns the entity back
#[test]
fn undo_rotation() {
    init_logger();
    let mut project = test_project(2);
    let entity = build_as_player(&mut project);
    project.take_undo_records();

    let object = object_of(&project, entity, 1);
    project.world_mut().rotate(object);
    assert_eq!(project.on_object_rotated(object, 1, Some(PLAYER)), ReconcileOutcome::Rotated(entity));
    assert_eq!(project.content().entity(entity).unwrap().direction(), Direction::East);

    let record = project.take_undo_records().pop().expect("the rotation is recorded");
    assert_eq!(record.handler, UndoHandler::RotateEntity);
    project.undo(record).expect("the rotation can be undone");

    assert_eq!(project.content().entity(entity).unwrap().direction(), Direction::North);
    let object = assert_live!(project, entity, 2);
    assert_eq!(
        project.world().object(object).map(|o| o.spec.direction),
        Some(Direction::North)
    );
}

/// Test that undoing a deletion puts the entity back in the world
#[test]
fn undo_deletion() {
    init_logger();
    let mut project = test_project(2);
    let entity = build_as_player(&mut project);
    project.take_undo_records();

    let object = object_of(&project, entity, 1);
    project.world_mut().remove(object);
    assert_eq!(project.on_object_deleted(object, 1, Some(PLAYER)), ReconcileOutcome::Deleted(entity));

    let record = project.take_undo_records().pop().expect("the deletion is recorded");
    assert_eq!(record.handler, UndoHandler::RestoreEntity);
    project.undo(record).expect("the entity can be restored");

    assert_eq!(project.content().len(), 1);
    assert_eq!(project.world().object_count(), 2);
}
