use stageplan_engine::{
    shared::{attributes, EntityId, Position, StageError},
    NotificationKind, ReconcileOutcome, RotationError, TaskError, UpgradeError,
};
use stageplan_test::{build_new, object_of, spec, test_project};

#[test]
fn test_rotation_error_display() {
    let error = RotationError::NotFirstStage {
        stage: 3,
        first_stage: 1,
    };
    assert_eq!(
        error.to_string(),
        "Entities can only be rotated in their first stage (1), not stage 3"
    );

    let error = RotationError::Occupied {
        stage: 2,
        other: EntityId::from_u64(7),
    };
    assert!(error.to_string().starts_with("Rotation collides with entity"));
}

#[test]
fn test_upgrade_error_display() {
    let error = UpgradeError::IncompatibleCategory {
        from: "inserter".to_string(),
        to: "assembler".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Cannot upgrade inserter to assembler: they are not in the same category"
    );

    let error = UpgradeError::UnknownPrototype {
        name: "pipe".to_string(),
    };
    assert_eq!(error.to_string(), "Prototype pipe is not registered");
}

#[test]
fn test_task_error_display() {
    let error = TaskError::AlreadyRunning {
        running: "Resync project".to_string(),
    };
    assert_eq!(error.to_string(), "Task \"Resync project\" is still running");
}

#[test]
fn test_rotation_above_first_stage_is_reverted() {
    let mut project = test_project(3);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));

    let object = object_of(&project, entity, 2);
    project.world_mut().rotate(object);
    let outcome = project.on_object_rotated(object, 2, None);

    assert_eq!(outcome, ReconcileOutcome::RotationForbidden(entity));
    let notifications = project.take_notifications();
    assert_eq!(
        notifications[0].kind,
        NotificationKind::RotationForbidden(RotationError::NotFirstStage {
            stage: 2,
            first_stage: 1
        })
    );
    let restored = project.world().object(object_of(&project, entity, 2)).unwrap();
    assert_eq!(
        restored.spec.direction,
        project.content().entity(entity).unwrap().direction(),
        "The world object should be turned back"
    );
}

#[test]
fn test_unknown_upgrade_target() {
    let mut project = test_project(2);
    let entity = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));

    let result = project.upgrade_entity(entity, 1, "pipe", None);

    assert_eq!(
        result,
        Err(UpgradeError::UnknownPrototype {
            name: "pipe".to_string()
        })
    );
    assert_eq!(project.upgrade_entity(entity, 1, "inserter", None), Ok(false));
}

#[test]
fn test_upgrade_outside_entity_range() {
    let mut project = test_project(4);
    let entity = build_new(&mut project, 3, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));

    let result = project.upgrade_entity(entity, 1, "fast-inserter", None);

    assert_eq!(
        result,
        Err(UpgradeError::Stage(StageError::OutOfRange {
            stage: 1,
            first_stage: 3,
            last_stage: None,
        }))
    );
    let entity = project.content().entity(entity).unwrap();
    assert_eq!(entity.name_at(3), "inserter", "The entity should keep its name");
}

#[test]
fn test_move_untracked_object() {
    let mut project = test_project(2);
    let object = project
        .world_mut()
        .place(1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));

    let result = project.move_object_to_stage(object, 2);

    assert_eq!(
        result,
        Err(stageplan_engine::shared::StageMoveError::UntrackedObject)
    );
}
