use stageplan_engine::{
    shared::{
        AttributeSet, Catalog, Direction, EntityId, EntityKind, Position, PrototypeDef,
        StageIndex, WorldObjectRef,
    },
    ObjectSpec, Project, ProjectConfig, ReconcileOutcome,
};

use crate::TestWorld;

/// Prototypes used across the integration tests.
///
/// * `inserter` and `fast-inserter` share the `inserter` category
/// * `assembler` stands alone
/// * `underground-belt` and `fast-underground-belt` share `underground`, reach 5
/// * `pipe-to-ground` is an underground connector in its own `pipe` category
/// * `locomotive` is rolling stock
/// * `"filter_mode"` is an unstaged key
pub fn test_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    for def in [
        PrototypeDef::new("inserter").group("inserter"),
        PrototypeDef::new("fast-inserter").group("inserter"),
        PrototypeDef::new("assembler"),
        PrototypeDef::new("underground-belt")
            .group("underground")
            .underground(5),
        PrototypeDef::new("fast-underground-belt")
            .group("underground")
            .underground(5),
        PrototypeDef::new("pipe-to-ground")
            .group("pipe")
            .underground(10),
        PrototypeDef::new("locomotive").rolling_stock(),
    ] {
        catalog
            .register(def)
            .expect("test prototypes are unique");
    }
    catalog.add_unstaged_key("filter_mode");
    catalog
}

pub fn test_project(stage_count: StageIndex) -> Project<TestWorld> {
    let config = ProjectConfig {
        initial_stage_count: stage_count,
        ..ProjectConfig::default()
    };
    Project::new(test_catalog(), TestWorld::new(test_catalog()), config)
}

pub fn spec(value: AttributeSet, position: Position) -> ObjectSpec {
    ObjectSpec {
        position,
        direction: Direction::North,
        kind: EntityKind::Standard,
        value,
        unstaged: None,
    }
}

pub fn oriented_spec(
    value: AttributeSet,
    position: Position,
    direction: Direction,
    kind: EntityKind,
) -> ObjectSpec {
    ObjectSpec {
        position,
        direction,
        kind,
        value,
        unstaged: None,
    }
}

/// Places an object as a player and reports it to the project.
pub fn build(
    project: &mut Project<TestWorld>,
    stage: StageIndex,
    spec: ObjectSpec,
) -> (WorldObjectRef, ReconcileOutcome) {
    let object = project.world_mut().place(stage, spec);
    let outcome = project.on_object_created(object, stage, None);
    (object, outcome)
}

/// Like [`build`], for objects that must start a new entity.
pub fn build_new(project: &mut Project<TestWorld>, stage: StageIndex, spec: ObjectSpec) -> EntityId {
    match build(project, stage, spec).1 {
        ReconcileOutcome::Created(entity) => entity,
        other => panic!("Building at stage {} should create an entity, got {:?}", stage, other),
    }
}

/// The engine-made object of `entity` at `stage`.
pub fn object_of(project: &Project<TestWorld>, entity: EntityId, stage: StageIndex) -> WorldObjectRef {
    project
        .content()
        .registry()
        .slot(entity, stage)
        .and_then(|slot| slot.object())
        .unwrap_or_else(|| panic!("Entity {:?} has no object at stage {}", entity, stage))
}
