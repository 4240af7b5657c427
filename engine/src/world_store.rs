use stageplan_shared::{
    name_of, AttributeSet, Direction, EntityKind, Position, ShapeSignature, StageIndex,
    WorldObjectRef,
};

/// Everything the world needs to build or correct one object.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectSpec {
    pub position: Position,
    pub direction: Direction,
    pub kind: EntityKind,
    /// Staged attributes, including `"name"`.
    pub value: AttributeSet,
    /// Attributes tracked per stage but never diffed.
    pub unstaged: Option<AttributeSet>,
}

impl ObjectSpec {
    pub fn name(&self) -> Option<&str> {
        name_of(&self.value)
    }
}

/// The live world the engine materializes staged entities into. One surface per stage.
pub trait WorldStore {
    /// Builds an object. `None` means the space is occupied or placement was refused.
    fn create_object(&mut self, stage: StageIndex, spec: &ObjectSpec) -> Option<WorldObjectRef>;

    /// Pushes `spec` onto an existing object. Returns `false` if the object cannot take it
    /// in place (a type change), in which case the engine rebuilds it.
    fn update_object(&mut self, object: WorldObjectRef, spec: &ObjectSpec) -> bool;

    fn destroy_object(&mut self, object: WorldObjectRef);

    fn find_object_at(
        &self,
        stage: StageIndex,
        position: Position,
        shape: &ShapeSignature,
    ) -> Option<WorldObjectRef>;

    fn read_object(&self, object: WorldObjectRef) -> Option<ObjectSpec>;

    fn is_valid(&self, object: WorldObjectRef) -> bool;

    /// Builds a non-functional stand-in.
    fn create_preview(&mut self, stage: StageIndex, spec: &ObjectSpec) -> Option<WorldObjectRef>;

    /// A stage surface was inserted at `at`; later surfaces move up by one.
    fn insert_stage(&mut self, at: StageIndex);

    /// The surface at `at` and everything on it is gone; later surfaces move down by one.
    fn remove_stage(&mut self, at: StageIndex);
}
