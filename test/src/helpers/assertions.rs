/// Assert that the entity has a live object at the stage, and return it
#[macro_export]
macro_rules! assert_live {
    ($project:expr, $entity:expr, $stage:expr) => {{
        let slot = $project.content().registry().slot($entity, $stage);
        let object = match slot {
            Some($crate::shared::WorldSlot::Live(object)) => object,
            other => panic!(
                "Entity {:?} should be live at stage {}, slot is {:?}",
                $entity, $stage, other
            ),
        };
        assert!(
            $crate::shared::WorldStore::is_valid($project.world(), object),
            "Live object of {:?} at stage {} should exist in the world",
            $entity,
            $stage
        );
        object
    }};
}

/// Assert that the entity shows a preview at the stage
#[macro_export]
macro_rules! assert_preview {
    ($project:expr, $entity:expr, $stage:expr) => {
        match $project.content().registry().slot($entity, $stage) {
            Some($crate::shared::WorldSlot::Preview(_)) => {}
            other => panic!(
                "Entity {:?} should show a preview at stage {}, slot is {:?}",
                $entity, $stage, other
            ),
        }
    };
}

/// Assert that the entity has nothing in the world at the stage
#[macro_export]
macro_rules! assert_absent {
    ($project:expr, $entity:expr, $stage:expr) => {
        assert_eq!(
            $project.content().registry().slot($entity, $stage),
            None,
            "Entity {:?} should have no world object at stage {}",
            $entity,
            $stage
        );
    };
}
