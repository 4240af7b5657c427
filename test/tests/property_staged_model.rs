/// PROPERTY-BASED TESTS: staged model invariants
///
/// 1. `apply(a, diff(a, b)) == b` and `diff(a, a)` is empty
/// 2. Inserting a stage and discarding it again restores the entity exactly
/// 3. Diffs stay pruned whatever values are applied
use proptest::prelude::*;
use stageplan_shared::{
    apply, diff, AttributeDiff, AttributeSet, AttributeValue, Direction, EntityKind, Position,
    StagedEntity,
};

fn value_strategy() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        any::<bool>().prop_map(AttributeValue::Bool),
        (-5i64..5).prop_map(AttributeValue::Int),
        "[a-c]{1,3}".prop_map(AttributeValue::String),
        prop::collection::btree_map("[x-z]", (-2i64..2).prop_map(AttributeValue::Int), 0..3)
            .prop_map(AttributeValue::Record),
    ]
}

fn attributes_strategy() -> impl Strategy<Value = AttributeSet> {
    prop::collection::btree_map("[a-e]", value_strategy(), 0..5)
}

fn entity_strategy() -> impl Strategy<Value = StagedEntity> {
    (
        1u32..4,
        prop::collection::vec((1u32..4, "[a-c]", -3i64..3), 0..6),
        prop::option::of(0u32..4),
    )
        .prop_map(|(first_stage, changes, extra_stages)| {
            let mut base = AttributeSet::new();
            base.insert("name".to_string(), "inserter".into());
            let mut entity = StagedEntity::new(
                base,
                Position::new(0, 0),
                Direction::North,
                EntityKind::Standard,
                first_stage,
            );
            for (offset, key, value) in changes {
                let mut change = AttributeDiff::new();
                change.set(key, value);
                entity
                    .apply_diff_at_stage(first_stage + offset, &change)
                    .unwrap();
            }
            if let Some(extra) = extra_stages {
                entity = entity.with_last_stage(Some(first_stage + 3 + extra));
            }
            entity
        })
}

fn assert_pruned(entity: &StagedEntity) {
    for (stage, stored) in entity.stage_diffs() {
        assert!(!stored.is_empty(), "Empty diff stored at stage {}", stage);
        assert_ne!(
            entity.value_at_stage(*stage).unwrap(),
            entity.value_at_stage(stage - 1).unwrap_or_else(|_| entity.base_value().clone()),
            "Diff at stage {} changes nothing",
            stage
        );
    }
}

proptest! {
    #[test]
    fn prop_diff_round_trips(a in attributes_strategy(), b in attributes_strategy()) {
        match diff(&a, &b) {
            Some(changes) => prop_assert_eq!(apply(&a, &changes), b),
            None => prop_assert_eq!(a, b),
        }
    }

    #[test]
    fn prop_diff_of_identical_sets_is_none(a in attributes_strategy()) {
        prop_assert_eq!(diff(&a, &a), None);
    }

    #[test]
    fn prop_insert_then_discard_restores_entity(entity in entity_strategy(), at in 1u32..9) {
        let mut shifted = entity.clone();
        shifted.insert_stage(at);
        shifted.discard_stage(at);

        prop_assert_eq!(shifted.first_stage(), entity.first_stage());
        prop_assert_eq!(shifted.last_stage(), entity.last_stage());
        prop_assert_eq!(
            shifted.stage_diffs().keys().collect::<Vec<_>>(),
            entity.stage_diffs().keys().collect::<Vec<_>>()
        );
        prop_assert_eq!(shifted, entity);
    }

    #[test]
    fn prop_applied_diffs_stay_pruned(entity in entity_strategy()) {
        assert_pruned(&entity);
    }
}
