use std::collections::BTreeMap;

use log::trace;

use crate::{
    diff::{apply_in_place, diff, merge_diff_into, AttributeDiff, DiffValue},
    value::{name_of, AttributeSet, AttributeValue, NAME_KEY},
    Direction, EntityKind, Position, StageError, StageIndex,
};

/// What discarding a stage means for one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardOutcome {
    Kept,
    /// The entity was created in the discarded stage and must be removed.
    Deleted,
}

/// One logical object across its staged lifetime.
///
/// The value at any stage is `base_value` with every diff in
/// `(first_stage, stage]` applied in increasing stage order. Stored diffs are
/// always non-empty and always a real change relative to the previous stage;
/// every mutator re-establishes this before returning.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedEntity {
    position: Position,
    direction: Direction,
    kind: EntityKind,
    first_stage: StageIndex,
    last_stage: Option<StageIndex>,
    base_value: AttributeSet,
    stage_diffs: BTreeMap<StageIndex, AttributeDiff>,
    unstaged: BTreeMap<StageIndex, AttributeSet>,
    is_settings_remnant: bool,
    is_persistent: bool,
}

impl StagedEntity {
    /// # Panics
    ///
    /// Panics if `first_stage` is 0 or `base_value` has no `"name"` attribute.
    pub fn new(
        base_value: AttributeSet,
        position: Position,
        direction: Direction,
        kind: EntityKind,
        first_stage: StageIndex,
    ) -> Self {
        assert!(first_stage >= 1, "StagedEntity: stages are 1-based");
        assert!(
            name_of(&base_value).is_some(),
            "StagedEntity: base value must carry a string \"{}\" attribute",
            NAME_KEY
        );
        let last_stage = if kind.is_movable() {
            Some(first_stage)
        } else {
            None
        };
        Self {
            position,
            direction,
            kind,
            first_stage,
            last_stage,
            base_value,
            stage_diffs: BTreeMap::new(),
            unstaged: BTreeMap::new(),
            is_settings_remnant: false,
            is_persistent: false,
        }
    }

    pub fn with_last_stage(mut self, last_stage: Option<StageIndex>) -> Self {
        self.set_last_stage(last_stage);
        self
    }

    /// Attaches previously stored changes. Callers validate ranges beforehand.
    pub(crate) fn with_stored_changes(
        mut self,
        stage_diffs: BTreeMap<StageIndex, AttributeDiff>,
        unstaged: BTreeMap<StageIndex, AttributeSet>,
        is_settings_remnant: bool,
    ) -> Self {
        self.stage_diffs = stage_diffs;
        self.unstaged = unstaged;
        self.is_settings_remnant = is_settings_remnant;
        self.prune_diffs();
        self.check_invariants();
        self
    }

    pub fn persistent(mut self) -> Self {
        self.is_persistent = true;
        self.last_stage = None;
        self
    }

    // Getters

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn first_stage(&self) -> StageIndex {
        self.first_stage
    }

    pub fn last_stage(&self) -> Option<StageIndex> {
        self.last_stage
    }

    pub fn base_value(&self) -> &AttributeSet {
        &self.base_value
    }

    pub fn stage_diffs(&self) -> &BTreeMap<StageIndex, AttributeDiff> {
        &self.stage_diffs
    }

    pub fn diff_at(&self, stage: StageIndex) -> Option<&AttributeDiff> {
        self.stage_diffs.get(&stage)
    }

    pub fn has_stage_diffs(&self) -> bool {
        !self.stage_diffs.is_empty()
    }

    pub fn is_settings_remnant(&self) -> bool {
        self.is_settings_remnant
    }

    pub fn is_persistent(&self) -> bool {
        self.is_persistent
    }

    pub fn is_movable(&self) -> bool {
        self.kind.is_movable()
    }

    /// Type name at the first stage.
    pub fn name(&self) -> &str {
        name_of(&self.base_value).unwrap_or_default()
    }

    /// Type name at `stage`, following upgrade diffs.
    pub fn name_at(&self, stage: StageIndex) -> &str {
        let mut name = self.name();
        for (_, diff) in self.stage_diffs.range(..=stage) {
            if let Some(DiffValue::Set(AttributeValue::String(upgraded))) = diff.get(NAME_KEY) {
                name = upgraded;
            }
        }
        name
    }

    pub fn is_in_stage(&self, stage: StageIndex) -> bool {
        stage >= self.first_stage && self.last_stage.map_or(true, |last| stage <= last)
    }

    /// Whether the inclusive range `[first, last]` intersects this entity's lifetime.
    pub fn overlaps(&self, first: StageIndex, last: Option<StageIndex>) -> bool {
        let starts_before_other_ends = last.map_or(true, |last| self.first_stage <= last);
        let other_starts_before_end = self.last_stage.map_or(true, |own| first <= own);
        starts_before_other_ends && other_starts_before_end
    }

    /// Distance from `stage` to the nearest stage of this entity's lifetime; 0 when inside.
    pub fn stage_distance(&self, stage: StageIndex) -> StageIndex {
        if stage < self.first_stage {
            return self.first_stage - stage;
        }
        match self.last_stage {
            Some(last) if stage > last => stage - last,
            _ => 0,
        }
    }

    fn out_of_range(&self, stage: StageIndex) -> StageError {
        StageError::OutOfRange {
            stage,
            first_stage: self.first_stage,
            last_stage: self.last_stage,
        }
    }

    fn check_in_range(&self, stage: StageIndex) -> Result<(), StageError> {
        if self.is_in_stage(stage) {
            Ok(())
        } else {
            Err(self.out_of_range(stage))
        }
    }

    // Values

    /// Full attribute set at `stage`. Stages after `last_stage` yield the final value.
    pub fn value_at_stage(&self, stage: StageIndex) -> Result<AttributeSet, StageError> {
        if stage < self.first_stage {
            return Err(self.out_of_range(stage));
        }
        let mut value = self.base_value.clone();
        for (_, diff) in self.stage_diffs.range(..=stage) {
            apply_in_place(&mut value, diff);
        }
        Ok(value)
    }

    pub fn prop_at_stage(
        &self,
        stage: StageIndex,
        key: &str,
    ) -> Result<Option<AttributeValue>, StageError> {
        if stage < self.first_stage {
            return Err(self.out_of_range(stage));
        }
        let mut value = self.base_value.get(key).cloned();
        for (_, diff) in self.stage_diffs.range(..=stage) {
            if let Some(entry) = diff.get(key) {
                value = entry.value().cloned();
            }
        }
        Ok(value)
    }

    /// Merges `partial` into the value at `stage`. Returns whether any stage's value changed.
    pub fn apply_diff_at_stage(
        &mut self,
        stage: StageIndex,
        partial: &AttributeDiff,
    ) -> Result<bool, StageError> {
        self.check_in_range(stage)?;
        if partial.is_empty() {
            return Ok(false);
        }
        if let Some(DiffValue::Deleted) = partial.get(NAME_KEY) {
            panic!("StagedEntity: the \"{}\" attribute cannot be deleted", NAME_KEY);
        }
        let previous_base = self.base_value.clone();
        let previous_diffs = self.stage_diffs.clone();

        if stage == self.first_stage {
            apply_in_place(&mut self.base_value, partial);
        } else {
            let entry = self.stage_diffs.entry(stage).or_default();
            merge_diff_into(entry, partial);
        }
        self.prune_diffs();
        self.check_invariants();

        let changed = self.base_value != previous_base || self.stage_diffs != previous_diffs;
        if changed {
            trace!("StagedEntity: applied {} key(s) at stage {}", partial.len(), stage);
        }
        Ok(changed)
    }

    /// Makes the value at `stage` equal to `value`, keeping later stages' own changes.
    pub fn set_value_at_stage(
        &mut self,
        stage: StageIndex,
        value: &AttributeSet,
    ) -> Result<bool, StageError> {
        let current = self.value_at_stage(stage)?;
        match diff(&current, value) {
            Some(change) => self.apply_diff_at_stage(stage, &change),
            None => {
                self.check_in_range(stage)?;
                Ok(false)
            }
        }
    }

    pub fn set_prop_at_stage(
        &mut self,
        stage: StageIndex,
        key: &str,
        value: Option<AttributeValue>,
    ) -> Result<bool, StageError> {
        let mut change = AttributeDiff::new();
        change.insert(key, DiffValue::from_option(value));
        self.apply_diff_at_stage(stage, &change)
    }

    /// Drops the diff recorded at `stage` so it inherits the previous stage's value.
    pub fn reset_stage(&mut self, stage: StageIndex) -> bool {
        if self.stage_diffs.remove(&stage).is_none() {
            return false;
        }
        self.prune_diffs();
        self.check_invariants();
        true
    }

    pub fn reset_prop(&mut self, stage: StageIndex, key: &str) -> bool {
        let Some(diff) = self.stage_diffs.get_mut(&stage) else {
            return false;
        };
        if diff.remove(key).is_none() {
            return false;
        }
        self.prune_diffs();
        self.check_invariants();
        true
    }

    /// Moves the changes recorded at `stage` down to the previous stage carrying a change
    /// (or the base). Returns the stage that received them.
    pub fn move_value_down(&mut self, stage: StageIndex) -> Option<StageIndex> {
        let moved = self.stage_diffs.remove(&stage)?;
        let target = self.prev_stage_with_change(stage);
        self.merge_into_stage(target, &moved);
        self.prune_diffs();
        self.check_invariants();
        Some(target)
    }

    pub fn move_prop_down(&mut self, stage: StageIndex, key: &str) -> Option<StageIndex> {
        let entry = self.stage_diffs.get_mut(&stage)?.remove(key)?;
        let target = self.prev_stage_with_prop_change(stage, key);
        let mut moved = AttributeDiff::new();
        moved.insert(key, entry);
        self.merge_into_stage(target, &moved);
        self.prune_diffs();
        self.check_invariants();
        Some(target)
    }

    fn merge_into_stage(&mut self, stage: StageIndex, changes: &AttributeDiff) {
        if stage <= self.first_stage {
            apply_in_place(&mut self.base_value, changes);
        } else {
            merge_diff_into(self.stage_diffs.entry(stage).or_default(), changes);
        }
    }

    /// Largest stage below `stage` that carries a diff, or the first stage.
    pub fn prev_stage_with_change(&self, stage: StageIndex) -> StageIndex {
        self.stage_diffs
            .range(..stage)
            .next_back()
            .map(|(stage, _)| *stage)
            .unwrap_or(self.first_stage)
    }

    pub fn prev_stage_with_prop_change(&self, stage: StageIndex, key: &str) -> StageIndex {
        self.stage_diffs
            .range(..stage)
            .rev()
            .find(|(_, diff)| diff.contains_key(key))
            .map(|(stage, _)| *stage)
            .unwrap_or(self.first_stage)
    }

    /// Smallest stage above `stage` that carries a diff.
    pub fn next_stage_with_change(&self, stage: StageIndex) -> Option<StageIndex> {
        self.stage_diffs
            .range(stage + 1..)
            .next()
            .map(|(stage, _)| *stage)
    }

    pub fn next_stage_with_prop_change(&self, stage: StageIndex, key: &str) -> Option<StageIndex> {
        self.stage_diffs
            .range(stage + 1..)
            .find(|(_, diff)| diff.contains_key(key))
            .map(|(stage, _)| *stage)
    }

    // Unstaged values

    pub fn unstaged_value(&self, stage: StageIndex) -> Option<&AttributeSet> {
        self.unstaged.get(&stage)
    }

    pub fn unstaged_values(&self) -> &BTreeMap<StageIndex, AttributeSet> {
        &self.unstaged
    }

    /// Returns whether the stored value changed. Empty sets clear the entry.
    pub fn set_unstaged_value(&mut self, stage: StageIndex, value: Option<AttributeSet>) -> bool {
        let value = value.filter(|value| !value.is_empty());
        match value {
            Some(value) => {
                if !self.is_in_stage(stage) {
                    return false;
                }
                self.unstaged.insert(stage, value.clone()) != Some(value)
            }
            None => self.unstaged.remove(&stage).is_some(),
        }
    }

    // Stage bounds

    /// Moves the first stage. Moving later folds the skipped diffs into the base;
    /// moving earlier keeps the base. Returns the previous first stage.
    ///
    /// # Panics
    ///
    /// Panics if `stage` is 0 or past the last stage of a non-movable entity.
    pub fn set_first_stage(&mut self, stage: StageIndex) -> StageIndex {
        assert!(stage >= 1, "StagedEntity: stages are 1-based");
        let previous = self.first_stage;
        if self.kind.is_movable() {
            self.first_stage = stage;
            self.last_stage = Some(stage);
            self.unstaged = std::mem::take(&mut self.unstaged)
                .into_iter()
                .filter(|(key, _)| *key == previous)
                .map(|(_, value)| (stage, value))
                .collect();
            self.check_invariants();
            return previous;
        }
        if let Some(last) = self.last_stage {
            assert!(
                stage <= last,
                "StagedEntity: cannot move first stage to {} past last stage {}",
                stage,
                last
            );
        }
        if stage > previous {
            let kept = self.stage_diffs.split_off(&(stage + 1));
            for (_, folded) in std::mem::replace(&mut self.stage_diffs, kept) {
                apply_in_place(&mut self.base_value, &folded);
            }
            self.unstaged.retain(|key, _| *key >= stage);
        }
        self.first_stage = stage;
        self.prune_diffs();
        self.check_invariants();
        previous
    }

    /// Moves the first stage down to `stage` with a new base value, recording the old
    /// base as a diff at the old first stage so later stages keep their values.
    pub fn set_first_stage_with_value(&mut self, stage: StageIndex, value: AttributeSet) -> StageIndex {
        assert!(
            stage <= self.first_stage,
            "StagedEntity: set_first_stage_with_value only moves down"
        );
        assert!(name_of(&value).is_some(), "StagedEntity: value must carry a name");
        let previous = self.first_stage;
        if self.kind.is_movable() || stage == previous {
            self.set_first_stage(stage);
            self.base_value = value;
            self.prune_diffs();
            self.check_invariants();
            return previous;
        }
        let old_base = std::mem::replace(&mut self.base_value, value);
        self.first_stage = stage;
        if let Some(compensation) = diff(&self.base_value, &old_base) {
            self.stage_diffs.insert(previous, compensation);
        }
        self.prune_diffs();
        self.check_invariants();
        previous
    }

    /// Changes the visible range. Diffs beyond a lowered last stage are trimmed and returned.
    pub fn set_last_stage(&mut self, stage: Option<StageIndex>) -> BTreeMap<StageIndex, AttributeDiff> {
        if let Some(stage) = stage {
            assert!(
                stage >= self.first_stage,
                "StagedEntity: cannot move last stage to {} before first stage {}",
                stage,
                self.first_stage
            );
        }
        if self.kind.is_movable() {
            assert_eq!(
                stage,
                Some(self.first_stage),
                "StagedEntity: movable entities live in exactly one stage"
            );
        }
        let trimmed = match stage {
            Some(stage) => {
                self.unstaged.retain(|key, _| *key <= stage);
                self.stage_diffs.split_off(&(stage + 1))
            }
            None => BTreeMap::new(),
        };
        self.last_stage = stage;
        self.check_invariants();
        trimmed
    }

    // Lifecycle

    pub fn make_settings_remnant(&mut self) {
        self.is_settings_remnant = true;
    }

    /// Brings a settings remnant back, starting at `stage`.
    pub fn revive(&mut self, stage: StageIndex) {
        assert!(self.is_settings_remnant, "StagedEntity: only settings remnants can be revived");
        self.is_settings_remnant = false;
        if let Some(last) = self.last_stage {
            if stage > last && !self.kind.is_movable() {
                self.last_stage = Some(stage);
            }
        }
        self.set_first_stage(stage);
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub(crate) fn set_orientation(&mut self, direction: Direction, kind: EntityKind) {
        assert_eq!(
            std::mem::discriminant(&self.kind),
            std::mem::discriminant(&kind),
            "StagedEntity: cannot change entity kind"
        );
        self.direction = direction;
        self.kind = kind;
    }

    // Stage shifts

    /// A new stage was inserted at `at`; everything at or after it moves up by one.
    pub fn insert_stage(&mut self, at: StageIndex) {
        let shift = |stage: StageIndex| if stage >= at { stage + 1 } else { stage };
        self.first_stage = shift(self.first_stage);
        self.last_stage = self.last_stage.map(shift);
        self.stage_diffs = shift_keys(std::mem::take(&mut self.stage_diffs), shift);
        self.unstaged = shift_keys(std::mem::take(&mut self.unstaged), shift);
        self.check_invariants();
    }

    /// Stage `at` is removed and everything recorded in it is forgotten.
    pub fn discard_stage(&mut self, at: StageIndex) -> DiscardOutcome {
        if self.first_stage == at {
            return DiscardOutcome::Deleted;
        }
        self.stage_diffs.remove(&at);
        self.unstaged.remove(&at);
        let shift = |stage: StageIndex| if stage > at { stage - 1 } else { stage };
        self.first_stage = shift(self.first_stage);
        self.last_stage = self
            .last_stage
            .map(|last| if last >= at { last - 1 } else { last });
        self.stage_diffs = shift_keys(std::mem::take(&mut self.stage_diffs), shift);
        self.unstaged = shift_keys(std::mem::take(&mut self.unstaged), shift);
        self.prune_diffs();
        self.check_invariants();
        DiscardOutcome::Kept
    }

    /// Stage `at` is removed and its changes merged into the following stage, whose own
    /// entries win. When `at` is the final stage its changes fold into the preceding one.
    pub fn merge_stage(&mut self, at: StageIndex, stage_count: StageIndex) {
        assert!(at >= 1 && at <= stage_count, "StagedEntity: merge of stage outside project");
        if at == stage_count {
            self.merge_final_stage(at);
        } else {
            self.merge_into_following(at);
        }
        self.prune_diffs();
        self.check_invariants();
    }

    fn merge_into_following(&mut self, at: StageIndex) {
        let following = at + 1;
        let removed_diff = self.stage_diffs.remove(&at);
        let following_diff = self.stage_diffs.remove(&following);
        let removed_unstaged = self.unstaged.remove(&at);
        let following_unstaged = self.unstaged.remove(&following);
        let shift = |stage: StageIndex| if stage > at { stage - 1 } else { stage };

        if self.first_stage == at {
            if let Some(following_diff) = &following_diff {
                apply_in_place(&mut self.base_value, following_diff);
            }
        } else if self.first_stage < at {
            let mut merged = removed_diff.unwrap_or_default();
            if let Some(following_diff) = &following_diff {
                merge_diff_into(&mut merged, following_diff);
            }
            if !merged.is_empty() {
                // re-keyed by the shift below
                self.stage_diffs.insert(following, merged);
            }
        } else {
            self.first_stage -= 1;
        }

        // an entity ending at `at` keeps its presence in the merged stage
        self.last_stage = self
            .last_stage
            .map(|last| if last >= following { last - 1 } else { last });
        self.stage_diffs = shift_keys(std::mem::take(&mut self.stage_diffs), shift);
        self.unstaged = shift_keys(std::mem::take(&mut self.unstaged), shift);
        if let Some(unstaged) = following_unstaged.or(removed_unstaged) {
            self.unstaged.insert(at, unstaged);
        }
        if let Some(last) = self.last_stage {
            self.stage_diffs.retain(|key, _| *key <= last);
        }
        let (first, last) = (self.first_stage, self.last_stage);
        self.unstaged
            .retain(|key, _| *key >= first && last.map_or(true, |last| *key <= last));
    }

    fn merge_final_stage(&mut self, at: StageIndex) {
        assert!(at >= 2, "StagedEntity: cannot merge the only stage");
        let previous = at - 1;
        let removed_unstaged = self.unstaged.remove(&at);
        if self.first_stage == at {
            self.first_stage = previous;
        } else if let Some(removed_diff) = self.stage_diffs.remove(&at) {
            self.merge_into_stage(previous, &removed_diff);
        }
        if let Some(unstaged) = removed_unstaged {
            self.unstaged.insert(previous, unstaged);
        }
        self.last_stage = self
            .last_stage
            .map(|last| if last >= at { last - 1 } else { last });
    }

    /// Removes entries that do not change the running value, then empty diffs.
    fn prune_diffs(&mut self) {
        let mut running = self.base_value.clone();
        for diff in self.stage_diffs.values_mut() {
            diff.retain(|key, value| match value {
                DiffValue::Set(value) => running.get(key) != Some(value),
                DiffValue::Deleted => running.contains_key(key),
            });
            apply_in_place(&mut running, diff);
        }
        self.stage_diffs.retain(|_, diff| !diff.is_empty());
    }

    /// # Panics
    ///
    /// Panics when any structural invariant of the staged chain is broken.
    pub fn check_invariants(&self) {
        assert!(self.first_stage >= 1, "StagedEntity: first stage must be >= 1");
        if let Some(last) = self.last_stage {
            assert!(
                self.first_stage <= last,
                "StagedEntity: first stage {} after last stage {}",
                self.first_stage,
                last
            );
        }
        if self.kind.is_movable() {
            assert_eq!(
                self.last_stage,
                Some(self.first_stage),
                "StagedEntity: movable entity spans more than one stage"
            );
        }
        assert!(
            name_of(&self.base_value).is_some(),
            "StagedEntity: base value lost its name"
        );
        for (stage, diff) in &self.stage_diffs {
            assert!(
                *stage > self.first_stage && self.last_stage.map_or(true, |last| *stage <= last),
                "StagedEntity: diff at stage {} outside {}..={:?}",
                stage,
                self.first_stage,
                self.last_stage
            );
            assert!(!diff.is_empty(), "StagedEntity: empty diff stored at stage {}", stage);
        }
    }
}

fn shift_keys<V>(
    map: BTreeMap<StageIndex, V>,
    shift: impl Fn(StageIndex) -> StageIndex,
) -> BTreeMap<StageIndex, V> {
    map.into_iter().map(|(stage, value)| (shift(stage), value)).collect()
}
