/// Integration tests for bulk tasks driven through a TaskRunner
/// These tests verify that tasks step in bounded units, block world
/// notifications while running and leave the world consistent

use stageplan_engine::{
    shared::{attributes, Position},
    Project, ProjectConfig, ReconcileOutcome, ResyncProjectTask, SyncConfig, TaskError,
    TaskProgress, TaskRunner,
};
use stageplan_test::{
    assert_live, build, build_new, object_of, spec, test_catalog, test_project, TestWorld,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Test that rebuilding all stages restores objects removed behind the project's back
#[test]
fn rebuild_all_stages_restores_world() {
    init_logger();
    let mut project = test_project(3);
    let first = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));
    let second = build_new(&mut project, 2, spec(attributes! { "name" => "assembler" }, Position::new(4, 0)));
    let lost = object_of(&project, first, 3);
    project.world_mut().remove(lost);

    let mut runner = TaskRunner::new();
    let task = project.rebuild_all_stages();
    runner.submit(&mut project, Box::new(task)).expect("runner is idle");

    assert!(project.world_updates_blocked(), "World updates are blocked while a task runs");
    assert_eq!(runner.current_title(), Some("Rebuild all stages"));
    assert_eq!(runner.progress(), Some(TaskProgress { done: 0, total: 3 }));

    assert!(runner.tick(&mut project), "Two stages are left after the first step");
    assert_eq!(runner.progress(), Some(TaskProgress { done: 1, total: 3 }));

    runner.run_to_completion(&mut project);

    assert!(!runner.is_running());
    assert!(!project.world_updates_blocked());
    for stage in 1..=3 {
        assert_live!(project, first, stage);
    }
    assert_live!(project, second, 2);
    assert_live!(project, second, 3);
}

/// Test that a second task is refused while one is running
#[test]
fn only_one_task_runs_at_a_time() {
    init_logger();
    let mut project = test_project(2);
    let mut runner = TaskRunner::new();
    let task = project.rebuild_all_stages();
    runner.submit(&mut project, Box::new(task)).expect("runner is idle");

    let second = ResyncProjectTask::new(&project);
    let result = runner.submit(&mut project, Box::new(second));

    assert_eq!(
        result,
        Err(TaskError::AlreadyRunning {
            running: "Rebuild all stages".to_string()
        })
    );
}

/// Test that world notifications arriving during a task are ignored
#[test]
fn notifications_are_ignored_while_running() {
    init_logger();
    let mut project = test_project(2);
    let mut runner = TaskRunner::new();
    let task = project.rebuild_all_stages();
    runner.submit(&mut project, Box::new(task)).expect("runner is idle");

    let (_, outcome) = build(&mut project, 1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert!(project.content().is_empty());
}

/// Test that resync handles a bounded number of entities per step
#[test]
fn resync_steps_by_entity_count() {
    init_logger();
    let config = ProjectConfig {
        initial_stage_count: 2,
        sync: SyncConfig {
            entities_per_step: 1,
            ..SyncConfig::default()
        },
    };
    let mut project: Project<TestWorld> =
        Project::new(test_catalog(), TestWorld::new(test_catalog()), config);
    let first = build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, Position::new(0, 0)));
    build_new(&mut project, 1, spec(attributes! { "name" => "inserter" }, Position::new(2, 0)));
    let edited = object_of(&project, first, 2);
    project.world_mut().edit(edited, "override", 9);

    let mut runner = TaskRunner::new();
    let task = ResyncProjectTask::new(&project);
    runner.submit(&mut project, Box::new(task)).expect("runner is idle");

    assert!(runner.tick(&mut project));
    assert_eq!(runner.progress(), Some(TaskProgress { done: 1, total: 2 }));
    assert!(!runner.tick(&mut project), "Both entities are done after two steps");

    let object = assert_live!(project, first, 2);
    assert_eq!(
        project.world().object(object).and_then(|o| o.spec.value.get("override")),
        None,
        "A resync overwrites edits the project never heard of"
    );
}

/// Test that cancelling stops the task and unblocks the world
#[test]
fn cancel_unblocks_world() {
    init_logger();
    let mut project = test_project(3);
    let mut runner = TaskRunner::new();
    let task = project.rebuild_all_stages();
    runner.submit(&mut project, Box::new(task)).expect("runner is idle");
    runner.tick(&mut project);

    assert!(runner.cancel(&mut project));
    assert!(!runner.is_running());
    assert!(!project.world_updates_blocked());
    assert!(!runner.cancel(&mut project), "Nothing is left to cancel");
}
