//! Staged phase transition tests against a recording engine

mod common;

use common::{config, recording_env, RecordingEngine};
use signal_control::control::{Action, SignalEnv, Transition};

const CENTER: &str = "intersection_1_1";
const EAST: &str = "intersection_2_1";

/// One intersection, red 5, yellow 3, green 10: switching to green 2 runs
/// red, the yellow of the vacated green, then the new green
#[test]
fn test_transition_stages_and_timing() {
    let mut env = recording_env(1, 1, config(5, 3, 10, 20));
    env.reset().unwrap();
    assert_eq!(env.elapsed(), 0);
    assert_eq!(env.current_phases(), &[0]);
    assert_eq!(env.engine().commands_for(CENTER), vec![(0, 0)]);
    env.engine_mut().commands.clear();

    let result = env.step(&Action::Phases(vec![2])).unwrap();
    assert_eq!(env.engine().commands_for(CENTER), vec![(8, 0), (1, 5), (4, 8)]);
    assert_eq!(env.engine().ticks, 18);
    assert_eq!(result.info.elapsed, 18);
    assert!(!result.done);
    assert_eq!(env.current_phases(), &[2]);

    let plan = result.info.plan.unwrap();
    assert!(plan.held.is_empty());
    assert_eq!(
        plan.changed,
        vec![Transition {
            intersection: 0,
            from: 0,
            to: 2
        }]
    );

    let result = env.step(&Action::Phases(vec![1])).unwrap();
    assert_eq!(env.elapsed(), 36);
    assert!(result.done);
}

/// The yellow commanded belongs to the green being left, not the target
#[test]
fn test_yellow_follows_previous_phase() {
    let mut env = recording_env(1, 1, config(0, 5, 10, 1000));
    env.reset().unwrap();
    env.step(&Action::Phases(vec![3])).unwrap();
    env.engine_mut().commands.clear();

    env.step(&Action::Phases(vec![1])).unwrap();
    // Yellow[3] is engine phase 7, Green[1] is engine phase 2
    assert_eq!(env.engine().commands_for(CENTER), vec![(7, 15), (2, 20)]);
}

#[test]
fn test_every_step_consumes_full_budget() {
    let mut env = recording_env(1, 1, config(2, 3, 7, 1000));
    env.reset().unwrap();
    let actions = [vec![0], vec![1], vec![1], vec![3], vec![0]];
    for (index, phases) in actions.into_iter().enumerate() {
        env.step(&Action::Phases(phases)).unwrap();
        assert_eq!(env.elapsed(), 12 * (index as u64 + 1));
        assert_eq!(env.engine().ticks, env.elapsed());
    }
}

#[test]
fn test_holding_only_reasserts_green() {
    let mut env = recording_env(1, 1, config(5, 3, 10, 1000));
    env.reset().unwrap();
    env.step(&Action::Phases(vec![2])).unwrap();
    env.engine_mut().commands.clear();

    let result = env.step(&Action::Phases(vec![2])).unwrap();
    assert_eq!(env.engine().commands_for(CENTER), vec![(4, 18)]);
    assert_eq!(env.current_phases(), &[2]);
    assert_eq!(env.elapsed(), 36);

    let plan = result.info.plan.unwrap();
    assert!(plan.is_idle());
    assert_eq!(plan.held, vec![0]);
}

/// Intersections that keep their green never see red or yellow
#[test]
fn test_unchanged_intersections_are_isolated() {
    let mut env = recording_env(1, 2, config(5, 3, 10, 1000));
    env.reset().unwrap();
    env.engine_mut().commands.clear();

    env.step(&Action::Phases(vec![0, 1])).unwrap();
    assert_eq!(env.engine().commands_for(CENTER), vec![(0, 0)]);
    assert_eq!(env.engine().commands_for(EAST), vec![(8, 0), (1, 5), (2, 8)]);
    assert_eq!(env.current_phases(), &[0, 1]);
}

#[test]
fn test_zero_red_skips_red_stage() {
    let mut env = recording_env(1, 1, config(0, 3, 10, 1000));
    env.reset().unwrap();
    env.engine_mut().commands.clear();

    env.step(&Action::Phases(vec![1])).unwrap();
    assert_eq!(env.engine().commands_for(CENTER), vec![(1, 0), (2, 3)]);
    assert_eq!(env.elapsed(), 13);
}

#[test]
fn test_zero_clearance_switches_directly() {
    let mut env = recording_env(1, 1, config(0, 0, 10, 1000));
    env.reset().unwrap();
    env.engine_mut().commands.clear();

    env.step(&Action::Phases(vec![3])).unwrap();
    assert_eq!(env.engine().commands_for(CENTER), vec![(6, 0)]);
    assert_eq!(env.elapsed(), 10);
}

/// With the engine running its own programs the controller issues nothing
#[test]
fn test_no_action_mode_free_runs() {
    let roadnet = common::grid(1, 1);
    let engine = RecordingEngine::new(&roadnet);
    let mut env = SignalEnv::new(engine, &roadnet, false, config(5, 3, 10, 1000)).unwrap();

    env.reset().unwrap();
    let result = env.step(&Action::Phases(vec![3])).unwrap();
    assert!(env.engine().commands.is_empty());
    assert_eq!(env.elapsed(), 18);
    assert!(result.info.plan.is_none());
    assert_eq!(env.current_phases(), &[0]);
}
