//! Reference engine tests on generated grids

mod common;

use signal_control::control::{Action, SignalEnv};
use signal_control::engine::SimulationEngine;
use signal_control::roadnet::{grid_flows, FlowSpec, GridOptions, RoadnetFile};
use signal_control::simulation::{EngineSettings, SimWorld};

fn world(rows: usize, cols: usize, settings: EngineSettings) -> (RoadnetFile, SimWorld) {
    let options = GridOptions::default();
    let roadnet = RoadnetFile::grid(rows, cols, &options);
    let flows = grid_flows(rows, cols, &options);
    let world = SimWorld::new(&roadnet, &flows, settings).unwrap();
    (roadnet, world)
}

fn run(world: &mut SimWorld, ticks: u64) {
    for _ in 0..ticks {
        world.next_step().unwrap();
    }
}

#[test]
fn test_lane_enumeration_covers_every_lane() {
    let (roadnet, world) = world(1, 1, EngineSettings::default());
    let counts = world.lane_vehicle_count().unwrap();
    let mut expected = roadnet.lane_ids();
    expected.sort();
    assert_eq!(counts.keys().cloned().collect::<Vec<_>>(), expected);
    assert!(counts.values().all(|count| *count == 0));
}

/// Holding the east-west green queues the northbound flow at the stop line
#[test]
fn test_red_approach_queues_and_green_approach_flows() {
    let (_, mut world) = world(1, 1, EngineSettings::default());
    world.set_traffic_light_phase("intersection_1_1", 0).unwrap();
    run(&mut world, 200);

    let waiting = world.lane_waiting_vehicle_count().unwrap();
    assert!(waiting["road_1_0_1_1"] > 0, "northbound should queue");
    assert_eq!(waiting["road_0_1_0_1"], 0, "eastbound should flow");
    assert!(world.finished_vehicles() > 0);
}

#[test]
fn test_switching_green_releases_queue() {
    let (_, mut world) = world(1, 1, EngineSettings::default());
    world.set_traffic_light_phase("intersection_1_1", 0).unwrap();
    run(&mut world, 120);
    let queued = world.lane_waiting_vehicle_count().unwrap()["road_1_0_1_1"];
    assert!(queued > 0);

    // Green 1 serves the north-south straight movements
    world.set_traffic_light_phase("intersection_1_1", 2).unwrap();
    run(&mut world, 60);
    let waiting = world.lane_waiting_vehicle_count().unwrap();
    assert!(waiting["road_1_0_1_1"] < queued);
    assert!(waiting["road_0_1_0_1"] > 0, "eastbound now queues");
}

#[test]
fn test_invalid_phase_commands_fail() {
    let (_, mut world) = world(1, 1, EngineSettings::default());
    assert!(world.set_traffic_light_phase("intersection_1_1", 9).is_err());
    assert!(world.set_traffic_light_phase("intersection_0_1", 0).is_err());
    assert!(world.set_traffic_light_phase("intersection_7_7", 0).is_err());
}

#[test]
fn test_reset_restores_start_state() {
    let (_, mut world) = world(1, 1, EngineSettings::default());
    run(&mut world, 50);
    assert!(world.active_vehicles() > 0);

    world.reset().unwrap();
    assert_eq!(world.active_vehicles(), 0);
    assert_eq!(world.finished_vehicles(), 0);
    assert_eq!(world.time(), 0.0);
    assert!(world
        .lane_vehicle_count()
        .unwrap()
        .values()
        .all(|count| *count == 0));
}

#[test]
fn test_same_seed_same_episode() {
    let settings = EngineSettings {
        seed: 7,
        ..EngineSettings::default()
    };
    let (_, mut first) = world(2, 2, settings);
    let (_, mut second) = world(2, 2, settings);
    run(&mut first, 150);
    run(&mut second, 150);
    assert_eq!(
        first.lane_vehicle_count().unwrap(),
        second.lane_vehicle_count().unwrap()
    );

    first.reset().unwrap();
    run(&mut first, 150);
    assert_eq!(
        first.lane_vehicle_count().unwrap(),
        second.lane_vehicle_count().unwrap()
    );
}

/// The fixed-time program advances phases on its own
#[test]
fn test_fixed_time_program_cycles() {
    let settings = EngineSettings {
        rl_traffic_light: false,
        ..EngineSettings::default()
    };
    let (_, mut world) = world(1, 1, settings);
    assert_eq!(world.current_phase("intersection_1_1"), Some(0));
    run(&mut world, 30);
    assert_eq!(world.current_phase("intersection_1_1"), Some(1));
    run(&mut world, 5);
    assert_eq!(world.current_phase("intersection_1_1"), Some(2));
}

/// Routes that skip roads are completed along the shortest path
#[test]
fn test_route_gaps_are_completed() {
    let options = GridOptions::default();
    let roadnet = RoadnetFile::grid(1, 3, &options);
    let flows = vec![FlowSpec {
        route: vec!["road_0_1_0".to_string(), "road_3_1_0".to_string()],
        ..grid_flows(1, 3, &options)[0].clone()
    }];
    let mut world = SimWorld::new(&roadnet, &flows, EngineSettings::default()).unwrap();
    for intersection in ["intersection_1_1", "intersection_2_1", "intersection_3_1"] {
        world.set_traffic_light_phase(intersection, 0).unwrap();
    }
    run(&mut world, 200);
    assert!(world.finished_vehicles() > 0);
}

#[test]
fn test_unknown_route_road_rejected() {
    let options = GridOptions::default();
    let roadnet = RoadnetFile::grid(1, 1, &options);
    let flows = vec![FlowSpec {
        route: vec!["road_0_1_0".to_string(), "road_nowhere".to_string()],
        ..grid_flows(1, 1, &options)[0].clone()
    }];
    assert!(SimWorld::new(&roadnet, &flows, EngineSettings::default()).is_err());
}

#[test]
fn test_release_keeps_engine_usable() {
    let (_, mut world) = world(1, 1, EngineSettings::default());
    run(&mut world, 40);
    world.release().unwrap();
    assert_eq!(world.active_vehicles(), 0);
    world.reset().unwrap();
    run(&mut world, 40);
    assert!(world.active_vehicles() > 0);
}

/// A full episode against the reference engine
#[test]
fn test_env_episode_on_reference_engine() {
    let (roadnet, world) = world(1, 1, EngineSettings::default());
    let mut env = SignalEnv::new(world, &roadnet, true, common::config(0, 5, 30, 300)).unwrap();

    let observation = env.reset().unwrap();
    assert_eq!(observation.len(), env.observation_len());

    let mut steps = 0;
    let result = loop {
        let result = env.step(&Action::Phases(vec![0])).unwrap();
        steps += 1;
        assert_eq!(result.observation.len(), 28);
        assert!(result.reward <= 0.0);
        if result.done {
            break result;
        }
    };
    assert_eq!(steps, 9);
    assert_eq!(result.info.final_eval_reward, Some(env.total_reward()));
    assert!(env.total_reward() < 0.0, "held green should leave queues");
}
