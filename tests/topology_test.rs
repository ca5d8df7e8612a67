//! Topology model tests on generated grids

mod common;

use signal_control::control::{
    Direction, Durations, EnvError, PhaseClass, PhaseSet, RoadId, Topology,
};
use signal_control::roadnet::{LaneSpec, LightPhaseSpec, Point, RoadSpec, RoadnetFile};

fn build(roadnet: &RoadnetFile) -> Result<Topology, EnvError> {
    let lanes = roadnet.lane_ids();
    Topology::build(roadnet, lanes.iter().map(String::as_str))
}

fn road_ids(roads: &[RoadId]) -> Vec<&str> {
    roads.iter().map(RoadId::as_str).collect()
}

#[test]
fn test_phase_classes() {
    assert_eq!(PhaseClass::classify(0), Some(PhaseClass::Red));
    assert_eq!(PhaseClass::classify(4), Some(PhaseClass::Yellow));
    assert_eq!(PhaseClass::classify(5), Some(PhaseClass::Green));
    assert_eq!(PhaseClass::classify(12), Some(PhaseClass::Green));
    assert_eq!(PhaseClass::classify(1), None);
    assert_eq!(PhaseClass::classify(3), None);
}

#[test]
fn test_grid_intersection_phases() {
    let topology = build(&common::grid(1, 1)).unwrap();
    assert_eq!(topology.len(), 1);

    let intersection = &topology.intersections()[0];
    assert_eq!(intersection.id.as_str(), "intersection_1_1");
    assert_eq!(
        intersection.phases,
        PhaseSet {
            green: vec![0, 2, 4, 6],
            yellow: vec![1, 3, 5, 7],
            red: vec![8],
        }
    );
    assert_eq!(topology.green_counts(), vec![4]);
}

#[test]
fn test_roads_classified_by_endpoints() {
    let topology = build(&common::grid(1, 1)).unwrap();
    let intersection = topology.intersection("intersection_1_1").unwrap();

    assert_eq!(
        road_ids(&intersection.in_roads),
        vec!["road_2_1_2", "road_1_2_3", "road_0_1_0", "road_1_0_1"]
    );
    assert_eq!(
        road_ids(&intersection.out_roads),
        vec!["road_1_1_0", "road_1_1_1", "road_1_1_2", "road_1_1_3"]
    );
    assert_eq!(topology.incoming_lane_count(0), 12);
}

#[test]
fn test_virtual_intersections_are_not_controlled() {
    let topology = build(&common::grid(2, 3)).unwrap();
    assert_eq!(topology.len(), 6);
    assert!(topology.position("intersection_0_1").is_none());
    assert!(topology.intersections().iter().all(|i| i.green_count() == 4));
}

#[test]
fn test_road_lanes_follow_engine_order() {
    let roadnet = common::grid(1, 1);
    let reversed: Vec<String> = roadnet.lane_ids().into_iter().rev().collect();
    let topology = Topology::build(&roadnet, reversed.iter().map(String::as_str)).unwrap();

    let lanes: Vec<&str> = topology
        .road_lanes(&RoadId::new("road_0_1_0"))
        .iter()
        .map(|lane| lane.as_str())
        .collect();
    assert_eq!(lanes, vec!["road_0_1_0_2", "road_0_1_0_1", "road_0_1_0_0"]);
}

/// A road between two controlled intersections feeds both
#[test]
fn test_lane_binding_between_intersections() {
    let topology = build(&common::grid(1, 2)).unwrap();
    let west = topology.position("intersection_1_1").unwrap();
    let east = topology.position("intersection_2_1").unwrap();

    let binding = topology.lane_binding("road_1_1_0_1").unwrap();
    assert_eq!(binding.road.as_str(), "road_1_1_0");
    assert_eq!(
        binding.approaches,
        vec![(west, Direction::Outgoing), (east, Direction::Incoming)]
    );

    let boundary = topology.lane_binding("road_0_1_0_0").unwrap();
    assert_eq!(boundary.approaches, vec![(west, Direction::Incoming)]);
}

/// Exact matching keeps `road_1_1_0` and `road_1_1_0_1` lanes apart
#[test]
fn test_lane_binding_uses_exact_lane_ids() {
    let topology = build(&common::grid(1, 1)).unwrap();
    assert!(topology.lane_binding("road_1_1_0").is_none());
    assert!(topology.lane_binding("road_1_1_0_1").is_some());
    assert!(topology.lane_binding("road_1_1_0_3").is_none());
}

#[test]
fn test_unrecognized_phase_rejected() {
    let mut roadnet = common::grid(1, 1);
    let intersection = roadnet
        .intersections
        .iter_mut()
        .find(|item| item.id == "intersection_1_1")
        .unwrap();
    let program = intersection.traffic_light.as_mut().unwrap();
    program.lightphases[2] = LightPhaseSpec {
        time: 30.0,
        available_road_links: vec![0, 1, 2],
    };

    match build(&roadnet) {
        Err(EnvError::UnrecognizedPhase {
            intersection,
            phase,
            links,
        }) => {
            assert_eq!(intersection, "intersection_1_1");
            assert_eq!(phase, 2);
            assert_eq!(links, 3);
        }
        other => panic!("expected UnrecognizedPhase, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn test_unknown_engine_lane_rejected() {
    let roadnet = common::grid(1, 1);
    let mut lanes = roadnet.lane_ids();
    lanes.push("road_9_9_0_0".to_string());
    let result = Topology::build(&roadnet, lanes.iter().map(String::as_str));
    assert!(matches!(result, Err(EnvError::InvalidRoadnet(_))));
}

#[test]
fn test_missing_red_phase_fails_clearance_check() {
    let mut roadnet = common::grid(1, 1);
    for intersection in &mut roadnet.intersections {
        if let Some(program) = intersection.traffic_light.as_mut() {
            program.lightphases.pop();
        }
    }
    let topology = build(&roadnet).unwrap();
    assert!(topology.intersections()[0].phases.red.is_empty());

    assert!(topology.validate_clearance(&Durations::new(0, 5, 30)).is_ok());
    assert!(matches!(
        topology.validate_clearance(&Durations::new(5, 5, 30)),
        Err(EnvError::InvalidRoadnet(_))
    ));
}

/// A road between two boundary nodes is simulated but controls nothing
#[test]
fn test_lane_between_virtual_nodes_has_no_approach() {
    let mut roadnet = common::grid(1, 1);
    roadnet.roads.push(RoadSpec {
        id: "road_0_1_shortcut".to_string(),
        start_intersection: "intersection_0_1".to_string(),
        end_intersection: "intersection_1_0".to_string(),
        points: vec![Point::new(0.0, 300.0), Point::new(300.0, 0.0)],
        lanes: vec![LaneSpec::default()],
    });

    let topology = build(&roadnet).unwrap();
    let binding = topology.lane_binding("road_0_1_shortcut_0").unwrap();
    assert_eq!(binding.road.as_str(), "road_0_1_shortcut");
    assert!(binding.approaches.is_empty());
    assert_eq!(topology.incoming_lane_count(0), 12);
}
