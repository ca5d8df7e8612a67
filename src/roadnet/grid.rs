//! Grid scenario generator
//!
//! Builds a `rows x cols` grid of signalised intersections surrounded by
//! virtual boundary nodes. Intersection `(x, y)` is named
//! `intersection_x_y`; the road leaving it with heading `h` is `road_x_y_h`
//! where headings are 0 east, 1 north, 2 west, 3 south.

use super::{
    FlowSpec, IntersectionSpec, LaneLinkSpec, LaneSpec, LightPhaseSpec, Point, RoadLinkSpec,
    RoadSpec, RoadnetFile, TrafficLightSpec, VehicleSpec, DEFAULT_MAX_SPEED,
};

const HEADINGS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Lane 0 turns left, lane 1 goes straight, lane 2 turns right
const LANES_PER_ROAD: usize = 3;
const TURN_LEFT: usize = 0;
const GO_STRAIGHT: usize = 1;
const TURN_RIGHT: usize = 2;

/// Shape and timing of a generated grid
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Distance between neighbouring intersections in metres
    pub road_length: f32,
    pub max_speed: f32,
    /// Fixed-time program used when the engine drives the signals itself
    pub green_time: f32,
    pub yellow_time: f32,
    pub red_time: f32,
    /// Seconds between vehicles on every generated flow
    pub flow_interval: f32,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            road_length: 300.0,
            max_speed: DEFAULT_MAX_SPEED,
            green_time: 30.0,
            yellow_time: 5.0,
            red_time: 5.0,
            flow_interval: 5.0,
        }
    }
}

struct Grid {
    rows: i32,
    cols: i32,
}

impl Grid {
    fn is_real(&self, x: i32, y: i32) -> bool {
        (1..=self.cols).contains(&x) && (1..=self.rows).contains(&y)
    }

    fn is_virtual(&self, x: i32, y: i32) -> bool {
        let on_x_edge = x == 0 || x == self.cols + 1;
        let on_y_edge = y == 0 || y == self.rows + 1;
        (on_x_edge && (1..=self.rows).contains(&y)) || (on_y_edge && (1..=self.cols).contains(&x))
    }

    fn exists(&self, x: i32, y: i32) -> bool {
        self.is_real(x, y) || self.is_virtual(x, y)
    }

    /// Roads only connect nodes where at least one end is signalised
    fn has_road(&self, x: i32, y: i32, heading: usize) -> bool {
        let (dx, dy) = HEADINGS[heading];
        let (nx, ny) = (x + dx, y + dy);
        self.exists(x, y) && self.exists(nx, ny) && (self.is_real(x, y) || self.is_real(nx, ny))
    }

    fn nodes(&self) -> Vec<(i32, i32)> {
        let mut nodes = Vec::new();
        for y in 0..=self.rows + 1 {
            for x in 0..=self.cols + 1 {
                if self.exists(x, y) {
                    nodes.push((x, y));
                }
            }
        }
        nodes
    }
}

fn intersection_name(x: i32, y: i32) -> String {
    format!("intersection_{}_{}", x, y)
}

fn road_name(x: i32, y: i32, heading: usize) -> String {
    format!("road_{}_{}_{}", x, y, heading)
}

fn link_index(heading: usize, turn: usize) -> usize {
    heading * LANES_PER_ROAD + turn
}

fn signal_links(x: i32, y: i32) -> Vec<RoadLinkSpec> {
    let mut links = Vec::with_capacity(4 * LANES_PER_ROAD);
    for (heading, (dx, dy)) in HEADINGS.iter().enumerate() {
        let incoming = road_name(x - dx, y - dy, heading);
        let turns = [(heading + 1) % 4, heading, (heading + 3) % 4];
        for (turn, out_heading) in turns.into_iter().enumerate() {
            links.push(RoadLinkSpec {
                start_road: incoming.clone(),
                end_road: road_name(x, y, out_heading),
                lane_links: vec![LaneLinkSpec {
                    start_lane_index: turn,
                    end_lane_index: turn,
                }],
            });
        }
    }
    links
}

/// Four greens, each followed by its right-turn-only yellow, then all-red
fn signal_program(options: &GridOptions) -> TrafficLightSpec {
    let rights: Vec<usize> = (0..4).map(|heading| link_index(heading, TURN_RIGHT)).collect();
    let movements = [
        [link_index(0, GO_STRAIGHT), link_index(2, GO_STRAIGHT)],
        [link_index(1, GO_STRAIGHT), link_index(3, GO_STRAIGHT)],
        [link_index(0, TURN_LEFT), link_index(2, TURN_LEFT)],
        [link_index(1, TURN_LEFT), link_index(3, TURN_LEFT)],
    ];

    let mut lightphases = Vec::with_capacity(movements.len() * 2 + 1);
    for movement in movements {
        let mut green: Vec<usize> = movement.iter().chain(rights.iter()).copied().collect();
        green.sort_unstable();
        lightphases.push(LightPhaseSpec {
            time: options.green_time,
            available_road_links: green,
        });
        lightphases.push(LightPhaseSpec {
            time: options.yellow_time,
            available_road_links: rights.clone(),
        });
    }
    lightphases.push(LightPhaseSpec {
        time: options.red_time,
        available_road_links: Vec::new(),
    });

    TrafficLightSpec { lightphases }
}

impl RoadnetFile {
    /// Generate a grid road network
    pub fn grid(rows: usize, cols: usize, options: &GridOptions) -> Self {
        let grid = Grid {
            rows: rows as i32,
            cols: cols as i32,
        };
        let point = |x: i32, y: i32| {
            Point::new(x as f32 * options.road_length, y as f32 * options.road_length)
        };

        let mut roads = Vec::new();
        let mut intersections = Vec::new();

        for (x, y) in grid.nodes() {
            let mut road_ids = Vec::new();
            for (heading, (dx, dy)) in HEADINGS.iter().enumerate() {
                let (nx, ny) = (x + dx, y + dy);
                if grid.has_road(x, y, heading) {
                    roads.push(RoadSpec {
                        id: road_name(x, y, heading),
                        start_intersection: intersection_name(x, y),
                        end_intersection: intersection_name(nx, ny),
                        points: vec![point(x, y), point(nx, ny)],
                        lanes: vec![
                            LaneSpec {
                                max_speed: options.max_speed,
                                ..LaneSpec::default()
                            };
                            LANES_PER_ROAD
                        ],
                    });
                    road_ids.push(road_name(x, y, heading));
                }
                let back = (heading + 2) % 4;
                if grid.has_road(nx, ny, back) {
                    road_ids.push(road_name(nx, ny, back));
                }
            }

            let is_real = grid.is_real(x, y);
            intersections.push(IntersectionSpec {
                id: intersection_name(x, y),
                point: point(x, y),
                is_virtual: !is_real,
                roads: road_ids,
                road_links: if is_real { signal_links(x, y) } else { Vec::new() },
                traffic_light: is_real.then(|| signal_program(options)),
            });
        }

        Self {
            intersections,
            roads,
        }
    }
}

/// Straight through-flows in both directions along every row and column
pub fn grid_flows(rows: usize, cols: usize, options: &GridOptions) -> Vec<FlowSpec> {
    let (rows, cols) = (rows as i32, cols as i32);
    let flow = |route: Vec<String>| FlowSpec {
        vehicle: VehicleSpec {
            max_speed: options.max_speed,
            ..VehicleSpec::default()
        },
        route,
        interval: options.flow_interval,
        start_time: 0,
        end_time: -1,
    };

    let mut flows = Vec::new();
    for y in 1..=rows {
        flows.push(flow((0..=cols).map(|x| road_name(x, y, 0)).collect()));
        flows.push(flow((1..=cols + 1).rev().map(|x| road_name(x, y, 2)).collect()));
    }
    for x in 1..=cols {
        flows.push(flow((0..=rows).map(|y| road_name(x, y, 1)).collect()));
        flows.push(flow((1..=rows + 1).rev().map(|y| road_name(x, y, 3)).collect()));
    }
    flows
}
