//! Signal state of an intersection in the reference engine

use anyhow::{bail, Context, Result};

use super::road_network::SimRoadNetwork;
use super::types::RoadIndex;
use crate::roadnet::IntersectionSpec;

/// A permitted movement from one road to another
#[derive(Debug, Clone)]
pub struct SimRoadLink {
    pub start_road: RoadIndex,
    pub end_road: RoadIndex,
    /// (start lane index, end lane index) pairs
    pub lane_links: Vec<(usize, usize)>,
}

/// One entry of the signal program
#[derive(Debug, Clone)]
pub struct SimPhase {
    /// Seconds the phase lasts under the fixed-time program
    pub time: f32,
    /// Indices into the intersection's road links
    pub available_road_links: Vec<usize>,
}

/// An intersection in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimIntersection {
    pub id: String,
    /// Virtual intersections sit on the boundary and have no signal
    pub is_virtual: bool,
    pub road_links: Vec<SimRoadLink>,
    pub phases: Vec<SimPhase>,
    pub current_phase: usize,
    /// Time spent in the current phase
    pub phase_timer: f32,
}

impl SimIntersection {
    pub fn from_spec(spec: &IntersectionSpec, network: &SimRoadNetwork) -> Result<Self> {
        let mut road_links = Vec::with_capacity(spec.road_links.len());
        for link in &spec.road_links {
            let start_road = network.road_index(&link.start_road).with_context(|| {
                format!(
                    "Intersection {} links from unknown road {}",
                    spec.id, link.start_road
                )
            })?;
            let end_road = network.road_index(&link.end_road).with_context(|| {
                format!(
                    "Intersection {} links to unknown road {}",
                    spec.id, link.end_road
                )
            })?;
            road_links.push(SimRoadLink {
                start_road,
                end_road,
                lane_links: link
                    .lane_links
                    .iter()
                    .map(|lane_link| (lane_link.start_lane_index, lane_link.end_lane_index))
                    .collect(),
            });
        }

        let phases: Vec<SimPhase> = spec
            .light_phases()
            .iter()
            .map(|phase| SimPhase {
                time: phase.time,
                available_road_links: phase.available_road_links.clone(),
            })
            .collect();

        for (index, phase) in phases.iter().enumerate() {
            if let Some(link) = phase
                .available_road_links
                .iter()
                .find(|link| **link >= road_links.len())
            {
                bail!(
                    "Intersection {} phase {} enables missing road link {}",
                    spec.id,
                    index,
                    link
                );
            }
        }

        Ok(Self {
            id: spec.id.clone(),
            is_virtual: spec.is_virtual,
            road_links,
            phases,
            current_phase: 0,
            phase_timer: 0.0,
        })
    }

    /// Switch to a phase immediately
    pub fn set_phase(&mut self, phase: usize) -> Result<()> {
        if self.is_virtual {
            bail!("Intersection {} is virtual and has no signal", self.id);
        }
        if phase >= self.phases.len() {
            bail!(
                "Intersection {} has {} phases, cannot set phase {}",
                self.id,
                self.phases.len(),
                phase
            );
        }
        self.current_phase = phase;
        self.phase_timer = 0.0;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_phase = 0;
        self.phase_timer = 0.0;
    }

    /// Advance the fixed-time program
    pub fn update_timer(&mut self, delta_secs: f32) {
        if self.is_virtual || self.phases.is_empty() {
            return;
        }
        self.phase_timer += delta_secs;
        if self.phase_timer >= self.phases[self.current_phase].time {
            self.phase_timer = 0.0;
            self.current_phase = (self.current_phase + 1) % self.phases.len();
        }
    }

    pub fn find_link(&self, from: RoadIndex, to: RoadIndex) -> Option<usize> {
        self.road_links
            .iter()
            .position(|link| link.start_road == from && link.end_road == to)
    }

    /// Whether the active phase lets traffic through the given road link
    pub fn is_link_open(&self, link: usize) -> bool {
        if self.is_virtual || self.phases.is_empty() {
            return true;
        }
        self.phases[self.current_phase]
            .available_road_links
            .contains(&link)
    }

    /// Lane index on the link's end road for a vehicle leaving `start_lane`
    pub fn target_lane(&self, link: usize, start_lane: usize) -> usize {
        let lane_links = &self.road_links[link].lane_links;
        lane_links
            .iter()
            .find(|(start, _)| *start == start_lane)
            .or_else(|| lane_links.first())
            .map(|(_, end)| *end)
            .unwrap_or(0)
    }

    /// Start lane indices that feed the given road link
    pub fn entry_lanes(&self, link: usize) -> Vec<usize> {
        self.road_links[link]
            .lane_links
            .iter()
            .map(|(start, _)| *start)
            .collect()
    }
}
