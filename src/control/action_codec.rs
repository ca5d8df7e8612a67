//! Flat discrete action encoding
//!
//! A per-intersection phase vector is read as the digits of a mixed-radix
//! number, most significant digit first: the first intersection in topology
//! order is the most significant. With every radix equal this is the plain
//! base-`n` positional encoding.

use super::error::{EnvError, EnvResult};

/// An action as handed to the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Target green-phase index per intersection, in topology order
    Phases(Vec<usize>),
    /// Encoded phase vector
    Flat(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCodec {
    radices: Vec<usize>,
    /// `None` when the flat action space does not fit in a `usize`
    cardinality: Option<usize>,
}

impl ActionCodec {
    /// `radices[i]` is the number of green phases of intersection `i`.
    ///
    /// Radix lists whose product overflows are accepted; only the flat
    /// encoding is unavailable for them.
    pub fn new(radices: Vec<usize>) -> EnvResult<Self> {
        if let Some(position) = radices.iter().position(|radix| *radix == 0) {
            return Err(EnvError::InvalidAction(format!(
                "intersection {} has no selectable phase",
                position
            )));
        }
        let cardinality = radices
            .iter()
            .try_fold(1usize, |acc, radix| acc.checked_mul(*radix));
        Ok(Self {
            radices,
            cardinality,
        })
    }

    /// Same branching factor for every intersection
    pub fn uniform(num_branches: usize, num_intersections: usize) -> EnvResult<Self> {
        Self::new(vec![num_branches; num_intersections])
    }

    pub fn radices(&self) -> &[usize] {
        &self.radices
    }

    /// Number of distinct flat actions, if it fits in a `usize`
    pub fn cardinality(&self) -> Option<usize> {
        self.cardinality
    }

    /// Cardinality, or `InvalidAction` when the flat space overflows
    pub fn flat_cardinality(&self) -> EnvResult<usize> {
        self.cardinality.ok_or_else(|| {
            EnvError::InvalidAction(format!(
                "flat action space over {} intersections with radices {:?} overflows",
                self.radices.len(),
                self.radices
            ))
        })
    }

    /// Check a phase vector against the radices
    pub fn validate(&self, phases: &[usize]) -> EnvResult<()> {
        if phases.len() != self.radices.len() {
            return Err(EnvError::InvalidAction(format!(
                "expected {} phase indices, got {}",
                self.radices.len(),
                phases.len()
            )));
        }
        for (position, (phase, radix)) in phases.iter().zip(&self.radices).enumerate() {
            if phase >= radix {
                return Err(EnvError::InvalidAction(format!(
                    "phase {} out of range for intersection {} with {} phases",
                    phase, position, radix
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self, phases: &[usize]) -> EnvResult<usize> {
        self.flat_cardinality()?;
        self.validate(phases)?;
        Ok(phases
            .iter()
            .zip(&self.radices)
            .fold(0, |acc, (phase, radix)| acc * radix + phase))
    }

    pub fn decode(&self, flat: usize) -> EnvResult<Vec<usize>> {
        let cardinality = self.flat_cardinality()?;
        if flat >= cardinality {
            return Err(EnvError::InvalidAction(format!(
                "flat action {} exceeds maximum {}",
                flat,
                cardinality - 1
            )));
        }
        let mut phases = vec![0; self.radices.len()];
        let mut rest = flat;
        for (slot, radix) in phases.iter_mut().zip(&self.radices).rev() {
            *slot = rest % radix;
            rest /= radix;
        }
        Ok(phases)
    }
}

/// Decode with one branching factor for every intersection
pub fn decode(flat: usize, num_branches: usize, num_intersections: usize) -> EnvResult<Vec<usize>> {
    ActionCodec::uniform(num_branches, num_intersections)?.decode(flat)
}

/// Encode with one branching factor for every intersection
pub fn encode(phases: &[usize], num_branches: usize) -> EnvResult<usize> {
    ActionCodec::uniform(num_branches, phases.len())?.encode(phases)
}
