//! Two-bit Gray-code walker behind the A/B outputs.
//!
//! The four legal states of a quadrature signal form a cycle in which
//! exactly one of the two pins changes per step. [`GrayState`] is a bounded
//! enum, so an out-of-range index cannot be represented.

use serde::{Deserialize, Serialize};

/// Levels of the A and B lines, 0 or 1 each.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pins {
    pub a: u8,
    pub b: u8,
}

impl Pins {
    pub const fn new(a: u8, b: u8) -> Self {
        Pins { a, b }
    }
}

/// Pin levels per state, indexed by [`GrayState::index`].
pub const GRAY_TABLE: [Pins; 4] = [
    Pins::new(0, 0),
    Pins::new(1, 0),
    Pins::new(1, 1),
    Pins::new(0, 1),
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn toggled(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Signed counter step for one transition in this direction.
    pub fn step(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Forward
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrayState {
    S0,
    S1,
    S2,
    S3,
}

impl GrayState {
    pub fn index(self) -> usize {
        match self {
            GrayState::S0 => 0,
            GrayState::S1 => 1,
            GrayState::S2 => 2,
            GrayState::S3 => 3,
        }
    }

    pub fn pins(self) -> Pins {
        GRAY_TABLE[self.index()]
    }

    pub fn next(self) -> Self {
        match self {
            GrayState::S0 => GrayState::S1,
            GrayState::S1 => GrayState::S2,
            GrayState::S2 => GrayState::S3,
            GrayState::S3 => GrayState::S0,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            GrayState::S0 => GrayState::S3,
            GrayState::S1 => GrayState::S0,
            GrayState::S2 => GrayState::S1,
            GrayState::S3 => GrayState::S2,
        }
    }
}

impl Default for GrayState {
    fn default() -> Self {
        GrayState::S0
    }
}

#[derive(Debug, Default, Clone)]
pub struct GrayStateMachine {
    state: GrayState,
}

impl GrayStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move one state along the cycle and return the new pin levels.
    pub fn advance(&mut self, direction: Direction) -> Pins {
        self.state = match direction {
            Direction::Forward => self.state.next(),
            Direction::Reverse => self.state.prev(),
        };
        self.state.pins()
    }

    pub fn state(&self) -> GrayState {
        self.state
    }

    pub fn pins(&self) -> Pins {
        self.state.pins()
    }
}
