//! Reads A/B levels back and classifies every change.
//!
//! Previous and current levels are packed into a nibble
//! `(b_new, a_new, b_old, a_old)` and looked up directly.

use crate::gray::Pins;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Forward,
    Reverse,
    /// Same levels as the previous sample.
    Idle,
    /// Both lines changed at once: a Gray-code state was skipped.
    Illegal,
}

impl From<u8> for Step {
    fn from(s: u8) -> Self {
        match s & 0b1111 {
            0b0100 | 0b1101 | 0b1011 | 0b0010 => Step::Forward,
            0b0001 | 0b0111 | 0b1110 | 0b1000 => Step::Reverse,
            0b0000 | 0b0101 | 0b1111 | 0b1010 => Step::Idle,
            _ => Step::Illegal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    state: u8,
    position: i64,
    illegal: u64,
}

impl QuadratureDecoder {
    pub fn new(initial: Pins) -> Self {
        QuadratureDecoder {
            state: pack(initial),
            position: 0,
            illegal: 0,
        }
    }

    pub fn update(&mut self, pins: Pins) -> Step {
        let s = (pack(pins) << 2) | (self.state & 0b11);

        // shift new to old
        self.state = s >> 2;

        let step = Step::from(s);
        match step {
            Step::Forward => self.position += 1,
            Step::Reverse => self.position -= 1,
            Step::Illegal => self.illegal += 1,
            Step::Idle => {}
        }
        step
    }

    /// Net forward steps seen so far.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn illegal_transitions(&self) -> u64 {
        self.illegal
    }
}

fn pack(pins: Pins) -> u8 {
    let mut s = 0u8;
    if pins.a != 0 {
        s |= 0b01;
    }
    if pins.b != 0 {
        s |= 0b10;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gray::GRAY_TABLE;

    #[test]
    fn table_order_decodes_forward() {
        let mut decoder = QuadratureDecoder::new(GRAY_TABLE[0]);
        for i in 1..=8 {
            assert_eq!(decoder.update(GRAY_TABLE[i % 4]), Step::Forward);
        }
        assert_eq!(decoder.position(), 8);
    }

    #[test]
    fn reversed_table_order_decodes_reverse() {
        let mut decoder = QuadratureDecoder::new(GRAY_TABLE[0]);
        for i in (0..4).rev() {
            assert_eq!(decoder.update(GRAY_TABLE[i]), Step::Reverse);
        }
        assert_eq!(decoder.position(), -4);
    }

    #[test]
    fn skipped_state_is_illegal() {
        let mut decoder = QuadratureDecoder::new(Pins::new(0, 0));
        assert_eq!(decoder.update(Pins::new(1, 1)), Step::Illegal);
        assert_eq!(decoder.update(Pins::new(1, 1)), Step::Idle);
        assert_eq!(decoder.illegal_transitions(), 1);
        assert_eq!(decoder.position(), 0);
    }
}
