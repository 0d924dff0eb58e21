use serde::{Deserialize, Serialize};

/// Overflow behaviour of the `i32` transition and revolution counters.
///
/// `Wrapping` matches the unguarded counters of the hardware tool and is the
/// default. `Saturating` pins the counter at `i32::MIN`/`i32::MAX` instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterPolicy {
    Wrapping,
    Saturating,
}

impl Default for CounterPolicy {
    fn default() -> Self {
        CounterPolicy::Wrapping
    }
}

impl CounterPolicy {
    pub fn apply(self, value: i32, step: i32) -> i32 {
        match self {
            CounterPolicy::Wrapping => value.wrapping_add(step),
            CounterPolicy::Saturating => value.saturating_add(step),
        }
    }
}
