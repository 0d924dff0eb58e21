//! Quadrature encoder simulator.
//!
//! [`EncoderSimulator`] owns the Gray-code walker, the timing gate and every
//! counter. The host loop calls [`EncoderSimulator::tick`] more often than
//! the quarter period; each due call produces exactly one transition.
//!
//! The transition and revolution counters are `i32` and wrap on overflow
//! unless [`CounterPolicy::Saturating`] is selected. Nothing here resets
//! them: they live as long as the simulator does.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{validate_mode, validate_quarter_period, validate_teeth, Mode, SimulationConfig};
use crate::counter::CounterPolicy;
use crate::error::ConfigError;
use crate::gray::{Direction, GrayState, GrayStateMachine, Pins};
use crate::timing::TimingGate;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Paused,
    Running,
    /// Tick limit reached with enforcement enabled.
    Stopped,
}

/// Emitted for every transition made by [`EncoderSimulator::tick`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub pins: Pins,
    pub state: GrayState,
    pub direction: Direction,
    pub transition_count: i32,
    pub revolution_accumulator: i32,
    pub total_revolutions: i32,
}

/// Read-only view for status displays.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pins: Pins,
    pub state: GrayState,
    pub direction: Direction,
    pub run_state: RunState,
    pub transition_count: i32,
    pub revolution_accumulator: i32,
    pub total_revolutions: i32,
    pub revolutions_per_second: f64,
    pub config: SimulationConfig,
}

#[derive(Debug, Clone)]
pub struct EncoderSimulator {
    config: SimulationConfig,
    machine: GrayStateMachine,
    gate: TimingGate,
    direction: Direction,
    run_state: RunState,
    transition_count: i32,
    revolution_accumulator: i32,
    total_revolutions: i32,
    // Transitions since the current run started, checked against the tick limit
    run_transitions: u32,
}

impl EncoderSimulator {
    /// Create a paused simulator whose first transition is due at `now`.
    pub fn new(config: SimulationConfig, now: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(EncoderSimulator {
            config,
            machine: GrayStateMachine::new(),
            gate: TimingGate::new(config.quarter_period_ms, now),
            direction: Direction::Forward,
            run_state: RunState::Paused,
            transition_count: 0,
            revolution_accumulator: 0,
            total_revolutions: 0,
            run_transitions: 0,
        })
    }

    /// Make one transition if running and the quarter period has elapsed.
    ///
    /// Returns `None` without touching any state otherwise. A call made
    /// several periods late still makes a single transition and the next
    /// deadline is counted from `now`.
    pub fn tick(&mut self, now: u64) -> Option<TransitionEvent> {
        if self.run_state != RunState::Running || !self.gate.is_due(now) {
            return None;
        }
        self.gate.arm(now);

        let pins = self.machine.advance(self.direction);
        let step = self.direction.step();
        let policy = self.config.counter_policy;
        self.transition_count = policy.apply(self.transition_count, step);

        // |accumulator| < threshold <= i32::MAX before the step
        self.revolution_accumulator += step;
        if self.revolution_accumulator.abs() >= self.config.threshold() {
            self.revolution_accumulator = 0;
            self.total_revolutions = policy.apply(self.total_revolutions, step);
            debug!("Revolution complete, total {}", self.total_revolutions);
        }

        self.run_transitions = self.run_transitions.saturating_add(1);
        if let Mode::TickLimited { tick_limit } = self.config.mode {
            if self.config.enforce_tick_limit && self.run_transitions >= tick_limit {
                info!("Tick limit of {} reached, stopping", tick_limit);
                self.run_state = RunState::Stopped;
            }
        }

        Some(TransitionEvent {
            pins,
            state: self.machine.state(),
            direction: self.direction,
            transition_count: self.transition_count,
            revolution_accumulator: self.revolution_accumulator,
            total_revolutions: self.total_revolutions,
        })
    }

    /// Applies from the next transition; the accumulator keeps its sign.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction != self.direction {
            info!("Direction set to {:?}", direction);
        }
        self.direction = direction;
    }

    pub fn toggle_direction(&mut self) -> Direction {
        self.set_direction(self.direction.toggled());
        self.direction
    }

    /// Leaving [`RunState::Stopped`] either way starts a new tick-limited run.
    pub fn set_paused(&mut self, paused: bool) {
        if self.run_state == RunState::Stopped {
            self.run_transitions = 0;
        }
        let next = if paused {
            RunState::Paused
        } else {
            RunState::Running
        };
        if next != self.run_state {
            info!("Simulation {:?} -> {:?}", self.run_state, next);
        }
        self.run_state = next;
    }

    pub fn toggle_paused(&mut self) -> RunState {
        self.set_paused(self.run_state == RunState::Running);
        self.run_state
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), ConfigError> {
        validate_mode(mode)?;
        info!("Mode set to {:?}", mode);
        self.config.mode = mode;
        self.run_transitions = 0;
        Ok(())
    }

    pub fn set_enforce_tick_limit(&mut self, enforce: bool) {
        self.config.enforce_tick_limit = enforce;
    }

    pub fn set_counter_policy(&mut self, policy: CounterPolicy) {
        self.config.counter_policy = policy;
    }

    /// A new wheel discards the partial revolution; totals are kept.
    pub fn set_number_of_teeth(&mut self, teeth: u32) -> Result<(), ConfigError> {
        validate_teeth(teeth)?;
        if teeth != self.config.number_of_teeth {
            self.revolution_accumulator = 0;
        }
        self.config.number_of_teeth = teeth;
        info!(
            "Number of teeth set to {}, {:.4} rev/s",
            teeth,
            self.revolutions_per_second()
        );
        Ok(())
    }

    /// Takes effect when the gate is next armed.
    pub fn set_quarter_period_ms(&mut self, quarter_period_ms: u32) -> Result<(), ConfigError> {
        validate_quarter_period(quarter_period_ms)?;
        self.config.quarter_period_ms = quarter_period_ms;
        self.gate.set_period(quarter_period_ms);
        info!(
            "Quarter period set to {} ms, {:.4} rev/s",
            quarter_period_ms,
            self.revolutions_per_second()
        );
        Ok(())
    }

    /// Replace the whole configuration, or nothing when it is invalid.
    pub fn reconfigure(&mut self, config: SimulationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.number_of_teeth != self.config.number_of_teeth {
            self.set_number_of_teeth(config.number_of_teeth)?;
        }
        if config.quarter_period_ms != self.config.quarter_period_ms {
            self.set_quarter_period_ms(config.quarter_period_ms)?;
        }
        if config.mode != self.config.mode {
            self.set_mode(config.mode)?;
        }
        self.set_enforce_tick_limit(config.enforce_tick_limit);
        self.set_counter_policy(config.counter_policy);
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn state(&self) -> GrayState {
        self.machine.state()
    }

    pub fn pins(&self) -> Pins {
        self.machine.pins()
    }

    pub fn transition_count(&self) -> i32 {
        self.transition_count
    }

    pub fn revolution_accumulator(&self) -> i32 {
        self.revolution_accumulator
    }

    pub fn total_revolutions(&self) -> i32 {
        self.total_revolutions
    }

    pub fn threshold(&self) -> i32 {
        self.config.threshold()
    }

    pub fn next_deadline(&self) -> u64 {
        self.gate.next_deadline()
    }

    pub fn revolutions_per_second(&self) -> f64 {
        self.config.revolutions_per_second()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pins: self.pins(),
            state: self.state(),
            direction: self.direction,
            run_state: self.run_state,
            transition_count: self.transition_count,
            revolution_accumulator: self.revolution_accumulator,
            total_revolutions: self.total_revolutions,
            revolutions_per_second: self.revolutions_per_second(),
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(config: SimulationConfig) -> EncoderSimulator {
        let mut sim = EncoderSimulator::new(config, 0).unwrap();
        sim.set_paused(false);
        sim
    }

    /// Tick once per quarter period starting at `start`, returning the next free time.
    fn run(sim: &mut EncoderSimulator, start: u64, transitions: u32) -> u64 {
        let period = u64::from(sim.config().quarter_period_ms);
        let mut now = start;
        for _ in 0..transitions {
            assert!(sim.tick(now).is_some(), "no transition at {}", now);
            now += period;
        }
        now
    }

    #[test]
    fn starts_paused() {
        let mut sim = EncoderSimulator::new(SimulationConfig::default(), 0).unwrap();
        assert_eq!(sim.run_state(), RunState::Paused);
        assert_eq!(sim.tick(0), None);
        assert_eq!(sim.transition_count(), 0);
        assert_eq!(sim.pins(), Pins::new(0, 0));
    }

    #[test]
    fn not_due_is_a_no_op() {
        let mut sim = running(SimulationConfig::default());
        assert!(sim.tick(0).is_some());
        let before = sim.snapshot();
        for now in 1..10 {
            assert_eq!(sim.tick(now), None);
        }
        assert_eq!(sim.snapshot(), before);
        assert!(sim.tick(10).is_some());
    }

    #[test]
    fn event_reports_new_state() {
        let mut sim = running(SimulationConfig::default());
        let event = sim.tick(0).unwrap();
        assert_eq!(event.pins, Pins::new(1, 0));
        assert_eq!(event.state, GrayState::S1);
        assert_eq!(event.direction, Direction::Forward);
        assert_eq!(event.transition_count, 1);
        assert_eq!(event.revolution_accumulator, 1);
        assert_eq!(event.total_revolutions, 0);
    }

    #[test]
    fn reverse_counts_down() {
        let mut config = SimulationConfig::default();
        config.number_of_teeth = 2;
        let mut sim = running(config);
        sim.set_direction(Direction::Reverse);
        run(&mut sim, 0, 8);
        assert_eq!(sim.transition_count(), -8);
        assert_eq!(sim.total_revolutions(), -1);
        assert_eq!(sim.revolution_accumulator(), 0);
        assert_eq!(sim.state(), GrayState::S0);
    }

    #[test]
    fn direction_change_unwinds_accumulator() {
        let mut config = SimulationConfig::default();
        config.number_of_teeth = 1;
        let mut sim = running(config);
        let now = run(&mut sim, 0, 3);
        assert_eq!(sim.revolution_accumulator(), 3);

        assert_eq!(sim.toggle_direction(), Direction::Reverse);
        let now = run(&mut sim, now, 6);
        assert_eq!(sim.revolution_accumulator(), -3);
        assert_eq!(sim.total_revolutions(), 0);
        run(&mut sim, now, 1);
        assert_eq!(sim.revolution_accumulator(), 0);
        assert_eq!(sim.total_revolutions(), -1);
        assert_eq!(sim.transition_count(), -4);
    }

    #[test]
    fn tick_limit_is_inert_by_default() {
        let mut config = SimulationConfig::default();
        config.mode = Mode::TickLimited { tick_limit: 5 };
        let mut sim = running(config);
        run(&mut sim, 0, 20);
        assert_eq!(sim.run_state(), RunState::Running);
        assert_eq!(sim.transition_count(), 20);
    }

    #[test]
    fn enforced_tick_limit_stops_and_restarts() {
        let mut config = SimulationConfig::default();
        config.mode = Mode::TickLimited { tick_limit: 5 };
        config.enforce_tick_limit = true;
        let mut sim = running(config);
        let now = run(&mut sim, 0, 5);
        assert_eq!(sim.run_state(), RunState::Stopped);
        assert_eq!(sim.tick(now), None);
        assert_eq!(sim.tick(now + 1_000), None);

        sim.set_paused(false);
        let now = run(&mut sim, now + 1_000, 5);
        assert_eq!(sim.run_state(), RunState::Stopped);
        assert_eq!(sim.transition_count(), 10);
        assert_eq!(sim.tick(now), None);

        // through Paused instead of straight back to Running
        sim.set_paused(true);
        assert_eq!(sim.run_state(), RunState::Paused);
        sim.set_paused(false);
        let now = run(&mut sim, now + 1_000, 5);
        assert_eq!(sim.run_state(), RunState::Stopped);
        assert_eq!(sim.transition_count(), 15);
        assert_eq!(sim.tick(now), None);
    }

    #[test]
    fn reconfigure_leaves_unchanged_values_alone() {
        let mut sim = running(SimulationConfig::default());
        let now = run(&mut sim, 0, 30);
        sim.tick(now).unwrap();
        let mut config = *sim.config();
        config.counter_policy = CounterPolicy::Saturating;
        sim.reconfigure(config).unwrap();
        assert_eq!(sim.revolution_accumulator(), 31);
        assert_eq!(sim.next_deadline(), now + 10);
        assert_eq!(sim.config().counter_policy, CounterPolicy::Saturating);
    }

    #[test]
    fn pause_keeps_limited_run_budget() {
        let mut config = SimulationConfig::default();
        config.mode = Mode::TickLimited { tick_limit: 4 };
        config.enforce_tick_limit = true;
        let mut sim = running(config);
        let now = run(&mut sim, 0, 2);
        sim.set_paused(true);
        sim.set_paused(false);
        run(&mut sim, now, 2);
        assert_eq!(sim.run_state(), RunState::Stopped);
    }

    #[test]
    fn toggle_paused() {
        let mut sim = EncoderSimulator::new(SimulationConfig::default(), 0).unwrap();
        assert_eq!(sim.toggle_paused(), RunState::Running);
        assert_eq!(sim.toggle_paused(), RunState::Paused);
    }

    #[test]
    fn transition_count_wraps() {
        let mut sim = running(SimulationConfig::default());
        sim.transition_count = i32::MAX;
        let event = sim.tick(0).unwrap();
        assert_eq!(event.transition_count, i32::MIN);
    }

    #[test]
    fn saturating_policy_is_opt_in() {
        let mut sim = running(SimulationConfig::default());
        sim.set_counter_policy(CounterPolicy::Saturating);
        sim.set_direction(Direction::Reverse);
        sim.transition_count = i32::MIN;
        sim.total_revolutions = i32::MIN;
        sim.revolution_accumulator = -99;
        let event = sim.tick(0).unwrap();
        assert_eq!(event.transition_count, i32::MIN);
        assert_eq!(event.total_revolutions, i32::MIN);
        assert_eq!(event.revolution_accumulator, 0);
    }

    #[test]
    fn teeth_change_discards_partial_revolution() {
        let mut sim = running(SimulationConfig::default());
        run(&mut sim, 0, 30);
        sim.set_number_of_teeth(5).unwrap();
        assert_eq!(sim.revolution_accumulator(), 0);
        assert_eq!(sim.transition_count(), 30);
        assert_eq!(sim.threshold(), 20);
        assert!((sim.revolutions_per_second() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_reconfiguration_keeps_everything() {
        let mut sim = running(SimulationConfig::default());
        run(&mut sim, 0, 3);
        let before = sim.snapshot();

        assert_eq!(sim.set_number_of_teeth(0), Err(ConfigError::ZeroTeeth));
        assert_eq!(sim.set_quarter_period_ms(0), Err(ConfigError::ZeroQuarterPeriod));
        assert_eq!(
            sim.set_mode(Mode::TickLimited { tick_limit: 0 }),
            Err(ConfigError::ZeroTickLimit)
        );
        let mut bad = SimulationConfig::default();
        bad.number_of_teeth = 7;
        bad.quarter_period_ms = 0;
        assert_eq!(sim.reconfigure(bad), Err(ConfigError::ZeroQuarterPeriod));

        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn quarter_period_change_applies_after_next_transition() {
        let mut sim = running(SimulationConfig::default());
        sim.tick(0).unwrap();
        sim.set_quarter_period_ms(25).unwrap();
        assert_eq!(sim.next_deadline(), 10);
        sim.tick(10).unwrap();
        assert_eq!(sim.next_deadline(), 35);
        assert!((sim.revolutions_per_second() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn rejects_invalid_construction() {
        let mut config = SimulationConfig::default();
        config.number_of_teeth = 0;
        assert_eq!(
            EncoderSimulator::new(config, 0).err(),
            Some(ConfigError::ZeroTeeth)
        );
    }
}
