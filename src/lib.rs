//! Signal generator for a simulated two-wire quadrature encoder.
//!
//! A toothed wheel of `number_of_teeth` teeth produces `4 × number_of_teeth`
//! A/B transitions per revolution, one per quarter period.

pub mod config;
pub mod counter;
pub mod decoder;
pub mod error;
pub mod gray;
pub mod simulator;
pub mod timing;

pub use config::{HostConfig, Mode, SimulationConfig};
pub use counter::CounterPolicy;
pub use decoder::{QuadratureDecoder, Step};
pub use error::ConfigError;
pub use gray::{Direction, GrayState, GrayStateMachine, Pins, GRAY_TABLE};
pub use simulator::{EncoderSimulator, RunState, Snapshot, TransitionEvent};
pub use timing::{Clock, MonotonicClock, TimingGate};
