use anyhow::Result;
use lazy_static::lazy_static;
use prometheus::{register_gauge, register_int_gauge, Encoder, Gauge, IntGauge, TextEncoder};
use quadsim::{Direction, RunState, Snapshot};

lazy_static! {
    static ref TRANSITION_COUNT: IntGauge = register_int_gauge!(
        "quadsim_transition_count",
        "Signed number of A/B transitions"
    )
    .expect("could not register quadsim_transition_count");
    static ref TOTAL_REVOLUTIONS: IntGauge = register_int_gauge!(
        "quadsim_total_revolutions",
        "Signed number of completed wheel revolutions"
    )
    .expect("could not register quadsim_total_revolutions");
    static ref REVOLUTIONS_PER_SECOND: Gauge = register_gauge!(
        "quadsim_revolutions_per_second",
        "Configured wheel speed"
    )
    .expect("could not register quadsim_revolutions_per_second");
    static ref RUNNING: IntGauge = register_int_gauge!(
        "quadsim_running",
        "1 while the simulated encoder is turning"
    )
    .expect("could not register quadsim_running");
    static ref FORWARD: IntGauge = register_int_gauge!(
        "quadsim_forward",
        "1 when turning forward, 0 in reverse"
    )
    .expect("could not register quadsim_forward");
}

pub fn update(snapshot: &Snapshot) {
    TRANSITION_COUNT.set(i64::from(snapshot.transition_count));
    TOTAL_REVOLUTIONS.set(i64::from(snapshot.total_revolutions));
    REVOLUTIONS_PER_SECOND.set(snapshot.revolutions_per_second);
    RUNNING.set((snapshot.run_state == RunState::Running) as i64);
    FORWARD.set((snapshot.direction == Direction::Forward) as i64);
}

/// Prometheus text exposition of the default registry.
pub fn gather() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
