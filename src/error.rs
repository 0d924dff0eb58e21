use thiserror::Error;

/// Rejected simulator configuration.
///
/// Raised synchronously by construction and every reconfiguration call.
/// The previous configuration stays in effect when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("number of teeth must be positive")]
    ZeroTeeth,

    #[error("quarter period must be at least 1 ms")]
    ZeroQuarterPeriod,

    #[error("tick limit must be positive")]
    ZeroTickLimit,

    #[error("number of teeth {0} exceeds the maximum of {max}", max = crate::config::MAX_TEETH)]
    TooManyTeeth(u32),
}
