//! Default fee schedule for the operations the signing client issues.
use crate::types::StdFee;

/// Denomination used by the default fee schedule.
pub const DEFAULT_FEE_DENOM: &str = "ucosm";

/// Per-operation fees used when the caller does not override them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeTable {
    pub upload: StdFee,
    pub init: StdFee,
    pub exec: StdFee,
    pub send: StdFee,
}

impl Default for FeeTable {
    fn default() -> Self {
        Self {
            upload: StdFee::new(25_000, 1_000_000, DEFAULT_FEE_DENOM),
            init: StdFee::new(12_500, 500_000, DEFAULT_FEE_DENOM),
            exec: StdFee::new(5_000, 200_000, DEFAULT_FEE_DENOM),
            send: StdFee::new(2_000, 80_000, DEFAULT_FEE_DENOM),
        }
    }
}

/// Caller-supplied fee overrides, merged field-wise atop the defaults.
#[derive(Clone, Debug, Default)]
pub struct FeeOverrides {
    pub upload: Option<StdFee>,
    pub init: Option<StdFee>,
    pub exec: Option<StdFee>,
    pub send: Option<StdFee>,
}

impl FeeTable {
    pub fn with_overrides(overrides: FeeOverrides) -> Self {
        let defaults = Self::default();
        Self {
            upload: overrides.upload.unwrap_or(defaults.upload),
            init: overrides.init.unwrap_or(defaults.init),
            exec: overrides.exec.unwrap_or(defaults.exec),
            send: overrides.send.unwrap_or(defaults.send),
        }
    }
}
