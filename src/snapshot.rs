use serde::{
    Deserialize,
    Serialize,
};

/// Charge regeneration state as reported by `GET /me`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charges {
    /// time to regenerate a single charge
    pub cooldown_ms: u64,
    /// may carry fractional regeneration progress
    pub count: f64,
    pub max: u64,
}

/// Last known server-reported account state. Replaced wholesale on every
/// successful fetch, never mutated field by field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub charges: Charges,
    pub droplets: u64,
}

impl AccountSnapshot {
    pub fn new(count: f64, max: u64, cooldown_ms: u64, droplets: u64) -> Self {
        Self {
            charges: Charges {
                cooldown_ms,
                count,
                max,
            },
            droplets,
        }
    }

    pub fn is_full(&self) -> bool {
        self.charges.count >= self.charges.max as f64
    }
}
