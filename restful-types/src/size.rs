use serde::{Deserialize, Serialize};
use std::fmt;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// A byte count rendered with 1024-based units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteSize(pub u64);

impl ByteSize {
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    /// Scaled value and the unit it is expressed in.
    #[must_use]
    pub fn scaled(&self) -> (f64, &'static str) {
        let mut value = self.0 as f64;
        let mut unit = 0;

        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        (value, UNITS[unit])
    }
}

impl From<u64> for ByteSize {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scaled() {
            (value, "B") => write!(f, "{value} B"),
            (value, unit) => write!(f, "{value:.2} {unit}"),
        }
    }
}
