//! Identifier newtypes used across the protocol.

use sbor::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The protocol version this node speaks.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion(1);

/// Block height. Monotonically increasing, starting at 1.
///
/// Height 0 is the genesis convention: no block exists there.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    BasicSbor,
    Serialize,
    Deserialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// The next height.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The previous height, saturating at 0.
    pub fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Nanoseconds since the UNIX epoch.
///
/// Strictly non-decreasing across successive committed blocks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BasicSbor, Serialize,
    Deserialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct TimestampNano(pub u64);

impl TimestampNano {
    /// Convert a duration-since-epoch into a timestamp.
    pub fn from_duration(d: Duration) -> Self {
        Self(d.as_nanos() as u64)
    }

    /// Timestamp shifted backwards, saturating at 0.
    pub fn saturating_sub(self, d: Duration) -> Self {
        Self(self.0.saturating_sub(d.as_nanos() as u64))
    }

    /// Timestamp shifted forwards.
    pub fn saturating_add(self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_nanos() as u64))
    }
}

impl fmt::Display for TimestampNano {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Identifier of a logical chain sharing common infrastructure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BasicSbor, Serialize, Deserialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct VirtualChainId(pub u32);

/// Protocol version carried by every transaction and block header.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BasicSbor, Serialize,
    Deserialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct ProtocolVersion(pub u32);

/// Index of a validator within the federation's ordered member list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BasicSbor, Serialize,
    Deserialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct ValidatorId(pub u32);

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_next_prev() {
        assert_eq!(BlockHeight(1).next(), BlockHeight(2));
        assert_eq!(BlockHeight(1).prev(), BlockHeight(0));
        assert_eq!(BlockHeight(0).prev(), BlockHeight(0));
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = TimestampNano(1_000);
        assert_eq!(ts.saturating_sub(Duration::from_nanos(400)).0, 600);
        assert_eq!(ts.saturating_add(Duration::from_nanos(400)).0, 1_400);
        assert_eq!(TimestampNano(5).saturating_sub(Duration::from_nanos(10)).0, 0);
    }
}
