use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique identifier of a coordination round.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub [u8; 32]);

impl RoundId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "RoundId({}..)", &hex::encode(&self.0[..4]))
    }
}

impl FromStr for RoundId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| anyhow::anyhow!("round id must be 32 bytes, got {}", v.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for RoundId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RoundId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Bucket key of the awaiter registry.
///
/// `AnyRound` is the wildcard bucket: its awaiters are checked against every
/// active round on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKey {
    Round(RoundId),
    AnyRound,
}

impl From<RoundId> for RoundKey {
    fn from(id: RoundId) -> Self {
        RoundKey::Round(id)
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundKey::Round(id) => write!(f, "{}", id),
            RoundKey::AnyRound => f.write_str("any"),
        }
    }
}

/// Protocol phase of a round as reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InputRegistration,
    ConnectionConfirmation,
    OutputRegistration,
    TransactionSigning,
    Ended,
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "input_registration" => Ok(Phase::InputRegistration),
            "connection_confirmation" => Ok(Phase::ConnectionConfirmation),
            "output_registration" => Ok(Phase::OutputRegistration),
            "transaction_signing" | "signing" => Ok(Phase::TransactionSigning),
            "ended" => Ok(Phase::Ended),
            other => Err(anyhow::anyhow!("unknown phase: {}", other)),
        }
    }
}

/// Snapshot of one round at fetch time.
///
/// Snapshots are compared by value: a different value for the same id means
/// the round advanced. Only `id` carries meaning for the updater; the other
/// fields are opaque coordinator content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    pub id: RoundId,
    pub phase: Phase,
    /// Block height the coordinator saw when building the snapshot.
    #[serde(default)]
    pub block_height: u64,
    /// UTC unix timestamp in seconds.
    #[serde(default)]
    pub input_registration_end: u64,
    #[serde(default)]
    pub max_vsize_allocation: u32,
    /// Bumped by the coordinator every time the round's coinjoin state changes.
    #[serde(default)]
    pub coinjoin_state_version: u64,
}

impl RoundState {
    pub fn new(id: RoundId, phase: Phase) -> Self {
        Self {
            id,
            phase,
            block_height: 0,
            input_registration_end: 0,
            max_vsize_allocation: 0,
            coinjoin_state_version: 0,
        }
    }
}

/// Latest known state of every active round, keyed by id.
pub type RoundTable = HashMap<RoundId, RoundState>;
