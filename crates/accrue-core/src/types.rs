//! Core ledger types: participant identities and per-participant records.
//!
//! All token quantities are u64 in the smallest unit of their token.
//! Timestamps are u64 seconds supplied by the caller.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Seconds on the caller's monotonic clock.
pub type Timestamp = u64;

/// A 32-byte participant identity.
///
/// Identities are opaque to the ledger. [`ParticipantId::from_label`] derives
/// one from a human-readable label with BLAKE3 so that configs and scripts
/// can name participants without handling raw bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    /// Create an identity from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an identity from a label (BLAKE3 of the UTF-8 bytes).
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes in hex, for compact log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Error parsing a [`ParticipantId`] from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid participant id: {0}")]
pub struct ParseParticipantIdError(String);

impl FromStr for ParticipantId {
    type Err = ParseParticipantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseParticipantIdError(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ParseParticipantIdError(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl From<[u8; 32]> for ParticipantId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-participant accrual record.
///
/// Created lazily on first stake and never removed, so settled reward
/// survives a full withdrawal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Participant {
    /// Currently staked quantity.
    pub stake_amount: u64,
    /// `reward_per_unit_stored` at this participant's last settlement.
    pub accumulator_paid: u64,
    /// Reward settled but not yet claimed.
    pub settled_reward: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_derivation_is_deterministic() {
        assert_eq!(ParticipantId::from_label("alice"), ParticipantId::from_label("alice"));
        assert_ne!(ParticipantId::from_label("alice"), ParticipantId::from_label("bob"));
    }

    #[test]
    fn display_parse_roundtrip() {
        let id = ParticipantId::from_label("carol");
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(s.parse::<ParticipantId>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("abcd".parse::<ParticipantId>().is_err());
        assert!("zz".repeat(32).parse::<ParticipantId>().is_err());
    }

    #[test]
    fn short_is_eight_hex_chars() {
        let id = ParticipantId::from_bytes([0xab; 32]);
        assert_eq!(id.short(), "abababab");
    }

    #[test]
    fn serde_uses_hex_string() {
        let id = ParticipantId::from_bytes([1; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: ParticipantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn participant_defaults_to_zero() {
        let p = Participant::default();
        assert_eq!(p.stake_amount, 0);
        assert_eq!(p.accumulator_paid, 0);
        assert_eq!(p.settled_reward, 0);
    }
}
