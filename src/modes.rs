//! Interaction modes
//!
//! A fixed, closed set of ritual modes. There is no transition graph:
//! every mode is reachable from every other. The active mode only decides
//! which prompt blocks the composer emits and which pools it consults.

use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ritual interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Classic ritual with koan + archetype
    Standard,
    /// Argumentative mode (PEEL, Steel Man, rebuttals)
    Debate,
    /// Maieutic questioning
    Socratic,
    /// Perspective swap between human and AI
    RoleExchange,
    /// Cooperation patterns with explicit roles
    Cooperative,
    /// Deep abstraction, patterns across patterns
    Metaanalysis,
    /// Polyglot systems architect persona
    Engineer,
    /// All frameworks woven into one prompt
    FullSynapse,
}

impl Mode {
    /// All modes in canonical order. The unused-mode suggestion scans this
    /// list front to back, so the order is part of the observable behavior.
    pub fn all() -> &'static [Mode] {
        &[
            Mode::Standard,
            Mode::Debate,
            Mode::Socratic,
            Mode::RoleExchange,
            Mode::Cooperative,
            Mode::Metaanalysis,
            Mode::Engineer,
            Mode::FullSynapse,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Standard => "standard",
            Mode::Debate => "debate",
            Mode::Socratic => "socratic",
            Mode::RoleExchange => "role_exchange",
            Mode::Cooperative => "cooperative",
            Mode::Metaanalysis => "metaanalysis",
            Mode::Engineer => "engineer",
            Mode::FullSynapse => "full_synapse",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Standard
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(Mode::Standard),
            "debate" => Ok(Mode::Debate),
            "socratic" => Ok(Mode::Socratic),
            "role_exchange" => Ok(Mode::RoleExchange),
            "cooperative" => Ok(Mode::Cooperative),
            "metaanalysis" => Ok(Mode::Metaanalysis),
            "engineer" => Ok(Mode::Engineer),
            "full_synapse" => Ok(Mode::FullSynapse),
            other => Err(BridgeError::InvalidMode(other.to_string())),
        }
    }
}
