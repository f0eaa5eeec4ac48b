//! Conformance tiers.
//!
//! A tier grades how strongly a proof is witnessed:
//!
//! | Tier | Meaning |
//! |------|---------|
//! | L1 | signature missing or invalid |
//! | L2 | valid owner signature |
//! | L3 | valid signature and at least one anchor |
//! | L4 | valid signature and at least one valid cosignature |
//!
//! Anchors and cosignatures are independent witnesses; a cosigned proof is L4
//! whether or not it is anchored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A conformance tier, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    L1,
    L2,
    L3,
    L4,
}

/// Inputs to tier evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierEvidence {
    pub signature_valid: bool,
    pub anchors: usize,
    pub valid_cosignatures: usize,
}

impl Tier {
    /// Grade a proof from its evidence.
    pub fn evaluate(evidence: TierEvidence) -> Self {
        if !evidence.signature_valid {
            Tier::L1
        } else if evidence.valid_cosignatures > 0 {
            Tier::L4
        } else if evidence.anchors > 0 {
            Tier::L3
        } else {
            Tier::L2
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::L1 => "L1",
            Tier::L2 => "L2",
            Tier::L3 => "L3",
            Tier::L4 => "L4",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
