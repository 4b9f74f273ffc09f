//! Verdict classification.
//!
//! Maps a flag set and an opacity signal to exactly one coarse verdict. Rules
//! are evaluated in a fixed precedence order and the first match wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detector::BadnessFlag;

/// Primary incident verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    WanUnstable,
    WifiCongestion,
    MeshFlap,
    DfsEvent,
    OpaqueRisk,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WanUnstable => "WAN_UNSTABLE",
            Self::WifiCongestion => "WIFI_CONGESTION",
            Self::MeshFlap => "MESH_FLAP",
            Self::DfsEvent => "DFS_EVENT",
            Self::OpaqueRisk => "OPAQUE_RISK",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict together with its confidence in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub confidence: f64,
}

/// Stateless precedence classifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerdictClassifier;

impl VerdictClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, flags: &[BadnessFlag], opaque: bool) -> Classification {
        let has = |f: BadnessFlag| flags.contains(&f);
        let (verdict, confidence) = if opaque {
            (Verdict::OpaqueRisk, 0.7)
        } else if has(BadnessFlag::WanLowSinr) {
            (Verdict::WanUnstable, 0.7)
        } else if has(BadnessFlag::MeshFlap) {
            (Verdict::MeshFlap, 0.7)
        } else if has(BadnessFlag::AirtimeHigh) && has(BadnessFlag::RetryHigh) {
            (Verdict::WifiCongestion, 0.7)
        } else if has(BadnessFlag::LatSpike)
            && (has(BadnessFlag::RetryHigh) || has(BadnessFlag::AirtimeHigh))
        {
            (Verdict::WifiCongestion, 0.6)
        } else {
            (Verdict::Unknown, 0.4)
        };
        Classification {
            verdict,
            confidence,
        }
    }
}
