//! Episode tracking: at most one open run of bad windows.
//!
//! The manager is a two-state machine (empty / open). A bad window opens an
//! episode; while open, every cycle refreshes the worst window reference and
//! appends one evidence reference. The open episode is mutated in place and
//! never forked. Closing is explicit unless an [`EpisodeClosePolicy`] rule
//! is configured.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::windowing::WindowRef;

/// Number of evidence references reported to callers.
pub const EVIDENCE_REFS_REPORTED: usize = 10;

/// Upper bound on evidence references kept on an open episode.
pub const EVIDENCE_REFS_RETAINED: usize = 512;

/// Episode identifier: `"ep-"` followed by 12 hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(pub String);

impl EpisodeId {
    pub fn new() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("ep-{}", &hex[..12]))
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked run of bad windows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub start_ts: DateTime<Utc>,
    pub worst_window_ref: WindowRef,
    evidence_refs: Vec<String>,
}

impl Episode {
    fn open(at: DateTime<Utc>, worst_window_ref: WindowRef, evidence_ref: String) -> Self {
        Self {
            id: EpisodeId::new(),
            start_ts: at,
            worst_window_ref,
            evidence_refs: vec![evidence_ref],
        }
    }

    fn update(&mut self, worst_window_ref: WindowRef, evidence_ref: String) {
        self.worst_window_ref = worst_window_ref;
        self.evidence_refs.push(evidence_ref);
        if self.evidence_refs.len() > EVIDENCE_REFS_RETAINED {
            let excess = self.evidence_refs.len() - EVIDENCE_REFS_RETAINED;
            self.evidence_refs.drain(0..excess);
        }
    }

    /// The most recent evidence references, oldest first.
    pub fn recent_evidence(&self) -> Vec<String> {
        let skip = self.evidence_refs.len().saturating_sub(EVIDENCE_REFS_REPORTED);
        self.evidence_refs[skip..].to_vec()
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence_refs.len()
    }
}

/// Optional automatic closing rules. Both off by default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeClosePolicy {
    /// Close an episode once it has been open this long (sample time).
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    /// Close after this many consecutive non-bad cycles.
    #[serde(default)]
    pub close_after_good_windows: Option<u32>,
}

/// Why an episode was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Explicit,
    MaxDuration,
    Recovered,
}

/// Owner of the (at most one) open episode.
#[derive(Debug, Default)]
pub struct EpisodeManager {
    current: Option<Episode>,
    policy: EpisodeClosePolicy,
    good_streak: u32,
}

impl EpisodeManager {
    pub fn new(policy: EpisodeClosePolicy) -> Self {
        Self {
            current: None,
            policy,
            good_streak: 0,
        }
    }

    pub fn current(&self) -> Option<&Episode> {
        self.current.as_ref()
    }

    /// Apply one recognition cycle.
    ///
    /// Returns the open episode after the cycle, if any.
    pub fn observe(
        &mut self,
        at: DateTime<Utc>,
        bad: bool,
        worst_window_ref: WindowRef,
        evidence_ref: String,
    ) -> Option<&Episode> {
        self.expire(at);

        if bad {
            self.good_streak = 0;
            self.open_or_update(at, worst_window_ref, evidence_ref);
            return self.current.as_ref();
        }

        if self.current.is_some() {
            self.good_streak += 1;
            if let Some(limit) = self.policy.close_after_good_windows {
                if self.good_streak >= limit {
                    self.close(CloseReason::Recovered);
                    return None;
                }
            }
            if let Some(ep) = self.current.as_mut() {
                ep.update(worst_window_ref, evidence_ref);
            }
        }
        self.current.as_ref()
    }

    /// Open an episode regardless of window state, or update the open one.
    ///
    /// Used when evidence must be frozen on demand.
    pub fn pin(
        &mut self,
        at: DateTime<Utc>,
        worst_window_ref: WindowRef,
        evidence_ref: String,
    ) -> &Episode {
        self.expire(at);
        self.open_or_update(at, worst_window_ref, evidence_ref)
    }

    /// Close the open episode, returning it.
    pub fn clear(&mut self) -> Option<Episode> {
        self.close(CloseReason::Explicit)
    }

    fn open_or_update(
        &mut self,
        at: DateTime<Utc>,
        worst_window_ref: WindowRef,
        evidence_ref: String,
    ) -> &Episode {
        let episode = match self.current.take() {
            Some(mut ep) => {
                ep.update(worst_window_ref, evidence_ref);
                ep
            }
            None => {
                let ep = Episode::open(at, worst_window_ref, evidence_ref);
                info!(episode_id = %ep.id, start = %ep.start_ts, "Episode opened");
                ep
            }
        };
        self.current.insert(episode)
    }

    fn expire(&mut self, at: DateTime<Utc>) {
        let (Some(limit), Some(ep)) = (self.policy.max_duration_secs, self.current.as_ref()) else {
            return;
        };
        if (at - ep.start_ts).num_seconds() >= limit as i64 {
            self.close(CloseReason::MaxDuration);
        }
    }

    fn close(&mut self, reason: CloseReason) -> Option<Episode> {
        self.good_streak = 0;
        let closed = self.current.take();
        if let Some(ep) = &closed {
            info!(
                episode_id = %ep.id,
                reason = ?reason,
                evidence = ep.evidence_count(),
                "Episode closed"
            );
        }
        closed
    }
}
