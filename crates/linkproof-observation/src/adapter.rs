//! Domain adapter contract.
//!
//! Platform-specific readers (Wi-Fi, WAN, DOCSIS, cellular) live outside this
//! crate and plug in through [`DomainAdapter`]. Adapters report metadata only.

use chrono::{DateTime, Utc};

use crate::error::ObservationResult;
use crate::events::ChangeEventCard;
use crate::snapshot::PreChangeSnapshot;
use crate::types::MetricSample;
use crate::windowing::WindowRef;

/// Time context handed to the adapter for one sampling tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickContext {
    pub at: DateTime<Utc>,
    /// Short window containing `at`.
    pub window_ref: WindowRef,
    /// Monotonic tick number, starting at zero.
    pub tick: u64,
}

/// Changes and snapshots observed since the previous tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectedChanges {
    pub events: Vec<ChangeEventCard>,
    pub snapshots: Vec<PreChangeSnapshot>,
}

impl CollectedChanges {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.snapshots.is_empty()
    }
}

/// Source of samples and change metadata for one device.
pub trait DomainAdapter: Send {
    /// Read one sample.
    ///
    /// Missing data is reported through absent fields, never as an error.
    /// Errors are reserved for the reader itself being broken.
    fn collect_metric_sample(&mut self, ctx: &TickContext) -> ObservationResult<MetricSample>;

    /// Changes and snapshots since the last call. May be empty.
    fn collect_change_events_and_snapshots(
        &mut self,
        ctx: &TickContext,
    ) -> ObservationResult<CollectedChanges>;

    /// Adapter name, for logs.
    fn name(&self) -> &str;
}
