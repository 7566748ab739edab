//! Capability negotiation against hardware constraints.

use std::sync::Arc;

use vsnd_core::{ParamRangeSet, PcmParam, RangeSet, StreamDefaults, StreamDirection, StreamParams};

use crate::Result;
use crate::device::PcmBackend;

/// Result of one [`CapabilityNegotiator::query_ranges`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// Refined range for every parameter. Never contains a wildcard.
    pub response: ParamRangeSet,
    /// Parameters whose refined range is empty, in negotiation order.
    pub rejected: Vec<PcmParam>,
}

impl Negotiation {
    /// `true` when every parameter can be satisfied.
    pub fn is_ok(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Concrete parameters picked from the response, if satisfiable.
    pub fn pick(&self, defaults: &StreamDefaults) -> Option<StreamParams> {
        if !self.is_ok() {
            return None;
        }
        StreamParams::from_ranges(&self.response, defaults)
    }
}

/// Answers "what could this device do for this request?".
///
/// Each query opens a transient probe on the device and releases it before
/// returning. No stream state is touched and nothing persists between calls.
pub struct CapabilityNegotiator {
    backend: Arc<dyn PcmBackend>,
    device: String,
    direction: StreamDirection,
}

impl CapabilityNegotiator {
    /// Create a negotiator for `device` on `backend`.
    pub fn new(
        backend: Arc<dyn PcmBackend>,
        device: impl Into<String>,
        direction: StreamDirection,
    ) -> Self {
        Self {
            backend,
            device: device.into(),
            direction,
        }
    }

    /// Device name this negotiator probes.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Refines `requested` against the hardware.
    ///
    /// Parameters are handled in [`PcmParam::NEGOTIATION_ORDER`]. A missing
    /// request entry passes the hardware range through. A narrowed,
    /// non-empty result is committed to the probe so later parameters see
    /// it. Empty results are reported in [`Negotiation::rejected`], never as
    /// an error; only a device that cannot be probed fails the call.
    pub fn query_ranges(&self, requested: &ParamRangeSet) -> Result<Negotiation> {
        let mut query = self.backend.open_query(&self.device, self.direction)?;
        let mut response = ParamRangeSet::new();
        let mut rejected = Vec::new();

        for param in PcmParam::NEGOTIATION_ORDER {
            let hardware = query.hw_range(param)?;
            let mut refined = match requested.get(param) {
                Some(req) => req.intersect(&hardware),
                None => hardware.clone(),
            };

            if !refined.is_empty()
                && refined != hardware
                && let Err(e) = query.commit(param, &refined)
            {
                tracing::debug!(
                    %param,
                    range = %refined,
                    error = %e,
                    "hardware refused constraint"
                );
                refined = RangeSet::Empty;
            }

            let asked = requested
                .get(param)
                .map_or_else(|| "*".to_string(), ToString::to_string);
            tracing::debug!(
                %param,
                hardware = %hardware,
                requested = %asked,
                response = %refined,
                "refined"
            );
            if refined.is_empty() {
                rejected.push(param);
            }
            response.set(param, refined);
        }

        if rejected.is_empty() {
            tracing::info!(
                device = %self.device,
                direction = %self.direction,
                "negotiation satisfied"
            );
        } else {
            tracing::info!(
                device = %self.device,
                direction = %self.direction,
                rejected = ?rejected,
                "negotiation cannot be satisfied"
            );
        }
        Ok(Negotiation { response, rejected })
    }
}
