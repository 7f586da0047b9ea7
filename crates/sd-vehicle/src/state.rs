//! Vehicle state.

use sd_core::{RequestId, Tick};

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleState {
    /// Parked at the home station.
    Idle { capacity_left: f32 },
    /// Driving to the target of `request`.  `eta` is `None` until the path
    /// plan comes back.
    EnRoute { request: RequestId, eta: Option<Tick> },
    /// At the target, working it down.
    Servicing { request: RequestId, progress: f32 },
    /// Driving home.
    Returning { eta: Option<Tick> },
    /// Parked permanently until reactivated.
    Disabled { reason: DisableReason },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisableReason {
    /// Path planning failed twice in a row.
    PathFailure,
    /// Returned home but the station had no free slot.
    NoFreeSlot,
    /// Home station no longer exists.
    Orphaned,
    /// Force-cancelled by the host.
    Cancelled,
}

impl VehicleState {
    pub fn label(&self) -> &'static str {
        match self {
            VehicleState::Idle { .. }      => "idle",
            VehicleState::EnRoute { .. }   => "en_route",
            VehicleState::Servicing { .. } => "servicing",
            VehicleState::Returning { .. } => "returning",
            VehicleState::Disabled { .. }  => "disabled",
        }
    }

    /// The request being driven to or serviced.
    pub fn current_request(&self) -> Option<RequestId> {
        match *self {
            VehicleState::EnRoute { request, .. } | VehicleState::Servicing { request, .. } => Some(request),
            _ => None,
        }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        matches!(self, VehicleState::Disabled { .. })
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, VehicleState::Idle { .. })
    }

    /// Pending arrival tick for travelling states.
    pub fn eta(&self) -> Option<Tick> {
        match *self {
            VehicleState::EnRoute { eta, .. } | VehicleState::Returning { eta } => eta,
            _ => None,
        }
    }

    pub(crate) fn set_eta(&mut self, arrival: Tick) {
        match self {
            VehicleState::EnRoute { eta, .. } | VehicleState::Returning { eta } => *eta = Some(arrival),
            _ => {}
        }
    }
}

impl std::fmt::Display for VehicleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
