// Attach/bearer state machine.
//
// Idle -> Attaching -> Connected -> Detached, with Detached re-enterable
// into Attaching on a fresh attach request. Every transition is driven by
// a scheduled event, never a direct synchronous call, so attach latency is
// visible in virtual time. There is no Idle -> Connected shortcut.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::sim_error::SimError;
use crate::sim_interface::{BearerId, CellId, DeviceId, SimTime};

// ============================================================================
// Bearer State Machine
// ============================================================================

/// Lifecycle state of a bearer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BearerState {
    /// No attach in progress
    Idle,
    /// RRC connection exchange scheduled, waiting for the response event
    Attaching {
        requested_at: SimTime,
        attempt: usize,
    },
    /// Default bearer established, user-plane traffic accepted
    Connected { connected_at: SimTime },
    /// Terminal, but re-enterable via a new attach request
    Detached { detached_at: SimTime },
}

impl BearerState {
    pub fn name(&self) -> &'static str {
        match self {
            BearerState::Idle => "Idle",
            BearerState::Attaching { .. } => "Attaching",
            BearerState::Connected { .. } => "Connected",
            BearerState::Detached { .. } => "Detached",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, BearerState::Connected { .. })
    }

    pub fn is_attaching(&self) -> bool {
        matches!(self, BearerState::Attaching { .. })
    }
}

/// QoS profile of the default bearer. QCI 9 is the non-GBR default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QosProfile {
    pub qci: u8,
    pub guaranteed_bit_rate_bps: Option<u64>,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            qci: 9,
            guaranteed_bit_rate_bps: None,
        }
    }
}

/// The logical data path binding a UE to its serving eNodeB
#[derive(Debug, Clone, PartialEq)]
pub struct Bearer {
    pub id: BearerId,
    pub ue: DeviceId,
    pub enb: DeviceId,
    pub cell_id: CellId,
    pub state: BearerState,
    pub qos: QosProfile,
    /// User-plane payloads dropped while not Connected
    pub drops: usize,
    /// Attach attempts that came back unsuccessful
    pub attach_failures: usize,
}

/// A state change, reported back for tracing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub bearer: BearerId,
    pub from_state: &'static str,
    pub to_state: &'static str,
}

// ============================================================================
// Bearer Table
// ============================================================================

/// Owns every bearer and applies the transition rules.
#[derive(Debug, Default)]
pub struct BearerMachine {
    bearers: IndexMap<BearerId, Bearer>,
    by_ue: IndexMap<DeviceId, BearerId>,
    next_id: BearerId,
}

impl BearerMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer for a UE/eNodeB pair, created Idle on first use.
    ///
    /// An existing bearer that is Idle or Detached rebinds to the requested
    /// eNodeB, so a re-attach towards a different cell serves the new pair.
    /// A live (Attaching/Connected) bearer keeps its serving eNodeB.
    pub fn ensure_bearer(
        &mut self,
        ue: DeviceId,
        enb: DeviceId,
        cell_id: CellId,
        qos: QosProfile,
    ) -> BearerId {
        if let Some(&id) = self.by_ue.get(&ue) {
            if let Some(bearer) = self.bearers.get_mut(&id) {
                if matches!(
                    bearer.state,
                    BearerState::Idle | BearerState::Detached { .. }
                ) {
                    bearer.enb = enb;
                    bearer.cell_id = cell_id;
                    bearer.qos = qos;
                }
            }
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.bearers.insert(
            id,
            Bearer {
                id,
                ue,
                enb,
                cell_id,
                state: BearerState::Idle,
                qos,
                drops: 0,
                attach_failures: 0,
            },
        );
        self.by_ue.insert(ue, id);
        id
    }

    pub fn bearer(&self, id: BearerId) -> Option<&Bearer> {
        self.bearers.get(&id)
    }

    pub fn bearer_for_ue(&self, ue: DeviceId) -> Option<&Bearer> {
        self.by_ue.get(&ue).and_then(|id| self.bearers.get(id))
    }

    pub fn bearers(&self) -> impl Iterator<Item = &Bearer> {
        self.bearers.values()
    }

    /// Idle/Detached + attach_request -> Attaching.
    ///
    /// `attempt` numbers the request within its attach cycle (1 for a
    /// fresh cycle, incremented by the caller's retry policy). Returns None
    /// when the bearer is already Attaching or Connected (the request is
    /// ignored).
    pub fn begin_attach(&mut self, id: BearerId, now: SimTime, attempt: usize) -> Option<Transition> {
        let bearer = self.bearers.get_mut(&id)?;
        match bearer.state {
            BearerState::Idle | BearerState::Detached { .. } => {
                let from = bearer.state.name();
                bearer.state = BearerState::Attaching {
                    requested_at: now,
                    attempt,
                };
                debug!("bearer {} attach attempt {} at t={}", id, attempt, now);
                Some(Transition {
                    bearer: id,
                    from_state: from,
                    to_state: "Attaching",
                })
            }
            _ => {
                warn!(
                    "attach request ignored: bearer {} is {}",
                    id,
                    bearer.state.name()
                );
                None
            }
        }
    }

    /// Attaching + attach_response -> Connected (success) or Idle (failure).
    ///
    /// A response arriving while the bearer is no longer Attaching is stale
    /// and ignored.
    pub fn complete_attach(
        &mut self,
        id: BearerId,
        success: bool,
        now: SimTime,
    ) -> Option<Transition> {
        let bearer = self.bearers.get_mut(&id)?;
        if !bearer.state.is_attaching() {
            warn!(
                "stale attach response: bearer {} is {}",
                id,
                bearer.state.name()
            );
            return None;
        }
        let from = bearer.state.name();
        if success {
            bearer.state = BearerState::Connected { connected_at: now };
        } else {
            bearer.attach_failures += 1;
            bearer.state = BearerState::Idle;
        }
        Some(Transition {
            bearer: id,
            from_state: from,
            to_state: bearer.state.name(),
        })
    }

    /// Connected + detach_request / radio_link_failure -> Detached.
    pub fn detach(&mut self, id: BearerId, now: SimTime) -> Option<Transition> {
        let bearer = self.bearers.get_mut(&id)?;
        if !bearer.state.is_connected() {
            warn!("detach ignored: bearer {} is {}", id, bearer.state.name());
            return None;
        }
        let from = bearer.state.name();
        bearer.state = BearerState::Detached { detached_at: now };
        Some(Transition {
            bearer: id,
            from_state: from,
            to_state: "Detached",
        })
    }

    /// Gate for user-plane transmit: only a Connected bearer accepts it.
    pub fn user_plane_ready(&self, ue: DeviceId) -> Result<BearerId, SimError> {
        match self.bearer_for_ue(ue) {
            Some(bearer) if bearer.state.is_connected() => Ok(bearer.id),
            Some(bearer) => Err(SimError::BearerNotReady(bearer.id)),
            None => Err(SimError::UnknownDevice(ue)),
        }
    }

    /// Count a payload dropped on this bearer.
    pub fn record_drop(&mut self, id: BearerId) {
        if let Some(bearer) = self.bearers.get_mut(&id) {
            bearer.drops += 1;
        }
    }
}
