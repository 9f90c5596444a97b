// all the same numeric style as the rest of the crate to allow casting/interop
pub type NodeId = u32;
pub type DeviceId = u32;
pub type ChannelId = u32;
pub type BearerId = u32;
pub type CellId = u16;

/// Virtual simulation time in nanoseconds, unrelated to wall-clock time.
/// u64 nanoseconds cover ~584 years of simulated time.
pub type SimTime = u64;

/// Monotonic tiebreak for events scheduled at the same virtual time.
pub type EventSeq = u64;

pub const fn micros(n: u64) -> SimTime {
    n * 1_000
}

pub const fn millis(n: u64) -> SimTime {
    n * 1_000_000
}

pub const fn seconds(n: u64) -> SimTime {
    n * 1_000_000_000
}

// ============================================================================
// Trace Event System
// ============================================================================

/// Why a user-plane payload was dropped instead of delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Transmit issued while the bearer was not Connected
    BearerNotReady,
    /// No routing entry matched the destination address
    RoutingNotFound,
}

/// Events emitted by the simulation core for debugging and analysis
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// Attach requested for a UE towards an eNodeB
    AttachRequested {
        ue: DeviceId,
        enb: DeviceId,
        attempt: usize,
    },
    /// RRC connection request left the UE (start of the simulated exchange)
    RrcRequestSent {
        ue: DeviceId,
        enb: DeviceId,
    },
    /// Bearer moved between lifecycle states
    BearerStateChange {
        bearer: BearerId,
        from_state: &'static str,
        to_state: &'static str,
    },
    /// Attach attempt failed, bearer returned to Idle
    AttachFailed {
        bearer: BearerId,
        attempt: usize,
    },
    /// A device started transmitting a payload
    TransmitStarted {
        source: DeviceId,
        bytes: usize,
    },
    /// Payload arrived at a device after channel propagation
    PayloadDelivered {
        source: DeviceId,
        destination: DeviceId,
        bytes: usize,
    },
    /// Payload dropped before it reached the channel
    PayloadDropped {
        source: DeviceId,
        bytes: usize,
        reason: DropReason,
    },
}

/// One dispatched trace line: when, on which device, what happened
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub time: SimTime,
    pub device: DeviceId,
    pub event: TraceEvent,
}

/// Trait for consuming trace events from the simulation core
pub trait TraceSink {
    fn log(&mut self, time: SimTime, device: DeviceId, event: TraceEvent);
}

/// No-op trace sink for silent runs (zero overhead)
pub struct NoOpSink;

impl TraceSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _time: SimTime, _device: DeviceId, _event: TraceEvent) {
        // Intentionally empty - compiler should optimize this away
    }
}

/// Sink that collects every record into a shared buffer.
///
/// The buffer handle can be cloned before the sink is handed to the core,
/// so tests and the report builder can read the trace after the run.
pub struct CollectingSink {
    records: std::rc::Rc<std::cell::RefCell<Vec<TraceRecord>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            records: std::rc::Rc::new(std::cell::RefCell::new(Vec::new())),
        }
    }

    /// Shared handle to the collected records
    pub fn handle(&self) -> std::rc::Rc<std::cell::RefCell<Vec<TraceRecord>>> {
        self.records.clone()
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceSink for CollectingSink {
    fn log(&mut self, time: SimTime, device: DeviceId, event: TraceEvent) {
        self.records.borrow_mut().push(TraceRecord {
            time,
            device,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_helpers_scale_to_nanoseconds() {
        assert_eq!(micros(1), 1_000);
        assert_eq!(millis(2), 2_000_000);
        assert_eq!(seconds(5), 5_000_000_000);
        // 20ms transmit + 2ms propagation lands at 22ms
        assert_eq!(millis(20) + millis(2), millis(22));
    }

    #[test]
    fn test_collecting_sink_shares_records() {
        let mut sink = CollectingSink::new();
        let handle = sink.handle();

        sink.log(
            millis(1),
            7,
            TraceEvent::TransmitStarted {
                source: 7,
                bytes: 100,
            },
        );

        let records = handle.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, millis(1));
        assert_eq!(records[0].device, 7);
    }
}
