// Simulation core.
//
// SimCore owns the scheduler, the network registry, the bearer machine and
// the per-node routing tables for one run. Every behavior is driven through
// scheduled SimEvent payloads; recoverable conditions (BearerNotReady,
// RoutingNotFound, attach failure) are counted and traced while the run
// continues, anything else aborts run() with the originating error.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sim_bearer::{BearerMachine, BearerState, QosProfile};
use crate::sim_config::{ActionKind, LteConfig, TopologyConfig};
use crate::sim_device::{DeviceKind, SimNetwork};
use crate::sim_error::SimError;
use crate::sim_interface::{
    millis, micros, BearerId, DeviceId, DropReason, NodeId, NoOpSink, SimTime, TraceEvent,
    TraceRecord, TraceSink, CollectingSink,
};
use crate::sim_routing::{AddressAllocator, Prefix, RoutingEntry, RoutingTable};
use crate::sim_scheduler::Scheduler;

// ============================================================================
// Events
// ============================================================================

/// Closed set of event payloads the scheduler dispatches.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Start (or continue) an attach cycle for a UE towards an eNodeB.
    /// `attempt` is 1 for a scheduled attach and grows through retries.
    AttachRequest {
        ue: DeviceId,
        enb: DeviceId,
        attempt: usize,
    },

    /// The simulated RRC response arriving attach_delay later
    RrcConnectionSetup { bearer: BearerId, success: bool },

    /// Graceful detach of a Connected bearer
    DetachRequest { ue: DeviceId },

    /// Abrupt radio link loss, same transition as detach
    RadioLinkFailure { ue: DeviceId },

    /// User-plane transmit towards an IPv4 destination
    Transmit {
        from: DeviceId,
        to: Ipv4Addr,
        bytes: usize,
    },

    /// Channel delivery reaching the destination device
    Deliver {
        source: DeviceId,
        destination: DeviceId,
        bytes: usize,
    },
}

// ============================================================================
// Core
// ============================================================================

pub struct SimCore {
    scheduler: Scheduler<SimEvent>,
    net: SimNetwork,
    bearers: BearerMachine,
    routing: IndexMap<NodeId, RoutingTable>,
    addresses: IndexMap<DeviceId, Ipv4Addr>,
    lte: LteConfig,
    rng: StdRng,
    seed_used: [u8; 32],
    sink: Box<dyn TraceSink>,
    trace_handle: Option<Rc<RefCell<Vec<TraceRecord>>>>,

    // counters
    transmits: usize,
    deliveries: usize,
    bearer_not_ready_drops: usize,
    routing_drops: usize,
    attach_failures: usize,
}

impl SimCore {
    /// Build a core from a validated topology descriptor, silent trace.
    pub fn build(config: &TopologyConfig) -> Result<Self, SimError> {
        Self::with_sink(config, Box::new(NoOpSink))
    }

    /// Build with a collecting sink; the report will carry the full trace.
    pub fn with_collected_trace(config: &TopologyConfig) -> Result<Self, SimError> {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut core = Self::with_sink(config, Box::new(sink))?;
        core.trace_handle = Some(handle);
        Ok(core)
    }

    pub fn with_sink(config: &TopologyConfig, sink: Box<dyn TraceSink>) -> Result<Self, SimError> {
        config.validate()?;

        let seed_used = match &config.seed {
            Some(hex) => crate::sim_config::parse_seed_hex(hex)?,
            None => {
                let mut seed = [0u8; 32];
                rand::thread_rng().fill(&mut seed);
                seed
            }
        };
        let rng = StdRng::from_seed(seed_used);

        // topology
        let mut net = SimNetwork::new();
        for node in &config.nodes {
            net.add_node(node.id, node.position);
        }
        for channel in &config.channels {
            net.add_channel(
                channel.id,
                channel.kind,
                micros(channel.propagation_delay_us),
                channel.data_rate_bps,
            );
        }
        for node in &config.nodes {
            for device in &node.devices {
                net.add_device(device.id, node.id, device.kind.clone())?;
            }
        }
        // attributes freeze at this point
        for node in &config.nodes {
            for device in &node.devices {
                if let Some(channel) = device.channel {
                    net.attach(device.id, channel)?;
                }
            }
        }

        // addressing: one allocator per subnet, shared across entries so
        // consecutive hosts land in declaration order
        let mut allocators: IndexMap<Prefix, AddressAllocator> = IndexMap::new();
        let mut addresses: IndexMap<DeviceId, Ipv4Addr> = IndexMap::new();
        for entry in &config.addressing {
            let prefix = Prefix::new(entry.base, entry.prefix_len)?;
            if !allocators.contains_key(&prefix) {
                allocators.insert(prefix, AddressAllocator::new(entry.base, entry.prefix_len)?);
            }
            if let Some(allocator) = allocators.get_mut(&prefix) {
                let addr = allocator.assign()?;
                addresses.insert(entry.device, addr);
                debug!("assigned {} to device {}", addr, entry.device);
            }
        }

        // routing tables, populated once
        let mut routing: IndexMap<NodeId, RoutingTable> = IndexMap::new();
        for route in &config.routes {
            let prefix = match route.prefix {
                Some(p) => Prefix::new(p.base, p.prefix_len)?,
                None => Prefix::default_route(),
            };
            routing
                .entry(route.node)
                .or_insert_with(RoutingTable::new)
                .insert(RoutingEntry {
                    prefix,
                    next_hop: route.next_hop,
                    interface: route.interface,
                })?;
        }

        // scheduler, stop time inclusive
        let mut scheduler = Scheduler::new();
        scheduler.stop_at(millis(config.stop_time_ms));
        for scheduled in &config.schedule {
            let event = match &scheduled.action {
                ActionKind::Attach { ue, enb } => SimEvent::AttachRequest {
                    ue: *ue,
                    enb: *enb,
                    attempt: 1,
                },
                ActionKind::Detach { ue } => SimEvent::DetachRequest { ue: *ue },
                ActionKind::RadioLinkFailure { ue } => SimEvent::RadioLinkFailure { ue: *ue },
                ActionKind::Transmit { from, to, bytes } => SimEvent::Transmit {
                    from: *from,
                    to: *to,
                    bytes: *bytes,
                },
            };
            scheduler.schedule_at(millis(scheduled.at_ms), event);
        }

        Ok(Self {
            scheduler,
            net,
            bearers: BearerMachine::new(),
            routing,
            addresses,
            lte: config.lte.clone(),
            rng,
            seed_used,
            sink,
            trace_handle: None,
            transmits: 0,
            deliveries: 0,
            bearer_not_ready_drops: 0,
            routing_drops: 0,
            attach_failures: 0,
        })
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn network(&self) -> &SimNetwork {
        &self.net
    }

    pub fn routing_table(&self, node: NodeId) -> Option<&RoutingTable> {
        self.routing.get(&node)
    }

    pub fn address_of(&self, device: DeviceId) -> Option<Ipv4Addr> {
        self.addresses.get(&device).copied()
    }

    /// Inject an extra action beyond the configured schedule.
    pub fn schedule_action(&mut self, at: SimTime, action: ActionKind) {
        let event = match action {
            ActionKind::Attach { ue, enb } => SimEvent::AttachRequest {
                ue,
                enb,
                attempt: 1,
            },
            ActionKind::Detach { ue } => SimEvent::DetachRequest { ue },
            ActionKind::RadioLinkFailure { ue } => SimEvent::RadioLinkFailure { ue },
            ActionKind::Transmit { from, to, bytes } => SimEvent::Transmit { from, to, bytes },
        };
        self.scheduler.schedule_at(at, event);
    }

    /// Drive the run loop until the queue drains or the stop time passes.
    pub fn run(mut self) -> Result<SimReport, SimError> {
        info!("simulation starting, seed {:02x?}", &self.seed_used[..4]);

        while let Some((time, event)) = self.scheduler.advance() {
            self.dispatch(time, event)?;
        }

        let report = self.build_report();
        info!(
            "simulation finished at t={}ns, {} events dispatched",
            report.final_time, report.events_dispatched
        );
        Ok(report)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn dispatch(&mut self, time: SimTime, event: SimEvent) -> Result<(), SimError> {
        match event {
            SimEvent::AttachRequest { ue, enb, attempt } => {
                self.on_attach_request(time, ue, enb, attempt)
            }
            SimEvent::RrcConnectionSetup { bearer, success } => {
                self.on_rrc_setup(time, bearer, success)
            }
            SimEvent::DetachRequest { ue } | SimEvent::RadioLinkFailure { ue } => {
                self.on_detach(time, ue);
                Ok(())
            }
            SimEvent::Transmit { from, to, bytes } => self.on_transmit(time, from, to, bytes),
            SimEvent::Deliver {
                source,
                destination,
                bytes,
            } => {
                self.on_deliver(time, source, destination, bytes);
                Ok(())
            }
        }
    }

    fn on_attach_request(
        &mut self,
        time: SimTime,
        ue: DeviceId,
        enb: DeviceId,
        attempt: usize,
    ) -> Result<(), SimError> {
        // invariant: the bearer pair must be mutually attached to one channel
        let cell_id = match &self.net.device(enb)?.kind {
            DeviceKind::Enb(attrs) => attrs.cell_id,
            other => {
                return Err(SimError::Config(format!(
                    "attach target device {} is {}, not enb",
                    enb,
                    other.name()
                )))
            }
        };
        if !matches!(self.net.device(ue)?.kind, DeviceKind::Ue(_)) {
            return Err(SimError::Config(format!(
                "attach source device {} is not a ue",
                ue
            )));
        }
        let ue_channel = self.net.channel_of(ue)?.id;
        let enb_channel = self.net.channel_of(enb)?.id;
        if ue_channel != enb_channel {
            return Err(SimError::Config(format!(
                "ue {} and enb {} share no channel",
                ue, enb
            )));
        }

        let bearer = self
            .bearers
            .ensure_bearer(ue, enb, cell_id, QosProfile::default());
        let Some(transition) = self.bearers.begin_attach(bearer, time, attempt) else {
            return Ok(()); // already attaching or connected
        };

        self.sink
            .log(time, ue, TraceEvent::AttachRequested { ue, enb, attempt });
        self.sink.log(time, ue, TraceEvent::RrcRequestSent { ue, enb });
        self.sink.log(
            time,
            ue,
            TraceEvent::BearerStateChange {
                bearer,
                from_state: transition.from_state,
                to_state: transition.to_state,
            },
        );

        // the response is just another event competing on the same queue
        let success = self.rng.gen::<f64>() >= self.lte.attach_failure_probability;
        self.scheduler.schedule(
            millis(self.lte.attach_delay_ms),
            SimEvent::RrcConnectionSetup { bearer, success },
        );
        Ok(())
    }

    fn on_rrc_setup(
        &mut self,
        time: SimTime,
        bearer: BearerId,
        success: bool,
    ) -> Result<(), SimError> {
        let Some((ue, enb, state)) = self.bearers.bearer(bearer).map(|b| (b.ue, b.enb, b.state)) else {
            warn!("rrc response for unknown bearer {}", bearer);
            return Ok(());
        };
        let Some(transition) = self.bearers.complete_attach(bearer, success, time) else {
            return Ok(()); // stale response
        };
        // the response was accepted, so the captured state was Attaching
        let BearerState::Attaching { attempt, .. } = state else {
            return Ok(());
        };

        self.sink.log(
            time,
            ue,
            TraceEvent::BearerStateChange {
                bearer,
                from_state: transition.from_state,
                to_state: transition.to_state,
            },
        );

        if success {
            debug!("bearer {} connected at t={}", bearer, time);
            return Ok(());
        }

        // recoverable attach failure: count, trace, consult the retry
        // policy. The budget is per attach cycle, so failures from an
        // earlier cycle never consume a later cycle's retries.
        self.attach_failures += 1;
        warn!("attach failure on bearer {} (attempt {})", bearer, attempt);
        self.sink
            .log(time, ue, TraceEvent::AttachFailed { bearer, attempt });

        if attempt < self.lte.retry.max_attempts {
            self.scheduler.schedule(
                millis(self.lte.retry.backoff_ms),
                SimEvent::AttachRequest {
                    ue,
                    enb,
                    attempt: attempt + 1,
                },
            );
        }
        Ok(())
    }

    fn on_detach(&mut self, time: SimTime, ue: DeviceId) {
        let Some(bearer) = self.bearers.bearer_for_ue(ue).map(|b| b.id) else {
            warn!("detach for ue {} with no bearer", ue);
            return;
        };
        if let Some(transition) = self.bearers.detach(bearer, time) {
            self.sink.log(
                time,
                ue,
                TraceEvent::BearerStateChange {
                    bearer,
                    from_state: transition.from_state,
                    to_state: transition.to_state,
                },
            );
        }
    }

    fn on_transmit(
        &mut self,
        time: SimTime,
        from: DeviceId,
        to: Ipv4Addr,
        bytes: usize,
    ) -> Result<(), SimError> {
        self.transmits += 1;
        self.sink
            .log(time, from, TraceEvent::TransmitStarted { source: from, bytes });

        let node = self.net.device(from)?.node;

        // user-plane gate: a UE needs a Connected bearer. The payload is
        // dropped, not retried, mirroring radio-layer drop semantics.
        if matches!(self.net.device(from)?.kind, DeviceKind::Ue(_)) {
            match self.bearers.user_plane_ready(from) {
                Ok(_) => {}
                Err(SimError::BearerNotReady(bearer)) => {
                    self.bearers.record_drop(bearer);
                    self.bearer_not_ready_drops += 1;
                    warn!(
                        "drop: ue {} transmit with bearer {} not connected",
                        from, bearer
                    );
                    self.sink.log(
                        time,
                        from,
                        TraceEvent::PayloadDropped {
                            source: from,
                            bytes,
                            reason: DropReason::BearerNotReady,
                        },
                    );
                    return Ok(());
                }
                Err(other) => return Err(other),
            }
        }

        // resolve the next hop through the sending node's table;
        // a node without a table misses the same way an empty table does
        let lookup = self
            .routing
            .get(&node)
            .map(|table| table.lookup(to).copied())
            .unwrap_or(Err(SimError::RoutingNotFound(to)));
        let entry = match lookup {
            Ok(entry) => entry,
            Err(SimError::RoutingNotFound(_)) => {
                self.routing_drops += 1;
                warn!("drop: no route from node {} to {}", node, to);
                self.sink.log(
                    time,
                    from,
                    TraceEvent::PayloadDropped {
                        source: from,
                        bytes,
                        reason: DropReason::RoutingNotFound,
                    },
                );
                return Ok(());
            }
            Err(other) => return Err(other),
        };

        // the interface index selects the egress device on this node
        let egress = {
            let owner = self
                .net
                .nodes
                .get(&node)
                .ok_or(SimError::UnknownNode(node))?;
            *owner
                .devices
                .get(entry.interface as usize)
                .ok_or_else(|| {
                    SimError::Config(format!(
                        "route on node {} names interface {} but the node has {} devices",
                        node,
                        entry.interface,
                        owner.devices.len()
                    ))
                })?
        };

        // propagation: one delivery event per peer on the channel
        let delay = self.net.channel_of(egress)?.propagation_delay;
        for destination in self.net.fan_out(egress)? {
            self.scheduler.schedule(
                delay,
                SimEvent::Deliver {
                    source: egress,
                    destination,
                    bytes,
                },
            );
        }
        Ok(())
    }

    fn on_deliver(&mut self, time: SimTime, source: DeviceId, destination: DeviceId, bytes: usize) {
        self.deliveries += 1;
        debug!(
            "deliver {}B {} -> {} at t={}",
            bytes, source, destination, time
        );
        self.sink.log(
            time,
            destination,
            TraceEvent::PayloadDelivered {
                source,
                destination,
                bytes,
            },
        );
    }

    // ========================================================================
    // Report
    // ========================================================================

    fn build_report(&mut self) -> SimReport {
        let bearers = self
            .bearers
            .bearers()
            .map(|b| (b.id, b.state))
            .collect();
        let trace = self
            .trace_handle
            .take()
            .map(|h| h.borrow().clone())
            .unwrap_or_default();

        SimReport {
            final_time: self.scheduler.now(),
            events_dispatched: self.scheduler.dispatched(),
            events_pending: self.scheduler.pending(),
            seed_used: self.seed_used,
            bearers,
            transmits: self.transmits,
            deliveries: self.deliveries,
            bearer_not_ready_drops: self.bearer_not_ready_drops,
            routing_drops: self.routing_drops,
            attach_failures: self.attach_failures,
            trace,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Final state of a run, suitable for assertions in tests.
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Virtual time where the run halted
    pub final_time: SimTime,
    pub events_dispatched: usize,
    /// Events left undispatched past the stop time
    pub events_pending: usize,
    pub seed_used: [u8; 32],
    /// Final bearer states
    pub bearers: Vec<(BearerId, BearerState)>,
    pub transmits: usize,
    pub deliveries: usize,
    pub bearer_not_ready_drops: usize,
    pub routing_drops: usize,
    pub attach_failures: usize,
    /// Full trace when the core was built with a collecting sink
    pub trace: Vec<TraceRecord>,
}

impl SimReport {
    pub fn bearer_state(&self, id: BearerId) -> Option<BearerState> {
        self.bearers.iter().find(|(b, _)| *b == id).map(|(_, s)| *s)
    }

    pub fn print_summary(&self) {
        println!("\nSimulation Summary");
        println!("  Final time:       {} ns", self.final_time);
        println!("  Events:           {} dispatched, {} pending", self.events_dispatched, self.events_pending);
        println!("  Transmits:        {}", self.transmits);
        println!("  Deliveries:       {}", self.deliveries);
        println!(
            "  Drops:            {} bearer-not-ready, {} no-route",
            self.bearer_not_ready_drops, self.routing_drops
        );
        println!("  Attach failures:  {}", self.attach_failures);
        println!("  Bearers:");
        for (id, state) in &self.bearers {
            println!("    bearer {:>3}: {}", id, state.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_config::TopologyConfig;
    use crate::sim_interface::seconds;

    const E2E_YAML: &str = r#"
meta:
  name: e2e-attach-transmit
nodes:
  - id: 1
    devices:
      - id: 10
        kind:
          enb:
            cell_id: 1
        channel: 100
  - id: 2
    devices:
      - id: 20
        kind:
          ue: {}
        channel: 100
channels:
  - id: 100
    kind: shared
    propagation_delay_us: 2000
addressing:
  - node: 1
    device: 10
    base: 10.1.1.0
    prefix_len: 24
  - node: 2
    device: 20
    base: 10.1.1.0
    prefix_len: 24
routes:
  - node: 2
    next_hop: 10.1.1.1
    interface: 0
lte:
  attach_delay_ms: 10
schedule:
  - at_ms: 0
    action:
      attach:
        ue: 20
        enb: 10
  - at_ms: 20
    action:
      transmit:
        from: 20
        to: 10.1.1.1
        bytes: 1200
stop_time_ms: 5000
"#;

    fn run_collected(yaml: &str) -> SimReport {
        let config = TopologyConfig::from_yaml_str(yaml).unwrap();
        let core = SimCore::with_collected_trace(&config).unwrap();
        core.run().unwrap()
    }

    #[test]
    fn test_end_to_end_attach_and_transmit() {
        let report = run_collected(E2E_YAML);

        // bearer connected exactly at t = 10ms
        let connect = report
            .trace
            .iter()
            .find(|r| {
                matches!(
                    r.event,
                    TraceEvent::BearerStateChange {
                        to_state: "Connected",
                        ..
                    }
                )
            })
            .expect("bearer never connected");
        assert_eq!(connect.time, millis(10));
        assert_eq!(report.bearer_state(0), Some(BearerState::Connected {
            connected_at: millis(10)
        }));

        // transmit at 20ms delivered to the peer at 22ms (20ms + 2ms)
        let delivery = report
            .trace
            .iter()
            .find(|r| matches!(r.event, TraceEvent::PayloadDelivered { .. }))
            .expect("payload never delivered");
        assert_eq!(delivery.time, millis(22));
        assert_eq!(report.deliveries, 1);
        assert_eq!(report.bearer_not_ready_drops, 0);
        assert_eq!(report.routing_drops, 0);

        // run halts at the 5s stop time with nothing pending
        assert_eq!(report.final_time, seconds(5));
        assert_eq!(report.events_pending, 0);
    }

    #[test]
    fn test_transmit_before_attach_is_dropped() {
        let yaml = E2E_YAML.replace(
            "  - at_ms: 20",
            "  - at_ms: 5", // attach completes at 10ms, transmit at 5ms hits Attaching
        );
        let report = run_collected(&yaml);

        assert_eq!(report.bearer_not_ready_drops, 1);
        assert_eq!(report.deliveries, 0);
        let drop = report
            .trace
            .iter()
            .find(|r| matches!(r.event, TraceEvent::PayloadDropped { .. }))
            .unwrap();
        assert_eq!(
            drop.event,
            TraceEvent::PayloadDropped {
                source: 20,
                bytes: 1200,
                reason: DropReason::BearerNotReady,
            }
        );
    }

    #[test]
    fn test_transmit_after_detach_is_dropped() {
        let config = TopologyConfig::from_yaml_str(E2E_YAML).unwrap();
        let mut core = SimCore::with_collected_trace(&config).unwrap();
        core.schedule_action(millis(30), ActionKind::Detach { ue: 20 });
        core.schedule_action(
            millis(40),
            ActionKind::Transmit {
                from: 20,
                to: "10.1.1.1".parse().unwrap(),
                bytes: 100,
            },
        );
        let report = core.run().unwrap();

        assert_eq!(
            report.bearer_state(0),
            Some(BearerState::Detached {
                detached_at: millis(30)
            })
        );
        assert_eq!(report.bearer_not_ready_drops, 1);
        // the 20ms transmit (while Connected) still went through
        assert_eq!(report.deliveries, 1);
    }

    #[test]
    fn test_routing_miss_counts_and_continues() {
        let yaml = E2E_YAML.replace("to: 10.1.1.1", "to: 192.168.9.9").replace(
            r#"routes:
  - node: 2
    next_hop: 10.1.1.1
    interface: 0"#,
            r#"routes:
  - node: 2
    prefix:
      base: 10.1.1.0
      prefix_len: 24
    next_hop: 10.1.1.1
    interface: 0"#,
        );
        let report = run_collected(&yaml);

        assert_eq!(report.routing_drops, 1);
        assert_eq!(report.deliveries, 0);
        // the run still completed normally
        assert_eq!(report.final_time, seconds(5));
    }

    #[test]
    fn test_attach_failure_retries_until_exhausted() {
        let yaml = E2E_YAML.replace(
            r#"lte:
  attach_delay_ms: 10"#,
            r#"lte:
  attach_delay_ms: 10
  attach_failure_probability: 1.0
  retry:
    max_attempts: 3
    backoff_ms: 5
seed: "0x0101010101010101010101010101010101010101010101010101010101010101""#,
        );
        let report = run_collected(&yaml);

        // every attempt fails, all retries consumed, bearer back in Idle
        assert_eq!(report.attach_failures, 3);
        assert_eq!(report.bearer_state(0), Some(BearerState::Idle));
        // the 20ms transmit finds no connected bearer
        assert_eq!(report.bearer_not_ready_drops, 1);

        let attempts: Vec<usize> = report
            .trace
            .iter()
            .filter_map(|r| match r.event {
                TraceEvent::AttachRequested { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[test]
    fn test_retry_budget_is_per_attach_cycle() {
        // probability 1.0 makes every attempt fail deterministically
        let yaml = E2E_YAML.replace(
            r#"lte:
  attach_delay_ms: 10"#,
            r#"lte:
  attach_delay_ms: 10
  attach_failure_probability: 1.0
  retry:
    max_attempts: 2
    backoff_ms: 5"#,
        );
        let config = TopologyConfig::from_yaml_str(&yaml).unwrap();
        let mut core = SimCore::with_collected_trace(&config).unwrap();
        // a second attach cycle, long after the first exhausted its retries
        core.schedule_action(millis(100), ActionKind::Attach { ue: 20, enb: 10 });
        let report = core.run().unwrap();

        // both cycles get the full two-attempt budget
        let attempts: Vec<usize> = report
            .trace
            .iter()
            .filter_map(|r| match r.event {
                TraceEvent::AttachRequested { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2, 1, 2]);
        assert_eq!(report.attach_failures, 4);
        assert_eq!(report.bearer_state(0), Some(BearerState::Idle));
    }

    #[test]
    fn test_identical_seed_gives_identical_trace() {
        let yaml = E2E_YAML.replace(
            "  attach_delay_ms: 10",
            r#"  attach_delay_ms: 10
  attach_failure_probability: 0.5
  retry:
    max_attempts: 5
    backoff_ms: 7
seed: "0xabcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789""#,
        );
        let first = run_collected(&yaml);
        let second = run_collected(&yaml);

        assert_eq!(first.trace, second.trace);
        assert_eq!(first.attach_failures, second.attach_failures);
    }

    #[test]
    fn test_rebuilt_topology_is_field_for_field_equal() {
        let config = TopologyConfig::from_yaml_str(E2E_YAML).unwrap();
        let reloaded = TopologyConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();

        let a = SimCore::build(&config).unwrap();
        let b = SimCore::build(&reloaded).unwrap();

        assert_eq!(a.network(), b.network());
        assert_eq!(a.addresses, b.addresses);
        assert_eq!(a.routing_table(2), b.routing_table(2));
        // consecutive assignment under the shared 10.1.1.0/24 pool
        assert_eq!(a.address_of(10), Some("10.1.1.1".parse().unwrap()));
        assert_eq!(a.address_of(20), Some("10.1.1.2".parse().unwrap()));
    }

    #[test]
    fn test_attach_across_channels_is_fatal() {
        let yaml = E2E_YAML.replace(
            r#"channels:
  - id: 100
    kind: shared
    propagation_delay_us: 2000"#,
            r#"channels:
  - id: 100
    kind: shared
    propagation_delay_us: 2000
  - id: 101
    kind: shared
    propagation_delay_us: 2000"#,
        );
        // move the UE to the second channel: no common medium with the eNB
        let yaml = yaml.replace("        channel: 100\nchannels", "        channel: 101\nchannels");

        let config = TopologyConfig::from_yaml_str(&yaml).unwrap();
        let core = SimCore::build(&config).unwrap();
        assert!(matches!(core.run(), Err(SimError::Config(_))));
    }
}
