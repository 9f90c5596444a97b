//! # lteSim - Discrete-Event LTE Attach/Bearer Simulation
//!
//! A Rust implementation of a minimal discrete-event simulation core for an
//! LTE radio access topology: UE and eNodeB devices on shared or
//! point-to-point channels, an explicit attach/bearer state machine, and
//! static per-node routing tables.
//!
//! ## Core Components
//!
//! - **EventQueue/Scheduler**: ordered event multimap and the virtual clock
//!   driving the run loop (deterministic FIFO tiebreak for equal times)
//! - **SimNetwork**: nodes, typed devices {UE, ENB, PointToPoint}, channels
//! - **BearerMachine**: Idle -> Attaching -> Connected -> Detached lifecycle,
//!   driven exclusively through scheduled events
//! - **RoutingTable/AddressAllocator**: populate-once next-hop resolution
//! - **SimCore**: owns all of the above for one run and produces a SimReport
//!
//! ## Usage
//!
//! ```no_run
//! use lte_sim::{SimCore, TopologyConfig};
//!
//! let yaml = std::fs::read_to_string("simulator/scenarios/lte_attach.yaml").unwrap();
//! let config = TopologyConfig::from_yaml_str(&yaml).unwrap();
//!
//! let core = SimCore::with_collected_trace(&config).unwrap();
//! let report = core.run().unwrap();
//! report.print_summary();
//! ```
//!
//! There is no process-wide simulator singleton: each run owns its own
//! `SimCore` (and with it the scheduler). All simulation state is mutated
//! only from within event dispatch, so a run is single-threaded and
//! reproducible for identical inputs and seed.

// Simulation core modules
pub mod sim_bearer;
pub mod sim_config;
pub mod sim_core;
pub mod sim_device;
pub mod sim_error;
pub mod sim_event_queue;
pub mod sim_interface;
pub mod sim_routing;
pub mod sim_scheduler;

// Re-export commonly used types
pub use sim_bearer::{Bearer, BearerMachine, BearerState, QosProfile};
pub use sim_config::{ActionKind, LteConfig, RetryPolicy, ScheduledAction, TopologyConfig};
pub use sim_core::{SimCore, SimEvent, SimReport};
pub use sim_device::{
    Channel, ChannelKind, Device, DeviceKind, EnbAttributes, P2pAttributes, SimNetwork, SimNode,
    UeAttributes,
};
pub use sim_error::SimError;
pub use sim_event_queue::{EventHandle, EventQueue};
pub use sim_interface::{
    micros, millis, seconds, BearerId, CellId, ChannelId, CollectingSink, DeviceId, DropReason,
    NoOpSink, NodeId, SimTime, TraceEvent, TraceRecord, TraceSink,
};
pub use sim_routing::{AddressAllocator, Prefix, RoutingEntry, RoutingTable};
pub use sim_scheduler::Scheduler;
