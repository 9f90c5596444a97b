// Topology descriptor - the YAML configuration surface.
//
// Strongly typed per device variant and strict about unknown fields:
// a mistyped attribute is a ConfigError at load time, not a silent
// runtime default.

use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sim_device::{ChannelKind, DeviceKind};
use crate::sim_error::SimError;
use crate::sim_interface::{ChannelId, DeviceId, NodeId};
use crate::sim_routing::Prefix;

// ============================================================================
// Descriptor
// ============================================================================

/// Complete static topology descriptor for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    /// Scenario metadata
    #[serde(default)]
    pub meta: ScenarioMeta,

    pub nodes: Vec<NodeConfig>,

    pub channels: Vec<ChannelConfig>,

    /// Prefix/mask assignments per device
    #[serde(default)]
    pub addressing: Vec<AddressingConfig>,

    /// Static routes (None prefix = default route)
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Attach timing and failure/retry policy
    #[serde(default)]
    pub lte: LteConfig,

    /// Timed actions driving the run
    #[serde(default)]
    pub schedule: Vec<ScheduledAction>,

    /// Inclusive simulation stop time (milliseconds)
    pub stop_time_ms: u64,

    /// Hex-encoded 32-byte RNG seed; random when absent
    #[serde(default)]
    pub seed: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub id: NodeId,
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub id: DeviceId,
    /// Enum-typed fields use the nested-map notation (`kind: {enb: ...}`),
    /// not YAML tags
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub kind: DeviceKind,
    /// Channel the device is wired to at setup; None = left unattached
    #[serde(default)]
    pub channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub propagation_delay_us: u64,
    #[serde(default = "default_data_rate")]
    pub data_rate_bps: u64,
}

fn default_data_rate() -> u64 {
    5_000_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressingConfig {
    pub node: NodeId,
    pub device: DeviceId,
    pub base: Ipv4Addr,
    pub prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub node: NodeId,
    /// None inserts a 0.0.0.0/0 default route
    #[serde(default)]
    pub prefix: Option<Prefix>,
    pub next_hop: Ipv4Addr,
    pub interface: u32,
}

// ============================================================================
// LTE timing / failure policy
// ============================================================================

/// Attach timing constants are configuration, not hard-coded truths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LteConfig {
    /// Virtual time between the RRC request and its response
    pub attach_delay_ms: u64,

    /// Probability an attach attempt fails (0.0 = always succeeds)
    pub attach_failure_probability: f64,

    /// Caller-supplied retry policy applied on attach failure
    pub retry: RetryPolicy,
}

impl Default for LteConfig {
    fn default() -> Self {
        Self {
            attach_delay_ms: 10,
            attach_failure_probability: 0.0,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
    /// Total attach attempts before giving up (1 = no retry)
    pub max_attempts: usize,

    /// Delay before a retry attach request is scheduled
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }
}

// ============================================================================
// Scheduled Actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledAction {
    pub at_ms: u64,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub action: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Attach a UE to an eNodeB (starts the RRC exchange)
    Attach { ue: DeviceId, enb: DeviceId },

    /// Graceful detach of a Connected bearer
    Detach { ue: DeviceId },

    /// Abrupt loss of the radio link
    RadioLinkFailure { ue: DeviceId },

    /// User-plane transmit from a device towards an IPv4 destination,
    /// resolved through the sending node's routing table
    Transmit {
        from: DeviceId,
        to: Ipv4Addr,
        bytes: usize,
    },
}

// ============================================================================
// Loading & Validation
// ============================================================================

impl TopologyConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SimError> {
        let config: TopologyConfig =
            serde_yaml::from_str(yaml).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, SimError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String, SimError> {
        serde_yaml::to_string(self).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), SimError> {
        let mut node_ids = std::collections::BTreeSet::new();
        let mut device_ids = std::collections::BTreeSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id) {
                return Err(SimError::Config(format!("duplicate node id {}", node.id)));
            }
            for device in &node.devices {
                if !device_ids.insert(device.id) {
                    return Err(SimError::Config(format!(
                        "duplicate device id {}",
                        device.id
                    )));
                }
            }
        }

        let mut channel_ids = std::collections::BTreeSet::new();
        for channel in &self.channels {
            if !channel_ids.insert(channel.id) {
                return Err(SimError::Config(format!(
                    "duplicate channel id {}",
                    channel.id
                )));
            }
        }

        for node in &self.nodes {
            for device in &node.devices {
                if let Some(channel) = device.channel {
                    if !channel_ids.contains(&channel) {
                        return Err(SimError::Config(format!(
                            "device {} references undeclared channel {}",
                            device.id, channel
                        )));
                    }
                }
            }
        }

        for entry in &self.addressing {
            if !node_ids.contains(&entry.node) {
                return Err(SimError::Config(format!(
                    "addressing references undeclared node {}",
                    entry.node
                )));
            }
            if !device_ids.contains(&entry.device) {
                return Err(SimError::Config(format!(
                    "addressing references undeclared device {}",
                    entry.device
                )));
            }
        }

        for route in &self.routes {
            if !node_ids.contains(&route.node) {
                return Err(SimError::Config(format!(
                    "route references undeclared node {}",
                    route.node
                )));
            }
        }

        for scheduled in &self.schedule {
            let referenced = match &scheduled.action {
                ActionKind::Attach { ue, enb } => vec![*ue, *enb],
                ActionKind::Detach { ue } | ActionKind::RadioLinkFailure { ue } => vec![*ue],
                ActionKind::Transmit { from, .. } => vec![*from],
            };
            for device in referenced {
                if !device_ids.contains(&device) {
                    return Err(SimError::Config(format!(
                        "scheduled action at {}ms references undeclared device {}",
                        scheduled.at_ms, device
                    )));
                }
            }
        }

        let p = self.lte.attach_failure_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(SimError::Config(format!(
                "attach_failure_probability {} outside [0, 1]",
                p
            )));
        }
        if self.lte.retry.max_attempts == 0 {
            return Err(SimError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if let Some(seed) = &self.seed {
            parse_seed_hex(seed)?;
        }

        Ok(())
    }
}

/// Parse a `0x`-prefixed (or bare) hex string into a 32-byte seed.
///
/// Short input zero-pads the tail; odd-length or over-length hex is
/// rejected rather than silently reinterpreted or truncated.
pub fn parse_seed_hex(hex: &str) -> Result<[u8; 32], SimError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() % 2 != 0 {
        return Err(SimError::Config("seed hex has odd length".into()));
    }
    if hex.len() > 64 {
        return Err(SimError::Config(format!(
            "seed hex is {} chars, 64 is the maximum",
            hex.len()
        )));
    }
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk)
            .map_err(|_| SimError::Config("seed is not valid hex".into()))?;
        seed[i] = u8::from_str_radix(byte_str, 16)
            .map_err(|e| SimError::Config(format!("invalid hex seed: {}", e)))?;
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
meta:
  name: lte-attach
  description: one UE, one eNodeB, shared radio channel
nodes:
  - id: 1
    position: [0.0, 0.0, 0.0]
    devices:
      - id: 10
        kind:
          enb:
            cell_id: 1
        channel: 100
      - id: 11
        kind:
          point_to_point: {}
        channel: 200
  - id: 2
    devices:
      - id: 20
        kind:
          ue: {}
        channel: 100
      - id: 21
        kind:
          point_to_point: {}
        channel: 200
channels:
  - id: 100
    kind: shared
    propagation_delay_us: 2000
  - id: 200
    kind: point_to_point
    propagation_delay_us: 2000
    data_rate_bps: 5000000
addressing:
  - node: 2
    device: 21
    base: 10.1.1.0
    prefix_len: 24
  - node: 1
    device: 11
    base: 10.1.1.0
    prefix_len: 24
routes:
  - node: 2
    next_hop: 10.1.1.1
    interface: 1
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

    #[test]
    fn test_sample_yaml_parses() {
        let config = TopologyConfig::from_yaml_str(SAMPLE_YAML).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.stop_time_ms, 5000);
        assert_eq!(config.lte.attach_delay_ms, 10);
        assert_eq!(config.schedule.len(), 2);
    }

    #[test]
    fn test_unknown_field_is_config_error() {
        let yaml = r#"
nodes: []
channels: []
stop_time_ms: 1000
typo_field: 1
"#;
        assert!(matches!(
            TopologyConfig::from_yaml_str(yaml),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_mistyped_attribute_is_config_error() {
        // tx_power misspelled inside the typed UE attribute block
        let yaml = r#"
nodes:
  - id: 1
    devices:
      - id: 10
        kind:
          ue:
            tx_power: 23.0
channels: []
stop_time_ms: 1000
"#;
        let err = TopologyConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        // the unknown-field check inside the attribute block fires, not a
        // notation mismatch on the enclosing kind enum
        assert!(err.to_string().contains("tx_power"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
nodes:
  - id: 1
    devices: []
  - id: 1
    devices: []
channels: []
stop_time_ms: 1000
"#;
        assert!(matches!(
            TopologyConfig::from_yaml_str(yaml),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_undeclared_channel_rejected() {
        let yaml = r#"
nodes:
  - id: 1
    devices:
      - id: 10
        kind:
          ue: {}
        channel: 999
channels: []
stop_time_ms: 1000
"#;
        assert!(matches!(
            TopologyConfig::from_yaml_str(yaml),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_probability_range_checked() {
        let yaml = r#"
nodes: []
channels: []
lte:
  attach_failure_probability: 1.5
stop_time_ms: 1000
"#;
        assert!(matches!(
            TopologyConfig::from_yaml_str(yaml),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_descriptor_round_trip() {
        let config = TopologyConfig::from_yaml_str(SAMPLE_YAML).unwrap();
        let yaml = config.to_yaml().unwrap();
        let reloaded = TopologyConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_enum_fields_use_nested_map_notation() {
        let config = TopologyConfig::from_yaml_str(SAMPLE_YAML).unwrap();
        let yaml = config.to_yaml().unwrap();

        // device kinds and actions serialize as nested maps, never `!` tags
        assert!(!yaml.contains('!'), "unexpected YAML tag in:\n{}", yaml);
        assert!(yaml.contains("point_to_point:"));
        assert!(yaml.contains("attach:"));
    }

    #[test]
    fn test_seed_hex_parsing() {
        let seed = parse_seed_hex("0x0102ff").unwrap();
        assert_eq!(seed[0], 0x01);
        assert_eq!(seed[1], 0x02);
        assert_eq!(seed[2], 0xff);
        assert_eq!(seed[3], 0x00);

        assert!(parse_seed_hex("0xzz").is_err());
    }

    #[test]
    fn test_seed_hex_length_checked() {
        // a full 64-char seed fills every byte
        let full = parse_seed_hex(&"ff".repeat(32)).unwrap();
        assert_eq!(full, [0xff; 32]);

        // odd length and over-length input are rejected, not reinterpreted
        assert!(parse_seed_hex("0x123").is_err());
        assert!(parse_seed_hex(&"ab".repeat(33)).is_err());
    }
}
