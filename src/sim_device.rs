// Nodes, devices and channels.
//
// Device variants form a closed set {UE, ENB, PointToPoint}, each with its
// own strongly-typed attribute struct. Attribute defaults come from the
// modeled LTE setup: UE 23 dBm / 2 dB / 2 GHz, eNodeB 30 dBm / 5 dB / 2 GHz
// with EARFCN 50 down / 19250 up, point-to-point links at 5 Mbps.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::sim_error::SimError;
use crate::sim_interface::{CellId, ChannelId, DeviceId, NodeId, SimTime};

// ============================================================================
// Typed Device Attributes
// ============================================================================

/// Radio attributes of a user-equipment device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct UeAttributes {
    /// Transmission power in dBm
    pub tx_power_dbm: f64,
    /// Antenna gain in dB
    pub antenna_gain_db: f64,
    /// Center frequency in Hz
    pub center_frequency_hz: u64,
}

impl Default for UeAttributes {
    fn default() -> Self {
        Self {
            tx_power_dbm: 23.0,
            antenna_gain_db: 2.0,
            center_frequency_hz: 2_000_000_000,
        }
    }
}

/// Radio attributes of a base-station device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EnbAttributes {
    pub tx_power_dbm: f64,
    pub antenna_gain_db: f64,
    pub center_frequency_hz: u64,
    /// Serving cell identity advertised to attaching UEs
    pub cell_id: CellId,
    /// Downlink EARFCN
    pub dl_earfcn: u32,
    /// Uplink EARFCN
    pub ul_earfcn: u32,
}

impl Default for EnbAttributes {
    fn default() -> Self {
        Self {
            tx_power_dbm: 30.0,
            antenna_gain_db: 5.0,
            center_frequency_hz: 2_000_000_000,
            cell_id: 1,
            dl_earfcn: 50,
            ul_earfcn: 19250,
        }
    }
}

/// Attributes of a wired point-to-point device (backhaul side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct P2pAttributes {
    /// Link data rate in bits per second
    pub data_rate_bps: u64,
}

impl Default for P2pAttributes {
    fn default() -> Self {
        Self {
            data_rate_bps: 5_000_000,
        }
    }
}

/// Closed device variant set; dispatch is by matching, not inheritance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Ue(UeAttributes),
    Enb(EnbAttributes),
    PointToPoint(P2pAttributes),
}

impl DeviceKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Ue(_) => "ue",
            DeviceKind::Enb(_) => "enb",
            DeviceKind::PointToPoint(_) => "point_to_point",
        }
    }

    /// Radio devices (UE/ENB) carry bearers; point-to-point devices do not.
    pub fn is_radio(&self) -> bool {
        !matches!(self, DeviceKind::PointToPoint(_))
    }
}

// ============================================================================
// Devices, Nodes, Channels
// ============================================================================

/// A network device owned by a node, immutable type after creation
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub node: NodeId,
    pub kind: DeviceKind,
    pub channel: Option<ChannelId>,
}

/// A simulated node: id, its devices in creation order, optional position
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    pub id: NodeId,
    pub devices: Vec<DeviceId>,
    pub position: Option<[f64; 3]>,
}

/// Medium access mode of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Transmit fans out to every other attached device
    Shared,
    /// Exactly two endpoints; transmit targets the single peer
    PointToPoint,
}

/// Shared transmission medium; no single owning device
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub propagation_delay: SimTime,
    pub data_rate_bps: u64,
    /// Attached devices in attach order - fan-out iterates this order
    pub devices: IndexSet<DeviceId>,
}

// ============================================================================
// Network Registry
// ============================================================================

/// All nodes, devices and channels of one topology.
///
/// Registries are insertion-ordered so a rebuilt topology compares equal
/// field-for-field and broadcast fan-out order is reproducible.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimNetwork {
    pub nodes: IndexMap<NodeId, SimNode>,
    pub devices: IndexMap<DeviceId, Device>,
    pub channels: IndexMap<ChannelId, Channel>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, position: Option<[f64; 3]>) {
        self.nodes.insert(
            id,
            SimNode {
                id,
                devices: Vec::new(),
                position,
            },
        );
    }

    pub fn add_device(&mut self, id: DeviceId, node: NodeId, kind: DeviceKind) -> Result<(), SimError> {
        let owner = self.nodes.get_mut(&node).ok_or(SimError::UnknownNode(node))?;
        owner.devices.push(id);
        self.devices.insert(
            id,
            Device {
                id,
                node,
                kind,
                channel: None,
            },
        );
        Ok(())
    }

    pub fn add_channel(&mut self, id: ChannelId, kind: ChannelKind, propagation_delay: SimTime, data_rate_bps: u64) {
        self.channels.insert(
            id,
            Channel {
                id,
                kind,
                propagation_delay,
                data_rate_bps,
                devices: IndexSet::new(),
            },
        );
    }

    pub fn device(&self, id: DeviceId) -> Result<&Device, SimError> {
        self.devices.get(&id).ok_or(SimError::UnknownDevice(id))
    }

    pub fn channel(&self, id: ChannelId) -> Result<&Channel, SimError> {
        self.channels.get(&id).ok_or(SimError::UnknownChannel(id))
    }

    /// Wire a device onto a channel. Attribute values freeze at this point.
    pub fn attach(&mut self, device: DeviceId, channel: ChannelId) -> Result<(), SimError> {
        let Some(ch) = self.channels.get_mut(&channel) else {
            return Err(SimError::UnknownChannel(channel));
        };
        let Some(dev) = self.devices.get_mut(&device) else {
            return Err(SimError::UnknownDevice(device));
        };
        dev.channel = Some(channel);
        ch.devices.insert(device);
        Ok(())
    }

    /// Remove a device from its channel, unfreezing its attributes.
    pub fn detach(&mut self, device: DeviceId) -> Result<(), SimError> {
        let dev = self
            .devices
            .get_mut(&device)
            .ok_or(SimError::UnknownDevice(device))?;
        let Some(channel) = dev.channel.take() else {
            return Err(SimError::NotAttached(device));
        };
        if let Some(ch) = self.channels.get_mut(&channel) {
            ch.devices.shift_remove(&device);
        }
        Ok(())
    }

    /// Mutable access to device attributes; only legal while detached.
    pub fn attributes_mut(&mut self, device: DeviceId) -> Result<&mut DeviceKind, SimError> {
        let dev = self
            .devices
            .get_mut(&device)
            .ok_or(SimError::UnknownDevice(device))?;
        if dev.channel.is_some() {
            return Err(SimError::AttributesFrozen(device));
        }
        Ok(&mut dev.kind)
    }

    /// Channel the device is wired to.
    pub fn channel_of(&self, device: DeviceId) -> Result<&Channel, SimError> {
        let dev = self.device(device)?;
        let channel = dev.channel.ok_or(SimError::NotAttached(device))?;
        self.channel(channel)
    }

    /// Delivery targets for a transmission from `source`.
    ///
    /// Shared channels broadcast to every other attached device in attach
    /// order; point-to-point channels target the single peer.
    pub fn fan_out(&self, source: DeviceId) -> Result<Vec<DeviceId>, SimError> {
        let channel = self.channel_of(source)?;
        let peers: Vec<DeviceId> = channel
            .devices
            .iter()
            .copied()
            .filter(|d| *d != source)
            .collect();
        match channel.kind {
            ChannelKind::PointToPoint => Ok(peers.into_iter().take(1).collect()),
            ChannelKind::Shared => Ok(peers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_interface::millis;

    fn radio_network() -> SimNetwork {
        let mut net = SimNetwork::new();
        net.add_node(1, None);
        net.add_node(2, Some([100.0, 0.0, 0.0]));
        net.add_node(3, None);
        net.add_device(10, 1, DeviceKind::Enb(EnbAttributes::default()))
            .unwrap();
        net.add_device(20, 2, DeviceKind::Ue(UeAttributes::default()))
            .unwrap();
        net.add_device(30, 3, DeviceKind::Ue(UeAttributes::default()))
            .unwrap();
        net.add_channel(100, ChannelKind::Shared, millis(2), 0);
        net
    }

    #[test]
    fn test_attribute_defaults_match_modeled_setup() {
        let ue = UeAttributes::default();
        assert_eq!(ue.tx_power_dbm, 23.0);
        assert_eq!(ue.antenna_gain_db, 2.0);
        assert_eq!(ue.center_frequency_hz, 2_000_000_000);

        let enb = EnbAttributes::default();
        assert_eq!(enb.tx_power_dbm, 30.0);
        assert_eq!(enb.cell_id, 1);
        assert_eq!(enb.dl_earfcn, 50);
        assert_eq!(enb.ul_earfcn, 19250);

        assert_eq!(P2pAttributes::default().data_rate_bps, 5_000_000);
    }

    #[test]
    fn test_shared_channel_broadcasts_in_attach_order() {
        let mut net = radio_network();
        net.attach(10, 100).unwrap();
        net.attach(20, 100).unwrap();
        net.attach(30, 100).unwrap();

        // source excluded, order follows attach order
        assert_eq!(net.fan_out(20).unwrap(), vec![10, 30]);
        assert_eq!(net.fan_out(10).unwrap(), vec![20, 30]);
    }

    #[test]
    fn test_point_to_point_targets_single_peer() {
        let mut net = SimNetwork::new();
        net.add_node(1, None);
        net.add_node(2, None);
        net.add_device(11, 1, DeviceKind::PointToPoint(P2pAttributes::default()))
            .unwrap();
        net.add_device(21, 2, DeviceKind::PointToPoint(P2pAttributes::default()))
            .unwrap();
        net.add_channel(200, ChannelKind::PointToPoint, millis(2), 5_000_000);
        net.attach(11, 200).unwrap();
        net.attach(21, 200).unwrap();

        assert_eq!(net.fan_out(11).unwrap(), vec![21]);
        assert_eq!(net.fan_out(21).unwrap(), vec![11]);
    }

    #[test]
    fn test_attributes_freeze_while_attached() {
        let mut net = radio_network();
        net.attach(20, 100).unwrap();

        assert_eq!(
            net.attributes_mut(20).unwrap_err(),
            SimError::AttributesFrozen(20)
        );

        // reattachment unfreezes
        net.detach(20).unwrap();
        if let DeviceKind::Ue(attrs) = net.attributes_mut(20).unwrap() {
            attrs.tx_power_dbm = 20.0;
        } else {
            panic!("expected UE device");
        }
        net.attach(20, 100).unwrap();
        assert!(net.channel_of(20).is_ok());
    }

    #[test]
    fn test_transmit_requires_attachment() {
        let net = radio_network();
        assert_eq!(net.fan_out(20).unwrap_err(), SimError::NotAttached(20));
    }

    #[test]
    fn test_unknown_wiring_is_fatal() {
        let mut net = radio_network();
        assert_eq!(net.attach(99, 100).unwrap_err(), SimError::UnknownDevice(99));
        assert_eq!(net.attach(20, 999).unwrap_err(), SimError::UnknownChannel(999));
        assert_eq!(
            net.add_device(40, 99, DeviceKind::Ue(UeAttributes::default()))
                .unwrap_err(),
            SimError::UnknownNode(99)
        );
    }
}
