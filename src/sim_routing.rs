// Address assignment and static per-node routing tables.
//
// Tables are populated once after topology and bearers are established and
// are immutable for the rest of the run. Lookup failure is reported, never
// retried; the caller decides whether to drop or queue.

use std::net::Ipv4Addr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::sim_error::SimError;

// ============================================================================
// Prefixes
// ============================================================================

/// An IPv4 destination prefix (network address + prefix length)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prefix {
    pub base: Ipv4Addr,
    pub prefix_len: u8,
}

impl Prefix {
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, SimError> {
        if prefix_len > 32 {
            return Err(SimError::Config(format!(
                "prefix length {} out of range (0-32)",
                prefix_len
            )));
        }
        // canonicalize so 10.1.1.7/24 and 10.1.1.0/24 compare equal
        let mask = Self::mask_bits(prefix_len);
        Ok(Self {
            base: Ipv4Addr::from(u32::from(base) & mask),
            prefix_len,
        })
    }

    /// The catch-all prefix used for default routes
    pub fn default_route() -> Self {
        Self {
            base: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
        }
    }

    fn mask_bits(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len as u32)
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = Self::mask_bits(self.prefix_len);
        u32::from(addr) & mask == u32::from(self.base)
    }
}

// ============================================================================
// Routing Table
// ============================================================================

/// Next-hop entry; immutable once inserted for a given run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub prefix: Prefix,
    pub next_hop: Ipv4Addr,
    pub interface: u32,
}

/// Static routing table for one node, keyed uniquely by destination prefix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    entries: HashMap<Prefix, RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; a duplicate prefix is a population bug.
    pub fn insert(&mut self, entry: RoutingEntry) -> Result<(), SimError> {
        if self.entries.contains_key(&entry.prefix) {
            return Err(SimError::Config(format!(
                "duplicate route for {}/{}",
                entry.prefix.base, entry.prefix.prefix_len
            )));
        }
        self.entries.insert(entry.prefix, entry);
        Ok(())
    }

    /// Longest-prefix match.
    ///
    /// Equal-length candidates covering the same address are necessarily
    /// the same network, so the winner is unique.
    pub fn lookup(&self, destination: Ipv4Addr) -> Result<&RoutingEntry, SimError> {
        self.entries
            .values()
            .filter(|e| e.prefix.contains(destination))
            .max_by_key(|e| e.prefix.prefix_len)
            .ok_or(SimError::RoutingNotFound(destination))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.entries.values()
    }
}

// ============================================================================
// Address Allocation
// ============================================================================

/// Hands out consecutive host addresses under a base prefix, starting at
/// host 1 (host 0 is the network address).
#[derive(Debug, Clone, PartialEq)]
pub struct AddressAllocator {
    prefix: Prefix,
    next_host: u32,
}

impl AddressAllocator {
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, SimError> {
        let prefix = Prefix::new(base, prefix_len)?;
        if prefix_len > 30 {
            return Err(SimError::Config(format!(
                "prefix /{} leaves no assignable host addresses",
                prefix_len
            )));
        }
        Ok(Self {
            prefix,
            next_host: 1,
        })
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    /// Next unassigned address under the prefix.
    pub fn assign(&mut self) -> Result<Ipv4Addr, SimError> {
        let host_bits = 32 - self.prefix.prefix_len as u32;
        let broadcast_host = (1u64 << host_bits) - 1;
        if self.next_host as u64 >= broadcast_host {
            return Err(SimError::Config(format!(
                "address pool {}/{} exhausted",
                self.prefix.base, self.prefix.prefix_len
            )));
        }
        let addr = Ipv4Addr::from(u32::from(self.prefix.base) | self.next_host);
        self.next_host += 1;
        Ok(addr)
    }
}
