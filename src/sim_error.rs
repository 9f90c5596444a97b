// Error taxonomy for the simulation core.
//
// Config and InvalidHandle are fatal (the run never starts / a programming
// error). BearerNotReady, AttachFailure and RoutingNotFound are expected
// runtime conditions: the core records them and the run continues.

use crate::sim_interface::{BearerId, ChannelId, DeviceId, NodeId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// Malformed or missing topology fields; the simulation does not start
    #[error("configuration error: {0}")]
    Config(String),

    /// Duplicate cancel, or cancel of a handle that was already dispatched
    #[error("invalid event handle (seq {0})")]
    InvalidHandle(u64),

    /// User-plane transmit issued while the bearer was not Connected
    #[error("bearer {0} not ready for user-plane traffic")]
    BearerNotReady(BearerId),

    /// Attach attempt failed; the bearer re-entered Idle
    #[error("attach failed on bearer {bearer} (attempt {attempt})")]
    AttachFailure { bearer: BearerId, attempt: usize },

    /// No routing entry matched the destination
    #[error("no route to {0}")]
    RoutingNotFound(std::net::Ipv4Addr),

    /// Topology wiring referenced a node that does not exist
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Topology wiring referenced a device that does not exist
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    /// Topology wiring referenced a channel that does not exist
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// Transmit issued on a device that is not wired to any channel
    #[error("device {0} is not attached to a channel")]
    NotAttached(DeviceId),

    /// Attribute write on a device currently attached to a channel;
    /// channel-dependent parameters require detach + reattach
    #[error("device {0} attributes are frozen while attached")]
    AttributesFrozen(DeviceId),
}

impl SimError {
    /// Recoverable errors are counted and traced; the run loop continues.
    /// Everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::BearerNotReady(_)
                | SimError::AttachFailure { .. }
                | SimError::RoutingNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(SimError::BearerNotReady(1).is_recoverable());
        assert!(SimError::AttachFailure {
            bearer: 1,
            attempt: 2
        }
        .is_recoverable());
        assert!(SimError::RoutingNotFound("10.1.1.9".parse().unwrap()).is_recoverable());

        assert!(!SimError::Config("missing nodes".into()).is_recoverable());
        assert!(!SimError::InvalidHandle(7).is_recoverable());
        assert!(!SimError::UnknownDevice(3).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = SimError::BearerNotReady(4);
        assert_eq!(err.to_string(), "bearer 4 not ready for user-plane traffic");

        let err = SimError::Config("unknown field `foo`".into());
        assert_eq!(err.to_string(), "configuration error: unknown field `foo`");
    }
}
