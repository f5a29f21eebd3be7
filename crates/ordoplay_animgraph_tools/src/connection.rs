// SPDX-License-Identifier: MIT OR Apache-2.0
//! Links between node pins.

use crate::node::NodeId;
use crate::pin::PinId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A pin addressed through its owning node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef {
    /// Owning node
    pub node: NodeId,
    /// Pin on that node
    pub pin: PinId,
}

impl PinRef {
    /// Address `pin` on `node`
    pub fn new(node: NodeId, pin: PinId) -> Self {
        Self { node, pin }
    }
}

/// Value flow from an output pin into an input pin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Output pin producing the value
    pub source: PinRef,
    /// Input pin consuming the value
    pub target: PinRef,
}

impl Connection {
    /// Link `source` into `target`
    pub fn new(source: PinRef, target: PinRef) -> Self {
        Self {
            id: ConnectionId::new(),
            source,
            target,
        }
    }

    /// Whether either end sits on `node_id`
    pub fn touches_node(&self, node_id: NodeId) -> bool {
        self.source.node == node_id || self.target.node == node_id
    }

    /// Whether either end is `pin_id`
    pub fn touches_pin(&self, pin_id: PinId) -> bool {
        self.source.pin == pin_id || self.target.pin == pin_id
    }

    /// Whether this connection feeds the input `pin_id`
    pub fn feeds(&self, pin_id: PinId) -> bool {
        self.target.pin == pin_id
    }
}
