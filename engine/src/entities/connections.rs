//! Connections: the links of the network.
//!
//! A connection joins two nodes and owns the pipes installed on it over
//! time as an [`AssetSeries`]. Supply connections run from a source to its
//! offtake municipality; peer connections run between municipalities,
//! possibly across province borders. A connection has no activity state of
//! its own: it is active exactly when its endpoints are.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assets::{Asset, AssetSeries, DecommissionRegistry};

/// What a connection joins. The destination node is always a municipality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// From a water source to its offtake municipality
    Supply {
        /// Source at the upstream end
        source_id: String,
    },
    /// Between two municipalities
    Peer {
        /// Municipality at the upstream end
        from_municipality_id: String,
    },
}

/// A network link carrying its pipe history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique id ("CS…" for supply, "CG…"/"CP…" for peer links)
    pub id: String,

    /// Upstream endpoint
    pub kind: ConnectionKind,

    /// Downstream municipality
    pub to_municipality_id: String,

    /// Length of the link (km); also the cost quantity of pipe installs
    pub distance: f64,

    /// Minor loss coefficient of the link
    pub minor_loss_coeff: f64,

    /// Pipes installed on this connection over time
    pub pipes: AssetSeries,
}

impl Connection {
    /// Create a connection with an empty pipe series.
    pub fn new(
        id: impl Into<String>,
        kind: ConnectionKind,
        to_municipality_id: impl Into<String>,
        distance: f64,
        minor_loss_coeff: f64,
    ) -> Self {
        let id = id.into();
        let pipes = AssetSeries::new(id.clone());
        Self {
            id,
            kind,
            to_municipality_id: to_municipality_id.into(),
            distance,
            minor_loss_coeff,
            pipes,
        }
    }

    /// Upstream source id for supply connections.
    pub fn source_id(&self) -> Option<&str> {
        match &self.kind {
            ConnectionKind::Supply { source_id } => Some(source_id),
            ConnectionKind::Peer { .. } => None,
        }
    }

    /// Upstream municipality id for peer connections.
    pub fn from_municipality_id(&self) -> Option<&str> {
        match &self.kind {
            ConnectionKind::Peer {
                from_municipality_id,
            } => Some(from_municipality_id),
            ConnectionKind::Supply { .. } => None,
        }
    }

    /// The pipe active at `when`, if any.
    pub fn active_pipe(&self, registry: &DecommissionRegistry, when: NaiveDate) -> Option<&Asset> {
        self.pipes.active_asset(registry, when)
    }

    /// Whether a pipe is active at `when`.
    pub fn has_active_pipe(&self, registry: &DecommissionRegistry, when: NaiveDate) -> bool {
        self.active_pipe(registry, when).is_some()
    }
}
