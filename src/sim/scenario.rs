//! 场景描述（JSON）
//!
//! 用名称而不是句柄描述网络、节点、连接、子网络挂载和计算机，
//! 由 [`ScenarioSpec::build`] 构建成 `NetWorld`。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::net::{NetNodeKind, NetWorld, NetworkId, NodeKey, Topology, TopologyError, WorldConfig};
use crate::proto::{NetModule, SocketConfig};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scenario json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown network `{0}`")]
    UnknownNetwork(String),

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("duplicate name `{0}`")]
    DuplicateName(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    pub networks: Vec<NetworkSpec>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub sub_networks: Vec<SubNetworkSpec>,
    #[serde(default)]
    pub computers: Vec<ComputerSpec>,
    #[serde(default)]
    pub world: Option<WorldConfig>,
    #[serde(default)]
    pub socket: Option<SocketConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindSpec {
    Device,
    Bridge,
    UplinkRouter,
    DownlinkRouter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKindSpec,
    /// 不填时设备为 1，其他节点不限
    #[serde(default)]
    pub max_connections: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub network: String,
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubNetworkSpec {
    pub router: String,
    pub network: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerSpec {
    pub name: String,
    pub device: String,
}

impl ScenarioSpec {
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// 构建世界。任何名称解析或拓扑错误都会中止构建。
    pub fn build(&self) -> Result<NetWorld, ScenarioError> {
        let mut topology = Topology::default();

        let mut networks: BTreeMap<&str, NetworkId> = BTreeMap::new();
        for spec in &self.networks {
            let id = topology.add_network(spec.name.as_str());
            if networks.insert(spec.name.as_str(), id).is_some() {
                return Err(ScenarioError::DuplicateName(spec.name.clone()));
            }
        }
        let mut nodes: BTreeMap<&str, NodeKey> = BTreeMap::new();
        for spec in &self.nodes {
            let (kind, default_max) = match spec.kind {
                NodeKindSpec::Device => (NetNodeKind::device(), Some(1)),
                NodeKindSpec::Bridge => (NetNodeKind::Bridge, None),
                NodeKindSpec::UplinkRouter => (NetNodeKind::UplinkRouter, None),
                NodeKindSpec::DownlinkRouter => (NetNodeKind::downlink_router(), None),
            };
            let key = topology.add_node(spec.name.as_str(), kind, spec.max_connections.or(default_max));
            if nodes.insert(spec.name.as_str(), key).is_some() {
                return Err(ScenarioError::DuplicateName(spec.name.clone()));
            }
        }

        let network = |name: &str| {
            networks
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownNetwork(name.to_string()))
        };
        let node = |name: &str| {
            nodes
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownNode(name.to_string()))
        };

        for c in &self.connections {
            topology.add_connection(network(c.network.as_str())?, node(c.a.as_str())?, node(c.b.as_str())?)?;
        }
        for s in &self.sub_networks {
            topology.set_sub_network(node(s.router.as_str())?, Some(network(s.network.as_str())?))?;
        }
        debug!(
            networks = networks.len(),
            nodes = nodes.len(),
            connections = self.connections.len(),
            "拓扑构建完成"
        );

        let mut world = NetWorld::new(topology, self.world.clone().unwrap_or_default());
        let socket_config = self.socket.clone().unwrap_or_default();
        for c in &self.computers {
            let device = node(c.device.as_str())?;
            world.add_computer_with(c.name.as_str(), device, NetModule::new(socket_config.clone()));
        }
        info!(computers = self.computers.len(), "🌐 场景构建完成");
        Ok(world)
    }
}
