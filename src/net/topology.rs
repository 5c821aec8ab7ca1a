//! 拓扑 arena
//!
//! `Topology` 持有所有节点与所有网络，节点之间、路由器与子网络之间只用
//! `NodeKey`/`NetworkId` 互相引用。任何结构修改都会立即重算受影响设备的
//! `NetId`（见 `addressing.rs`）。

use std::collections::{BTreeMap, BTreeSet};

use super::error::TopologyError;
use super::id::{NetId, NetworkId, NodeKey};
use super::network::Network;
use super::node::{NetNode, NetNodeKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub(crate) nodes: Vec<NetNode>,
    pub(crate) networks: Vec<Network>,
    /// 子网络 -> 指向它的下行路由器（每个子网络至多一个）
    pub(crate) parents: BTreeMap<NetworkId, NodeKey>,
}

impl Topology {
    /// 添加网络
    pub fn add_network(&mut self, name: impl Into<String>) -> NetworkId {
        let id = NetworkId(self.networks.len());
        self.networks.push(Network::new(id, name));
        id
    }

    /// 添加任意种类的节点；`max_connections == None` 表示不限
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: NetNodeKind,
        max_connections: Option<usize>,
    ) -> NodeKey {
        let key = NodeKey(self.nodes.len());
        trace!(node = ?key, kind = kind.label(), "添加节点");
        self.nodes.push(NetNode::new(key, name, kind, max_connections));
        key
    }

    /// 添加设备节点（一台计算机的网卡只有一条连接）
    pub fn add_device(&mut self, name: impl Into<String>) -> NodeKey {
        self.add_node(name, NetNodeKind::device(), Some(1))
    }

    pub fn add_bridge(&mut self, name: impl Into<String>) -> NodeKey {
        self.add_node(name, NetNodeKind::Bridge, None)
    }

    pub fn add_uplink_router(&mut self, name: impl Into<String>) -> NodeKey {
        self.add_node(name, NetNodeKind::UplinkRouter, None)
    }

    pub fn add_downlink_router(&mut self, name: impl Into<String>) -> NodeKey {
        self.add_node(name, NetNodeKind::downlink_router(), None)
    }

    pub fn node(&self, key: NodeKey) -> Option<&NetNode> {
        self.nodes.get(key.0)
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetNode> {
        self.nodes.iter()
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    pub fn network_by_name(&self, name: &str) -> Option<NetworkId> {
        self.networks.iter().find(|n| n.name() == name).map(Network::id)
    }

    /// 节点所在网络中与它直接相连的节点
    pub fn connected_net_nodes(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.node(key)
            .and_then(NetNode::network)
            .and_then(|id| self.network(id))
            .into_iter()
            .flat_map(move |net| net.connected_net_nodes(key))
    }

    /// 指向 `network` 的下行路由器
    pub fn parent_router_of(&self, network: NetworkId) -> Option<NodeKey> {
        self.parents.get(&network).copied()
    }

    /// `network` 中节点编号最小的上行路由器
    pub fn uplink_router_of(&self, network: NetworkId) -> Option<NodeKey> {
        self.network(network)?
            .net_nodes()
            .find(|&k| self.nodes[k.0].is_uplink_router())
    }

    /// 设备当前的分层地址
    pub fn device_net_id(&self, key: NodeKey) -> Option<NetId> {
        self.node(key)?.net_id().cloned()
    }

    /// 持有 `net_id` 的设备
    pub fn device_by_net_id(&self, net_id: &NetId) -> Option<NodeKey> {
        self.nodes
            .iter()
            .find(|n| n.net_id() == Some(net_id))
            .map(NetNode::key)
    }

    fn require_node(&self, key: NodeKey) -> Result<&NetNode, TopologyError> {
        self.node(key).ok_or(TopologyError::UnknownNode(key))
    }

    fn require_network(&self, id: NetworkId) -> Result<&Network, TopologyError> {
        self.network(id).ok_or(TopologyError::UnknownNetwork(id))
    }

    /// 在 `network` 中连接 `a` 与 `b`。
    ///
    /// 尚不属于任何网络的节点会成为 `network` 的成员并获得最小的空闲编号。
    /// 属于其他网络、或超出连接上限时返回错误，且不做任何修改。
    #[tracing::instrument(skip(self))]
    pub fn add_connection(
        &mut self,
        network: NetworkId,
        a: NodeKey,
        b: NodeKey,
    ) -> Result<(), TopologyError> {
        if a == b {
            return Err(TopologyError::SelfConnection(a));
        }
        let net = self.require_network(network)?;
        for key in [a, b] {
            let node = self.require_node(key)?;
            match node.network() {
                Some(current) if current != network => {
                    return Err(TopologyError::NodeInOtherNetwork { node: key, current });
                }
                Some(_) => {}
                None => {
                    // 新加入的下行路由器不能把自己的子网络（或其祖先）放到子网络下面
                    if let Some(sub) = node.sub_network() {
                        if self.tier_contains(sub, network) {
                            return Err(TopologyError::SubNetworkCycle(sub));
                        }
                    }
                }
            }
        }
        if net.has_connection(a, b) {
            trace!("连接已存在");
            return Ok(());
        }
        for key in [a, b] {
            let node = &self.nodes[key.0];
            if !node.accepts_connection(net.connected_net_node_count(key)) {
                return Err(TopologyError::ConnectionLimitExceeded {
                    node: key,
                    max: node.max_connections().unwrap_or(usize::MAX),
                });
            }
        }

        for key in [a, b] {
            if self.nodes[key.0].network.is_none() {
                let node_id = self.networks[network.0].insert_member(key);
                let node = &mut self.nodes[key.0];
                node.network = Some(network);
                node.node_id = Some(node_id);
                debug!(node = ?key, node_id, "节点加入网络");
            }
        }
        self.networks[network.0].add_edge(a, b);
        info!("🔗 建立连接");

        self.refresh_net_ids([network]);
        Ok(())
    }

    /// 删除 `a` 与 `b` 之间的连接，返回连接此前是否存在。
    ///
    /// 删除后没有任何连接的端点会被移出网络（编号释放）。
    #[tracing::instrument(skip(self))]
    pub fn remove_connection(
        &mut self,
        network: NetworkId,
        a: NodeKey,
        b: NodeKey,
    ) -> Result<bool, TopologyError> {
        self.require_network(network)?;
        self.require_node(a)?;
        self.require_node(b)?;
        if !self.networks[network.0].remove_edge(a, b) {
            return Ok(false);
        }
        info!("✂️  断开连接");

        let mut refresh = vec![network];
        for key in [a, b] {
            if self.networks[network.0].connected_net_node_count(key) == 0 {
                refresh.extend(self.detach(network, key));
            }
        }
        self.refresh_net_ids(refresh);
        Ok(true)
    }

    /// 把节点移出它所在的网络，并级联移除因此与网络其余部分失联的子图。
    ///
    /// 返回所有被移除的节点（含 `key` 本身）。不属于任何网络的节点返回空集。
    #[tracing::instrument(skip(self))]
    pub fn remove_net_node(&mut self, key: NodeKey) -> Result<BTreeSet<NodeKey>, TopologyError> {
        let node = self.require_node(key)?;
        let mut removed = BTreeSet::new();
        let Some(network) = node.network() else {
            return Ok(removed);
        };

        let mut refresh = vec![network];
        let neighbors: Vec<NodeKey> = self.networks[network.0].connected_net_nodes(key).collect();
        refresh.extend(self.detach(network, key));
        removed.insert(key);

        // 以前邻居所在的连通分量为候选，保留“网络其余部分”，其他分量随之移除
        let net = &self.networks[network.0];
        let mut components: Vec<BTreeSet<NodeKey>> = Vec::new();
        for n in neighbors {
            if components.iter().any(|c| c.contains(&n)) {
                continue;
            }
            components.push(net.component_of(n));
        }
        let survivor = self.surviving_component(&components);
        for (i, component) in components.into_iter().enumerate() {
            if Some(i) == survivor {
                continue;
            }
            for orphan in component {
                debug!(node = ?orphan, "级联移除失联节点");
                refresh.extend(self.detach(network, orphan));
                removed.insert(orphan);
            }
        }

        info!(removed = removed.len(), "🗑️  移除节点");
        self.refresh_net_ids(refresh);
        Ok(removed)
    }

    /// 包含上行路由器的分量优先；否则取最大的分量，相同大小时取含最小节点编号的。
    fn surviving_component(&self, components: &[BTreeSet<NodeKey>]) -> Option<usize> {
        if let Some(i) = components
            .iter()
            .position(|c| c.iter().any(|k| self.nodes[k.0].is_uplink_router()))
        {
            return Some(i);
        }
        let min_id = |c: &BTreeSet<NodeKey>| {
            c.iter()
                .filter_map(|k| self.nodes[k.0].node_id)
                .min()
                .unwrap_or(u32::MAX)
        };
        components
            .iter()
            .enumerate()
            .max_by(|(_, x), (_, y)| x.len().cmp(&y.len()).then_with(|| min_id(y).cmp(&min_id(x))))
            .map(|(i, _)| i)
    }

    /// 把节点移出网络（清除编号与地址）。若它是挂有子网络的下行路由器，
    /// 返回该子网络以便重算其地址。
    fn detach(&mut self, network: NetworkId, key: NodeKey) -> Option<NetworkId> {
        let node = &mut self.nodes[key.0];
        let node_id = node.node_id.take()?;
        node.network = None;
        if let NetNodeKind::Device { net_id } = &mut node.kind {
            *net_id = None;
        }
        let sub = node.sub_network();
        self.networks[network.0].remove_member(key, node_id);
        debug!(node = ?key, node_id, "节点离开网络");
        sub
    }

    /// 设置（或清除）下行路由器的子网络。
    #[tracing::instrument(skip(self))]
    pub fn set_sub_network(
        &mut self,
        router: NodeKey,
        sub_network: Option<NetworkId>,
    ) -> Result<(), TopologyError> {
        let node = self.require_node(router)?;
        let NetNodeKind::DownlinkRouter { sub_network: old } = node.kind else {
            return Err(TopologyError::NotADownlinkRouter(router));
        };
        if old == sub_network {
            return Ok(());
        }
        if let Some(sub) = sub_network {
            self.require_network(sub)?;
            if let Some(&owner) = self.parents.get(&sub) {
                return Err(TopologyError::SubNetworkAlreadyAttached { network: sub, router: owner });
            }
            if let Some(home) = node.network() {
                if self.tier_contains(sub, home) {
                    return Err(TopologyError::SubNetworkCycle(sub));
                }
            }
        }

        if let Some(prev) = old {
            self.parents.remove(&prev);
        }
        if let Some(sub) = sub_network {
            self.parents.insert(sub, router);
        }
        self.nodes[router.0].kind = NetNodeKind::DownlinkRouter { sub_network };
        info!(old = ?old, new = ?sub_network, "🔀 下行路由器更换子网络");

        self.refresh_net_ids(old.into_iter().chain(sub_network));
        Ok(())
    }
}
