//! 分层地址（NetId）的推导与重算
//!
//! 一个网络的“层前缀”由它向上经过的下行路由器编号组成：网络 C 挂在
//! 网络 P 的下行路由器 D 之下时，C 的前缀是 `prefix(P) ++ [D.node_id]`。
//! 既没有被任何下行路由器引用、也不含上行路由器的网络是顶层，前缀为空。
//! 设备地址是 `prefix(所在网络) ++ [设备编号]`。
//!
//! 层链断开（子网络没有上行路由器，下行路由器不在任何网络中，或含上行
//! 路由器的网络不再挂在任何下行路由器下）时，该子网络及其下方所有设备的
//! 地址都是 `None`。

use std::collections::BTreeSet;

use super::id::{NetId, NetworkId};
use super::node::NetNodeKind;
use super::topology::Topology;
use tracing::{debug, trace};

impl Topology {
    /// 网络的层前缀；层链断开时为 `None`
    pub fn tier_prefix(&self, network: NetworkId) -> Option<Vec<u32>> {
        let mut prefix = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = network;
        while let Some(&router) = self.parents.get(&current) {
            if !seen.insert(current) {
                return None;
            }
            self.uplink_router_of(current)?;
            let router = &self.nodes[router.0];
            prefix.push(router.node_id()?);
            current = router.network()?;
        }
        // 含上行路由器的网络属于下层，脱离父层后不能冒充顶层
        if self.uplink_router_of(current).is_some() {
            return None;
        }
        prefix.reverse();
        Some(prefix)
    }

    /// `network` 是否就是 `ancestor`，或位于 `ancestor` 之下的某一层
    pub(crate) fn tier_contains(&self, ancestor: NetworkId, network: NetworkId) -> bool {
        let mut seen = BTreeSet::new();
        let mut current = network;
        loop {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                return false;
            }
            let Some(parent) = self
                .parents
                .get(&current)
                .and_then(|r| self.nodes[r.0].network())
            else {
                return false;
            };
            current = parent;
        }
    }

    /// 重算 `roots` 及其下方所有子网络中设备的地址
    pub(crate) fn refresh_net_ids(&mut self, roots: impl IntoIterator<Item = NetworkId>) {
        let mut stack: Vec<NetworkId> = roots.into_iter().collect();
        let mut seen = BTreeSet::new();
        while let Some(network) = stack.pop() {
            if !seen.insert(network) {
                continue;
            }
            let prefix = self.tier_prefix(network);
            trace!(network = ?network, prefix = ?prefix, "重算网络内设备地址");
            let members: Vec<_> = self.networks[network.0].net_nodes().collect();
            for key in members {
                let node = &mut self.nodes[key.0];
                let node_id = node.node_id;
                match &mut node.kind {
                    NetNodeKind::Device { net_id } => {
                        let fresh = prefix.as_ref().zip(node_id).map(|(p, id)| {
                            let mut components = p.clone();
                            components.push(id);
                            NetId::new(components)
                        });
                        if *net_id != fresh {
                            debug!(node = ?key, old = ?net_id, new = ?fresh, "📮 设备地址变更");
                            *net_id = fresh;
                        }
                    }
                    NetNodeKind::DownlinkRouter { sub_network: Some(sub) } => stack.push(*sub),
                    _ => {}
                }
            }
        }
    }
}
