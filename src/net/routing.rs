//! 路由：网络内最短路径 + 跨层转发
//!
//! 单层内使用 BFS 求最短跳数路径（按发现顺序打破平局）。跨层时：
//! - 目的地址落在当前网络的层前缀之下：在本层找到对应编号的节点；若地址还有
//!   更深的分量，该节点必须是下行路由器，随后进入其子网络的上行路由器。
//! - 否则：走到本层的上行路由器，跳到父网络中指向本网络的下行路由器。

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::error::RouteError;
use super::id::{NetId, NodeKey};
use super::node::NetNode;
use super::topology::Topology;
use tracing::{debug, trace};

/// 路径搜索的目标谓词
pub trait NodeMatcher {
    fn matches(&self, node: &NetNode) -> bool;
}

impl<F> NodeMatcher for F
where
    F: Fn(&NetNode) -> bool,
{
    fn matches(&self, node: &NetNode) -> bool {
        self(node)
    }
}

/// 从 `source` 出发的最短路径，终点是第一个满足 `matcher` 的节点（含两端）。
///
/// `source` 本身满足时返回单元素路径；找不到时返回 `None`。
pub fn shortest_path(
    topology: &Topology,
    source: NodeKey,
    matcher: &dyn NodeMatcher,
) -> Option<Vec<NodeKey>> {
    let start = topology.node(source)?;
    if matcher.matches(start) {
        return Some(vec![source]);
    }

    let mut prev: BTreeMap<NodeKey, NodeKey> = BTreeMap::new();
    let mut seen = BTreeSet::from([source]);
    let mut q = VecDeque::from([source]);
    while let Some(v) = q.pop_front() {
        for n in topology.connected_net_nodes(v) {
            if !seen.insert(n) {
                continue;
            }
            prev.insert(n, v);
            let Some(node) = topology.node(n) else {
                continue;
            };
            if matcher.matches(node) {
                let mut path = vec![n];
                let mut cur = n;
                while let Some(&p) = prev.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                trace!(hops = path.len() - 1, "找到最短路径");
                return Some(path);
            }
            q.push_back(n);
        }
    }
    None
}

impl Topology {
    /// 计算从设备 `source` 到地址 `destination` 的完整节点路径（含两端）。
    #[tracing::instrument(skip(self), fields(destination = %destination))]
    pub fn route(&self, source: NodeKey, destination: &NetId) -> Result<Vec<NodeKey>, RouteError> {
        let src = self.node(source).ok_or(RouteError::UnknownNode(source))?;
        if src.net_id().is_none() {
            return Err(RouteError::NoLocalNetId(source));
        }
        let no_route = || RouteError::NoRoute {
            destination: destination.clone(),
        };

        let mut path = vec![source];
        let mut current = source;
        // 每一层至多经过两次（上行一次、下行一次）
        let budget = self.networks.len().saturating_mul(2).saturating_add(1);
        for _ in 0..budget {
            let network = self.nodes[current.0].network().ok_or_else(no_route)?;
            let prefix = self.tier_prefix(network).ok_or_else(no_route)?;
            let inside = destination.len() > prefix.len() && destination.starts_with(&prefix);

            if inside {
                let target_id = destination.components()[prefix.len()];
                let is_last = destination.len() == prefix.len() + 1;
                let matcher = |n: &NetNode| n.network() == Some(network) && n.node_id() == Some(target_id);
                let segment = shortest_path(self, current, &matcher).ok_or_else(no_route)?;
                path.extend(segment.into_iter().skip(1));
                let Some(&target) = path.last() else {
                    return Err(no_route());
                };
                let target_node = &self.nodes[target.0];
                if is_last {
                    if !target_node.is_device() {
                        return Err(no_route());
                    }
                    debug!(hops = path.len() - 1, "📍 路由完成");
                    return Ok(path);
                }
                // 下行：进入子网络的上行路由器
                let sub = target_node.sub_network().ok_or_else(no_route)?;
                let entry = self.uplink_router_of(sub).ok_or_else(no_route)?;
                trace!(router = ?target, sub = ?sub, "进入子网络");
                path.push(entry);
                current = entry;
            } else {
                // 上行：走到本层出口，再跳到父网络的下行路由器
                let uplink = self.uplink_router_of(network).ok_or_else(no_route)?;
                let parent = self.parent_router_of(network).ok_or_else(no_route)?;
                let segment =
                    shortest_path(self, current, &|n: &NetNode| n.key() == uplink).ok_or_else(no_route)?;
                path.extend(segment.into_iter().skip(1));
                trace!(uplink = ?uplink, parent = ?parent, "离开子网络");
                path.push(parent);
                current = parent;
            }
        }
        Err(no_route())
    }
}
