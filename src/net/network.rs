//! 单层网络图
//!
//! `Network` 只记录成员、节点编号和无向边；节点本身存放在
//! [`Topology`](super::Topology) 的 arena 中。所有修改都经由 `Topology`，
//! 以便同时维护节点上的 `network`/`node_id` 字段和设备地址。

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::id::{NetworkId, NodeKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    id: NetworkId,
    name: String,
    /// node_id -> 成员
    members: BTreeMap<u32, NodeKey>,
    /// 无向邻接表，每个成员都有一项（可能为空）
    adjacency: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
}

impl Network {
    pub(crate) fn new(id: NetworkId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: BTreeMap::new(),
            adjacency: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所有成员，按节点编号升序
    pub fn net_nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.members.values().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains_net_node(&self, node: NodeKey) -> bool {
        self.adjacency.contains_key(&node)
    }

    /// 与 `node` 直接相连的节点；`node` 不是成员时为空
    pub fn connected_net_nodes(&self, node: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.adjacency.get(&node).into_iter().flatten().copied()
    }

    pub fn connected_net_node_count(&self, node: NodeKey) -> usize {
        self.adjacency.get(&node).map_or(0, BTreeSet::len)
    }

    pub fn net_node_by_node_id(&self, node_id: u32) -> Option<NodeKey> {
        self.members.get(&node_id).copied()
    }

    pub fn has_connection(&self, a: NodeKey, b: NodeKey) -> bool {
        self.adjacency.get(&a).is_some_and(|n| n.contains(&b))
    }

    /// 所有无向边，每条只出现一次（`a < b`）
    pub fn connections(&self) -> impl Iterator<Item = (NodeKey, NodeKey)> + '_ {
        self.adjacency
            .iter()
            .flat_map(|(&a, nbrs)| nbrs.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
    }

    /// 当前未被占用的最小节点编号
    pub(crate) fn lowest_free_node_id(&self) -> u32 {
        let mut candidate = 0;
        for &used in self.members.keys() {
            if used != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }

    pub(crate) fn insert_member(&mut self, node: NodeKey) -> u32 {
        let node_id = self.lowest_free_node_id();
        self.members.insert(node_id, node);
        self.adjacency.entry(node).or_default();
        node_id
    }

    /// 移除成员及其所有边，返回失去连接的邻居
    pub(crate) fn remove_member(&mut self, node: NodeKey, node_id: u32) -> BTreeSet<NodeKey> {
        self.members.remove(&node_id);
        let nbrs = self.adjacency.remove(&node).unwrap_or_default();
        for n in &nbrs {
            if let Some(set) = self.adjacency.get_mut(n) {
                set.remove(&node);
            }
        }
        nbrs
    }

    pub(crate) fn add_edge(&mut self, a: NodeKey, b: NodeKey) {
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub(crate) fn remove_edge(&mut self, a: NodeKey, b: NodeKey) -> bool {
        let removed = self.adjacency.get_mut(&a).is_some_and(|n| n.remove(&b));
        if let Some(n) = self.adjacency.get_mut(&b) {
            n.remove(&a);
        }
        removed
    }

    /// 从 `start` 出发能到达的所有成员（含 `start`）
    pub(crate) fn component_of(&self, start: NodeKey) -> BTreeSet<NodeKey> {
        let mut seen = BTreeSet::new();
        if !self.contains_net_node(start) {
            return seen;
        }
        let mut q = VecDeque::from([start]);
        seen.insert(start);
        while let Some(v) = q.pop_front() {
            for n in self.connected_net_nodes(v) {
                if seen.insert(n) {
                    q.push_back(n);
                }
            }
        }
        seen
    }
}
