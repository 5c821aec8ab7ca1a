//! 节点类型
//!
//! 网络节点是一个带标签的联合体：设备、网桥、上行路由器、下行路由器。
//! 节点之间不持有彼此的引用，下行路由器只记录子网络的 `NetworkId`。

use super::id::{NetId, NetworkId, NodeKey};
use serde::{Deserialize, Serialize};

/// 节点种类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetNodeKind {
    /// 叶子节点，代表一台计算机的网卡；`net_id` 随拓扑变化被立即重算。
    Device { net_id: Option<NetId> },
    /// 只做转发的节点
    Bridge,
    /// 子网络通往父网络的出口
    UplinkRouter,
    /// 父网络通往子网络的入口
    DownlinkRouter { sub_network: Option<NetworkId> },
}

impl NetNodeKind {
    pub fn device() -> Self {
        NetNodeKind::Device { net_id: None }
    }

    pub fn downlink_router() -> Self {
        NetNodeKind::DownlinkRouter { sub_network: None }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NetNodeKind::Device { .. } => "device",
            NetNodeKind::Bridge => "bridge",
            NetNodeKind::UplinkRouter => "uplink_router",
            NetNodeKind::DownlinkRouter { .. } => "downlink_router",
        }
    }
}

/// 拓扑中的一个节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetNode {
    key: NodeKey,
    name: String,
    pub(crate) kind: NetNodeKind,
    /// `None` 表示不限连接数
    max_connections: Option<usize>,
    pub(crate) network: Option<NetworkId>,
    /// 所属网络内的节点编号；不属于任何网络时为 `None`
    pub(crate) node_id: Option<u32>,
}

impl NetNode {
    pub(crate) fn new(
        key: NodeKey,
        name: impl Into<String>,
        kind: NetNodeKind,
        max_connections: Option<usize>,
    ) -> Self {
        Self {
            key,
            name: name.into(),
            kind,
            max_connections,
            network: None,
            node_id: None,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NetNodeKind {
        &self.kind
    }

    pub fn max_connections(&self) -> Option<usize> {
        self.max_connections
    }

    pub fn network(&self) -> Option<NetworkId> {
        self.network
    }

    pub fn node_id(&self) -> Option<u32> {
        self.node_id
    }

    /// 是否还能再接受一条连接
    pub fn accepts_connection(&self, current: usize) -> bool {
        self.max_connections.is_none_or(|max| current < max)
    }

    /// 设备的分层地址；非设备节点总是 `None`
    pub fn net_id(&self) -> Option<&NetId> {
        match &self.kind {
            NetNodeKind::Device { net_id } => net_id.as_ref(),
            _ => None,
        }
    }

    /// 下行路由器指向的子网络
    pub fn sub_network(&self) -> Option<NetworkId> {
        match self.kind {
            NetNodeKind::DownlinkRouter { sub_network } => sub_network,
            _ => None,
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self.kind, NetNodeKind::Device { .. })
    }

    pub fn is_uplink_router(&self) -> bool {
        matches!(self.kind, NetNodeKind::UplinkRouter)
    }

    pub fn is_downlink_router(&self) -> bool {
        matches!(self.kind, NetNodeKind::DownlinkRouter { .. })
    }
}
