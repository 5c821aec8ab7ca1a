//! 拓扑与路由错误

use super::id::{NetId, NetworkId, NodeKey};
use thiserror::Error;

/// 拓扑结构修改失败。失败时拓扑保持原状。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeKey),

    #[error("unknown network {0:?}")]
    UnknownNetwork(NetworkId),

    #[error("node {0:?} cannot be connected to itself")]
    SelfConnection(NodeKey),

    #[error("node {node:?} already belongs to network {current:?}")]
    NodeInOtherNetwork { node: NodeKey, current: NetworkId },

    #[error("node {node:?} would exceed its connection limit of {max}")]
    ConnectionLimitExceeded { node: NodeKey, max: usize },

    #[error("node {0:?} is not a downlink router")]
    NotADownlinkRouter(NodeKey),

    #[error("network {network:?} is already attached below router {router:?}")]
    SubNetworkAlreadyAttached { network: NetworkId, router: NodeKey },

    #[error("attaching network {0:?} would create a tier cycle")]
    SubNetworkCycle(NetworkId),
}

/// 无法为数据包找到路径
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("source node {0:?} has no network address")]
    NoLocalNetId(NodeKey),

    #[error("no route to {destination}")]
    NoRoute { destination: NetId },

    #[error("unknown node {0:?}")]
    UnknownNode(NodeKey),
}
