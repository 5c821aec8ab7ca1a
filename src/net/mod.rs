//! 网络模拟模块
//!
//! 此模块包含网络拓扑（节点、分层网络、地址）、路由、数据包，以及把
//! 拓扑与计算机组合起来的仿真世界。

// 子模块声明
mod addressing;
mod deliver_packet;
mod error;
mod id;
mod net_world;
mod network;
mod node;
mod packet;
mod routing;
mod stats;
mod topology;

// 重新导出公共接口
pub use deliver_packet::{DeliverPacket, TickComputers};
pub use error::{RouteError, TopologyError};
pub use id::{NetId, NetworkId, NodeKey};
pub use net_world::{Computer, ComputerId, DeviceInterface, NetWorld, WorldConfig};
pub use network::Network;
pub use node::{NetNode, NetNodeKind};
pub use packet::{Address, Handshake, Keepalive, Packet, Payload, TCP_PROTOCOL};
pub use routing::{NodeMatcher, shortest_path};
pub use stats::Stats;
pub use topology::Topology;
