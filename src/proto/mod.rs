//! 传输层：每台计算机的网络模块与可靠 socket。

mod handler;
mod host;
mod net_module;
mod socket;

pub use handler::PacketHandler;
pub use host::{CounterSequence, NodeNetInterface, PortSequence, SequenceGenerator, SocketHost};
pub use net_module::{EPHEMERAL_PORT_START, NetModule, NetModuleError, SocketId};
pub use socket::{Socket, SocketConfig, SocketState};
