//! 注册在 socket 上的数据处理器

use serde_json::Value;

use super::host::SocketHost;
use super::socket::Socket;

/// 应用层数据处理器。处理器可以在回调中发送数据或断开 socket；
/// 断开后本轮剩余的排队数据不再交付。
pub trait PacketHandler {
    fn handle(&mut self, socket: &mut Socket, host: &mut dyn SocketHost, data: &Value);
}

impl<F> PacketHandler for F
where
    F: FnMut(&mut Socket, &mut dyn SocketHost, &Value),
{
    fn handle(&mut self, socket: &mut Socket, host: &mut dyn SocketHost, data: &Value) {
        self(socket, host, data)
    }
}
