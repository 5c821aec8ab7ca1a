//! Socket 与宿主之间的接口。
//!
//! `NodeNetInterface` 是计算机的网卡，知道本机 `NetId` 并负责把包送上线路；
//! `SocketHost` 是 socket 运行时看到的宿主，即网卡加上序列号策略。

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::net::{NetId, Packet};

/// 计算机的网卡硬件
pub trait NodeNetInterface {
    /// 当前解析到的本机地址；不在任何分层网络中时为 `None`
    fn net_id(&self) -> Option<NetId>;

    /// 把数据包交给线路发送
    fn process(&mut self, packet: Packet);
}

/// socket 运行时可用的宿主能力
pub trait SocketHost {
    fn local_net_id(&self) -> Option<NetId>;

    /// 为一次握手生成初始序列号
    fn next_sequence(&mut self, local_port: u16) -> u32;

    fn transmit(&mut self, packet: Packet);
}

/// 初始序列号策略
pub trait SequenceGenerator: fmt::Debug {
    fn next_sequence(&mut self, local_port: u16) -> u32;
}

static NEXT_SEQUENCE: AtomicU32 = AtomicU32::new(1);

/// 默认策略：进程内唯一的递增计数器
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterSequence;

impl SequenceGenerator for CounterSequence {
    fn next_sequence(&mut self, _local_port: u16) -> u32 {
        NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    }
}

/// 确定性策略：序列号等于本地端口
#[derive(Debug, Default, Clone, Copy)]
pub struct PortSequence;

impl SequenceGenerator for PortSequence {
    fn next_sequence(&mut self, local_port: u16) -> u32 {
        u32::from(local_port)
    }
}
