//! 统计信息
//!
//! 定义网络仿真统计数据结构。

use serde::Serialize;

/// 网络统计信息
#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    /// 成功找到路由并上线的数据包
    pub sent_pkts: u64,
    pub delivered_pkts: u64,
    /// 无路由、目的计算机不存在或已关机而丢弃的数据包
    pub dropped_pkts: u64,
}
