//! 仿真核心模块
//!
//! 此模块包含 tick 时间、世界级事件仿真器、socket 级可取消定时器，以及场景描述。

// 子模块声明
mod event;
mod scenario;
mod scheduled;
mod scheduler;
mod simulator;
mod time;
mod world;

// 重新导出公共接口
pub use event::Event;
pub use scenario::{
    ComputerSpec, ConnectionSpec, NetworkSpec, NodeKindSpec, NodeSpec, ScenarioError, ScenarioSpec,
    SubNetworkSpec,
};
pub use scheduler::{Scheduler, TimerId};
pub use simulator::Simulator;
pub use time::Tick;
pub use world::World;
