// shellhop: 经由跳板机链路连接目标主机
//
// 模块结构:
// - models: 持久化数据 (主机、密钥、known hosts、设置)
// - services: 本地存储
// - ssh: 会话原语及其 russh 实现
// - chain: 链路解析、建立、拆除
// - state: 终端注册表
// - manager: 终端生命周期管理

pub mod chain;
pub mod manager;
pub mod models;
pub mod services;
pub mod ssh;
pub mod state;

pub use manager::{TerminalEvent, TerminalEventReceiver, TerminalManager};
