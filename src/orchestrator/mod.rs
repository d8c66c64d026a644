//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话生命周期的调度，是整个系统的"指挥中心"。
//!
//! ### `session_manager` - 会话管理器
//! - 启动前置检查（凭据、打码 API key、余额）
//! - 单飞托管：并发触发只跑一轮协议
//! - 有界重试：按失败分类决定重跑还是放弃
//! - 会话入库，向下游暴露消费接口
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::SessionManager (会话生命周期)
//!     ↓
//! workflow::LoginFlow (一轮登录的状态机)
//!     ↓
//! clients (叶子客户端：门户页面 / 打码服务)
//! services (叶子能力：谜题求解 / 会话存储)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：流程层管一轮，编排层管周期与并发
//! 2. **向下依赖**：编排层 → workflow → clients/services
//! 3. **无业务逻辑**：只做调度、重试和统计，不碰协议细节

pub mod session_manager;

// 重新导出主要类型
pub use session_manager::SessionManager;
