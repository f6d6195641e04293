//! 身份系统的出箱接线（outbox-identity）
//!
//! 为组织身份后端的各业务域提供出箱命名空间与处理器：
//! - 下游协作方协议（`collaborators`）：审计、发布、会话失效
//! - 各命名空间模块：`user`、`group`、`app`、`config`、`share`
//! - `register_namespaces`：一次性完成全部命名空间的注册
//!
//! 业务仓储只需在自己的事务内 `enqueue`、提交后 `notify`，
//! 协作方的调用时机与重试全部交由引擎负责。
//!
pub mod app;
pub mod collaborators;
pub mod config;
pub mod group;
pub mod share;
pub mod user;

pub use collaborators::{AuditEntry, AuditLogClient, EventPublisher, SessionRevoker};

use outbox_engine::{OutboxEngine, OutboxResult, OutboxStore};
use std::sync::Arc;

/// 全部下游协作方的依赖包（显式注入，不经任何全局单例）
#[derive(Clone)]
pub struct IdentityCollaborators {
    pub audit: Arc<dyn AuditLogClient>,
    pub publisher: Arc<dyn EventPublisher>,
    pub sessions: Arc<dyn SessionRevoker>,
}

/// 注册身份系统的全部出箱命名空间并启动各自的调度任务。
/// 应在进程初始化阶段调用一次；重复调用会因命名空间已存在而报错。
pub fn register_namespaces<S: OutboxStore>(
    engine: &OutboxEngine<S>,
    deps: &IdentityCollaborators,
) -> OutboxResult<()> {
    engine.register(user::registry(deps.audit.clone(), deps.sessions.clone())?)?;
    engine.register(group::registry(deps.audit.clone(), deps.publisher.clone())?)?;
    engine.register(app::registry(deps.audit.clone(), deps.sessions.clone())?)?;
    engine.register(config::registry(deps.audit.clone(), deps.publisher.clone())?)?;
    engine.register(share::registry(deps.audit.clone(), deps.publisher.clone())?)?;
    tracing::info!("identity outbox namespaces registered");
    Ok(())
}
