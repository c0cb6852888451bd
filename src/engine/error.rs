// ==========================================
// 养殖场存栏核心 - 引擎层错误类型
// ==========================================
// 单目标调用: 直接上抛给操作人（非零退出码）
// 批量调用: 逐单元捕获、记录、继续
// ==========================================

use crate::domain::operator::{RoleChecker, ADMIN_ROLES};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求的批次/记录不存在
    #[error("资源未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    /// 参数组合不合法（在任何写入之前中止）
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 操作人无写入权限
    #[error("权限不足: actor={actor}, 需要角色之一: {required}")]
    PermissionDenied { actor: String, required: String },

    /// 读写失败（事务已回滚）
    #[error("持久化失败: {0}")]
    Persistence(#[from] RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否为“目标不存在”（含仓储层上报的 NotFound）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound { .. } | EngineError::Persistence(RepositoryError::NotFound { .. })
        )
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Persistence(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

/// 写操作前的角色校验
pub(crate) fn ensure_can_mutate(operator: &dyn RoleChecker) -> EngineResult<()> {
    if operator.can_mutate() {
        return Ok(());
    }
    Err(EngineError::PermissionDenied {
        actor: operator.name().to_string(),
        required: ADMIN_ROLES.join("/"),
    })
}
