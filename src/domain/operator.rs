// ==========================================
// 养殖场存栏核心 - 操作人角色接口
// ==========================================
// 写操作需要管理员类角色；dry-run 不校验
// ==========================================

/// 允许执行写操作的角色
pub const ADMIN_ROLES: [&str; 3] = ["SuperAdmin", "Administrator", "System"];

// ==========================================
// Trait: RoleChecker
// ==========================================
pub trait RoleChecker {
    /// 操作人标识（写入审计信息）
    fn name(&self) -> &str;

    /// 是否拥有指定角色（大小写敏感）
    fn has_role(&self, role: &str) -> bool;

    /// 是否允许写入
    fn can_mutate(&self) -> bool {
        ADMIN_ROLES.iter().any(|r| self.has_role(r))
    }
}

// ==========================================
// SystemOperator - 命令行/调度器身份
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SystemOperator;

impl RoleChecker for SystemOperator {
    fn name(&self) -> &str {
        "system"
    }

    fn has_role(&self, role: &str) -> bool {
        role == "System"
    }
}

// ==========================================
// NamedOperator - 具名操作人（固定角色集合）
// ==========================================
#[derive(Debug, Clone)]
pub struct NamedOperator {
    pub name: String,
    pub roles: Vec<String>,
}

impl NamedOperator {
    pub fn new(name: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            name: name.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl RoleChecker for NamedOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
