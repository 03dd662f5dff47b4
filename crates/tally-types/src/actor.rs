use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::StaffId;

/// Authority level of whoever performs an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Manager,
    /// Automated work: sweeps, scheduled verification.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Manager => "manager",
            Self::System => "system",
        }
    }
}

/// Who performed an operation, and from where.
///
/// Authentication happens upstream; the ledger trusts what it is given.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub staff_id: Option<StaffId>,
    pub role: Role,
    #[serde(default)]
    pub terminal_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn staff(staff_id: StaffId) -> Self {
        Self::with_role(Some(staff_id), Role::Staff)
    }

    pub fn manager(staff_id: StaffId) -> Self {
        Self::with_role(Some(staff_id), Role::Manager)
    }

    pub fn system() -> Self {
        Self::with_role(None, Role::System)
    }

    fn with_role(staff_id: Option<StaffId>, role: Role) -> Self {
        Self {
            staff_id,
            role,
            terminal_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn on_terminal(mut self, terminal_id: impl Into<String>) -> Self {
        self.terminal_id = Some(terminal_id.into());
        self
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.staff_id {
            Some(id) => write!(f, "{}({id})", self.role.as_str()),
            None => f.write_str(self.role.as_str()),
        }
    }
}
