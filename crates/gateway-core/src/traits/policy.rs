//! Authorization policy lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::TenantId;

/// One `(resource, action)` permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Resource name, e.g. `orders`.
    pub resource: String,
    /// Action on the resource, e.g. `read`.
    pub action: String,
}

impl PolicyRule {
    /// Build a rule.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// The routing keyword for this rule: `{resource}_{action}`.
    pub fn keyword(&self) -> String {
        format!("{}_{}", self.resource, self.action)
    }
}

/// Answers which rules apply to a tenant and role.
#[async_trait]
pub trait PolicyEngine: Send + Sync + 'static {
    /// Rules granted to `role` within `tenant`.
    async fn rules_for(&self, tenant: &TenantId, role: &str) -> AppResult<Vec<PolicyRule>>;
}
