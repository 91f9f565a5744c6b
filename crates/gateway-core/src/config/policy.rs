//! Static authorization rules used by the built-in policy engine.

use serde::{Deserialize, Serialize};

/// Rules keyed by role, optionally narrowed to a tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Rule grants.
    #[serde(default)]
    pub grants: Vec<PolicyGrant>,
}

/// A set of `(resource, action)` pairs granted to a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyGrant {
    /// Tenant the grant applies to; `None` applies to every tenant.
    #[serde(default)]
    pub tenant: Option<String>,
    /// Role the grant applies to.
    pub role: String,
    /// Resource name, e.g. `orders`.
    pub resource: String,
    /// Actions on the resource, e.g. `read`.
    pub actions: Vec<String>,
}
