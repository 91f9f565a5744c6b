//! Authorization keywords: the routing tags a client may receive.
//!
//! A client's keyword set is its principal id plus `{resource}_{action}` for
//! every policy rule granted to its tenant and role. Broadcasts carry tags
//! and reach only clients whose set intersects them.

use std::collections::HashSet;

use async_trait::async_trait;

use gateway_core::config::policy::PolicyConfig;
use gateway_core::result::AppResult;
use gateway_core::traits::{PolicyEngine, PolicyRule};
use gateway_core::types::{SessionRecord, TenantId};

/// Routing tags computed once per connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet(HashSet<String>);

impl KeywordSet {
    /// Compute the keywords for an authenticated session.
    pub async fn for_session(policy: &dyn PolicyEngine, record: &SessionRecord) -> AppResult<Self> {
        let rules = policy
            .rules_for(&record.scope.tenant_id, &record.scope.role)
            .await?;
        let mut keywords: HashSet<String> = rules.iter().map(PolicyRule::keyword).collect();
        keywords.insert(record.principal_id.as_str().to_string());
        Ok(Self(keywords))
    }

    /// Whether any of `tags` is in the set.
    pub fn intersects(&self, tags: &[&str]) -> bool {
        tags.iter().any(|tag| self.0.contains(*tag))
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.contains(keyword)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Policy engine backed by the `[policy]` configuration section.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyEngine {
    config: PolicyConfig,
}

impl StaticPolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PolicyEngine for StaticPolicyEngine {
    async fn rules_for(&self, tenant: &TenantId, role: &str) -> AppResult<Vec<PolicyRule>> {
        let mut rules = Vec::new();
        for grant in &self.config.grants {
            let tenant_matches = grant
                .tenant
                .as_deref()
                .is_none_or(|t| t == tenant.as_str());
            if !tenant_matches || grant.role != role {
                continue;
            }
            for action in &grant.actions {
                let rule = PolicyRule::new(grant.resource.clone(), action.clone());
                if !rules.contains(&rule) {
                    rules.push(rule);
                }
            }
        }
        Ok(rules)
    }
}
