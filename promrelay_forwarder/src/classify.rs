use promrelay_resources::{TenantKey, TenantRule, WriteQuery};

/// Maps write queries to tenants.
///
/// Rules are evaluated in declaration order and the first rule whose filter
/// accepts the query's tags wins; queries no rule matches belong to the
/// default tenant. Stateless, safe to call from any task.
#[derive(Debug, Clone)]
pub struct TenantClassifier {
    rules: Vec<TenantRule>,
    tenant_default: TenantKey,
}

impl TenantClassifier {
    pub fn new(rules: Vec<TenantRule>, tenant_default: TenantKey) -> Self {
        Self {
            rules,
            tenant_default,
        }
    }

    pub fn classify(&self, query: &WriteQuery) -> TenantKey {
        for rule in &self.rules {
            if rule.filter.matches(query.tags()) {
                return rule.tenant.clone();
            }
        }
        self.tenant_default.clone()
    }
}
