use std::collections::HashSet;

use crate::models::Actor;

/// Identity of the caller for one request, as established upstream.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub service_name: String,
    pub username: Option<String>,
    /// Opaque role-grant strings; only membership is consulted
    pub role_grants: HashSet<String>,
}

impl RequestContext {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_grants.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.service_name.clone(), self.username.clone())
    }
}
