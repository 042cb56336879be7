//! Mutation type to endpoint routing.

use std::collections::HashMap;

use thiserror::Error;

use crate::models::MutationType;

/// No endpoint is configured for a mutation type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("No endpoint configured for '{0}' actions")]
    Unmapped(MutationType),
}

/// Fixed `type -> endpoint` table used when replaying queued mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    routes: HashMap<MutationType, String>,
}

impl DispatchTable {
    /// An empty table. Every lookup fails until routes are added.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Adds or replaces the endpoint for `mutation_type`.
    pub fn with_route(mut self, mutation_type: MutationType, endpoint: impl Into<String>) -> Self {
        self.routes.insert(mutation_type, endpoint.into());
        self
    }

    /// Applies overrides on top of the current routes.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (MutationType, S)>,
        S: Into<String>,
    {
        for (mutation_type, endpoint) in overrides {
            self.routes.insert(mutation_type, endpoint.into());
        }
        self
    }

    /// Removes the route for `mutation_type`.
    pub fn without_route(mut self, mutation_type: MutationType) -> Self {
        self.routes.remove(&mutation_type);
        self
    }

    pub fn resolve(&self, mutation_type: MutationType) -> Result<&str, DispatchError> {
        self.routes
            .get(&mutation_type)
            .map(String::as_str)
            .ok_or(DispatchError::Unmapped(mutation_type))
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::empty()
            .with_route(MutationType::Appointment, "/api/appointments")
            .with_route(MutationType::Document, "/api/medical-records/upload")
            .with_route(MutationType::Message, "/api/forum/posts")
            .with_route(MutationType::Review, "/api/reviews")
    }
}
