//! bugtrack-core library.
//!
//! Project membership, role-based authorization, and the bug lifecycle
//! engine, over a pluggable [`store::Store`].
//!
//! # Conventions
//!
//! - **Errors**: domain operations return [`error::Result`]; storage glue
//!   (opening databases, loading config) returns `anyhow::Result`.
//! - **Logging**: `tracing` macros; `warn!` on every rejected operation.
//! - **Actors**: the acting [`model::User`] is always an explicit argument.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod lock;
pub mod membership;
pub mod model;
pub mod policy;
pub mod projects;
pub mod store;

use identity::IdentityStore;
use lifecycle::{BugDefaults, BugLifecycle};
use membership::MembershipRegistry;
use projects::ProjectService;
use store::Store;

/// Entry point bundling every service over one store.
pub struct Tracker<'s> {
    store: &'s dyn Store,
    defaults: BugDefaults,
}

impl<'s> Tracker<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self {
            store,
            defaults: BugDefaults::default(),
        }
    }

    #[must_use]
    pub const fn with_bug_defaults(mut self, defaults: BugDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn identity(&self) -> IdentityStore<'s> {
        IdentityStore::new(self.store)
    }

    pub fn members(&self) -> MembershipRegistry<'s> {
        MembershipRegistry::new(self.store)
    }

    pub fn projects(&self) -> ProjectService<'s> {
        ProjectService::new(self.store)
    }

    pub fn bugs(&self) -> BugLifecycle<'s> {
        BugLifecycle::new(self.store).with_defaults(self.defaults)
    }
}
