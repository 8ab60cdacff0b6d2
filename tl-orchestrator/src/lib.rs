//! Discovery Orchestrator and Delta Engine (C6), and the tenant registry
//! they share
//!
//! This crate is the seam between the per-tenant algorithmic core
//! (C1/C3/C4/C5) and the external-facing facade: it owns tenant
//! lifecycle, dispatches community enumeration onto a worker pool, and
//! keeps each tenant's loop cache current either by full discovery or
//! by incremental delta maintenance.
#![deny(missing_docs)]

mod delta;
mod discovery;
mod tenant;
mod worker_pool;

pub use delta::{DeltaEngine, DeltaOutcome};
pub use discovery::{DiscoveryMetadata, DiscoveryOpts, DiscoveryOrchestrator};
pub use tenant::{TenantHandle, TenantRegistry};
pub use worker_pool::CommunityWorkerPool;
