//! recordstack — schema-convention engine for business records over
//! PostgreSQL.
//!
//! The engine operates on an open, evolving set of entity tables sharing a
//! canonical column shape. It converges the live schema against two
//! declarative registries and exposes the generic operations every
//! per-entity command wrapper calls through to:
//!
//! - [`registry::enums`] + [`sync`]: a closed enum registry projected into
//!   per-entity type tables, idempotently.
//! - [`registry::triggers`] + [`provision`]: declarative trigger rules
//!   converged into live trigger bindings, partition children excluded.
//! - [`records`]: generic create / list / get / revoke / process,
//!   type resolution, and the polymorphic association primitives.
//!
//! All dynamic identifier handling is funneled through [`ident`]; audit
//! stamping requires an explicit [`actor::ActorContext`] on every mutation.

pub mod actor;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod ident;
pub mod provision;
pub mod records;
pub mod registry;
pub mod sync;

pub use actor::ActorContext;
pub use config::DatabaseConfig;
pub use database::DatabaseManager;
pub use error::{Result, StackError};
pub use records::{
    ListFilter, NewRecord, RecordService, RecordSummary, TableRef, TypeRow,
};
pub use registry::{EnumId, EnumMember, TriggerRule};
