//! Declarative registries the convention engine converges the database
//! schema against: the enum registry feeding type-table synchronization and
//! the trigger-rule registry feeding trigger provisioning.

pub mod enums;
pub mod triggers;

pub use enums::{kebab_case, EnumId, EnumMember};
pub use triggers::{EventSpec, Timing, TriggerRule};
