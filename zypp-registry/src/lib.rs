//! Repository and service registry: INI-backed persistence, add/remove/
//! modify, and service reconciliation (spec §4.7).

pub mod history;
pub mod ini_format;
pub mod plugin;
pub mod reconcile;
pub mod repo_store;
pub mod service_store;

pub use ini_format::IniFormatError;
pub use plugin::{PluginEvent, PluginEventSender};
pub use reconcile::{refresh_service, ServiceBackend, ServiceError};
pub use repo_store::{RegistryError, RepoRegistry};
pub use service_store::ServiceRegistry;
