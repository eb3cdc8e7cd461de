pub mod config;
pub mod routes;
pub mod session;
pub mod status;
pub mod types;
pub mod validate;

pub use config::{Config, ConfigError};
pub use routes::{gate, DashboardRoute, GateDecision, Route};
pub use session::{Access, ActiveOrganization, AuthState, Session};
pub use status::{aggregate_status, partition_incidents, recent_incidents, StatusColor, SystemStatus};
pub use types::*;
pub use validate::{FieldError, ValidationErrors};
