//! shared types for the meshdir control plane.
//!
//! this crate holds the domain vocabulary used by every other crate:
//! user ids, subdomain labels, route descriptions, key text forms and
//! the server configuration.

pub mod config;
pub mod identity;
pub mod keys;
pub mod label;
pub mod route;
pub mod user_id;

pub use config::{CaConfig, Config, DatabaseConfig};
pub use identity::{IdentityPatch, IdentityRecord};
pub use keys::{DomainPublicKey, KeyError, parse_signature_text};
pub use label::{Label, LabelError, RESERVED_LABELS};
pub use route::{HealthCheck, Route, RouteError, RouteInput, RouteKind, RouteScheme};
pub use user_id::UserId;
