//! identity entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use meshdir_types::{DomainPublicKey, IdentityRecord, Label};

/// identity database model.
///
/// one row per user id; `domain_name` carries a unique index so label
/// ownership is enforced by the database as well as the registry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "identities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub domain_name: Option<String>,
    pub server_domain: Option<String>,
    /// public key in its canonical text form (`ed25519:<hex>`).
    pub public_key: Option<String>,
    pub last_seen_online: Option<DateTime<Utc>>,
    pub last_route_registration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for IdentityRecord {
    fn from(model: Model) -> Self {
        // stored values were validated on the write path; a row that
        // fails to parse is treated as unassigned rather than fatal
        let domain_name = model.domain_name.as_deref().and_then(|s| Label::parse(s).ok());
        let public_key = model
            .public_key
            .as_deref()
            .and_then(|s| DomainPublicKey::from_text(s).ok());

        IdentityRecord {
            domain_name,
            server_domain: model.server_domain,
            public_key,
            last_seen_online: model.last_seen_online,
            last_route_registration: model.last_route_registration,
        }
    }
}
