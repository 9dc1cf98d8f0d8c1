//! storage layer for meshdir.
//!
//! this crate provides:
//! - the identity registry: a durable store of identity records
//!   (sqlite or postgresql through sea-orm)
//! - the ephemeral store client: ttl'd keys and sorted sets backing
//!   route leases and the activity tracker (redis in production, an
//!   in-memory implementation for tests and development)

#![warn(missing_docs)]

mod entity;
mod error;
pub mod ephemeral;
mod migration;

pub use error::Error;
pub use ephemeral::{EphemeralStore, MemoryStore, RedisStore, ScoreBound};

use std::future::Future;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database as SeaOrmDatabase, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;

use meshdir_types::{DatabaseConfig, IdentityPatch, IdentityRecord, UserId};

/// result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// identity registry trait.
///
/// the registry is the authoritative mapping between a user id, a
/// subdomain label and the public signing key that authenticates every
/// mutation. label uniqueness is enforced on every write that touches
/// `domain_name`.
pub trait IdentityStore: Send + Sync {
    /// ping the store to verify connectivity.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// get a record by user id. returns `None` if absent.
    fn get_by_id(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<IdentityRecord>>> + Send;

    /// find the record owning a label. callers lowercase at the boundary.
    fn get_by_domain(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<Option<(UserId, IdentityRecord)>>> + Send;

    /// merge-write a record, creating it when absent.
    ///
    /// `None` patch fields are ignored; an all-`None` patch is rejected.
    /// a `domain_name` in the patch must be unowned or already owned by
    /// this user id.
    fn upsert(
        &self,
        user_id: &UserId,
        patch: IdentityPatch,
    ) -> impl Future<Output = Result<IdentityRecord>> + Send;

    /// hard-delete a record.
    fn delete(&self, user_id: &UserId) -> impl Future<Output = Result<()>> + Send;

    /// release a domain assignment: unset `domain_name` and `public_key`
    /// while keeping the record.
    fn clear_domain_assignment(&self, user_id: &UserId)
    -> impl Future<Output = Result<()>> + Send;

    /// write the current time to `last_seen_online`. fails with
    /// [`Error::NotFound`] when the record does not exist.
    fn touch_heartbeat(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<DateTime<Utc>>> + Send;

    /// write the current time to `last_route_registration`.
    fn touch_route_registration(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<DateTime<Utc>>> + Send;
}

/// the identity registry implementation using sea-orm.
#[derive(Clone)]
pub struct MeshdirDb {
    conn: DatabaseConnection,
}

impl MeshdirDb {
    /// create a new database connection from config and run migrations.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = Self::build_connection_url(config)?;
        let conn: DatabaseConnection = SeaOrmDatabase::connect(&url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// build a sea-orm compatible connection url from config.
    fn build_connection_url(config: &DatabaseConfig) -> Result<String> {
        match config.db_type.as_str() {
            "sqlite" => {
                let path = if config.connection_string.starts_with("sqlite:") {
                    config.connection_string.clone()
                } else {
                    format!("sqlite:{}", config.connection_string)
                };
                // ?mode=rwc creates the file if it doesn't exist
                if path.contains('?') {
                    Ok(path)
                } else {
                    Ok(format!("{}?mode=rwc", path))
                }
            }
            "postgres" | "postgresql" => Ok(config.connection_string.clone()),
            other => Err(Error::InvalidData(format!(
                "unsupported database type: {}",
                other
            ))),
        }
    }

    /// create an in-memory sqlite database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn: DatabaseConnection = SeaOrmDatabase::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        Ok(())
    }
}

impl IdentityStore for MeshdirDb {
    async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_by_id(&self, user_id: &UserId) -> Result<Option<IdentityRecord>> {
        let result = entity::identity::Entity::find_by_id(user_id.as_str())
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn get_by_domain(&self, label: &str) -> Result<Option<(UserId, IdentityRecord)>> {
        let result = entity::identity::Entity::find()
            .filter(entity::identity::Column::DomainName.eq(label))
            .one(&self.conn)
            .await?;
        Ok(result.map(|model| (UserId::new(model.user_id.clone()), model.into())))
    }

    async fn upsert(&self, user_id: &UserId, patch: IdentityPatch) -> Result<IdentityRecord> {
        if patch.is_empty() {
            return Err(Error::EmptyUpdate);
        }

        // label ownership check before any write; the unique index backs
        // this up against races
        if let Some(label) = &patch.domain_name {
            if let Some((owner, _)) = self.get_by_domain(label.as_str()).await? {
                if owner != *user_id {
                    return Err(Error::DomainNotOwned(label.to_string()));
                }
            }
        }

        let existing = entity::identity::Entity::find_by_id(user_id.as_str())
            .one(&self.conn)
            .await?;
        let now = Utc::now();

        let model = match existing {
            Some(model) => {
                let mut am: entity::identity::ActiveModel = model.into();
                if let Some(label) = patch.domain_name {
                    am.domain_name = Set(Some(label.to_string()));
                }
                if let Some(server_domain) = patch.server_domain {
                    am.server_domain = Set(Some(server_domain));
                }
                if let Some(key) = patch.public_key {
                    am.public_key = Set(Some(key.to_text()));
                }
                if let Some(seen) = patch.last_seen_online {
                    am.last_seen_online = Set(Some(seen));
                }
                if let Some(reg) = patch.last_route_registration {
                    am.last_route_registration = Set(Some(reg));
                }
                am.updated_at = Set(now);
                am.update(&self.conn).await?
            }
            None => {
                let am = entity::identity::ActiveModel {
                    user_id: Set(user_id.as_str().to_string()),
                    domain_name: Set(patch.domain_name.map(|l| l.to_string())),
                    server_domain: Set(patch.server_domain),
                    public_key: Set(patch.public_key.map(|k| k.to_text())),
                    last_seen_online: Set(patch.last_seen_online),
                    last_route_registration: Set(patch.last_route_registration),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                am.insert(&self.conn).await?
            }
        };

        Ok(model.into())
    }

    async fn delete(&self, user_id: &UserId) -> Result<()> {
        entity::identity::Entity::delete_by_id(user_id.as_str())
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    async fn clear_domain_assignment(&self, user_id: &UserId) -> Result<()> {
        use sea_orm::sea_query::Expr;

        entity::identity::Entity::update_many()
            .col_expr(
                entity::identity::Column::DomainName,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                entity::identity::Column::PublicKey,
                Expr::value(Option::<String>::None),
            )
            .col_expr(entity::identity::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(entity::identity::Column::UserId.eq(user_id.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    async fn touch_heartbeat(&self, user_id: &UserId) -> Result<DateTime<Utc>> {
        use sea_orm::sea_query::Expr;

        let now = Utc::now();
        let result = entity::identity::Entity::update_many()
            .col_expr(entity::identity::Column::LastSeenOnline, Expr::value(now))
            .col_expr(entity::identity::Column::UpdatedAt, Expr::value(now))
            .filter(entity::identity::Column::UserId.eq(user_id.as_str()))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(now)
    }

    async fn touch_route_registration(&self, user_id: &UserId) -> Result<DateTime<Utc>> {
        use sea_orm::sea_query::Expr;

        let now = Utc::now();
        let result = entity::identity::Entity::update_many()
            .col_expr(
                entity::identity::Column::LastRouteRegistration,
                Expr::value(now),
            )
            .col_expr(entity::identity::Column::UpdatedAt, Expr::value(now))
            .filter(entity::identity::Column::UserId.eq(user_id.as_str()))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(now)
    }
}
