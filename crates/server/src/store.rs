//! Record persistence.
//!
//! Records are plain sea-orm models. All reads and writes go through
//! [`Repository`], one trait object per record type, so callers never
//! touch the database connection directly.

use crate::entity::{application, bootstrap_migration, grant, resource_server, user};
use async_trait::async_trait;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr,
};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Unknown field `{field}` in filter")]
    UnknownField { field: String },
}

impl StoreError {
    /// Whether the write was rejected by a unique index.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Database(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        )
    }
}

/// Conjunction of equality conditions on named record fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    /// A filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.conditions
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    NewestFirst,
}

#[async_trait]
pub trait Repository<R>: Send + Sync {
    async fn find_one(&self, filter: &Filter) -> Result<Option<R>, StoreError>;
    async fn find_many(&self, filter: &Filter, order: Option<Order>) -> Result<Vec<R>, StoreError>;
    async fn insert_one(&self, record: &R) -> Result<(), StoreError>;
    /// Replace the stored record with the same id. Returns `false` when none exists.
    async fn update_one(&self, record: &R) -> Result<bool, StoreError>;
    /// Returns `false` when no record had this id.
    async fn delete_one(&self, id: &str) -> Result<bool, StoreError>;
}

/// [`Repository`] backed by a sea-orm connection.
pub struct SeaOrmRepository<R> {
    db: Arc<DatabaseConnection>,
    _record: PhantomData<fn() -> R>,
}

impl<R> SeaOrmRepository<R> {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }
}

/// Implements [`Repository`] for an entity module. Every listed field is written
/// on insert and update, so updates replace the whole row.
macro_rules! sea_orm_repository {
    ($module:ident { $($field:ident),+ $(,)? }) => {
        impl SeaOrmRepository<$module::Model> {
            fn condition(filter: &Filter) -> Result<Condition, StoreError> {
                filter
                    .conditions()
                    .try_fold(Condition::all(), |condition, (field, value)| {
                        let column = $module::Column::from_str(field).map_err(|_| {
                            StoreError::UnknownField {
                                field: field.to_string(),
                            }
                        })?;
                        Ok(condition.add(column.eq(value.to_string())))
                    })
            }

            fn active(record: &$module::Model) -> $module::ActiveModel {
                $module::ActiveModel {
                    id: Set(record.id.clone()),
                    $($field: Set(record.$field.clone()),)+
                }
            }
        }

        #[async_trait]
        impl Repository<$module::Model> for SeaOrmRepository<$module::Model> {
            async fn find_one(&self, filter: &Filter) -> Result<Option<$module::Model>, StoreError> {
                let found = $module::Entity::find()
                    .filter(Self::condition(filter)?)
                    .one(self.db.as_ref())
                    .await?;
                Ok(found)
            }

            async fn find_many(
                &self,
                filter: &Filter,
                order: Option<Order>,
            ) -> Result<Vec<$module::Model>, StoreError> {
                let mut query = $module::Entity::find().filter(Self::condition(filter)?);
                query = match order {
                    Some(Order::NewestFirst) => query.order_by_desc($module::Column::CreatedAt),
                    None => query,
                };
                Ok(query.all(self.db.as_ref()).await?)
            }

            async fn insert_one(&self, record: &$module::Model) -> Result<(), StoreError> {
                $module::Entity::insert(Self::active(record))
                    .exec_without_returning(self.db.as_ref())
                    .await?;
                Ok(())
            }

            async fn update_one(&self, record: &$module::Model) -> Result<bool, StoreError> {
                let result = $module::Entity::update_many()
                    .set(Self::active(record))
                    .filter($module::Column::Id.eq(record.id.clone()))
                    .exec(self.db.as_ref())
                    .await?;
                Ok(result.rows_affected > 0)
            }

            async fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
                let result = $module::Entity::delete_by_id(id.to_string())
                    .exec(self.db.as_ref())
                    .await?;
                Ok(result.rows_affected > 0)
            }
        }
    };
}

sea_orm_repository!(user {
    username,
    email,
    password_hash,
    created_at,
    updated_at
});
sea_orm_repository!(resource_server {
    name,
    display_name,
    description,
    created_at,
    updated_at
});
sea_orm_repository!(application {
    name,
    description,
    client_id,
    redirect_uris,
    scopes,
    resource_server_ids,
    created_at,
    updated_at
});
sea_orm_repository!(grant {
    user_id,
    application_id,
    scopes,
    created_at,
    updated_at
});
sea_orm_repository!(bootstrap_migration {
    changes,
    created_at,
    updated_at
});

/// One repository per record type.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn Repository<user::Model>>,
    pub resource_servers: Arc<dyn Repository<resource_server::Model>>,
    pub applications: Arc<dyn Repository<application::Model>>,
    pub grants: Arc<dyn Repository<grant::Model>>,
    pub migrations: Arc<dyn Repository<bootstrap_migration::Model>>,
}

impl Repositories {
    pub fn sea_orm(db: Arc<DatabaseConnection>) -> Self {
        Self {
            users: Arc::new(SeaOrmRepository::<user::Model>::new(db.clone())),
            resource_servers: Arc::new(SeaOrmRepository::<resource_server::Model>::new(
                db.clone(),
            )),
            applications: Arc::new(SeaOrmRepository::<application::Model>::new(db.clone())),
            grants: Arc::new(SeaOrmRepository::<grant::Model>::new(db.clone())),
            migrations: Arc::new(SeaOrmRepository::<bootstrap_migration::Model>::new(db)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_collects_conditions_in_order() {
        let filter = Filter::new().eq("email", "a@b.c").eq("name", "x");
        let conditions: Vec<_> = filter.conditions().collect();
        assert_eq!(conditions, vec![("email", "a@b.c"), ("name", "x")]);
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(Filter::new().conditions().count(), 0);
        assert_eq!(Filter::new(), Filter::default());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let filter = Filter::new().eq("no_such_column", "x");
        let err = SeaOrmRepository::<user::Model>::condition(&filter).expect_err("must fail");
        assert!(matches!(err, StoreError::UnknownField { field } if field == "no_such_column"));
    }

    #[test]
    fn only_database_errors_can_be_unique_violations() {
        let unknown = StoreError::UnknownField {
            field: "x".to_string(),
        };
        assert!(!unknown.is_unique_violation());
        let custom = StoreError::Database(DbErr::Custom("boom".to_string()));
        assert!(!custom.is_unique_violation());
    }

    #[test]
    fn known_fields_build_a_condition() {
        let filter = Filter::new().eq("user_id", "u").eq("application_id", "a");
        assert!(SeaOrmRepository::<grant::Model>::condition(&filter).is_ok());
    }
}
