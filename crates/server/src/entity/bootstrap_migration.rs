//! Bootstrap migration record - which one-time setup changes have run.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bootstrap_migrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// JSON array of applied change identifiers, oldest first
    pub changes: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A record with no applied changes that has not been stored yet.
    pub fn fresh(now: OffsetDateTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            changes: "[]".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn change_list(&self) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_str(&self.changes)
    }
}
