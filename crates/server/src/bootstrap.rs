//! First-run bootstrap.
//!
//! Creates the default admin user, resource server, application and grant.
//! Steps are declared as data in [`default_steps`] and run in that order,
//! because each may depend on records created by the ones before it.
//!
//! Idempotence is layered: a step whose change id is already in the latest
//! migration record is skipped, and every step checks whether its record
//! exists before inserting. A failed run stores nothing and the next start
//! resumes from the last stored record.

use crate::config::AdminUserConfig;
use crate::credentials::{self, CredentialError};
use crate::entity::{application, bootstrap_migration, grant, resource_server, user};
use crate::store::{Filter, Order, Repositories, StoreError};
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const CREATE_DEFAULT_ADMIN_USER: &str = "create-default-admin-user";
pub const CREATE_DEFAULT_RESOURCE_SERVER: &str = "create-default-resource-server";
pub const CREATE_DEFAULT_APPLICATION: &str = "create-default-application";
pub const CREATE_DEFAULT_GRANT: &str = "create-default-grant";

pub const DEFAULT_RESOURCE_SERVER_NAME: &str = "keyloom-api";
pub const DEFAULT_APPLICATION_NAME: &str = "keyloom-frontend";
pub const DEFAULT_APPLICATION_CLIENT_ID: &str = "keyloom-frontend-client-id";

const DEFAULT_APPLICATION_REDIRECT_URIS: &[&str] = &[
    "http://localhost:3000/callback",
    "http://localhost:3000/redirect",
];
const DEFAULT_APPLICATION_SCOPES: &[&str] = &[
    "keyloom:view:resource-servers",
    "keyloom:manage:resource-servers",
    "keyloom:view:applications",
    "keyloom:manage:applications",
    "keyloom:view:users",
    "keyloom:manage:users",
    "keyloom:view:grants",
    "keyloom:manage:grants",
];
const DEFAULT_GRANT_SCOPES: &[&str] = &["read", "write", "delete"];

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("Required record is missing: {0}")]
    MissingDependency(&'static str),
    #[error("Failed to encode record field: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to load or save the migration record: {0}")]
    Store(#[from] StoreError),
    #[error("Migration record {id} has unreadable changes: {source}")]
    CorruptRecord {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Bootstrap change `{change}` failed: {source}")]
    StepFailed {
        change: &'static str,
        #[source]
        source: StepError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Created,
    AlreadyPresent,
}

/// Everything a step may read or write.
#[derive(Clone)]
pub struct BootstrapContext {
    pub repos: Repositories,
    pub admin: AdminUserConfig,
}

#[async_trait]
pub trait StepAction: Send + Sync {
    async fn apply(&self, ctx: &BootstrapContext) -> Result<StepOutcome, StepError>;
}

/// A change identifier paired with the action that establishes it.
pub struct BootstrapStep {
    pub change: &'static str,
    action: Box<dyn StepAction>,
}

impl BootstrapStep {
    pub fn new(change: &'static str, action: impl StepAction + 'static) -> Self {
        Self {
            change,
            action: Box::new(action),
        }
    }
}

/// The default steps in dependency order.
pub fn default_steps() -> Vec<BootstrapStep> {
    vec![
        BootstrapStep::new(CREATE_DEFAULT_ADMIN_USER, CreateDefaultAdminUser),
        BootstrapStep::new(CREATE_DEFAULT_RESOURCE_SERVER, CreateDefaultResourceServer),
        BootstrapStep::new(CREATE_DEFAULT_APPLICATION, CreateDefaultApplication),
        BootstrapStep::new(CREATE_DEFAULT_GRANT, CreateDefaultGrant),
    ]
}

/// Change ids of `steps` not yet in `applied`, in step order.
pub fn pending_changes<'a>(steps: &'a [BootstrapStep], applied: &[String]) -> Vec<&'a str> {
    steps
        .iter()
        .map(|step| step.change)
        .filter(|change| !applied.iter().any(|a| a == change))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapReport {
    pub record_id: String,
    /// Changes applied by this run, in order
    pub applied: Vec<&'static str>,
    /// Changes skipped because an earlier run recorded them
    pub skipped: Vec<&'static str>,
}

pub struct BootstrapSequencer {
    ctx: BootstrapContext,
    steps: Vec<BootstrapStep>,
}

impl BootstrapSequencer {
    pub fn new(ctx: BootstrapContext) -> Self {
        Self::with_steps(ctx, default_steps())
    }

    pub fn with_steps(ctx: BootstrapContext, steps: Vec<BootstrapStep>) -> Self {
        Self { ctx, steps }
    }

    /// Run all pending steps, then store the migration record once.
    ///
    /// Stops at the first failing step without storing anything.
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        info!("Starting bootstrap migrations");

        let (mut record, is_new) = self.load_latest().await?;
        let mut changes = record
            .change_list()
            .map_err(|source| BootstrapError::CorruptRecord {
                id: record.id.clone(),
                source,
            })?;
        if is_new {
            info!(record_id = %record.id, "No migration record found, starting a new one");
        } else {
            info!(record_id = %record.id, applied = changes.len(), "Latest migration record found");
        }
        debug!(pending = ?pending_changes(&self.steps, &changes), "Pending bootstrap changes");

        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for step in &self.steps {
            if changes.iter().any(|c| c == step.change) {
                debug!(change = step.change, "Already applied, skipping");
                skipped.push(step.change);
                continue;
            }

            info!(change = step.change, "Applying bootstrap change");
            match step.action.apply(&self.ctx).await {
                Ok(outcome) => {
                    info!(change = step.change, ?outcome, "Bootstrap change applied");
                    changes.push(step.change.to_string());
                    applied.push(step.change);
                }
                Err(source) => {
                    error!(
                        change = step.change,
                        error = %source,
                        "Bootstrap change failed; aborting without saving progress"
                    );
                    return Err(BootstrapError::StepFailed {
                        change: step.change,
                        source,
                    });
                }
            }
        }

        record.changes = serde_json::to_string(&changes).map_err(|source| {
            BootstrapError::CorruptRecord {
                id: record.id.clone(),
                source,
            }
        })?;
        record.updated_at = OffsetDateTime::now_utc();
        let migrations = &self.ctx.repos.migrations;
        if is_new || !migrations.update_one(&record).await? {
            migrations.insert_one(&record).await?;
        }

        info!(
            record_id = %record.id,
            applied = applied.len(),
            skipped = skipped.len(),
            "Bootstrap migrations completed"
        );
        Ok(BootstrapReport {
            record_id: record.id,
            applied,
            skipped,
        })
    }

    async fn load_latest(&self) -> Result<(bootstrap_migration::Model, bool), StoreError> {
        let latest = self
            .ctx
            .repos
            .migrations
            .find_many(&Filter::new(), Some(Order::NewestFirst))
            .await?
            .into_iter()
            .next();
        Ok(match latest {
            Some(record) => (record, false),
            None => (bootstrap_migration::Model::fresh(OffsetDateTime::now_utc()), true),
        })
    }
}

pub struct CreateDefaultAdminUser;

#[async_trait]
impl StepAction for CreateDefaultAdminUser {
    async fn apply(&self, ctx: &BootstrapContext) -> Result<StepOutcome, StepError> {
        let users = &ctx.repos.users;
        let by_email = Filter::new().eq("email", ctx.admin.email.as_str());
        if users.find_one(&by_email).await?.is_some() {
            return Ok(StepOutcome::AlreadyPresent);
        }

        let now = OffsetDateTime::now_utc();
        users
            .insert_one(&user::Model {
                id: Uuid::new_v4().to_string(),
                username: ctx.admin.username.clone(),
                email: ctx.admin.email.clone(),
                password_hash: credentials::hash(&ctx.admin.password)?,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(StepOutcome::Created)
    }
}

pub struct CreateDefaultResourceServer;

#[async_trait]
impl StepAction for CreateDefaultResourceServer {
    async fn apply(&self, ctx: &BootstrapContext) -> Result<StepOutcome, StepError> {
        let servers = &ctx.repos.resource_servers;
        let by_name = Filter::new().eq("name", DEFAULT_RESOURCE_SERVER_NAME);
        if servers.find_one(&by_name).await?.is_some() {
            return Ok(StepOutcome::AlreadyPresent);
        }

        let now = OffsetDateTime::now_utc();
        servers
            .insert_one(&resource_server::Model {
                id: Uuid::new_v4().to_string(),
                name: DEFAULT_RESOURCE_SERVER_NAME.to_string(),
                display_name: "Keyloom API".to_string(),
                description: "Default Keyloom management API".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(StepOutcome::Created)
    }
}

pub struct CreateDefaultApplication;

#[async_trait]
impl StepAction for CreateDefaultApplication {
    async fn apply(&self, ctx: &BootstrapContext) -> Result<StepOutcome, StepError> {
        let applications = &ctx.repos.applications;
        let by_name = Filter::new().eq("name", DEFAULT_APPLICATION_NAME);
        if applications.find_one(&by_name).await?.is_some() {
            return Ok(StepOutcome::AlreadyPresent);
        }

        let resource_server_ids: Vec<String> = ctx
            .repos
            .resource_servers
            .find_one(&Filter::new().eq("name", DEFAULT_RESOURCE_SERVER_NAME))
            .await?
            .map(|server| server.id)
            .into_iter()
            .collect();

        let now = OffsetDateTime::now_utc();
        applications
            .insert_one(&application::Model {
                id: Uuid::new_v4().to_string(),
                name: DEFAULT_APPLICATION_NAME.to_string(),
                description: "Default Keyloom Frontend Application".to_string(),
                client_id: DEFAULT_APPLICATION_CLIENT_ID.to_string(),
                redirect_uris: serde_json::to_string(DEFAULT_APPLICATION_REDIRECT_URIS)?,
                scopes: DEFAULT_APPLICATION_SCOPES.join(" "),
                resource_server_ids: serde_json::to_string(&resource_server_ids)?,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(StepOutcome::Created)
    }
}

pub struct CreateDefaultGrant;

#[async_trait]
impl StepAction for CreateDefaultGrant {
    async fn apply(&self, ctx: &BootstrapContext) -> Result<StepOutcome, StepError> {
        let admin = ctx
            .repos
            .users
            .find_one(&Filter::new().eq("email", ctx.admin.email.as_str()))
            .await?
            .ok_or(StepError::MissingDependency("default admin user"))?;
        let application = ctx
            .repos
            .applications
            .find_one(&Filter::new().eq("name", DEFAULT_APPLICATION_NAME))
            .await?
            .ok_or(StepError::MissingDependency("default application"))?;

        let grants = &ctx.repos.grants;
        let existing = Filter::new()
            .eq("user_id", admin.id.as_str())
            .eq("application_id", application.id.as_str());
        if grants.find_one(&existing).await?.is_some() {
            return Ok(StepOutcome::AlreadyPresent);
        }

        let now = OffsetDateTime::now_utc();
        grants
            .insert_one(&grant::Model {
                id: Uuid::new_v4().to_string(),
                user_id: admin.id,
                application_id: application.id,
                scopes: DEFAULT_GRANT_SCOPES.join(" "),
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(StepOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_steps_follow_dependency_order() {
        let changes: Vec<_> = default_steps().iter().map(|s| s.change).collect();
        assert_eq!(
            changes,
            vec![
                CREATE_DEFAULT_ADMIN_USER,
                CREATE_DEFAULT_RESOURCE_SERVER,
                CREATE_DEFAULT_APPLICATION,
                CREATE_DEFAULT_GRANT,
            ]
        );
    }

    #[test]
    fn pending_changes_skips_applied_and_keeps_order() {
        let steps = default_steps();
        let applied = vec![
            CREATE_DEFAULT_RESOURCE_SERVER.to_string(),
            CREATE_DEFAULT_ADMIN_USER.to_string(),
        ];
        assert_eq!(
            pending_changes(&steps, &applied),
            vec![CREATE_DEFAULT_APPLICATION, CREATE_DEFAULT_GRANT]
        );
    }

    #[test]
    fn pending_changes_when_nothing_applied() {
        let steps = default_steps();
        assert_eq!(pending_changes(&steps, &[]).len(), 4);
    }

    #[test]
    fn pending_changes_ignores_unknown_recorded_ids() {
        let steps = default_steps();
        let applied = vec!["some-retired-change".to_string()];
        assert_eq!(pending_changes(&steps, &applied).len(), 4);
    }

    #[test]
    fn fresh_record_has_no_changes() {
        let record = bootstrap_migration::Model::fresh(OffsetDateTime::now_utc());
        assert!(record.change_list().expect("valid json").is_empty());
    }
}
