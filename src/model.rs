use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deployable application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    pub url: String,
    /// Deploy path on the target servers.
    pub path: String,
    pub environment: String,
    pub branch: String,
    pub after_pull_script: String,
    pub after_deploy_script: String,
    pub transfer_options: String,
    pub auto_deploy: bool,
    pub notify_type: i16,
    pub notify_target: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The mutable fields of a project, as supplied on add and edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFields {
    #[serde(default)]
    pub group_id: i64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub environment: String,
    pub branch: String,
    #[serde(default)]
    pub after_pull_script: String,
    #[serde(default)]
    pub after_deploy_script: String,
    #[serde(default)]
    pub transfer_options: String,
    #[serde(default)]
    pub auto_deploy: bool,
    #[serde(default)]
    pub notify_type: i16,
    #[serde(default)]
    pub notify_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectServer {
    pub id: i64,
    pub project_id: i64,
    pub server_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUser {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded deployable artifact, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub rows: u64,
}

impl PageRequest {
    pub fn offset(self) -> u64 {
        (self.page - 1) * self.rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub rows: u64,
    pub total: u64,
}

/// One page of results plus the metadata describing it.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Timestamp for a row mutation. Never earlier than (and never equal to) the
/// previous value, so `updated_at` strictly increases even under clock skew
/// or sub-resolution bursts.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}
