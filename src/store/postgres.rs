use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::model::{
    Package, Page, PageRequest, Pagination, Project, ProjectFields, ProjectServer, ProjectUser,
};

use super::{BindingStore, PackageStore, ProjectStore, StoreError};

const PROJECT_COLUMNS: &str = "id, group_id, name, url, path, environment, branch, \
     after_pull_script, after_deploy_script, transfer_options, auto_deploy, \
     notify_type, notify_target, is_active, created_at, updated_at";

/// Postgres-backed store. Every trait call is a single statement; no
/// cross-statement transactions are assumed.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::try_from(page.rows).unwrap_or(i64::MAX),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn pagination(page: PageRequest, total: i64) -> Pagination {
    Pagination {
        page: page.page,
        rows: page.rows,
        total: u64::try_from(total).unwrap_or(0),
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[async_trait]
impl ProjectStore for PgStore {
    #[tracing::instrument(skip(self, input), fields(name = %input.name), err)]
    async fn insert_project(&self, input: &ProjectFields) -> Result<Project, StoreError> {
        let sql = format!(
            "INSERT INTO projects (group_id, name, url, path, environment, branch, \
             after_pull_script, after_deploy_script, transfer_options, auto_deploy, \
             notify_type, notify_target) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {PROJECT_COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(input.group_id)
            .bind(&input.name)
            .bind(&input.url)
            .bind(&input.path)
            .bind(&input.environment)
            .bind(&input.branch)
            .bind(&input.after_pull_script)
            .bind(&input.after_deploy_script)
            .bind(&input.transfer_options)
            .bind(input.auto_deploy)
            .bind(input.notify_type)
            .bind(&input.notify_target)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_db(e, || format!("project name '{}'", input.name)))
    }

    #[tracing::instrument(skip(self, input), err)]
    async fn update_project(&self, id: i64, input: &ProjectFields) -> Result<Project, StoreError> {
        let sql = format!(
            "UPDATE projects SET \
                group_id = $2, name = $3, url = $4, path = $5, environment = $6, \
                branch = $7, after_pull_script = $8, after_deploy_script = $9, \
                transfer_options = $10, auto_deploy = $11, notify_type = $12, \
                notify_target = $13, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND is_active \
             RETURNING {PROJECT_COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(input.group_id)
            .bind(&input.name)
            .bind(&input.url)
            .bind(&input.path)
            .bind(&input.environment)
            .bind(&input.branch)
            .bind(&input.after_pull_script)
            .bind(&input.after_deploy_script)
            .bind(&input.transfer_options)
            .bind(input.auto_deploy)
            .bind(input.notify_type)
            .bind(&input.notify_target)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_db(e, || format!("project name '{}'", input.name)))?
            .ok_or(StoreError::NotFound("project"))
    }

    #[tracing::instrument(skip(self), err)]
    async fn deactivate_project(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET is_active = false, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("project"));
        }
        Ok(())
    }

    async fn project_by_id(&self, id: i64) -> Result<Option<Project>, StoreError> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_project_by_name(&self, name: &str) -> Result<Option<Project>, StoreError> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = $1 AND is_active");
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_projects(
        &self,
        group_ids: Option<&[i64]>,
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError> {
        let groups: Option<Vec<i64>> = group_ids.map(<[i64]>::to_vec);
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects \
             WHERE is_active AND ($1::bigint[] IS NULL OR group_id = ANY($1))",
        )
        .bind(&groups)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects \
             WHERE is_active AND ($1::bigint[] IS NULL OR group_id = ANY($1)) \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Project>(&sql)
            .bind(&groups)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            pagination: pagination(page, total),
        })
    }

    async fn all_active_projects(&self) -> Result<Vec<Project>, StoreError> {
        let sql =
            format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE is_active ORDER BY id DESC");
        Ok(sqlx::query_as::<_, Project>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

#[async_trait]
impl BindingStore for PgStore {
    #[tracing::instrument(skip(self, server_ids), fields(count = server_ids.len()), err)]
    async fn add_servers(
        &self,
        project_id: i64,
        server_ids: &[i64],
    ) -> Result<Vec<ProjectServer>, StoreError> {
        if server_ids.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO project_servers (project_id, server_id, created_at, updated_at) ",
        );
        qb.push_values(server_ids, |mut row, server_id| {
            row.push_bind(project_id)
                .push_bind(*server_id)
                .push_bind(now)
                .push_bind(now);
        });
        qb.push(" RETURNING id, project_id, server_id, created_at, updated_at");

        qb.build_query_as::<ProjectServer>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_db(e, || "project server binding".into()))
    }

    #[tracing::instrument(skip(self), err)]
    async fn remove_server(&self, binding_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM project_servers WHERE id = $1")
            .bind(binding_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("project server binding"));
        }
        Ok(())
    }

    async fn servers_by_project(&self, project_id: i64) -> Result<Vec<ProjectServer>, StoreError> {
        Ok(sqlx::query_as::<_, ProjectServer>(
            "SELECT id, project_id, server_id, created_at, updated_at \
             FROM project_servers WHERE project_id = $1 ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    #[tracing::instrument(skip(self, user_ids), fields(count = user_ids.len()), err)]
    async fn add_users(
        &self,
        project_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<ProjectUser>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO project_users (project_id, user_id, created_at, updated_at) ",
        );
        qb.push_values(user_ids, |mut row, user_id| {
            row.push_bind(project_id)
                .push_bind(*user_id)
                .push_bind(now)
                .push_bind(now);
        });
        qb.push(" RETURNING id, project_id, user_id, created_at, updated_at");

        qb.build_query_as::<ProjectUser>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_db(e, || "project user binding".into()))
    }

    #[tracing::instrument(skip(self), err)]
    async fn remove_user(&self, binding_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM project_users WHERE id = $1")
            .bind(binding_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("project user binding"));
        }
        Ok(())
    }

    async fn users_by_project(&self, project_id: i64) -> Result<Vec<ProjectUser>, StoreError> {
        Ok(sqlx::query_as::<_, ProjectUser>(
            "SELECT id, project_id, user_id, created_at, updated_at \
             FROM project_users WHERE project_id = $1 ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn users_by_user(&self, user_id: i64) -> Result<Vec<ProjectUser>, StoreError> {
        Ok(sqlx::query_as::<_, ProjectUser>(
            "SELECT id, project_id, user_id, created_at, updated_at \
             FROM project_users WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

#[async_trait]
impl PackageStore for PgStore {
    #[tracing::instrument(skip(self), err)]
    async fn insert_package(&self, name: &str, size: i64) -> Result<Package, StoreError> {
        sqlx::query_as::<_, Package>(
            "INSERT INTO packages (name, size) VALUES ($1, $2) \
             RETURNING id, name, size, created_at, updated_at",
        )
        .bind(name)
        .bind(size)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(e, || format!("package '{name}'")))
    }

    #[tracing::instrument(skip(self), err)]
    async fn overwrite_package(
        &self,
        id: i64,
        name: &str,
        size: i64,
    ) -> Result<Package, StoreError> {
        sqlx::query_as::<_, Package>(
            "UPDATE packages SET name = $2, size = $3, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 \
             RETURNING id, name, size, created_at, updated_at",
        )
        .bind(id)
        .bind(name)
        .bind(size)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(e, || format!("package '{name}'")))?
        .ok_or(StoreError::NotFound("package"))
    }

    async fn package_by_id(&self, id: i64) -> Result<Option<Package>, StoreError> {
        Ok(sqlx::query_as::<_, Package>(
            "SELECT id, name, size, created_at, updated_at FROM packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn package_by_name(&self, name: &str) -> Result<Option<Package>, StoreError> {
        Ok(sqlx::query_as::<_, Package>(
            "SELECT id, name, size, created_at, updated_at FROM packages WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_packages(&self, page: PageRequest) -> Result<Page<Package>, StoreError> {
        let (limit, offset) = limit_offset(page);
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packages")
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Package>(
            "SELECT id, name, size, created_at, updated_at FROM packages \
             ORDER BY id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            pagination: pagination(page, total),
        })
    }

    async fn all_packages(&self) -> Result<Vec<Package>, StoreError> {
        Ok(sqlx::query_as::<_, Package>(
            "SELECT id, name, size, created_at, updated_at FROM packages ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
