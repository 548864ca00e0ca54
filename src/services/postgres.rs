use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;

use super::store::{PairingBatch, PairingStore};
use crate::config::DatabaseSettings;
use crate::error::StoreError;
use crate::models::{Candidate, CounterpartKind, CounterpartRef, EntityRef, Group, Organization, Status};

/// Table holding the rows for an entity kind
fn table_for(entity: &EntityRef) -> &'static str {
    match entity {
        EntityRef::Organization(_) => "organizations",
        EntityRef::Group(_) => "organization_groups",
    }
}

/// Subquery selecting the organization ids under an entity, bound to `$1`
fn organizations_under(entity: &EntityRef) -> &'static str {
    match entity {
        EntityRef::Organization(_) => "SELECT $1::TEXT",
        EntityRef::Group(_) => "SELECT id FROM organizations WHERE group_id = $1",
    }
}

/// Locks the candidate rows under an entity, bound to `$1`
///
/// `FOR UPDATE` conflicts with the `FOR KEY SHARE` lock the foreign key check
/// takes when an assignment row is inserted, so no assignment referencing
/// these candidates can commit until the transaction ends.
fn candidate_lock_query(entity: &EntityRef) -> String {
    format!(
        "SELECT 1 FROM candidates WHERE organization_id IN ({}) FOR UPDATE",
        organizations_under(entity)
    )
}

fn candidate_grade(candidate: &str, grade: i16) -> Result<u8, StoreError> {
    u8::try_from(grade).map_err(|_| StoreError::InvalidGrade {
        candidate: candidate.to_string(),
        grade,
    })
}

fn read_counterpart(row: &PgRow, entity: &EntityRef) -> Result<CounterpartRef, StoreError> {
    let kind: Option<CounterpartKind> = row.try_get("counterpart_kind")?;
    let id: Option<String> = row.try_get("counterpart_id")?;
    CounterpartRef::from_columns(kind, id).ok_or_else(|| StoreError::CorruptCounterpart(entity.clone()))
}

/// PostgreSQL-backed pairing store
///
/// Every batch runs in one read committed transaction. Target rows are locked
/// with `SELECT ... FOR UPDATE` in a fixed order before any check, so two
/// overlapping batches cannot both commit. For `require_unlocked` entities the
/// candidate rows are locked too before assignments are counted: an
/// assignment insert already in flight is waited for and then seen, and one
/// started later blocks until the batch has committed.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(
            "Connecting to PostgreSQL (max: {} connections)",
            settings.max_connections
        );

        Self::new(
            &settings.url,
            settings.max_connections,
            settings.min_connections,
            Duration::from_secs(settings.acquire_timeout_secs),
            Duration::from_secs(settings.idle_timeout_secs),
        )
        .await
    }

    /// Wrap an existing pool (migrations are the caller's concern)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn lock_counterpart(
        conn: &mut PgConnection,
        entity: &EntityRef,
    ) -> Result<Option<CounterpartRef>, StoreError> {
        let query = format!(
            "SELECT counterpart_kind, counterpart_id FROM {} WHERE id = $1 FOR UPDATE",
            table_for(entity)
        );

        let row = sqlx::query(&query)
            .bind(entity.id())
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|row| read_counterpart(&row, entity)).transpose()
    }

    async fn lock_candidates(conn: &mut PgConnection, entity: &EntityRef) -> Result<(), StoreError> {
        sqlx::query(&candidate_lock_query(entity))
            .bind(entity.id())
            .fetch_all(&mut *conn)
            .await?;
        Ok(())
    }

    async fn assignments_exist(conn: &mut PgConnection, entity: &EntityRef) -> Result<bool, StoreError> {
        let query = format!(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM assignments a
                JOIN candidates c ON c.id = a.candidate_a OR c.id = a.candidate_b
                WHERE c.organization_id IN ({})
            ) AS locked
            "#,
            organizations_under(entity)
        );

        let row = sqlx::query(&query)
            .bind(entity.id())
            .fetch_one(&mut *conn)
            .await?;

        Ok(row.try_get("locked")?)
    }
}

#[async_trait]
impl PairingStore for PostgresStore {
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, StoreError> {
        let query = r#"
            SELECT id, status, group_id, counterpart_kind, counterpart_id
            FROM organizations
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(&self.pool).await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entity = EntityRef::organization(id);
        Ok(Some(Organization {
            id: row.try_get("id")?,
            status: row.try_get::<Status, _>("status")?,
            group_id: row.try_get("group_id")?,
            counterpart: read_counterpart(&row, &entity)?,
        }))
    }

    async fn find_group(&self, id: &str) -> Result<Option<Group>, StoreError> {
        let query = r#"
            SELECT id, counterpart_kind, counterpart_id
            FROM organization_groups
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(&self.pool).await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let members: Vec<String> = sqlx::query("SELECT id FROM organizations WHERE group_id = $1 ORDER BY id")
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| r.try_get("id"))
            .collect::<Result<_, _>>()?;

        let entity = EntityRef::group(id);
        Ok(Some(Group {
            id: row.try_get("id")?,
            members,
            counterpart: read_counterpart(&row, &entity)?,
        }))
    }

    async fn candidates_of(&self, entity: &EntityRef) -> Result<Vec<Candidate>, StoreError> {
        let query = format!(
            r#"
            SELECT id, interests, grade, organization_id
            FROM candidates
            WHERE organization_id IN ({})
            ORDER BY organization_id, id
            "#,
            organizations_under(entity)
        );

        let rows = sqlx::query(&query)
            .bind(entity.id())
            .fetch_all(&self.pool)
            .await?;

        let candidates: Result<Vec<Candidate>, StoreError> = rows
            .iter()
            .map(|row| -> Result<Candidate, StoreError> {
                let id: String = row.try_get("id")?;
                let grade = candidate_grade(&id, row.try_get::<i16, _>("grade")?)?;
                Ok(Candidate {
                    id,
                    interests: row.try_get("interests")?,
                    grade,
                    organization_id: row.try_get("organization_id")?,
                })
            })
            .collect();

        tracing::debug!("Loaded candidates under {}", entity);

        candidates
    }

    async fn has_assignments(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::assignments_exist(&mut conn, entity).await
    }

    async fn apply(&self, batch: &PairingBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for write in batch.ordered_writes() {
            let actual = Self::lock_counterpart(&mut tx, &write.entity)
                .await?
                .ok_or_else(|| StoreError::NotFound(write.entity.clone()))?;
            if actual != write.expected {
                // Dropping the transaction rolls it back
                return Err(StoreError::StaleCounterpart {
                    entity: write.entity.clone(),
                    expected: write.expected.clone(),
                    actual,
                });
            }
        }

        for entity in &batch.require_unlocked {
            Self::lock_candidates(&mut tx, entity).await?;
            if Self::assignments_exist(&mut tx, entity).await? {
                return Err(StoreError::Locked(entity.clone()));
            }
        }

        for write in &batch.writes {
            let (kind, id) = write.new.to_columns();
            let query = format!(
                "UPDATE {} SET counterpart_kind = $1, counterpart_id = $2 WHERE id = $3",
                table_for(&write.entity)
            );
            sqlx::query(&query)
                .bind(kind)
                .bind(id)
                .bind(write.entity.id())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Committed pairing batch with {} writes", batch.writes.len());

        Ok(())
    }
}
