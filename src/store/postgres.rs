use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::{StoreError, StoreResult};
use crate::model::{DocumentSummary, Instance, Point, Timestamp, Transform};
use crate::store::traits::InstanceStore;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS instances (
        document_guid TEXT NOT NULL,
        id TEXT NOT NULL,
        category_id TEXT NOT NULL DEFAULT '',
        family_name TEXT NOT NULL DEFAULT '',
        type_name TEXT NOT NULL DEFAULT '',
        transform JSONB NOT NULL,
        points JSONB NOT NULL DEFAULT '[]'::jsonb,
        attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
        last_modified BIGINT NOT NULL,
        PRIMARY KEY (document_guid, id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS instances_document_modified_idx
        ON instances (document_guid, last_modified)
    "#,
];

const INSTANCE_COLUMNS: &str = "document_guid, id, category_id, family_name, type_name, \
     transform, points, attributes, last_modified";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given connection options.
    ///
    /// Any failure here is a [`StoreError::Connection`]; the server refuses to
    /// start without a working store.
    pub async fn new(options: PgConnectOptions, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create the instances table and its index if they do not exist yet
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Name of the connected database, for startup logging
    pub async fn database_name(&self) -> StoreResult<String> {
        let row = sqlx::query("SELECT current_database() AS name")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("name")?)
    }
}

fn instance_from_row(row: &PgRow) -> StoreResult<Instance> {
    let transform: Json<Transform> = row.try_get("transform")?;
    let points: Json<Vec<Point>> = row.try_get("points")?;
    let attributes: Json<serde_json::Map<String, serde_json::Value>> =
        row.try_get("attributes")?;

    Ok(Instance {
        id: row.try_get("id")?,
        document_guid: row.try_get("document_guid")?,
        category_id: row.try_get("category_id")?,
        family_name: row.try_get("family_name")?,
        type_name: row.try_get("type_name")?,
        transform: transform.0,
        points: points.0,
        attributes: attributes.0,
        last_modified: row.try_get("last_modified")?,
    })
}

#[async_trait::async_trait]
impl InstanceStore for PostgresStore {
    async fn upsert(&self, document_guid: &str, instance: Instance) -> StoreResult<Instance> {
        instance.validate_for(document_guid)?;

        // The stamp comes from the database clock and never moves backwards for a row.
        let sql = format!(
            r#"
            INSERT INTO instances ({INSTANCE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    GREATEST((EXTRACT(EPOCH FROM clock_timestamp()) * 1000)::BIGINT, 1))
            ON CONFLICT (document_guid, id) DO UPDATE SET
                category_id = EXCLUDED.category_id,
                family_name = EXCLUDED.family_name,
                type_name = EXCLUDED.type_name,
                transform = EXCLUDED.transform,
                points = EXCLUDED.points,
                attributes = EXCLUDED.attributes,
                last_modified = GREATEST(EXCLUDED.last_modified, instances.last_modified + 1)
            RETURNING {INSTANCE_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(document_guid)
            .bind(&instance.id)
            .bind(&instance.category_id)
            .bind(&instance.family_name)
            .bind(&instance.type_name)
            .bind(Json(&instance.transform))
            .bind(Json(&instance.points))
            .bind(Json(&instance.attributes))
            .fetch_one(&self.pool)
            .await?;

        instance_from_row(&row)
    }

    async fn get(&self, document_guid: &str, id: &str) -> StoreResult<Instance> {
        let sql = format!(
            "SELECT {INSTANCE_COLUMNS} FROM instances WHERE document_guid = $1 AND id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(document_guid)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(StoreError::not_found(document_guid, id));
        };
        instance_from_row(&row)
    }

    async fn list(
        &self,
        document_guid: &str,
        since: Option<Timestamp>,
    ) -> StoreResult<Vec<Instance>> {
        let sql = format!(
            r#"
            SELECT {INSTANCE_COLUMNS} FROM instances
            WHERE document_guid = $1 AND ($2::BIGINT IS NULL OR last_modified > $2)
            ORDER BY id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(document_guid)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(instance_from_row).collect()
    }

    async fn delete(&self, document_guid: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM instances WHERE document_guid = $1 AND id = $2")
            .bind(document_guid)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, document_guid: Option<&str>) -> StoreResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM instances WHERE ($1::TEXT IS NULL OR document_guid = $1)",
        )
        .bind(document_guid)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT document_guid, COUNT(*) AS instance_count, MAX(last_modified) AS last_modified
            FROM instances
            GROUP BY document_guid
            ORDER BY document_guid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<DocumentSummary> {
                let count: i64 = row.try_get("instance_count")?;
                Ok(DocumentSummary {
                    document_guid: row.try_get("document_guid")?,
                    instance_count: count.max(0) as u64,
                    last_modified: row.try_get("last_modified")?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
