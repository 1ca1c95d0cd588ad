use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::item::{Item, ItemInput, ItemPatch, ItemRow};
use crate::database::store::{ItemStore, WriteCondition};
use crate::geo::Bounds;

const ITEM_COLUMNS: &str = "id, item_name, weight, filename, birthdate, lat, lng, owner, created_at";

const CREATE_ITEMS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS items (
        id          UUID PRIMARY KEY,
        item_name   TEXT NOT NULL,
        weight      DOUBLE PRECISION NOT NULL,
        filename    TEXT NOT NULL,
        birthdate   DATE NOT NULL,
        lat         DOUBLE PRECISION NOT NULL,
        lng         DOUBLE PRECISION NOT NULL,
        owner       TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const CREATE_ITEMS_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS items_owner_idx ON items (owner)",
    "CREATE INDEX IF NOT EXISTS items_location_idx ON items (lat, lng)",
];

/// Item store backed by a single Postgres table
#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the items table when it is missing
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(CREATE_ITEMS_TABLE).execute(&self.pool).await?;
        for ddl in CREATE_ITEMS_INDEXES {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        info!("Items table ready");
        Ok(())
    }

    async fn fetch_items(&self, sql: &str) -> Result<Vec<Item>, DatabaseError> {
        let rows = sqlx::query_as::<_, ItemRow>(sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn list(&self) -> Result<Vec<Item>, DatabaseError> {
        let sql = format!("SELECT {} FROM items ORDER BY created_at, id", ITEM_COLUMNS);
        self.fetch_items(&sql).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, DatabaseError> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Item::from))
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Item>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM items WHERE owner = $1 ORDER BY created_at, id",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn list_within(&self, bounds: &Bounds) -> Result<Vec<Item>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM items \
             WHERE lat BETWEEN $1 AND $2 AND lng BETWEEN $3 AND $4 \
             ORDER BY created_at, id",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(bounds.min_lat)
            .bind(bounds.max_lat)
            .bind(bounds.min_lng)
            .bind(bounds.max_lng)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn insert(&self, owner: &str, input: &ItemInput) -> Result<Item, DatabaseError> {
        let sql = format!(
            "INSERT INTO items (id, item_name, weight, filename, birthdate, lat, lng, owner) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.item_name)
            .bind(input.weight)
            .bind(&input.filename)
            .bind(input.birthdate)
            .bind(input.location.lat)
            .bind(input.location.lng)
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update(
        &self,
        condition: &WriteCondition,
        patch: &ItemPatch,
    ) -> Result<Option<Item>, DatabaseError> {
        let sql = format!(
            "UPDATE items SET \
                item_name = COALESCE($3, item_name), \
                weight = COALESCE($4, weight), \
                filename = COALESCE($5, filename), \
                birthdate = COALESCE($6, birthdate), \
                lat = COALESCE($7, lat), \
                lng = COALESCE($8, lng) \
             WHERE id = $1 AND ($2::text IS NULL OR owner = $2) \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(condition.id)
            .bind(condition.owner.as_deref())
            .bind(patch.item_name.as_deref())
            .bind(patch.weight)
            .bind(patch.filename.as_deref())
            .bind(patch.birthdate)
            .bind(patch.location.map(|p| p.lat))
            .bind(patch.location.map(|p| p.lng))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Item::from))
    }

    async fn delete(&self, condition: &WriteCondition) -> Result<Option<Item>, DatabaseError> {
        let sql = format!(
            "DELETE FROM items WHERE id = $1 AND ($2::text IS NULL OR owner = $2) RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(condition.id)
            .bind(condition.owner.as_deref())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Item::from))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
