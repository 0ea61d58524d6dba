//! Postgres-backed item repository.
//!
//! ## Error Mapping
//!
//! | SQLx Error | RepositoryError |
//! |------------|-----------------|
//! | Database (unique violation, `23505`) on insert | `AlreadyExists` |
//! | Zero rows affected on update/delete | `NotFound` |
//! | Anything else | `Database` |

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info, instrument};

use stockwatch_alerts::{AlertError, ItemCounter};
use stockwatch_core::ItemId;
use stockwatch_inventory::Item;

use super::schema::{install_statements, uninstall_statements};
use super::{ItemRepository, RepositoryError};

#[derive(Debug, Clone)]
pub struct PostgresItemRepository {
    pool: PgPool,
}

impl PostgresItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `items` table and (re)install the count trigger in one
    /// transaction.
    #[instrument(skip(self), err)]
    pub async fn install_schema(&self, threshold: i64, channel: &str) -> Result<(), RepositoryError> {
        let statements = install_statements(threshold, channel)?;
        self.execute_all("install_schema", &statements).await?;
        info!(threshold, channel, "items count trigger installed");
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn uninstall_schema(&self) -> Result<(), RepositoryError> {
        self.execute_all("uninstall_schema", &uninstall_statements()).await?;
        info!("items count trigger removed");
        Ok(())
    }

    async fn execute_all(&self, operation: &str, statements: &[String]) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(format!("{operation}: {e}"))
}

fn row_to_item(row: &PgRow) -> Result<Item, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Database(format!("failed to decode item row: {e}"));

    Ok(Item {
        id: ItemId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        stock: row.try_get("stock").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

#[async_trait]
impl ItemRepository for PostgresItemRepository {
    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn insert(&self, item: &Item) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.stock)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::AlreadyExists(item.id),
            _ => map_sqlx_error("insert", e),
        })?;

        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn update(&self, item: &Item) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET name = $2, stock = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.stock)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(item.id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete(&self, id: ItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, stock, created_at, updated_at FROM items WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(row_to_item).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, stock, created_at, updated_at FROM items ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter().map(row_to_item).collect()
    }

    #[instrument(skip(self), err)]
    async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;

        row.try_get::<i64, _>("count")
            .map_err(|e| map_sqlx_error("count", e))
    }
}

#[async_trait]
impl ItemCounter for PostgresItemRepository {
    async fn count_items(&self) -> Result<i64, AlertError> {
        self.count()
            .await
            .map_err(|e| AlertError::orchestration(format!("failed to count items: {e}")))
    }
}
