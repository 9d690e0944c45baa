use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use sqlx::{postgres::Postgres, types::Json, PgPool, QueryBuilder, Row};
use tokio::sync::OnceCell;

use super::{Document, Filter, FindOptions, Repository, SortDirection, StoreError};

const SCHEMA_INIT_LOCK_ID: i64 = 0x4147_4f52_4144_4f43;

/// Shared pool plus the one-time schema bootstrap for every collection.
pub(crate) struct PgSchema {
    pool: PgPool,
    init: OnceCell<()>,
}

impl PgSchema {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self {
            pool,
            init: OnceCell::new(),
        }
    }

    async fn ready(&self) -> Result<&PgPool, StoreError> {
        self.init
            .get_or_try_init(|| async {
                let mut tx = self.pool.begin().await?;
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(SCHEMA_INIT_LOCK_ID)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS documents (
                        collection TEXT NOT NULL,
                        id TEXT NOT NULL,
                        unique_key TEXT NULL,
                        version BIGINT NOT NULL,
                        body JSONB NOT NULL,
                        PRIMARY KEY (collection, id)
                    )",
                )
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_collection_unique_key
                        ON documents(collection, unique_key)
                        WHERE unique_key IS NOT NULL",
                )
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS idx_documents_body
                        ON documents USING GIN (body jsonb_path_ops)",
                )
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                tracing::error!(event = "db.init", error = %e);
                StoreError::Database(e)
            })?;
        Ok(&self.pool)
    }
}

/// JSONB-backed repository; every collection shares the `documents` table.
pub(crate) struct PgRepository<T> {
    schema: Arc<PgSchema>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PgRepository<T> {
    pub(crate) fn new(schema: Arc<PgSchema>) -> Self {
        Self {
            schema,
            _marker: PhantomData,
        }
    }
}

fn push_comparison(
    query: &mut QueryBuilder<'_, Postgres>,
    path: &[String],
    operator: &str,
    value: &serde_json::Value,
) {
    query.push("(body #> ");
    query.push_bind(path.to_vec());
    query.push("::text[]) ");
    query.push(operator);
    query.push(" ");
    query.push_bind(Json(value.clone()));
    query.push("::jsonb");
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {
            query.push("TRUE");
        }
        Filter::Eq(path, value) => push_comparison(query, path, "=", value),
        Filter::Ne(path, value) => push_comparison(query, path, "IS DISTINCT FROM", value),
        Filter::Lt(path, value) => push_comparison(query, path, "<", value),
        Filter::Lte(path, value) => push_comparison(query, path, "<=", value),
        Filter::Gt(path, value) => push_comparison(query, path, ">", value),
        Filter::Gte(path, value) => push_comparison(query, path, ">=", value),
        Filter::HasKey(path, key) => {
            query.push("jsonb_exists(body #> ");
            query.push_bind(path.clone());
            query.push("::text[], ");
            query.push_bind(key.clone());
            query.push(")");
        }
        Filter::And(filters) => push_junction(query, filters, " AND ", "TRUE"),
        Filter::Or(filters) => push_junction(query, filters, " OR ", "FALSE"),
    }
}

fn push_junction(
    query: &mut QueryBuilder<'_, Postgres>,
    filters: &[Filter],
    joiner: &str,
    empty: &str,
) {
    if filters.is_empty() {
        query.push(empty);
        return;
    }
    query.push("(");
    for (index, inner) in filters.iter().enumerate() {
        if index > 0 {
            query.push(joiner);
        }
        push_filter(query, inner);
    }
    query.push(")");
}

fn scoped_query<'a, T: Document>(select: &str, filter: &Filter) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new(select);
    query.push(" FROM documents WHERE collection = ");
    query.push_bind(T::COLLECTION);
    query.push(" AND ");
    push_filter(&mut query, filter);
    query
}

fn map_write_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
        other => StoreError::Database(other),
    }
}

fn version_to_i64(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::VersionConflict)
}

#[async_trait]
impl<T: Document> Repository<T> for PgRepository<T> {
    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        let mut found = self
            .find_many(filter, &FindOptions::default().limit(1))
            .await?;
        Ok(found.pop())
    }

    async fn find_many(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<T>, StoreError> {
        let pool = self.schema.ready().await?;
        let mut query = scoped_query::<T>("SELECT body", filter);
        if !options.sort.is_empty() {
            query.push(" ORDER BY ");
            for (index, (path, direction)) in options.sort.iter().enumerate() {
                if index > 0 {
                    query.push(", ");
                }
                query.push("body #> ");
                query.push_bind(path.clone());
                query.push(match direction {
                    SortDirection::Ascending => "::text[] ASC NULLS FIRST",
                    SortDirection::Descending => "::text[] DESC NULLS LAST",
                });
            }
        }
        if let Some(limit) = options.limit {
            query.push(" LIMIT ");
            query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query.build().fetch_all(pool).await?;
        rows.into_iter()
            .map(|row| -> Result<T, StoreError> {
                let body: Json<serde_json::Value> = row.try_get("body")?;
                Ok(serde_json::from_value(body.0)?)
            })
            .collect()
    }

    async fn exists(&self, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self.count(filter).await? > 0)
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let pool = self.schema.ready().await?;
        let row = scoped_query::<T>("SELECT COUNT(*) AS total", filter)
            .build()
            .fetch_one(pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn add(&self, mut document: T) -> Result<T, StoreError> {
        let pool = self.schema.ready().await?;
        document.set_version(1);
        let body = serde_json::to_value(&document)?;
        sqlx::query(
            "INSERT INTO documents (collection, id, unique_key, version, body)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(T::COLLECTION)
        .bind(document.id())
        .bind(document.unique_key())
        .bind(1_i64)
        .bind(Json(body))
        .execute(pool)
        .await
        .map_err(map_write_error)?;
        Ok(document)
    }

    async fn add_many(&self, documents: Vec<T>) -> Result<Vec<T>, StoreError> {
        let pool = self.schema.ready().await?;
        let mut tx = pool.begin().await?;
        let mut added = Vec::with_capacity(documents.len());
        for mut document in documents {
            document.set_version(1);
            let body = serde_json::to_value(&document)?;
            sqlx::query(
                "INSERT INTO documents (collection, id, unique_key, version, body)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(T::COLLECTION)
            .bind(document.id())
            .bind(document.unique_key())
            .bind(1_i64)
            .bind(Json(body))
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
            added.push(document);
        }
        tx.commit().await?;
        Ok(added)
    }

    async fn replace(&self, filter: &Filter, mut document: T) -> Result<T, StoreError> {
        let pool = self.schema.ready().await?;
        let mut query = scoped_query::<T>("SELECT id, version", filter);
        query.push(" LIMIT 1");
        let row = query
            .build()
            .fetch_optional(pool)
            .await?
            .ok_or(StoreError::Missing)?;
        let stored_id: String = row.try_get("id")?;
        let stored_version: i64 = row.try_get("version")?;
        let expected_version = version_to_i64(document.version())?;
        if stored_version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        document.set_version(document.version() + 1);
        let next_version = version_to_i64(document.version())?;
        let body = serde_json::to_value(&document)?;
        let result = sqlx::query(
            "UPDATE documents SET body = $1, version = $2, unique_key = $3
             WHERE collection = $4 AND id = $5 AND version = $6",
        )
        .bind(Json(body))
        .bind(next_version)
        .bind(document.unique_key())
        .bind(T::COLLECTION)
        .bind(stored_id)
        .bind(expected_version)
        .execute(pool)
        .await
        .map_err(map_write_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict);
        }
        Ok(document)
    }

    async fn remove(&self, filter: &Filter) -> Result<u64, StoreError> {
        let pool = self.schema.ready().await?;
        let mut query = QueryBuilder::<Postgres>::new("DELETE FROM documents WHERE collection = ");
        query.push_bind(T::COLLECTION);
        query.push(" AND ");
        push_filter(&mut query, filter);
        let result = query.build().execute(pool).await?;
        Ok(result.rows_affected())
    }
}
