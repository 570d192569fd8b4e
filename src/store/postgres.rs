use super::{Document, DocumentStore, Fields, Filter, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder, Row};
use std::marker::PhantomData;
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Schema for the `documents` table and its per-collection unique indexes.
pub const SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/db/sql/01_passport.sql"
));

/// Apply the schema. Every statement is idempotent.
///
/// # Errors
/// Returns an error if the database rejects the schema.
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    let span = info_span!("db.migrate", db.system = "postgresql");
    sqlx::raw_sql(SCHEMA).execute(pool).instrument(span).await?;
    Ok(())
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().is_some_and(|code| code == "23505") => {
            StoreError::Duplicate(db_err.constraint().unwrap_or("document").to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {}
        Filter::Eq(field, value) => {
            builder
                .push(" AND body -> ")
                .push_bind(*field)
                .push(" = ")
                .push_bind(Json(value.clone()));
        }
        Filter::In(field, values) => {
            let values: Vec<Json<Value>> = values.iter().cloned().map(Json).collect();
            builder
                .push(" AND body -> ")
                .push_bind(*field)
                .push(" = ANY(")
                .push_bind(values)
                .push(")");
        }
        Filter::And(filters) => {
            for filter in filters {
                push_filter(builder, filter);
            }
        }
    }
}

fn select_query<'a>(collection: &'static str, filter: &Filter) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("SELECT body FROM documents WHERE collection = ");
    builder.push_bind(collection);
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY id");
    builder
}

fn decode<T: Document>(row: &sqlx::postgres::PgRow) -> StoreResult<T> {
    let Json(body): Json<Value> = row.try_get("body")?;
    Ok(serde_json::from_value(body)?)
}

/// All collections share one `documents` table keyed by `(collection, id)`.
#[derive(Clone, Debug)]
pub struct PgDocumentStore<T> {
    pool: PgPool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> PgDocumentStore<T> {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Document> DocumentStore<T> for PgDocumentStore<T> {
    async fn create(&self, document: &T) -> StoreResult<()> {
        let query = "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.collection = T::COLLECTION
        );
        sqlx::query(query)
            .bind(T::COLLECTION)
            .bind(document.id())
            .bind(Json(serde_json::to_value(document)?))
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>> {
        let query = "SELECT body FROM documents WHERE collection = $1 AND id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.collection = T::COLLECTION
        );
        let row = sqlx::query(query)
            .bind(T::COLLECTION)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.as_ref().map(decode::<T>).transpose()
    }

    async fn update_fields(&self, id: Uuid, fields: Fields) -> StoreResult<bool> {
        // `||` merges top-level keys, so fields not named here keep their stored value.
        let query = r"
            UPDATE documents
            SET body = body || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.collection = T::COLLECTION
        );
        let result = sqlx::query(query)
            .bind(T::COLLECTION)
            .bind(id)
            .bind(Json(Value::Object(fields)))
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_write_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let query = "DELETE FROM documents WHERE collection = $1 AND id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.collection = T::COLLECTION
        );
        let result = sqlx::query(query)
            .bind(T::COLLECTION)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let mut builder = select_query(T::COLLECTION, filter);
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.collection = T::COLLECTION,
            db.statement = builder.sql()
        );
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        rows.iter().map(decode::<T>).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_query_binds_every_filter_value() {
        let filter = Filter::And(vec![
            Filter::eq("isSent", false),
            Filter::is_in("flow", ["email"]),
        ]);
        let builder = select_query("notifications", &filter);
        assert_eq!(
            builder.sql(),
            "SELECT body FROM documents WHERE collection = $1 \
             AND body -> $2 = $3 AND body -> $4 = ANY($5) ORDER BY id"
        );
    }

    #[test]
    fn select_all_has_no_predicate() {
        let builder = select_query("roles", &Filter::All);
        assert_eq!(
            builder.sql(),
            "SELECT body FROM documents WHERE collection = $1 ORDER BY id"
        );
    }

    #[test]
    fn schema_creates_documents_table() {
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS documents"));
        assert!(SCHEMA.contains("documents_identities_email_key"));
    }
}
