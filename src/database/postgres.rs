use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use tokio::sync::OnceCell;
use tracing::info;

use super::manager::{quote_identifier, PgStore};
use super::update::{apply_update, ensure_id, prepare_replacement, seed_from_filter};
use super::{Collection, FindOptions, IndexKind, IndexModel, StoreError, UpdateOutcome};
use crate::filter::filter_where::{json_path, json_text_path};
use crate::filter::{Filter, SqlResult};
use crate::types::{Document, ObjectId, ID_FIELD};

const UNIQUE_VIOLATION: &str = "23505";

/// A collection stored as a `(seq, id, body)` table; `body` holds the whole
/// document including `_id`.
pub struct PgCollection {
    store: PgStore,
    database: String,
    name: String,
    pool: OnceCell<PgPool>,
}

impl PgCollection {
    pub(super) fn new(store: PgStore, database: &str, name: &str) -> Self {
        Self {
            store,
            database: database.to_string(),
            name: name.to_string(),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&PgPool, StoreError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = self.store.pool(&self.database).await?;
                let ddl = format!(
                    "CREATE TABLE IF NOT EXISTS {} (\"seq\" BIGSERIAL, \"id\" TEXT PRIMARY KEY, \"body\" JSONB NOT NULL)",
                    quote_identifier(&self.name)
                );
                sqlx::query(&ddl).execute(&pool).await?;
                Ok::<_, StoreError>(pool)
            })
            .await
    }

    fn filter(&self, filter: &Document) -> Result<Filter, StoreError> {
        let mut query = Filter::new(self.name.clone())?;
        query.where_clause(filter)?;
        Ok(query)
    }

    fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    /// Unique violations surface as the store's duplicate-key write error.
    fn map_error(&self, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::duplicate_key(format!(
                    "E11000 duplicate key error collection: {} {}",
                    self.namespace(),
                    db.message()
                ));
            }
        }
        StoreError::Sqlx(err)
    }

    async fn insert_with<'e, E>(&self, executor: E, mut document: Document) -> Result<ObjectId, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let id = ensure_id(&mut document)?;
        let query = format!("INSERT INTO {} (\"id\", \"body\") VALUES ($1, $2)", quote_identifier(&self.name));
        sqlx::query(&query)
            .bind(id.to_hex())
            .bind(Json(Value::Object(document)))
            .execute(executor)
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(id)
    }

    async fn write_body<'e, E>(&self, executor: E, id: &str, body: Document) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let query = format!("UPDATE {} SET \"body\" = $1 WHERE \"id\" = $2", quote_identifier(&self.name));
        sqlx::query(&query)
            .bind(Json(Value::Object(body)))
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(())
    }

    fn index_sql(&self, index: &IndexModel) -> Result<String, StoreError> {
        let special = index.fields.iter().any(|f| !matches!(f.kind, IndexKind::Ascending | IndexKind::Descending));
        if index.fields.is_empty() || (special && index.fields.len() > 1) {
            return Err(StoreError::InvalidIndex(format!(
                "index {} must have one field when using geo, hashed or text keys",
                index.name
            )));
        }

        let (method, columns) = match index.fields[0].kind {
            IndexKind::Hashed => (" USING hash", json_path(&index.fields[0].path)),
            IndexKind::Text => (
                " USING gin",
                format!("to_tsvector('simple', COALESCE({}, ''))", json_text_path(&index.fields[0].path)),
            ),
            IndexKind::Geo => (" USING gin", format!("{} jsonb_path_ops", json_path(&index.fields[0].path))),
            _ => (
                "",
                index
                    .fields
                    .iter()
                    .map(|f| {
                        let dir = if f.kind == IndexKind::Descending { "DESC" } else { "ASC" };
                        format!("{} {}", json_path(&f.path), dir)
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        };

        let mut sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}{} ({})",
            if index.unique && !special { "UNIQUE " } else { "" },
            quote_identifier(&format!("{}_{}", self.name, index.name)),
            quote_identifier(&self.name),
            method,
            columns
        );
        if index.sparse {
            let present: Vec<String> = index
                .fields
                .iter()
                .map(|f| format!("{} IS NOT NULL", json_path(&f.path)))
                .collect();
            sql.push_str(&format!(" WHERE ({})", present.join(" OR ")));
        }
        Ok(sql)
    }
}

fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = query.bind(Json(param.clone()));
    }
    query
}

fn row_document(row: &PgRow) -> Result<(String, Document), StoreError> {
    let id: String = row.try_get("id")?;
    let Json(body): Json<Value> = row.try_get("body")?;
    match body {
        Value::Object(doc) => Ok((id, doc)),
        other => Err(StoreError::InvalidDocument(format!("stored body is not an object: {}", other))),
    }
}

#[async_trait]
impl Collection for PgCollection {
    fn database(&self) -> &str {
        &self.database
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let pool = self.pool().await?;
        let mut query = self.filter(filter)?;
        query.order(&options.sort).limit(options.limit, options.skip);
        let SqlResult { query, params } = query.to_sql();

        let rows = bind_all(sqlx::query(&query), &params).fetch_all(pool).await?;
        rows.iter()
            .map(|row| {
                let (_, doc) = row_document(row)?;
                Ok(match &options.projection {
                    Some(projection) => projection.apply(doc),
                    None => doc,
                })
            })
            .collect()
    }

    async fn insert_one(&self, document: Document) -> Result<ObjectId, StoreError> {
        let pool = self.pool().await?;
        self.insert_with(pool, document).await
    }

    async fn update_one(&self, filter: &Document, update: &Document, upsert: bool) -> Result<UpdateOutcome, StoreError> {
        let pool = self.pool().await?;
        let mut query = self.filter(filter)?;
        query.limit(Some(1), 0);
        let SqlResult { query, params } = query.to_locking_sql();

        let mut tx = pool.begin().await?;
        let row = bind_all(sqlx::query(&query), &params).fetch_optional(&mut *tx).await?;

        let outcome = match row {
            Some(row) => {
                let (id, mut doc) = row_document(&row)?;
                let changed = apply_update(&mut doc, update)?;
                if changed {
                    self.write_body(&mut *tx, &id, doc).await?;
                }
                UpdateOutcome { matched: 1, modified: u64::from(changed), upserted: None }
            }
            None if upsert => {
                let mut seed = seed_from_filter(filter);
                apply_update(&mut seed, update)?;
                let id = self.insert_with(&mut *tx, seed).await?;
                UpdateOutcome { matched: 0, modified: 0, upserted: Some(id) }
            }
            None => UpdateOutcome::default(),
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn replace_one(&self, filter: &Document, replacement: Document, upsert: bool) -> Result<UpdateOutcome, StoreError> {
        let pool = self.pool().await?;
        let mut query = self.filter(filter)?;
        query.limit(Some(1), 0);
        let SqlResult { query, params } = query.to_locking_sql();

        let mut tx = pool.begin().await?;
        let row = bind_all(sqlx::query(&query), &params).fetch_optional(&mut *tx).await?;

        let outcome = match row {
            Some(row) => {
                let (id, existing) = row_document(&row)?;
                let existing_id = existing.get(ID_FIELD).cloned().unwrap_or(Value::Null);
                let replaced = prepare_replacement(replacement, &existing_id)?;
                let changed = replaced != existing;
                if changed {
                    self.write_body(&mut *tx, &id, replaced).await?;
                }
                UpdateOutcome { matched: 1, modified: u64::from(changed), upserted: None }
            }
            None if upsert => {
                let mut doc = replacement;
                if !doc.contains_key(ID_FIELD) {
                    if let Some(id) = seed_from_filter(filter).remove(ID_FIELD) {
                        doc.insert(ID_FIELD.to_string(), id);
                    }
                }
                let id = self.insert_with(&mut *tx, doc).await?;
                UpdateOutcome { matched: 0, modified: 0, upserted: Some(id) }
            }
            None => UpdateOutcome::default(),
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_one(&self, filter: &Document) -> Result<u64, StoreError> {
        let pool = self.pool().await?;
        let mut query = self.filter(filter)?;
        query.limit(Some(1), 0);
        let SqlResult { query, params } = query.to_delete_sql();
        let result = bind_all(sqlx::query(&query), &params).execute(pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, filter: &Document) -> Result<u64, StoreError> {
        let pool = self.pool().await?;
        let SqlResult { query, params } = self.filter(filter)?.to_delete_sql();
        let result = bind_all(sqlx::query(&query), &params).execute(pool).await?;
        Ok(result.rows_affected())
    }

    async fn create_index(&self, index: &IndexModel) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let sql = self.index_sql(index)?;
        sqlx::query(&sql).execute(pool).await.map_err(|e| self.map_error(e))?;
        info!("Ensured index {} on {}", index.name, self.namespace());
        Ok(())
    }
}
