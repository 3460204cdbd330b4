//! Generic data-access operations.
//!
//! [`Engine`] turns a [`QueryCond`] plus per-call [`options`](crate::options)
//! into a [`Statement`], renders it for the driver and maps the rows back.
//!
//! ```ignore
//! let engine = Engine::new(gplus::create_pool(&url)?);
//!
//! let (mut q, u) = QueryCond::<User>::with_fields();
//! q.ge(u.age, 18).order_by_desc([u.id]);
//! let page = engine.select_page(Page::new(2, 10), &q, []).await?;
//! ```

use crate::config::EngineConfig;
use crate::cond::QueryCond;
use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::log;
use crate::model::{Column, Model};
use crate::options::{OptionFn, Options};
use crate::page::Page;
use crate::registry::{ModelRegistry, ModelSchema};
use crate::row::{FromRow, FromValue, Row};
use crate::statement::{BuiltQuery, Statement};
use crate::value::Value;
use std::sync::Arc;
use std::time::Instant;

/// Secondary lookup column used by `*_by_idx` operations.
const IDX_COLUMN: &str = "idx";

/// Entry point for typed CRUD against one database.
///
/// Cheap to clone; clones share the driver and the model registry.
#[derive(Clone)]
pub struct Engine {
    db: Arc<dyn Driver>,
    registry: ModelRegistry,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(db: impl Driver + 'static) -> Self {
        Self::with_config(db, EngineConfig::default())
    }

    pub fn with_config(db: impl Driver + 'static, config: EngineConfig) -> Self {
        Self::from_arc(Arc::new(db), config)
    }

    pub fn from_arc(db: Arc<dyn Driver>, config: EngineConfig) -> Self {
        Self {
            db,
            registry: ModelRegistry::new(config.primary_key.as_str()),
            config,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh condition builder and the field references of `T`.
    pub fn query<T: Model>(&self) -> (QueryCond<T>, T::Fields) {
        QueryCond::with_fields()
    }

    fn driver<'s>(&'s self, options: &Options<'s>) -> &'s dyn Driver {
        options.db.unwrap_or(&*self.db)
    }

    /// Statement against the model table (or the table override) with the
    /// option select/omit lists applied.
    fn statement(&self, schema: &ModelSchema, options: &Options<'_>) -> Statement {
        let table = options.table.clone().unwrap_or_else(|| schema.table.clone());
        let mut stmt = Statement::new(table);
        stmt.select(options.selects.iter().map(|c| self.registry.resolve_column(c)));
        stmt.omit(options.omits.iter().map(|c| self.registry.resolve_column(c)));
        stmt
    }

    fn resolve_all(&self, columns: &[Column]) -> Vec<String> {
        columns.iter().map(|c| self.registry.resolve_column(c)).collect()
    }

    async fn fetch(&self, db: &dyn Driver, op: &'static str, table: &str, built: BuiltQuery) -> OrmResult<Vec<Row>> {
        let built = built.with_placeholder(self.config.placeholder);
        self.fetch_raw(db, op, table, &built.sql, &built.args).await
    }

    async fn fetch_raw(&self, db: &dyn Driver, op: &'static str, table: &str, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        log::statement(&self.config, op, table, sql, args.len());
        let started = Instant::now();
        let result = db.query(sql, args).await;
        log::outcome(&self.config, op, table, sql, started.elapsed(), &result);
        result
    }

    async fn exec(&self, db: &dyn Driver, op: &'static str, table: &str, built: BuiltQuery) -> OrmResult<u64> {
        let built = built.with_placeholder(self.config.placeholder);
        self.exec_raw(db, op, table, &built.sql, &built.args).await
    }

    async fn exec_raw(&self, db: &dyn Driver, op: &'static str, table: &str, sql: &str, args: &[Value]) -> OrmResult<u64> {
        log::statement(&self.config, op, table, sql, args.len());
        let started = Instant::now();
        let result = db.execute(sql, args).await;
        log::outcome(&self.config, op, table, sql, started.elapsed(), &result);
        result
    }

    fn model_values<T: Model>(schema: &ModelSchema, entity: &T) -> OrmResult<Vec<Value>> {
        let values = entity.values();
        if values.len() != schema.columns.len() {
            return Err(OrmError::validation(format!(
                "model {} produced {} values for {} columns",
                schema.name,
                values.len(),
                schema.columns.len()
            )));
        }
        Ok(values)
    }

    /// Indexes of model columns kept by the option select/omit lists.
    fn writable(&self, schema: &ModelSchema, options: &Options<'_>) -> Vec<usize> {
        let selects = self.resolve_all(&options.selects);
        let omits = self.resolve_all(&options.omits);
        schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| selects.is_empty() || selects.contains(&c.column))
            .filter(|(_, c)| !omits.contains(&c.column))
            .map(|(i, _)| i)
            .collect()
    }

    fn primary_key_value(schema: &ModelSchema, values: &[Value]) -> OrmResult<(usize, Value)> {
        let idx = schema.primary_key_index().ok_or_else(|| {
            OrmError::validation(format!(
                "model {} has no `{}` column to use as primary key",
                schema.name, schema.primary_key
            ))
        })?;
        let pk = values[idx].clone();
        if pk.is_zero() {
            return Err(OrmError::validation(format!(
                "{} primary key `{}` is not set",
                schema.name, schema.primary_key
            )));
        }
        Ok((idx, pk))
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Insert one record. A zero-valued primary key column is left to the database.
    pub async fn insert<'a, T: Model>(
        &self,
        entity: &T,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        self.insert_chunks(std::slice::from_ref(entity), self.config.batch_size, &options)
            .await
    }

    /// Insert records in batches of the configured size.
    pub async fn insert_batch<'a, T: Model>(
        &self,
        entities: &[T],
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        self.insert_batch_size(entities, 0, opts).await
    }

    /// Insert records in batches of `batch_size` rows; 0 uses the configured size.
    pub async fn insert_batch_size<'a, T: Model>(
        &self,
        entities: &[T],
        batch_size: usize,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        let size = if batch_size == 0 {
            self.config.batch_size
        } else {
            batch_size
        };
        self.insert_chunks(entities, size, &options).await
    }

    async fn insert_chunks<T: Model>(&self, entities: &[T], size: usize, options: &Options<'_>) -> OrmResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }
        let schema = self.registry.schema::<T>();
        let stmt = self.statement(&schema, options);
        let db = self.driver(options);
        let writable = self.writable(&schema, options);

        let mut affected = 0;
        for chunk in entities.chunks(size.max(1)) {
            let rows = chunk
                .iter()
                .map(|e| Self::model_values(&schema, e))
                .collect::<OrmResult<Vec<_>>>()?;

            let pk = schema.primary_key_index();
            let skip_pk = pk.is_some_and(|idx| rows.iter().all(|r| r[idx].is_zero()));
            let keep: Vec<usize> = writable
                .iter()
                .copied()
                .filter(|&i| !(skip_pk && Some(i) == pk))
                .collect();

            let columns: Vec<String> = keep.iter().map(|&i| schema.columns[i].column.clone()).collect();
            let values: Vec<Vec<Value>> = rows
                .into_iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect();

            let built = stmt.to_insert(&columns, &values)?;
            affected += self.exec(db, "insert", stmt.table(), built).await?;
        }
        Ok(affected)
    }

    /// Delete the record with the given primary key.
    pub async fn delete_by_id<'a, T: Model>(
        &self,
        id: impl Into<Value>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let schema = self.registry.schema::<T>();
        let mut q = QueryCond::<T>::new();
        q.eq(schema.primary_key.as_str(), id);
        self.delete(&q, opts).await
    }

    /// Delete records by their secondary `idx` column.
    pub async fn delete_by_idx<'a, T: Model>(
        &self,
        idx: impl Into<Value>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let mut q = QueryCond::<T>::new();
        q.eq(IDX_COLUMN, idx);
        self.delete(&q, opts).await
    }

    /// Delete every record whose primary key is in `ids`.
    pub async fn delete_by_ids<'a, T: Model, I, V>(
        &self,
        ids: I,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let schema = self.registry.schema::<T>();
        let mut q = QueryCond::<T>::new();
        q.in_list(schema.primary_key.as_str(), ids);
        self.delete(&q, opts).await
    }

    /// Delete the records matching `q`. An empty condition is rejected.
    pub async fn delete<'a, T: Model>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let mut stmt = self.statement(&schema, &options);
        q.apply_to(&mut stmt, &self.registry);
        let built = stmt.to_delete()?;
        self.exec(self.driver(&options), "delete", stmt.table(), built).await
    }

    /// Update the non-zero fields of `entity`, matched by primary key.
    ///
    /// With a `select` option the selected columns are written even when zero.
    pub async fn update_by_id<'a, T: Model>(
        &self,
        entity: &T,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        let include_zero = !options.selects.is_empty();
        self.update_entity(entity, &options, include_zero).await
    }

    /// Update every column of `entity` including zero values, matched by
    /// primary key. A `select` option narrows the columns.
    pub async fn update_zero_by_id<'a, T: Model>(
        &self,
        entity: &T,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        self.update_entity(entity, &options, true).await
    }

    async fn update_entity<T: Model>(&self, entity: &T, options: &Options<'_>, include_zero: bool) -> OrmResult<u64> {
        let schema = self.registry.schema::<T>();
        let values = Self::model_values(&schema, entity)?;
        let (pk_idx, pk) = Self::primary_key_value(&schema, &values)?;

        let sets: Vec<(String, Value)> = self
            .writable(&schema, options)
            .into_iter()
            .filter(|&i| i != pk_idx)
            .filter(|&i| include_zero || !values[i].is_zero())
            .map(|i| (schema.columns[i].column.clone(), values[i].clone()))
            .collect();
        if sets.is_empty() {
            tracing::debug!(target: "gplus.sql", table = %schema.table, "update skipped: no columns to set");
            return Ok(0);
        }

        let mut stmt = self.statement(&schema, options);
        stmt.filter(format!("{} = ?", schema.primary_key), vec![pk]);
        let built = stmt.to_update(&sets)?;
        self.exec(self.driver(options), "update", stmt.table(), built).await
    }

    /// Apply the `set` assignments of `q` to the records it matches.
    pub async fn update<'a, T: Model>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let sets: Vec<(String, Value)> = q
            .updates()
            .iter()
            .map(|(c, v)| (self.registry.resolve_column(c), v.clone()))
            .collect();

        let mut stmt = self.statement(&schema, &options);
        q.apply_to(&mut stmt, &self.registry);
        let built = stmt.to_update(&sets)?;
        self.exec(self.driver(&options), "update", stmt.table(), built).await
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub async fn select_by_id<'a, T: Model>(
        &self,
        id: impl Into<Value>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<T> {
        self.select_by_id_generic::<T, T>(id, opts).await
    }

    /// First record whose secondary `idx` column matches.
    pub async fn select_by_idx<'a, T: Model>(
        &self,
        idx: impl Into<Value>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<T> {
        let mut q = QueryCond::<T>::new();
        q.eq(IDX_COLUMN, idx);
        self.select_one(&q, opts).await
    }

    pub async fn select_by_ids<'a, T: Model, I, V>(
        &self,
        ids: I,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<T>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let schema = self.registry.schema::<T>();
        let mut q = QueryCond::<T>::new();
        q.in_list(schema.primary_key.as_str(), ids);
        self.select_list(&q, opts).await
    }

    pub async fn select_one<'a, T: Model>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<T> {
        self.select_one_generic::<T, T>(q, opts).await
    }

    pub async fn select_list<'a, T: Model>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<T>> {
        self.select_list_generic::<T, T>(q, opts).await
    }

    /// Number of records matching `q`. Select lists are ignored; DISTINCT
    /// columns are counted distinctly.
    pub async fn select_count<'a, T: Model>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<i64> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let mut stmt = self.statement(&schema, &options);
        q.apply_to(&mut stmt, &self.registry);
        self.count(&stmt, &options).await
    }

    async fn count(&self, stmt: &Statement, options: &Options<'_>) -> OrmResult<i64> {
        let mut counting = stmt.clone();
        counting.clear_select();
        let built = counting.to_count();
        let rows = self
            .fetch(self.driver(options), "count", counting.table(), built)
            .await?;
        match rows.first() {
            Some(row) => row.try_get_idx::<i64>(0),
            None => Ok(0),
        }
    }

    /// Whether any record matches `q`. A not-found error counts as `false`.
    pub async fn exists<'a, T: Model>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<bool> {
        match self.select_count(q, opts).await {
            Ok(count) => Ok(count > 0),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// One page of records matching `q`; fills `total` unless `ignore_total` is set.
    pub async fn select_page<'a, T: Model>(
        &self,
        page: Page<T>,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Page<T>> {
        self.select_page_generic::<T, T>(page, q, opts).await
    }

    // ---------------------------------------------------------------------
    // Reads into a separate result type
    // ---------------------------------------------------------------------

    fn select_statement<T: Model>(&self, schema: &ModelSchema, q: &QueryCond<T>, options: &Options<'_>) -> Statement {
        let mut stmt = self.statement(schema, options);
        q.apply_to(&mut stmt, &self.registry);
        stmt
    }

    async fn fetch_as<R: FromRow>(&self, schema: &ModelSchema, stmt: &Statement, options: &Options<'_>) -> OrmResult<Vec<R>> {
        let columns: Vec<String> = schema.column_names().map(str::to_string).collect();
        let built = stmt.to_select(&columns);
        let rows = self
            .fetch(self.driver(options), "select", stmt.table(), built)
            .await?;
        rows.iter().map(R::from_row).collect()
    }

    pub async fn select_by_id_generic<'a, T: Model, R: FromRow>(
        &self,
        id: impl Into<Value>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<R> {
        let schema = self.registry.schema::<T>();
        let mut q = QueryCond::<T>::new();
        q.eq(schema.primary_key.as_str(), id);
        self.select_one_generic::<T, R>(&q, opts).await
    }

    /// First record matching `q`, scanned into `R`.
    pub async fn select_one_generic<'a, T: Model, R: FromRow>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<R> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let mut stmt = self.select_statement(&schema, q, &options);
        stmt.limit(1);
        self.fetch_as::<R>(&schema, &stmt, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found(format!("no record in {}", stmt.table())))
    }

    pub async fn select_list_generic<'a, T: Model, R: FromRow>(
        &self,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<R>> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let stmt = self.select_statement(&schema, q, &options);
        self.fetch_as::<R>(&schema, &stmt, &options).await
    }

    /// Like [`select_page`](Self::select_page), scanning into `R`. Use
    /// `serde_json::Map<String, serde_json::Value>` or `HashMap<String, Value>`
    /// for map-shaped records.
    pub async fn select_page_generic<'a, T: Model, R: FromRow>(
        &self,
        mut page: Page<R>,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Page<R>> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let mut stmt = self.select_statement(&schema, q, &options);
        page.normalize();

        if !options.ignore_total {
            page.total = self.count(&stmt, &options).await?;
        }

        stmt.limit(page.limit()).offset(page.offset());
        let records = self.fetch_as::<R>(&schema, &stmt, &options).await?;
        page.fill(records);
        Ok(page)
    }

    /// Values of one column for the records matching `q`.
    pub async fn pluck<'a, T: Model, R: FromValue>(
        &self,
        column: impl Into<Column>,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<R>> {
        self.pluck_column(column.into(), false, q, opts).await
    }

    /// Distinct values of one column for the records matching `q`.
    pub async fn pluck_distinct<'a, T: Model, R: FromValue>(
        &self,
        column: impl Into<Column>,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<R>> {
        self.pluck_column(column.into(), true, q, opts).await
    }

    async fn pluck_column<'a, T: Model, R: FromValue>(
        &self,
        column: Column,
        distinct: bool,
        q: &QueryCond<T>,
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<R>> {
        let options = Options::resolve(opts);
        let schema = self.registry.schema::<T>();
        let mut stmt = self.select_statement(&schema, q, &options);
        let column = self.registry.resolve_column(&column);
        stmt.clear_select().clear_distinct();
        if distinct {
            stmt.distinct([column]);
        } else {
            stmt.select([column]);
        }

        let built = stmt.to_select(&[]);
        let rows = self
            .fetch(self.driver(&options), "pluck", stmt.table(), built)
            .await?;
        rows.iter().map(|row| row.try_get_idx::<R>(0)).collect()
    }

    // ---------------------------------------------------------------------
    // Raw SQL
    // ---------------------------------------------------------------------

    /// Run raw SQL and scan every row. The SQL is sent unchanged.
    pub async fn select_list_by_sql<'a, R: FromRow>(
        &self,
        sql: &str,
        args: &[Value],
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<Vec<R>> {
        let options = Options::resolve(opts);
        let rows = self
            .fetch_raw(self.driver(&options), "raw_select", "-", sql, args)
            .await?;
        rows.iter().map(R::from_row).collect()
    }

    /// Run raw SQL and scan the first row.
    pub async fn select_one_by_sql<'a, R: FromRow>(
        &self,
        sql: &str,
        args: &[Value],
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<R> {
        let options = Options::resolve(opts);
        let rows = self
            .fetch_raw(self.driver(&options), "raw_select", "-", sql, args)
            .await?;
        match rows.first() {
            Some(row) => R::from_row(row),
            None => Err(OrmError::not_found("raw query returned no rows")),
        }
    }

    /// Execute raw SQL and return the affected row count.
    pub async fn exc_sql<'a>(
        &self,
        sql: &str,
        args: &[Value],
        opts: impl IntoIterator<Item = OptionFn<'a>>,
    ) -> OrmResult<u64> {
        let options = Options::resolve(opts);
        self.exec_raw(self.driver(&options), "raw_exec", "-", sql, args)
            .await
    }
}
