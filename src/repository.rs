use crate::{
    AmbientScope, DELETED_AT, FindOptions, Join, ParanoidError, ParanoidOptions, QueryOptions,
    QueryScope, TimeZonePolicy, compose_live, compose_predicate, debug_print, deleted_predicate,
    merge_conditions, options::apply_joins, registry,
};
use chrono::{Local, Utc};
use sea_orm::{
    Condition, ConnectionTrait, EntityTrait, ModelTrait, PrimaryKeyTrait, QueryFilter,
    QuerySelect, QueryTrait, Select, Value,
    sea_query::{Alias, Expr, SimpleExpr},
};
use std::{future::Future, marker::PhantomData, str::FromStr};
use tracing::{debug, instrument};

/// Which rows a read is allowed to see
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Rows {
    Live,
    All,
    Deleted,
}

/// The paranoid repository of entity `E`.
///
/// Wraps the retrieval and counting entry points of [`EntityTrait`] so that
/// they skip soft deleted rows unless asked otherwise. Whether `E` is paranoid
/// is resolved once, when the repository is built; for an entity that is not,
/// every method behaves like plain SeaORM.
///
/// A repository owns the [`AmbientScope`] entered through
/// [`Paranoid::with_scope`] and [`Paranoid::with_live_scope`]. Plain reads only
/// look at that scope, so one repository can serve concurrent operations.
#[derive(Debug)]
pub struct Paranoid<E>
where
    E: EntityTrait,
{
    options: Option<ParanoidOptions>,
    scope: AmbientScope,
    entity: PhantomData<E>,
}

impl<E> Default for Paranoid<E>
where
    E: EntityTrait,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Paranoid<E>
where
    E: EntityTrait,
{
    /// Resolve the paranoid configuration of `E` and build its repository
    pub fn new() -> Self {
        Self {
            options: registry::options_of::<E>(),
            scope: AmbientScope::new(),
            entity: PhantomData,
        }
    }

    /// Whether `E` is paranoid
    pub fn is_paranoid(&self) -> bool {
        self.options.is_some()
    }

    /// The options `E` was enabled with
    pub fn options(&self) -> Option<ParanoidOptions> {
        self.options
    }

    /// The ambient scope of this repository
    pub fn ambient_scope(&self) -> &AmbientScope {
        &self.scope
    }

    /// Table name of `E`
    pub fn table_name() -> String {
        E::default().table_name().to_owned()
    }

    /// Run `f` with a caller-supplied scope in effect. Queries built by this
    /// repository inside `f` start from that scope.
    pub async fn with_scope<F, Fut, T>(&self, scope: QueryScope, f: F) -> Result<T, ParanoidError>
    where
        F: FnOnce(QueryScope) -> Fut,
        Fut: Future<Output = Result<T, ParanoidError>>,
    {
        let guard = self.scope.enter(scope)?;
        let res = f(guard.scope()).await;
        drop(guard);
        res
    }

    /// Run `f` with the live predicate composed into the ambient scope.
    ///
    /// Fails with [`ParanoidError::ScopeConflict`] when called from inside
    /// another live composition of this repository.
    pub async fn with_live_scope<F, Fut, T>(&self, f: F) -> Result<T, ParanoidError>
    where
        F: FnOnce(QueryScope) -> Fut,
        Fut: Future<Output = Result<T, ParanoidError>>,
    {
        if !self.is_paranoid() {
            return f(self.scope.current().unwrap_or_default()).await;
        }
        let guard = self.scope.enter_live(&Self::table_name())?;
        let res = f(guard.scope()).await;
        drop(guard);
        res
    }

    /// The scope a read of `rows` runs under: the ambient scope with the
    /// matching predicate composed in. The ambient slot is left untouched, so
    /// reads sharing one repository never see each other.
    fn scope_for(&self, rows: Rows) -> QueryScope {
        let mut scope = self.scope.current().unwrap_or_default();
        if self.is_paranoid() {
            let table = Self::table_name();
            match rows {
                Rows::Live => {
                    scope.conditions = Some(compose_live(scope.conditions.as_deref(), &table))
                }
                Rows::Deleted => {
                    scope.conditions = Some(compose_predicate(
                        scope.conditions.as_deref(),
                        &deleted_predicate(&table),
                    ))
                }
                Rows::All => (),
            }
        }
        scope
    }

    /// Entities that are not paranoid have no soft deleted rows
    fn is_empty_read(&self, rows: Rows) -> bool {
        rows == Rows::Deleted && !self.is_paranoid()
    }

    fn rows(include_deleted: bool) -> Rows {
        if include_deleted { Rows::All } else { Rows::Live }
    }

    /// Build the select a [`Paranoid::find`] with these options would run,
    /// under the ambient scope currently in effect
    pub fn select(&self, options: FindOptions) -> Select<E> {
        let (include_deleted, query) = options.split();
        query.apply(E::find(), &self.scope_for(Self::rows(include_deleted)))
    }

    /// Build the select a [`Paranoid::count`] would run
    pub fn count_select(&self, conditions: Option<&str>, joins: &[Join]) -> Select<E> {
        count_select(&self.scope_for(Rows::Live), conditions, joins)
    }

    /// Find all rows matching `options`. Soft deleted rows are skipped unless
    /// `options` include them.
    #[instrument(level = "trace", skip_all)]
    pub async fn find<C>(&self, db: &C, options: FindOptions) -> Result<Vec<E::Model>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let (include_deleted, query) = options.split();
        self.fetch_all(db, Self::rows(include_deleted), query).await
    }

    /// Find the first row matching `options`
    #[instrument(level = "trace", skip_all)]
    pub async fn find_first<C>(
        &self,
        db: &C,
        options: FindOptions,
    ) -> Result<Option<E::Model>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let (include_deleted, query) = options.split();
        let select = query.apply(E::find(), &self.scope_for(Self::rows(include_deleted)));
        debug_print!("{}", select.build(db.get_database_backend()));
        Ok(select.one(db).await?)
    }

    /// Find a row by its primary key
    #[instrument(level = "trace", skip_all)]
    pub async fn find_by_id<C, T>(
        &self,
        db: &C,
        id: T,
        options: FindOptions,
    ) -> Result<Option<E::Model>, ParanoidError>
    where
        C: ConnectionTrait,
        T: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        let (include_deleted, query) = options.split();
        let select = query.apply(
            E::find_by_id(id),
            &self.scope_for(Self::rows(include_deleted)),
        );
        debug_print!("{}", select.build(db.get_database_backend()));
        Ok(select.one(db).await?)
    }

    /// Find all rows matching `options`, soft deleted ones included
    #[instrument(level = "trace", skip_all)]
    pub async fn find_including_deleted<C>(
        &self,
        db: &C,
        options: FindOptions,
    ) -> Result<Vec<E::Model>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        self.find(db, options.include_deleted(true)).await
    }

    /// Find the soft deleted rows matching `options`
    #[instrument(level = "trace", skip_all)]
    pub async fn find_only_deleted<C>(
        &self,
        db: &C,
        options: FindOptions,
    ) -> Result<Vec<E::Model>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let (_, query) = options.split();
        self.fetch_all(db, Rows::Deleted, query).await
    }

    async fn fetch_all<C>(
        &self,
        db: &C,
        rows: Rows,
        query: QueryOptions,
    ) -> Result<Vec<E::Model>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        if self.is_empty_read(rows) {
            return Ok(Vec::new());
        }
        let select = query.apply(E::find(), &self.scope_for(rows));
        debug_print!("{}", select.build(db.get_database_backend()));
        Ok(select.all(db).await?)
    }

    /// Count the live rows matching `conditions`
    #[instrument(level = "trace", skip_all)]
    pub async fn count<C>(
        &self,
        db: &C,
        conditions: Option<&str>,
        joins: &[Join],
    ) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        self.count_rows(db, Rows::Live, conditions, joins).await
    }

    /// Count the rows matching `conditions`, soft deleted ones included
    #[instrument(level = "trace", skip_all)]
    pub async fn count_including_deleted<C>(
        &self,
        db: &C,
        conditions: Option<&str>,
        joins: &[Join],
    ) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        self.count_rows(db, Rows::All, conditions, joins).await
    }

    /// Count the soft deleted rows matching `conditions`
    #[instrument(level = "trace", skip_all)]
    pub async fn count_only_deleted<C>(
        &self,
        db: &C,
        conditions: Option<&str>,
        joins: &[Join],
    ) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        self.count_rows(db, Rows::Deleted, conditions, joins).await
    }

    async fn count_rows<C>(
        &self,
        db: &C,
        rows: Rows,
        conditions: Option<&str>,
        joins: &[Join],
    ) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        if self.is_empty_read(rows) {
            return Ok(0);
        }
        let select = count_select::<E>(&self.scope_for(rows), conditions, joins);
        debug_print!("{}", select.build(db.get_database_backend()));
        let count: Option<i64> = select.into_tuple().one(db).await?;
        Ok(count.and_then(|n| u64::try_from(n).ok()).unwrap_or_default())
    }

    /// Soft delete every live row matching `conditions`, returning how many
    /// rows were stamped. Entities that are not paranoid are deleted for good.
    #[instrument(level = "trace", skip_all)]
    pub async fn destroy_all<C>(&self, db: &C, conditions: Option<&str>) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        if !self.is_paranoid() {
            let mut delete = E::delete_many();
            if let Some(conditions) = conditions {
                delete = delete.filter(Expr::cust(conditions.to_owned()));
            }
            return Ok(delete.exec(db).await?.rows_affected);
        }
        let live = compose_live(None, &Self::table_name());
        let filter = merge_conditions(Some(&live), conditions).unwrap_or(live);
        self.stamp_deleted(db, Condition::all().add(Expr::cust(filter)))
            .await
    }

    /// Whether `model` is soft deleted. Always `false` for entities that are not paranoid.
    pub fn is_soft_deleted(&self, model: &E::Model) -> Result<bool, ParanoidError> {
        if !self.is_paranoid() {
            return Ok(false);
        }
        is_soft_deleted::<E>(model)
    }

    /// The expression stamped into `deleted_at`
    pub(crate) fn deletion_timestamp(&self) -> SimpleExpr {
        let time_zone = self
            .options
            .map(|options| options.get_time_zone())
            .unwrap_or_default();
        match time_zone {
            TimeZonePolicy::Utc => Expr::value(Utc::now()),
            TimeZonePolicy::Local => Expr::value(Local::now()),
            TimeZonePolicy::Database => Expr::current_timestamp().into(),
        }
    }

    /// `UPDATE <table> SET deleted_at = <now> WHERE <filter>`
    pub(crate) async fn stamp_deleted<C>(&self, db: &C, filter: Condition) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let res = E::update_many()
            .col_expr(Alias::new(DELETED_AT), self.deletion_timestamp())
            .filter(filter)
            .exec(db)
            .await?;
        debug!(
            table = Self::table_name(),
            rows_affected = res.rows_affected,
            "Soft deleted"
        );
        Ok(res.rows_affected)
    }

    /// `UPDATE <table> SET deleted_at = NULL WHERE <filter>`
    pub(crate) async fn clear_deleted<C>(&self, db: &C, filter: Condition) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let res = E::update_many()
            .col_expr(Alias::new(DELETED_AT), Expr::cust("NULL"))
            .filter(filter)
            .exec(db)
            .await?;
        debug!(
            table = Self::table_name(),
            rows_affected = res.rows_affected,
            "Restored"
        );
        Ok(res.rows_affected)
    }
}

fn count_select<E>(scope: &QueryScope, conditions: Option<&str>, joins: &[Join]) -> Select<E>
where
    E: EntityTrait,
{
    let mut select = E::find().select_only().expr(Expr::cust("COUNT(*)"));
    apply_joins(&mut select, joins);
    if let Some(conditions) = merge_conditions(scope.conditions.as_deref(), conditions) {
        select = select.filter(Expr::cust(conditions));
    }
    select
}

/// Look up the `deleted_at` column of `E`
pub(crate) fn deleted_at_column<E>() -> Result<E::Column, ParanoidError>
where
    E: EntityTrait,
{
    E::Column::from_str(DELETED_AT).map_err(|_| ParanoidError::MissingColumn {
        table: E::default().table_name().to_owned(),
        column: DELETED_AT.to_owned(),
    })
}

/// Whether the `deleted_at` column of `model` holds a timestamp
pub(crate) fn is_soft_deleted<E>(model: &E::Model) -> Result<bool, ParanoidError>
where
    E: EntityTrait,
{
    let column = deleted_at_column::<E>()?;
    Ok(!is_null(&model.get(column)))
}

pub(crate) fn is_null(value: &Value) -> bool {
    *value == value.as_null()
}
