use super::{Cardinality, LoadWithVisibility, Visibility, restrict};
use crate::{ParanoidError, debug_print};
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, EntityTrait, ModelTrait, QuerySelect, QueryTrait, Related, Select,
    Statement, Value, sea_query::Expr,
};
use std::{marker::PhantomData, str::FromStr};
use tracing::{debug, instrument};

/// The in-memory side of a to-many association of one owner.
///
/// Holds the related records once loaded. A count of zero marks it loaded and
/// empty, so the next [`ToMany::load_into`] does not query.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection<M> {
    records: Option<Vec<M>>,
}

impl<M> Default for Collection<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Collection<M> {
    /// Not loaded yet
    pub fn new() -> Self {
        Self { records: None }
    }

    /// Whether the rows are known, loaded or counted as none
    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    /// The records, if loaded
    pub fn get(&self) -> Option<&[M]> {
        self.records.as_deref()
    }

    /// Forget the loaded records
    pub fn reset(&mut self) {
        self.records = None;
    }

    fn mark_empty(&mut self) {
        self.records = Some(Vec::new());
    }
}

/// Loads the rows referencing the owner, e.g. the posts of an author.
///
/// Counting goes through, in order: the owner's counter cache column, a custom
/// counter query, and finally a `COUNT` over the related select.
#[derive(derive_more::Debug)]
pub struct ToMany<E, R> {
    counter_cache: Option<String>,
    counter_sql: Option<String>,
    #[debug(skip)]
    entities: PhantomData<fn() -> (E, R)>,
}

impl<E, R> Default for ToMany<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> ToMany<E, R> {
    /// A loader counting with `COUNT(*)` until told otherwise
    pub fn new() -> Self {
        Self {
            counter_cache: None,
            counter_sql: None,
            entities: PhantomData,
        }
    }

    /// Column of the owner caching the number of related rows. Its value is
    /// trusted as is.
    pub fn counter_cache<T>(mut self, column: T) -> Self
    where
        T: Into<String>,
    {
        self.counter_cache = Some(column.into());
        self
    }

    /// Query counting the related rows, run verbatim. The first column of the
    /// first row is the count.
    pub fn counter_sql<T>(mut self, sql: T) -> Self
    where
        T: Into<String>,
    {
        self.counter_sql = Some(sql.into());
        self
    }
}

impl<E, R> ToMany<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    /// Count the related rows of `owner`
    #[instrument(level = "trace", skip_all)]
    pub async fn count<C>(
        &self,
        db: &C,
        owner: &E::Model,
        collection: &mut Collection<R::Model>,
    ) -> Result<u64, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let count = match self.cached_count(owner)? {
            Some(count) => {
                debug!(count, "Counter cache trusted");
                count
            }
            None => match &self.counter_sql {
                Some(sql) => run_counter_sql(db, sql).await?,
                None => {
                    let visibility = Visibility::for_owner::<E, R>(owner)?;
                    let select = self
                        .select(owner, visibility)
                        .select_only()
                        .expr(Expr::cust("COUNT(*)"));
                    debug_print!("{}", select.build(db.get_database_backend()));
                    let count: Option<i64> = select.into_tuple().one(db).await?;
                    count.and_then(|n| u64::try_from(n).ok()).unwrap_or_default()
                }
            },
        };
        if count == 0 {
            collection.mark_empty();
        }
        Ok(count)
    }

    /// Load the related rows of `owner` into `collection`, unless already loaded
    #[instrument(level = "trace", skip_all)]
    pub async fn load_into<'a, C>(
        &self,
        db: &C,
        owner: &E::Model,
        collection: &'a mut Collection<R::Model>,
    ) -> Result<&'a [R::Model], ParanoidError>
    where
        C: ConnectionTrait,
    {
        if !collection.is_loaded() {
            collection.records = Some(self.load(db, owner).await?);
        }
        Ok(collection.get().unwrap_or_default())
    }

    fn cached_count(&self, owner: &E::Model) -> Result<Option<u64>, ParanoidError> {
        let Some(name) = &self.counter_cache else {
            return Ok(None);
        };
        let column = E::Column::from_str(name).map_err(|_| ParanoidError::MissingColumn {
            table: E::default().table_name().to_owned(),
            column: name.clone(),
        })?;
        Ok(count_value(owner.get(column)))
    }
}

async fn run_counter_sql<C>(db: &C, sql: &str) -> Result<u64, ParanoidError>
where
    C: ConnectionTrait,
{
    let stmt = Statement::from_string(db.get_database_backend(), sql.to_owned());
    debug_print!("{}", stmt);
    let count = match db.query_one(stmt).await? {
        Some(row) => row.try_get_by_index::<i64>(0)?,
        None => 0,
    };
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Read a counter value; `None` if it is null or not an integer
fn count_value(value: Value) -> Option<u64> {
    match value {
        Value::TinyInt(Some(n)) => u64::try_from(n).ok(),
        Value::SmallInt(Some(n)) => u64::try_from(n).ok(),
        Value::Int(Some(n)) => u64::try_from(n).ok(),
        Value::BigInt(Some(n)) => u64::try_from(n).ok(),
        Value::TinyUnsigned(Some(n)) => Some(n.into()),
        Value::SmallUnsigned(Some(n)) => Some(n.into()),
        Value::Unsigned(Some(n)) => Some(n.into()),
        Value::BigUnsigned(Some(n)) => Some(n),
        _ => None,
    }
}

#[async_trait]
impl<E, R> LoadWithVisibility<E, R> for ToMany<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    type Output = Vec<R::Model>;

    fn cardinality(&self) -> Cardinality {
        Cardinality::ToMany
    }

    fn select(&self, owner: &E::Model, visibility: Visibility) -> Select<R> {
        restrict(owner.find_related(R::default()), visibility)
    }

    async fn load_with<C>(
        &self,
        db: &C,
        owner: &E::Model,
        visibility: Visibility,
    ) -> Result<Self::Output, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let select = self.select(owner, visibility);
        debug_print!("{}", select.build(db.get_database_backend()));
        Ok(select.all(db).await?)
    }
}
