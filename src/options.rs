use crate::{ParanoidError, QueryScope, merge_conditions};
use sea_orm::{
    EntityTrait, JoinType, Order, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Select,
    sea_query::{Alias, Expr},
};
use serde::Deserialize;

/// The per-call option bag of a find.
///
/// Built in code with the builder methods, or from a dynamic map with
/// [`FindOptions::from_json`], which rejects any key other than `conditions`,
/// `group`, `include`, `joins`, `limit`, `offset`, `order`, `select`,
/// `readonly` and `includeDeleted`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FindOptions {
    conditions: Option<String>,
    group: Option<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    joins: Vec<Join>,
    limit: Option<u64>,
    offset: Option<u64>,
    order: Option<String>,
    select: Option<String>,
    #[serde(default)]
    readonly: bool,
    #[serde(default, alias = "include_deleted")]
    include_deleted: bool,
}

/// [`FindOptions`] with the `includeDeleted` flag taken out; this is all that
/// reaches the query builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// SQL condition
    pub conditions: Option<String>,
    /// `GROUP BY` expression
    pub group: Option<String>,
    /// Associations the caller intends to load through the relation loaders
    pub include: Vec<String>,
    /// Extra joins
    pub joins: Vec<Join>,
    /// `LIMIT`
    pub limit: Option<u64>,
    /// `OFFSET`
    pub offset: Option<u64>,
    /// `ORDER BY` list, e.g. `title DESC, id`
    pub order: Option<String>,
    /// Select list replacing the entity's columns
    pub select: Option<String>,
    /// Records are not meant to be written back
    pub readonly: bool,
}

/// How a [`Join`] attaches its table
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
}

/// A raw join: `<kind> JOIN <table> ON <on>`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Join {
    /// Join kind, inner by default
    #[serde(default)]
    pub kind: JoinKind,
    /// Joined table
    pub table: String,
    /// Join condition
    pub on: String,
}

impl Join {
    /// `INNER JOIN <table> ON <on>`
    pub fn inner<T, O>(table: T, on: O) -> Self
    where
        T: Into<String>,
        O: Into<String>,
    {
        Self {
            kind: JoinKind::Inner,
            table: table.into(),
            on: on.into(),
        }
    }

    /// `LEFT JOIN <table> ON <on>`
    pub fn left<T, O>(table: T, on: O) -> Self
    where
        T: Into<String>,
        O: Into<String>,
    {
        Self {
            kind: JoinKind::Left,
            table: table.into(),
            on: on.into(),
        }
    }
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
        }
    }
}

impl FindOptions {
    /// No options: every live row, in storage order
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object, validating its keys
    pub fn from_json(value: serde_json::Value) -> Result<Self, ParanoidError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Set the SQL condition
    pub fn conditions<T>(mut self, conditions: T) -> Self
    where
        T: Into<String>,
    {
        self.conditions = Some(conditions.into());
        self
    }

    /// Set the `GROUP BY` expression
    pub fn group<T>(mut self, group: T) -> Self
    where
        T: Into<String>,
    {
        self.group = Some(group.into());
        self
    }

    /// Name an association to be loaded alongside
    pub fn include<T>(mut self, association: T) -> Self
    where
        T: Into<String>,
    {
        self.include.push(association.into());
        self
    }

    /// Add a join
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Set the `LIMIT`
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the `OFFSET`
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the `ORDER BY` list
    pub fn order<T>(mut self, order: T) -> Self
    where
        T: Into<String>,
    {
        self.order = Some(order.into());
        self
    }

    /// Replace the select list
    pub fn select<T>(mut self, select: T) -> Self
    where
        T: Into<String>,
    {
        self.select = Some(select.into());
        self
    }

    /// Mark the records as not meant to be written back
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Also return soft deleted rows
    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    /// Whether soft deleted rows are requested
    pub fn is_including_deleted(&self) -> bool {
        self.include_deleted
    }

    /// Take the `includeDeleted` flag out, leaving the options for the query builder
    pub fn split(self) -> (bool, QueryOptions) {
        let Self {
            conditions,
            group,
            include,
            joins,
            limit,
            offset,
            order,
            select,
            readonly,
            include_deleted,
        } = self;
        (
            include_deleted,
            QueryOptions {
                conditions,
                group,
                include,
                joins,
                limit,
                offset,
                order,
                select,
                readonly,
            },
        )
    }
}

impl TryFrom<serde_json::Value> for FindOptions {
    type Error = ParanoidError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl QueryOptions {
    /// Apply the options, on top of the ambient `scope`, to a select
    pub fn apply<E>(&self, mut select: Select<E>, scope: &QueryScope) -> Select<E>
    where
        E: EntityTrait,
    {
        if let Some(fields) = &self.select {
            select = select.select_only().expr(Expr::cust(fields.clone()));
        }
        apply_joins(&mut select, &self.joins);
        if let Some(conditions) =
            merge_conditions(scope.conditions.as_deref(), self.conditions.as_deref())
        {
            select = select.filter(Expr::cust(conditions));
        }
        if let Some(group) = &self.group {
            select = select.group_by(Expr::cust(group.clone()));
        }
        let order = self.order.as_deref().or(scope.order.as_deref());
        for (expr, ord) in parse_order(order.unwrap_or_default()) {
            select = select.order_by(Expr::cust(expr), ord);
        }
        if let Some(limit) = self.limit.or(scope.limit) {
            select = select.limit(limit);
        }
        if let Some(offset) = self.offset {
            select = select.offset(offset);
        }
        select
    }
}

pub(crate) fn apply_joins<E>(select: &mut Select<E>, joins: &[Join])
where
    E: EntityTrait,
{
    for join in joins {
        QueryTrait::query(select).join(
            join.kind.into(),
            Alias::new(join.table.as_str()),
            Expr::cust(join.on.clone()),
        );
    }
}

/// Split an `ORDER BY` list into expressions and directions
pub(crate) fn parse_order(order: &str) -> Vec<(String, Order)> {
    order
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| match term.rsplit_once(char::is_whitespace) {
            Some((expr, dir)) if dir.eq_ignore_ascii_case("desc") => {
                (expr.trim_end().to_owned(), Order::Desc)
            }
            Some((expr, dir)) if dir.eq_ignore_ascii_case("asc") => {
                (expr.trim_end().to_owned(), Order::Asc)
            }
            _ => (term.to_owned(), Order::Asc),
        })
        .collect()
}
