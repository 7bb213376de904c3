use crate::ParanoidError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Name of the column marking a row as soft deleted
pub const DELETED_AT: &str = "deleted_at";

/// The condition selecting live rows of `table`
pub fn live_predicate(table: &str) -> String {
    format!("{table}.{DELETED_AT} IS NULL")
}

/// The condition selecting soft deleted rows of `table`
pub fn deleted_predicate(table: &str) -> String {
    format!("{table}.{DELETED_AT} IS NOT NULL")
}

/// AND `predicate` onto an existing condition, parenthesizing the existing one.
/// The predicate is not appended again if its text is already present.
pub fn compose_predicate(existing: Option<&str>, predicate: &str) -> String {
    match existing.map(str::trim) {
        None | Some("") => predicate.to_owned(),
        Some(cond) if cond.contains(predicate) => cond.to_owned(),
        Some(cond) => format!("({cond}) AND {predicate}"),
    }
}

/// Compose the live predicate of `table` into an existing condition
pub fn compose_live(existing: Option<&str>, table: &str) -> String {
    compose_predicate(existing, &live_predicate(table))
}

/// Combine the condition of the ambient scope with the own conditions of a call
pub fn merge_conditions(scope: Option<&str>, own: Option<&str>) -> Option<String> {
    let scope = scope.map(str::trim).filter(|s| !s.is_empty());
    let own = own.map(str::trim).filter(|s| !s.is_empty());
    match (scope, own) {
        (Some(scope), Some(own)) => Some(format!("{scope} AND ({own})")),
        (Some(cond), None) | (None, Some(cond)) => Some(cond.to_owned()),
        (None, None) => None,
    }
}

/// Clauses applied by default to every query built while the scope is active
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryScope {
    /// SQL condition
    pub conditions: Option<String>,
    /// `ORDER BY` list, used when the query has none of its own
    pub order: Option<String>,
    /// `LIMIT`, used when the query has none of its own
    pub limit: Option<u64>,
}

impl QueryScope {
    /// An empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the condition
    pub fn conditions<T>(mut self, conditions: T) -> Self
    where
        T: Into<String>,
    {
        self.conditions = Some(conditions.into());
        self
    }

    /// Set the default ordering
    pub fn order<T>(mut self, order: T) -> Self
    where
        T: Into<String>,
    {
        self.order = Some(order.into());
        self
    }

    /// Set the default limit
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn describe(&self) -> String {
        match &self.conditions {
            Some(conditions) => conditions.clone(),
            None => format!("{self:?}"),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Slot {
    scope: Option<QueryScope>,
    live: bool,
}

/// The scope in effect for one logical query-building operation.
///
/// Scopes are entered through guards; dropping a guard puts back whatever was
/// in effect before, however the guarded code exits. Scopes do not nest: a
/// second entry while one is active is rejected with
/// [`ParanoidError::ScopeConflict`]. The single exception is composing the
/// live predicate into a caller-supplied scope.
#[derive(Debug, Default)]
pub struct AmbientScope {
    slot: Mutex<Slot>,
}

impl AmbientScope {
    /// A slot with no scope in effect
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope currently in effect
    pub fn current(&self) -> Option<QueryScope> {
        self.lock().scope.clone()
    }

    /// Whether the live predicate is currently composed in
    pub fn is_live(&self) -> bool {
        self.lock().live
    }

    /// Put a caller-supplied scope in effect
    pub fn enter(&self, scope: QueryScope) -> Result<ScopeGuard<'_>, ParanoidError> {
        let mut slot = self.lock();
        if let Some(active) = &slot.scope {
            return Err(ParanoidError::ScopeConflict {
                active: active.describe(),
            });
        }
        let previous = slot.clone();
        slot.scope = Some(scope);
        Ok(ScopeGuard {
            owner: self,
            previous,
        })
    }

    /// Compose the live predicate of `table` into the scope in effect
    pub fn enter_live(&self, table: &str) -> Result<ScopeGuard<'_>, ParanoidError> {
        let mut slot = self.lock();
        if slot.live {
            return Err(ParanoidError::ScopeConflict {
                active: slot.scope.as_ref().map(QueryScope::describe).unwrap_or_default(),
            });
        }
        let previous = slot.clone();
        let mut scope = slot.scope.clone().unwrap_or_default();
        scope.conditions = Some(compose_live(scope.conditions.as_deref(), table));
        trace!(conditions = scope.conditions.as_deref(), "Entered live scope");
        slot.scope = Some(scope);
        slot.live = true;
        Ok(ScopeGuard {
            owner: self,
            previous,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a scope in effect until dropped
#[derive(Debug)]
#[must_use = "the scope is left as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    owner: &'a AmbientScope,
    previous: Slot,
}

impl ScopeGuard<'_> {
    /// The scope this guard keeps in effect
    pub fn scope(&self) -> QueryScope {
        self.owner.current().unwrap_or_default()
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = std::mem::take(&mut self.previous);
    }
}
