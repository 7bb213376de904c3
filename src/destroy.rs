use crate::{Paranoid, ParanoidError};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, ConnectionTrait, DbErr, DeleteResult,
    EntityTrait, Iterable, PrimaryKeyToColumn, TransactionTrait, sea_query::Expr,
};
use std::ops::Deref;
use tracing::{debug, instrument};

/// A destroyed record. It can still be read, but offers no way to change it
/// or write it back.
#[derive(Clone, Debug, PartialEq)]
pub struct Frozen<A> {
    inner: A,
}

impl<A> Frozen<A> {
    fn new(inner: A) -> Self {
        Self { inner }
    }

    /// Read access to the record
    pub fn get(&self) -> &A {
        &self.inner
    }
}

impl<A> Deref for Frozen<A> {
    type Target = A;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Result of [`ParanoidActiveModelExt::destroy_permanently`]
#[derive(Debug)]
pub enum DestroyOutcome<A> {
    /// The `DELETE` ran and was committed. `result` is what SeaORM reported
    /// for it; zero rows affected means the row was already gone.
    Removed {
        record: Frozen<A>,
        result: DeleteResult,
    },
    /// A delete hook returned an error; nothing was deleted
    Aborted(DbErr),
}

impl<A> DestroyOutcome<A> {
    /// Whether the row was deleted
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }

    /// Rows affected by the `DELETE`, if it was committed
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Self::Removed { result, .. } => Some(result.rows_affected),
            Self::Aborted(_) => None,
        }
    }

    /// The frozen record, if the row was deleted
    pub fn removed(self) -> Option<Frozen<A>> {
        match self {
            Self::Removed { record, .. } => Some(record),
            Self::Aborted(_) => None,
        }
    }
}

/// Paranoid destruction of a record
#[async_trait]
pub trait ParanoidActiveModelExt: ActiveModelBehavior + Send {
    /// Destroy the record.
    ///
    /// For a paranoid entity this stamps `deleted_at` with a single `UPDATE`
    /// and runs no delete hooks. A record that was never saved is frozen
    /// without touching the database. Any other entity is deleted for good,
    /// through [`ActiveModelTrait::delete`].
    async fn destroy<C>(self, db: &C) -> Result<Frozen<Self>, ParanoidError>
    where
        C: ConnectionTrait;

    /// Delete the row regardless of whether the entity is paranoid.
    ///
    /// Runs `before_delete`, the `DELETE` and `after_delete` in one
    /// transaction. A hook error rolls everything back and is reported as
    /// [`DestroyOutcome::Aborted`].
    async fn destroy_permanently<C>(self, db: &C) -> Result<DestroyOutcome<Self>, ParanoidError>
    where
        C: ConnectionTrait + TransactionTrait;

    /// Clear `deleted_at`, making a soft deleted record live again
    async fn restore<C>(self, db: &C) -> Result<Self, ParanoidError>
    where
        C: ConnectionTrait;
}

#[async_trait]
impl<A> ParanoidActiveModelExt for A
where
    A: ActiveModelBehavior + Send,
{
    #[instrument(level = "trace", skip_all)]
    async fn destroy<C>(self, db: &C) -> Result<Frozen<Self>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let repo = Paranoid::<A::Entity>::new();
        if !repo.is_paranoid() {
            ActiveModelTrait::delete(self.clone(), db).await?;
            return Ok(Frozen::new(self));
        }
        match primary_key_condition(&self) {
            Some(filter) => {
                repo.stamp_deleted(db, filter).await?;
            }
            None => debug!(
                table = Paranoid::<A::Entity>::table_name(),
                "Record was never saved, nothing to soft delete"
            ),
        }
        Ok(Frozen::new(self))
    }

    #[instrument(level = "trace", skip_all)]
    async fn destroy_permanently<C>(self, db: &C) -> Result<DestroyOutcome<Self>, ParanoidError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if primary_key_condition(&self).is_none() {
            return Ok(DestroyOutcome::Removed {
                record: Frozen::new(self),
                result: DeleteResult { rows_affected: 0 },
            });
        }

        let txn = db.begin().await?;
        let am = match ActiveModelBehavior::before_delete(self, &txn).await {
            Ok(am) => am,
            Err(err) => {
                txn.rollback().await?;
                debug!(error = %err, "Permanent destroy aborted by before_delete");
                return Ok(DestroyOutcome::Aborted(err));
            }
        };
        let res = A::Entity::delete(am.clone()).exec(&txn).await?;
        let am = match ActiveModelBehavior::after_delete(am, &txn).await {
            Ok(am) => am,
            Err(err) => {
                txn.rollback().await?;
                debug!(error = %err, "Permanent destroy aborted by after_delete");
                return Ok(DestroyOutcome::Aborted(err));
            }
        };
        txn.commit().await?;

        debug!(
            table = Paranoid::<A::Entity>::table_name(),
            rows_affected = res.rows_affected,
            "Destroyed permanently"
        );
        Ok(DestroyOutcome::Removed {
            record: Frozen::new(am),
            result: res,
        })
    }

    #[instrument(level = "trace", skip_all)]
    async fn restore<C>(self, db: &C) -> Result<Self, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let repo = Paranoid::<A::Entity>::new();
        if repo.is_paranoid() {
            if let Some(filter) = primary_key_condition(&self) {
                repo.clear_deleted(db, filter).await?;
            }
        }
        Ok(self)
    }
}

/// `"t"."pk" = <value>` for every primary key column, or `None` if any of them is unset
fn primary_key_condition<A>(model: &A) -> Option<Condition>
where
    A: ActiveModelTrait,
{
    let entity = A::Entity::default();
    let mut condition = Condition::all();
    for key in <A::Entity as EntityTrait>::PrimaryKey::iter() {
        let column = key.into_column();
        let value = model.get(column).into_value()?;
        condition = condition.add(Expr::col((entity, column)).eq(value));
    }
    Some(condition)
}
