//! Loading related records of one owner with soft deleted rows hidden.
//!
//! Each association is defined with one of four loaders, matching the shape
//! of the relation:
//!
//! | Loader | Relation | Output |
//! |---|---|---|
//! | [`OwnedToOne`] | the owner references the related row (`belongs_to`) | `Option<R::Model>` |
//! | [`ReverseToOne`] | the related row references the owner (`has_one`) | `Option<R::Model>` |
//! | [`ToMany`] | `has_many` | `Vec<R::Model>` |
//! | [`ManyToMany`] | through a junction table | `Vec<R::Model>` |
//!
//! By default a loader only returns live related rows. Once the owner itself
//! is soft deleted, the filter is lifted, so a deleted owner still sees its
//! related rows as they were; see [`should_include_deleted`].

mod many_to_many;
mod to_many;
mod to_one;

pub use many_to_many::*;
pub use to_many::*;
pub use to_one::*;

use crate::{DELETED_AT, ParanoidError, is_paranoid, repository::is_soft_deleted};
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, EntityTrait, QueryFilter, Related, Select,
    sea_query::{Alias, Expr},
};
use tracing::trace;

/// Shape of a relation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// The owner holds the foreign key
    OwnedToOne,
    /// The related row holds the foreign key, at most one of them
    ReverseToOne,
    /// The related rows hold the foreign key
    ToMany,
    /// Rows linked through a junction table
    ManyToMany,
}

/// Which related rows a load may return
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Soft deleted related rows are skipped
    Live,
    /// Soft deleted related rows are returned too
    IncludingDeleted,
}

impl Visibility {
    /// The visibility of `R` rows reached from `owner`
    pub fn for_owner<E, R>(owner: &E::Model) -> Result<Self, ParanoidError>
    where
        E: EntityTrait,
        R: EntityTrait,
    {
        Ok(if should_include_deleted::<E, R>(owner)? {
            Self::IncludingDeleted
        } else {
            Self::Live
        })
    }
}

/// Whether related `R` rows reached from `owner` include soft deleted ones.
///
/// True only when `E` is paranoid, `owner` is soft deleted, and `R` is paranoid.
pub fn should_include_deleted<E, R>(owner: &E::Model) -> Result<bool, ParanoidError>
where
    E: EntityTrait,
    R: EntityTrait,
{
    if !is_paranoid::<E>() || !is_paranoid::<R>() {
        return Ok(false);
    }
    is_soft_deleted::<E>(owner)
}

/// A loader of the `R` rows related to an `E` owner
#[async_trait]
pub trait LoadWithVisibility<E, R>: Send + Sync
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    /// What a load returns
    type Output: Send;

    /// Shape of the relation
    fn cardinality(&self) -> Cardinality;

    /// The select a load runs
    fn select(&self, owner: &E::Model, visibility: Visibility) -> Select<R>;

    /// Load with an explicit visibility
    async fn load_with<C>(
        &self,
        db: &C,
        owner: &E::Model,
        visibility: Visibility,
    ) -> Result<Self::Output, ParanoidError>
    where
        C: ConnectionTrait;

    /// Load with the visibility following from the owner's state
    async fn load<C>(&self, db: &C, owner: &E::Model) -> Result<Self::Output, ParanoidError>
    where
        C: ConnectionTrait,
    {
        let visibility = Visibility::for_owner::<E, R>(owner)?;
        self.load_with(db, owner, visibility).await
    }
}

/// Result of loading an [`Association`]
#[derive(Clone, Debug, PartialEq)]
pub enum Loaded<M> {
    /// From a to-one association
    One(Option<M>),
    /// From a to-many association
    Many(Vec<M>),
}

impl<M> Loaded<M> {
    /// All loaded records
    pub fn into_vec(self) -> Vec<M> {
        match self {
            Self::One(model) => model.into_iter().collect(),
            Self::Many(models) => models,
        }
    }
}

/// An association from `E` to `R`, with its loader fixed at definition time
#[derive(Debug)]
pub enum Association<E, R>
where
    E: EntityTrait,
    R: EntityTrait,
{
    /// See [`OwnedToOne`]
    OwnedToOne(OwnedToOne<E, R>),
    /// See [`ReverseToOne`]
    ReverseToOne(ReverseToOne<E, R>),
    /// See [`ToMany`]
    ToMany(ToMany<E, R>),
    /// See [`ManyToMany`]
    ManyToMany(ManyToMany<E, R>),
}

impl<E, R> Association<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    /// Shape of the relation
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::OwnedToOne(loader) => loader.cardinality(),
            Self::ReverseToOne(loader) => loader.cardinality(),
            Self::ToMany(loader) => loader.cardinality(),
            Self::ManyToMany(loader) => loader.cardinality(),
        }
    }

    /// The select a load runs
    pub fn select(&self, owner: &E::Model, visibility: Visibility) -> Select<R> {
        match self {
            Self::OwnedToOne(loader) => loader.select(owner, visibility),
            Self::ReverseToOne(loader) => loader.select(owner, visibility),
            Self::ToMany(loader) => loader.select(owner, visibility),
            Self::ManyToMany(loader) => loader.select(owner, visibility),
        }
    }

    /// Load the related records of `owner`
    pub async fn load<C>(&self, db: &C, owner: &E::Model) -> Result<Loaded<R::Model>, ParanoidError>
    where
        C: ConnectionTrait,
    {
        Ok(match self {
            Self::OwnedToOne(loader) => Loaded::One(loader.load(db, owner).await?),
            Self::ReverseToOne(loader) => Loaded::One(loader.load(db, owner).await?),
            Self::ToMany(loader) => Loaded::Many(loader.load(db, owner).await?),
            Self::ManyToMany(loader) => Loaded::Many(loader.load(db, owner).await?),
        })
    }
}

/// Skip soft deleted `R` rows, unless `visibility` says otherwise or `R` is not paranoid
fn restrict<R>(select: Select<R>, visibility: Visibility) -> Select<R>
where
    R: EntityTrait,
{
    match visibility {
        Visibility::Live if is_paranoid::<R>() => {
            select.filter(Expr::col((R::default(), Alias::new(DELETED_AT))).is_null())
        }
        Visibility::Live => select,
        Visibility::IncludingDeleted => {
            trace!(table = R::default().table_name(), "Owner is soft deleted, filter lifted");
            select
        }
    }
}
