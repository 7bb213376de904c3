use super::{Cardinality, LoadWithVisibility, Visibility, restrict};
use crate::{ParanoidError, debug_print};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, EntityTrait, ModelTrait, QueryTrait, Related, Select};
use std::marker::PhantomData;

/// Loads the row the owner references, e.g. the author of a post
#[derive(derive_more::Debug)]
pub struct OwnedToOne<E, R> {
    #[debug(skip)]
    entities: PhantomData<fn() -> (E, R)>,
}

/// Loads the single row referencing the owner, e.g. the profile of an author
#[derive(derive_more::Debug)]
pub struct ReverseToOne<E, R> {
    #[debug(skip)]
    entities: PhantomData<fn() -> (E, R)>,
}

impl<E, R> Default for OwnedToOne<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> OwnedToOne<E, R> {
    /// Loader for the row the owner's foreign key points at
    pub fn new() -> Self {
        Self {
            entities: PhantomData,
        }
    }
}

impl<E, R> Default for ReverseToOne<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> ReverseToOne<E, R> {
    /// Loader for the row whose foreign key points at the owner
    pub fn new() -> Self {
        Self {
            entities: PhantomData,
        }
    }
}

async fn load_one<C, R>(db: &C, select: Select<R>) -> Result<Option<R::Model>, ParanoidError>
where
    C: ConnectionTrait,
    R: EntityTrait,
{
    debug_print!("{}", select.build(db.get_database_backend()));
    Ok(select.one(db).await?)
}

#[async_trait]
impl<E, R> LoadWithVisibility<E, R> for OwnedToOne<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    type Output = Option<R::Model>;

    fn cardinality(&self) -> Cardinality {
        Cardinality::OwnedToOne
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
        load_one(db, self.select(owner, visibility)).await
    }
}

#[async_trait]
impl<E, R> LoadWithVisibility<E, R> for ReverseToOne<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    type Output = Option<R::Model>;

    fn cardinality(&self) -> Cardinality {
        Cardinality::ReverseToOne
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
        load_one(db, self.select(owner, visibility)).await
    }
}
