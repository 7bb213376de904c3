use super::{Cardinality, LoadWithVisibility, Visibility, restrict};
use crate::{ParanoidError, debug_print};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, EntityTrait, ModelTrait, QuerySelect, QueryTrait, Related, Select};
use std::marker::PhantomData;

/// Loads the rows linked to the owner through a junction table, e.g. the tags
/// of a post. The junction is taken from [`Related::via`].
#[derive(derive_more::Debug)]
pub struct ManyToMany<E, R> {
    unique: bool,
    #[debug(skip)]
    entities: PhantomData<fn() -> (E, R)>,
}

impl<E, R> Default for ManyToMany<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> ManyToMany<E, R> {
    /// A loader returning every linked row, duplicates included
    pub fn new() -> Self {
        Self {
            unique: false,
            entities: PhantomData,
        }
    }

    /// Return each related row once, even if linked several times
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Whether duplicates are collapsed
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

#[async_trait]
impl<E, R> LoadWithVisibility<E, R> for ManyToMany<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
{
    type Output = Vec<R::Model>;

    fn cardinality(&self) -> Cardinality {
        Cardinality::ManyToMany
    }

    fn select(&self, owner: &E::Model, visibility: Visibility) -> Select<R> {
        let select = restrict(owner.find_related(R::default()), visibility);
        if self.unique {
            select.distinct()
        } else {
            select
        }
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
