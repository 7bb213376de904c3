use sea_orm::{ActiveValue, ConnectionTrait, entity::prelude::*};
use sea_orm_paranoid::acts_as_paranoid;

/// A `before_delete` hook refuses to delete records titled `locked`
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "guarded")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        match &self.title {
            ActiveValue::Set(title) | ActiveValue::Unchanged(title) if title == "locked" => {
                Err(DbErr::Custom(format!("`{title}` cannot be deleted")))
            }
            _ => Ok(self),
        }
    }
}

acts_as_paranoid!(Entity);
