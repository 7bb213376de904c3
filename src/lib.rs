#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(
    missing_debug_implementations,
    clippy::print_stderr,
    clippy::print_stdout
)]

//! <div align="center">
//!
//!   <h1>SeaORM Paranoid</h1>
//!
//!   <p>
//!     <strong>Soft delete for SeaORM entities</strong>
//!   </p>
//!
//! </div>
//!
//! A paranoid entity is never removed by a default delete. Destroying a record
//! stamps its nullable `deleted_at` column, and every default read made through
//! [`Paranoid`] excludes stamped rows. Deleted rows stay reachable on request,
//! and a separate permanent destroy removes them for good.
//!
//! ## Enabling
//!
//! Register the entity next to its definition:
//!
//! ```ignore
//! use sea_orm::entity::prelude::*;
//! use sea_orm_paranoid::acts_as_paranoid;
//!
//! #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
//! #[sea_orm(table_name = "widgets")]
//! pub struct Model {
//!     #[sea_orm(primary_key)]
//!     pub id: i32,
//!     pub title: String,
//!     pub deleted_at: Option<DateTimeUtc>,
//! }
//!
//! #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
//! pub enum Relation {}
//!
//! impl ActiveModelBehavior for ActiveModel {}
//!
//! acts_as_paranoid!(Entity);
//! ```
//!
//! or at runtime with [`ParanoidEntityTrait::acts_as_paranoid`].
//!
//! ## Reading
//!
//! ```ignore
//! let widgets = Widget::paranoid();
//!
//! // live rows only
//! let live = widgets.find(db, FindOptions::new().order("title")).await?;
//! // everything, including soft deleted rows
//! let all = widgets.find_including_deleted(db, FindOptions::new()).await?;
//! assert_eq!(widgets.count(db, None, &[]).await?, live.len() as u64);
//! ```
//!
//! ## Deleting
//!
//! ```ignore
//! use sea_orm_paranoid::ParanoidActiveModelExt;
//!
//! // UPDATE "widgets" SET "deleted_at" = .. WHERE "widgets"."id" = ..
//! let frozen = widget.into_active_model().destroy(db).await?;
//! // DELETE FROM "widgets" WHERE "widgets"."id" = ..
//! let outcome = frozen.get().clone().destroy_permanently(db).await?;
//! assert!(outcome.is_removed());
//! ```

mod destroy;
pub mod error;
mod options;
pub mod registry;
pub mod relation;
mod repository;
mod scope;
mod util;

pub use destroy::*;
pub use error::*;
pub use options::*;
pub use registry::{
    ParanoidEntityTrait, ParanoidOptions, ParanoidRegistration, TimeZonePolicy, is_paranoid,
};
pub use relation::{
    Association, Cardinality, Collection, LoadWithVisibility, Loaded, ManyToMany, OwnedToOne,
    ReverseToOne, ToMany, Visibility, should_include_deleted,
};
pub use repository::*;
pub use scope::*;

#[doc(hidden)]
pub use inventory;

/// Mark an entity as paranoid at its definition site.
///
/// The registration is collected before `main` runs, so the entity is paranoid
/// for every [`Paranoid`] repository built afterwards. An optional second
/// argument picks the [`TimeZonePolicy`] of the deletion timestamp.
///
/// ```ignore
/// acts_as_paranoid!(Entity);
/// acts_as_paranoid!(Entity, TimeZonePolicy::Database);
/// ```
#[macro_export]
macro_rules! acts_as_paranoid {
    ($entity: ty) => {
        $crate::acts_as_paranoid!($entity, $crate::TimeZonePolicy::Utc);
    };
    ($entity: ty, $time_zone: expr) => {
        $crate::inventory::submit! {
            $crate::ParanoidRegistration {
                module_path: module_path!(),
                type_id: ::std::any::TypeId::of::<$entity>,
                options: $crate::ParanoidOptions::new().time_zone($time_zone),
            }
        }
    };
}
