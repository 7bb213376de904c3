//! The process-wide record of which entities are paranoid.
//!
//! An entity becomes paranoid either statically, through [`acts_as_paranoid!`]
//! placed beside its definition, or at runtime through
//! [`ParanoidEntityTrait::acts_as_paranoid`]. Enabling is idempotent and never
//! reverts: the first registration of an entity wins and later ones are ignored.
//!
//! [`acts_as_paranoid!`]: crate::acts_as_paranoid

use crate::Paranoid;
use sea_orm::EntityTrait;
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{OnceLock, PoisonError, RwLock},
};
use tracing::debug;

/// Which clock stamps `deleted_at` when a record is soft deleted
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TimeZonePolicy {
    /// Bind `chrono::Utc::now()`
    #[default]
    Utc,
    /// Bind `chrono::Local::now()`
    Local,
    /// Let the database fill in `CURRENT_TIMESTAMP`
    Database,
}

/// Per-entity paranoid configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParanoidOptions {
    time_zone: TimeZonePolicy,
}

impl ParanoidOptions {
    /// Default options: timestamps in UTC
    pub const fn new() -> Self {
        Self {
            time_zone: TimeZonePolicy::Utc,
        }
    }

    /// Set the clock used to stamp `deleted_at`
    pub const fn time_zone(mut self, time_zone: TimeZonePolicy) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Get the clock used to stamp `deleted_at`
    pub fn get_time_zone(&self) -> TimeZonePolicy {
        self.time_zone
    }
}

/// The data structure submitted by [`acts_as_paranoid!`](crate::acts_as_paranoid).
#[derive(derive_more::Debug)]
pub struct ParanoidRegistration {
    /// Please use `module_path!()`.
    pub module_path: &'static str,
    /// `TypeId::of` the registered entity.
    #[debug(skip)]
    pub type_id: fn() -> TypeId,
    /// Options of the registered entity.
    pub options: ParanoidOptions,
}

inventory::collect!(ParanoidRegistration);

static RUNTIME_REGISTRY: OnceLock<RwLock<HashMap<TypeId, ParanoidOptions>>> = OnceLock::new();

fn runtime_registry() -> &'static RwLock<HashMap<TypeId, ParanoidOptions>> {
    RUNTIME_REGISTRY.get_or_init(Default::default)
}

fn static_options(type_id: TypeId) -> Option<ParanoidOptions> {
    inventory::iter::<ParanoidRegistration>()
        .find(|registration| (registration.type_id)() == type_id)
        .map(|registration| registration.options)
}

/// Enable paranoid behavior for `E`. Returns `false` if it was already enabled,
/// in which case `options` are ignored.
pub fn enable<E>(options: ParanoidOptions) -> bool
where
    E: EntityTrait,
{
    let type_id = TypeId::of::<E>();
    if static_options(type_id).is_some() {
        return false;
    }
    let mut registry = runtime_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if registry.contains_key(&type_id) {
        return false;
    }
    registry.insert(type_id, options);
    debug!(
        table = E::default().table_name(),
        time_zone = ?options.get_time_zone(),
        "Enabled paranoid entity"
    );
    true
}

/// The options `E` was enabled with, or `None` if `E` is not paranoid
pub fn options_of<E>() -> Option<ParanoidOptions>
where
    E: EntityTrait,
{
    let type_id = TypeId::of::<E>();
    static_options(type_id).or_else(|| {
        runtime_registry()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .copied()
    })
}

/// Whether `E` has been enabled as paranoid
pub fn is_paranoid<E>() -> bool
where
    E: EntityTrait,
{
    options_of::<E>().is_some()
}

/// Paranoid entry points available on every entity
pub trait ParanoidEntityTrait: EntityTrait {
    /// Enable paranoid behavior with default options. Safe to call many times.
    fn acts_as_paranoid() {
        Self::acts_as_paranoid_with(ParanoidOptions::new());
    }

    /// Enable paranoid behavior with the given options, unless already enabled
    fn acts_as_paranoid_with(options: ParanoidOptions) {
        enable::<Self>(options);
    }

    /// Whether this entity has been enabled as paranoid
    fn is_paranoid() -> bool {
        is_paranoid::<Self>()
    }

    /// A paranoid repository for this entity
    fn paranoid() -> Paranoid<Self> {
        Paranoid::new()
    }
}

impl<E> ParanoidEntityTrait for E where E: EntityTrait {}
