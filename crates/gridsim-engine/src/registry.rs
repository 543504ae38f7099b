//! Named entity factories and named programs.
//!
//! A surrounding application registers each entity type once under a
//! display name and later creates fresh instances by that name (a toolbar
//! spawning "Wall", for instance). Programs are registered the same way,
//! so a viewer can list the programs an entity accepts and attach one by
//! name.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use gridsim_core::{Entity, SharedEntity};
use indexmap::IndexMap;

use crate::actor::Actor;
use crate::error::{ProgramError, RegistryError};
use crate::program::Program;

type Factory = Arc<dyn Fn() -> SharedEntity + Send + Sync>;

type ProgramFactory = Arc<dyn Fn() -> Box<dyn Program> + Send + Sync>;

/// Name → factory table, in registration order.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gridsim_engine::{EntityTypeRegistry, RegistryError};
/// use gridsim_test_utils::Wall;
///
/// let registry = EntityTypeRegistry::new();
/// registry.register("wall", || Arc::new(Wall::new())).unwrap();
/// assert!(matches!(
///     registry.register("wall", || Arc::new(Wall::new())),
///     Err(RegistryError::ElementExists { .. })
/// ));
/// assert_eq!(registry.create("wall").unwrap().type_name(), "Wall");
/// ```
#[derive(Default)]
pub struct EntityTypeRegistry {
    factories: RwLock<IndexMap<String, Factory>>,
}

impl EntityTypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> SharedEntity + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&name) {
            return Err(RegistryError::ElementExists { name });
        }
        tracing::debug!(%name, "entity type registered");
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// A fresh entity of the named type.
    pub fn create(&self, name: &str) -> Result<SharedEntity, RegistryError> {
        // Clone the factory out so user code never runs under the lock.
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType {
                name: name.to_owned(),
            })?;
        Ok(factory())
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl fmt::Debug for EntityTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTypeRegistry")
            .field("names", &self.names())
            .finish()
    }
}

// ── Programs ────────────────────────────────────────────────────

/// Name → program factory table, in registration order.
///
/// Every attach creates a fresh program instance, so one registered
/// program can drive any number of entities at once.
///
/// # Examples
///
/// ```
/// use gridsim_engine::{Actor, ProgramError, ProgramRegistry};
/// use gridsim_test_utils::{Walker, Wall};
///
/// let registry = ProgramRegistry::new();
/// registry
///     .register("idle", || |_: &Actor| -> Result<(), ProgramError> { Ok(()) })
///     .unwrap();
/// assert_eq!(registry.programs_for(&Walker::new()), vec!["idle"]);
/// assert_eq!(registry.programs_for(&Wall::new()), vec!["idle"]);
/// ```
#[derive(Default)]
pub struct ProgramRegistry {
    factories: RwLock<IndexMap<String, ProgramFactory>>,
}

impl ProgramRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`.
    pub fn register<P, F>(&self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        P: Program,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&name) {
            return Err(RegistryError::ElementExists { name });
        }
        tracing::debug!(%name, "program registered by name");
        factories.insert(name, Arc::new(move || Box::new(factory()) as Box<dyn Program>));
        Ok(())
    }

    fn factory(&self, name: &str) -> Result<ProgramFactory, RegistryError> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownProgram {
                name: name.to_owned(),
            })
    }

    /// A fresh instance of the named program.
    pub fn create(&self, name: &str) -> Result<Box<dyn Program>, RegistryError> {
        Ok(self.factory(name)?())
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Names of the programs willing to drive `entity`, in registration
    /// order.
    pub fn programs_for(&self, entity: &dyn Entity) -> Vec<String> {
        let factories: Vec<(String, ProgramFactory)> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, factory)| (name.clone(), Arc::clone(factory)))
            .collect();
        factories
            .into_iter()
            .filter(|(_, factory)| factory().can_run_on(entity))
            .map(|(name, _)| name)
            .collect()
    }
}

impl fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// A program created from the registry, tagged with its name.
pub(crate) struct NamedProgram {
    pub(crate) name: String,
    pub(crate) program: Box<dyn Program>,
}

impl Program for NamedProgram {
    fn run(&mut self, actor: &Actor) -> Result<(), ProgramError> {
        tracing::debug!(name = %self.name, "running named program");
        self.program.run(actor)
    }

    fn can_run_on(&self, entity: &dyn Entity) -> bool {
        self.program.can_run_on(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsim_test_utils::{Coin, Walker};

    #[test]
    fn each_create_is_a_new_entity() {
        let registry = EntityTypeRegistry::new();
        registry.register("coin", || Arc::new(Coin::new())).unwrap();
        let a = registry.create("coin").unwrap();
        let b = registry.create("coin").unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn names_keep_registration_order() {
        let registry = EntityTypeRegistry::new();
        registry.register("walker", || Arc::new(Walker::new())).unwrap();
        registry.register("coin", || Arc::new(Coin::new())).unwrap();
        assert_eq!(registry.names(), vec!["walker", "coin"]);
        assert!(registry.contains("coin"));
    }

    #[test]
    fn bad_names_are_rejected() {
        let registry = EntityTypeRegistry::new();
        assert_eq!(
            registry.register("", || Arc::new(Coin::new())),
            Err(RegistryError::EmptyName)
        );
        assert_eq!(
            registry.create("dragon").unwrap_err(),
            RegistryError::UnknownType {
                name: "dragon".into()
            }
        );
    }

    struct MoversOnly;

    impl Program for MoversOnly {
        fn run(&mut self, actor: &Actor) -> Result<(), ProgramError> {
            actor.move_forward().map_err(Into::into)
        }

        fn can_run_on(&self, entity: &dyn Entity) -> bool {
            entity.as_movable().is_some()
        }
    }

    fn idle(_: &Actor) -> Result<(), ProgramError> {
        Ok(())
    }

    #[test]
    fn programs_are_listed_per_entity() {
        let registry = ProgramRegistry::new();
        registry.register("idle", || idle).unwrap();
        registry.register("step", || MoversOnly).unwrap();
        assert_eq!(registry.names(), vec!["idle", "step"]);
        assert_eq!(registry.programs_for(&Walker::new()), vec!["idle", "step"]);
        assert_eq!(registry.programs_for(&Coin::new()), vec!["idle"]);
        assert!(registry.create("step").is_ok());
    }

    #[test]
    fn program_names_are_unique_and_known() {
        let registry = ProgramRegistry::new();
        registry.register("idle", || idle).unwrap();
        assert_eq!(
            registry.register("idle", || MoversOnly),
            Err(RegistryError::ElementExists {
                name: "idle".into()
            })
        );
        assert_eq!(registry.register("", || idle), Err(RegistryError::EmptyName));
        assert!(matches!(
            registry.create("dance"),
            Err(RegistryError::UnknownProgram { .. })
        ));
        assert!(registry.contains("idle"));
        assert!(!registry.contains("dance"));
    }
}
