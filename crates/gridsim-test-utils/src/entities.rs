use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use gridsim_core::{
    Collectable, Collector, Describe, Entity, EntityId, Inspect, MemberError, Movable, Solid,
};

/// Movable collector.
pub struct Walker {
    id: EntityId,
    name: Mutex<String>,
}

impl Walker {
    pub fn new() -> Self {
        Self::named("walker")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::next(),
            name: Mutex::new(name.into()),
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for Walker {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for Walker {
    fn describe(d: &mut Describe<Self>) {
        d.editable_attribute("name", Walker::name, |w: &Walker, v: String| {
            if v.is_empty() {
                return Err(MemberError::rejected("name must not be empty"));
            }
            *w.name.lock().unwrap_or_else(PoisonError::into_inner) = v;
            Ok(())
        })
        .method("greet", |w: &Walker| format!("hello from {}", w.name()));
    }
}

impl Movable for Walker {}
impl Collector for Walker {}

impl Entity for Walker {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Walker"
    }
    fn as_movable(&self) -> Option<&dyn Movable> {
        Some(self)
    }
    fn as_collector(&self) -> Option<&dyn Collector> {
        Some(self)
    }
}

/// Movable and solid.
pub struct Rover {
    id: EntityId,
}

impl Rover {
    pub fn new() -> Self {
        Self {
            id: EntityId::next(),
        }
    }
}

impl Default for Rover {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for Rover {}
impl Movable for Rover {}
impl Solid for Rover {}

impl Entity for Rover {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Rover"
    }
    fn as_movable(&self) -> Option<&dyn Movable> {
        Some(self)
    }
    fn as_solid(&self) -> Option<&dyn Solid> {
        Some(self)
    }
}

/// Solid obstacle.
pub struct Wall {
    id: EntityId,
}

impl Wall {
    pub fn new() -> Self {
        Self {
            id: EntityId::next(),
        }
    }
}

impl Default for Wall {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for Wall {}
impl Solid for Wall {}

impl Entity for Wall {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Wall"
    }
    fn as_solid(&self) -> Option<&dyn Solid> {
        Some(self)
    }
}

/// Solid until opened.
pub struct Door {
    id: EntityId,
    open: AtomicBool,
}

impl Door {
    pub fn new() -> Self {
        Self {
            id: EntityId::next(),
            open: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl Default for Door {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for Door {
    fn describe(d: &mut Describe<Self>) {
        d.editable_attribute("open", Door::is_open, |door: &Door, v: bool| {
            door.set_open(v);
            Ok(())
        });
    }
}

impl Solid for Door {
    fn is_currently_solid(&self) -> bool {
        !self.is_open()
    }
}

impl Entity for Door {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Door"
    }
    fn as_solid(&self) -> Option<&dyn Solid> {
        Some(self)
    }
}

/// Collectable.
pub struct Coin {
    id: EntityId,
    value: i64,
}

impl Coin {
    pub fn new() -> Self {
        Self::worth(1)
    }

    pub fn worth(value: i64) -> Self {
        Self {
            id: EntityId::next(),
            value,
        }
    }
}

impl Default for Coin {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for Coin {
    fn describe(d: &mut Describe<Self>) {
        d.attribute("value", |c: &Coin| c.value);
    }
}

impl Collectable for Coin {}

impl Entity for Coin {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Coin"
    }
    fn as_collectable(&self) -> Option<&dyn Collectable> {
        Some(self)
    }
}

/// Collectable collector: a container that can itself be picked up.
pub struct Bag {
    id: EntityId,
}

impl Bag {
    pub fn new() -> Self {
        Self { id: EntityId::next() }
    }
}

impl Default for Bag {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for Bag {}
impl Collectable for Bag {}

impl Collector for Bag {
    // No bag inside a bag.
    fn can_carry(&self, item: &dyn Entity) -> bool {
        item.type_name() != "Bag"
    }
}

impl Entity for Bag {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Bag"
    }
    fn as_collectable(&self) -> Option<&dyn Collectable> {
        Some(self)
    }
    fn as_collector(&self) -> Option<&dyn Collector> {
        Some(self)
    }
}

/// Inspection fixture: editable `x`, read-only `label`, and methods
/// `reset`, `add(int)`, `fail` (returns an error) and `explode` (panics).
pub struct Dial {
    id: EntityId,
    x: AtomicI64,
}

impl Dial {
    pub fn new(x: i64) -> Self {
        Self {
            id: EntityId::next(),
            x: AtomicI64::new(x),
        }
    }

    pub fn x(&self) -> i64 {
        self.x.load(Ordering::SeqCst)
    }
}

impl Default for Dial {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Inspect for Dial {
    fn describe(d: &mut Describe<Self>) {
        d.editable_attribute("x", Dial::x, |dial: &Dial, v: i64| {
            dial.x.store(v, Ordering::SeqCst);
            Ok(())
        })
        .attribute("label", |dial: &Dial| format!("dial-{}", dial.id))
        .method("reset", |dial: &Dial| dial.x.store(0, Ordering::SeqCst))
        .method_with_arg("add", |dial: &Dial, n: i64| {
            dial.x.fetch_add(n, Ordering::SeqCst) + n
        })
        .method("fail", |_: &Dial| -> Result<(), MemberError> {
            Err(MemberError::rejected("dial refuses"))
        })
        .method("explode", |_: &Dial| -> i64 { panic!("dial exploded") });
    }
}

impl Movable for Dial {}

impl Entity for Dial {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Dial"
    }
    fn as_movable(&self) -> Option<&dyn Movable> {
        Some(self)
    }
}
