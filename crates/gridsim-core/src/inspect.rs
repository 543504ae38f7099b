//! Inspection primitives.
//!
//! Entity types expose state to a viewer by implementing [`Inspect`] and
//! registering members on the [`Describe`] builder. Each registration
//! captures a typed closure and erases it behind `&dyn Any`, so the
//! resulting [`TypeDescriptor`] can be cached per concrete type and used
//! through a plain `&dyn Entity` later on. Nothing that is not registered
//! is reachable.
//!
//! ```
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use gridsim_core::{Describe, Inspect, Inspectable, Value};
//!
//! struct Counter { hits: AtomicI64 }
//!
//! impl Inspect for Counter {
//!     fn describe(d: &mut Describe<Self>) {
//!         d.editable_attribute(
//!             "hits",
//!             |c: &Counter| c.hits.load(Ordering::Relaxed),
//!             |c: &Counter, v: i64| { c.hits.store(v, Ordering::Relaxed); Ok(()) },
//!         );
//!         d.method("reset", |c: &Counter| c.hits.store(0, Ordering::Relaxed));
//!     }
//! }
//!
//! let c = Counter { hits: AtomicI64::new(3) };
//! let desc = c.descriptor();
//! let hits = desc.attribute("hits").unwrap();
//! assert_eq!(hits.get(c.as_any()).unwrap(), Value::Int(3));
//! hits.set(c.as_any(), Value::Int(5)).unwrap();
//! desc.method("reset").unwrap().invoke(c.as_any(), &[]).unwrap();
//! assert_eq!(c.hits.load(Ordering::Relaxed), 0);
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::error::MemberError;
use crate::geometry::{Direction, Position};

// ── Values ──────────────────────────────────────────────────────

/// A dynamically typed value crossing the inspection boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Free text.
    Text(String),
    /// Grid position.
    Position(Position),
    /// Heading.
    Direction(Direction),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
            Value::Position(_) => ValueKind::Position,
            Value::Direction(_) => ValueKind::Direction,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Position(v) => write!(f, "{v}"),
            Value::Direction(v) => write!(f, "{v}"),
        }
    }
}

/// The type of a [`Value`], used in descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Int`].
    Int,
    /// [`Value::Float`].
    Float,
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Text`].
    Text,
    /// [`Value::Position`].
    Position,
    /// [`Value::Direction`].
    Direction,
}

impl ValueKind {
    /// Parse user-entered text as a value of this kind.
    ///
    /// Positions accept `(x=1, y=2)` as well as `1,2`; directions are
    /// matched case-insensitively by name.
    pub fn parse(self, text: &str) -> Option<Value> {
        let text = text.trim();
        match self {
            ValueKind::Int => text.parse().ok().map(Value::Int),
            ValueKind::Float => text.parse().ok().map(Value::Float),
            ValueKind::Bool => text.parse().ok().map(Value::Bool),
            ValueKind::Text => Some(Value::Text(text.to_owned())),
            ValueKind::Position => parse_position(text).map(Value::Position),
            ValueKind::Direction => Direction::ALL
                .into_iter()
                .find(|d| d.to_string().eq_ignore_ascii_case(text))
                .map(Value::Direction),
        }
    }
}

fn parse_position(text: &str) -> Option<Position> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    let mut parts = inner.split(',').map(|part| {
        let part = part.trim();
        let part = part
            .strip_prefix("x=")
            .or_else(|| part.strip_prefix("y="))
            .unwrap_or(part);
        part.trim().parse::<i32>().ok()
    });
    let x = parts.next()??;
    let y = parts.next()??;
    if parts.next().is_some() {
        return None;
    }
    Some(Position::new(x, y))
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Text => "text",
            ValueKind::Position => "position",
            ValueKind::Direction => "direction",
        };
        f.write_str(name)
    }
}

/// Rust types that convert to and from [`Value`].
pub trait InspectValue: Sized {
    /// The kind every value of this type converts to.
    const KIND: ValueKind;

    /// Wrap into a [`Value`]; fails when the value does not fit its
    /// kind (a `usize` beyond `i64::MAX`, say).
    fn into_value(self) -> Result<Value, MemberError>;

    /// Unwrap from a [`Value`]; `None` on kind mismatch or overflow.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_inspect_int {
    ($($t:ty),*) => {$(
        impl InspectValue for $t {
            const KIND: ValueKind = ValueKind::Int;

            fn into_value(self) -> Result<Value, MemberError> {
                i64::try_from(self).map(Value::Int).map_err(|_| {
                    MemberError::rejected(format!("{self} does not fit an int"))
                })
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Int(v) => <$t>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

impl_inspect_int!(i64, i32, u32, usize);

macro_rules! impl_inspect_plain {
    ($($t:ty => $variant:ident),*) => {$(
        impl InspectValue for $t {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> Result<Value, MemberError> {
                Ok(Value::$variant(self))
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    )*};
}

impl_inspect_plain!(
    f64 => Float,
    bool => Bool,
    String => Text,
    Position => Position,
    Direction => Direction
);

/// Return types accepted from invocable methods.
pub trait MethodReturn {
    /// Convert into the uniform invocation result.
    fn into_result(self) -> Result<Option<Value>, MemberError>;
}

impl MethodReturn for () {
    fn into_result(self) -> Result<Option<Value>, MemberError> {
        Ok(None)
    }
}

impl<T: MethodReturn> MethodReturn for Result<T, MemberError> {
    fn into_result(self) -> Result<Option<Value>, MemberError> {
        self?.into_result()
    }
}

macro_rules! impl_method_return {
    ($($t:ty),*) => {$(
        impl MethodReturn for $t {
            fn into_result(self) -> Result<Option<Value>, MemberError> {
                self.into_value().map(Some)
            }
        }
    )*};
}

impl_method_return!(i64, i32, u32, usize, f64, bool, String, Position, Direction);

// ── Descriptors ─────────────────────────────────────────────────

type Getter = Box<dyn Fn(&dyn Any) -> Result<Value, MemberError> + Send + Sync>;
type Setter = Box<dyn Fn(&dyn Any, Value) -> Result<(), MemberError> + Send + Sync>;
type Invoker = Box<dyn Fn(&dyn Any, &[Value]) -> Result<Option<Value>, MemberError> + Send + Sync>;

/// A registered attribute.
pub struct AttributeDescriptor {
    name: &'static str,
    kind: ValueKind,
    getter: Getter,
    setter: Option<Setter>,
}

impl AttributeDescriptor {
    /// Attribute name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared value kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether a setter was registered.
    pub fn is_editable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the attribute from `target`. Fails if `target` is not the
    /// type this descriptor was built for, or the value does not fit its
    /// kind.
    pub fn get(&self, target: &dyn Any) -> Result<Value, MemberError> {
        (self.getter)(target)
    }

    /// Write the attribute on `target`.
    pub fn set(&self, target: &dyn Any, value: Value) -> Result<(), MemberError> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(MemberError::rejected(format!(
                "attribute '{}' is read-only",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("editable", &self.is_editable())
            .finish()
    }
}

/// A registered invocable method.
pub struct MethodDescriptor {
    name: &'static str,
    params: SmallVec<[ValueKind; 2]>,
    invoker: Invoker,
}

impl MethodDescriptor {
    /// Method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared parameter kinds.
    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    /// Call the method on `target`.
    ///
    /// Argument count and kinds are checked before the method body runs.
    pub fn invoke(&self, target: &dyn Any, args: &[Value]) -> Result<Option<Value>, MemberError> {
        if args.len() != self.params.len() {
            return Err(MemberError::Arity {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(&self.params).enumerate() {
            if arg.kind() != *expected {
                return Err(MemberError::ArgumentType {
                    index,
                    expected: *expected,
                    got: arg.kind(),
                });
            }
        }
        (self.invoker)(target, args)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Everything a concrete type exposes to inspection, in registration
/// order.
#[derive(Debug)]
pub struct TypeDescriptor {
    type_name: &'static str,
    attributes: Vec<AttributeDescriptor>,
    methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    /// Rust type name of the described type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Registered attributes.
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Registered methods.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

// ── Registration ────────────────────────────────────────────────

/// Opt-in inspection for an entity type.
///
/// The default implementation registers nothing, which still makes the
/// type [`Inspectable`] (with an empty table).
pub trait Inspect: Any + Send + Sync {
    /// Register the members a viewer may see and call.
    fn describe(d: &mut Describe<Self>)
    where
        Self: Sized,
    {
        let _ = d;
    }
}

/// Builder handed to [`Inspect::describe`].
///
/// Registering a name twice replaces the earlier registration.
pub struct Describe<T> {
    attributes: Vec<AttributeDescriptor>,
    methods: Vec<MethodDescriptor>,
    _marker: PhantomData<fn(&T)>,
}

fn downcast<T: Any>(target: &dyn Any) -> Result<&T, MemberError> {
    target
        .downcast_ref::<T>()
        .ok_or_else(|| MemberError::rejected("target has a different type"))
}

impl<T: Inspect> Describe<T> {
    fn new() -> Self {
        Self {
            attributes: Vec::new(),
            methods: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn push_attribute(&mut self, attribute: AttributeDescriptor) {
        self.attributes.retain(|a| a.name != attribute.name);
        self.attributes.push(attribute);
    }

    fn push_method(&mut self, method: MethodDescriptor) {
        self.methods.retain(|m| m.name != method.name);
        self.methods.push(method);
    }

    fn getter<V, G>(get: G) -> Getter
    where
        V: InspectValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        Box::new(move |target| get(downcast::<T>(target)?).into_value())
    }

    /// Register a read-only attribute.
    pub fn attribute<V, G>(&mut self, name: &'static str, get: G) -> &mut Self
    where
        V: InspectValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push_attribute(AttributeDescriptor {
            name,
            kind: V::KIND,
            getter: Self::getter(get),
            setter: None,
        });
        self
    }

    /// Register an attribute a viewer may overwrite.
    ///
    /// Entities are shared, so `set` receives `&T`; editable state lives
    /// behind atomics or a lock.
    pub fn editable_attribute<V, G, S>(&mut self, name: &'static str, get: G, set: S) -> &mut Self
    where
        V: InspectValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) -> Result<(), MemberError> + Send + Sync + 'static,
    {
        let setter: Setter = Box::new(move |target, value| {
            let t = downcast::<T>(target)?;
            let got = value.kind();
            let v = V::from_value(value).ok_or(MemberError::ArgumentType {
                index: 0,
                expected: V::KIND,
                got,
            })?;
            set(t, v)
        });
        self.push_attribute(AttributeDescriptor {
            name,
            kind: V::KIND,
            getter: Self::getter(get),
            setter: Some(setter),
        });
        self
    }

    /// Register a method without arguments.
    pub fn method<R, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        R: MethodReturn,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.push_method(MethodDescriptor {
            name,
            params: SmallVec::new(),
            invoker: Box::new(move |target, _args| f(downcast::<T>(target)?).into_result()),
        });
        self
    }

    /// Register a method taking one argument.
    pub fn method_with_arg<A, R, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        A: InspectValue,
        R: MethodReturn,
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        let mut params = SmallVec::new();
        params.push(A::KIND);
        self.push_method(MethodDescriptor {
            name,
            params,
            invoker: Box::new(move |target, args| {
                let t = downcast::<T>(target)?;
                let arg = args.first().cloned().ok_or(MemberError::Arity {
                    expected: 1,
                    got: 0,
                })?;
                let got = arg.kind();
                let a = A::from_value(arg).ok_or(MemberError::ArgumentType {
                    index: 0,
                    expected: A::KIND,
                    got,
                })?;
                f(t, a).into_result()
            }),
        });
        self
    }

    fn finish(self) -> TypeDescriptor {
        TypeDescriptor {
            type_name: std::any::type_name::<T>(),
            attributes: self.attributes,
            methods: self.methods,
        }
    }
}

/// Object-safe view of an [`Inspect`] type. Implemented for every
/// `T: Inspect`; never implement it by hand.
pub trait Inspectable: Any + Send + Sync {
    /// Upcast for descriptor closures.
    fn as_any(&self) -> &dyn Any;

    /// Cache key for the descriptor table.
    fn type_key(&self) -> TypeId;

    /// Build this type's descriptor table.
    fn descriptor(&self) -> TypeDescriptor;
}

impl<T: Inspect> Inspectable for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_key(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn descriptor(&self) -> TypeDescriptor {
        let mut d = Describe::<T>::new();
        T::describe(&mut d);
        d.finish()
    }
}
