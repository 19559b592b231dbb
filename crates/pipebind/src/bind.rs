//! Bind targets: typed destinations for field assignments.
//!
//! A [`FieldSlot`] is the caller-owned variable; binding it to a field name
//! builds a [`BindTarget`] that captures the destination's declared
//! [`Kind`] (including bit width) and a write capability into the slot. The
//! reader loop is the only writer, so callers observe eventually-consistent
//! updates through [`FieldSlot::get`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::value::{CoerceError, FloatWidth, IntWidth, Kind, Value, coerce};

/// A shared destination variable for a bound field.
///
/// Cloning the slot shares the underlying variable; the server keeps one
/// clone inside the bind target while the caller keeps another to read from.
#[derive(Debug, Default)]
pub struct FieldSlot<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for FieldSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> FieldSlot<T> {
    /// Creates a slot holding `initial` until the first assignment lands.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    fn set(&self, value: T) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl<T: Clone> FieldSlot<T> {
    /// Returns a snapshot of the current value.
    pub fn get(&self) -> T {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Types that can be the destination of a field binding.
pub trait Bindable: Send + 'static {
    /// The declared kind (and width) the coercion engine targets.
    fn kind() -> Kind;

    /// Converts a coerced value back into the destination type.
    ///
    /// Returns `None` only if the value does not match `Self::kind()`, which
    /// cannot happen for values produced by coercing against that kind.
    fn from_value(value: Value) -> Option<Self>
    where
        Self: Sized;
}

impl Bindable for bool {
    fn kind() -> Kind {
        Kind::Bool
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! bindable_int {
    ($($ty:ty => $width:expr),+ $(,)?) => {
        $(impl Bindable for $ty {
            fn kind() -> Kind {
                Kind::Int($width)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Int(v) => Self::try_from(v).ok(),
                    _ => None,
                }
            }
        })+
    };
}

macro_rules! bindable_uint {
    ($($ty:ty => $width:expr),+ $(,)?) => {
        $(impl Bindable for $ty {
            fn kind() -> Kind {
                Kind::Uint($width)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Uint(v) => Self::try_from(v).ok(),
                    _ => None,
                }
            }
        })+
    };
}

bindable_int! {
    i8 => IntWidth::W8,
    i16 => IntWidth::W16,
    i32 => IntWidth::W32,
    i64 => IntWidth::W64,
}

bindable_uint! {
    u8 => IntWidth::W8,
    u16 => IntWidth::W16,
    u32 => IntWidth::W32,
    u64 => IntWidth::W64,
}

impl Bindable for f32 {
    fn kind() -> Kind {
        Kind::Float(FloatWidth::W32)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            // Width was checked during coercion; this narrows precision only.
            Value::Float(v) => Some(v as Self),
            _ => None,
        }
    }
}

impl Bindable for f64 {
    fn kind() -> Kind {
        Kind::Float(FloatWidth::W64)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl Bindable for String {
    fn kind() -> Kind {
        Kind::Text
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn kind() -> Kind {
        Kind::Seq(Box::new(T::kind()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Seq(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// Descriptor pairing a destination's declared kind with write access to it.
///
/// Built once when a field is bound; the reader loop drives [`Self::assign`]
/// for every assignment record naming the field.
pub(crate) struct BindTarget {
    kind: Kind,
    write: Box<dyn FnMut(Value) + Send>,
}

impl BindTarget {
    pub(crate) fn new<T: Bindable>(slot: &FieldSlot<T>) -> Self {
        let slot = slot.clone();
        Self {
            kind: T::kind(),
            write: Box::new(move |value| {
                if let Some(converted) = T::from_value(value) {
                    slot.set(converted);
                }
            }),
        }
    }

    /// Coerces `raw` against the declared kind and stores the result.
    pub(crate) fn assign(&mut self, field: &str, raw: &str) -> Result<(), CoerceError> {
        let value = coerce(raw, &self.kind).map_err(|error| error.for_field(field))?;
        (self.write)(value);
        Ok(())
    }
}
