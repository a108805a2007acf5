//! Field-level plumbing behind the `Reflect` derive.
//!
//! Each trait covers one field shape the derive can generate code for:
//! plain value leaves, optional leaves, enumerations, opaque custom
//! scalars, shared object handles and object collections. The derive
//! never guesses from type names; classification is attribute-driven and
//! these traits carry the per-type knowledge.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};

use crate::descriptor::{PropertyDescriptor, PropertyKind};
use crate::object::{ObjMut, ObjRef, Reach, Reflect, ReflectSchema, SharedObject, Slot};
use crate::value::{Decimal, OpaqueValue, TextEncoding, Uuid, Value, ValueKind};

/// Plain value leaf: a field the engine moves as a [`Value`] snapshot.
pub trait PropertyValue: Sized {
    fn kind() -> PropertyKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Option<Self>;

    fn descriptor(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::new(name, Self::kind())
    }

    fn load(&self) -> Slot<'_> {
        Slot::Value(self.to_value())
    }

    fn store(&mut self, value: Value) -> bool {
        match Self::from_value(value) {
            Some(v) => {
                *self = v;
                true
            }
            None => false,
        }
    }
}

macro_rules! leaf_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(impl PropertyValue for $ty {
            fn kind() -> PropertyKind {
                PropertyKind::Scalar(ValueKind::$kind)
            }

            fn to_value(&self) -> Value {
                Value::$kind(self.clone())
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$kind(v) => Some(v),
                    _ => None,
                }
            }
        })*
    };
}

leaf_value! {
    bool => Bool,
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
    Decimal => Decimal,
    Uuid => Uuid,
    TimeDelta => Duration,
    NaiveDateTime => Timestamp,
    TextEncoding => Encoding,
    String => Str,
}

impl PropertyValue for DateTime<FixedOffset> {
    fn kind() -> PropertyKind {
        PropertyKind::Scalar(ValueKind::TimestampTz)
    }

    fn to_value(&self) -> Value {
        Value::TimestampTz(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::TimestampTz(v) => Some(v),
            _ => None,
        }
    }
}

impl PropertyValue for Vec<Value> {
    fn kind() -> PropertyKind {
        PropertyKind::ValueList
    }

    fn to_value(&self) -> Value {
        Value::List(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Optional leaves: absent maps to [`Slot::Absent`], storing `Null`
/// clears the field.
impl<T: PropertyValue> PropertyValue for Option<T> {
    fn kind() -> PropertyKind {
        T::kind()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        T::from_value(value).map(Some)
    }

    fn descriptor(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::new(name, Self::kind()).optional()
    }

    fn load(&self) -> Slot<'_> {
        match self {
            Some(v) => v.load(),
            None => Slot::Absent,
        }
    }
}

/// Enumeration leaf: a fieldless enum carried by variant name.
pub trait EnumProperty: Sized {
    const VARIANTS: &'static [&'static str];

    fn variant_name(&self) -> &'static str;

    fn from_variant_name(name: &str) -> Option<Self>;

    fn descriptor(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::new(
            name,
            PropertyKind::Enum {
                variants: Self::VARIANTS,
            },
        )
    }

    fn load(&self) -> Slot<'_> {
        Slot::Value(Value::Enum(self.variant_name().to_string()))
    }

    fn store(&mut self, value: Value) -> bool {
        if let Value::Enum(name) = value
            && let Some(v) = Self::from_variant_name(&name)
        {
            *self = v;
            return true;
        }
        false
    }
}

/// Opaque custom scalar: any cloneable `'static` type, erased into
/// [`OpaqueValue`]. Only custom converters can produce one.
pub trait OpaqueProperty: Any + Send + Sync + Clone {
    fn descriptor(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::opaque::<Self>(name)
    }

    fn load(&self) -> Slot<'_> {
        Slot::Value(Value::Opaque(OpaqueValue::new(self.clone())))
    }

    fn store(&mut self, value: Value) -> bool {
        if let Value::Opaque(o) = value
            && let Some(v) = o.downcast_ref::<Self>()
        {
            *self = v.clone();
            return true;
        }
        false
    }
}

impl<T: Any + Send + Sync + Clone> OpaqueProperty for T {}

/// Shared nested object: `Option<Rc<RefCell<T>>>` fields. The handle is
/// what makes diamond and cyclic graphs expressible.
pub trait SharedObjectProperty {
    fn descriptor(name: &str) -> PropertyDescriptor;

    fn load(&self) -> Slot<'_>;

    fn reach(&mut self) -> Reach<'_>;
}

impl<T: ReflectSchema + 'static> SharedObjectProperty for Option<Rc<RefCell<T>>> {
    fn descriptor(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::object(name, crate::descriptor::short_type_name::<T>()).optional()
    }

    fn load(&self) -> Slot<'_> {
        match self {
            Some(h) => {
                let shared: SharedObject = h.clone();
                Slot::Object(ObjRef::Shared(shared))
            }
            None => Slot::Absent,
        }
    }

    fn reach(&mut self) -> Reach<'_> {
        match self {
            Some(h) => {
                let shared: SharedObject = h.clone();
                Reach::Object(ObjMut::Shared(shared))
            }
            None => Reach::None,
        }
    }
}

/// Object collection field: `Vec<T>` of nested objects.
pub trait SeqProperty {
    fn descriptor(name: &str) -> PropertyDescriptor;

    fn load(&self) -> Slot<'_>;

    fn reach(&mut self) -> Reach<'_>;
}

impl<T: ReflectSchema + Default + Clone + 'static> SeqProperty for Vec<T> {
    fn descriptor(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::new(
            name,
            PropertyKind::ObjectSeq {
                elem: std::any::TypeId::of::<T>(),
                elem_name: crate::descriptor::short_type_name::<T>(),
                elem_default: true,
            },
        )
    }

    fn load(&self) -> Slot<'_> {
        Slot::Seq(self)
    }

    fn reach(&mut self) -> Reach<'_> {
        Reach::Seq(self)
    }
}
