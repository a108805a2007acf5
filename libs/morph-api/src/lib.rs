pub mod bag;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod object;
pub mod property;
pub mod tabular;
pub mod value;

pub use bag::PropertyBag;
pub use descriptor::{PropertyDescriptor, PropertyKind, TypeSchema};
pub use error::MapError;
pub use object::{ObjMut, ObjRef, Reach, Reflect, ReflectSchema, ReflectSeq, SharedObject, Slot};
pub use value::{Decimal, OpaqueValue, TextEncoding, Uuid, Value, ValueKind};
