use std::any::{Any, TypeId};

use crate::value::ValueKind;

/// Effective shape of a property, resolved once per type.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// Leaf value of a fixed kind.
    Scalar(ValueKind),
    /// Enumeration with a fixed variant set.
    Enum { variants: &'static [&'static str] },
    /// Nested object reachable through the reflection facade.
    Object { type_name: &'static str },
    /// Collection of nested objects.
    ObjectSeq {
        elem: TypeId,
        elem_name: &'static str,
        /// Element type is default-constructible (element-construct mode).
        elem_default: bool,
    },
    /// List of plain values.
    ValueList,
    /// String-keyed map of plain values.
    ValueMap,
    /// Custom scalar only custom converters understand.
    Opaque { id: TypeId, name: &'static str },
    /// Keyed read whose value kind is only known at runtime.
    Dynamic,
}

/// Normalized view of one property. Derived, immutable, recomputed whenever
/// the rule engine runs for a type pair.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    /// Property can hold an absent value.
    pub optional: bool,
    /// String-key-indexed access: the fixed key literal this property
    /// was bound to, instead of a named accessor.
    pub key: Option<String>,
    pub readable: bool,
    pub writable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            key: None,
            readable: true,
            writable: true,
        }
    }

    pub fn scalar(name: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(name, PropertyKind::Scalar(kind))
    }

    pub fn object(name: impl Into<String>, type_name: &'static str) -> Self {
        Self::new(name, PropertyKind::Object { type_name })
    }

    pub fn opaque<T: Any>(name: impl Into<String>) -> Self {
        Self::new(
            name,
            PropertyKind::Opaque {
                id: TypeId::of::<T>(),
                name: std::any::type_name::<T>(),
            },
        )
    }

    /// Keyed read bound to `key`, value kind resolved at runtime.
    pub fn keyed_read(key: impl Into<String>) -> Self {
        let key = key.into();
        let mut d = Self::new(key.clone(), PropertyKind::Dynamic);
        d.key = Some(key);
        d.optional = true;
        d.writable = false;
        d
    }

    /// Keyed write bound to `key`; the catch-all object-to-map fallback.
    pub fn keyed_write(key: impl Into<String>) -> Self {
        let key = key.into();
        let mut d = Self::new(key.clone(), PropertyKind::Dynamic);
        d.key = Some(key);
        d.optional = true;
        d.readable = false;
        d
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// Last path segment of `std::any::type_name`, e.g. `my_crate::Person`
/// becomes `Person`. Descriptors name referenced types through this instead
/// of `TypeSchema::name`; resolving the schema of a self-referential type
/// from inside its own descriptor list would re-enter the lazy init.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Per-type metadata: identity, facet tags, keyed capability and the
/// property descriptor list (base/interface properties already flattened in).
#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub name: &'static str,
    pub id: TypeId,
    /// The type itself plus every base/interface tag it conforms to.
    /// Consulted by `Inherit` type filters.
    pub facets: Vec<TypeId>,
    /// Object supports string-keyed access.
    pub keyed: bool,
    pub properties: Vec<PropertyDescriptor>,
}

impl TypeSchema {
    pub fn of<T: Any>(name: &'static str, properties: Vec<PropertyDescriptor>) -> Self {
        Self {
            name,
            id: TypeId::of::<T>(),
            facets: vec![TypeId::of::<T>()],
            keyed: false,
            properties,
        }
    }

    pub fn keyed_of<T: Any>(name: &'static str) -> Self {
        let mut s = Self::of::<T>(name, Vec::new());
        s.keyed = true;
        s
    }

    pub fn with_facet<T: Any>(mut self) -> Self {
        self.facets.push(TypeId::of::<T>());
        self
    }

    pub fn conforms_to(&self, id: TypeId) -> bool {
        self.facets.contains(&id)
    }
}
