use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::descriptor::TypeSchema;
use crate::value::Value;

/// Shared object handle. The only way to express graphs where one object
/// is reachable along several paths, including cycles.
pub type SharedObject = Rc<RefCell<dyn Reflect>>;

/// Reflection facade over an object instance.
///
/// Named accessors move scalar [`Value`]s; nested objects and object
/// collections are reached through [`Reflect::read`] / [`Reflect::reach`]
/// slots. Keyed access models string-indexed (map-like) objects; the
/// default impls declare the capability absent.
pub trait Reflect: Any {
    fn schema(&self) -> &TypeSchema;

    /// Read a property by its descriptor name.
    fn read(&self, name: &str) -> Slot<'_>;

    /// Assign a value to a property. Returns false when the property does
    /// not exist, is not writable, or rejects the value's kind.
    fn write(&mut self, name: &str, value: Value) -> bool;

    /// Mutable access to a nested object or collection slot.
    fn reach(&mut self, name: &str) -> Reach<'_>;

    fn has_key(&self, _key: &str) -> bool {
        false
    }

    fn read_key(&self, _key: &str) -> Option<Value> {
        None
    }

    fn write_key(&mut self, _key: &str, _value: Value) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

impl dyn Reflect {
    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Reflect>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self;
        any.downcast_mut::<T>()
    }
}

/// Borrowed or shared reference to an object.
pub enum ObjRef<'a> {
    Inline(&'a dyn Reflect),
    Shared(SharedObject),
}

impl ObjRef<'_> {
    /// Stable address identifying the object instance within one call tree.
    /// Shared handles use the cell's data pointer, so the same object has
    /// the same identity whether reached inline or through a handle.
    pub fn identity(&self) -> usize {
        match self {
            ObjRef::Inline(r) => *r as *const dyn Reflect as *const () as usize,
            ObjRef::Shared(h) => h.as_ptr() as *const dyn Reflect as *const () as usize,
        }
    }
}

/// Mutable counterpart of [`ObjRef`].
pub enum ObjMut<'a> {
    Inline(&'a mut dyn Reflect),
    Shared(SharedObject),
}

impl ObjMut<'_> {
    pub fn identity(&self) -> usize {
        match self {
            ObjMut::Inline(r) => *r as *const dyn Reflect as *const () as usize,
            ObjMut::Shared(h) => h.as_ptr() as *const dyn Reflect as *const () as usize,
        }
    }
}

/// Result of reading a property.
pub enum Slot<'a> {
    /// No such property, or no usable read accessor.
    Missing,
    /// The property holds an absent value.
    Absent,
    /// Plain value snapshot.
    Value(Value),
    /// Nested object.
    Object(ObjRef<'a>),
    /// Collection of nested objects.
    Seq(&'a dyn ReflectSeq),
}

/// Result of reaching into a mutable property slot.
pub enum Reach<'a> {
    None,
    Object(ObjMut<'a>),
    Seq(&'a mut dyn ReflectSeq),
}

/// Object-collection capability: sequential read plus append.
///
/// Appending never clears existing elements; collection mapping is
/// strictly additive.
pub trait ReflectSeq {
    fn elem_schema(&self) -> &TypeSchema;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element(&self, index: usize) -> ObjRef<'_>;

    /// Append a default-constructed element and hand it back for mapping.
    /// `None` when the element type cannot be constructed.
    fn push_default(&mut self) -> Option<&mut dyn Reflect>;

    /// Append a copy of an existing element. Returns false on a type
    /// mismatch.
    fn push_cloned(&mut self, element: &dyn Reflect) -> bool;

    /// Append an element produced by an external factory.
    fn push_boxed(&mut self, element: Box<dyn Reflect>) -> bool;
}

impl<T> ReflectSeq for Vec<T>
where
    T: ReflectSchema + Default + Clone + 'static,
{
    fn elem_schema(&self) -> &TypeSchema {
        T::type_schema()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element(&self, index: usize) -> ObjRef<'_> {
        ObjRef::Inline(&self[index])
    }

    fn push_default(&mut self) -> Option<&mut dyn Reflect> {
        self.push(T::default());
        self.last_mut().map(|e| e as &mut dyn Reflect)
    }

    fn push_cloned(&mut self, element: &dyn Reflect) -> bool {
        match element.downcast_ref::<T>() {
            Some(e) => {
                self.push(e.clone());
                true
            }
            None => false,
        }
    }

    fn push_boxed(&mut self, element: Box<dyn Reflect>) -> bool {
        let any: Box<dyn Any> = element;
        match any.downcast::<T>() {
            Ok(e) => {
                self.push(*e);
                true
            }
            Err(_) => false,
        }
    }
}

/// Static schema access for sized types. Lets rule-editing operations run
/// for a type pair without an instance at hand.
pub trait ReflectSchema: Reflect {
    fn type_schema() -> &'static TypeSchema;
}
