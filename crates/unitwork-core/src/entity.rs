//! The entity seam: extraction, hydration and reference identity.
//!
//! The engine never touches entity fields directly. Everything it needs
//! goes through this trait: reading current column values, writing back
//! generated keys and server-returned context, and following declared
//! relation links.

use crate::value::ColumnMap;
use std::cell::RefCell;
use std::rc::Rc;

/// An in-memory domain object subject to persistence tracking.
///
/// Object-safe on purpose: the mapper and resolver operate on `dyn Entity`
/// so one schema-driven mapper serves every entity type.
pub trait Entity {
    /// The schema role of this entity type.
    fn role(&self) -> &'static str;

    /// Read the current field values as a column map.
    fn extract(&self) -> ColumnMap;

    /// Write values back into fields (generated keys, server context).
    ///
    /// Unknown columns must be ignored.
    fn hydrate(&mut self, values: &ColumnMap);

    /// The entity currently linked under the given relation name.
    fn related(&self, _relation: &str) -> Option<EntityRef> {
        None
    }
}

/// A shared, mutable handle to a tracked entity.
///
/// The engine is single-threaded (see the concurrency model), so entities
/// are shared with `Rc<RefCell<_>>` rather than `Arc<RwLock<_>>`.
pub type EntityRef = Rc<RefCell<dyn Entity>>;

/// Identity key for a tracked entity.
///
/// Tracking is keyed by the entity reference itself, not by primary key,
/// because the key may not exist until an insert commits. The heap holds a
/// strong reference alongside, so the address stays live for the key's
/// lifetime.
#[must_use]
pub fn entity_key(entity: &EntityRef) -> usize {
    Rc::as_ptr(entity).cast::<()>() as usize
}

/// Convenience for wrapping a concrete entity into an [`EntityRef`].
pub fn entity_ref<E: Entity + 'static>(entity: E) -> EntityRef {
    Rc::new(RefCell::new(entity))
}
