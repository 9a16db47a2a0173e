//! Resource identifiers and per-resource bookkeeping records.
use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Mutex, PoisonError,
    },
};

slotmap::new_key_type! {
    /// Identifies a tracked GPU resource (image, buffer, ...).
    ///
    /// Ids are handed out when a resource is registered with a `ResourceManager` and are never
    /// reused while the resource is alive. Ids serialised during capture are remapped to the
    /// ids of the live resources at replay time.
    pub struct ResourceId;
}

/// How a resource was used during the captured frame.
///
/// Used to decide whether the initial contents of a resource are needed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FrameRefType {
    /// Referenced, but not yet read or written (e.g. bound in the initial pipeline state).
    Unknown,
    // Inputs
    Read,
    Write,
    // States
    ReadOnly,
    ReadAndWrite,
    /// Read, then written. Initial contents are required.
    ReadBeforeWrite,
}

impl FrameRefType {
    /// Combines the existing reference state of a resource with a new use.
    pub fn merge(existing: Option<FrameRefType>, incoming: FrameRefType) -> FrameRefType {
        use FrameRefType::*;
        let Some(existing) = existing else {
            return match incoming {
                Read => ReadOnly,
                Write => ReadAndWrite,
                other => other,
            };
        };
        match (existing, incoming) {
            (existing, Unknown) => existing,
            // explicitly requested, e.g. for uses that are likely partial writes
            (_, ReadBeforeWrite) => ReadBeforeWrite,
            (Unknown, Read | ReadOnly) => ReadOnly,
            (Unknown, _) => ReadAndWrite,
            (ReadOnly, Write) => ReadBeforeWrite,
            (existing, _) => existing,
        }
    }

    /// Whether the resource contents at the start of the frame are observed.
    pub fn needs_initial_contents(&self) -> bool {
        matches!(self, FrameRefType::ReadOnly | FrameRefType::ReadBeforeWrite)
    }
}

/// Bookkeeping shared by everything that holds on to a resource.
///
/// The reference count may be changed from any thread. It starts at one, for the reference
/// held by the application that created the resource.
#[derive(Debug)]
pub struct ResourceRecord {
    id: ResourceId,
    name: String,
    /// Not serialised (e.g. swapchain images, which are recreated by the replay).
    special: bool,
    ref_count: AtomicI32,
    has_initial_state: AtomicBool,
    data_written: AtomicBool,
    parents: Mutex<BTreeSet<ResourceId>>,
}

impl ResourceRecord {
    pub(crate) fn new(id: ResourceId, name: &str, special: bool) -> ResourceRecord {
        ResourceRecord {
            id,
            name: name.to_string(),
            special,
            ref_count: AtomicI32::new(1),
            has_initial_state: AtomicBool::new(false),
            data_written: AtomicBool::new(false),
            parents: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    pub fn add_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops one reference. Returns `true` if none is left.
    ///
    /// Only the manager releases references, so that the last one always retires the resource.
    /// The count saturates at zero.
    pub(crate) fn release(&self) -> bool {
        let previous = self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| Some((count - 1).max(0)))
            .unwrap_or_else(|count| count);
        previous <= 1
    }

    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn has_initial_state(&self) -> bool {
        self.has_initial_state.load(Ordering::Acquire)
    }

    pub(crate) fn set_initial_state(&self, value: bool) {
        self.has_initial_state.store(value, Ordering::Release);
    }

    pub fn is_data_written(&self) -> bool {
        self.data_written.load(Ordering::Acquire)
    }

    /// Marks the record as written to the current capture. Returns whether it already was.
    pub(crate) fn mark_data_written(&self) -> bool {
        self.data_written.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn mark_data_unwritten(&self) {
        self.data_written.store(false, Ordering::Release);
    }

    /// Records a dependency on another resource. Returns `true` if it wasn't already a parent,
    /// in which case the caller must take a reference on the parent's record.
    pub(crate) fn add_parent(&self, parent: ResourceId) -> bool {
        self.parents.lock().unwrap_or_else(PoisonError::into_inner).insert(parent)
    }

    pub fn parents(&self) -> Vec<ResourceId> {
        self.parents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    pub(crate) fn take_parents(&self) -> BTreeSet<ResourceId> {
        std::mem::take(&mut *self.parents.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
