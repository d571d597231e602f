//! Icon owner contract and owner kinds.
//!
//! Any data structure that wants an icon exposes exactly one mutable handle
//! field, the [`IconSlot`]. The registry reads and writes the slot on the
//! main thread; the only off-main-thread access is the zero-check-and-clear
//! in [`IconRegistry::delete_for_owner`](crate::IconRegistry::delete_for_owner).
//!
//! [`IconOwner`] is the capability trait the registry dispatches through, so
//! its teardown logic never names a concrete owner type. The owner kinds here
//! differ in where their slot lives and which [`PayloadKind`] their records
//! default to.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::handle::IconHandle;
use crate::preview::PreviewImage;
use crate::record::PayloadKind;

/// An owner's stored icon handle.
///
/// Atomic so that a worker thread requesting deletion can zero it without
/// taking the registry lock; all other access happens on the main thread.
#[derive(Debug, Default)]
pub struct IconSlot(AtomicU32);

impl IconSlot {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// The stored handle, [`IconHandle::NONE`] if the owner has no icon.
    #[inline]
    pub fn get(&self) -> IconHandle {
        IconHandle::from_raw(self.0.load(Ordering::Relaxed))
    }

    /// Store a handle.
    #[inline]
    pub fn set(&self, handle: IconHandle) {
        self.0.store(handle.raw(), Ordering::Relaxed);
    }

    /// Zero the slot.
    #[inline]
    pub fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    /// Zero the slot, returning the previous handle. This is the one
    /// operation allowed off the main thread: once it returns, the owner
    /// observes "no icon" even though record teardown may still be pending.
    #[inline]
    pub fn take(&self) -> IconHandle {
        IconHandle::from_raw(self.0.swap(0, Ordering::Relaxed))
    }

    /// Zero the slot only if it still holds `handle`.
    ///
    /// Record teardown uses this instead of an unconditional clear: if the
    /// owner re-acquired a fresh handle between a deferred deletion request
    /// and its drain, the fresh handle must survive.
    #[inline]
    pub fn clear_if(&self, handle: IconHandle) -> bool {
        self.0
            .compare_exchange(handle.raw(), 0, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}

/// Capability trait: "has an icon-handle slot".
///
/// Implementors are held behind `Arc`; records store `Weak` back-references
/// so an owner's independent lifetime is never extended by its icon.
pub trait IconOwner: Send + Sync {
    /// The owner's stored-handle field.
    fn icon_slot(&self) -> &IconSlot;

    /// The payload kind records for this owner default to.
    fn payload_kind(&self) -> PayloadKind;

    /// The owner's preview image, for kinds that carry one.
    fn preview(&self) -> Option<&PreviewImage> {
        None
    }
}

/// A generic named data-block (object, material, world, ...).
///
/// Data-blocks are the primary icon owners: their records are of kind
/// [`PayloadKind::IdPreview`] and invalidation via
/// [`IconRegistry::mark_changed`](crate::IconRegistry::mark_changed) tags the
/// block's preview tiers for regeneration.
#[derive(Debug, Default)]
pub struct DataBlock {
    name: String,
    slot: IconSlot,
    preview: OnceLock<PreviewImage>,
}

impl DataBlock {
    /// Create a data-block with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: IconSlot::new(),
            preview: OnceLock::new(),
        }
    }

    /// The data-block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the block's preview image, creating it on first use.
    pub fn preview_ensure(&self) -> &PreviewImage {
        self.preview.get_or_init(PreviewImage::new)
    }
}

impl IconOwner for DataBlock {
    fn icon_slot(&self) -> &IconSlot {
        &self.slot
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::IdPreview
    }

    fn preview(&self) -> Option<&PreviewImage> {
        self.preview.get()
    }
}

/// A grease-pencil layer; its icon is a color swatch.
#[derive(Debug)]
pub struct GreasePencilLayer {
    info: String,
    color: [f32; 3],
    slot: IconSlot,
}

impl GreasePencilLayer {
    /// Create a layer with a display name and swatch color.
    pub fn new(info: impl Into<String>, color: [f32; 3]) -> Self {
        Self {
            info: info.into(),
            color,
            slot: IconSlot::new(),
        }
    }

    /// The layer's display name.
    pub fn info(&self) -> &str {
        &self.info
    }

    /// The swatch color.
    pub fn color(&self) -> [f32; 3] {
        self.color
    }
}

impl IconOwner for GreasePencilLayer {
    fn icon_slot(&self) -> &IconSlot {
        &self.slot
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::GpLayerColor
    }
}

/// A studio light; its icon is a rendered preview ball.
#[derive(Debug)]
pub struct StudioLight {
    name: String,
    slot: IconSlot,
}

impl StudioLight {
    /// Create a studio light with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: IconSlot::new(),
        }
    }

    /// The studio light name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl IconOwner for StudioLight {
    fn icon_slot(&self) -> &IconSlot {
        &self.slot
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::StudioLight
    }
}
