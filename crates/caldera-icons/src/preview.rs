//! Preview images with per-tier change tracking.
//!
//! A preview exists at two resolution tiers: the small icon drawn inline in
//! lists, and the large preview drawn in browsers. The registry's
//! [`mark_changed`](crate::IconRegistry::mark_changed) tags tiers as stale;
//! the (external) preview-generation job polls the changed flags, rerenders,
//! and clears them with [`PreviewImage::take_changed`]. The per-tier change
//! counter lets long-running jobs detect that a tier was invalidated again
//! while they were rendering it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::owner::{IconOwner, IconSlot};
use crate::record::{ImageBuffer, PayloadKind};

/// Preview resolution tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewSize {
    /// Small inline icon.
    Icon = 0,
    /// Large browser preview.
    Preview = 1,
}

impl PreviewSize {
    /// All tiers, smallest first.
    pub const ALL: [PreviewSize; 2] = [PreviewSize::Icon, PreviewSize::Preview];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct PreviewTier {
    buffer: RwLock<Option<Arc<ImageBuffer>>>,
    changed: AtomicBool,
    changed_count: AtomicU32,
}

/// One data-block preview at all resolution tiers.
///
/// Standalone previews (not attached to a data-block) own their own icon
/// handle slot, so `PreviewImage` is itself an [`IconOwner`].
#[derive(Debug, Default)]
pub struct PreviewImage {
    tiers: [PreviewTier; 2],
    slot: IconSlot,
}

impl PreviewImage {
    /// Create an empty preview. All tiers start without pixels and unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install rendered pixels for a tier and mark it up to date.
    pub fn set_pixels(&self, size: PreviewSize, pixels: ImageBuffer) {
        let tier = &self.tiers[size.index()];
        *tier.buffer.write() = Some(Arc::new(pixels));
        tier.changed.store(false, Ordering::Release);
    }

    /// The tier's pixels, if it has been rendered.
    pub fn pixels(&self, size: PreviewSize) -> Option<Arc<ImageBuffer>> {
        self.tiers[size.index()].buffer.read().clone()
    }

    /// Whether the tier has rendered pixels.
    pub fn has_pixels(&self, size: PreviewSize) -> bool {
        self.tiers[size.index()].buffer.read().is_some()
    }

    /// Mark one tier stale and bump its change counter.
    pub fn tag_changed(&self, size: PreviewSize) {
        let tier = &self.tiers[size.index()];
        tier.changed.store(true, Ordering::Release);
        tier.changed_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark every tier stale.
    pub fn tag_changed_all(&self) {
        for size in PreviewSize::ALL {
            self.tag_changed(size);
        }
        tracing::trace!(target: "caldera_icons::preview", "preview tagged changed");
    }

    /// Whether the tier is stale.
    pub fn is_changed(&self, size: PreviewSize) -> bool {
        self.tiers[size.index()].changed.load(Ordering::Acquire)
    }

    /// Clear the tier's stale flag, returning whether it was set. Used by the
    /// regeneration job when it picks a tier up for rerendering.
    pub fn take_changed(&self, size: PreviewSize) -> bool {
        self.tiers[size.index()].changed.swap(false, Ordering::AcqRel)
    }

    /// How many times the tier has been invalidated. Monotonic; a job
    /// compares the value before and after rendering to detect a concurrent
    /// invalidation.
    pub fn changed_count(&self, size: PreviewSize) -> u32 {
        self.tiers[size.index()].changed_count.load(Ordering::Relaxed)
    }

    /// Drop all rendered pixels and mark every tier stale.
    pub fn clear(&self) {
        for tier in &self.tiers {
            *tier.buffer.write() = None;
        }
        self.tag_changed_all();
    }
}

impl IconOwner for PreviewImage {
    fn icon_slot(&self) -> &IconSlot {
        &self.slot
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::PreviewImage
    }

    fn preview(&self) -> Option<&PreviewImage> {
        Some(self)
    }
}
