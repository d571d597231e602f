//! Icon record and payload types.
//!
//! Each live handle maps to one [`IconRecord`]. The record's payload is a
//! closed sum type: owner-managed kinds carry a weak back-reference to the
//! data structure that owns the icon slot (those objects manage their own
//! lifetime and merely get their stored handle zeroed at teardown), while the
//! image-buffer and geometry kinds carry data owned exclusively by the record.

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::handle::IconHandle;
use crate::owner::IconOwner;

/// Discriminant of an [`IconPayload`].
///
/// The set of kinds is small and fixed; teardown dispatches on it
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// Preview of a data-block (object, material, world, ...). The owner
    /// carries the preview buffers; the record only back-references it.
    IdPreview,
    /// A pixel buffer owned by the record (file-browser thumbnails).
    ImageBuffer,
    /// A standalone preview image that owns its own handle slot.
    PreviewImage,
    /// Vector icon geometry owned by the record.
    Geometry,
    /// A studio light's rendered ball preview.
    StudioLight,
    /// A grease-pencil layer color swatch.
    GpLayerColor,
}

/// An RGBA8 pixel buffer (one `u32` per pixel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl ImageBuffer {
    /// Create a buffer from packed RGBA8 pixels.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize,
            "pixel buffer does not match {width}x{height}",
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Buffer width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed RGBA8 pixels, row-major.
    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

/// Vector icon data: 2D byte coordinates with per-vertex RGBA colors.
///
/// Coordinates are normalized to a 0..=255 unit square; rasterization is the
/// renderer's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconGeometry {
    /// Triangle vertex positions, three per triangle.
    pub coords: Vec<[u8; 2]>,
    /// Per-vertex RGBA colors, parallel to `coords`.
    pub colors: Vec<[u8; 4]>,
}

/// The data behind one icon handle.
pub enum IconPayload {
    /// Weak back-reference to a data-block with a preview.
    IdPreview(Weak<dyn IconOwner>),
    /// Pixel buffer owned by the record.
    ImageBuffer(Arc<ImageBuffer>),
    /// Weak back-reference to a standalone preview image.
    PreviewImage(Weak<dyn IconOwner>),
    /// Vector geometry owned by the record.
    Geometry(Arc<IconGeometry>),
    /// Weak back-reference to a studio light.
    StudioLight(Weak<dyn IconOwner>),
    /// Weak back-reference to a grease-pencil layer.
    GpLayerColor(Weak<dyn IconOwner>),
}

impl IconPayload {
    /// The discriminant for this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::IdPreview(_) => PayloadKind::IdPreview,
            Self::ImageBuffer(_) => PayloadKind::ImageBuffer,
            Self::PreviewImage(_) => PayloadKind::PreviewImage,
            Self::Geometry(_) => PayloadKind::Geometry,
            Self::StudioLight(_) => PayloadKind::StudioLight,
            Self::GpLayerColor(_) => PayloadKind::GpLayerColor,
        }
    }

    /// Build the payload for an owner-managed record of the given kind.
    ///
    /// Returns `None` for the exclusively-owned kinds, which cannot
    /// back-reference an owner.
    pub(crate) fn for_owner(kind: PayloadKind, owner: Weak<dyn IconOwner>) -> Option<Self> {
        match kind {
            PayloadKind::IdPreview => Some(Self::IdPreview(owner)),
            PayloadKind::PreviewImage => Some(Self::PreviewImage(owner)),
            PayloadKind::StudioLight => Some(Self::StudioLight(owner)),
            PayloadKind::GpLayerColor => Some(Self::GpLayerColor(owner)),
            PayloadKind::ImageBuffer | PayloadKind::Geometry => None,
        }
    }

    /// The weak owner back-reference, for the owner-managed kinds.
    pub fn owner(&self) -> Option<&Weak<dyn IconOwner>> {
        match self {
            Self::IdPreview(owner)
            | Self::PreviewImage(owner)
            | Self::StudioLight(owner)
            | Self::GpLayerColor(owner) => Some(owner),
            Self::ImageBuffer(_) | Self::Geometry(_) => None,
        }
    }
}

/// Registry bookkeeping for one live handle.
pub struct IconRecord {
    payload: IconPayload,
    managed: bool,
    /// Deferred-created rendering resource; the cache type's `Drop` releases
    /// it when the record is torn down or the cache is replaced.
    draw_cache: Option<Box<dyn Any + Send + Sync>>,
}

impl IconRecord {
    /// Create a record whose lifecycle is tied to an owner ("ensure" family).
    pub fn managed(payload: IconPayload) -> Self {
        Self {
            payload,
            managed: true,
            draw_cache: None,
        }
    }

    /// Create a manually managed record (ad hoc resources, scripting).
    pub fn unmanaged(payload: IconPayload) -> Self {
        Self {
            payload,
            managed: false,
            draw_cache: None,
        }
    }

    /// The record's payload.
    #[inline]
    pub fn payload(&self) -> &IconPayload {
        &self.payload
    }

    /// The payload discriminant.
    #[inline]
    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    /// True if the record's lifecycle is owned by internal "ensure" logic.
    #[inline]
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Install (or replace) the draw cache. A replaced cache is dropped.
    pub fn set_draw_cache(&mut self, cache: Box<dyn Any + Send + Sync>) {
        self.draw_cache = Some(cache);
    }

    /// Whether a draw cache has been created for this record.
    #[inline]
    pub fn has_draw_cache(&self) -> bool {
        self.draw_cache.is_some()
    }

    /// Clear the owner's stored handle, if this record back-references an
    /// owner that is still alive and its slot still holds `handle`. Called
    /// during teardown so a stale handle is never observed after its record
    /// is gone; the conditional clear protects a handle the owner re-acquired
    /// between a deferred deletion request and its drain.
    pub(crate) fn clear_owner_slot(&self, handle: IconHandle) {
        if let Some(weak) = self.payload.owner() {
            if let Some(owner) = weak.upgrade() {
                owner.icon_slot().clear_if(handle);
            }
        }
    }
}

/// A copyable view of a record, returned by lookups.
///
/// The registry hands out plain data instead of references so that no caller
/// code runs while the registry lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconInfo {
    /// The record's handle.
    pub handle: IconHandle,
    /// The payload discriminant.
    pub kind: PayloadKind,
    /// Whether the record is lifecycle-managed.
    pub managed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_buffer_dimensions() {
        let buf = ImageBuffer::new(2, 3, vec![0; 6]);
        assert_eq!(buf.width(), 2);
        assert_eq!(buf.height(), 3);
        assert_eq!(buf.pixels().len(), 6);
    }

    #[test]
    #[should_panic(expected = "pixel buffer does not match")]
    fn image_buffer_rejects_bad_length() {
        ImageBuffer::new(4, 4, vec![0; 3]);
    }

    #[test]
    fn payload_kind_mapping() {
        let buf = IconPayload::ImageBuffer(Arc::new(ImageBuffer::new(1, 1, vec![0])));
        assert_eq!(buf.kind(), PayloadKind::ImageBuffer);
        assert!(buf.owner().is_none());

        let geom = IconPayload::Geometry(Arc::new(IconGeometry::default()));
        assert_eq!(geom.kind(), PayloadKind::Geometry);
        assert!(geom.owner().is_none());
    }

    #[test]
    fn managed_flag() {
        let geom = || IconPayload::Geometry(Arc::new(IconGeometry::default()));
        assert!(IconRecord::managed(geom()).is_managed());
        assert!(!IconRecord::unmanaged(geom()).is_managed());
    }

    #[test]
    fn draw_cache_install() {
        let mut record =
            IconRecord::unmanaged(IconPayload::Geometry(Arc::new(IconGeometry::default())));
        assert!(!record.has_draw_cache());
        record.set_draw_cache(Box::new([0u8; 16]));
        assert!(record.has_draw_cache());
    }
}
