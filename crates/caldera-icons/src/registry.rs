//! The icon registry.
//!
//! [`IconRegistry`] owns the handle→record mapping, the handle counter, and
//! the deferred-delete queue. Bookkeeping (lookups, allocation, queue append)
//! is thread-safe behind a single mutex; structural teardown of a record's
//! payload is not locked and must happen on the registry's owning thread.
//! Worker threads that need a deletion go through
//! [`delete_for_owner`](IconRegistry::delete_for_owner), which zeroes the
//! owner's slot immediately and queues the real removal for the main thread
//! to pick up in [`drain_deferred_deletes`](IconRegistry::drain_deferred_deletes).
//!
//! The registry is an explicit context object: the host constructs one
//! (typically inside an `Arc`) during startup and passes it to call sites.
//! "Main thread" for a registry means the thread that constructed it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use caldera_core::thread_check::ThreadAffinity;

use crate::error::{IconError, IconResult};
use crate::handle::IconHandle;
use crate::owner::IconOwner;
use crate::record::{IconGeometry, IconInfo, IconPayload, IconRecord, ImageBuffer, PayloadKind};

/// One occupied handle. A handle handed out by
/// [`IconRegistry::allocate_handle`] occupies its slot immediately so it can
/// never be handed out twice, even before a record is installed under it.
enum MapEntry {
    /// Allocated, no record installed yet.
    Allocated,
    /// Allocated with a live record.
    Installed(IconRecord),
}

impl MapEntry {
    fn record(&self) -> Option<&IconRecord> {
        match self {
            Self::Installed(record) => Some(record),
            Self::Allocated => None,
        }
    }

    fn into_record(self) -> Option<IconRecord> {
        match self {
            Self::Installed(record) => Some(record),
            Self::Allocated => None,
        }
    }
}

/// Mapping and allocator state, guarded by the registry mutex.
struct RegistryState {
    entries: HashMap<u32, MapEntry>,
    /// Next candidate for the fast monotonic allocation path; `0` once the
    /// counter has wrapped, after which allocation scans for gaps.
    next_handle: u32,
    /// Reserved built-in handles occupy `[1, first_dynamic)`.
    first_dynamic: u32,
}

impl RegistryState {
    /// Find the next free handle without occupying it.
    fn find_free(&mut self) -> IconHandle {
        // Fast path: the counter only ever moves forward, so freed handles
        // are not revisited while it still has headroom.
        while self.next_handle != 0 {
            let candidate = self.next_handle;
            self.next_handle = self.next_handle.wrapping_add(1);
            if self.next_handle < self.first_dynamic {
                // Wrapped; the fast path is retired for this registry.
                self.next_handle = 0;
            }
            if !self.entries.contains_key(&candidate) {
                return IconHandle::from_raw(candidate);
            }
        }

        // Slow path: scan for the lowest unused handle at or above the
        // reserved boundary. With `len` occupied handles, one of the first
        // `len + 1` candidates must be free unless the space is truly full.
        let start = u64::from(self.first_dynamic);
        let end = (start + self.entries.len() as u64).min(u64::from(u32::MAX));
        for candidate in start..=end {
            let candidate = candidate as u32;
            if !self.entries.contains_key(&candidate) {
                return IconHandle::from_raw(candidate);
            }
        }

        tracing::error!(target: "caldera_icons::registry", "icon handle space exhausted");
        IconHandle::NONE
    }

    /// Allocate a handle and occupy it with the given entry.
    fn allocate(&mut self, entry: MapEntry) -> IconHandle {
        let handle = self.find_free();
        if handle.is_some() {
            self.entries.insert(handle.raw(), entry);
        }
        handle
    }
}

/// Process table mapping icon handles to their resource records.
///
/// See the [module docs](self) for the threading discipline.
pub struct IconRegistry {
    state: Mutex<RegistryState>,
    deferred_tx: Sender<IconHandle>,
    /// Drained only on the registry's owning thread.
    deferred_rx: Receiver<IconHandle>,
    affinity: ThreadAffinity,
    headless: bool,
}

static_assertions::assert_impl_all!(IconRegistry: Send, Sync);

impl IconRegistry {
    /// Create a registry whose dynamic handles start at `first_dynamic`
    /// (clamped to at least 1; handle 0 is the "no icon" sentinel).
    ///
    /// The constructing thread becomes the registry's main thread. Headless
    /// behavior follows the process-wide flag
    /// ([`caldera_core::is_headless`]) sampled now.
    pub fn new(first_dynamic: u32) -> Self {
        Self::with_headless(first_dynamic, caldera_core::is_headless())
    }

    /// Create a registry that behaves as if the process were headless,
    /// regardless of the process-wide flag. Ensure-style entry points
    /// short-circuit to "no icon".
    pub fn new_headless(first_dynamic: u32) -> Self {
        Self::with_headless(first_dynamic, true)
    }

    fn with_headless(first_dynamic: u32, headless: bool) -> Self {
        let first_dynamic = first_dynamic.max(1);
        let (deferred_tx, deferred_rx) = crossbeam_channel::unbounded();
        Self {
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                next_handle: first_dynamic,
                first_dynamic,
            }),
            deferred_tx,
            deferred_rx,
            affinity: ThreadAffinity::current(),
            headless,
        }
    }

    /// The first dynamically allocated handle value.
    pub fn first_dynamic(&self) -> u32 {
        self.state.lock().first_dynamic
    }

    /// Whether this registry short-circuits display-resource creation.
    #[inline]
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Number of occupied handles (records plus bare allocations).
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True if no handles are occupied.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Allocate the next unused handle.
    ///
    /// Thread-safe. The handle occupies its map slot immediately, so it is
    /// never handed out again until deleted; a record can be installed under
    /// it later via [`set`](Self::set). Returns [`IconHandle::NONE`] when no
    /// free handle exists; callers must treat that as "no icon" and skip
    /// icon creation.
    pub fn allocate_handle(&self) -> IconHandle {
        self.state.lock().allocate(MapEntry::Allocated)
    }

    /// Get (or create) the icon handle for an owner.
    ///
    /// Idempotent: an owner that already carries a handle gets it back
    /// unchanged. Otherwise a managed record back-referencing the owner is
    /// installed and the new handle is stored into the owner's slot.
    ///
    /// Main-thread only (debug assertion). Returns [`IconHandle::NONE`] in
    /// headless mode or on handle exhaustion.
    pub fn ensure_for_owner<O>(&self, owner: &Arc<O>) -> IconHandle
    where
        O: IconOwner + 'static,
    {
        self.affinity.debug_assert_same_thread();
        if self.headless {
            return IconHandle::NONE;
        }

        let existing = owner.icon_slot().get();
        if existing.is_some() {
            return existing;
        }

        let kind = owner.payload_kind();
        let weak: Weak<dyn IconOwner> = Arc::downgrade(&(Arc::clone(owner) as Arc<dyn IconOwner>));
        let Some(payload) = IconPayload::for_owner(kind, weak) else {
            debug_assert!(false, "owner payload kind {kind:?} cannot back-reference an owner");
            return IconHandle::NONE;
        };

        let handle = self
            .state
            .lock()
            .allocate(MapEntry::Installed(IconRecord::managed(payload)));
        if handle.is_some() {
            owner.icon_slot().set(handle);
            tracing::trace!(target: "caldera_icons::registry", %handle, ?kind, "icon ensured for owner");
        }
        handle
    }

    /// Install an unmanaged record for an ad hoc resource.
    ///
    /// The record takes ownership of buffer/geometry payloads. Main-thread
    /// only (debug assertion). In headless mode every kind except the
    /// image-buffer one short-circuits to [`IconHandle::NONE`]; thumbnails
    /// are still produced by batch jobs without a display.
    pub fn create_unmanaged(&self, payload: IconPayload) -> IconHandle {
        self.affinity.debug_assert_same_thread();
        let kind = payload.kind();
        if self.headless && kind != PayloadKind::ImageBuffer {
            return IconHandle::NONE;
        }

        let handle = self
            .state
            .lock()
            .allocate(MapEntry::Installed(IconRecord::unmanaged(payload)));
        if handle.is_some() {
            tracing::trace!(target: "caldera_icons::registry", %handle, ?kind, "unmanaged icon created");
        }
        handle
    }

    /// Look up a record, returning a copyable view of its bookkeeping.
    ///
    /// Thread-safe. An unknown handle (or a bare allocation with no record
    /// installed yet) is "no icon available", not a fatal condition; it is
    /// logged at debug level and reported as [`IconError::NotFound`].
    pub fn get(&self, handle: IconHandle) -> IconResult<IconInfo> {
        let info = {
            let state = self.state.lock();
            state
                .entries
                .get(&handle.raw())
                .and_then(MapEntry::record)
                .map(|record| IconInfo {
                    handle,
                    kind: record.kind(),
                    managed: record.is_managed(),
                })
        };
        info.ok_or_else(|| {
            tracing::debug!(target: "caldera_icons::registry", %handle, "icon not found");
            IconError::NotFound(handle)
        })
    }

    /// The pixel buffer behind an image-buffer icon, if the handle is live
    /// and of that kind. Thread-safe.
    pub fn image_buffer(&self, handle: IconHandle) -> Option<Arc<ImageBuffer>> {
        let state = self.state.lock();
        match state
            .entries
            .get(&handle.raw())
            .and_then(MapEntry::record)
            .map(IconRecord::payload)
        {
            Some(IconPayload::ImageBuffer(buffer)) => Some(Arc::clone(buffer)),
            _ => None,
        }
    }

    /// The geometry behind a geometry icon, if the handle is live and of
    /// that kind. Thread-safe.
    pub fn geometry(&self, handle: IconHandle) -> Option<Arc<IconGeometry>> {
        let state = self.state.lock();
        match state
            .entries
            .get(&handle.raw())
            .and_then(MapEntry::record)
            .map(IconRecord::payload)
        {
            Some(IconPayload::Geometry(geometry)) => Some(Arc::clone(geometry)),
            _ => None,
        }
    }

    /// Install a record under a specific handle.
    ///
    /// Insert-if-absent, used at startup to register the reserved built-in
    /// handles below `first_dynamic`, and to fill in a handle previously
    /// obtained from [`allocate_handle`](Self::allocate_handle). Installing
    /// over an existing record is a programmer error, reported as
    /// [`IconError::AlreadyExists`] with the mapping left untouched.
    /// Main-thread only (debug assertion).
    pub fn set(&self, handle: IconHandle, record: IconRecord) -> IconResult<()> {
        self.affinity.debug_assert_same_thread();
        debug_assert!(handle.is_some(), "cannot register the null icon handle");

        let mut state = self.state.lock();
        match state.entries.entry(handle.raw()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().record().is_some() {
                    tracing::warn!(target: "caldera_icons::registry", %handle, "icon already registered");
                    return Err(IconError::AlreadyExists(handle));
                }
                // Bare allocation: the record fills it in.
                occupied.insert(MapEntry::Installed(record));
                Ok(())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MapEntry::Installed(record));
                Ok(())
            }
        }
    }

    /// Tag an ID-preview icon's preview tiers for regeneration.
    ///
    /// No-op for [`IconHandle::NONE`], in headless mode, for an unknown
    /// handle, or when the owner carries no preview buffers. Debug-asserts
    /// that the record is of the ID-preview kind. Does not render anything
    /// itself; the preview job notices the changed flags later.
    pub fn mark_changed(&self, handle: IconHandle) {
        if handle.is_none() || self.headless {
            return;
        }

        let owner = {
            let state = self.state.lock();
            let Some(record) = state.entries.get(&handle.raw()).and_then(MapEntry::record) else {
                return;
            };
            debug_assert_eq!(
                record.kind(),
                PayloadKind::IdPreview,
                "mark_changed expects an ID-preview icon",
            );
            record.payload().owner().cloned()
        };

        if let Some(owner) = owner.and_then(|weak| weak.upgrade()) {
            if let Some(preview) = owner.preview() {
                preview.tag_changed_all();
                tracing::trace!(target: "caldera_icons::registry", %handle, "icon marked changed");
            }
        }
    }

    /// Remove a handle and tear down its record.
    ///
    /// Teardown clears the owner's stored handle (for back-referencing
    /// kinds) and drops owned payloads and the draw cache; deleting a bare
    /// allocation just returns the handle to the pool. Main-thread only
    /// (debug assertion). Returns `false` if the handle was unknown.
    pub fn delete(&self, handle: IconHandle) -> bool {
        self.affinity.debug_assert_same_thread();
        if handle.is_none() {
            return false;
        }
        let entry = self.state.lock().entries.remove(&handle.raw());
        match entry {
            Some(entry) => {
                if let Some(record) = entry.into_record() {
                    Self::teardown(handle, record);
                }
                true
            }
            None => false,
        }
    }

    /// Remove a handle unless its record is lifecycle-managed.
    ///
    /// The public (scripting-facing) deletion entry point: records created
    /// through the ensure family are refused with `false`, leaving the
    /// mapping unchanged. The refusal is expected and recoverable, so it is
    /// not logged. Main-thread only (debug assertion).
    pub fn delete_unmanaged(&self, handle: IconHandle) -> bool {
        self.affinity.debug_assert_same_thread();
        if handle.is_none() {
            return false;
        }
        let mut state = self.state.lock();
        if let Entry::Occupied(occupied) = state.entries.entry(handle.raw()) {
            if occupied.get().record().is_some_and(IconRecord::is_managed) {
                return false;
            }
            let entry = occupied.remove();
            drop(state);
            if let Some(record) = entry.into_record() {
                Self::teardown(handle, record);
            }
            true
        } else {
            false
        }
    }

    /// Delete the icon stored on an owner, from any thread.
    ///
    /// The owner's slot is zeroed immediately, so a subsequent
    /// [`ensure_for_owner`](Self::ensure_for_owner) on the same owner can
    /// never observe the stale handle. On the registry's own thread the
    /// record is torn down synchronously (after draining any pending
    /// deferred deletes); from any other thread the handle is queued and the
    /// record stays live until the main thread drains the queue.
    pub fn delete_for_owner(&self, owner: &dyn IconOwner) {
        let handle = owner.icon_slot().take();
        if handle.is_none() {
            return;
        }
        if self.affinity.is_same_thread() {
            self.drain_deferred_deletes();
            self.delete(handle);
        } else {
            // Unbounded channel append; workers never block on the main
            // thread's bookkeeping.
            let _ = self.deferred_tx.send(handle);
            tracing::trace!(target: "caldera_icons::registry", %handle, "icon delete deferred");
        }
    }

    /// Tear down every handle queued by cross-thread deletion requests.
    ///
    /// Main-thread only (debug assertion). The host calls this at a
    /// controlled point, e.g. once per update tick, to bound queue growth.
    pub fn drain_deferred_deletes(&self) {
        self.affinity.debug_assert_same_thread();
        let mut drained = 0usize;
        while let Ok(handle) = self.deferred_rx.try_recv() {
            let entry = self.state.lock().entries.remove(&handle.raw());
            if let Some(record) = entry.and_then(MapEntry::into_record) {
                Self::teardown(handle, record);
                drained += 1;
            }
        }
        if drained > 0 {
            tracing::debug!(target: "caldera_icons::registry", drained, "drained deferred icon deletes");
        }
    }

    /// Tear down every record and reset the allocator.
    ///
    /// Main-thread only (debug assertion). Pending deferred deletes are
    /// drained first; afterwards the registry is empty and allocates from
    /// `first_dynamic` again.
    pub fn clear(&self) {
        self.affinity.debug_assert_same_thread();
        self.drain_deferred_deletes();

        let entries = {
            let mut state = self.state.lock();
            state.next_handle = state.first_dynamic;
            std::mem::take(&mut state.entries)
        };
        let count = entries.len();
        for (raw, entry) in entries {
            if let Some(record) = entry.into_record() {
                Self::teardown(IconHandle::from_raw(raw), record);
            }
        }
        if count > 0 {
            tracing::debug!(target: "caldera_icons::registry", count, "icon registry cleared");
        }
    }

    /// Per-kind teardown, run outside the registry lock.
    fn teardown(handle: IconHandle, record: IconRecord) {
        record.clear_owner_slot(handle);
        tracing::trace!(target: "caldera_icons::registry", %handle, kind = ?record.kind(), "icon deleted");
        // Owned payloads and the draw cache are released by dropping the
        // record here.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::{DataBlock, GreasePencilLayer, StudioLight};
    use crate::preview::{PreviewImage, PreviewSize};
    use std::collections::HashSet;

    fn pixel(value: u32) -> ImageBuffer {
        ImageBuffer::new(1, 1, vec![value])
    }

    #[test]
    fn allocated_handles_are_unique() {
        let registry = IconRegistry::new(1);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let h = registry.allocate_handle();
            assert!(h.is_some());
            assert!(seen.insert(h), "handle {h} returned twice");
        }
        for _ in 0..16 {
            let h = registry.create_unmanaged(IconPayload::ImageBuffer(Arc::new(pixel(0))));
            assert!(seen.insert(h), "handle {h} returned twice");
        }
        let block = Arc::new(DataBlock::new("Cube"));
        assert!(seen.insert(registry.ensure_for_owner(&block)));
    }

    #[test]
    fn allocation_starts_at_first_dynamic() {
        let registry = IconRegistry::new(1);
        assert_eq!(registry.allocate_handle(), IconHandle::from_raw(1));
        assert_eq!(registry.allocate_handle(), IconHandle::from_raw(2));

        let reserved = IconRegistry::new(100);
        assert_eq!(reserved.first_dynamic(), 100);
        assert_eq!(reserved.allocate_handle(), IconHandle::from_raw(100));
    }

    #[test]
    fn ensure_is_idempotent() {
        let registry = IconRegistry::new(1);
        let block = Arc::new(DataBlock::new("Suzanne"));

        let first = registry.ensure_for_owner(&block);
        assert!(first.is_some());
        assert_eq!(block.icon_slot().get(), first);

        let second = registry.ensure_for_owner(&block);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        let info = registry.get(first).unwrap();
        assert_eq!(info.kind, PayloadKind::IdPreview);
        assert!(info.managed);
    }

    #[test]
    fn ensure_covers_every_owner_kind() {
        let registry = IconRegistry::new(1);

        let light = Arc::new(StudioLight::new("Default"));
        let layer = Arc::new(GreasePencilLayer::new("Lines", [0.8, 0.1, 0.1]));
        let preview = Arc::new(PreviewImage::new());

        let h_light = registry.ensure_for_owner(&light);
        let h_layer = registry.ensure_for_owner(&layer);
        let h_preview = registry.ensure_for_owner(&preview);

        assert_eq!(registry.get(h_light).unwrap().kind, PayloadKind::StudioLight);
        assert_eq!(registry.get(h_layer).unwrap().kind, PayloadKind::GpLayerColor);
        assert_eq!(registry.get(h_preview).unwrap().kind, PayloadKind::PreviewImage);
        assert_eq!(preview.icon_slot().get(), h_preview);
    }

    #[test]
    fn handle_reuse_only_after_exhaustion() {
        // A boundary near the top of the handle space makes the monotonic
        // range small enough to exhaust.
        let first = u32::MAX - 2;
        let registry = IconRegistry::new(first);

        let a = registry.create_unmanaged(IconPayload::Geometry(Arc::new(IconGeometry::default())));
        let b = registry.create_unmanaged(IconPayload::Geometry(Arc::new(IconGeometry::default())));
        let c = registry.create_unmanaged(IconPayload::Geometry(Arc::new(IconGeometry::default())));
        assert_eq!(a, IconHandle::from_raw(first));
        assert_eq!(b, IconHandle::from_raw(first + 1));
        assert_eq!(c, IconHandle::from_raw(first + 2));

        // The whole space is live: nothing left.
        assert_eq!(registry.allocate_handle(), IconHandle::NONE);

        // A freed handle becomes reachable through the scan path, and only
        // the freed one.
        assert!(registry.delete(b));
        assert_eq!(registry.allocate_handle(), b);
        assert_eq!(registry.allocate_handle(), IconHandle::NONE);
    }

    #[test]
    fn delete_unmanaged_refuses_managed_records() {
        let registry = IconRegistry::new(1);
        let block = Arc::new(DataBlock::new("Material"));
        let handle = registry.ensure_for_owner(&block);

        assert!(!registry.delete_unmanaged(handle));
        // Still live and retrievable.
        assert!(registry.get(handle).is_ok());
        assert_eq!(block.icon_slot().get(), handle);

        // The internal deletion path still works.
        assert!(registry.delete(handle));
        assert_eq!(registry.get(handle), Err(IconError::NotFound(handle)));
        assert!(block.icon_slot().get().is_none());
    }

    #[test]
    fn deferred_delete_from_worker_thread() {
        let registry = Arc::new(IconRegistry::new(1));
        let block = Arc::new(DataBlock::new("Lamp"));
        let handle = registry.ensure_for_owner(&block);

        {
            let registry = Arc::clone(&registry);
            let block = Arc::clone(&block);
            std::thread::spawn(move || {
                registry.delete_for_owner(block.as_ref());
            })
            .join()
            .unwrap();
        }

        // The owner sees "no icon" immediately, but the record stays live
        // until the main thread drains the queue.
        assert!(block.icon_slot().get().is_none());
        assert!(registry.get(handle).is_ok());

        registry.drain_deferred_deletes();
        assert_eq!(registry.get(handle), Err(IconError::NotFound(handle)));
    }

    #[test]
    fn delete_for_owner_on_main_thread_is_synchronous() {
        let registry = IconRegistry::new(1);
        let block = Arc::new(DataBlock::new("World"));
        let handle = registry.ensure_for_owner(&block);

        registry.delete_for_owner(block.as_ref());
        assert!(block.icon_slot().get().is_none());
        assert_eq!(registry.get(handle), Err(IconError::NotFound(handle)));

        // Owner without an icon: no-op.
        registry.delete_for_owner(block.as_ref());
        assert!(registry.is_empty());
    }

    #[test]
    fn headless_mode_creates_no_records() {
        let registry = IconRegistry::new_headless(1);
        let block = Arc::new(DataBlock::new("Camera"));

        assert_eq!(registry.ensure_for_owner(&block), IconHandle::NONE);
        assert!(block.icon_slot().get().is_none());
        assert!(registry.is_empty());

        // Geometry is a display resource; thumbnails are not.
        let geom =
            registry.create_unmanaged(IconPayload::Geometry(Arc::new(IconGeometry::default())));
        assert_eq!(geom, IconHandle::NONE);
        let thumb = registry.create_unmanaged(IconPayload::ImageBuffer(Arc::new(pixel(0))));
        assert!(thumb.is_some());

        // mark_changed is a no-op rather than an error.
        registry.mark_changed(thumb);
    }

    #[test]
    fn mark_changed_tags_every_preview_tier() {
        let registry = IconRegistry::new(1);
        let block = Arc::new(DataBlock::new("Tree"));
        block.preview_ensure().set_pixels(PreviewSize::Icon, pixel(0));
        let handle = registry.ensure_for_owner(&block);

        registry.mark_changed(handle);
        let preview = block.preview().unwrap();
        for size in PreviewSize::ALL {
            assert!(preview.is_changed(size));
            assert_eq!(preview.changed_count(size), 1);
        }

        // Unknown handles and the sentinel are quietly ignored.
        registry.mark_changed(IconHandle::NONE);
        registry.mark_changed(IconHandle::from_raw(9999));
    }

    #[test]
    fn mark_changed_without_preview_is_noop() {
        let registry = IconRegistry::new(1);
        let block = Arc::new(DataBlock::new("Empty"));
        let handle = registry.ensure_for_owner(&block);

        registry.mark_changed(handle);
        assert!(block.preview().is_none());
    }

    #[test]
    fn scenario_allocate_then_delete() {
        let registry = IconRegistry::new(1);
        assert_eq!(registry.allocate_handle(), IconHandle::from_raw(1));
        assert_eq!(registry.allocate_handle(), IconHandle::from_raw(2));

        assert!(registry.delete(IconHandle::from_raw(1)));
        assert_eq!(
            registry.get(IconHandle::from_raw(1)),
            Err(IconError::NotFound(IconHandle::from_raw(1)))
        );

        // Unknown handle: delete reports false.
        assert!(!registry.delete(IconHandle::from_raw(40)));
        assert!(!registry.delete(IconHandle::NONE));
    }

    #[test]
    fn scenario_reserved_set_rejects_double_registration() {
        let registry = IconRegistry::new(200);
        let reserved = IconHandle::from_raw(100);

        let record_a = IconRecord::unmanaged(IconPayload::Geometry(Arc::new(IconGeometry {
            coords: vec![[0, 0], [255, 0], [0, 255]],
            colors: vec![[255, 255, 255, 255]; 3],
        })));
        assert_eq!(registry.set(reserved, record_a), Ok(()));

        let record_b =
            IconRecord::unmanaged(IconPayload::Geometry(Arc::new(IconGeometry::default())));
        assert_eq!(
            registry.set(reserved, record_b),
            Err(IconError::AlreadyExists(reserved))
        );

        // The first registration survives.
        let geometry = registry.geometry(reserved).unwrap();
        assert_eq!(geometry.coords.len(), 3);
    }

    #[test]
    fn set_fills_in_a_bare_allocation() {
        let registry = IconRegistry::new(1);
        let handle = registry.allocate_handle();
        assert_eq!(registry.get(handle), Err(IconError::NotFound(handle)));

        let record = IconRecord::unmanaged(IconPayload::ImageBuffer(Arc::new(pixel(3))));
        assert_eq!(registry.set(handle, record), Ok(()));
        assert_eq!(registry.get(handle).unwrap().kind, PayloadKind::ImageBuffer);
    }

    #[test]
    fn scenario_unmanaged_image_buffer_lifecycle() {
        let registry = IconRegistry::new(1);
        let handle = registry.create_unmanaged(IconPayload::ImageBuffer(Arc::new(pixel(7))));

        let info = registry.get(handle).unwrap();
        assert_eq!(info.kind, PayloadKind::ImageBuffer);
        assert!(!info.managed);
        assert_eq!(registry.image_buffer(handle).unwrap().pixels(), &[7]);

        assert!(registry.delete_unmanaged(handle));
        assert_eq!(registry.get(handle), Err(IconError::NotFound(handle)));
        assert!(registry.image_buffer(handle).is_none());

        // Double delete reports unknown.
        assert!(!registry.delete_unmanaged(handle));
    }

    #[test]
    fn clear_resets_allocator_and_owners() {
        let registry = IconRegistry::new(1);
        let block = Arc::new(DataBlock::new("Scene"));
        let handle = registry.ensure_for_owner(&block);
        registry.create_unmanaged(IconPayload::ImageBuffer(Arc::new(pixel(0))));

        registry.clear();
        assert!(registry.is_empty());
        assert!(block.icon_slot().get().is_none());
        assert_eq!(registry.get(handle), Err(IconError::NotFound(handle)));

        // Allocation restarts from the boundary.
        assert_eq!(registry.allocate_handle(), IconHandle::from_raw(1));
    }

    #[test]
    fn clear_drains_pending_deferred_deletes() {
        let registry = Arc::new(IconRegistry::new(1));
        let block = Arc::new(DataBlock::new("Brush"));
        registry.ensure_for_owner(&block);

        {
            let registry = Arc::clone(&registry);
            let block = Arc::clone(&block);
            std::thread::spawn(move || registry.delete_for_owner(block.as_ref()))
                .join()
                .unwrap();
        }

        registry.clear();
        assert!(registry.is_empty());
        registry.drain_deferred_deletes();
        assert!(registry.is_empty());
    }

    #[test]
    fn ensure_after_deferred_delete_allocates_fresh_handle() {
        let registry = Arc::new(IconRegistry::new(1));
        let block = Arc::new(DataBlock::new("Texture"));
        let first = registry.ensure_for_owner(&block);

        {
            let registry = Arc::clone(&registry);
            let block = Arc::clone(&block);
            std::thread::spawn(move || registry.delete_for_owner(block.as_ref()))
                .join()
                .unwrap();
        }

        // The zeroed slot means ensure cannot observe the stale handle even
        // though its record has not been torn down yet.
        let second = registry.ensure_for_owner(&block);
        assert!(second.is_some());
        assert_ne!(first, second);

        registry.drain_deferred_deletes();
        assert_eq!(registry.get(first), Err(IconError::NotFound(first)));
        assert!(registry.get(second).is_ok());
        assert_eq!(block.icon_slot().get(), second);
    }

    #[test]
    fn dropped_owner_teardown_is_harmless() {
        let registry = IconRegistry::new(1);
        let handle = {
            let block = Arc::new(DataBlock::new("Orphan"));
            registry.ensure_for_owner(&block)
        };
        // The weak back-reference is dead; teardown must not mind.
        assert!(registry.delete(handle));
    }

    #[test]
    fn exhaustion_returns_none_for_ensure() {
        let registry = IconRegistry::new(u32::MAX);
        // The single dynamic handle is taken by a bare allocation.
        assert_eq!(registry.allocate_handle(), IconHandle::from_raw(u32::MAX));

        let block = Arc::new(DataBlock::new("OneTooMany"));
        assert_eq!(registry.ensure_for_owner(&block), IconHandle::NONE);
        assert!(block.icon_slot().get().is_none());

        // Freeing the handle makes ensure succeed through the scan path.
        assert!(registry.delete(IconHandle::from_raw(u32::MAX)));
        assert_eq!(
            registry.ensure_for_owner(&block),
            IconHandle::from_raw(u32::MAX)
        );
    }
}
