//! Icon and preview handle registry for Caldera data-blocks.
//!
//! Every visual resource a data-block can show in the UI (its preview, a
//! file thumbnail, a vector icon, a layer color swatch) is identified by a
//! small integer [`IconHandle`]. This crate provides the [`IconRegistry`]
//! that allocates those handles, maps them to their resource records, and
//! tears them down, including deferred teardown requested from worker
//! threads.
//!
//! # Threading discipline
//!
//! Bookkeeping is thread-safe; structural mutation is single-writer. The
//! thread that constructs the registry is its main thread: creation, record
//! installation, and teardown happen there (debug-asserted), while lookups
//! and deletion *requests* are allowed from anywhere. Handles are never
//! persisted; owners reacquire them after deserialization.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use caldera_icons::{DataBlock, IconOwner, IconRegistry};
//!
//! let registry = IconRegistry::new(1);
//! let material = Arc::new(DataBlock::new("Material"));
//!
//! // Idempotent: the second call returns the same handle.
//! let icon = registry.ensure_for_owner(&material);
//! assert_eq!(registry.ensure_for_owner(&material), icon);
//!
//! // Invalidate the preview after an edit; the preview job rerenders later.
//! registry.mark_changed(icon);
//!
//! // Deleting through the owner zeroes its stored handle.
//! registry.delete_for_owner(material.as_ref());
//! assert!(material.icon_slot().get().is_none());
//! ```

pub mod error;
pub mod handle;
pub mod owner;
pub mod preview;
pub mod record;
pub mod registry;

pub use error::{IconError, IconResult};
pub use handle::IconHandle;
pub use owner::{DataBlock, GreasePencilLayer, IconOwner, IconSlot, StudioLight};
pub use preview::{PreviewImage, PreviewSize};
pub use record::{IconGeometry, IconInfo, IconPayload, IconRecord, ImageBuffer, PayloadKind};
pub use registry::IconRegistry;
