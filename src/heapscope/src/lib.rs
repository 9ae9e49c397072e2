//! # heapscope
//!
//! Object-model decoder for managed-runtime memory images.
//!
//! This library provides functionality to:
//! - Resolve a session profile (ABI flags, algorithm versions, runtime
//!   constants) from the runtime descriptor or a profile file
//! - Decode object headers, arrays (contiguous, discontiguous, arraylets)
//!   and strings across build variants
//! - Walk class metadata: superclass chains, field layouts, sizes
//! - Resolve flattened value-type fields
//! - Decode shared class cache records and metadata items
//! - Validate and scan debug memory tags
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use heapscope::{BufferView, Endian, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = std::fs::read("core.bin")?;
//! let view = Arc::new(BufferView::new(image, 0x7f00_0000_0000, Endian::Little));
//!
//! // Probe the runtime descriptor and open a session
//! let session = Session::probe(view, 0x7f00_0000_1000)?;
//!
//! let objects = session.objects();
//! let class = objects.class_of(0x7f00_0010_0000)?;
//! println!("{}", session.classes().class_name(class)?);
//! println!("{:?}", objects.field_values(0x7f00_0010_0000)?);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod class;
pub mod error;
pub mod flattened;
pub mod layout;
pub mod memtag;
pub mod object;
pub mod profile;
pub mod session;
pub mod shared;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
#[doc(inline)]
pub use address::{TypedAddress, Width};
#[doc(inline)]
pub use class::{ClassDescriptor, ClassSizeBreakdown, ClassWalker, FieldDescriptor, RomClass};
#[doc(inline)]
pub use error::{DecodeError, Result};
#[doc(inline)]
pub use flattened::{FlattenedField, FlattenedFields};
#[doc(inline)]
pub use memtag::{BlockState, MemoryTag, TagBlock, TagChecker, TagVerdict};
#[doc(inline)]
pub use object::{ArrayInfo, ArrayLayout, FieldValue, ObjectHeader, ObjectModel, PrimitiveType};
#[doc(inline)]
pub use profile::{AbiProfile, PointerWidth, SessionProfile, VersionRegistry};
#[doc(inline)]
pub use session::Session;
#[doc(inline)]
pub use shared::{RecordKind, SharedCache, SharedCacheOffset, WrapperRecord};
#[doc(inline)]
pub use source::{BufferView, Endian, Fault, MemoryRegion, MemoryView};
