//! Memory Source Abstraction
//!
//! The single I/O primitive every decoder reads through:
//! - [`MemoryView`] implemented by image layers (dump files, live processes)
//! - [`BufferView`] for in-memory images and tests

mod buffer;
mod region;
mod traits;

pub use buffer::BufferView;
pub use region::MemoryRegion;
pub use traits::{Endian, Fault, MemoryView};
