//! TSI1 index file components.
//!
//! A measurement block maps measurement names to their series ids and to
//! the offset of their tag set block. Its layout, with all integers
//! big-endian:
//!
//! ┌──────┬─────────────────────┬──────────────────────────┬───────────────┐
//! │ Fill │      Elements       │        Hash Index        │    Trailer    │
//! │1 byte│       N bytes       │ 4 + 8 * capacity bytes   │   18 bytes    │
//! └──────┴─────────────────────┴──────────────────────────┴───────────────┘
//!
//! Each element carries a flag, its tag set offset, its name and its
//! series ids. Elements are written in hash slot order.
//!
//! ┌──────┬─────────┬──────────┬─────────┬──────────┬─────────────────────┐
//! │ Flag │ TagSet  │ Name Len │  Name   │ Series N │      Series IDs     │
//! │1 byte│ 8 bytes │  varint  │ N bytes │  varint  │    4 bytes * N      │
//! └──────┴─────────┴──────────┴─────────┴──────────┴─────────────────────┘
//!
//! The hash index starts with the slot count followed by one element
//! offset per slot. Zero marks an empty slot, which is why the block starts
//! with a fill byte.
//!
//! ┌──────────┬──────────┬──────────┬─────┐
//! │ Capacity │ Offset 0 │ Offset 1 │ ... │
//! │ 4 bytes  │ 8 bytes  │ 8 bytes  │     │
//! └──────────┴──────────┴──────────┴─────┘
//!
//! The trailer describes the block itself.
//!
//! ┌────────────┬────────────┬─────────┐
//! │ Hash Index │ Block Size │ Version │
//! │  8 bytes   │  8 bytes   │ 2 bytes │
//! └────────────┴────────────┴─────────┘

mod error;
pub mod measurement_block;
pub mod measurement_block_writer;
pub mod measurement_elem;

pub use error::{MeasurementBlockError, Result};
pub use measurement_block::{MeasurementBlock, MeasurementBlockTrailer, MeasurementIterator};
pub use measurement_block_writer::MeasurementBlockWriter;
pub use measurement_elem::MeasurementElem;

/// MEASUREMENT_BLOCK_VERSION is the version of the measurement block.
pub const MEASUREMENT_BLOCK_VERSION: u16 = 1;

/// Measurement flag constants.
pub const MEASUREMENT_TOMBSTONE_FLAG: u8 = 0x01;

/// 1 byte offset for the block to ensure non-zero offsets.
pub const MEASUREMENT_FILL_SIZE: usize = 1;

// Measurement trailer fields
pub const MEASUREMENT_BLOCK_VERSION_SIZE: usize = 2;
pub const MEASUREMENT_BLOCK_SIZE: usize = 8;
pub const MEASUREMENT_HASH_OFFSET_SIZE: usize = 8;
pub const MEASUREMENT_TRAILER_SIZE: usize =
    MEASUREMENT_BLOCK_VERSION_SIZE + MEASUREMENT_BLOCK_SIZE + MEASUREMENT_HASH_OFFSET_SIZE;

// Measurement key block fields.
pub const MEASUREMENT_N_SIZE: usize = 4;
pub const MEASUREMENT_OFFSET_SIZE: usize = 8;

/// Size of a single series id in an element.
pub const SERIES_ID_SIZE: usize = 4;

/// Load factor of the hash index, in percent.
pub const MEASUREMENT_LOAD_FACTOR: u64 = 90;
