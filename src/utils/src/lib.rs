pub mod hash;
pub mod rhh;
pub mod varint;
