use std::io::Write;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use bytes::Bytes;
use influxdb_utils::hash::{distance, hash_key};

use crate::index::tsi1::error::{MeasurementBlockError, Result};
use crate::index::tsi1::measurement_elem::MeasurementElem;
use crate::index::tsi1::{
    MEASUREMENT_BLOCK_SIZE, MEASUREMENT_BLOCK_VERSION, MEASUREMENT_BLOCK_VERSION_SIZE,
    MEASUREMENT_FILL_SIZE, MEASUREMENT_HASH_OFFSET_SIZE, MEASUREMENT_N_SIZE,
    MEASUREMENT_OFFSET_SIZE, MEASUREMENT_TRAILER_SIZE,
};

/// MeasurementBlockTrailer represents meta data at the end of a MeasurementBlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementBlockTrailer {
    /// Offset of the hash index section.
    pub hash_index_offset: u64,

    /// Size of the block, not including the trailer.
    pub size: u64,

    /// Encoding version
    pub version: u16,
}

impl MeasurementBlockTrailer {
    pub fn new(hash_index_offset: u64, size: u64) -> Self {
        Self {
            hash_index_offset,
            size,
            version: MEASUREMENT_BLOCK_VERSION,
        }
    }

    /// read_from parses the trailer from the tail of a whole block and
    /// validates it against the block length.
    pub fn read_from(data: &[u8]) -> Result<Self> {
        if data.len() < MEASUREMENT_TRAILER_SIZE {
            return Err(MeasurementBlockError::ShortBuffer(data.len()));
        }

        let version_offset = data.len() - MEASUREMENT_BLOCK_VERSION_SIZE;
        let size_offset = version_offset - MEASUREMENT_BLOCK_SIZE;
        let hoff_offset = size_offset - MEASUREMENT_HASH_OFFSET_SIZE;

        // Parse size & validate. Checked before the version so that a
        // truncated block reports a size mismatch.
        let size = BigEndian::read_u64(&data[size_offset..]);
        let expected = size.saturating_add(MEASUREMENT_TRAILER_SIZE as u64);
        if expected != data.len() as u64 {
            return Err(MeasurementBlockError::SizeMismatch {
                expected,
                actual: data.len() as u64,
            });
        }

        // Ensure version matches.
        let version = BigEndian::read_u16(&data[version_offset..]);
        if version != MEASUREMENT_BLOCK_VERSION {
            return Err(MeasurementBlockError::UnsupportedVersion(version));
        }

        // Parse hash index offset.
        let hash_index_offset = BigEndian::read_u64(&data[hoff_offset..]);

        Ok(Self {
            hash_index_offset,
            size,
            version,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        // Write hash index offset, total size, and version.
        w.write_u64::<BigEndian>(self.hash_index_offset)?;
        w.write_u64::<BigEndian>(self.size)?;
        w.write_u16::<BigEndian>(self.version)?;
        Ok(())
    }
}

/// MeasurementBlock represents a collection of all measurements in an index.
///
/// The block is immutable once loaded. Elements returned from it borrow the
/// underlying buffer, so lookups never copy names or series data.
#[derive(Debug, Clone)]
pub struct MeasurementBlock {
    data: Bytes,

    trailer: MeasurementBlockTrailer,
    /// Number of slots in the hash index.
    capacity: u64,
}

impl MeasurementBlock {
    /// load parses the trailer and hash index header of a serialized block.
    /// The buffer is retained, not copied.
    pub fn load(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        match Self::parse(&data) {
            Ok((trailer, capacity)) => {
                debug!(
                    size = data.len(),
                    capacity,
                    hash_index_offset = trailer.hash_index_offset,
                    "measurement block loaded"
                );
                Ok(Self {
                    data,
                    trailer,
                    capacity,
                })
            }
            Err(e) => {
                warn!(size = data.len(), "measurement block rejected: {}", e);
                Err(e)
            }
        }
    }

    fn parse(data: &[u8]) -> Result<(MeasurementBlockTrailer, u64)> {
        let trailer = MeasurementBlockTrailer::read_from(data)?;

        let hoff = trailer.hash_index_offset;
        if hoff < MEASUREMENT_FILL_SIZE as u64
            || hoff.saturating_add(MEASUREMENT_N_SIZE as u64) > trailer.size
        {
            return Err(MeasurementBlockError::Corrupt(format!(
                "hash index offset {} out of range",
                hoff
            )));
        }

        let hash_data = &data[hoff as usize..trailer.size as usize];
        let capacity = BigEndian::read_u32(hash_data) as u64;
        let expected = MEASUREMENT_N_SIZE as u64 + capacity * MEASUREMENT_OFFSET_SIZE as u64;
        if capacity == 0 || hash_data.len() as u64 != expected {
            return Err(MeasurementBlockError::Corrupt(format!(
                "hash index of {} slots does not fit {} bytes",
                capacity,
                hash_data.len()
            )));
        }

        Ok((trailer, capacity))
    }

    /// version returns the encoding version parsed from the data.
    pub fn version(&self) -> u16 {
        self.trailer.version
    }

    /// capacity returns the number of slots in the hash index.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn trailer(&self) -> &MeasurementBlockTrailer {
        &self.trailer
    }

    /// len returns the size of the whole block, including the trailer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// data returns the element section, fill byte included.
    fn data(&self) -> &[u8] {
        &self.data[..self.trailer.hash_index_offset as usize]
    }

    fn hash_data(&self) -> &[u8] {
        &self.data[self.trailer.hash_index_offset as usize..self.trailer.size as usize]
    }

    /// slot_offset returns the element offset stored in the slot, 0 if empty.
    fn slot_offset(&self, pos: u64) -> u64 {
        let i = MEASUREMENT_N_SIZE + pos as usize * MEASUREMENT_OFFSET_SIZE;
        BigEndian::read_u64(&self.hash_data()[i..])
    }

    fn elem_at(&self, offset: u64) -> Result<MeasurementElem<'_>> {
        let data = self.data();
        if offset >= data.len() as u64 {
            return Err(MeasurementBlockError::Corrupt(format!(
                "element offset {} beyond data section of {} bytes",
                offset,
                data.len()
            )));
        }

        let (e, _) = MeasurementElem::decode(&data[offset as usize..])?;
        Ok(e)
    }

    /// elem returns the element for a measurement name.
    pub fn elem(&self, name: &[u8]) -> Result<Option<MeasurementElem<'_>>> {
        let n = self.capacity;
        let hash = hash_key(name);
        let mut pos = hash % n;

        // Track current distance
        let mut d = 0_u64;

        while d < n {
            // Find offset of measurement, an empty slot ends the probe.
            let offset = self.slot_offset(pos);
            if offset == 0 {
                return Ok(None);
            }

            // Parse into element and return if name match.
            let e = self.elem_at(offset)?;
            if e.name() == name {
                return Ok(Some(e));
            }

            // Check if we've exceeded the probe distance.
            if d > distance(hash_key(e.name()), pos, n) {
                return Ok(None);
            }

            // Move position forward.
            pos = (pos + 1) % n;
            d += 1;
        }

        Ok(None)
    }

    /// iter returns an iterator over all elements in hash slot order.
    pub fn iter(&self) -> MeasurementIterator<'_> {
        MeasurementIterator { blk: self, pos: 0 }
    }
}

/// MeasurementIterator iterates over every element stored in a block,
/// tombstoned ones included.
pub struct MeasurementIterator<'a> {
    blk: &'a MeasurementBlock,
    pos: u64,
}

impl<'a> Iterator for MeasurementIterator<'a> {
    type Item = Result<MeasurementElem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.blk.capacity {
            let offset = self.blk.slot_offset(self.pos);
            self.pos += 1;

            if offset != 0 {
                return Some(self.blk.elem_at(offset));
            }
        }

        None
    }
}
