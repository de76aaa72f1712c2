use std::collections::BTreeMap;
use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};
use influxdb_utils::rhh::{HashMap, Options};

use crate::index::tsi1::measurement_block::MeasurementBlockTrailer;
use crate::index::tsi1::measurement_elem::write_measurement_elem;
use crate::index::tsi1::{MEASUREMENT_LOAD_FACTOR, MEASUREMENT_TOMBSTONE_FLAG};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Measurement {
    deleted: bool,
    offset: u64,
    series_ids: Vec<u32>,
}

impl Measurement {
    fn flag(&self) -> u8 {
        let mut flag = 0;
        if self.deleted {
            flag |= MEASUREMENT_TOMBSTONE_FLAG;
        }
        flag
    }
}

/// MeasurementBlockWriter writes a measurement block.
pub struct MeasurementBlockWriter {
    /// Ordered by name so the hash index layout only depends on the set of
    /// measurements, not on the order they were added.
    mms: BTreeMap<Vec<u8>, Measurement>,

    load_factor: u64,
}

impl Default for MeasurementBlockWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementBlockWriter {
    pub fn new() -> Self {
        Self::with_load_factor(MEASUREMENT_LOAD_FACTOR)
    }

    /// with_load_factor returns a writer whose hash index is sized for the
    /// given load factor in percent, clamped to 1..=100.
    pub fn with_load_factor(load_factor: u64) -> Self {
        Self {
            mms: BTreeMap::new(),
            load_factor,
        }
    }

    /// len returns the number of distinct measurements, tombstones included.
    pub fn len(&self) -> usize {
        self.mms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mms.is_empty()
    }

    /// add adds a measurement with series and offset. A previous measurement
    /// with the same name is replaced.
    pub fn add(&mut self, name: &[u8], offset: u64, series_ids: Vec<u32>) {
        self.mms.insert(
            name.to_vec(),
            Measurement {
                deleted: false,
                offset,
                series_ids,
            },
        );
    }

    /// delete marks a measurement as tombstoned.
    pub fn delete(&mut self, name: &[u8]) {
        self.mms.insert(
            name.to_vec(),
            Measurement {
                deleted: true,
                ..Default::default()
            },
        );
    }

    /// write_to encodes the measurements to w and returns the number of
    /// bytes written.
    pub fn write_to<W: Write>(&self, w: W) -> io::Result<u64> {
        let mut w = CountingWriter::new(w);

        // Write padding byte so no offsets are zero.
        w.write_u8(0)?;

        // Build key hash map
        let mut m = HashMap::new(Options::new(self.mms.len() as u64, self.load_factor));
        for (name, mm) in self.mms.iter() {
            m.put(name, mm);
        }
        let capacity = u32::try_from(m.cap()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("too many measurements: {}", self.mms.len()),
            )
        })?;

        // Encode key list.
        let mut offsets = vec![0_u64; m.cap()];
        for (i, offset) in offsets.iter_mut().enumerate() {
            if let Some((name, mm)) = m.elem(i) {
                // Save current offset so we can use it in the hash index.
                *offset = w.n;

                write_measurement_elem(&mut w, mm.flag(), mm.offset, name, &mm.series_ids)?;
            }
        }

        // Save starting offset of hash index.
        let hoff = w.n;

        // Encode hash map length & offset entries.
        w.write_u32::<BigEndian>(capacity)?;
        for offset in offsets {
            w.write_u64::<BigEndian>(offset)?;
        }

        // Write trailer.
        let size = w.n;
        MeasurementBlockTrailer::new(hoff, size).write_to(&mut w)?;
        w.flush()?;

        debug!(
            measurements = self.mms.len(),
            capacity,
            size = w.n,
            "measurement block written"
        );

        Ok(w.n)
    }

    /// serialize encodes the measurements into a new buffer.
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// CountingWriter tracks the number of bytes written through it.
struct CountingWriter<W> {
    w: W,
    n: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(w: W) -> Self {
        Self { w, n: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.w.write(buf)?;
        self.n += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}
