use std::fmt::{Debug, Formatter};
use std::io::Write;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use influxdb_utils::varint::{VarInt, MAX_VARINT_LEN64};

use crate::index::tsi1::error::{MeasurementBlockError, Result};
use crate::index::tsi1::{MEASUREMENT_OFFSET_SIZE, MEASUREMENT_TOMBSTONE_FLAG, SERIES_ID_SIZE};

/// MeasurementElem represents an internal measurement element.
///
/// The name and series data borrow from the block the element was decoded
/// from.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MeasurementElem<'a> {
    flag: u8,
    /// tag set offset
    offset: u64,
    name: &'a [u8],

    /// series count
    series_n: u32,
    /// serialized series data
    series_data: &'a [u8],
}

impl<'a> MeasurementElem<'a> {
    /// decode unmarshals an element from the beginning of data and returns
    /// it with the number of bytes consumed.
    pub fn decode(data: &'a [u8]) -> Result<(Self, usize)> {
        let mut n = 0;

        // Parse flag data.
        let flag = *data
            .first()
            .ok_or_else(|| corrupt("missing measurement flag"))?;
        n += 1;

        // Parse tagset offset.
        let offset = data
            .get(n..n + MEASUREMENT_OFFSET_SIZE)
            .map(BigEndian::read_u64)
            .ok_or_else(|| corrupt("missing tag set offset"))?;
        n += MEASUREMENT_OFFSET_SIZE;

        // Parse name.
        let (sz, v_len) =
            usize::decode_var(&data[n..]).ok_or_else(|| corrupt("invalid name length"))?;
        n += v_len;
        let name = data
            .get(n..)
            .and_then(|b| b.get(..sz))
            .ok_or_else(|| corrupt("measurement name out of bounds"))?;
        n += sz;

        // Parse series data.
        let (series_n, v_len) =
            u32::decode_var(&data[n..]).ok_or_else(|| corrupt("invalid series count"))?;
        n += v_len;
        let series_sz = series_n as usize * SERIES_ID_SIZE;
        let series_data = data
            .get(n..)
            .and_then(|b| b.get(..series_sz))
            .ok_or_else(|| corrupt("series data out of bounds"))?;
        n += series_sz;

        Ok((
            Self {
                flag,
                offset,
                name,
                series_n,
                series_data,
            },
            n,
        ))
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    /// offset returns the tag set block offset of the measurement.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    pub fn is_deleted(&self) -> bool {
        self.flag & MEASUREMENT_TOMBSTONE_FLAG != 0
    }

    pub fn series_n(&self) -> u32 {
        self.series_n
    }

    pub fn series_data(&self) -> &'a [u8] {
        self.series_data
    }

    /// series_id returns series ID at an index.
    pub fn series_id(&self, i: usize) -> Option<u32> {
        let start = i.checked_mul(SERIES_ID_SIZE)?;
        self.series_data
            .get(start..start + SERIES_ID_SIZE)
            .map(BigEndian::read_u32)
    }

    pub fn series_id_iter(&self) -> impl Iterator<Item = u32> + 'a {
        self.series_data
            .chunks_exact(SERIES_ID_SIZE)
            .map(BigEndian::read_u32)
    }

    /// series_ids returns a list of decoded series ids.
    pub fn series_ids(&self) -> Vec<u32> {
        self.series_id_iter().collect()
    }
}

impl<'a> Debug for MeasurementElem<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementElem")
            .field("name", &String::from_utf8_lossy(self.name))
            .field("flag", &self.flag)
            .field("offset", &self.offset)
            .field("series_ids", &self.series_ids())
            .finish()
    }
}

fn corrupt(msg: &str) -> MeasurementBlockError {
    MeasurementBlockError::Corrupt(msg.to_string())
}

/// write_measurement_elem encodes a single measurement element into w and
/// returns the number of bytes written.
pub fn write_measurement_elem<W: Write>(
    w: &mut W,
    flag: u8,
    offset: u64,
    name: &[u8],
    series_ids: &[u32],
) -> std::io::Result<u64> {
    let mut n = 0;
    let mut buf = [0; MAX_VARINT_LEN64];

    // Write flag & tagset block offset.
    w.write_u8(flag)?;
    w.write_u64::<BigEndian>(offset)?;
    n += 1 + MEASUREMENT_OFFSET_SIZE;

    // Write measurement name.
    let v_len = name.len().encode_var(&mut buf);
    w.write_all(&buf[..v_len])?;
    w.write_all(name)?;
    n += v_len + name.len();

    // Write series count & ids.
    let v_len = series_ids.len().encode_var(&mut buf);
    w.write_all(&buf[..v_len])?;
    n += v_len;
    for series_id in series_ids {
        w.write_u32::<BigEndian>(*series_id)?;
    }
    n += series_ids.len() * SERIES_ID_SIZE;

    Ok(n as u64)
}

/// encode_measurement_elem returns the encoded bytes of a single element.
pub fn encode_measurement_elem(
    flag: u8,
    offset: u64,
    name: &[u8],
    series_ids: &[u32],
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(
        1 + MEASUREMENT_OFFSET_SIZE
            + name.len().required_space()
            + name.len()
            + series_ids.len().required_space()
            + series_ids.len() * SERIES_ID_SIZE,
    );
    write_measurement_elem(&mut buf, flag, offset, name, series_ids)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use crate::index::tsi1::measurement_elem::{encode_measurement_elem, MeasurementElem};
    use crate::index::tsi1::{MeasurementBlockError, MEASUREMENT_TOMBSTONE_FLAG};

    #[test]
    fn test_encode_layout() {
        let b = encode_measurement_elem(0, 0x0102, b"cpu", &[1, 0x0a0b0c0d]).unwrap();
        assert_eq!(
            b,
            vec![
                0x00, // flag
                0, 0, 0, 0, 0, 0, 0x01, 0x02, // tag set offset
                0x03, b'c', b'p', b'u', // name
                0x02, // series count
                0, 0, 0, 1, 0x0a, 0x0b, 0x0c, 0x0d, // series ids
            ]
        );
    }

    #[test]
    fn test_decode() {
        let mut b =
            encode_measurement_elem(MEASUREMENT_TOMBSTONE_FLAG, 100, b"mem", &[4, 5, 4]).unwrap();
        let len = b.len();
        // trailing bytes belong to the next element
        b.extend_from_slice(&[0xff; 7]);

        let (e, n) = MeasurementElem::decode(&b).unwrap();
        assert_eq!(n, len);
        assert_eq!(e.flag(), MEASUREMENT_TOMBSTONE_FLAG);
        assert!(e.is_deleted());
        assert_eq!(e.offset(), 100);
        assert_eq!(e.name(), b"mem");
        assert_eq!(e.series_n(), 3);
        assert_eq!(e.series_data().len(), 12);
        assert_eq!(e.series_ids(), vec![4, 5, 4]);
        assert_eq!(e.series_id(1), Some(5));
        assert_eq!(e.series_id(3), None);
    }

    #[test]
    fn test_decode_empty_name_and_series() {
        let b = encode_measurement_elem(0, 0, b"", &[]).unwrap();
        let (e, n) = MeasurementElem::decode(&b).unwrap();
        assert_eq!(n, b.len());
        assert!(!e.is_deleted());
        assert!(e.name().is_empty());
        assert_eq!(e.series_n(), 0);
        assert!(e.series_ids().is_empty());
    }

    #[test]
    fn test_decode_truncated() {
        let b = encode_measurement_elem(0, 1, b"disk", &[1, 2]).unwrap();
        for i in 0..b.len() {
            let r = MeasurementElem::decode(&b[..i]);
            assert!(
                matches!(r, Err(MeasurementBlockError::Corrupt(_))),
                "truncated at {}: {:?}",
                i,
                r
            );
        }
    }
}
