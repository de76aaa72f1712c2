//! Unsigned variable-length integers in LEB128 form: seven bits per byte,
//! least significant group first, high bit set on every byte but the last.

/// MAX_VARINT_LEN64 is the maximum length of a varint-encoded 64-bit integer.
pub const MAX_VARINT_LEN64: usize = 10;

const MSB: u8 = 0x80;
const DROP_MSB: u8 = 0x7f;

pub trait VarInt: Sized + Copy {
    /// required_space returns the number of bytes the encoded value needs.
    fn required_space(self) -> usize;
    /// decode_var returns the value and the number of bytes read, or None if
    /// src is truncated or the value overflows.
    fn decode_var(src: &[u8]) -> Option<(Self, usize)>;
    /// encode_var writes the value into dst and returns the bytes written.
    /// dst must hold at least `required_space()` bytes.
    fn encode_var(self, dst: &mut [u8]) -> usize;
}

impl VarInt for u64 {
    fn required_space(self) -> usize {
        let mut v = self;
        let mut n = 1;
        while v >= MSB as u64 {
            v >>= 7;
            n += 1;
        }
        n
    }

    fn decode_var(src: &[u8]) -> Option<(Self, usize)> {
        let mut x = 0_u64;
        let mut s = 0_u32;

        for (i, b) in src.iter().enumerate() {
            if i == MAX_VARINT_LEN64 {
                return None;
            }

            if *b < MSB {
                // The 10th byte may only carry the last bit of a u64.
                if i == MAX_VARINT_LEN64 - 1 && *b > 1 {
                    return None;
                }
                return Some((x | ((*b as u64) << s), i + 1));
            }

            x |= ((*b & DROP_MSB) as u64) << s;
            s += 7;
        }

        None
    }

    fn encode_var(self, dst: &mut [u8]) -> usize {
        let mut v = self;
        let mut i = 0;
        while v >= MSB as u64 {
            dst[i] = (v as u8) | MSB;
            v >>= 7;
            i += 1;
        }
        dst[i] = v as u8;
        i + 1
    }
}

impl VarInt for u32 {
    fn required_space(self) -> usize {
        (self as u64).required_space()
    }

    fn decode_var(src: &[u8]) -> Option<(Self, usize)> {
        let (v, n) = u64::decode_var(src)?;
        u32::try_from(v).ok().map(|v| (v, n))
    }

    fn encode_var(self, dst: &mut [u8]) -> usize {
        (self as u64).encode_var(dst)
    }
}

impl VarInt for usize {
    fn required_space(self) -> usize {
        (self as u64).required_space()
    }

    fn decode_var(src: &[u8]) -> Option<(Self, usize)> {
        let (v, n) = u64::decode_var(src)?;
        usize::try_from(v).ok().map(|v| (v, n))
    }

    fn encode_var(self, dst: &mut [u8]) -> usize {
        (self as u64).encode_var(dst)
    }
}
