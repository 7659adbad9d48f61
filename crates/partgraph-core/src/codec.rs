//! Binary Codec
//!
//! Fixed-width little-endian scalars, `u32`-length-prefixed byte strings and
//! `u32`-count-prefixed homogeneous lists. Every file written by this crate
//! (schema, partitions, indices) is built from these primitives.
//!
//! Decoding consumes a prefix of the input and returns the value together with
//! the remaining bytes; a short input fails with [`Error::MalformedInput`].

use crate::error::{Error, Result};

/// Types with a fixed binary encoding.
pub trait Encode {
    /// Append the encoded form of `self` to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);
}

/// Types that can be decoded from the front of a byte slice.
pub trait Decode: Sized {
    /// Decode one value, returning it with the unconsumed remainder.
    fn decode(input: &[u8]) -> Result<(Self, &[u8])>;
}

/// Split `N` bytes off the front of `input`.
fn take<'a, const N: usize>(input: &'a [u8], what: &str) -> Result<([u8; N], &'a [u8])> {
    if input.len() < N {
        return Err(Error::malformed(format!(
            "truncated {what}: need {N} bytes, {} remaining",
            input.len()
        )));
    }
    let (head, rest) = input.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl Encode for $t {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
                    let (bytes, rest) =
                        take::<{ std::mem::size_of::<$t>() }>(input, stringify!($t))?;
                    Ok((<$t>::from_le_bytes(bytes), rest))
                }
            }
        )*
    };
}

impl_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }
}

impl Decode for bool {
    fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let (byte, rest) = u8::decode(input)?;
        match byte {
            0 => Ok((false, rest)),
            1 => Ok((true, rest)),
            other => Err(Error::malformed(format!("invalid bool byte {other}"))),
        }
    }
}

/// Write a `u32` length followed by the raw bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_bytes(bytes: &[u8], buf: &mut Vec<u8>) {
    debug_assert!(
        u32::try_from(bytes.len()).is_ok(),
        "byte string of {} bytes does not fit a u32 length",
        bytes.len()
    );
    (bytes.len() as u32).encode(buf);
    buf.extend_from_slice(bytes);
}

/// Read a `u32`-length-prefixed byte string.
pub fn decode_bytes(input: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = u32::decode(input)?;
    let len = len as usize;
    if rest.len() < len {
        return Err(Error::malformed(format!(
            "truncated byte string: declared {len} bytes, {} remaining",
            rest.len()
        )));
    }
    Ok(rest.split_at(len))
}

impl Encode for str {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl Encode for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_str().encode(buf);
    }
}

impl Decode for String {
    fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let (bytes, rest) = decode_bytes(input)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| Error::malformed(format!("string is not valid UTF-8: {e}")))?;
        Ok((s.to_string(), rest))
    }
}

/// Write a `u32` element count followed by each element.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_list<T: Encode>(items: &[T], buf: &mut Vec<u8>) {
    debug_assert!(u32::try_from(items.len()).is_ok());
    (items.len() as u32).encode(buf);
    for item in items {
        item.encode(buf);
    }
}

/// Read a `u32`-count-prefixed list.
pub fn decode_list<T: Decode>(input: &[u8]) -> Result<(Vec<T>, &[u8])> {
    let (count, mut rest) = u32::decode(input)?;
    // The count is untrusted; never reserve more slots than there are bytes.
    let mut items = Vec::with_capacity((count as usize).min(rest.len()));
    for _ in 0..count {
        let (item, next) = T::decode(rest)?;
        items.push(item);
        rest = next;
    }
    Ok((items, rest))
}

/// Sequential reader over an encoded buffer.
///
/// Thin convenience over [`Decode`] for record layouts made of many fields.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    rest: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    /// Read one value.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        let (value, rest) = T::decode(self.rest)?;
        self.rest = rest;
        Ok(value)
    }

    /// Read a length-prefixed list.
    pub fn read_list<T: Decode>(&mut self) -> Result<Vec<T>> {
        let (items, rest) = decode_list(self.rest)?;
        self.rest = rest;
        Ok(items)
    }

    /// Read a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let (bytes, rest) = decode_bytes(self.rest)?;
        self.rest = rest;
        Ok(bytes)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.rest
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}
