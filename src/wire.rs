//! Little-endian, field by field, no implicit padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;

pub trait ByteSerialize: Sized {
    /// Exact frame length on the wire.
    const SIZE: usize;

    /// Appends exactly `SIZE` bytes.
    fn write_to(&self, buf: &mut BytesMut);

    /// Reads one record. Callers guarantee `SIZE` bytes are available.
    fn read_from(buf: &mut Bytes) -> Self;

    fn as_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.write_to(&mut buf);
        debug_assert_eq!(buf.len(), Self::SIZE);
        buf.freeze()
    }

    /// Decodes a frame, rejecting any buffer whose length is not `SIZE`.
    fn from_bytes(buffer: &[u8]) -> Result<Self, DecodeError> {
        if buffer.len() != Self::SIZE {
            return Err(DecodeError::SizeMismatch {
                expected: Self::SIZE,
                actual: buffer.len(),
            });
        }

        let mut buf = Bytes::copy_from_slice(buffer);
        Ok(Self::read_from(&mut buf))
    }
}

pub(crate) fn put_f32s(buf: &mut BytesMut, values: &[f32]) {
    for value in values {
        buf.put_f32_le(*value);
    }
}

pub(crate) fn get_f32s<const N: usize>(buf: &mut Bytes) -> [f32; N] {
    let mut out = [0f32; N];
    for value in out.iter_mut() {
        *value = buf.get_f32_le();
    }
    out
}
