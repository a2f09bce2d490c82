//! Primitive field encoding shared by every packet.
//!
//! | Field | Encoding |
//! |-------|----------|
//! | integers | big-endian |
//! | `str`, `bytes` | `u32` length, then data |
//! | `list<T>` | `u32` count, then items |
//! | `bool` | `u8`, 0 or 1 |

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{PacketType, WireError};

pub(crate) struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new(packet_type: PacketType) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(packet_type as u8);
        Self { buf }
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> Result<&mut Self, WireError> {
        self.u32(length(value.len())?);
        self.buf.put_slice(value);
        Ok(self)
    }

    pub fn str(&mut self, value: &str) -> Result<&mut Self, WireError> {
        self.bytes(value.as_bytes())
    }

    pub fn str_list<S: AsRef<str>>(&mut self, values: &[S]) -> Result<&mut Self, WireError> {
        self.u32(length(values.len())?);
        for value in values {
            self.str(value.as_ref())?;
        }
        Ok(self)
    }

    pub fn bytes_list<B: AsRef<[u8]>>(&mut self, values: &[B]) -> Result<&mut Self, WireError> {
        self.u32(length(values.len())?);
        for value in values {
            self.bytes(value.as_ref())?;
        }
        Ok(self)
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

fn length(len: usize) -> Result<u32, WireError> {
    u32::try_from(len).map_err(|_| WireError::FieldTooLarge(len))
}

/// Cursor over a packet payload. Every read checks the remaining length
/// first, so truncated input becomes [`WireError::Malformed`].
pub(crate) struct PacketReader<'a> {
    packet_type: PacketType,
    buf: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(packet_type: PacketType, payload: &'a [u8]) -> Self {
        Self {
            packet_type,
            buf: payload,
        }
    }

    pub fn malformed(&self, reason: &'static str) -> WireError {
        WireError::Malformed {
            packet_type: self.packet_type,
            reason,
        }
    }

    fn need(&self, len: usize, reason: &'static str) -> Result<(), WireError> {
        if self.buf.remaining() < len {
            return Err(self.malformed(reason));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        self.need(1, "truncated u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        self.need(2, "truncated u16")?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        self.need(4, "truncated u32")?;
        Ok(self.buf.get_u32())
    }

    pub fn i32(&mut self) -> Result<i32, WireError> {
        self.need(4, "truncated i32")?;
        Ok(self.buf.get_i32())
    }

    pub fn bool(&mut self) -> Result<bool, WireError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.malformed("bool out of range")),
        }
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.u32()? as usize;
        self.need(len, "truncated byte string")?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head.to_vec())
    }

    pub fn str(&mut self) -> Result<String, WireError> {
        let raw = self.bytes()?;
        String::from_utf8(raw).map_err(|_| self.malformed("string is not UTF-8"))
    }

    // List counts come from the peer; items are pushed one at a time
    // rather than preallocating `count` slots.

    pub fn str_list(&mut self) -> Result<Vec<String>, WireError> {
        let count = self.u32()?;
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(self.str()?);
        }
        Ok(items)
    }

    pub fn bytes_list(&mut self) -> Result<Vec<Vec<u8>>, WireError> {
        let count = self.u32()?;
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(self.bytes()?);
        }
        Ok(items)
    }
}
