//! Minimal little-endian byte readers for parsing binary mesh formats.
//! Reads past the end of the buffer yield zeroed bytes; parsers that
//! care about truncation check `remaining()` up front so a short file
//! becomes a typed error instead of a panic.

#[rustfmt::skip]
pub trait Deserializer {
    fn pos(&self) -> usize;
    fn remaining(&self) -> usize;
    fn advance_by(&mut self, amount: usize);
    fn jump_to(&mut self, pos: usize);
    fn read_bytes(&mut self, length: usize) -> &[u8];
    fn is_eof(&self) -> bool { self.remaining() == 0 }

    fn read_array<const LENGTH: usize>(&mut self) -> [u8; LENGTH] {
        let mut out = [0; LENGTH];
        let bytes = self.read_bytes(LENGTH);
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    fn read_u16_le(&mut self) -> u16 { u16::from_le_bytes(self.read_array()) }
    fn read_u32_le(&mut self) -> u32 { u32::from_le_bytes(self.read_array()) }
    fn read_f32_le(&mut self) -> f32 { f32::from_le_bytes(self.read_array()) }
}

pub struct SliceDeserializer<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> SliceDeserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buffer: data,
            offset: 0,
        }
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.buffer
    }
}

impl Deserializer for SliceDeserializer<'_> {
    fn pos(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    fn advance_by(&mut self, amount: usize) {
        self.offset = (self.offset + amount).min(self.buffer.len());
    }

    fn jump_to(&mut self, pos: usize) {
        self.offset = pos.min(self.buffer.len());
    }

    fn read_bytes(&mut self, length: usize) -> &[u8] {
        let end = (self.offset + length).min(self.buffer.len());
        let value = &self.buffer[self.offset..end];
        self.offset = end;
        value
    }
}
