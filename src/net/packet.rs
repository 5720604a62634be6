use crate::net::error::DecodeError;

#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        let value = self.peek_u16_le()?;
        self.pos += 2;
        Ok(value)
    }

    /// Reads the next u16 without moving the cursor.
    pub fn peek_u16_le(&self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        let lo = self.data[self.pos] as u16;
        let hi = self.data[self.pos + 1] as u16;
        Ok(lo | (hi << 8))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        let b0 = self.data[self.pos] as u32;
        let b1 = self.data[self.pos + 1] as u32;
        let b2 = self.data[self.pos + 2] as u32;
        let b3 = self.data[self.pos + 3] as u32;
        self.pos += 4;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    /// u16 length followed by single-byte (Latin-1) characters.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16_le()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().map(|&byte| byte as char).collect())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(DecodeError::Underflow {
                offset: self.pos,
                needed,
                remaining,
            });
        }
        Ok(())
    }
}

/// Builds server messages for decoder tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct PacketWriter {
    data: Vec<u8>,
}

#[cfg(test)]
impl PacketWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.data.push((value & 0xff) as u8);
        self.data.push((value >> 8) as u8);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.data.push((value & 0xff) as u8);
        self.data.push(((value >> 8) & 0xff) as u8);
        self.data.push(((value >> 16) & 0xff) as u8);
        self.data.push(((value >> 24) & 0xff) as u8);
    }

    pub fn write_string_str(&mut self, value: &str) {
        let bytes: Vec<u8> = value.chars().map(|c| c as u32 as u8).collect();
        self.write_u16_le(bytes.len() as u16);
        self.data.extend_from_slice(&bytes);
    }
}
