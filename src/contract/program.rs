//! Contract program container
//!
//! A deployed program is a method table followed by bytecode:
//!
//! ```text
//! "CVM1" | u16 method count | (u8 name len | name | u32 offset)* | bytecode
//! ```
//!
//! Offsets and jump targets are relative to the start of the bytecode.

use std::collections::BTreeMap;

use thiserror::Error;

/// Magic prefix of every program
pub const PROGRAM_MAGIC: &[u8; 4] = b"CVM1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("Bad program magic")]
    BadMagic,
    #[error("Truncated program")]
    Truncated,
    #[error("Method name is not valid UTF-8")]
    InvalidMethodName,
    #[error("Method {0} points outside the bytecode")]
    InvalidEntry(String),
}

/// Method table plus bytecode
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub methods: BTreeMap<String, u32>,
    pub code: Vec<u8>,
}

impl Program {
    pub fn new(methods: BTreeMap<String, u32>, code: Vec<u8>) -> Self {
        Self { methods, code }
    }

    /// Entry offset of a method
    pub fn entry(&self, method: &str) -> Option<u32> {
        self.methods.get(method).copied()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.code.len());
        out.extend_from_slice(PROGRAM_MAGIC);
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for (name, offset) in &self.methods {
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out.extend_from_slice(&self.code);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProgramError> {
        let mut reader = Reader { bytes, pos: 0 };
        if reader.take(4)? != PROGRAM_MAGIC {
            return Err(ProgramError::BadMagic);
        }
        let count = u16::from_be_bytes([reader.byte()?, reader.byte()?]);

        let mut methods = BTreeMap::new();
        for _ in 0..count {
            let len = reader.byte()? as usize;
            let name = std::str::from_utf8(reader.take(len)?)
                .map_err(|_| ProgramError::InvalidMethodName)?
                .to_string();
            let raw = reader.take(4)?;
            let offset = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            methods.insert(name, offset);
        }

        let code = bytes[reader.pos..].to_vec();
        for (name, offset) in &methods {
            if *offset as usize > code.len() {
                return Err(ProgramError::InvalidEntry(name.clone()));
            }
        }
        Ok(Self { methods, code })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProgramError> {
        let end = self.pos.checked_add(n).ok_or(ProgramError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(ProgramError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, ProgramError> {
        Ok(self.take(1)?[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let mut methods = BTreeMap::new();
        methods.insert("get".to_string(), 0);
        methods.insert("set".to_string(), 2);
        let program = Program::new(methods, vec![0x42, 0x42, 0x42]);

        let bytes = program.encode();
        assert!(bytes.starts_with(PROGRAM_MAGIC));
        let decoded = Program::decode(&bytes).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.entry("set"), Some(2));
        assert_eq!(decoded.entry("missing"), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(Program::decode(b"nope"), Err(ProgramError::BadMagic));
        assert_eq!(Program::decode(b"CVM1\x00"), Err(ProgramError::Truncated));

        let mut methods = BTreeMap::new();
        methods.insert("far".to_string(), 10);
        let bytes = Program::new(methods, vec![0x42]).encode();
        assert!(matches!(
            Program::decode(&bytes),
            Err(ProgramError::InvalidEntry(_))
        ));
    }
}
