//! SPIR-V instruction stream decoding.
use super::consts::{HEADER_LEN, SPIRV_MAGIC};
use super::{Error, Result};

/// Lazy, single-pass iterator over the instructions of a SPIR-V module.
pub struct Instrs<'a>(&'a [u32]);
impl<'a> Instrs<'a> {
    /// Validate the module header and position the stream at the first
    /// instruction. The version, generator and identifier-bound words carry
    /// no constraint the reflector cares about; the schema word must be 0.
    pub(crate) fn new(words: &'a [u32]) -> Result<Instrs<'a>> {
        if words.len() < HEADER_LEN { return Err(Error::MalformedBinary); }
        if words[0] != SPIRV_MAGIC { return Err(Error::MalformedBinary); }
        if words[4] != 0 { return Err(Error::MalformedBinary); }
        Ok(Instrs(&words[HEADER_LEN..]))
    }
}
impl<'a> Iterator for Instrs<'a> {
    type Item = Result<Instr<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        let head = *self.0.first()?;
        let len = (head >> 16) as usize;
        if len == 0 || len > self.0.len() {
            // The declared word count overruns the stream. Fuse the
            // iterator; the error is terminal.
            self.0 = &[];
            return Some(Err(Error::MalformedBinary));
        }
        let instr = Instr {
            opcode: head & 0xFFFF,
            operands: &self.0[1..len],
        };
        self.0 = &self.0[len..];
        Some(Ok(instr))
    }
}

#[derive(Debug, Clone)]
pub struct Instr<'a> {
    opcode: u32,
    operands: &'a [u32],
}
impl<'a> Instr<'a> {
    /// Get the opcode of the instruction.
    pub fn opcode(&self) -> u32 { self.opcode }
    /// Get the word count of the instruction, including the first word
    /// containing the word count and opcode.
    pub fn word_count(&self) -> usize { self.operands.len() + 1 }
    /// Get an instruction operand reader.
    pub fn operands(&self) -> Operands<'a> {
        Operands(self.operands)
    }
}

/// Cursor-style reader over the operand words of a single instruction.
pub struct Operands<'a>(&'a [u32]);
impl<'a> Operands<'a> {
    pub fn read_bool(&mut self) -> Result<bool> { self.read_u32().map(|x| x != 0) }
    pub fn read_u32(&mut self) -> Result<u32> {
        if let Some(x) = self.0.first() {
            self.0 = &self.0[1..];
            Ok(*x)
        } else { Err(Error::MalformedBinary) }
    }
    /// Read a nul-terminated UTF-8 string literal, consuming whole words.
    pub fn read_str(&mut self) -> Result<&'a str> {
        use std::ffi::CStr;
        use std::os::raw::c_char;
        let ptr = self.0.as_ptr() as *const c_char;
        let char_slice = unsafe { std::slice::from_raw_parts(ptr, self.0.len() * 4) };
        if let Some(nul_pos) = char_slice.iter().position(|x| *x == 0) {
            let nword = nul_pos / 4 + 1;
            self.0 = &self.0[nword..];
            if let Ok(string) = unsafe { CStr::from_ptr(ptr) }.to_str() {
                return Ok(string);
            }
        }
        Err(Error::MalformedBinary)
    }
    /// Consume all remaining operands as a list of identifiers.
    pub fn read_list(&mut self) -> Result<&'a [u32]> {
        let rv = self.0;
        self.0 = &[];
        Ok(rv)
    }
    /// Demand the operands be exhausted, for opcodes with a fixed shape.
    pub fn finish(self) -> Result<()> {
        if self.0.is_empty() { Ok(()) } else { Err(Error::MalformedBinary) }
    }
}
