//! SPIR-V Reflection
//!
//! Reflect and extract SPIR-V declared materials: types, resources,
//! constants and entry points, plus the set of module-scope variables a
//! named function can reach through its call graph.
mod consts;
mod parse;
mod instr;
mod group;
mod reflect;
mod error;

use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;
use std::iter::FromIterator;
pub use parse::{Instrs, Instr, Operands};
pub use instr::{ConstantId, ExecutionModel, FunctionId, ImageDim, InstrId,
    StorageClass, TypeId, VariableId};
pub use reflect::*;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// In-memory SPIR-V module, stored as its raw words.
#[derive(Debug, Clone)]
pub struct SpirvBinary(Vec<u32>);
impl From<Vec<u32>> for SpirvBinary {
    fn from(x: Vec<u32>) -> Self { SpirvBinary(x) }
}
impl FromIterator<u32> for SpirvBinary {
    fn from_iter<I: IntoIterator<Item=u32>>(iter: I) -> Self {
        SpirvBinary(iter.into_iter().collect::<Vec<u32>>())
    }
}

impl SpirvBinary {
    /// Assemble a binary from little-endian bytes. The byte count must be
    /// a whole number of words.
    pub fn from_bytes(data: &[u8]) -> Result<SpirvBinary> {
        if data.len() % 4 != 0 { return Err(Error::MalformedBinary); }
        let mut words = vec![0u32; data.len() / 4];
        LittleEndian::read_u32_into(data, &mut words);
        Ok(SpirvBinary(words))
    }
    /// Read a stream to completion and assemble a binary from it.
    pub fn from_stream<R: Read>(mut stream: R) -> Result<SpirvBinary> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data)
            .map_err(|_| Error::MalformedBinary)?;
        SpirvBinary::from_bytes(&data)
    }

    pub fn words(&self) -> &[u32] { &self.0 }
    /// Validate the header and iterate the instruction stream.
    pub fn instrs(&self) -> Result<Instrs> { Instrs::new(&self.0) }
    /// Reflect the declared materials of the module.
    pub fn reflect(&self) -> Result<Module> {
        reflect::reflect_spirv(&self)
    }
}
