//! Typed readers over decoded instructions.
//!
//! Each `Op` structure captures the operand shape of one opcode. Identifier
//! operands stay unresolved; resolution is the converter's business.
use std::convert::TryFrom;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use super::parse::Instr;
use super::{Error, Result};

pub type InstrId = u32;
pub type TypeId = InstrId;
pub type VariableId = InstrId;
pub type ConstantId = InstrId;
pub type FunctionId = InstrId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ExecutionModel {
    Vertex = 0,
    TessellationControl = 1,
    TessellationEvaluation = 2,
    Geometry = 3,
    Fragment = 4,
    GlCompute = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum StorageClass {
    UniformConstant = 0,
    Input = 1,
    Uniform = 2,
    Output = 3,
    Workgroup = 4,
    CrossWorkgroup = 5,
    Private = 6,
    Function = 7, // Texture calls to sampler object will translate to this.
    Generic = 8,
    PushConstant = 9,
    AtomicCounter = 10,
    Image = 11,
    StorageBuffer = 12,
}

/// Do note this is not a number of dimensions but an enumeration of values
/// specified in the SPIR-V specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ImageDim {
    Image1D = 0,
    Image2D = 1,
    Image3D = 2,
    CubeMap = 3,
    Rect = 4,
    Buffer = 5,
    SubpassData = 6,
}

#[derive(Debug)]
pub struct OpEntryPoint<'a> {
    pub exec_model: ExecutionModel,
    pub func_id: FunctionId,
    pub name: &'a str,
    pub interface_ids: &'a [u32],
}
impl<'a> TryFrom<&Instr<'a>> for OpEntryPoint<'a> {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpEntryPoint {
            exec_model: operands.read_u32()
                .map(FromPrimitive::from_u32)?
                .ok_or(Error::UnsupportedFeature)?,
            func_id: operands.read_u32()?,
            name: operands.read_str()?,
            interface_ids: operands.read_list()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpName<'a> {
    pub target_id: InstrId,
    pub name: &'a str,
}
impl<'a> TryFrom<&Instr<'a>> for OpName<'a> {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpName {
            target_id: operands.read_u32()?,
            name: operands.read_str()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpMemberName<'a> {
    pub target_id: TypeId,
    pub member_idx: u32,
    pub name: &'a str,
}
impl<'a> TryFrom<&Instr<'a>> for OpMemberName<'a> {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpMemberName {
            target_id: operands.read_u32()?,
            member_idx: operands.read_u32()?,
            name: operands.read_str()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpDecorate<'a> {
    pub target_id: InstrId,
    pub deco: u32,
    pub params: &'a [u32],
}
impl<'a> TryFrom<&Instr<'a>> for OpDecorate<'a> {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpDecorate {
            target_id: operands.read_u32()?,
            deco: operands.read_u32()?,
            params: operands.read_list()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpMemberDecorate<'a> {
    pub target_id: TypeId,
    pub member_idx: u32,
    pub deco: u32,
    pub params: &'a [u32],
}
impl<'a> TryFrom<&Instr<'a>> for OpMemberDecorate<'a> {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpMemberDecorate {
            target_id: operands.read_u32()?,
            member_idx: operands.read_u32()?,
            deco: operands.read_u32()?,
            params: operands.read_list()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpVariable {
    pub ty_id: TypeId,
    pub alloc_id: VariableId,
    pub store_cls: StorageClass,
}
impl<'a> TryFrom<&Instr<'a>> for OpVariable {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpVariable {
            ty_id: operands.read_u32()?,
            alloc_id: operands.read_u32()?,
            store_cls: operands.read_u32()
                .map(FromPrimitive::from_u32)?
                .ok_or(Error::UnsupportedFeature)?,
        };
        // An optional initializer identifier may follow.
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpFunction {
    pub func_id: FunctionId,
}
impl<'a> TryFrom<&Instr<'a>> for OpFunction {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let _rty_id = operands.read_u32()?;
        let op = OpFunction {
            func_id: operands.read_u32()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpFunctionCall<'a> {
    pub func_id: FunctionId,
    pub arg_ids: &'a [u32],
}
impl<'a> TryFrom<&Instr<'a>> for OpFunctionCall<'a> {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let _rty_id = operands.read_u32()?;
        let _rv_id = operands.read_u32()?;
        let op = OpFunctionCall {
            func_id: operands.read_u32()?,
            arg_ids: operands.read_list()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpLoad {
    pub rsc_id: InstrId,
}
impl<'a> TryFrom<&Instr<'a>> for OpLoad {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let _rty_id = operands.read_u32()?;
        let _rv_id = operands.read_u32()?;
        let op = OpLoad {
            rsc_id: operands.read_u32()?,
        };
        // An optional memory-access mask may follow.
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpStore {
    pub rsc_id: InstrId,
}
impl<'a> TryFrom<&Instr<'a>> for OpStore {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let op = OpStore {
            rsc_id: operands.read_u32()?,
        };
        Ok(op)
    }
}

#[derive(Debug)]
pub struct OpAccessChain {
    pub rsc_id: InstrId,
    pub accessed_rsc_id: InstrId,
}
impl<'a> TryFrom<&Instr<'a>> for OpAccessChain {
    type Error = Error;
    fn try_from(instr: &Instr<'a>) -> Result<Self> {
        let mut operands = instr.operands();
        let _rty_id = operands.read_u32()?;
        let op = OpAccessChain {
            rsc_id: operands.read_u32()?,
            accessed_rsc_id: operands.read_u32()?,
        };
        Ok(op)
    }
}
