//! Instruction grouping.
//!
//! SPIR-V permits an identifier to be used ahead of its definition, so no
//! reference can be resolved while the stream is still being read. This
//! stage only sorts instructions into categories; resolution is deferred to
//! the converter in `reflect`.
use std::collections::HashMap;
use std::convert::TryFrom;
use log::debug;
use super::consts::*;
use super::instr::*;
use super::parse::{Instr, Instrs};
use super::{Error, Result, SpirvBinary};

/// Unresolved type declaration. Aggregate members, element types and array
/// length constants are kept as raw identifiers.
#[derive(Debug)]
pub enum TypeDecl<'a> {
    Void { ty_id: TypeId },
    FuncProto { ty_id: TypeId },
    Bool { ty_id: TypeId },
    Int { ty_id: TypeId, nbit: u32, is_signed: bool },
    Float { ty_id: TypeId, nbit: u32 },
    Vector { ty_id: TypeId, elem_ty: TypeId, nelem: u32 },
    Matrix { ty_id: TypeId, col_ty: TypeId, ncol: u32 },
    Image {
        ty_id: TypeId,
        prim_ty: TypeId,
        dim: ImageDim,
        is_array: bool,
        is_multisampled: bool,
    },
    Sampler { ty_id: TypeId },
    SampledImage { ty_id: TypeId, img_ty: TypeId },
    Array { ty_id: TypeId, elem_ty: TypeId, len_const: ConstantId },
    Struct { ty_id: TypeId, member_tys: &'a [u32] },
    Pointer { ty_id: TypeId, target_ty: TypeId },
    Unsupported { ty_id: TypeId },
}

/// Unresolved constant declaration.
#[derive(Debug)]
pub enum ConstDecl {
    Scalar {
        const_id: ConstantId,
        ty_id: TypeId,
        value: Vec<u32>,
        is_spec: bool,
    },
    Unsupported { const_id: ConstantId },
}

/// Decoded instructions grouped by category, no identifier resolved.
#[derive(Default, Debug)]
pub struct SpirvGrouping<'a> {
    pub entry_points: Vec<OpEntryPoint<'a>>,
    pub name_map: HashMap<(InstrId, Option<u32>), &'a str>,
    pub deco_map: HashMap<(InstrId, Option<u32>), Vec<(u32, &'a [u32])>>,
    pub ty_decls: Vec<TypeDecl<'a>>,
    pub const_decls: Vec<ConstDecl>,
    pub var_decls: Vec<OpVariable>,
    pub func_map: HashMap<FunctionId, Vec<Instr<'a>>>,
}

impl<'a> TryFrom<&'a SpirvBinary> for SpirvGrouping<'a> {
    type Error = Error;
    fn try_from(module: &'a SpirvBinary) -> Result<SpirvGrouping<'a>> {
        let mut grouping = SpirvGrouping::default();
        let mut instrs = module.instrs()?;
        while let Some(instr) = instrs.next() {
            let instr = instr?;
            let opcode = instr.opcode();
            match opcode {
                OP_ENTRY_POINT => {
                    let op = OpEntryPoint::try_from(&instr)?;
                    grouping.entry_points.push(op);
                },
                OP_NAME => {
                    let op = OpName::try_from(&instr)?;
                    let collision = grouping.name_map
                        .insert((op.target_id, None), op.name);
                    if collision.is_some() { return Err(Error::MalformedBinary); }
                },
                OP_MEMBER_NAME => {
                    let op = OpMemberName::try_from(&instr)?;
                    let collision = grouping.name_map
                        .insert((op.target_id, Some(op.member_idx)), op.name);
                    if collision.is_some() { return Err(Error::MalformedBinary); }
                },
                OP_DECORATE => {
                    let op = OpDecorate::try_from(&instr)?;
                    grouping.deco_map.entry((op.target_id, None))
                        .or_default()
                        .push((op.deco, op.params));
                },
                OP_MEMBER_DECORATE => {
                    let op = OpMemberDecorate::try_from(&instr)?;
                    grouping.deco_map.entry((op.target_id, Some(op.member_idx)))
                        .or_default()
                        .push((op.deco, op.params));
                },
                OP_VARIABLE => {
                    let op = OpVariable::try_from(&instr)?;
                    grouping.var_decls.push(op);
                },
                OP_FUNCTION => {
                    let op = OpFunction::try_from(&instr)?;
                    let body = collect_fn_body(&mut instrs)?;
                    let collision = grouping.func_map.insert(op.func_id, body);
                    if collision.is_some() { return Err(Error::MalformedBinary); }
                },
                _ if TYPE_RANGE.contains(&opcode) => {
                    grouping.ty_decls.push(parse_ty_decl(&instr)?);
                },
                _ if CONST_RANGE.contains(&opcode) ||
                    SPEC_CONST_RANGE.contains(&opcode) => {
                    grouping.const_decls.push(parse_const_decl(&instr)?);
                },
                _ => { },
            }
        }
        debug!("grouped {} entry points, {} type decls, {} const decls, \
            {} variables, {} functions",
            grouping.entry_points.len(), grouping.ty_decls.len(),
            grouping.const_decls.len(), grouping.var_decls.len(),
            grouping.func_map.len());
        Ok(grouping)
    }
}

/// Collect every instruction of a function body verbatim, up to the
/// matching end marker.
fn collect_fn_body<'a>(instrs: &mut Instrs<'a>) -> Result<Vec<Instr<'a>>> {
    let mut body = Vec::new();
    while let Some(instr) = instrs.next() {
        let instr = instr?;
        match instr.opcode() {
            OP_FUNCTION_END => return Ok(body),
            OP_FUNCTION => return Err(Error::MalformedBinary),
            _ => body.push(instr),
        }
    }
    // The stream ended with the function still open.
    Err(Error::MalformedBinary)
}

fn parse_ty_decl<'a>(instr: &Instr<'a>) -> Result<TypeDecl<'a>> {
    use num_traits::FromPrimitive;
    let mut operands = instr.operands();
    let ty_id = operands.read_u32()?;
    let decl = match instr.opcode() {
        OP_TYPE_VOID => {
            operands.finish()?;
            TypeDecl::Void { ty_id }
        },
        OP_TYPE_FUNCTION => {
            // Parameter type identifiers follow; never a resource type.
            TypeDecl::FuncProto { ty_id }
        },
        OP_TYPE_BOOL => {
            operands.finish()?;
            TypeDecl::Bool { ty_id }
        },
        OP_TYPE_INT => {
            let decl = TypeDecl::Int {
                ty_id,
                nbit: operands.read_u32()?,
                is_signed: operands.read_bool()?,
            };
            operands.finish()?;
            decl
        },
        OP_TYPE_FLOAT => {
            let decl = TypeDecl::Float {
                ty_id,
                nbit: operands.read_u32()?,
            };
            operands.finish()?;
            decl
        },
        OP_TYPE_VECTOR => {
            let decl = TypeDecl::Vector {
                ty_id,
                elem_ty: operands.read_u32()?,
                nelem: operands.read_u32()?,
            };
            operands.finish()?;
            decl
        },
        OP_TYPE_MATRIX => {
            let decl = TypeDecl::Matrix {
                ty_id,
                col_ty: operands.read_u32()?,
                ncol: operands.read_u32()?,
            };
            operands.finish()?;
            decl
        },
        OP_TYPE_IMAGE => {
            let prim_ty = operands.read_u32()?;
            let dim = operands.read_u32()
                .map(FromPrimitive::from_u32)?
                .ok_or(Error::UnsupportedFeature)?;
            let _is_depth = operands.read_u32()?;
            let is_array = operands.read_bool()?;
            let is_multisampled = operands.read_bool()?;
            let _is_sampled = operands.read_u32()?;
            let _color_fmt = operands.read_u32()?;
            // An optional access qualifier may follow.
            TypeDecl::Image { ty_id, prim_ty, dim, is_array, is_multisampled }
        },
        OP_TYPE_SAMPLER => {
            operands.finish()?;
            TypeDecl::Sampler { ty_id }
        },
        OP_TYPE_SAMPLED_IMAGE => {
            let decl = TypeDecl::SampledImage {
                ty_id,
                img_ty: operands.read_u32()?,
            };
            operands.finish()?;
            decl
        },
        OP_TYPE_ARRAY => {
            let decl = TypeDecl::Array {
                ty_id,
                elem_ty: operands.read_u32()?,
                len_const: operands.read_u32()?,
            };
            operands.finish()?;
            decl
        },
        OP_TYPE_STRUCT => {
            TypeDecl::Struct {
                ty_id,
                member_tys: operands.read_list()?,
            }
        },
        OP_TYPE_POINTER => {
            let _store_cls = operands.read_u32()?;
            let decl = TypeDecl::Pointer {
                ty_id,
                target_ty: operands.read_u32()?,
            };
            operands.finish()?;
            decl
        },
        // Runtime arrays and opaque types fall outside the supported
        // subset; the converter reports them if they were declared.
        _ => TypeDecl::Unsupported { ty_id },
    };
    Ok(decl)
}

fn parse_const_decl(instr: &Instr<'_>) -> Result<ConstDecl> {
    let mut operands = instr.operands();
    let ty_id = operands.read_u32()?;
    let const_id = operands.read_u32()?;
    let decl = match instr.opcode() {
        OP_CONSTANT | OP_SPEC_CONSTANT => {
            let value = operands.read_list()?.to_vec();
            if value.is_empty() { return Err(Error::MalformedBinary); }
            ConstDecl::Scalar {
                const_id,
                ty_id,
                value,
                is_spec: instr.opcode() == OP_SPEC_CONSTANT,
            }
        },
        OP_CONSTANT_TRUE | OP_SPEC_CONSTANT_TRUE => {
            operands.finish()?;
            ConstDecl::Scalar {
                const_id,
                ty_id,
                value: vec![1],
                is_spec: instr.opcode() == OP_SPEC_CONSTANT_TRUE,
            }
        },
        OP_CONSTANT_FALSE | OP_SPEC_CONSTANT_FALSE => {
            operands.finish()?;
            ConstDecl::Scalar {
                const_id,
                ty_id,
                value: vec![0],
                is_spec: instr.opcode() == OP_SPEC_CONSTANT_FALSE,
            }
        },
        // Composite, null, sampler and operation constants are not needed
        // for resource reflection.
        _ => ConstDecl::Unsupported { const_id },
    };
    Ok(decl)
}
