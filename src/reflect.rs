//! SPIR-V Reflection
//!
//! Convert grouped instructions into the final reflection module. Entities
//! are built in dependency order: primitive types first, then aggregates,
//! then constants, then variables. Decorations collected during grouping
//! are merged onto their targets as each entity is built.
use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use log::debug;
use super::consts::*;
use super::group::{ConstDecl, SpirvGrouping, TypeDecl};
use super::instr::*;
use super::{Error, Result, SpirvBinary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Integer,
    Float,
}

/// Leaf numeric type. Vectors, matrices and arrays of scalars fold into
/// this one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveType {
    pub kind: PrimitiveKind,
    /// Bit-width of a single component.
    pub nbit: u32,
    /// Row number for matrix types and element number for vector types;
    /// 1 for scalars.
    pub nrow: u32,
    /// Column number for matrix types; 1 otherwise.
    pub ncol: u32,
    /// True for signed integers; false for unsigned integers, floats and
    /// booleans.
    pub is_signed: bool,
    pub is_array: bool,
    /// Identifier of the constant giving the element count, 0 when the
    /// type is not an array.
    pub array_len_const: ConstantId,
}
impl PrimitiveType {
    fn scalar(kind: PrimitiveKind, nbit: u32, is_signed: bool) -> PrimitiveType {
        PrimitiveType {
            kind,
            nbit,
            nrow: 1,
            ncol: 1,
            is_signed,
            is_array: false,
            array_len_const: 0,
        }
    }

    pub fn is_scalar(&self) -> bool { self.nrow == 1 && self.ncol == 1 }
    pub fn is_vec(&self) -> bool { self.nrow > 1 && self.ncol == 1 }
    pub fn is_mat(&self) -> bool { self.ncol > 1 }

    pub fn is_sint(&self) -> bool { self.kind == PrimitiveKind::Integer && self.is_signed }
    pub fn is_uint(&self) -> bool { self.kind == PrimitiveKind::Integer && !self.is_signed }
    pub fn is_float(&self) -> bool { self.kind == PrimitiveKind::Float }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructMember {
    pub ty: TypeId,
    pub name: Option<String>,
    /// Byte offset within the aggregate, from the member decorations.
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: Option<String>,
    pub members: Vec<StructMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageType {
    pub dim: ImageDim,
    pub is_array: bool,
    pub is_multisampled: bool,
    /// Identifier of the sampled component's primitive type.
    pub prim_ty: TypeId,
}

/// Opaque resource marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerType;

/// Sampler and image combined into one opaque resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledImageType {
    pub img_ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: Option<String>,
    /// Pointee type identifier with every pointer layer stripped.
    pub ty: TypeId,
    pub store_cls: StorageClass,
    pub bind_point: u32,
    pub desc_set: u32,
    pub location: u32,
    pub input_attm_idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: Option<String>,
    pub ty: TypeId,
    /// Raw literal words as declared.
    pub value: Vec<u32>,
    pub is_spec: bool,
    /// Meaningful only when `is_spec` is set.
    pub spec_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub exec_model: ExecutionModel,
    pub func: FunctionId,
    pub name: String,
    pub interface_ids: Vec<InstrId>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct Function {
    name: Option<String>,
    accessed_vars: HashSet<InstrId>,
    calls: HashSet<FunctionId>,
}

/// Immutable reflection of one SPIR-V module.
#[derive(Default, Debug, PartialEq)]
pub struct Module {
    entry_points: Vec<EntryPoint>,
    prim_map: HashMap<TypeId, PrimitiveType>,
    struct_map: HashMap<TypeId, StructType>,
    img_map: HashMap<TypeId, ImageType>,
    sampler_map: HashMap<TypeId, SamplerType>,
    sampled_img_map: HashMap<TypeId, SampledImageType>,
    const_map: HashMap<ConstantId, Constant>,
    var_map: HashMap<VariableId, Variable>,
    func_map: HashMap<FunctionId, Function>,
}
impl Module {
    pub fn entry_points(&self) -> &[EntryPoint] { &self.entry_points }
    pub fn prim_tys(&self) -> &HashMap<TypeId, PrimitiveType> { &self.prim_map }
    pub fn struct_tys(&self) -> &HashMap<TypeId, StructType> { &self.struct_map }
    pub fn imgs(&self) -> &HashMap<TypeId, ImageType> { &self.img_map }
    pub fn samplers(&self) -> &HashMap<TypeId, SamplerType> { &self.sampler_map }
    pub fn sampled_imgs(&self) -> &HashMap<TypeId, SampledImageType> { &self.sampled_img_map }
    pub fn consts(&self) -> &HashMap<ConstantId, Constant> { &self.const_map }
    pub fn vars(&self) -> &HashMap<VariableId, Variable> { &self.var_map }

    /// Collect every module-scope variable statically reachable from the
    /// entry point or function named `name`, walking the call graph
    /// transitively. The result carries no meaningful order.
    pub fn variable_references(&self, name: &str) -> Result<Vec<&Variable>> {
        let func = self.entry_points.iter()
            .find(|entry_point| entry_point.name == name)
            .map(|entry_point| entry_point.func)
            .or_else(|| {
                self.func_map.iter()
                    .find(|(_, func)| func.name.as_deref() == Some(name))
                    .map(|(&func_id, _)| func_id)
            })
            .ok_or(Error::NotFound)?;
        // Shared callees are visited once; the walk is bounded by the
        // call-graph size.
        let mut visited = HashSet::new();
        let mut worklist = vec![func];
        let mut var_ids = HashSet::new();
        while let Some(func_id) = worklist.pop() {
            if !visited.insert(func_id) { continue; }
            if let Some(func) = self.func_map.get(&func_id) {
                var_ids.extend(func.accessed_vars.iter()
                    .filter(|x| self.var_map.contains_key(x)));
                worklist.extend(func.calls.iter().copied());
            }
        }
        Ok(var_ids.into_iter()
            .filter_map(|var_id| self.var_map.get(&var_id))
            .collect())
    }
}

pub(crate) fn reflect_spirv(module: &SpirvBinary) -> Result<Module> {
    let grouping = SpirvGrouping::try_from(module)?;
    Module::try_from(grouping)
}

impl<'a> TryFrom<SpirvGrouping<'a>> for Module {
    type Error = Error;
    fn try_from(grouping: SpirvGrouping<'a>) -> Result<Module> {
        let mut conv = Converter {
            grouping,
            ptr_map: HashMap::new(),
            known_ids: HashSet::new(),
            module: Module::default(),
        };
        conv.convert_tys()?;
        conv.convert_consts()?;
        conv.convert_vars()?;
        conv.digest_fns()?;
        conv.convert_entry_points()?;
        conv.check_deco_targets()?;
        debug!("reflected {} entry points, {} resources",
            conv.module.entry_points.len(), conv.module.var_map.len());
        Ok(conv.module)
    }
}

struct Converter<'a> {
    grouping: SpirvGrouping<'a>,
    /// Pointer type identifier to pointee type identifier.
    ptr_map: HashMap<TypeId, TypeId>,
    /// Every identifier a declaration has defined so far.
    known_ids: HashSet<InstrId>,
    module: Module,
}
impl<'a> Converter<'a> {
    fn get_name(&self, id: InstrId, member_idx: Option<u32>) -> Option<&'a str> {
        self.grouping.name_map.get(&(id, member_idx)).copied()
    }
    /// First literal of the last observed decoration of the given kind.
    /// Later decorations override earlier ones of the same kind.
    fn get_deco_u32(&self, id: InstrId, member_idx: Option<u32>, deco: u32) -> Option<u32> {
        self.grouping.deco_map.get(&(id, member_idx))
            .and_then(|decos| decos.iter().rev().find(|(kind, _)| *kind == deco))
            .and_then(|(_, params)| params.first())
            .copied()
    }
    fn mark_known(&mut self, id: InstrId) -> Result<()> {
        if self.known_ids.insert(id) { Ok(()) } else { Err(Error::MalformedBinary) }
    }

    fn convert_tys(&mut self) -> Result<()> {
        let mut pending = std::mem::replace(&mut self.grouping.ty_decls, Vec::new());
        while !pending.is_empty() {
            let npending = pending.len();
            let mut remain = Vec::new();
            for decl in pending {
                if !self.convert_ty(&decl)? { remain.push(decl); }
            }
            if remain.len() == npending {
                // A full round without progress proves a dangling
                // reference among the remaining declarations.
                return Err(Error::MalformedBinary);
            }
            pending = remain;
        }
        Ok(())
    }
    /// Build one type if its dependencies are available. `Ok(false)` defers
    /// the declaration to a later round.
    fn convert_ty(&mut self, decl: &TypeDecl<'a>) -> Result<bool> {
        match *decl {
            TypeDecl::Void { ty_id } |
            TypeDecl::FuncProto { ty_id } => {
                // Never a resource type, but the identifier is taken.
                self.mark_known(ty_id)?;
            },
            TypeDecl::Bool { ty_id } => {
                let ty = PrimitiveType::scalar(PrimitiveKind::Boolean, 1, false);
                self.insert_prim(ty_id, ty)?;
            },
            TypeDecl::Int { ty_id, nbit, is_signed } => {
                let ty = PrimitiveType::scalar(PrimitiveKind::Integer, nbit, is_signed);
                self.insert_prim(ty_id, ty)?;
            },
            TypeDecl::Float { ty_id, nbit } => {
                let ty = PrimitiveType::scalar(PrimitiveKind::Float, nbit, false);
                self.insert_prim(ty_id, ty)?;
            },
            TypeDecl::Vector { ty_id, elem_ty, nelem } => {
                let elem = match self.prim_dep(elem_ty)? {
                    Some(x) => x.clone(),
                    None => return Ok(false),
                };
                if !elem.is_scalar() || elem.is_array {
                    return Err(Error::MalformedBinary);
                }
                let ty = PrimitiveType { nrow: nelem, ..elem };
                self.insert_prim(ty_id, ty)?;
            },
            TypeDecl::Matrix { ty_id, col_ty, ncol } => {
                let col = match self.prim_dep(col_ty)? {
                    Some(x) => x.clone(),
                    None => return Ok(false),
                };
                if !col.is_vec() || col.is_array {
                    return Err(Error::MalformedBinary);
                }
                let ty = PrimitiveType { ncol, ..col };
                self.insert_prim(ty_id, ty)?;
            },
            TypeDecl::Array { ty_id, elem_ty, len_const } => {
                let elem = match self.prim_dep(elem_ty) {
                    Ok(Some(x)) => x.clone(),
                    Ok(None) => return Ok(false),
                    // Arrays of aggregates and opaque resources cannot be
                    // expressed in the primitive record.
                    Err(_) => return Err(Error::UnsupportedFeature),
                };
                if elem.is_array { return Err(Error::UnsupportedFeature); }
                let ty = PrimitiveType {
                    is_array: true,
                    array_len_const: len_const,
                    ..elem
                };
                self.insert_prim(ty_id, ty)?;
            },
            TypeDecl::Image { ty_id, prim_ty, dim, is_array, is_multisampled } => {
                match self.prim_dep(prim_ty)? {
                    Some(x) if x.is_scalar() && !x.is_array => { },
                    Some(_) => return Err(Error::MalformedBinary),
                    None => return Ok(false),
                }
                let ty = ImageType { dim, is_array, is_multisampled, prim_ty };
                self.mark_known(ty_id)?;
                self.module.img_map.insert(ty_id, ty);
            },
            TypeDecl::Sampler { ty_id } => {
                self.mark_known(ty_id)?;
                self.module.sampler_map.insert(ty_id, SamplerType);
            },
            TypeDecl::SampledImage { ty_id, img_ty } => {
                if !self.module.img_map.contains_key(&img_ty) {
                    if self.known_ids.contains(&img_ty) {
                        return Err(Error::MalformedBinary);
                    }
                    return Ok(false);
                }
                self.mark_known(ty_id)?;
                self.module.sampled_img_map.insert(ty_id, SampledImageType { img_ty });
            },
            TypeDecl::Struct { ty_id, member_tys } => {
                for &member_ty in member_tys {
                    if self.is_data_ty(member_ty) { continue; }
                    if self.ptr_map.contains_key(&member_ty) {
                        return Err(Error::UnsupportedFeature);
                    }
                    if self.known_ids.contains(&member_ty) {
                        return Err(Error::MalformedBinary);
                    }
                    return Ok(false);
                }
                let mut members = Vec::with_capacity(member_tys.len());
                for (i, &member_ty) in member_tys.iter().enumerate() {
                    let member = StructMember {
                        ty: member_ty,
                        name: self.get_name(ty_id, Some(i as u32))
                            .map(str::to_owned),
                        offset: self.get_deco_u32(ty_id, Some(i as u32), DECO_OFFSET)
                            .unwrap_or(0),
                    };
                    members.push(member);
                }
                let ty = StructType {
                    name: self.get_name(ty_id, None).map(str::to_owned),
                    members,
                };
                self.mark_known(ty_id)?;
                self.module.struct_map.insert(ty_id, ty);
            },
            TypeDecl::Pointer { ty_id, target_ty } => {
                if !self.known_ids.contains(&target_ty) { return Ok(false); }
                self.mark_known(ty_id)?;
                self.ptr_map.insert(ty_id, target_ty);
            },
            TypeDecl::Unsupported { .. } => return Err(Error::UnsupportedFeature),
        }
        Ok(true)
    }
    /// Look up a primitive dependency. `Ok(None)` means the identifier is
    /// still undefined; an identifier defined as anything but a primitive
    /// is an error.
    fn prim_dep(&self, ty_id: TypeId) -> Result<Option<&PrimitiveType>> {
        if let Some(ty) = self.module.prim_map.get(&ty_id) { return Ok(Some(ty)); }
        if self.known_ids.contains(&ty_id) { return Err(Error::MalformedBinary); }
        Ok(None)
    }
    /// Whether the identifier resolves to a type a struct member may carry.
    fn is_data_ty(&self, ty_id: TypeId) -> bool {
        self.module.prim_map.contains_key(&ty_id) ||
            self.module.struct_map.contains_key(&ty_id) ||
            self.module.img_map.contains_key(&ty_id) ||
            self.module.sampler_map.contains_key(&ty_id) ||
            self.module.sampled_img_map.contains_key(&ty_id)
    }
    fn insert_prim(&mut self, ty_id: TypeId, ty: PrimitiveType) -> Result<()> {
        self.mark_known(ty_id)?;
        self.module.prim_map.insert(ty_id, ty);
        Ok(())
    }

    fn convert_consts(&mut self) -> Result<()> {
        let const_decls = std::mem::replace(&mut self.grouping.const_decls, Vec::new());
        for decl in const_decls {
            match decl {
                ConstDecl::Unsupported { .. } => return Err(Error::UnsupportedFeature),
                ConstDecl::Scalar { const_id, ty_id, value, is_spec } => {
                    if !self.module.prim_map.contains_key(&ty_id) {
                        return Err(Error::MalformedBinary);
                    }
                    let spec_id = self.get_deco_u32(const_id, None, DECO_SPEC_ID);
                    let constant = Constant {
                        name: self.get_name(const_id, None).map(str::to_owned),
                        ty: ty_id,
                        value,
                        is_spec: is_spec || spec_id.is_some(),
                        spec_id: spec_id.unwrap_or(0),
                    };
                    self.mark_known(const_id)?;
                    self.module.const_map.insert(const_id, constant);
                },
            }
        }
        // Array lengths reference constants, which are built after types;
        // settle the debt now.
        for ty in self.module.prim_map.values() {
            if ty.is_array && !self.module.const_map.contains_key(&ty.array_len_const) {
                return Err(Error::MalformedBinary);
            }
        }
        Ok(())
    }

    fn convert_vars(&mut self) -> Result<()> {
        let var_decls = std::mem::replace(&mut self.grouping.var_decls, Vec::new());
        for op in var_decls {
            // Resolve recurring layers of pointers to the type that holds
            // the data directly.
            let mut ty_id = op.ty_id;
            while let Some(&target_ty) = self.ptr_map.get(&ty_id) {
                ty_id = target_ty;
            }
            if !self.is_data_ty(ty_id) { return Err(Error::MalformedBinary); }
            let var = Variable {
                name: self.get_name(op.alloc_id, None).map(str::to_owned),
                ty: ty_id,
                store_cls: op.store_cls,
                bind_point: self.get_deco_u32(op.alloc_id, None, DECO_BINDING)
                    .unwrap_or(0),
                desc_set: self.get_deco_u32(op.alloc_id, None, DECO_DESCRIPTOR_SET)
                    .unwrap_or(0),
                location: self.get_deco_u32(op.alloc_id, None, DECO_LOCATION)
                    .unwrap_or(0),
                input_attm_idx: self.get_deco_u32(op.alloc_id, None, DECO_INPUT_ATTACHMENT_INDEX)
                    .unwrap_or(0),
            };
            self.mark_known(op.alloc_id)?;
            self.module.var_map.insert(op.alloc_id, var);
        }
        Ok(())
    }

    /// Digest function bodies into access and call records. Loads, stores
    /// and call arguments reaching a variable through an access chain are
    /// attributed to the chain's base.
    fn digest_fns(&mut self) -> Result<()> {
        let func_map = std::mem::replace(&mut self.grouping.func_map, HashMap::new());
        for (func_id, body) in func_map {
            let mut access_chain_map = HashMap::new();
            let mut func = Function::default();
            func.name = self.get_name(func_id, None).map(str::to_owned);
            for instr in body.iter() {
                match instr.opcode() {
                    OP_FUNCTION_CALL => {
                        let op = OpFunctionCall::try_from(instr)?;
                        func.calls.insert(op.func_id);
                        for &arg_id in op.arg_ids {
                            let arg_id = access_chain_map.get(&arg_id)
                                .copied()
                                .unwrap_or(arg_id);
                            func.accessed_vars.insert(arg_id);
                        }
                    },
                    OP_LOAD => {
                        let op = OpLoad::try_from(instr)?;
                        let rsc_id = access_chain_map.get(&op.rsc_id)
                            .copied()
                            .unwrap_or(op.rsc_id);
                        func.accessed_vars.insert(rsc_id);
                    },
                    OP_STORE => {
                        let op = OpStore::try_from(instr)?;
                        let rsc_id = access_chain_map.get(&op.rsc_id)
                            .copied()
                            .unwrap_or(op.rsc_id);
                        func.accessed_vars.insert(rsc_id);
                    },
                    OP_ACCESS_CHAIN | OP_IN_BOUNDS_ACCESS_CHAIN => {
                        let op = OpAccessChain::try_from(instr)?;
                        let base_id = access_chain_map.get(&op.accessed_rsc_id)
                            .copied()
                            .unwrap_or(op.accessed_rsc_id);
                        if access_chain_map.insert(op.rsc_id, base_id).is_some() {
                            return Err(Error::MalformedBinary);
                        }
                    },
                    _ => { },
                }
            }
            self.mark_known(func_id)?;
            self.module.func_map.insert(func_id, func);
        }
        Ok(())
    }

    fn convert_entry_points(&mut self) -> Result<()> {
        let entry_points = std::mem::replace(&mut self.grouping.entry_points, Vec::new());
        for op in entry_points {
            let entry_point = EntryPoint {
                exec_model: op.exec_model,
                func: op.func_id,
                name: op.name.to_owned(),
                interface_ids: op.interface_ids.to_vec(),
            };
            self.module.entry_points.push(entry_point);
        }
        Ok(())
    }

    /// A decoration aimed at an identifier no declaration ever defined is
    /// a hard error.
    fn check_deco_targets(&self) -> Result<()> {
        for &(target_id, _) in self.grouping.deco_map.keys() {
            if !self.known_ids.contains(&target_id) {
                return Err(Error::MalformedBinary);
            }
        }
        Ok(())
    }
}
