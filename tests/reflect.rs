//! Integration tests for SPIR-V reflection, driven by hand-assembled
//! instruction streams.
use std::collections::HashSet;
use spvmeta::{Error, ExecutionModel, ImageDim, Module, PrimitiveKind,
    SpirvBinary, StorageClass};

const OP_NAME: u32 = 5;
const OP_ENTRY_POINT: u32 = 15;
const OP_TYPE_VOID: u32 = 19;
const OP_TYPE_BOOL: u32 = 20;
const OP_TYPE_INT: u32 = 21;
const OP_TYPE_FLOAT: u32 = 22;
const OP_TYPE_VECTOR: u32 = 23;
const OP_TYPE_MATRIX: u32 = 24;
const OP_TYPE_IMAGE: u32 = 25;
const OP_TYPE_SAMPLER: u32 = 26;
const OP_TYPE_SAMPLED_IMAGE: u32 = 27;
const OP_TYPE_ARRAY: u32 = 28;
const OP_TYPE_RUNTIME_ARRAY: u32 = 29;
const OP_TYPE_STRUCT: u32 = 30;
const OP_TYPE_POINTER: u32 = 32;
const OP_TYPE_FUNCTION: u32 = 33;
const OP_CONSTANT_TRUE: u32 = 41;
const OP_CONSTANT: u32 = 43;
const OP_SPEC_CONSTANT: u32 = 50;
const OP_FUNCTION: u32 = 54;
const OP_FUNCTION_END: u32 = 56;
const OP_FUNCTION_CALL: u32 = 57;
const OP_VARIABLE: u32 = 59;
const OP_LOAD: u32 = 61;
const OP_STORE: u32 = 62;
const OP_ACCESS_CHAIN: u32 = 65;
const OP_RETURN: u32 = 253;
const OP_DECORATE: u32 = 71;
const OP_MEMBER_DECORATE: u32 = 72;

const DECO_SPEC_ID: u32 = 1;
const DECO_LOCATION: u32 = 30;
const DECO_BINDING: u32 = 33;
const DECO_DESCRIPTOR_SET: u32 = 34;
const DECO_OFFSET: u32 = 35;
const DECO_INPUT_ATTACHMENT_INDEX: u32 = 43;

const STORE_CLS_UNIFORM_CONSTANT: u32 = 0;
const STORE_CLS_INPUT: u32 = 1;
const STORE_CLS_UNIFORM: u32 = 2;
const STORE_CLS_PRIVATE: u32 = 6;

const EXEC_MODEL_FRAGMENT: u32 = 4;

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn instr(opcode: u32, operands: &[u32]) -> Vec<u32> {
    let mut words = vec![(((operands.len() + 1) as u32) << 16) | opcode];
    words.extend_from_slice(operands);
    words
}
fn str_operands(s: &str) -> Vec<u32> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 { bytes.push(0); }
    bytes.chunks(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
fn assemble(instrs: &[Vec<u32>]) -> SpirvBinary {
    let mut words = vec![0x0723_0203, 0x0001_0000, 0, 64, 0];
    for i in instrs {
        words.extend_from_slice(i);
    }
    SpirvBinary::from(words)
}
fn name_instr(target_id: u32, name: &str) -> Vec<u32> {
    let mut operands = vec![target_id];
    operands.extend(str_operands(name));
    instr(OP_NAME, &operands)
}
fn entry_point_instr(exec_model: u32, func_id: u32, name: &str, interface: &[u32]) -> Vec<u32> {
    let mut operands = vec![exec_model, func_id];
    operands.extend(str_operands(name));
    operands.extend_from_slice(interface);
    instr(OP_ENTRY_POINT, &operands)
}
fn ref_names(module: &Module, func: &str) -> HashSet<String> {
    module.variable_references(func)
        .unwrap()
        .into_iter()
        .filter_map(|var| var.name.clone())
        .collect()
}

#[test]
fn spec_constant_reflection() {
    init_log();
    let spv = assemble(&[
        instr(OP_TYPE_INT, &[1, 32, 1]),
        instr(OP_SPEC_CONSTANT, &[1, 2, 12]),
        instr(OP_DECORATE, &[2, DECO_SPEC_ID, 1]),
    ]);
    let module = spv.reflect().unwrap();
    assert_eq!(module.consts().len(), 1);
    let constant = &module.consts()[&2];
    assert!(constant.is_spec);
    assert_eq!(constant.spec_id, 1);
    assert_eq!(constant.value, vec![12]);
    let ty = &module.prim_tys()[&constant.ty];
    assert_eq!(ty.kind, PrimitiveKind::Integer);
    assert_eq!(ty.nbit, 32);
    assert!(ty.is_signed);
    assert_eq!((ty.nrow, ty.ncol), (1, 1));
    assert!(!ty.is_array);
}

#[test]
fn subpass_input_reflection() {
    init_log();
    let spv = assemble(&[
        name_instr(4, "t"),
        instr(OP_DECORATE, &[4, DECO_DESCRIPTOR_SET, 1]),
        instr(OP_DECORATE, &[4, DECO_INPUT_ATTACHMENT_INDEX, 2]),
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_IMAGE, &[2, 1, 6, 0, 0, 0, 2, 0]),
        instr(OP_TYPE_POINTER, &[3, STORE_CLS_UNIFORM_CONSTANT, 2]),
        instr(OP_VARIABLE, &[3, 4, STORE_CLS_UNIFORM_CONSTANT]),
    ]);
    let module = spv.reflect().unwrap();
    assert_eq!(module.vars().len(), 1);
    let var = &module.vars()[&4];
    assert_eq!(var.name.as_deref(), Some("t"));
    assert_eq!(var.store_cls, StorageClass::UniformConstant);
    assert_eq!(var.bind_point, 0);
    assert_eq!(var.location, 0);
    assert_eq!(var.desc_set, 1);
    assert_eq!(var.input_attm_idx, 2);
    let img = &module.imgs()[&var.ty];
    assert_eq!(img.dim, ImageDim::SubpassData);
    assert!(!img.is_array);
    assert!(!img.is_multisampled);
    let prim = &module.prim_tys()[&img.prim_ty];
    assert_eq!(prim.kind, PrimitiveKind::Float);
    assert_eq!(prim.nbit, 32);
    assert!(!prim.is_signed);
    assert_eq!((prim.nrow, prim.ncol), (1, 1));
}

#[test]
fn uniform_block_reflection() {
    let spv = assemble(&[
        name_instr(5, "Params"),
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_VECTOR, &[2, 1, 4]),
        instr(OP_TYPE_INT, &[3, 32, 0]),
        instr(OP_CONSTANT, &[3, 4, 8]),
        instr(OP_TYPE_STRUCT, &[5, 2, 6]),
        instr(OP_TYPE_ARRAY, &[6, 1, 4]),
        instr(OP_MEMBER_DECORATE, &[5, 0, DECO_OFFSET, 0]),
        instr(OP_MEMBER_DECORATE, &[5, 1, DECO_OFFSET, 16]),
        instr(OP_TYPE_POINTER, &[7, STORE_CLS_UNIFORM, 5]),
        instr(OP_VARIABLE, &[7, 8, STORE_CLS_UNIFORM]),
        instr(OP_DECORATE, &[8, DECO_DESCRIPTOR_SET, 0]),
        instr(OP_DECORATE, &[8, DECO_BINDING, 3]),
    ]);
    let module = spv.reflect().unwrap();
    let var = &module.vars()[&8];
    assert_eq!(var.bind_point, 3);
    assert_eq!(var.desc_set, 0);
    let structure = &module.struct_tys()[&var.ty];
    assert_eq!(structure.name.as_deref(), Some("Params"));
    assert_eq!(structure.members.len(), 2);
    assert_eq!(structure.members[0].ty, 2);
    assert_eq!(structure.members[0].offset, 0);
    assert_eq!(structure.members[1].offset, 16);
    // The second member is an array of 8 floats; its length constant must
    // resolve.
    let arr = &module.prim_tys()[&structure.members[1].ty];
    assert!(arr.is_array);
    assert_eq!(arr.array_len_const, 4);
    assert_eq!(module.consts()[&arr.array_len_const].value, vec![8]);
    // A vector folds its element shape.
    let vec4 = &module.prim_tys()[&2];
    assert_eq!((vec4.nrow, vec4.ncol), (4, 1));
}

#[test]
fn sampled_image_reflection() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_IMAGE, &[2, 1, 1, 0, 0, 0, 1, 0]),
        instr(OP_TYPE_SAMPLED_IMAGE, &[3, 2]),
        instr(OP_TYPE_SAMPLER, &[4]),
        instr(OP_TYPE_POINTER, &[5, STORE_CLS_UNIFORM_CONSTANT, 3]),
        instr(OP_VARIABLE, &[5, 6, STORE_CLS_UNIFORM_CONSTANT]),
    ]);
    let module = spv.reflect().unwrap();
    assert_eq!(module.samplers().len(), 1);
    let var = &module.vars()[&6];
    let sampled_img = &module.sampled_imgs()[&var.ty];
    assert_eq!(module.imgs()[&sampled_img.img_ty].dim, ImageDim::Image2D);
}

#[test]
fn bool_constant_reflection() {
    let spv = assemble(&[
        instr(OP_TYPE_BOOL, &[1]),
        instr(OP_CONSTANT_TRUE, &[1, 2]),
    ]);
    let module = spv.reflect().unwrap();
    let constant = &module.consts()[&2];
    assert_eq!(constant.value, vec![1]);
    assert!(!constant.is_spec);
    assert_eq!(module.prim_tys()[&constant.ty].kind, PrimitiveKind::Boolean);
}

#[test]
fn matrix_folds_component_shape() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_VECTOR, &[2, 1, 3]),
        instr(OP_TYPE_MATRIX, &[3, 2, 4]),
    ]);
    let module = spv.reflect().unwrap();
    let mat = &module.prim_tys()[&3];
    assert_eq!((mat.nrow, mat.ncol), (3, 4));
    assert_eq!(mat.kind, PrimitiveKind::Float);
    assert_eq!(mat.nbit, 32);
}

#[test]
fn input_location_reflection() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_POINTER, &[2, STORE_CLS_INPUT, 1]),
        instr(OP_VARIABLE, &[2, 3, STORE_CLS_INPUT]),
        instr(OP_DECORATE, &[3, DECO_LOCATION, 3]),
    ]);
    let module = spv.reflect().unwrap();
    let var = &module.vars()[&3];
    assert_eq!(var.location, 3);
    assert_eq!(var.store_cls, StorageClass::Input);
    assert_eq!((var.bind_point, var.desc_set, var.input_attm_idx), (0, 0, 0));
}

#[test]
fn duplicate_decoration_overrides() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_POINTER, &[2, STORE_CLS_UNIFORM, 1]),
        instr(OP_VARIABLE, &[2, 3, STORE_CLS_UNIFORM]),
        instr(OP_DECORATE, &[3, DECO_BINDING, 1]),
        instr(OP_DECORATE, &[3, DECO_BINDING, 5]),
    ]);
    let module = spv.reflect().unwrap();
    assert_eq!(module.vars()[&3].bind_point, 5);
}

#[test]
fn idempotent_reflection() {
    let spv = assemble(&[
        name_instr(4, "t"),
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_IMAGE, &[2, 1, 6, 0, 0, 0, 2, 0]),
        instr(OP_TYPE_POINTER, &[3, STORE_CLS_UNIFORM_CONSTANT, 2]),
        instr(OP_VARIABLE, &[3, 4, STORE_CLS_UNIFORM_CONSTANT]),
        instr(OP_DECORATE, &[4, DECO_DESCRIPTOR_SET, 1]),
        instr(OP_SPEC_CONSTANT, &[5, 6, 12]),
        instr(OP_TYPE_INT, &[5, 32, 1]),
        instr(OP_DECORATE, &[6, DECO_SPEC_ID, 1]),
    ]);
    assert_eq!(spv.reflect().unwrap(), spv.reflect().unwrap());
}

fn load_store_module(swap: bool) -> SpirvBinary {
    let load_a = instr(OP_LOAD, &[3, 10, 5]);
    let store_b = instr(OP_STORE, &[6, 10]);
    let (first, second) = if swap {
        (store_b.clone(), load_a.clone())
    } else {
        (load_a, store_b)
    };
    assemble(&[
        entry_point_instr(EXEC_MODEL_FRAGMENT, 7, "main", &[]),
        name_instr(5, "a"),
        name_instr(6, "b"),
        instr(OP_TYPE_VOID, &[1]),
        instr(OP_TYPE_FUNCTION, &[2, 1]),
        instr(OP_TYPE_FLOAT, &[3, 32]),
        instr(OP_TYPE_POINTER, &[4, STORE_CLS_PRIVATE, 3]),
        instr(OP_VARIABLE, &[4, 5, STORE_CLS_PRIVATE]),
        instr(OP_VARIABLE, &[4, 6, STORE_CLS_PRIVATE]),
        instr(OP_FUNCTION, &[1, 7, 0, 2]),
        first,
        second,
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
    ])
}

#[test]
fn reordered_accesses_reference_same_variables() {
    init_log();
    let module = load_store_module(false).reflect().unwrap();
    let swapped = load_store_module(true).reflect().unwrap();
    let expected: HashSet<String> = ["a", "b"].iter().map(|x| x.to_string()).collect();
    assert_eq!(ref_names(&module, "main"), expected);
    assert_eq!(ref_names(&swapped, "main"), expected);
}

#[test]
fn transitive_references_through_calls() {
    init_log();
    let spv = assemble(&[
        name_instr(10, "A"),
        name_instr(11, "B"),
        name_instr(5, "V"),
        instr(OP_TYPE_VOID, &[1]),
        instr(OP_TYPE_FUNCTION, &[2, 1]),
        instr(OP_TYPE_FLOAT, &[3, 32]),
        instr(OP_TYPE_POINTER, &[4, STORE_CLS_PRIVATE, 3]),
        instr(OP_VARIABLE, &[4, 5, STORE_CLS_PRIVATE]),
        // A calls B; only B touches V.
        instr(OP_FUNCTION, &[1, 10, 0, 2]),
        instr(OP_FUNCTION_CALL, &[1, 12, 11]),
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
        instr(OP_FUNCTION, &[1, 11, 0, 2]),
        instr(OP_LOAD, &[3, 13, 5]),
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
    ]);
    let module = spv.reflect().unwrap();
    let expected: HashSet<String> = Some("V".to_string()).into_iter().collect();
    assert_eq!(ref_names(&module, "A"), expected);
    assert_eq!(ref_names(&module, "B"), expected);
}

#[test]
fn references_through_access_chains_and_call_args() {
    let spv = assemble(&[
        name_instr(20, "caller"),
        name_instr(21, "callee"),
        name_instr(8, "buf"),
        instr(OP_TYPE_VOID, &[1]),
        instr(OP_TYPE_FLOAT, &[3, 32]),
        instr(OP_TYPE_POINTER, &[4, STORE_CLS_UNIFORM, 3]),
        instr(OP_TYPE_INT, &[5, 32, 0]),
        instr(OP_CONSTANT, &[5, 6, 2]),
        instr(OP_TYPE_STRUCT, &[7, 3]),
        instr(OP_TYPE_POINTER, &[9, STORE_CLS_UNIFORM, 7]),
        instr(OP_VARIABLE, &[9, 8, STORE_CLS_UNIFORM]),
        instr(OP_TYPE_FUNCTION, &[2, 1]),
        // The caller passes a pointer into the variable; it never loads
        // through it itself.
        instr(OP_FUNCTION, &[1, 20, 0, 2]),
        instr(OP_ACCESS_CHAIN, &[4, 22, 8, 6]),
        instr(OP_FUNCTION_CALL, &[1, 23, 21, 22]),
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
        instr(OP_FUNCTION, &[1, 21, 0, 2]),
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
    ]);
    let module = spv.reflect().unwrap();
    let expected: HashSet<String> = Some("buf".to_string()).into_iter().collect();
    assert_eq!(ref_names(&module, "caller"), expected);
}

#[test]
fn entry_point_metadata() {
    let spv = assemble(&[
        entry_point_instr(EXEC_MODEL_FRAGMENT, 7, "main", &[5, 6]),
        instr(OP_TYPE_VOID, &[1]),
        instr(OP_TYPE_FUNCTION, &[2, 1]),
        instr(OP_TYPE_FLOAT, &[3, 32]),
        instr(OP_TYPE_POINTER, &[4, STORE_CLS_PRIVATE, 3]),
        instr(OP_VARIABLE, &[4, 5, STORE_CLS_PRIVATE]),
        instr(OP_VARIABLE, &[4, 6, STORE_CLS_PRIVATE]),
        instr(OP_FUNCTION, &[1, 7, 0, 2]),
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
    ]);
    let module = spv.reflect().unwrap();
    assert_eq!(module.entry_points().len(), 1);
    let entry_point = &module.entry_points()[0];
    assert_eq!(entry_point.exec_model, ExecutionModel::Fragment);
    assert_eq!(entry_point.func, 7);
    assert_eq!(entry_point.name, "main");
    assert_eq!(entry_point.interface_ids, vec![5, 6]);
}

#[test]
fn unknown_function_name_is_not_found() {
    let spv = assemble(&[
        instr(OP_TYPE_VOID, &[1]),
        instr(OP_TYPE_FUNCTION, &[2, 1]),
        instr(OP_FUNCTION, &[1, 7, 0, 2]),
        instr(OP_RETURN, &[]),
        instr(OP_FUNCTION_END, &[]),
    ]);
    let module = spv.reflect().unwrap();
    assert_eq!(module.variable_references("nope").err(), Some(Error::NotFound));
}

#[test]
fn malformed_magic_never_yields_module() {
    let mut words = vec![0x0203_0723, 0x0001_0000, 0, 64, 0];
    words.extend(instr(OP_TYPE_FLOAT, &[1, 32]));
    assert_eq!(SpirvBinary::from(words).reflect().err(), Some(Error::MalformedBinary));
}

#[test]
fn malformed_truncated_instr() {
    let spv = {
        let mut words = vec![0x0723_0203, 0x0001_0000, 0, 64, 0];
        // Declared word count of 4, but only two words remain.
        words.extend(&[(4 << 16) | OP_TYPE_INT, 1]);
        SpirvBinary::from(words)
    };
    assert_eq!(spv.reflect().err(), Some(Error::MalformedBinary));
}

#[test]
fn malformed_dangling_decoration_target() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_DECORATE, &[9, DECO_BINDING, 0]),
    ]);
    assert_eq!(spv.reflect().err(), Some(Error::MalformedBinary));
}

#[test]
fn malformed_dangling_type_reference() {
    let spv = assemble(&[
        instr(OP_TYPE_VECTOR, &[2, 1, 4]),
    ]);
    assert_eq!(spv.reflect().err(), Some(Error::MalformedBinary));
}

#[test]
fn malformed_unterminated_function() {
    let spv = assemble(&[
        instr(OP_TYPE_VOID, &[1]),
        instr(OP_TYPE_FUNCTION, &[2, 1]),
        instr(OP_FUNCTION, &[1, 7, 0, 2]),
        instr(OP_RETURN, &[]),
    ]);
    assert_eq!(spv.reflect().err(), Some(Error::MalformedBinary));
}

#[test]
fn malformed_dangling_array_length() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_ARRAY, &[2, 1, 9]),
    ]);
    assert_eq!(spv.reflect().err(), Some(Error::MalformedBinary));
}

#[test]
fn unsupported_runtime_array() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
        instr(OP_TYPE_RUNTIME_ARRAY, &[2, 1]),
    ]);
    assert_eq!(spv.reflect().err(), Some(Error::UnsupportedFeature));
}

#[test]
fn byte_stream_round_trip() {
    let spv = assemble(&[
        instr(OP_TYPE_FLOAT, &[1, 32]),
    ]);
    let bytes: Vec<u8> = spv.words()
        .iter()
        .flat_map(|word| word.to_le_bytes().to_vec())
        .collect();
    let from_bytes = SpirvBinary::from_bytes(&bytes).unwrap();
    assert_eq!(spv.reflect().unwrap(), from_bytes.reflect().unwrap());
    let from_stream = SpirvBinary::from_stream(&bytes[..]).unwrap();
    assert_eq!(spv.reflect().unwrap(), from_stream.reflect().unwrap());
    // A stray byte cannot form a whole word.
    let mut ragged = bytes;
    ragged.push(0);
    assert_eq!(SpirvBinary::from_bytes(&ragged).err(), Some(Error::MalformedBinary));
}
