//! Decodes the `Code` attribute's instruction stream.
//!
//! Debug metadata (`LineNumberTable`, `LocalVariableTable`, stack map frames)
//! lives alongside `Code` as sibling attributes on the member and is never
//! parsed here: this module only walks `code[]` itself, which is sufficient
//! to recover opcode tokens and the owner/name/descriptor of every member
//! reference the method touches.

use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// One decoded bytecode instruction, shaped according to what it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`,
    /// `invokedynamic`. `owner` is empty for `invokedynamic`, which has no
    /// statically resolvable receiver class.
    MethodCall {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
    },
    /// `getfield`, `putfield`, `getstatic`, `putstatic`.
    FieldAccess {
        opcode: u8,
        owner: String,
        name: String,
    },
    /// `new`, `checkcast`, `instanceof`, `anewarray`.
    TypeRef { opcode: u8, type_name: String },
    /// Every other instruction shape: constant loads, local load/store, jumps,
    /// switches, increments, multi-array creation, and bare instructions.
    Plain { opcode: u8 },
}

impl Instruction {
    #[must_use]
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::MethodCall { opcode, .. }
            | Instruction::FieldAccess { opcode, .. }
            | Instruction::TypeRef { opcode, .. }
            | Instruction::Plain { opcode } => *opcode,
        }
    }
}

const WIDE: u8 = 0xc4;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const NEW: u8 = 0xbb;
const ANEWARRAY: u8 = 0xbd;
const CHECKCAST: u8 = 0xc0;
const INSTANCEOF: u8 = 0xc1;
const MULTIANEWARRAY: u8 = 0xc5;
const GETSTATIC: u8 = 0xb2;
const PUTSTATIC: u8 = 0xb3;
const GETFIELD: u8 = 0xb4;
const PUTFIELD: u8 = 0xb5;
const INVOKEVIRTUAL: u8 = 0xb6;
const INVOKESPECIAL: u8 = 0xb7;
const INVOKESTATIC: u8 = 0xb8;
const INVOKEINTERFACE: u8 = 0xb9;
const INVOKEDYNAMIC: u8 = 0xba;

/// Decodes the raw `code[]` array of a `Code` attribute into a linear
/// sequence of instructions, resolving constant-pool-bearing operands along
/// the way. Runs in O(len(code)).
pub fn decode_instructions(code: &[u8], cp: &ConstantPool) -> Result<Vec<Instruction>> {
    let mut out = Vec::new();
    let mut pos: usize = 0;
    let len = code.len();

    while pos < len {
        let start = pos;
        let opcode = code[pos];
        pos += 1;

        let mut reader = Reader::new(&code[pos..]);

        let effective_opcode = if opcode == WIDE {
            *code.get(pos).ok_or(Error::MalformedAttribute("Code"))?
        } else {
            opcode
        };

        match effective_opcode {
            GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => {
                let index = reader.read_u2()?;
                let (owner, name, _descriptor) = cp.get_member_ref(index)?;
                out.push(Instruction::FieldAccess {
                    opcode: effective_opcode,
                    owner,
                    name,
                });
                pos += 2;
            }
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => {
                let index = reader.read_u2()?;
                let (owner, name, descriptor) = cp.get_member_ref(index)?;
                out.push(Instruction::MethodCall {
                    opcode: effective_opcode,
                    owner,
                    name,
                    descriptor,
                });
                pos += 2;
            }
            INVOKEINTERFACE => {
                let index = reader.read_u2()?;
                let _count = reader.read_u1()?;
                let _zero = reader.read_u1()?;
                let (owner, name, descriptor) = cp.get_member_ref(index)?;
                out.push(Instruction::MethodCall {
                    opcode: effective_opcode,
                    owner,
                    name,
                    descriptor,
                });
                pos += 4;
            }
            INVOKEDYNAMIC => {
                let index = reader.read_u2()?;
                let _zero = reader.read_u2()?;
                let (name, descriptor) = cp.get_invoke_dynamic_name_and_type(index)?;
                out.push(Instruction::MethodCall {
                    opcode: effective_opcode,
                    owner: String::new(),
                    name,
                    descriptor,
                });
                pos += 4;
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                let index = reader.read_u2()?;
                let type_name = cp.get_class_name(index)?;
                out.push(Instruction::TypeRef {
                    opcode: effective_opcode,
                    type_name,
                });
                pos += 2;
            }
            MULTIANEWARRAY => {
                // References a Class entry too, but multi-array creation is
                // treated as an opaque "bare" instruction (no reference scan).
                let _index = reader.read_u2()?;
                let _dims = reader.read_u1()?;
                out.push(Instruction::Plain {
                    opcode: effective_opcode,
                });
                pos += 3;
            }
            TABLESWITCH => {
                pos = decode_tableswitch(code, start, pos)?;
                out.push(Instruction::Plain { opcode: effective_opcode });
            }
            LOOKUPSWITCH => {
                pos = decode_lookupswitch(code, start, pos)?;
                out.push(Instruction::Plain { opcode: effective_opcode });
            }
            _ => {
                let operand_len = if opcode == WIDE {
                    // `wide` itself (1 byte) + the widened opcode (1 byte) +
                    // the widened instruction's operand.
                    1 + wide_operand_len(effective_opcode)
                } else {
                    fixed_operand_len(effective_opcode)?
                };
                out.push(Instruction::Plain { opcode: effective_opcode });
                pos += operand_len;
            }
        }

        if pos > len {
            return Err(Error::MalformedAttribute("Code"));
        }
    }

    Ok(out)
}

fn wide_operand_len(widened_opcode: u8) -> usize {
    // wide iinc: index(2) + const(2); everything else widenable: index(2).
    if widened_opcode == 0x84 {
        4
    } else {
        2
    }
}

/// Operand byte length (excluding the opcode byte itself) for instructions
/// that do not reference the constant pool and are not variable-length.
fn fixed_operand_len(opcode: u8) -> Result<usize> {
    let len = match opcode {
        0x00..=0x0f => 0, // nop .. dconst_1
        0x10 => 1,        // bipush
        0x11 => 2,        // sipush
        0x12 => 1,        // ldc
        0x13 | 0x14 => 2, // ldc_w, ldc2_w
        0x15..=0x19 => 1, // iload..aload
        0x1a..=0x35 => 0, // iload_0 .. saload
        0x36..=0x3a => 1, // istore..astore
        0x3b..=0x56 => 0, // istore_0 .. sastore
        0x57..=0x83 => 0, // pop .. lxor
        0x84 => 2,        // iinc: index(1), const(1)
        0x85..=0x98 => 0, // i2l .. dcmpg
        0x99..=0xa8 => 2, // ifeq .. jsr (branch offsets)
        0xa9 => 1,        // ret
        0xac..=0xb1 => 0, // ireturn .. return
        0xbc => 1,        // newarray
        0xbe => 0,        // arraylength
        0xbf => 0,        // athrow
        0xc2 | 0xc3 => 0, // monitorenter, monitorexit
        0xc6 | 0xc7 => 2, // ifnull, ifnonnull
        0xc8 | 0xc9 => 4, // goto_w, jsr_w
        0xca | 0xfe | 0xff => 0, // reserved
        _ => return Err(Error::MalformedAttribute("Code")),
    };
    Ok(len)
}

fn decode_tableswitch(code: &[u8], instruction_start: usize, mut pos: usize) -> Result<usize> {
    pos += padding(instruction_start, pos);
    let default = read_i4_at(code, pos)?;
    let _ = default;
    pos += 4;
    let low = read_i4_at(code, pos)?;
    pos += 4;
    let high = read_i4_at(code, pos)?;
    pos += 4;
    if high < low {
        return Err(Error::MalformedAttribute("Code"));
    }
    let count: usize = (high as i64 - low as i64 + 1)
        .try_into()
        .map_err(|_| Error::MalformedAttribute("Code"))?;
    pos += count
        .checked_mul(4)
        .ok_or(Error::MalformedAttribute("Code"))?;
    Ok(pos)
}

fn decode_lookupswitch(code: &[u8], instruction_start: usize, mut pos: usize) -> Result<usize> {
    pos += padding(instruction_start, pos);
    let _default = read_i4_at(code, pos)?;
    pos += 4;
    let npairs = read_i4_at(code, pos)?;
    if npairs < 0 {
        return Err(Error::MalformedAttribute("Code"));
    }
    pos += 4;
    pos += (npairs as usize)
        .checked_mul(8)
        .ok_or(Error::MalformedAttribute("Code"))?;
    Ok(pos)
}

/// Bytes of padding needed so the next read starts on a 4-byte boundary
/// relative to the start of the method's `code[]` array.
fn padding(instruction_start: usize, pos: usize) -> usize {
    let consumed = pos - instruction_start;
    let _ = consumed;
    (4 - (pos % 4)) % 4
}

fn read_i4_at(code: &[u8], pos: usize) -> Result<i32> {
    let bytes: [u8; 4] = code
        .get(pos..pos + 4)
        .ok_or(Error::MalformedAttribute("Code"))?
        .try_into()
        .map_err(|_| Error::MalformedAttribute("Code"))?;
    Ok(i32::from_be_bytes(bytes))
}
