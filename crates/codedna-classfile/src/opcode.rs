//! Opcode tables for the stack-based bytecode format.
//!
//! [`OpcodeCategory`] is the fixed twelve-label classification used by fuzzy-mode
//! pattern generation. The mapping in [`category_of`] is exhaustive over every
//! opcode value 0..=255 (unassigned/reserved values fall into [`OpcodeCategory::Other`])
//! and MUST stay stable: changing an opcode's category changes every fuzzy-mode
//! fingerprint that has ever been produced.

use std::fmt;

/// Semantic category used to normalize opcodes in fuzzy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeCategory {
    Load,
    Store,
    Invoke,
    Arith,
    Compare,
    Return,
    Field,
    Array,
    Control,
    New,
    Cast,
    Other,
}

impl fmt::Display for OpcodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OpcodeCategory::Load => "LOAD",
            OpcodeCategory::Store => "STORE",
            OpcodeCategory::Invoke => "INVOKE",
            OpcodeCategory::Arith => "ARITH",
            OpcodeCategory::Compare => "COMPARE",
            OpcodeCategory::Return => "RETURN",
            OpcodeCategory::Field => "FIELD",
            OpcodeCategory::Array => "ARRAY",
            OpcodeCategory::Control => "CONTROL",
            OpcodeCategory::New => "NEW",
            OpcodeCategory::Cast => "CAST",
            OpcodeCategory::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// Classifies a raw opcode byte into one of the twelve fuzzy-mode categories.
///
/// `wide`-prefixed instructions must be normalized to the opcode they widen
/// before calling this (see [`crate::code::Instruction`]), so `0xc4` never
/// reaches here in practice.
#[must_use]
pub fn category_of(opcode: u8) -> OpcodeCategory {
    use OpcodeCategory::*;
    match opcode {
        0x15..=0x19 | 0x1a..=0x2d => Load, // iload..aload, iload_0..aload_3
        0x36..=0x3a | 0x3b..=0x4e => Store, // istore..astore, istore_0..astore_3
        0x2e..=0x35 | 0x4f..=0x56 | 0xbc | 0xbd | 0xbe | 0xc5 => Array, // xaload/xastore, newarray family, arraylength
        0x60..=0x84 => Arith, // iadd..iinc (binary ops, negation, shifts, bitwise, iinc)
        0x85..=0x93 | 0xc0 | 0xc1 => Cast, // numeric conversions + checkcast/instanceof
        0x94..=0x98 => Compare, // lcmp, fcmpl/g, dcmpl/g
        0x99..=0xa6 | 0xa7..=0xa9 | 0xaa | 0xab | 0xbf | 0xc6..=0xc9 => Control, // if*, goto, jsr, ret, switches, athrow
        0xac..=0xb1 => Return,
        0xb2..=0xb5 => Field,
        0xb6..=0xba => Invoke,
        0xbb => New,
        _ => Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OpcodeCategory::*;

    #[test]
    fn every_opcode_has_exactly_one_category() {
        // category_of is a total function by construction (the match has a
        // catch-all), so this just pins a handful of well-known boundary cases.
        assert_eq!(category_of(0x84), Arith); // iinc
        assert_eq!(category_of(0xbc), Array); // newarray
        assert_eq!(category_of(0xbd), Array); // anewarray
        assert_eq!(category_of(0xc5), Array); // multianewarray
        assert_eq!(category_of(0xc0), Cast); // checkcast
        assert_eq!(category_of(0xc1), Cast); // instanceof
        assert_eq!(category_of(0x00), Other); // nop
        assert_eq!(category_of(0xba), Invoke); // invokedynamic
    }
}
