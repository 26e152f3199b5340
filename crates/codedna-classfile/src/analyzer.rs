//! Top-level entry point: turns the bytes of a single class file into a
//! [`ClassInfo`](crate::ClassInfo), the structural/API/behavioral summary
//! that `codedna-fingerprint` aggregates into a `CodeDNA`.
//!
//! This module is where the raw, format-faithful parse tree from
//! [`crate::classfile`] and [`crate::code`] gets turned into opinionated,
//! lossy facts: which references count as external, which method bodies are
//! boilerplate, and the hashed token pattern that represents a method's
//! behavior.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::classfile::{ClassFile, ClassMember};
use crate::code::{decode_instructions, Instruction};
use crate::constant_pool::ConstantPool;
use crate::descriptor::{parse_field_descriptor, parse_method_descriptor, ReturnType};
use crate::error::Result;
use crate::external_refs::{is_external, object_names_in};
use crate::opcode::category_of;
use crate::reader::Reader;
use crate::{ClassInfo, FieldInfo, MethodInfo};

/// Whether instruction tokens are the literal decimal opcode value (exact
/// mode, the default) or one of the twelve semantic category labels (fuzzy
/// mode). Fuzzy mode makes behavioral similarity resilient to
/// compiler/JDK-version churn that shuffles equivalent opcodes (e.g.
/// `iconst_0` vs `bipush 0`) without changing what a method does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeMode {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerOptions {
    pub opcode_mode: OpcodeMode,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            opcode_mode: OpcodeMode::Exact,
        }
    }
}

/// Parses `bytes` as a class file and reduces it to a [`ClassInfo`].
///
/// This re-parses the constant pool internally rather than threading it
/// through `ClassFile::parse`, since the raw parser and this higher-level
/// reduction serve different callers (the former is independently useful to
/// tooling that only wants the format-faithful structure).
pub fn analyze_class(bytes: &[u8], options: &AnalyzerOptions) -> Result<ClassInfo> {
    let class_file = ClassFile::parse(bytes)?;
    let mut reader = Reader::new(bytes);
    let _magic = reader.read_u4()?;
    let _minor = reader.read_u2()?;
    let _major = reader.read_u2()?;
    let cp = ConstantPool::parse(&mut reader)?;

    // Note: `super_name`/`interfaces` feed the structural dimension directly
    // (inheritance_hashes/interface_hashes in CodeDNA) and are not themselves
    // external-reference candidates; only annotations, field/method
    // descriptors, and method body instructions populate this set.
    let mut external_references = BTreeSet::new();

    let mut annotations = Vec::new();
    for ann in class_file
        .runtime_visible_annotations
        .iter()
        .chain(class_file.runtime_invisible_annotations.iter())
    {
        annotations.push(ann.type_descriptor.clone());
        if let Some(name) = &ann.type_internal_name {
            note_external(&mut external_references, name);
        }
    }

    let fields = class_file
        .fields
        .iter()
        .map(|f| {
            note_descriptor_references(&mut external_references, &f.descriptor);
            field_info(f)
        })
        .collect::<Vec<_>>();

    let methods = class_file
        .methods
        .iter()
        .map(|m| {
            note_descriptor_references(&mut external_references, &m.descriptor);
            method_info(m, &cp, options, &mut external_references)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ClassInfo {
        class_name: class_file.this_class,
        super_name: class_file.super_class,
        interfaces: class_file.interfaces,
        methods,
        fields,
        annotations,
        external_references,
    })
}

fn field_info(member: &ClassMember) -> FieldInfo {
    FieldInfo {
        name: member.name.clone(),
        descriptor: member.descriptor.clone(),
        access_flags: member.access_flags,
    }
}

fn method_info(
    member: &ClassMember,
    cp: &ConstantPool,
    options: &AnalyzerOptions,
    external_references: &mut BTreeSet<String>,
) -> Result<MethodInfo> {
    let (instruction_pattern, instruction_histogram) = match &member.code {
        None => (None, None),
        Some(code) => {
            let instructions = decode_instructions(code, cp)?;
            for instr in &instructions {
                note_instruction_references(external_references, instr);
            }
            let tokens = tokenize(&instructions, options.opcode_mode);
            let pattern = classify_pattern(&tokens, options.opcode_mode);
            let histogram = build_histogram(&tokens);
            (Some(pattern), Some(histogram))
        }
    };

    Ok(MethodInfo {
        name: member.name.clone(),
        descriptor: member.descriptor.clone(),
        access_flags: member.access_flags,
        signature: format!("{}{}", member.name, member.descriptor),
        instruction_pattern,
        instruction_histogram,
    })
}

fn tokenize(instructions: &[Instruction], mode: OpcodeMode) -> Vec<String> {
    instructions
        .iter()
        .map(|instr| match mode {
            OpcodeMode::Exact => instr.opcode().to_string(),
            OpcodeMode::Fuzzy => category_of(instr.opcode()).to_string(),
        })
        .collect()
}

const EMPTY_TOKEN: &str = "<empty>";

/// Builds `hash(token) -> count` over every token, or the single
/// `{hash("<empty>") -> 1}` marker entry when there are no tokens at all.
fn build_histogram(tokens: &[String]) -> BTreeMap<String, u64> {
    if tokens.is_empty() {
        let mut map = BTreeMap::new();
        map.insert(codedna_hash::digest(EMPTY_TOKEN), 1);
        return map;
    }
    let mut map = BTreeMap::new();
    for token in tokens {
        *map.entry(codedna_hash::digest(token)).or_insert(0) += 1;
    }
    map
}

/// Classifies a method body into its hashed behavioral pattern, after the
/// boilerplate filter.
fn classify_pattern(tokens: &[String], mode: OpcodeMode) -> String {
    if tokens.is_empty() {
        return codedna_hash::digest("EMPTY_METHOD");
    }
    if tokens.len() < 3 {
        return codedna_hash::digest(format!("TRIVIAL_METHOD:{}", tokens.join("-")));
    }

    let filtered: &[String] = if is_boilerplate_shape(tokens, mode) {
        &[]
    } else {
        tokens
    };

    if filtered.len() < 3 {
        return codedna_hash::digest(format!("BOILERPLATE_ONLY:{}", tokens.len()));
    }

    let grams = three_grams(filtered).join(",");
    codedna_hash::digest(grams)
}

fn three_grams(tokens: &[String]) -> Vec<String> {
    tokens.windows(3).map(|w| w.join("-")).collect()
}

/// Whether `tokens` (length already confirmed `>= 3`) is a simple
/// getter (load-this / read-field / typed-return) or setter (load-this /
/// write-field / void-return), per the boilerplate filter's length-`<= 5`
/// precondition.
///
/// In fuzzy mode the check only distinguishes the three semantic category
/// labels; in exact mode it requires the concrete opcodes the JDK compiler
/// emits for these shapes (`aload_0`, `getfield`/`putfield`,
/// `ireturn..areturn`/`return`).
fn is_boilerplate_shape(tokens: &[String], mode: OpcodeMode) -> bool {
    if tokens.len() > 5 {
        return false;
    }
    match mode {
        OpcodeMode::Fuzzy => {
            let categories: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            categories.contains("LOAD") && categories.contains("FIELD") && categories.contains("RETURN")
        }
        OpcodeMode::Exact => {
            const ALOAD_0: &str = "42";
            const GETFIELD: &str = "180";
            const PUTFIELD: &str = "181";
            const RETURN_VOID: &str = "177";
            const TYPED_RETURNS: [&str; 5] = ["172", "173", "174", "175", "176"];

            let has = |opcode: &str| tokens.iter().any(|t| t == opcode);
            let getter = has(ALOAD_0) && has(GETFIELD) && TYPED_RETURNS.iter().any(|r| has(r));
            let setter = has(ALOAD_0) && has(PUTFIELD) && has(RETURN_VOID);
            getter || setter
        }
    }
}

fn note_external(set: &mut BTreeSet<String>, internal_name: &str) {
    if is_external(internal_name) {
        set.insert(internal_name.to_string());
    }
}

fn note_descriptor_references(set: &mut BTreeSet<String>, descriptor: &str) {
    if let Ok(field_type) = parse_field_descriptor(descriptor) {
        for name in object_names_in(&field_type) {
            note_external(set, &name);
        }
        return;
    }
    if let Ok(method_descriptor) = parse_method_descriptor(descriptor) {
        for param in &method_descriptor.params {
            for name in object_names_in(param) {
                note_external(set, &name);
            }
        }
        if let ReturnType::Type(ty) = &method_descriptor.return_type {
            for name in object_names_in(ty) {
                note_external(set, &name);
            }
        }
    }
}

fn note_instruction_references(set: &mut BTreeSet<String>, instr: &Instruction) {
    match instr {
        Instruction::MethodCall {
            owner,
            name,
            descriptor,
            ..
        } => {
            if !owner.is_empty() && is_external(owner) {
                set.insert(format!("{owner}.{name}{descriptor}"));
            }
            note_descriptor_references(set, descriptor);
        }
        Instruction::FieldAccess { owner, name, .. } => {
            if is_external(owner) {
                set.insert(format!("{owner}.{name}"));
            }
        }
        Instruction::TypeRef { type_name, .. } => note_external(set, type_name),
        Instruction::Plain { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(bytes: &[u8], mode: OpcodeMode) -> ClassInfo {
        analyze_class(bytes, &AnalyzerOptions { opcode_mode: mode }).unwrap()
    }

    fn minimal_class_bytes(extra_methods: Vec<(&str, &str, Option<Vec<u8>>)>) -> Vec<u8> {
        // Hand-assembled minimal class file: `class Foo extends java/lang/Object`.
        let mut cp_entries: Vec<Vec<u8>> = Vec::new();
        let mut push_utf8 = |entries: &mut Vec<Vec<u8>>, s: &str| -> u16 {
            let mut entry = vec![1u8];
            entry.extend_from_slice(&(s.len() as u16).to_be_bytes());
            entry.extend_from_slice(s.as_bytes());
            entries.push(entry);
            entries.len() as u16
        };

        let foo_utf8 = push_utf8(&mut cp_entries, "Foo");
        let foo_class_idx = {
            let mut entry = vec![7u8];
            entry.extend_from_slice(&foo_utf8.to_be_bytes());
            cp_entries.push(entry);
            cp_entries.len() as u16
        };
        let obj_utf8 = push_utf8(&mut cp_entries, "java/lang/Object");
        let obj_class_idx = {
            let mut entry = vec![7u8];
            entry.extend_from_slice(&obj_utf8.to_be_bytes());
            cp_entries.push(entry);
            cp_entries.len() as u16
        };
        let desc_idx = push_utf8(&mut cp_entries, "()V");

        let mut method_name_indices = Vec::new();
        for (name, _, _) in &extra_methods {
            method_name_indices.push(push_utf8(&mut cp_entries, name));
        }
        let code_attr_name_idx = push_utf8(&mut cp_entries, "Code");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());

        let constant_pool_count = (cp_entries.len() + 1) as u16;
        out.extend_from_slice(&constant_pool_count.to_be_bytes());
        for entry in &cp_entries {
            out.extend_from_slice(entry);
        }

        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&foo_class_idx.to_be_bytes());
        out.extend_from_slice(&obj_class_idx.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        out.extend_from_slice(&(extra_methods.len() as u16).to_be_bytes());
        for (i, (_, _, code)) in extra_methods.iter().enumerate() {
            out.extend_from_slice(&0x0001u16.to_be_bytes());
            out.extend_from_slice(&method_name_indices[i].to_be_bytes());
            out.extend_from_slice(&desc_idx.to_be_bytes());
            match code {
                None => {
                    out.extend_from_slice(&0u16.to_be_bytes());
                }
                Some(code_bytes) => {
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&code_attr_name_idx.to_be_bytes());
                    let mut attr_body = Vec::new();
                    attr_body.extend_from_slice(&4u16.to_be_bytes());
                    attr_body.extend_from_slice(&1u16.to_be_bytes());
                    attr_body.extend_from_slice(&(code_bytes.len() as u32).to_be_bytes());
                    attr_body.extend_from_slice(code_bytes);
                    attr_body.extend_from_slice(&0u16.to_be_bytes());
                    attr_body.extend_from_slice(&0u16.to_be_bytes());
                    out.extend_from_slice(&(attr_body.len() as u32).to_be_bytes());
                    out.extend_from_slice(&attr_body);
                }
            }
        }

        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    #[test]
    fn super_class_is_not_external_for_java_lang_object() {
        let bytes = minimal_class_bytes(vec![]);
        let info = analyze(&bytes, OpcodeMode::Exact);
        assert_eq!(info.super_name.as_deref(), Some("java/lang/Object"));
        assert!(!info.external_references.contains("java/lang/Object"));
    }

    #[test]
    fn abstract_method_has_no_instruction_data() {
        let bytes = minimal_class_bytes(vec![("doThing", "()V", None)]);
        let info = analyze(&bytes, OpcodeMode::Exact);
        let m = &info.methods[0];
        assert_eq!(m.instruction_pattern, None);
        assert_eq!(m.instruction_histogram, None);
    }

    #[test]
    fn empty_code_uses_empty_method_marker() {
        let bytes = minimal_class_bytes(vec![("weird", "()V", Some(vec![]))]);
        let info = analyze(&bytes, OpcodeMode::Exact);
        let m = &info.methods[0];
        assert_eq!(
            m.instruction_pattern.as_deref(),
            Some(codedna_hash::digest("EMPTY_METHOD").as_str())
        );
        assert_eq!(
            m.instruction_histogram
                .as_ref()
                .unwrap()
                .get(&codedna_hash::digest(EMPTY_TOKEN)),
            Some(&1)
        );
    }

    #[test]
    fn trivial_method_hashes_the_dash_joined_tokens() {
        // iconst_0, ireturn: 2 tokens, below the trivial-method threshold.
        let bytes = minimal_class_bytes(vec![("two", "()V", Some(vec![0x03, 0xac]))]);
        let info = analyze(&bytes, OpcodeMode::Exact);
        let expected = codedna_hash::digest("TRIVIAL_METHOD:3-172");
        assert_eq!(info.methods[0].instruction_pattern.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn getter_shape_collapses_to_boilerplate_marker_in_fuzzy_mode() {
        assert!(is_boilerplate_shape(
            &["LOAD".into(), "FIELD".into(), "RETURN".into()],
            OpcodeMode::Fuzzy
        ));
        let pattern = classify_pattern(
            &["LOAD".into(), "FIELD".into(), "RETURN".into()],
            OpcodeMode::Fuzzy,
        );
        assert_eq!(pattern, codedna_hash::digest("BOILERPLATE_ONLY:3"));
    }

    #[test]
    fn setter_shape_collapses_to_boilerplate_marker_in_exact_mode() {
        // aload_0, iload_1, putfield, return
        let tokens: Vec<String> = vec!["42".into(), "27".into(), "181".into(), "177".into()];
        assert!(is_boilerplate_shape(&tokens, OpcodeMode::Exact));
        let pattern = classify_pattern(&tokens, OpcodeMode::Exact);
        assert_eq!(pattern, codedna_hash::digest("BOILERPLATE_ONLY:4"));
    }

    #[test]
    fn longer_bodies_hash_the_joined_three_grams() {
        let tokens: Vec<String> = vec!["1".into(), "2".into(), "3".into(), "4".into()];
        let pattern = classify_pattern(&tokens, OpcodeMode::Exact);
        assert_eq!(pattern, codedna_hash::digest("1-2-3,2-3-4"));
    }

    #[test]
    fn boilerplate_shape_outside_length_bound_is_not_filtered() {
        // Six tokens containing the getter shape but over the length-5 cap.
        let tokens: Vec<String> = vec![
            "LOAD".into(),
            "FIELD".into(),
            "LOAD".into(),
            "FIELD".into(),
            "ARITH".into(),
            "RETURN".into(),
        ];
        assert!(!is_boilerplate_shape(&tokens, OpcodeMode::Fuzzy));
    }

    // Zero-operand opcodes only, so arbitrary sequences never run past the
    // end of the code array: nop, aconst_null, iconst_m1, iconst_0, iconst_1,
    // pop, ireturn.
    const ZERO_OPERAND_OPCODES: [u8; 7] = [0x00, 0x01, 0x02, 0x03, 0x04, 0x57, 0xac];

    proptest::proptest! {
        /// §8 property 1 (determinism): analyzing the same bytes twice, in
        /// either opcode mode, produces the same pattern and histogram.
        #[test]
        fn analyze_class_is_deterministic(
            code in proptest::collection::vec(
                proptest::sample::select(ZERO_OPERAND_OPCODES.to_vec()),
                0..16,
            ),
            mode in proptest::prop_oneof![
                proptest::strategy::Just(OpcodeMode::Exact),
                proptest::strategy::Just(OpcodeMode::Fuzzy),
            ],
        ) {
            let bytes = minimal_class_bytes(vec![("m", "()V", Some(code))]);
            let first = analyze(&bytes, mode);
            let second = analyze(&bytes, mode);
            proptest::prop_assert_eq!(
                &first.methods[0].instruction_pattern,
                &second.methods[0].instruction_pattern
            );
            proptest::prop_assert_eq!(
                &first.methods[0].instruction_histogram,
                &second.methods[0].instruction_histogram
            );
        }

        /// §8 property 2 (order independence): which of two methods with
        /// distinct bodies comes first in the class file must not affect
        /// either method's own extracted pattern/histogram.
        #[test]
        fn method_order_does_not_affect_per_method_results(
            code_a in proptest::collection::vec(
                proptest::sample::select(ZERO_OPERAND_OPCODES.to_vec()),
                0..8,
            ),
            code_b in proptest::collection::vec(
                proptest::sample::select(ZERO_OPERAND_OPCODES.to_vec()),
                0..8,
            ),
        ) {
            let forward = minimal_class_bytes(vec![
                ("a", "()V", Some(code_a.clone())),
                ("b", "()V", Some(code_b.clone())),
            ]);
            let backward = minimal_class_bytes(vec![
                ("b", "()V", Some(code_b)),
                ("a", "()V", Some(code_a)),
            ]);

            let fwd = analyze(&forward, OpcodeMode::Exact);
            let bwd = analyze(&backward, OpcodeMode::Exact);

            let fwd_a = fwd.methods.iter().find(|m| m.name == "a").unwrap();
            let bwd_a = bwd.methods.iter().find(|m| m.name == "a").unwrap();
            proptest::prop_assert_eq!(&fwd_a.instruction_pattern, &bwd_a.instruction_pattern);
            proptest::prop_assert_eq!(&fwd_a.instruction_histogram, &bwd_a.instruction_histogram);
        }
    }
}
