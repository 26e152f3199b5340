#![forbid(unsafe_code)]

mod analyzer;
mod annotation;
mod classfile;
mod code;
mod constant_pool;
mod descriptor;
mod error;
mod external_refs;
mod opcode;
mod reader;

pub use crate::analyzer::{analyze_class, AnalyzerOptions, OpcodeMode};
pub use crate::annotation::{Annotation, ConstValue, ElementValue};
pub use crate::classfile::{ClassFile, ClassMember, InnerClassInfo};
pub use crate::code::{decode_instructions, Instruction};
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
pub use crate::opcode::{category_of, OpcodeCategory};

/// One analyzed class: the structural, API, and behavioral facts that a
/// fingerprint builder aggregates across a whole artifact.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub class_name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    pub annotations: Vec<String>,
    pub external_references: std::collections::BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    /// `name` concatenated with `descriptor`, used as the method's identity
    /// for signature hashing.
    pub signature: String,
    pub instruction_pattern: Option<String>,
    pub instruction_histogram: Option<std::collections::BTreeMap<String, u64>>,
}
