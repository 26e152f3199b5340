//! The external-reference rule: which internal type names count as
//! references to code outside the plugin itself.
//!
//! An internal name is external unless it falls under the JDK or Kotlin
//! standard library namespaces. Everything else — other plugins' packages,
//! third-party libraries, the platform API the plugin is built against —
//! counts, since it is what distinguishes one plugin's surface from
//! another's.

const STDLIB_PREFIXES: [&str; 3] = ["java/", "javax/", "kotlin/"];

/// Whether an internal class name (e.g. `com/example/Foo`, `java/util/List`)
/// is considered external, i.e. not part of the JDK or Kotlin stdlib.
#[must_use]
pub fn is_external(internal_name: &str) -> bool {
    !STDLIB_PREFIXES.iter().any(|p| internal_name.starts_with(p))
}

/// Recursively collects every `Object` internal name embedded in a
/// [`crate::descriptor::FieldType`], unwrapping arrays of arbitrary depth.
pub fn object_names_in(field_type: &crate::descriptor::FieldType) -> Vec<String> {
    use crate::descriptor::FieldType;
    match field_type {
        FieldType::Base(_) => Vec::new(),
        FieldType::Object(name) => vec![name.clone()],
        FieldType::Array(inner) => object_names_in(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jdk_and_kotlin_namespaces_are_not_external() {
        assert!(!is_external("java/util/List"));
        assert!(!is_external("javax/swing/JFrame"));
        assert!(!is_external("kotlin/collections/List"));
    }

    #[test]
    fn everything_else_is_external() {
        assert!(is_external("com/example/plugin/Foo"));
        assert!(is_external("org/bukkit/entity/Player"));
        assert!(is_external(""));
    }
}
