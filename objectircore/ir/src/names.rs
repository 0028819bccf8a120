//! Type-name normalization shared by every comparison in the runtime.

/// Folds primitive aliases and fully-qualified CLR-style names into the
/// canonical spelling. Non-primitive names keep their original case
/// (class names are case-sensitive). Idempotent.
pub fn normalize_type_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(elem) = trimmed.strip_suffix("[]") {
        return format!("{}[]", normalize_type_name(elem));
    }

    let lower = trimmed.to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "system.void" | "void" => "void",
        "system.string" | "string" => "string",
        "system.boolean" | "boolean" | "bool" => "bool",
        "system.sbyte" | "sbyte" | "int8" => "int8",
        "system.byte" | "byte" | "uint8" => "uint8",
        "system.int16" | "short" | "int16" => "int16",
        "system.uint16" | "ushort" | "uint16" => "uint16",
        "system.int32" | "int" | "int32" => "int32",
        "system.uint32" | "uint" | "uint32" => "uint32",
        "system.int64" | "long" | "int64" => "int64",
        "system.uint64" | "ulong" | "uint64" => "uint64",
        "system.single" | "single" | "float" | "float32" => "float32",
        "system.double" | "double" | "float64" => "float64",
        "system.char" | "char" => "char",
        "system.object" | "object" => "object",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

pub fn normalize_type_names(raw: &[String]) -> Vec<String> {
    raw.iter().map(|n| normalize_type_name(n)).collect()
}

/// Joins a namespace and a type name; a name that already carries dots is
/// treated as qualified when the namespace is empty.
pub fn qualified_type_name(name: &str, namespace: &str) -> String {
    if namespace.is_empty() {
        return name.to_string();
    }
    let simple = simple_type_name(name);
    format!("{}.{}", namespace, simple)
}

/// The `.Name` component of a possibly-qualified type name.
pub fn simple_type_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[dot + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical() {
        assert_eq!(normalize_type_name("System.Int32"), "int32");
        assert_eq!(normalize_type_name("int"), "int32");
        assert_eq!(normalize_type_name("Boolean"), "bool");
        assert_eq!(normalize_type_name("System.Single"), "float32");
        assert_eq!(normalize_type_name("double"), "float64");
        assert_eq!(normalize_type_name("byte"), "uint8");
        assert_eq!(normalize_type_name(" System.Object "), "object");
    }

    #[test]
    fn class_names_keep_their_case() {
        assert_eq!(normalize_type_name("Program"), "Program");
        assert_eq!(normalize_type_name("Demo.Widget"), "Demo.Widget");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["System.Int32", "long", "float", "Program", "string[]", "System.Double"] {
            let once = normalize_type_name(raw);
            assert_eq!(normalize_type_name(&once), once);
        }
    }

    #[test]
    fn array_suffix_normalizes_element() {
        assert_eq!(normalize_type_name("System.String[]"), "string[]");
    }

    #[test]
    fn qualified_and_simple_names() {
        assert_eq!(qualified_type_name("Console", "System"), "System.Console");
        assert_eq!(qualified_type_name("System.Console", ""), "System.Console");
        assert_eq!(qualified_type_name("System.Console", "System"), "System.Console");
        assert_eq!(simple_type_name("System.Console"), "Console");
        assert_eq!(simple_type_name("Program"), "Program");
    }
}
