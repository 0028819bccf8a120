//! Class arena, name registry and overload resolution.

use std::collections::HashMap;
use std::rc::Rc;

use objectir_common::{ErrorKind, IrError, Result};
use objectir_ir::{
    normalize_type_name, simple_type_name, ClassId, Field, Method, TypeDef, TypeKind,
};
use tracing::debug;

/// Runtime class record. Base classes are linked lazily by name so
/// forward references between module types are fine.
pub struct ClassDef {
    pub kind: TypeKind,
    pub name: String,
    pub namespace: String,
    pub qualified: String,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub fields: Vec<Field>,
    pub methods: Vec<Rc<Method>>,
}

/// Location of a method: owning class + index into its method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodLoc {
    pub class: ClassId,
    pub index: usize,
}

/// Arena of classes keyed by simple, raw and qualified name. Later
/// registrations shadow earlier ones, which lets a module redefine a
/// library type.
#[derive(Default)]
pub struct ClassGraph {
    classes: Vec<ClassDef>,
    by_name: HashMap<String, ClassId>,
}

impl ClassGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: TypeDef) -> ClassId {
        let qualified = def.qualified_name();
        let raw = def.name.clone();
        let simple = simple_type_name(&raw).to_string();

        let id = ClassId(self.classes.len());
        self.classes.push(ClassDef {
            kind: def.kind,
            name: def.name,
            namespace: def.namespace,
            qualified: qualified.clone(),
            base: def.base,
            interfaces: def.interfaces,
            is_abstract: def.is_abstract,
            is_sealed: def.is_sealed,
            fields: def.fields,
            methods: def.methods.into_iter().map(Rc::new).collect(),
        });

        debug!(class = %qualified, id = id.0, "registered class");

        if !simple.is_empty() {
            self.by_name.insert(simple, id);
        }
        if !raw.is_empty() {
            self.by_name.insert(raw, id);
        }
        self.by_name.insert(qualified, id);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.0]
    }

    pub fn method(&self, loc: MethodLoc) -> &Rc<Method> {
        &self.classes[loc.class.0].methods[loc.index]
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        if let Some(id) = self.by_name.get(name) {
            return Some(*id);
        }
        // Qualified request whose simple component was registered alone.
        if let Some(dot) = name.rfind('.') {
            if let Some(id) = self.by_name.get(&name[dot + 1..]) {
                return Some(*id);
            }
        }
        // Unqualified request against a qualified registration.
        let suffix = format!(".{}", name);
        self.by_name
            .iter()
            .find(|(key, _)| key.ends_with(&suffix))
            .map(|(_, id)| *id)
    }

    pub fn get(&self, name: &str) -> Result<ClassId> {
        self.lookup(name)
            .ok_or_else(|| IrError::new(ErrorKind::NotFound, format!("Class not found: {}", name)))
    }

    pub fn base_of(&self, id: ClassId) -> Option<ClassId> {
        let base = self.classes[id.0].base.as_deref()?;
        self.lookup(base)
    }

    /// All classes on the inheritance chain, most derived first.
    pub fn ancestry(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(base) = self.base_of(current) {
            if chain.contains(&base) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// True when the class (or an ancestor or declared interface) answers
    /// to `target` (normalized; simple or qualified spelling).
    pub fn is_instance_of(&self, id: ClassId, target: &str) -> bool {
        let target = normalize_type_name(target);
        for cid in self.ancestry(id) {
            let class = self.class(cid);
            if class.qualified == target
                || class.name == target
                || simple_type_name(&class.qualified) == target
            {
                return true;
            }
            for iface in &class.interfaces {
                if *iface == target || simple_type_name(iface) == simple_type_name(&target) {
                    return true;
                }
            }
        }
        false
    }

    /// True when `name` is declared as a static field anywhere on the chain.
    pub fn has_static_field(&self, id: ClassId, name: &str) -> bool {
        self.ancestry(id)
            .iter()
            .any(|cid| self.class(*cid).fields.iter().any(|f| f.is_static && f.name == name))
    }

    /// Named methods of the class and its ancestors. Walking most derived
    /// first, an ancestor method whose signature an override already
    /// claimed is dropped, so overriding never reads as ambiguity.
    pub fn collect_methods_by_name(&self, id: ClassId, name: &str) -> Vec<MethodLoc> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for cid in self.ancestry(id) {
            for (index, method) in self.class(cid).methods.iter().enumerate() {
                if method.name != name {
                    continue;
                }
                let signature: Vec<String> =
                    method.params.iter().map(|p| p.ty.canonical_name()).collect();
                if seen.insert((method.is_static, signature.join(","))) {
                    out.push(MethodLoc { class: cid, index });
                }
            }
        }
        out
    }

    /// Registry key for a resolved method: `Qualified.Name(t1,t2)`.
    pub fn method_signature_key(&self, loc: MethodLoc) -> String {
        let class = self.class(loc.class);
        let method = &class.methods[loc.index];
        let params: Vec<String> = method.params.iter().map(|p| p.ty.canonical_name()).collect();
        format!("{}.{}({})", class.qualified, method.name, params.join(","))
    }
}

/// Requested type name vs a candidate's declared parameter type. Exact
/// normalized match, with a simple-name fallback when the request is
/// unqualified.
pub fn type_name_matches(requested: &str, declared: &str) -> bool {
    let requested = normalize_type_name(requested);
    if requested == declared {
        return true;
    }
    if !requested.contains('.') {
        return requested == simple_type_name(declared);
    }
    false
}

fn candidate_list(graph: &ClassGraph, candidates: &[MethodLoc]) -> String {
    let mut msg = String::new();
    for loc in candidates {
        msg.push_str("\n  - ");
        msg.push_str(&graph.method(*loc).signature_text());
    }
    msg
}

/// Overload resolution per the call-target contract: candidates are the
/// named methods of the class and its ancestors, filtered by call kind,
/// matched position-wise on normalized parameter types. One exact match
/// wins; several raise ambiguity; a lone arity match is a legacy
/// fallback.
pub fn resolve_overload(
    graph: &ClassGraph,
    class: ClassId,
    name: &str,
    parameter_types: &[String],
    require_static: bool,
) -> Result<MethodLoc> {
    let methods = graph.collect_methods_by_name(class, name);
    if methods.is_empty() {
        return Err(IrError::new(ErrorKind::NotFound, format!("Method not found: {}", name)));
    }

    let viable: Vec<MethodLoc> = methods
        .iter()
        .copied()
        .filter(|loc| graph.method(*loc).is_static == require_static)
        .collect();

    if parameter_types.is_empty() {
        if viable.len() == 1 {
            return Ok(viable[0]);
        }
        return Err(IrError::new(
            ErrorKind::AmbiguousOverload,
            format!(
                "Ambiguous overload for '{}'. Provide parameterTypes. Candidates:{}",
                name,
                candidate_list(graph, &viable)
            ),
        ));
    }

    let requested: Vec<String> = parameter_types.iter().map(|t| normalize_type_name(t)).collect();

    let exact: Vec<MethodLoc> = viable
        .iter()
        .copied()
        .filter(|loc| {
            let method = graph.method(*loc);
            method.params.len() == requested.len()
                && method
                    .params
                    .iter()
                    .zip(&requested)
                    .all(|(p, req)| type_name_matches(req, &p.ty.canonical_name()))
        })
        .collect();

    if exact.len() == 1 {
        return Ok(exact[0]);
    }
    if exact.len() > 1 {
        return Err(IrError::new(
            ErrorKind::AmbiguousOverload,
            format!(
                "Ambiguous overload for '{}' with provided signature. Candidates:{}",
                name,
                candidate_list(graph, &exact)
            ),
        ));
    }

    // Legacy fallback: a single candidate sharing the arity.
    let arity: Vec<MethodLoc> = viable
        .iter()
        .copied()
        .filter(|loc| graph.method(*loc).params.len() == requested.len())
        .collect();
    if arity.len() == 1 {
        return Ok(arity[0]);
    }

    Err(IrError::new(
        ErrorKind::NoMatchingOverload,
        format!(
            "No matching overload for '{}'. Candidates:{}",
            name,
            candidate_list(graph, &viable)
        ),
    ))
}
