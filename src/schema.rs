//! Schema resolution and codec compilation.
//!
//! A schema description is a JSON document: a bare type-name string, a union
//! as an array of branch schemas, or an object with a `type` discriminant and
//! kind-specific keys. The [`Builder`] walks the description recursively and
//! assembles the codec arena, keeping a symbol table from fully-qualified
//! type name to arena index so named types can be referenced after their
//! definition.
//!
//! Named composite types reserve their arena slot and register their name
//! before their children compile. A field or branch that refers back to the
//! enclosing type therefore resolves to the reserved slot, which is filled in
//! once the children are done; this is what makes recursive schemas work
//! without a second pass.
//!
//! The builder, including its symbol table, lives for exactly one compile
//! call. Independent compilations share nothing.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::codec::{Codec, Node, NodeId, RecordField};
use crate::error::{Error, Result};

/// Compiles a parsed schema description into a codec.
pub(crate) fn compile(schema: &Json) -> Result<Codec> {
    let mut builder = Builder::new();
    let root = builder.build("", schema)?;
    builder.finish(root)
}

struct Builder {
    /// Arena under construction. `None` marks a reserved slot for a named
    /// type whose children are still compiling.
    nodes: Vec<Option<Node>>,
    /// Fully-qualified type name to arena index, pre-seeded with the
    /// primitive types under their bare names.
    symtab: HashMap<String, NodeId>,
}

impl Builder {
    fn new() -> Self {
        let mut builder = Self {
            nodes: Vec::new(),
            symtab: HashMap::new(),
        };
        for (name, node) in [
            ("null", Node::Null),
            ("boolean", Node::Boolean),
            ("int", Node::Int),
            ("long", Node::Long),
            ("float", Node::Float),
            ("double", Node::Double),
            ("bytes", Node::Bytes),
            ("string", Node::String),
        ] {
            let id = builder.add(node);
            builder.symtab.insert(name.to_string(), id);
        }
        builder
    }

    fn add(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    fn reserve(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(None);
        id
    }

    fn fill(&mut self, id: NodeId, node: Node) {
        self.nodes[id] = Some(node);
    }

    fn finish(self, root: NodeId) -> Result<Codec> {
        let nodes = self
            .nodes
            .into_iter()
            .collect::<Option<Vec<Node>>>()
            .ok_or_else(|| Error::schema("unresolved codec slot after compilation"))?;
        Ok(Codec { nodes, root })
    }

    /// Compiles one schema description within an enclosing namespace.
    fn build(&mut self, enclosing_ns: &str, schema: &Json) -> Result<NodeId> {
        match schema {
            Json::String(name) => self.resolve_name(enclosing_ns, name),
            Json::Array(branches) => self.build_union(enclosing_ns, branches),
            Json::Object(map) => match map.get("type") {
                None => Err(Error::schema("missing required key \"type\"")),
                Some(Json::String(kind)) => self.build_kind(enclosing_ns, kind, map),
                Some(nested @ (Json::Object(_) | Json::Array(_))) => {
                    self.build(enclosing_ns, nested)
                }
                Some(other) => Err(Error::schema(format!(
                    "key \"type\" ought to be a string, object, or array; received: {other}"
                ))),
            },
            other => Err(Error::schema(format!(
                "schema ought to be a string, object, or array; received: {other}"
            ))),
        }
    }

    fn build_kind(
        &mut self,
        enclosing_ns: &str,
        kind: &str,
        map: &serde_json::Map<String, Json>,
    ) -> Result<NodeId> {
        match kind {
            "null" | "boolean" | "int" | "long" | "float" | "double" | "bytes" | "string" => {
                self.resolve_name("", kind)
            }
            "array" => {
                let items = map
                    .get("items")
                    .ok_or_else(|| Error::schema("array ought to have items key"))?;
                let child = self
                    .build(enclosing_ns, items)
                    .map_err(|e| e.context("cannot compile array items"))?;
                Ok(self.add(Node::Array { items: child }))
            }
            "map" => {
                let values = map
                    .get("values")
                    .ok_or_else(|| Error::schema("map ought to have values key"))?;
                let child = self
                    .build(enclosing_ns, values)
                    .map_err(|e| e.context("cannot compile map values"))?;
                Ok(self.add(Node::Map { values: child }))
            }
            "fixed" => self.build_fixed(enclosing_ns, map),
            "enum" => self.build_enum(enclosing_ns, map),
            "record" => self.build_record(enclosing_ns, map),
            // Any other string in type position is a reference to a named
            // type, same as a bare name.
            other => self.resolve_name(enclosing_ns, other),
        }
    }

    /// Resolves a type-name reference through the symbol table.
    fn resolve_name(&self, enclosing_ns: &str, name: &str) -> Result<NodeId> {
        // Primitive names ignore namespaces entirely.
        if let Some(&id) = self.symtab.get(name) {
            if name_is_primitive(name) {
                return Ok(id);
            }
        }
        let full = qualify(enclosing_ns, name);
        self.symtab
            .get(&full)
            .copied()
            .ok_or_else(|| Error::schema(format!("unknown type name: {full:?}")))
    }

    /// Reads `name`/`namespace` from a named type's description, validates
    /// them, and registers the fully-qualified name against a reserved arena
    /// slot. Returns (full name, namespace for children, reserved slot).
    fn register_name(
        &mut self,
        enclosing_ns: &str,
        map: &serde_json::Map<String, Json>,
    ) -> Result<(String, String, NodeId)> {
        let name = match map.get("name") {
            Some(Json::String(s)) => s,
            Some(other) => {
                return Err(Error::schema(format!(
                    "name ought to be a string; received: {other}"
                )))
            }
            None => return Err(Error::schema("missing required key \"name\"")),
        };

        // A dotted name fixes its own namespace; otherwise the explicit
        // namespace attribute applies, else the enclosing namespace.
        let (namespace, short) = match name.rfind('.') {
            Some(idx) => (&name[..idx], &name[idx + 1..]),
            None => {
                let ns = match map.get("namespace") {
                    Some(Json::String(s)) => s.as_str(),
                    Some(other) => {
                        return Err(Error::schema(format!(
                            "namespace ought to be a string; received: {other}"
                        )))
                    }
                    None => enclosing_ns,
                };
                (ns, name.as_str())
            }
        };

        check_name(short)?;
        if !namespace.is_empty() {
            for part in namespace.split('.') {
                check_name(part)?;
            }
        }

        let full = qualify(namespace, short);
        if self.symtab.contains_key(&full) {
            return Err(Error::schema(format!("duplicate type name: {full:?}")));
        }
        let id = self.reserve();
        self.symtab.insert(full.clone(), id);
        Ok((full, namespace.to_string(), id))
    }

    fn build_fixed(
        &mut self,
        enclosing_ns: &str,
        map: &serde_json::Map<String, Json>,
    ) -> Result<NodeId> {
        let (full, _, id) = self.register_name(enclosing_ns, map)?;
        let size = match map.get("size") {
            Some(size) => size.as_u64().ok_or_else(|| {
                Error::schema(format!(
                    "fixed {full:?} size ought to be a non-negative integer; received: {size}"
                ))
            })?,
            None => {
                return Err(Error::schema(format!(
                    "fixed {full:?} ought to have size key"
                )))
            }
        };
        self.fill(
            id,
            Node::Fixed {
                name: full,
                size: size as usize,
            },
        );
        Ok(id)
    }

    fn build_enum(
        &mut self,
        enclosing_ns: &str,
        map: &serde_json::Map<String, Json>,
    ) -> Result<NodeId> {
        let (full, _, id) = self.register_name(enclosing_ns, map)?;
        let symbols_json = match map.get("symbols") {
            Some(Json::Array(symbols)) => symbols,
            Some(other) => {
                return Err(Error::schema(format!(
                    "enum {full:?} symbols ought to be an array; received: {other}"
                )))
            }
            None => {
                return Err(Error::schema(format!(
                    "enum {full:?} ought to have symbols key"
                )))
            }
        };
        if symbols_json.is_empty() {
            return Err(Error::schema(format!(
                "enum {full:?} ought to have at least one symbol"
            )));
        }

        let mut symbols = Vec::with_capacity(symbols_json.len());
        for symbol in symbols_json {
            let symbol = symbol.as_str().ok_or_else(|| {
                Error::schema(format!(
                    "enum {full:?} symbol ought to be a string; received: {symbol}"
                ))
            })?;
            check_name(symbol)
                .map_err(|e| e.context(format!("cannot compile enum {full:?}")))?;
            if symbols.iter().any(|s: &String| s == symbol) {
                return Err(Error::schema(format!(
                    "enum {full:?} has duplicate symbol {symbol:?}"
                )));
            }
            symbols.push(symbol.to_string());
        }
        self.fill(id, Node::Enum { name: full, symbols });
        Ok(id)
    }

    fn build_record(
        &mut self,
        enclosing_ns: &str,
        map: &serde_json::Map<String, Json>,
    ) -> Result<NodeId> {
        let (full, child_ns, id) = self.register_name(enclosing_ns, map)?;
        let fields_json = match map.get("fields") {
            Some(Json::Array(fields)) => fields,
            Some(other) => {
                return Err(Error::schema(format!(
                    "record {full:?} fields ought to be an array; received: {other}"
                )))
            }
            None => {
                return Err(Error::schema(format!(
                    "record {full:?} ought to have fields key"
                )))
            }
        };

        let mut fields: Vec<RecordField> = Vec::with_capacity(fields_json.len());
        for field in fields_json {
            let field = field.as_object().ok_or_else(|| {
                Error::schema(format!(
                    "record {full:?} field ought to be an object; received: {field}"
                ))
            })?;
            let name = match field.get("name") {
                Some(Json::String(s)) => s.clone(),
                Some(other) => {
                    return Err(Error::schema(format!(
                        "record {full:?} field name ought to be a string; received: {other}"
                    )))
                }
                None => {
                    return Err(Error::schema(format!(
                        "record {full:?} field ought to have name key"
                    )))
                }
            };
            check_name(&name).map_err(|e| e.context(format!("cannot compile record {full:?}")))?;
            if fields.iter().any(|f| f.name == name) {
                return Err(Error::schema(format!(
                    "record {full:?} has duplicate field {name:?}"
                )));
            }
            let schema = field.get("type").ok_or_else(|| {
                Error::schema(format!(
                    "record {full:?} field {name:?} ought to have type key"
                ))
            })?;
            let schema = self.build(&child_ns, schema).map_err(|e| {
                e.context(format!("cannot compile record {full:?} field {name:?}"))
            })?;
            fields.push(RecordField { name, schema });
        }
        self.fill(id, Node::Record { name: full, fields });
        Ok(id)
    }

    fn build_union(&mut self, enclosing_ns: &str, branches: &[Json]) -> Result<NodeId> {
        if branches.is_empty() {
            return Err(Error::schema("union ought to have at least one branch"));
        }
        let mut ids = Vec::with_capacity(branches.len());
        let mut keys: Vec<String> = Vec::with_capacity(branches.len());
        for (i, branch) in branches.iter().enumerate() {
            let id = self
                .build(enclosing_ns, branch)
                .map_err(|e| e.context(format!("cannot compile union branch {i}")))?;
            if matches!(self.nodes[id], Some(Node::Union { .. })) {
                return Err(Error::schema(
                    "union may not immediately contain another union",
                ));
            }
            let key = self.type_key(id);
            if keys.contains(&key) {
                return Err(Error::schema(format!(
                    "union has more than one {key:?} branch"
                )));
            }
            keys.push(key);
            ids.push(id);
        }
        Ok(self.add(Node::Union { branches: ids }))
    }

    /// Type key used for union duplicate detection: the kind name for
    /// anonymous types, the fully-qualified name for named ones. A reserved
    /// slot belongs to a named type mid-compilation; its name comes from the
    /// symbol table.
    fn type_key(&self, id: NodeId) -> String {
        match &self.nodes[id] {
            Some(node) => node.type_name().to_string(),
            None => self
                .symtab
                .iter()
                .find(|(_, &slot)| slot == id)
                .map(|(name, _)| name.clone())
                .unwrap_or_default(),
        }
    }
}

fn name_is_primitive(name: &str) -> bool {
    matches!(
        name,
        "null" | "boolean" | "int" | "long" | "float" | "double" | "bytes" | "string"
    )
}

/// Joins a namespace and a short name into a fully-qualified name.
fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() || name.contains('.') {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// A name starts with a letter or underscore, followed by letters, digits,
/// or underscores.
fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) => {
            (c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(Error::schema(format!("invalid name: {name:?}")));
    }
    Ok(())
}
