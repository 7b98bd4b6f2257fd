//! Compiled codecs.
//!
//! A [`Codec`] is the immutable result of one schema compilation: an arena of
//! type nodes addressed by index, plus the index of the root. Child links are
//! arena indices rather than owned pointers, so a named type whose fields
//! refer back to itself is just a node holding its own index; no ownership
//! cycle exists and the whole tree is `Send + Sync` for free.
//!
//! After compilation a codec exposes exactly two runtime operations, `decode`
//! and `encode`, both safe to call concurrently from any number of threads.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::value::Value;
use crate::wire::{MAX_BLOCK_COUNT, MAX_BLOCK_SIZE};
use crate::writer::Writer;

/// Index of a node within its codec's arena.
pub(crate) type NodeId = usize;

/// One record field: name plus the arena index of its type.
#[derive(Debug)]
pub(crate) struct RecordField {
    pub(crate) name: String,
    pub(crate) schema: NodeId,
}

/// One compiled schema node. The set of kinds is closed.
#[derive(Debug)]
pub(crate) enum Node {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed { name: String, size: usize },
    Enum { name: String, symbols: Vec<String> },
    Array { items: NodeId },
    Map { values: NodeId },
    Union { branches: Vec<NodeId> },
    Record { name: String, fields: Vec<RecordField> },
}

impl Node {
    /// Display name for diagnostics: the fully-qualified name for named
    /// types, the kind name otherwise.
    pub(crate) fn type_name(&self) -> &str {
        match self {
            Node::Null => "null",
            Node::Boolean => "boolean",
            Node::Int => "int",
            Node::Long => "long",
            Node::Float => "float",
            Node::Double => "double",
            Node::Bytes => "bytes",
            Node::String => "string",
            Node::Array { .. } => "array",
            Node::Map { .. } => "map",
            Node::Union { .. } => "union",
            Node::Fixed { name, .. } | Node::Enum { name, .. } | Node::Record { name, .. } => name,
        }
    }
}

/// A compiled, immutable codec for one schema.
///
/// Compile once with [`Codec::new`], then share freely: all state is
/// read-only and every `decode`/`encode` call owns its own buffers.
#[derive(Debug)]
pub struct Codec {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Codec {
    /// Compiles a codec from schema JSON text.
    pub fn new(schema_json: &str) -> Result<Self> {
        let schema: serde_json::Value = serde_json::from_str(schema_json)
            .map_err(|e| Error::schema(format!("cannot parse schema JSON: {e}")))?;
        Self::from_value(&schema)
    }

    /// Compiles a codec from an already-parsed schema description.
    pub fn from_value(schema: &serde_json::Value) -> Result<Self> {
        crate::schema::compile(schema)
    }

    /// Display name of the root type.
    pub fn name(&self) -> &str {
        self.nodes[self.root].type_name()
    }

    /// Decodes one datum from the front of `buf`.
    ///
    /// Returns the decoded value and the unconsumed remainder. On any error
    /// the caller's slice is untouched; nothing is partially consumed.
    pub fn decode<'a>(&self, buf: &'a [u8]) -> Result<(Value, &'a [u8])> {
        let mut reader = Reader::new(buf);
        let value = self.decode_node(self.root, &mut reader)?;
        Ok((value, reader.rest()))
    }

    /// Encodes `datum` into a fresh buffer.
    pub fn encode(&self, datum: &Value) -> Result<Vec<u8>> {
        self.encode_append(Vec::new(), datum)
    }

    /// Encodes `datum`, appending to a caller-supplied buffer.
    ///
    /// Ownership of the buffer transfers in and back out; the returned vector
    /// may reuse the same backing storage or a freshly grown one.
    pub fn encode_append(&self, buf: Vec<u8>, datum: &Value) -> Result<Vec<u8>> {
        let mut writer = Writer::from_vec(buf);
        self.encode_node(self.root, &mut writer, datum)?;
        Ok(writer.into_bytes())
    }

    fn decode_node(&self, id: NodeId, reader: &mut Reader<'_>) -> Result<Value> {
        match &self.nodes[id] {
            Node::Null => Ok(Value::Null),
            Node::Boolean => Ok(Value::Boolean(reader.read_boolean()?)),
            Node::Int => Ok(Value::Long(reader.read_int()? as i64)),
            Node::Long => Ok(Value::Long(reader.read_long()?)),
            Node::Float => Ok(Value::Double(reader.read_float()? as f64)),
            Node::Double => Ok(Value::Double(reader.read_double()?)),
            Node::Bytes => Ok(Value::Bytes(reader.read_length_prefixed_bytes()?.to_vec())),
            Node::String => Ok(Value::String(reader.read_string()?.to_string())),
            Node::Fixed { name, size } => {
                let bytes = reader
                    .read_bytes(*size)
                    .map_err(|e| e.context(format!("cannot decode fixed {name}")))?;
                Ok(Value::Bytes(bytes.to_vec()))
            }
            Node::Enum { name, symbols } => {
                let index = reader
                    .read_long()
                    .map_err(|e| e.context(format!("cannot decode enum {name} index")))?;
                let symbol = usize::try_from(index)
                    .ok()
                    .and_then(|i| symbols.get(i))
                    .ok_or_else(|| {
                        Error::malformed(format!(
                            "enum {name} index {index} out of range 0..{}",
                            symbols.len()
                        ))
                    })?;
                Ok(Value::String(symbol.clone()))
            }
            Node::Array { items } => {
                let mut values = Vec::new();
                self.decode_blocks("array", reader, |codec, r| {
                    values.push(codec.decode_node(*items, r)?);
                    Ok(())
                })?;
                Ok(Value::Array(values))
            }
            Node::Map { values } => {
                let mut entries = IndexMap::new();
                self.decode_blocks("map", reader, |codec, r| {
                    let key = r
                        .read_string()
                        .map_err(|e| e.context("cannot decode map key"))?
                        .to_string();
                    let value = codec.decode_node(*values, r)?;
                    entries.insert(key, value);
                    Ok(())
                })?;
                Ok(Value::Map(entries))
            }
            Node::Union { branches } => {
                let index = reader
                    .read_long()
                    .map_err(|e| e.context("cannot decode union branch index"))?;
                let branch = usize::try_from(index)
                    .ok()
                    .and_then(|i| branches.get(i))
                    .ok_or_else(|| {
                        Error::malformed(format!(
                            "union branch index {index} out of range 0..{}",
                            branches.len()
                        ))
                    })?;
                self.decode_node(*branch, reader)
                    .map_err(|e| e.context(format!("cannot decode union branch {index}")))
            }
            Node::Record { name, fields } => {
                let mut entries = IndexMap::with_capacity(fields.len());
                for (i, field) in fields.iter().enumerate() {
                    let value = self.decode_node(field.schema, reader).map_err(|e| {
                        e.context(format!(
                            "cannot decode record {name}: field {} (index {i})",
                            field.name
                        ))
                    })?;
                    entries.insert(field.name.clone(), value);
                }
                Ok(Value::Map(entries))
            }
        }
    }

    /// Shared decode loop for the array/map block protocol.
    ///
    /// Reads counted blocks until the zero-count terminator. A negative count
    /// is negated and followed by a block byte size on the wire; the size is
    /// only there for readers that want to skip the block, so it is validated
    /// and discarded while the items are decoded normally.
    fn decode_blocks<'a>(
        &self,
        what: &str,
        reader: &mut Reader<'a>,
        mut decode_item: impl FnMut(&Self, &mut Reader<'a>) -> Result<()>,
    ) -> Result<()> {
        loop {
            let mut count = reader
                .read_long()
                .map_err(|e| e.context(format!("cannot decode {what} block count")))?;
            if count == 0 {
                return Ok(());
            }
            if count < 0 {
                count = count.checked_neg().ok_or_else(|| {
                    Error::malformed(format!("cannot decode {what}: block count {count} out of range"))
                })?;
                let size = reader
                    .read_long()
                    .map_err(|e| e.context(format!("cannot decode {what} block size")))?;
                if !(0..=MAX_BLOCK_SIZE).contains(&size) {
                    return Err(Error::malformed(format!(
                        "cannot decode {what}: block size {size} out of range"
                    )));
                }
            }
            if count > MAX_BLOCK_COUNT {
                return Err(Error::malformed(format!(
                    "cannot decode {what}: block count {count} exceeds maximum {MAX_BLOCK_COUNT}"
                )));
            }
            for i in 0..count {
                decode_item(self, reader)
                    .map_err(|e| e.context(format!("cannot decode {what} item {i}")))?;
            }
        }
    }

    fn encode_node(&self, id: NodeId, writer: &mut Writer, datum: &Value) -> Result<()> {
        let node = &self.nodes[id];
        match node {
            Node::Null => match datum {
                Value::Null => Ok(()),
                other => Err(mismatch("null", other)),
            },
            Node::Boolean => {
                let b = datum.as_boolean().ok_or_else(|| mismatch("boolean", datum))?;
                writer.write_boolean(b);
                Ok(())
            }
            Node::Int => {
                let n = datum.as_long().ok_or_else(|| mismatch("int", datum))?;
                let n = i32::try_from(n).map_err(|_| {
                    Error::type_mismatch(format!("value {n} out of range for int"))
                })?;
                writer.write_int(n);
                Ok(())
            }
            Node::Long => {
                let n = datum.as_long().ok_or_else(|| mismatch("long", datum))?;
                writer.write_long(n);
                Ok(())
            }
            Node::Float => {
                let x = datum.as_double().ok_or_else(|| mismatch("float", datum))?;
                writer.write_float(x as f32);
                Ok(())
            }
            Node::Double => {
                let x = datum.as_double().ok_or_else(|| mismatch("double", datum))?;
                writer.write_double(x);
                Ok(())
            }
            Node::Bytes => {
                let bytes = datum.as_bytes().ok_or_else(|| mismatch("bytes", datum))?;
                writer.write_length_prefixed_bytes(bytes);
                Ok(())
            }
            Node::String => {
                let s = datum.as_str().ok_or_else(|| mismatch("string", datum))?;
                writer.write_string(s);
                Ok(())
            }
            Node::Fixed { name, size } => {
                let bytes = datum.as_bytes().ok_or_else(|| mismatch(name, datum))?;
                if bytes.len() != *size {
                    return Err(Error::type_mismatch(format!(
                        "fixed {name} requires exactly {size} bytes, received {}",
                        bytes.len()
                    )));
                }
                writer.write_raw(bytes);
                Ok(())
            }
            Node::Enum { name, symbols } => {
                let symbol = datum.as_str().ok_or_else(|| mismatch(name, datum))?;
                let index = symbols
                    .iter()
                    .position(|s| s == symbol)
                    .ok_or_else(|| {
                        Error::type_mismatch(format!("enum {name} has no symbol {symbol:?}"))
                    })?;
                writer.write_long(index as i64);
                Ok(())
            }
            Node::Array { items } => {
                let values = datum.as_array().ok_or_else(|| mismatch("array", datum))?;
                if !values.is_empty() {
                    writer.write_long(values.len() as i64);
                    for (i, item) in values.iter().enumerate() {
                        self.encode_node(*items, writer, item)
                            .map_err(|e| e.context(format!("cannot encode array item {i}")))?;
                    }
                }
                writer.write_long(0);
                Ok(())
            }
            Node::Map { values } => {
                let entries = datum.as_map().ok_or_else(|| mismatch("map", datum))?;
                if !entries.is_empty() {
                    writer.write_long(entries.len() as i64);
                    for (key, value) in entries {
                        writer.write_string(key);
                        self.encode_node(*values, writer, value)
                            .map_err(|e| e.context(format!("cannot encode map value for key {key:?}")))?;
                    }
                }
                writer.write_long(0);
                Ok(())
            }
            Node::Union { branches } => {
                for (i, &branch) in branches.iter().enumerate() {
                    if self.branch_matches(branch, datum) {
                        writer.write_long(i as i64);
                        return self
                            .encode_node(branch, writer, datum)
                            .map_err(|e| e.context(format!("cannot encode union branch {i}")));
                    }
                }
                Err(Error::type_mismatch(format!(
                    "no union branch matches {} datum",
                    datum.kind()
                )))
            }
            Node::Record { name, fields } => {
                let entries = datum.as_map().ok_or_else(|| mismatch(name, datum))?;
                for (i, field) in fields.iter().enumerate() {
                    let value = entries.get(&field.name).ok_or_else(|| {
                        Error::type_mismatch(format!(
                            "record {name} datum is missing field {} (index {i})",
                            field.name
                        ))
                    })?;
                    self.encode_node(field.schema, writer, value).map_err(|e| {
                        e.context(format!(
                            "cannot encode record {name}: field {} (index {i})",
                            field.name
                        ))
                    })?;
                }
                Ok(())
            }
        }
    }

    /// Tests whether `datum`'s shape is acceptable to the branch node.
    /// Union encode picks the first declared branch that matches.
    fn branch_matches(&self, id: NodeId, datum: &Value) -> bool {
        match (&self.nodes[id], datum) {
            (Node::Null, Value::Null) => true,
            (Node::Boolean, Value::Boolean(_)) => true,
            (Node::Int, Value::Long(n)) => i32::try_from(*n).is_ok(),
            (Node::Long, Value::Long(_)) => true,
            (Node::Float | Node::Double, Value::Double(_)) => true,
            (Node::Bytes, Value::Bytes(_)) => true,
            (Node::String, Value::String(_)) => true,
            (Node::Fixed { size, .. }, Value::Bytes(b)) => b.len() == *size,
            (Node::Enum { symbols, .. }, Value::String(s)) => symbols.iter().any(|sym| sym == s),
            (Node::Array { .. }, Value::Array(_)) => true,
            (Node::Map { .. } | Node::Record { .. }, Value::Map(_)) => true,
            _ => false,
        }
    }
}

fn mismatch(expected: &str, datum: &Value) -> Error {
    Error::type_mismatch(format!("cannot encode {expected}: received {}", datum.kind()))
}
