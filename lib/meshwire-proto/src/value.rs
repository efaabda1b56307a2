//! `Value`: a typed node in the recursive tree a `Container` carries
//! (spec.md §3.1, §4.1). Grounded on `flux::shared::{Serialize, Deserialize}`
//! for the manual-codec idiom and on `original_source/container/value.cpp`
//! for the exact escape/base64 split between stored payload and wire text.
//!
//! The acyclic-parent invariant (§3.1) is enforced structurally here rather
//! than at runtime: `children` is an owned `Vec<Value>`, so a cycle through
//! parent links is simply not representable. Upward navigation, where it is
//! needed, goes through `Container`'s path-based lookup (see `container.rs`)
//! rather than a stored back-pointer on `Value` itself — the systems-language
//! realization of the "non-owning parent handle" design note.

use byteorder::{ByteOrder, LittleEndian};
use meshwire_support::encoding::{base64, escape, unescape};
use meshwire_support::{MeshError, MeshResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Null = 0,
    Bool = 1,
    I16 = 2,
    U16 = 3,
    I32 = 4,
    U32 = 5,
    I64 = 6,
    U64 = 7,
    I128 = 8,
    U128 = 9,
    F32 = 10,
    F64 = 11,
    Bytes = 12,
    String = 13,
    Container = 14,
}

impl ValueType {
    pub fn type_text(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::I16 => "i16",
            ValueType::U16 => "u16",
            ValueType::I32 => "i32",
            ValueType::U32 => "u32",
            ValueType::I64 => "i64",
            ValueType::U64 => "u64",
            ValueType::I128 => "i128",
            ValueType::U128 => "u128",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Bytes => "bytes",
            ValueType::String => "string",
            ValueType::Container => "container",
        }
    }

    pub fn from_type_text(text: &str) -> Option<ValueType> {
        Some(match text {
            "null" => ValueType::Null,
            "bool" => ValueType::Bool,
            "i16" => ValueType::I16,
            "u16" => ValueType::U16,
            "i32" => ValueType::I32,
            "u32" => ValueType::U32,
            "i64" => ValueType::I64,
            "u64" => ValueType::U64,
            "i128" => ValueType::I128,
            "u128" => ValueType::U128,
            "f32" => ValueType::F32,
            "f64" => ValueType::F64,
            "bytes" => ValueType::Bytes,
            "string" => ValueType::String,
            "container" => ValueType::Container,
            _ => return None,
        })
    }

    /// Fixed payload width in bytes, or `None` for variable-length types.
    fn fixed_width(self) -> Option<usize> {
        match self {
            ValueType::Null => Some(0),
            ValueType::Bool => Some(1),
            ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::I64 | ValueType::U64 | ValueType::F64 | ValueType::Container => Some(8),
            ValueType::I128 | ValueType::U128 => Some(16),
            ValueType::Bytes | ValueType::String => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    name: String,
    type_tag: ValueType,
    payload: Vec<u8>,
    children: Vec<Value>,
}

impl Value {
    /// Raw constructor (name, data, size, type) from spec.md §4.1.
    pub fn from_raw(name: impl Into<String>, data: &[u8], size: usize, type_tag: ValueType) -> Value {
        Value {
            name: name.into(),
            type_tag,
            payload: data[..size].to_vec(),
            children: Vec::new(),
        }
    }

    pub fn null(name: impl Into<String>) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::Null,
            payload: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn bool(name: impl Into<String>, v: bool) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::Bool,
            payload: vec![v as u8],
            children: Vec::new(),
        }
    }

    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::Bytes,
            payload: data,
            children: Vec::new(),
        }
    }

    /// The payload for a `string` value is stored as raw UTF-8 — the escape
    /// table in §3.1 only applies to the *wire text* representation.
    pub fn string(name: impl Into<String>, text: impl Into<String>) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::String,
            payload: text.into().into_bytes(),
            children: Vec::new(),
        }
    }

    /// Constructs a container-typed value from (name, children); the payload
    /// encodes the declared child count as a signed 64-bit integer per
    /// §3.1's invariant.
    pub fn container(name: impl Into<String>, children: Vec<Value>) -> Value {
        let mut payload = [0u8; 8];
        LittleEndian::write_i64(&mut payload, children.len() as i64);
        Value {
            name: name.into(),
            type_tag: ValueType::Container,
            payload: payload.to_vec(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.type_tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn children(&self) -> &[Value] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Value> {
        &mut self.children
    }

    /// Children that are themselves container-typed (spec.md §4.1's
    /// `children(only_container)` split from the original).
    pub fn container_children(&self) -> impl Iterator<Item = &Value> {
        self.children.iter().filter(|c| c.type_tag == ValueType::Container)
    }

    /// The child count declared in a container value's payload. Only
    /// meaningful when `value_type() == ValueType::Container`.
    pub fn declared_child_count(&self) -> i64 {
        if self.payload.len() >= 8 {
            LittleEndian::read_i64(&self.payload)
        } else {
            0
        }
    }

    /// Structural invariant check from spec.md §3.1.
    pub fn is_well_formed(&self) -> bool {
        let width_ok = match self.type_tag.fixed_width() {
            Some(w) => self.payload.len() == w,
            None => true,
        };
        let children_ok = if self.type_tag == ValueType::Container {
            self.declared_child_count() as usize == self.children.len()
        } else {
            self.children.is_empty()
        };
        width_ok && children_ok
    }

    // -- exact-type accessors, used by the wire codec; lossless for matching types --

    pub fn as_bool(&self) -> bool {
        self.payload.first().copied().unwrap_or(0) != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Widen the stored payload, interpreted per the *actual* type tag, to an
    /// `i128`. Coercion getters below truncate this down to the requested
    /// width — silent truncation on overflow is the documented behavior
    /// carried over from the original implementation (spec.md §4.1, §9).
    fn widen(&self) -> i128 {
        let p = &self.payload[..];
        match self.type_tag {
            ValueType::Null => 0,
            ValueType::Bool => self.as_bool() as i128,
            ValueType::I16 if p.len() >= 2 => LittleEndian::read_i16(p) as i128,
            ValueType::U16 if p.len() >= 2 => LittleEndian::read_u16(p) as i128,
            ValueType::I32 if p.len() >= 4 => LittleEndian::read_i32(p) as i128,
            ValueType::U32 if p.len() >= 4 => LittleEndian::read_u32(p) as i128,
            ValueType::I64 if p.len() >= 8 => LittleEndian::read_i64(p) as i128,
            ValueType::U64 if p.len() >= 8 => LittleEndian::read_u64(p) as i128,
            ValueType::I128 if p.len() >= 16 => LittleEndian::read_i128(p),
            ValueType::U128 if p.len() >= 16 => LittleEndian::read_u128(p) as i128,
            ValueType::F32 if p.len() >= 4 => LittleEndian::read_f32(p) as i128,
            ValueType::F64 if p.len() >= 8 => LittleEndian::read_f64(p) as i128,
            ValueType::Container if p.len() >= 8 => LittleEndian::read_i64(p) as i128,
            _ => 0,
        }
    }

    pub fn as_i16(&self) -> i16 {
        self.widen() as i16
    }
    pub fn as_u16(&self) -> u16 {
        self.widen() as u16
    }
    pub fn as_i32(&self) -> i32 {
        self.widen() as i32
    }
    pub fn as_u32(&self) -> u32 {
        self.widen() as u32
    }
    pub fn as_i64(&self) -> i64 {
        self.widen() as i64
    }
    pub fn as_u64(&self) -> u64 {
        self.widen() as u64
    }
    pub fn as_i128(&self) -> i128 {
        self.widen()
    }
    pub fn as_u128(&self) -> u128 {
        if self.type_tag == ValueType::U128 && self.payload.len() >= 16 {
            LittleEndian::read_u128(&self.payload)
        } else {
            self.widen() as u128
        }
    }
    pub fn as_f32(&self) -> f32 {
        match self.type_tag {
            ValueType::F32 if self.payload.len() >= 4 => LittleEndian::read_f32(&self.payload),
            ValueType::F64 if self.payload.len() >= 8 => LittleEndian::read_f64(&self.payload) as f32,
            _ => self.widen() as f32,
        }
    }
    pub fn as_f64(&self) -> f64 {
        match self.type_tag {
            ValueType::F32 if self.payload.len() >= 4 => LittleEndian::read_f32(&self.payload) as f64,
            ValueType::F64 if self.payload.len() >= 8 => LittleEndian::read_f64(&self.payload),
            _ => self.widen() as f64,
        }
    }

    /// The exact-type text representation used on the wire: base-10 for
    /// numerics, `true`/`false` for bool, base64 for bytes, escaped UTF-8 for
    /// string, base-10 child count for container.
    pub fn value_text(&self) -> String {
        match self.type_tag {
            ValueType::Null => String::new(),
            ValueType::Bool => if self.as_bool() { "true" } else { "false" }.to_string(),
            ValueType::I16 => LittleEndian::read_i16(&self.payload).to_string(),
            ValueType::U16 => LittleEndian::read_u16(&self.payload).to_string(),
            ValueType::I32 => LittleEndian::read_i32(&self.payload).to_string(),
            ValueType::U32 => LittleEndian::read_u32(&self.payload).to_string(),
            ValueType::I64 => LittleEndian::read_i64(&self.payload).to_string(),
            ValueType::U64 => LittleEndian::read_u64(&self.payload).to_string(),
            ValueType::I128 => LittleEndian::read_i128(&self.payload).to_string(),
            ValueType::U128 => LittleEndian::read_u128(&self.payload).to_string(),
            ValueType::F32 => LittleEndian::read_f32(&self.payload).to_string(),
            ValueType::F64 => LittleEndian::read_f64(&self.payload).to_string(),
            ValueType::Bytes => base64::encode(&self.payload),
            ValueType::String => escape(&self.as_string()),
            ValueType::Container => self.declared_child_count().to_string(),
        }
    }

    /// Builds a `Value` from (name, type-text, data-text), per spec.md §4.1.
    pub fn from_text(name: impl Into<String>, type_text: &str, data_text: &str) -> MeshResult<Value> {
        let name = name.into();
        let type_tag = ValueType::from_type_text(type_text).ok_or(MeshError::Parse("unknown value type"))?;

        Ok(match type_tag {
            ValueType::Null => Value::null(name),
            ValueType::Bool => Value::bool(name, data_text == "true"),
            ValueType::I16 => from_i64(name, ValueType::I16, parse_or_zero(data_text)),
            ValueType::U16 => from_i64(name, ValueType::U16, parse_or_zero(data_text)),
            ValueType::I32 => from_i64(name, ValueType::I32, parse_or_zero(data_text)),
            ValueType::U32 => from_i64(name, ValueType::U32, parse_or_zero(data_text)),
            ValueType::I64 => from_i64(name, ValueType::I64, parse_or_zero(data_text)),
            ValueType::U64 => from_i64(name, ValueType::U64, parse_or_zero(data_text)),
            ValueType::I128 => from_i128(name, ValueType::I128, data_text.parse().unwrap_or(0)),
            ValueType::U128 => from_u128(name, data_text.parse().unwrap_or(0)),
            ValueType::F32 => {
                let v: f32 = data_text.parse().unwrap_or(0.0);
                Value {
                    name,
                    type_tag: ValueType::F32,
                    payload: v.to_le_bytes().to_vec(),
                    children: Vec::new(),
                }
            }
            ValueType::F64 => {
                let v: f64 = data_text.parse().unwrap_or(0.0);
                Value {
                    name,
                    type_tag: ValueType::F64,
                    payload: v.to_le_bytes().to_vec(),
                    children: Vec::new(),
                }
            }
            ValueType::Bytes => {
                let data = base64::decode(data_text).map_err(|_| MeshError::Parse("invalid base64 in value text"))?;
                Value::bytes(name, data)
            }
            ValueType::String => Value::string(name, unescape(data_text)),
            ValueType::Container => {
                let count: i64 = data_text.parse().unwrap_or(0);
                let mut payload = [0u8; 8];
                LittleEndian::write_i64(&mut payload, count);
                Value {
                    name,
                    type_tag: ValueType::Container,
                    payload: payload.to_vec(),
                    children: Vec::new(),
                }
            }
        })
    }

    /// Serializes this value and its subtree as `[name,type,value];` tuples,
    /// preorder-flattened (spec.md §4.1). `pretty` inserts one tab per depth
    /// level plus a trailing newline after each tuple.
    pub fn serialize(&self, pretty: bool) -> String {
        let mut out = String::new();
        self.write_into(&mut out, pretty, 0);
        out
    }

    fn write_into(&self, out: &mut String, pretty: bool, depth: usize) {
        if pretty {
            for _ in 0..depth {
                out.push('\t');
            }
        }
        out.push('[');
        out.push_str(&self.name);
        out.push(',');
        out.push_str(self.type_tag.type_text());
        out.push(',');
        out.push_str(&self.value_text());
        out.push_str("];");
        if pretty {
            out.push('\n');
        }
        for child in &self.children {
            child.write_into(out, pretty, depth + 1);
        }
    }

    /// Output-only XML projection (spec.md §4.1): `<name type="tag">value</name>`,
    /// with a container's children nested inside before the closing tag.
    /// There is no corresponding `from_xml` — the text codec above is the
    /// only format this type deserializes from.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(&xml_escape(&self.name));
        out.push_str(" type=\"");
        out.push_str(self.type_tag.type_text());
        out.push_str("\">");
        out.push_str(&xml_escape(&self.value_text()));
        for child in &self.children {
            out.push_str(&child.to_xml());
        }
        out.push_str("</");
        out.push_str(&xml_escape(&self.name));
        out.push('>');
        out
    }

    /// Output-only JSON projection (spec.md §4.1):
    /// `{"name":…,"type":…,"value":…,"children":[…]}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "type": self.type_tag.type_text(),
            "value": self.value_text(),
            "children": self.children.iter().map(Value::to_json).collect::<Vec<_>>(),
        })
    }

    /// Parses a flat `[name,type,value];` tuple stream into a forest of
    /// top-level values. Each container value declares its child count in
    /// its own value text (§3.1's invariant); `build_from_tuples` consumes
    /// exactly that many subsequent tuples as children, recursively, which
    /// is the declared-count discipline spec.md §4.1 describes applied as a
    /// straightforward recursive descent instead of an explicit stack.
    pub fn parse_forest(text: &str) -> MeshResult<Vec<Value>> {
        let flat = text.replace('\n', "").replace('\r', "");
        let tuples = scan_tuples(&flat)?;

        let mut roots = Vec::new();
        let mut pos = 0usize;
        while pos < tuples.len() {
            roots.push(build_from_tuples(&tuples, &mut pos)?);
        }
        Ok(roots)
    }
}

fn build_from_tuples(tuples: &[(String, String, String)], pos: &mut usize) -> MeshResult<Value> {
    let (name, type_text, value_text) = &tuples[*pos];
    *pos += 1;
    let mut value = Value::from_text(name.clone(), type_text, value_text)?;

    if value.type_tag == ValueType::Container {
        let count = value.declared_child_count();
        for _ in 0..count {
            if *pos >= tuples.len() {
                return Err(MeshError::Parse("container child count exceeds tuple stream"));
            }
            let child = build_from_tuples(tuples, pos)?;
            value.children.push(child);
        }
    }

    Ok(value)
}

fn from_i64(name: String, type_tag: ValueType, v: i64) -> Value {
    let width = type_tag.fixed_width().unwrap_or(8);
    let mut full = [0u8; 8];
    LittleEndian::write_i64(&mut full, v);
    Value {
        name,
        type_tag,
        payload: full[..width].to_vec(),
        children: Vec::new(),
    }
}

fn from_i128(name: String, type_tag: ValueType, v: i128) -> Value {
    Value {
        name,
        type_tag,
        payload: v.to_le_bytes().to_vec(),
        children: Vec::new(),
    }
}

fn from_u128(name: String, v: u128) -> Value {
    Value {
        name,
        type_tag: ValueType::U128,
        payload: v.to_le_bytes().to_vec(),
        children: Vec::new(),
    }
}

fn parse_or_zero(text: &str) -> i64 {
    text.parse().unwrap_or(0)
}

/// Scans a flat `[name,type,value];[name,type,value];...` stream into
/// `(name, type, value)` triples using bracket- and comma-position state, not
/// a regex — the structural parser spec.md §9's Open Questions calls for.
/// The scan locates tuple boundaries by finding the `];` that follows the
/// second comma; a value text containing the literal substring `];` is a
/// known limitation inherited from the original format (escaping only
/// covers whitespace control characters, not brackets or semicolons).
fn scan_tuples(text: &str) -> MeshResult<Vec<(String, String, String)>> {
    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut out = Vec::new();

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }

        let tuple_start = i + 1;
        let first_comma = find_from(bytes, tuple_start, b',').ok_or(MeshError::Parse("missing name separator"))?;
        let second_comma =
            find_from(bytes, first_comma + 1, b',').ok_or(MeshError::Parse("missing type separator"))?;
        let end = find_close(bytes, second_comma + 1).ok_or(MeshError::Parse("missing tuple terminator"))?;

        let name = text[tuple_start..first_comma].to_string();
        let type_text = text[first_comma + 1..second_comma].to_string();
        let value_text = text[second_comma + 1..end].to_string();

        out.push((name, type_text, value_text));
        i = end + 2; // skip past "];"
    }

    Ok(out)
}

fn find_from(bytes: &[u8], start: usize, needle: u8) -> Option<usize> {
    bytes[start..].iter().position(|&b| b == needle).map(|p| p + start)
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn find_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b']' && bytes[i + 1] == b';' {
            return Some(i);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_and_compact_reparse_equal() {
        let v = Value::container(
            "kv",
            vec![Value::string("k", "hello"), Value::i32_value("v", 7)],
        );

        let compact = Value::parse_forest(&v.serialize(false)).unwrap();
        let pretty = Value::parse_forest(&v.serialize(true)).unwrap();

        assert_eq!(compact, pretty);
        assert_eq!(compact[0], v);
    }

    #[test]
    fn escape_table_round_trips_through_text() {
        let v = Value::string("s", "a\tb\nc\rd e");
        let reparsed = Value::parse_forest(&v.serialize(false)).unwrap();
        assert_eq!(reparsed[0].as_string(), "a\tb\nc\rd e");
    }

    #[test]
    fn numeric_coercion_truncates_silently() {
        let v = Value::i32_value("n", 70_000);
        assert_eq!(v.as_i16(), 70_000i32 as i16);
    }

    #[test]
    fn bytes_round_trip_base64() {
        let v = Value::bytes("b", vec![0, 1, 2, 255]);
        let reparsed = Value::parse_forest(&v.serialize(false)).unwrap();
        assert_eq!(reparsed[0].as_bytes(), &[0, 1, 2, 255][..]);
    }

    #[test]
    fn xml_projection_nests_children_before_closing_tag() {
        let v = Value::container("kv", vec![Value::bool("flag", true)]);
        let xml = v.to_xml();
        assert_eq!(xml, "<kv type=\"container\">1<flag type=\"bool\">true</flag></kv>");
    }

    #[test]
    fn json_projection_matches_declared_shape() {
        let v = Value::i32_value("count", 7);
        let json = v.to_json();
        assert_eq!(json["name"], "count");
        assert_eq!(json["type"], "i32");
        assert_eq!(json["value"], "7");
        assert!(json["children"].as_array().unwrap().is_empty());
    }

    #[test]
    fn container_child_count_matches_after_parse() {
        let v = Value::container("c", vec![Value::bool("a", true), Value::bool("b", false)]);
        let text = v.serialize(false);
        let reparsed = Value::parse_forest(&text).unwrap();
        assert!(reparsed[0].is_well_formed());
        assert_eq!(reparsed[0].children().len(), 2);
    }
}

impl Value {
    // Convenience constructors with explicit widths, kept separate from the
    // primary impl block so the test module above can use them without
    // reordering the file.
    pub fn i16_value(name: impl Into<String>, v: i16) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::I16,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn u16_value(name: impl Into<String>, v: u16) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::U16,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn i32_value(name: impl Into<String>, v: i32) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::I32,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn u32_value(name: impl Into<String>, v: u32) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::U32,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn i64_value(name: impl Into<String>, v: i64) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::I64,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn u64_value(name: impl Into<String>, v: u64) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::U64,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn i128_value(name: impl Into<String>, v: i128) -> Value {
        from_i128(name.into(), ValueType::I128, v)
    }
    pub fn u128_value(name: impl Into<String>, v: u128) -> Value {
        from_u128(name.into(), v)
    }
    pub fn f32_value(name: impl Into<String>, v: f32) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::F32,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
    pub fn f64_value(name: impl Into<String>, v: f64) -> Value {
        Value {
            name: name.into(),
            type_tag: ValueType::F64,
            payload: v.to_le_bytes().to_vec(),
            children: Vec::new(),
        }
    }
}
