//! `Container`: the envelope that carries a forest of `Value`s between peers
//! (spec.md §3.2, §4.2). Grounded on `flux::contract`'s
//! `Serialize`/`Deserialize` trait split and on `original_source/container`'s
//! `@header={...};<body>` wire shape.

use crate::value::Value;
use meshwire_support::{MeshError, MeshResult};
use std::fs;
use std::path::Path;

pub const DEFAULT_MESSAGE_TYPE: &str = "data_container";

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    source_id: String,
    source_sub_id: String,
    target_id: String,
    target_sub_id: String,
    message_type: String,
    version: String,
    values: Vec<Value>,
    parsed_body: bool,
    raw_body: String,
}

impl Container {
    pub fn new(message_type: impl Into<String>, version: impl Into<String>) -> Container {
        Container {
            source_id: String::new(),
            source_sub_id: String::new(),
            target_id: String::new(),
            target_sub_id: String::new(),
            message_type: message_type.into(),
            version: version.into(),
            values: Vec::new(),
            parsed_body: true,
            raw_body: String::new(),
        }
    }

    pub fn data_container() -> Container {
        Container::new(DEFAULT_MESSAGE_TYPE, "1")
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn source_sub_id(&self) -> &str {
        &self.source_sub_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn target_sub_id(&self) -> &str {
        &self.target_sub_id
    }

    pub fn set_source(&mut self, id: impl Into<String>, sub_id: impl Into<String>) {
        self.source_id = id.into();
        self.source_sub_id = sub_id.into();
    }

    pub fn set_target(&mut self, id: impl Into<String>, sub_id: impl Into<String>) {
        self.target_id = id.into();
        self.target_sub_id = sub_id.into();
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed_body
    }

    pub fn values(&self) -> MeshResult<&[Value]> {
        if self.parsed_body {
            Ok(&self.values)
        } else {
            Err(MeshError::Protocol("container body not yet materialized"))
        }
    }

    /// Materializes `raw_body` into `values` if this container was parsed
    /// with `parse_only_header`. A no-op if the body is already parsed.
    pub fn ensure_parsed(&mut self) -> MeshResult<()> {
        if self.parsed_body {
            return Ok(());
        }
        self.values = Value::parse_forest(&self.raw_body)?;
        self.parsed_body = true;
        self.raw_body.clear();
        Ok(())
    }

    /// Appends `value` to the root list unless a structurally identical
    /// value is already present. The original tracks identity through a
    /// shared pointer; an owned tree has no equivalent pointer identity, so
    /// structural equality is the closest honest substitute.
    ///
    /// Materializes the body first (spec.md §4.2, §9: "any subsequent
    /// mutation must first materialize the body"), matching
    /// `value_container::add`'s unconditional `deserialize_values` call in
    /// the original. The body can only fail to parse here if it was
    /// produced by something other than this library's own serializer.
    pub fn add(&mut self, value: Value) {
        self.ensure_parsed().expect("container body must be parseable before mutation");
        if !self.values.iter().any(|v| v == &value) {
            self.values.push(value);
        }
    }

    /// Removes every root value whose name equals `name`. Materializes the
    /// body first, per spec.md §4.2, §9 (see `add`).
    pub fn remove(&mut self, name: &str) {
        self.ensure_parsed().expect("container body must be parseable before mutation");
        self.values.retain(|v| v.name() != name);
    }

    /// Returns the `index`-th root value named `name`, or a freshly
    /// constructed null-typed value with that name if none match — `get`
    /// never returns an absent/null result, per spec.md §4.2. Materializes
    /// the body first, matching `value_container::get_value`'s
    /// `deserialize_values` call and its non-`const` signature in the
    /// original.
    pub fn get(&mut self, name: &str, index: usize) -> Value {
        self.ensure_parsed().expect("container body must be parseable before mutation");
        self.values
            .iter()
            .filter(|v| v.name() == name)
            .nth(index)
            .cloned()
            .unwrap_or_else(|| Value::null(name))
    }

    pub fn swap_header(&mut self) {
        std::mem::swap(&mut self.source_id, &mut self.target_id);
        std::mem::swap(&mut self.source_sub_id, &mut self.target_sub_id);
    }

    /// Round-trips through serialize/deserialize. When `with_body` is
    /// false, the copy carries the header only, with an empty value list.
    pub fn copy(&self, with_body: bool) -> MeshResult<Container> {
        if with_body {
            Container::parse(&self.serialize()?, false)
        } else {
            let mut c = self.clone();
            c.values.clear();
            c.parsed_body = true;
            c.raw_body.clear();
            Ok(c)
        }
    }

    /// Serializes the envelope per §4.2's wire form. Requires the body to
    /// already be materialized (call `ensure_parsed` first if needed).
    pub fn serialize(&self) -> MeshResult<String> {
        let values = self.values()?;

        let mut header = String::from("@header={");
        if self.message_type != DEFAULT_MESSAGE_TYPE {
            push_tuple(&mut header, "1", &self.target_id);
            push_tuple(&mut header, "2", &self.target_sub_id);
            push_tuple(&mut header, "3", &self.source_id);
            push_tuple(&mut header, "4", &self.source_sub_id);
        }
        push_tuple(&mut header, "5", &self.message_type);
        push_tuple(&mut header, "6", &self.version);
        header.push_str("};");

        let mut body = String::from("@data={");
        for value in values {
            body.push_str(&value.serialize(false));
        }
        body.push_str("};");

        header.push_str(&body);
        Ok(header)
    }

    /// Parses a wire-form container. Strips newlines, then locates
    /// `@header={...};` by brace-depth scanning (not a regex, so a tuple
    /// value containing a literal `};` inside the header can't truncate the
    /// scan early). If `parse_only_header` is set, the body is retained
    /// verbatim and `parsed_body` is left false.
    pub fn parse(text: &str, parse_only_header: bool) -> MeshResult<Container> {
        let flat = text.replace('\n', "").replace('\r', "");

        let header_tag = "@header={";
        let header_start = flat.find(header_tag).ok_or(MeshError::Parse("missing @header block"))?;
        let content_start = header_start + header_tag.len();
        let (header_content, header_end) =
            scan_balanced(&flat, content_start, '{', '}').ok_or(MeshError::Parse("unterminated @header block"))?;

        let fields = scan_pairs(header_content)?;
        let mut field = |key: &str| -> String {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };

        let target_id = field("1");
        let target_sub_id = field("2");
        let source_id = field("3");
        let source_sub_id = field("4");
        let message_type = {
            let v = field("5");
            if v.is_empty() { DEFAULT_MESSAGE_TYPE.to_string() } else { v }
        };
        let version = field("6");

        // header_end points at the closing '}'; the wire form follows it
        // with ';', then an optional "@data={...};" body.
        let rest = &flat[header_end + 2..];

        let data_tag = "@data={";
        let raw_body = match rest.find(data_tag) {
            Some(data_start) => {
                let content_start = data_start + data_tag.len();
                let (body_content, _) = scan_balanced(rest, content_start, '{', '}')
                    .ok_or(MeshError::Parse("unterminated @data block"))?;
                body_content.to_string()
            }
            None => String::new(),
        };

        let mut container = Container {
            source_id,
            source_sub_id,
            target_id,
            target_sub_id,
            message_type,
            version,
            values: Vec::new(),
            parsed_body: false,
            raw_body,
        };

        if !parse_only_header {
            container.ensure_parsed()?;
        }

        Ok(container)
    }

    /// Reads `path` and parses its contents as a serialized container
    /// (spec.md §6.4), matching `value_container::load_packet` in the
    /// original, which combines a file read with `deserialize()`.
    pub fn load_packet<P: AsRef<Path>>(path: P) -> MeshResult<Container> {
        let text = fs::read_to_string(path).map_err(MeshError::from)?;
        Container::parse(&text, false)
    }

    /// Serializes this container and writes it to `path` (spec.md §6.4),
    /// matching `value_container::save_packet` in the original.
    pub fn save_packet<P: AsRef<Path>>(&self, path: P) -> MeshResult<()> {
        let text = self.serialize()?;
        fs::write(path, text).map_err(MeshError::from)
    }
}

fn push_tuple(out: &mut String, key: &str, value: &str) {
    out.push('[');
    out.push_str(key);
    out.push(',');
    out.push_str(value);
    out.push_str("];");
}

/// Scans forward from `start` (the character after the opening `open`) for
/// the matching `close`, tracking nesting depth so an unbalanced literal
/// inside the content can't end the scan early. Returns the content slice
/// (exclusive of both braces) and the index of the matching `close`.
fn scan_balanced(text: &str, start: usize, open: char, close: char) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    let mut depth = 1i32;
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((&text[start..i], i));
            }
        }
        i += 1;
    }
    None
}

/// Scans `[key,value];` pairs the same way `value::scan_tuples` scans
/// triples — structurally, not with a regex.
fn scan_pairs(text: &str) -> MeshResult<Vec<(String, String)>> {
    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut out = Vec::new();

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let comma = bytes[start..]
            .iter()
            .position(|&b| b == b',')
            .map(|p| p + start)
            .ok_or(MeshError::Parse("missing header key separator"))?;

        let mut j = comma + 1;
        let end = loop {
            if j + 1 >= bytes.len() {
                return Err(MeshError::Parse("unterminated header tuple"));
            }
            if bytes[j] == b']' && bytes[j + 1] == b';' {
                break j;
            }
            j += 1;
        };

        out.push((text[start..comma].to_string(), text[comma + 1..end].to_string()));
        i = end + 2;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn default_message_type_omits_addressing_fields() {
        let mut c = Container::data_container();
        c.add(Value::string("greeting", "hi"));
        let text = c.serialize().unwrap();
        assert!(!text.contains("[1,"));
        assert!(text.contains("[5,data_container];"));
    }

    #[test]
    fn non_default_message_type_includes_addressing_fields() {
        let mut c = Container::new("control", "1");
        c.set_source("node-a", "");
        c.set_target("node-b", "");
        let text = c.serialize().unwrap();
        assert!(text.contains("[3,node-a];"));
        assert!(text.contains("[1,node-b];"));
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let mut c = Container::new("control", "2");
        c.set_source("a", "0");
        c.set_target("b", "0");
        c.add(Value::i32_value("count", 42));
        c.add(Value::string("note", "hello world"));

        let text = c.serialize().unwrap();
        let reparsed = Container::parse(&text, false).unwrap();

        assert_eq!(reparsed.message_type(), "control");
        assert_eq!(reparsed.source_id(), "a");
        assert_eq!(reparsed.target_id(), "b");
        assert_eq!(reparsed.values().unwrap().len(), 2);
    }

    #[test]
    fn header_only_container_has_empty_values() {
        let c = Container::parse("@header={[5,data_container];[6,1];};", false).unwrap();
        assert_eq!(c.values().unwrap().len(), 0);
    }

    #[test]
    fn parse_only_header_defers_body_materialization() {
        let text = "@header={[5,data_container];[6,1];};@data={[a,bool,true];};";
        let mut c = Container::parse(text, true).unwrap();
        assert!(!c.is_parsed());
        assert!(c.values().is_err());
        c.ensure_parsed().unwrap();
        assert_eq!(c.values().unwrap().len(), 1);
    }

    #[test]
    fn get_returns_null_value_when_absent() {
        let mut c = Container::data_container();
        let v = c.get("missing", 0);
        assert_eq!(v.name(), "missing");
        assert_eq!(v.value_type(), crate::value::ValueType::Null);
    }

    #[test]
    fn load_packet_round_trips_through_disk() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("meshwire-proto-packet-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("packet.dat");

        let mut c = Container::data_container();
        c.add(Value::string("note", "saved"));
        c.save_packet(&path).unwrap();

        let mut loaded = Container::load_packet(&path).unwrap();
        assert_eq!(loaded.get("note", 0).as_string(), "saved");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn swap_header_exchanges_source_and_target() {
        let mut c = Container::new("control", "1");
        c.set_source("a", "0");
        c.set_target("b", "1");
        c.swap_header();
        assert_eq!(c.source_id(), "b");
        assert_eq!(c.target_id(), "a");
    }
}
