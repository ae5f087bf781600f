//! Tagged-element encoding of a settings tree.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <settings>
//!   <value name="retries" type="Int32">5</value>
//!   <settings name="ftp">
//!     <value name="host" type="String">example.com</value>
//!   </settings>
//! </settings>
//! ```
//!
//! Values come before child nodes; both are sorted by name at every level.
//! Bodies use invariant text forms: geometry as comma-joined numbers, string
//! lists comma-joined with `\` escaping `,` and itself, byte arrays and
//! structured payloads as base64. Structured values use the `Object` tag
//! with a `class` attribute naming the payload type.

use std::borrow::Cow;
use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;
use hive_store::{SettingsNode, StoreError, StoreResult};
use hive_types::{Point, Rectangle, Size, SizeF, StructuredValue, Value, ValueKind};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rust_decimal::Decimal;
use tracing::warn;

const ROOT: &[u8] = b"settings";
const VALUE: &[u8] = b"value";
const OBJECT_TAG: &str = "Object";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// Persisted attributes and body text of one value.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedValue {
    pub tag: &'static str,
    pub class: Option<String>,
    pub body: String,
}

/// Encode a value into its tag and body text.
pub fn encode_value(value: &Value) -> EncodedValue {
    let (class, body) = match value {
        Value::Bool(b) => (None, if *b { "True" } else { "False" }.to_string()),
        Value::DateTime(dt) => (None, dt.format(DATETIME_FORMAT).to_string()),
        Value::Strings(items) => (None, join_escaped(items)),
        Value::ByteArray(bytes) => (None, BASE64.encode(bytes)),
        Value::Structured(s) => (Some(s.type_name.clone()), BASE64.encode(&s.payload)),
        other => (None, other.to_string()),
    };
    EncodedValue {
        tag: value.kind().tag(),
        class,
        body,
    }
}

/// Decode a body given its tag (and `class`, for `Object`).
pub fn decode_value(tag: &str, class: Option<&str>, body: &str) -> Result<Value, String> {
    if tag == OBJECT_TAG {
        let class = class.ok_or("Object value without a class attribute")?;
        let payload = BASE64.decode(body.trim()).map_err(|e| e.to_string())?;
        return Ok(Value::Structured(StructuredValue::new(class, payload)));
    }
    let kind: ValueKind = tag.parse().map_err(|e: hive_types::TypeError| e.to_string())?;
    let malformed = || format!("malformed {tag} body {body:?}");
    let value = match kind {
        ValueKind::Char => {
            let mut chars = body.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(malformed()),
            }
        }
        ValueKind::String => Value::String(body.to_string()),
        ValueKind::Bool => match body.trim() {
            b if b.eq_ignore_ascii_case("true") => Value::Bool(true),
            b if b.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(malformed()),
        },
        ValueKind::SByte => Value::SByte(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Byte => Value::Byte(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Int16 => Value::Int16(parse_num(body).ok_or_else(malformed)?),
        ValueKind::UInt16 => Value::UInt16(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Int32 => Value::Int32(parse_num(body).ok_or_else(malformed)?),
        ValueKind::UInt32 => Value::UInt32(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Int64 => Value::Int64(parse_num(body).ok_or_else(malformed)?),
        ValueKind::UInt64 => Value::UInt64(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Double => Value::Double(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Float => Value::Float(parse_num(body).ok_or_else(malformed)?),
        ValueKind::Decimal => Value::Decimal(parse_num::<Decimal>(body).ok_or_else(malformed)?),
        ValueKind::DateTime => Value::DateTime(
            NaiveDateTime::parse_from_str(body.trim(), DATETIME_FORMAT)
                .map_err(|e| format!("{}: {e}", malformed()))?,
        ),
        ValueKind::Rectangle => Value::Rectangle(Rectangle::parse(body).ok_or_else(malformed)?),
        ValueKind::Point => Value::Point(Point::parse(body).ok_or_else(malformed)?),
        ValueKind::Size => Value::Size(Size::parse(body).ok_or_else(malformed)?),
        ValueKind::SizeF => Value::SizeF(SizeF::parse(body).ok_or_else(malformed)?),
        ValueKind::Strings => Value::Strings(split_escaped(body)),
        ValueKind::ByteArray => {
            Value::ByteArray(BASE64.decode(body.trim()).map_err(|e| e.to_string())?)
        }
        ValueKind::Structured(_) => return Err(malformed()),
    };
    Ok(value)
}

fn parse_num<T: std::str::FromStr>(body: &str) -> Option<T> {
    body.trim().parse().ok()
}

/// Join with `,`, escaping `\` and `,` with a backslash.
///
/// A list holding one empty string is written as a lone `\`, so it stays
/// distinct from the empty list.
pub fn join_escaped(items: &[String]) -> String {
    if let [only] = items {
        if only.is_empty() {
            return "\\".to_string();
        }
    }
    items
        .iter()
        .map(|item| item.replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`join_escaped`]. An empty body is an empty list.
pub fn split_escaped(body: &str) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => items.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    items.push(current);
    items
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Serialize `root` as a complete document.
pub fn write_tree(root: &SettingsNode) -> StoreResult<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(format_error)?;
    write_node(&mut writer, BytesStart::new("settings"), root)?;
    let mut bytes = writer.into_inner();
    bytes.write_all(b"\n")?;
    Ok(bytes)
}

fn write_node<W: Write>(
    writer: &mut Writer<W>,
    start: BytesStart<'_>,
    node: &SettingsNode,
) -> StoreResult<()> {
    if node.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(format_error)?;
        return Ok(());
    }
    let end = BytesEnd::new("settings");
    writer.write_event(Event::Start(start)).map_err(format_error)?;
    for (name, value) in &node.values {
        let encoded = encode_value(value);
        let mut elem = BytesStart::new("value");
        elem.push_attribute(("name", name.as_str()));
        elem.push_attribute(("type", encoded.tag));
        if let Some(class) = &encoded.class {
            elem.push_attribute(("class", class.as_str()));
        }
        if encoded.body.is_empty() {
            writer.write_event(Event::Empty(elem)).map_err(format_error)?;
        } else {
            writer.write_event(Event::Start(elem)).map_err(format_error)?;
            writer
                .write_event(Event::Text(BytesText::new(&encoded.body)))
                .map_err(format_error)?;
            writer
                .write_event(Event::End(BytesEnd::new("value")))
                .map_err(format_error)?;
        }
    }
    for (name, child) in &node.children {
        let mut elem = BytesStart::new("settings");
        elem.push_attribute(("name", name.as_str()));
        write_node(writer, elem, child)?;
    }
    writer.write_event(Event::End(end)).map_err(format_error)?;
    Ok(())
}

fn format_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Format(e.to_string())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// A `<value>` whose body is still being collected.
struct PendingValue {
    name: String,
    tag: String,
    class: Option<String>,
    raw_body: String,
}

/// Parse a complete document into a tree.
///
/// Syntax errors and a missing `settings` root fail the whole parse. A single
/// value with an unknown tag or malformed body is skipped with a warning.
pub fn parse_tree(bytes: &[u8]) -> StoreResult<SettingsNode> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    // Nodes from the root down to the one currently open, with their names.
    let mut stack: Vec<(String, SettingsNode)> = Vec::new();
    let mut pending: Option<PendingValue> = None;
    let mut root: Option<SettingsNode> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(format_error)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                let attrs = attributes(e)?;
                if root.is_some() {
                    return Err(StoreError::Format("content after the root element".into()));
                }
                if pending.is_some() {
                    return Err(StoreError::Format("element nested inside a value".into()));
                }
                match name.as_ref() {
                    ROOT => {
                        let node_name = if stack.is_empty() {
                            String::new()
                        } else {
                            attr(&attrs, "name")
                                .ok_or_else(|| format_error("settings element without a name"))?
                                .to_string()
                        };
                        stack.push((node_name, SettingsNode::new()));
                        if is_empty {
                            close_node(&mut stack, &mut root);
                        }
                    }
                    VALUE if !stack.is_empty() => {
                        let value = PendingValue {
                            name: attr(&attrs, "name")
                                .ok_or_else(|| format_error("value element without a name"))?
                                .to_string(),
                            tag: attr(&attrs, "type").unwrap_or_default().to_string(),
                            class: attr(&attrs, "class").map(str::to_string),
                            raw_body: String::new(),
                        };
                        if is_empty {
                            finish_value(&mut stack, value);
                        } else {
                            pending = Some(value);
                        }
                    }
                    other => {
                        return Err(StoreError::Format(format!(
                            "unexpected element <{}>",
                            String::from_utf8_lossy(other)
                        )));
                    }
                }
            }
            Event::Text(ref e) => {
                if let Some(value) = pending.as_mut() {
                    value.raw_body.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(ref e) => {
                if let Some(value) = pending.as_mut() {
                    // CDATA is literal; escape it so the final unescape restores it.
                    let text = String::from_utf8_lossy(e.as_ref());
                    value.raw_body.push_str(&quick_xml::escape::escape(text.as_ref()));
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(value) = pending.as_mut() {
                    value.raw_body.push('&');
                    value.raw_body.push_str(&String::from_utf8_lossy(e.as_ref()));
                    value.raw_body.push(';');
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                VALUE => {
                    if let Some(value) = pending.take() {
                        finish_value(&mut stack, value);
                    }
                }
                ROOT => close_node(&mut stack, &mut root),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(StoreError::Format("unexpected end of document".into()));
    }
    root.ok_or_else(|| StoreError::Format("missing settings root element".into()))
}

fn attributes(e: &BytesStart<'_>) -> StoreResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(format_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value().map_err(format_error)?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn close_node(stack: &mut Vec<(String, SettingsNode)>, root: &mut Option<SettingsNode>) {
    let Some((name, node)) = stack.pop() else {
        return;
    };
    match stack.last_mut() {
        Some((_, parent)) => {
            parent.children.insert(name, node);
        }
        None => *root = Some(node),
    }
}

fn finish_value(stack: &mut [(String, SettingsNode)], value: PendingValue) {
    let Some((_, node)) = stack.last_mut() else {
        return;
    };
    let body: Cow<'_, str> = match unescape(&value.raw_body) {
        Ok(body) => body,
        Err(e) => {
            warn!(name = %value.name, error = %e, "skipping value with bad escape");
            return;
        }
    };
    match decode_value(&value.tag, value.class.as_deref(), &body) {
        Ok(decoded) => {
            node.values.insert(value.name, decoded);
        }
        Err(reason) => {
            warn!(name = %value.name, tag = %value.tag, %reason, "skipping unreadable value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_tree() -> SettingsNode {
        let mut root = SettingsNode::new();
        root.values.insert("retries".into(), Value::Int32(5));
        root.values.insert("enabled".into(), Value::Bool(true));
        root.values
            .insert("bounds".into(), Value::Rectangle(Rectangle::new(10, 20, 300, 200)));
        root.values.insert(
            "recent".into(),
            Value::Strings(vec!["a,b".into(), "c\\d".into(), "e".into()]),
        );
        root.values
            .insert("blob".into(), Value::ByteArray(vec![0, 159, 146, 150]));
        root.values
            .insert("title".into(), Value::String("Fish & <Chips>".into()));
        let ftp = root.descend_or_create(&["ftp".to_string()]);
        ftp.values
            .insert("host".into(), Value::String("example.com".into()));
        ftp.children.insert("empty".into(), SettingsNode::new());
        root
    }

    // -----------------------------------------------------------------------
    // Whole documents
    // -----------------------------------------------------------------------

    #[test]
    fn tree_survives_write_and_parse() {
        let tree = sample_tree();
        let bytes = write_tree(&tree).unwrap();
        assert_eq!(parse_tree(&bytes).unwrap(), tree);
    }

    #[test]
    fn output_is_sorted_and_deterministic() {
        let tree = sample_tree();
        let a = write_tree(&tree).unwrap();
        let b = write_tree(&tree.clone()).unwrap();
        assert_eq!(a, b);
        let text = String::from_utf8(a).unwrap();
        let bounds = text.find("name=\"bounds\"").unwrap();
        let title = text.find("name=\"title\"").unwrap();
        let ftp = text.find("name=\"ftp\"").unwrap();
        assert!(bounds < title);
        assert!(title < ftp, "values precede child nodes");
    }

    #[test]
    fn empty_tree_writes_an_empty_root() {
        let bytes = write_tree(&SettingsNode::new()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("<settings/>"));
        assert!(parse_tree(&bytes).unwrap().is_empty());
    }

    #[test]
    fn hand_written_document_parses() {
        let doc = br#"<?xml version="1.0"?>
<settings>
  <value name="port" type="Int32">21</value>
  <value name="ok" type="Bool">true</value>
  <settings name="window">
    <value name="origin" type="Point">3, 4</value>
  </settings>
</settings>"#;
        let tree = parse_tree(doc).unwrap();
        assert_eq!(tree.values.get("port"), Some(&Value::Int32(21)));
        assert_eq!(tree.values.get("ok"), Some(&Value::Bool(true)));
        let window = tree.children.get("window").unwrap();
        assert_eq!(window.values.get("origin"), Some(&Value::Point(Point::new(3, 4))));
    }

    #[test]
    fn bad_value_is_skipped_not_fatal() {
        let doc = br#"<settings>
  <value name="good" type="Int32">1</value>
  <value name="bad" type="Int32">one</value>
  <value name="odd" type="Nonsense">?</value>
</settings>"#;
        let tree = parse_tree(doc).unwrap();
        assert_eq!(tree.value_names(), vec!["good"]);
    }

    #[test]
    fn broken_documents_fail_to_parse() {
        assert!(parse_tree(b"<settings><value name=\"a\"").is_err());
        assert!(parse_tree(b"<config/>").is_err());
        assert!(parse_tree(b"").is_err());
        assert!(parse_tree(b"<settings><settings name=\"x\"></settings>").is_err());
    }

    // -----------------------------------------------------------------------
    // Bodies
    // -----------------------------------------------------------------------

    #[test]
    fn bool_body_is_capitalized_and_parsed_loosely() {
        assert_eq!(encode_value(&Value::Bool(false)).body, "False");
        assert_eq!(decode_value("Bool", None, "TRUE").unwrap(), Value::Bool(true));
        assert!(decode_value("Bool", None, "1").is_err());
    }

    #[test]
    fn structured_uses_object_tag_with_class() {
        let value = Value::Structured(StructuredValue::new("app::Layout", vec![1, 2, 3]));
        let encoded = encode_value(&value);
        assert_eq!(encoded.tag, "Object");
        assert_eq!(encoded.class.as_deref(), Some("app::Layout"));
        assert_eq!(
            decode_value("Object", Some("app::Layout"), &encoded.body).unwrap(),
            value
        );
        assert!(decode_value("Object", None, &encoded.body).is_err());
    }

    #[test]
    fn datetime_keeps_fractional_seconds() {
        let dt = NaiveDateTime::parse_from_str("2024-05-06T07:08:09.123", "%Y-%m-%dT%H:%M:%S%.f")
            .unwrap();
        let encoded = encode_value(&Value::DateTime(dt));
        assert_eq!(encoded.body, "2024-05-06T07:08:09.123");
        assert_eq!(
            decode_value("DateTime", None, &encoded.body).unwrap(),
            Value::DateTime(dt)
        );
    }

    #[test]
    fn char_body_must_be_one_char() {
        assert_eq!(decode_value("Char", None, "é").unwrap(), Value::Char('é'));
        assert!(decode_value("Char", None, "ab").is_err());
    }

    #[test]
    fn escaped_list_edge_cases() {
        assert_eq!(split_escaped(""), Vec::<String>::new());
        assert_eq!(split_escaped("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_escaped("a\\,b,c"), vec!["a,b", "c"]);
        assert_eq!(split_escaped("a,"), vec!["a", ""]);
        assert_eq!(join_escaped(&[String::new()]), "\\");
        assert_eq!(split_escaped("\\"), vec![""]);
        assert_eq!(join_escaped(&[]), "");
    }

    proptest! {
        #[test]
        fn escaped_lists_round_trip(items in prop::collection::vec("[a-z,\\\\ ]{0,6}", 1..6)) {
            prop_assert_eq!(split_escaped(&join_escaped(&items)), items);
        }
    }
}
