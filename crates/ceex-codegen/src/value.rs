//! Runtime values seen by template expressions.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::error::RenderError;
use crate::safe::Safe;

/// Assigns passed to a template or component, read with `@name`.
pub type Assigns = BTreeMap<String, Value>;

/// Slots passed to a component, keyed by slot name.
pub type Slots = BTreeMap<String, Slot>;

/// Deferred renderer of a slot entry body. Receives the `render_slot` argument.
pub type SlotRender = Arc<dyn Fn(Value) -> Result<Safe, RenderError> + Send + Sync>;

/// A template value.
///
/// Map keys are strings: atom keys (`%{id: 1}`) and string keys
/// (`%{"id" => 1}`) address the same entry.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Atom(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Inclusive integer range, `first..last`.
    Range(i64, i64),
    Safe(Safe),
    Slot(Slot),
    SlotEntry(Arc<SlotEntry>),
}

/// All entries declared for one slot name, in source order.
#[derive(Clone, Debug)]
pub struct Slot {
    pub name: String,
    pub entries: Vec<Arc<SlotEntry>>,
}

/// One `<:name>` entry: its attributes plus the deferred body.
pub struct SlotEntry {
    pub name: String,
    pub attrs: Assigns,
    /// `None` for self-closing entries.
    pub render: Option<SlotRender>,
}

impl SlotEntry {
    pub fn new(name: impl Into<String>, attrs: Assigns, render: Option<SlotRender>) -> Self {
        Self {
            name: name.into(),
            attrs,
            render,
        }
    }

    /// Render the entry body with `arg` as the `:let` value.
    pub fn render(&self, arg: Value) -> Result<Safe, RenderError> {
        match &self.render {
            Some(render) => render(arg),
            None => Err(RenderError::NoInnerContent {
                slot: self.name.clone(),
            }),
        }
    }
}

impl fmt::Debug for SlotEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotEntry")
            .field("name", &self.name)
            .field("attrs", &self.attrs)
            .field("render", &self.render.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Slot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Render every entry in order.
    pub fn render(&self, arg: Value) -> Result<Safe, RenderError> {
        if self.entries.is_empty() {
            return Err(RenderError::NoInnerBlock {
                slot: self.name.clone(),
            });
        }
        let mut out = Safe::new();
        for entry in &self.entries {
            out.append(entry.render(arg.clone())?);
        }
        Ok(out)
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn atom(s: impl Into<String>) -> Self {
        Value::Atom(s.into())
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil | Value::Bool(_) | Value::Atom(_) => "atom",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Range(..) => "range",
            Value::Safe(_) => "safe",
            Value::Slot(_) => "slot",
            Value::SlotEntry(_) => "slot entry",
        }
    }

    /// String conversion used by interpolation, `<>` and `to_string/1`.
    pub fn to_text(&self) -> Result<String, RenderError> {
        match self {
            Value::Nil => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(n) => Ok(format_float(*n)),
            Value::Str(s) | Value::Atom(s) => Ok(s.clone()),
            Value::Safe(s) => Ok(s.to_string()),
            Value::List(items) => {
                let mut out = String::new();
                for item in items {
                    match item {
                        Value::Int(n) => out.push(codepoint(*n)?),
                        other => out.push_str(&other.to_text()?),
                    }
                }
                Ok(out)
            }
            other => Err(RenderError::bad_argument(format!(
                "cannot convert {other} to a string"
            ))),
        }
    }

    /// Convert to escaped output. Safe values pass through untouched.
    pub fn to_safe(&self) -> Result<Safe, RenderError> {
        match self {
            Value::Safe(s) => Ok(s.clone()),
            Value::Nil => Ok(Safe::new()),
            Value::List(items) => {
                let mut out = Safe::new();
                for item in items {
                    match item {
                        Value::Int(n) => out.push_escaped(codepoint(*n)?.encode_utf8(&mut [0; 4])),
                        other => out.append(other.to_safe()?),
                    }
                }
                Ok(out)
            }
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Atom(_) => {
                Ok(Safe::escaped(&self.to_text()?))
            }
            other => Err(RenderError::NotRenderable {
                value: other.to_string(),
            }),
        }
    }

    /// Items produced when this value is used as a generator source.
    pub fn enumerate(&self) -> Result<Vec<Value>, RenderError> {
        match self {
            Value::List(items) => Ok(items.clone()),
            Value::Range(first, last) => Ok(range_items(*first, *last).map(Value::Int).collect()),
            Value::Map(map) => Ok(map
                .iter()
                .map(|(k, v)| Value::Tuple(vec![Value::Str(k.clone()), v.clone()]))
                .collect()),
            Value::Slot(slot) => Ok(slot
                .entries
                .iter()
                .map(|e| Value::SlotEntry(Arc::clone(e)))
                .collect()),
            other => Err(RenderError::NotEnumerable {
                value: other.to_string(),
            }),
        }
    }

    /// Key used when this value indexes a map.
    pub fn as_key(&self) -> Result<String, RenderError> {
        match self {
            Value::Str(s) | Value::Atom(s) => Ok(s.clone()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Nil => Ok("nil".to_string()),
            other => Err(RenderError::bad_argument(format!(
                "unsupported map key {other}"
            ))),
        }
    }

    /// `===`: like `==` but integers and floats never match.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => false,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_eq(vb))
            }
            _ => self.compare(other) == Ordering::Equal,
        }
    }

    /// Term ordering: number < atom < tuple < map < list < string.
    pub fn compare(&self, other: &Value) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }

        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (a, b) if a.rank() == 0 => {
                let (x, y) = (a.as_f64(), b.as_f64());
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (a, b) if a.rank() == 1 => a.atom_name().cmp(b.atom_name()),
            (Value::Tuple(a), Value::Tuple(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| compare_items(a, b)),
            (Value::List(a), Value::List(b)) => compare_items(a, b),
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b)
                    .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.compare(vb)))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            (Value::Range(a1, a2), Value::Range(b1, b2)) => (a1, a2).cmp(&(b1, b2)),
            (Value::Slot(a), Value::Slot(b)) => {
                if a.name == b.name
                    && a.entries.len() == b.entries.len()
                    && a.entries.iter().zip(&b.entries).all(|(x, y)| Arc::ptr_eq(x, y))
                {
                    Ordering::Equal
                } else {
                    a.name.cmp(&b.name).then(Ordering::Less)
                }
            }
            (Value::SlotEntry(a), Value::SlotEntry(b)) if Arc::ptr_eq(a, b) => Ordering::Equal,
            (Value::SlotEntry(a), Value::SlotEntry(b)) => a.name.cmp(&b.name).then(Ordering::Less),
            (a, b) => a.string_form().cmp(&b.string_form()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Nil | Value::Bool(_) | Value::Atom(_) => 1,
            Value::Tuple(_) => 2,
            Value::Map(_) | Value::Range(..) | Value::Slot(_) | Value::SlotEntry(_) => 3,
            Value::List(_) => 4,
            Value::Str(_) | Value::Safe(_) => 5,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(n) => *n,
            _ => 0.0,
        }
    }

    fn atom_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Bool(true) => "true",
            Value::Bool(false) => "false",
            Value::Atom(s) => s,
            _ => "",
        }
    }

    fn string_form(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Safe(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

fn compare_items(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.compare(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

pub(crate) fn range_items(first: i64, last: i64) -> Box<dyn Iterator<Item = i64>> {
    if first <= last {
        Box::new(first..=last)
    } else {
        Box::new((last..=first).rev())
    }
}

fn codepoint(n: i64) -> Result<char, RenderError> {
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| RenderError::bad_argument(format!("invalid codepoint {n} in list")))
}

/// Floats always carry a fractional part, `1.0` rather than `1`.
pub(crate) fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

// =========================================================================
// Inspect
// =========================================================================

/// `Display` is the `inspect/1` form, used in error messages.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => f.write_str(&format_float(*n)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Atom(s) => {
                if is_plain_name(s) {
                    write!(f, ":{s}")
                } else {
                    write!(f, ":{s:?}")
                }
            }
            Value::List(items) if !items.is_empty() && items.iter().all(is_keyword_pair) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Value::Tuple(pair) = item {
                        write!(f, "{}: {}", pair[0].atom_name(), pair[1])?;
                    }
                }
                f.write_str("]")
            }
            Value::List(items) => write_items(f, "[", items, "]"),
            Value::Tuple(items) => write_items(f, "{", items, "}"),
            Value::Map(map) => {
                f.write_str("%{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_plain_name(k) {
                        write!(f, "{k}: {v}")?;
                    } else {
                        write!(f, "{k:?} => {v}")?;
                    }
                }
                f.write_str("}")
            }
            Value::Range(a, b) => write!(f, "{a}..{b}"),
            Value::Safe(s) => write!(f, "{{:safe, {:?}}}", s.to_string()),
            Value::Slot(slot) => write!(f, "#Slot<{}, entries: {}>", slot.name, slot.entries.len()),
            Value::SlotEntry(entry) => write!(f, "#SlotEntry<{}>", entry.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

fn is_keyword_pair(value: &Value) -> bool {
    matches!(value, Value::Tuple(pair) if pair.len() == 2 && matches!(pair[0], Value::Atom(_)))
}

fn is_plain_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && s.chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_alphanumeric() || c == '_' || ((c == '?' || c == '!') && i == s.len() - 1))
}

// =========================================================================
// Conversions
// =========================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Safe> for Value {
    fn from(s: Safe) -> Self {
        Value::Safe(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

// =========================================================================
// Deserialize
// =========================================================================

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-like value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E>(self, n: u64) -> Result<Value, E> {
        Ok(i64::try_from(n).map_or(Value::Float(n as f64), Value::Int))
    }

    fn visit_f64<E>(self, n: f64) -> Result<Value, E> {
        Ok(Value::Float(n))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Str(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::Str(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    // =========================================================================
    // Truthiness and text
    // =========================================================================

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
        assert!(Value::List(vec![]).is_truthy());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Nil.to_text().unwrap(), "");
        assert_eq!(Value::Float(1.0).to_text().unwrap(), "1.0");
        assert_eq!(Value::Float(2.5).to_text().unwrap(), "2.5");
        assert_eq!(Value::atom("ok").to_text().unwrap(), "ok");
        assert_eq!(
            Value::from(vec![Value::str("a"), Value::Int(98)]).to_text().unwrap(),
            "ab"
        );
        assert!(Value::Tuple(vec![]).to_text().is_err());
    }

    #[test]
    fn test_to_safe_escapes_once() {
        assert_eq!(Value::str("<b>").to_safe().unwrap().to_string(), "&lt;b&gt;");
        let safe = Value::Safe(Safe::raw("<b>"));
        assert_eq!(safe.to_safe().unwrap().to_string(), "<b>");
    }

    #[test]
    fn test_map_is_not_renderable() {
        let err = map(&[("a", Value::Int(1))]).to_safe().unwrap_err();
        assert_eq!(
            err,
            RenderError::NotRenderable {
                value: "%{a: 1}".into()
            }
        );
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    #[test]
    fn test_number_equality() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.0)), Ordering::Equal);
        assert!(!Value::Int(1).strict_eq(&Value::Float(1.0)));
        assert!(Value::Int(1).strict_eq(&Value::Int(1)));
    }

    #[test]
    fn test_term_ordering() {
        assert_eq!(Value::Int(5).compare(&Value::atom("a")), Ordering::Less);
        assert_eq!(Value::atom("a").compare(&Value::Tuple(vec![])), Ordering::Less);
        assert_eq!(Value::List(vec![]).compare(&Value::str("")), Ordering::Less);
        assert_eq!(Value::Nil.compare(&Value::Bool(true)), Ordering::Less);
        assert_eq!(Value::str("b").compare(&Value::str("a")), Ordering::Greater);
    }

    #[test]
    fn test_list_ordering_is_lexicographic() {
        let a = Value::from(vec![1i64, 2]);
        let b = Value::from(vec![1i64, 3]);
        let c = Value::from(vec![1i64]);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(c.compare(&a), Ordering::Less);
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    #[test]
    fn test_enumerate_range_both_directions() {
        assert_eq!(
            Value::Range(1, 3).enumerate().unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(
            Value::Range(2, 1).enumerate().unwrap(),
            vec![Value::Int(2), Value::Int(1)]
        );
    }

    #[test]
    fn test_enumerate_map_yields_pairs() {
        let items = map(&[("a", Value::Int(1))]).enumerate().unwrap();
        assert_eq!(items, vec![Value::Tuple(vec![Value::str("a"), Value::Int(1)])]);
    }

    #[test]
    fn test_enumerate_string_fails() {
        assert!(matches!(
            Value::str("x").enumerate(),
            Err(RenderError::NotEnumerable { .. })
        ));
    }

    // =========================================================================
    // Inspect
    // =========================================================================

    #[test]
    fn test_inspect() {
        assert_eq!(Value::str("a\"b").to_string(), r#""a\"b""#);
        assert_eq!(Value::atom("ok").to_string(), ":ok");
        assert_eq!(Value::atom("with space").to_string(), r#":"with space""#);
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::Nil]).to_string(),
            "{1, nil}"
        );
        assert_eq!(Value::Range(1, 4).to_string(), "1..4");
        assert_eq!(
            map(&[("data-id", Value::Int(1)), ("b", Value::Bool(true))]).to_string(),
            r#"%{b: true, "data-id" => 1}"#
        );
    }

    #[test]
    fn test_inspect_keyword_list() {
        let kw = Value::List(vec![Value::Tuple(vec![Value::atom("id"), Value::Int(1)])]);
        assert_eq!(kw.to_string(), "[id: 1]");
    }

    // =========================================================================
    // Slots
    // =========================================================================

    #[test]
    fn test_empty_slot_fails_loudly() {
        let slot = Slot::new("inner_block");
        assert_eq!(
            slot.render(Value::Nil).unwrap_err(),
            RenderError::NoInnerBlock {
                slot: "inner_block".into()
            }
        );
    }

    #[test]
    fn test_self_closing_entry_has_no_content() {
        let entry = SlotEntry::new("col", Assigns::new(), None);
        assert_eq!(
            entry.render(Value::Nil).unwrap_err(),
            RenderError::NoInnerContent { slot: "col".into() }
        );
    }

    #[test]
    fn test_slot_renders_entries_in_order() {
        let entry = |text: &'static str| {
            let render: SlotRender = Arc::new(move |_| Ok(Safe::raw(text)));
            Arc::new(SlotEntry::new("item", Assigns::new(), Some(render)))
        };
        let slot = Slot {
            name: "item".into(),
            entries: vec![entry("a"), entry("b")],
        };
        assert_eq!(slot.render(Value::Nil).unwrap().to_string(), "ab");
    }

    // =========================================================================
    // Deserialize
    // =========================================================================

    #[test]
    fn test_deserialize_json() {
        let value: Value =
            serde_json::from_str(r#"{"a": [1, 2.5, "x", null, true], "b": {}}"#).unwrap();
        assert_eq!(
            value,
            map(&[
                (
                    "a",
                    Value::List(vec![
                        Value::Int(1),
                        Value::Float(2.5),
                        Value::str("x"),
                        Value::Nil,
                        Value::Bool(true),
                    ])
                ),
                ("b", Value::Map(BTreeMap::new())),
            ])
        );
    }

    #[test]
    fn test_deserialize_assigns() {
        let assigns: Assigns = serde_json::from_str(r#"{"flag": false}"#).unwrap();
        assert_eq!(assigns.get("flag"), Some(&Value::Bool(false)));
    }
}
