use std::{cmp::Ordering, fmt, ops::BitOr};

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use regex::Regex;

use crate::slice::Slice;

/// Insertion-ordered map of keys to child nodes.
pub type ObjectMap = IndexMap<String, Node>;

/// A JSON value as produced by the parser or by query evaluation.
///
/// The distinction between integers and floats is preserved throughout:
/// integers that overflow 64 bits are promoted to floats at parse time,
/// and the query engine only produces floats where the operation requires it
/// (division, `sum`, `mean`, ...).
///
/// `Regex` and `Slice` never come out of the JSON parser. They exist so that
/// query literals (`` g`a+` ``, `1:3`) can be passed to functions as ordinary
/// values.
///
/// # Examples
///
/// ```
/// use remespath::value::{Node, Value};
///
/// let arr = Node::array(vec![Node::from(1), Node::from("two")]);
/// assert_eq!(arr.value.type_name(), "array");
/// assert_eq!(Node::from(2.5).value, Value::Float(2.5));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// JSON null
    Null,

    /// JSON boolean
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// Floating-point number, including NaN and the infinities
    Float(f64),

    /// UTF-8 string
    Str(String),

    /// Calendar date (`YYYY-MM-DD`), only produced when date parsing is on
    Date(NaiveDate),

    /// Date and time of day, only produced when date parsing is on
    DateTime(NaiveDateTime),

    /// Ordered sequence of owned children
    Array(Vec<Node>),

    /// Insertion-ordered mapping with unique keys
    Object(ObjectMap),

    /// Compiled regular expression (query literal only)
    Regex(Regex),

    /// Python-style slice (query literal only)
    Slice(Slice),
}

/// A [`Value`] plus the UTF-8 byte offset where it started in the source text.
///
/// Nodes built during query evaluation have position 0.
/// Equality ignores positions.
#[derive(Debug, Clone)]
pub struct Node {
    pub value: Value,
    pub position: usize,
}

impl Node {
    pub fn new(value: Value, position: usize) -> Self {
        Node { value, position }
    }

    pub fn null() -> Self {
        Node::new(Value::Null, 0)
    }

    pub fn array(children: Vec<Node>) -> Self {
        Node::new(Value::Array(children), 0)
    }

    pub fn object(children: ObjectMap) -> Self {
        Node::new(Value::Object(children), 0)
    }

    /// Build an object from `(key, child)` pairs, later keys overwriting earlier ones.
    pub fn object_from<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn dtype(&self) -> Dtype {
        self.value.dtype()
    }

    pub fn is_iterable(&self) -> bool {
        matches!(self.value, Value::Array(_) | Value::Object(_))
    }

    /// Number of children for arrays and objects, `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match &self.value {
            Value::Array(arr) => Some(arr.len()),
            Value::Object(obj) => Some(obj.len()),
            _ => None,
        }
    }

    pub fn get_key(&self, key: &str) -> Option<&Node> {
        match &self.value {
            Value::Object(obj) => obj.get(key),
            _ => None,
        }
    }

    pub fn get_index(&self, index: usize) -> Option<&Node> {
        match &self.value {
            Value::Array(arr) => arr.get(index),
            _ => None,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::new(value, 0)
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::from(Value::Int(n))
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::from(Value::Float(n))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::from(Value::Bool(b))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::from(Value::Str(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::from(Value::Str(s))
    }
}

/// Strict equality: same variant and same contents.
/// NaN equals NaN here so that parsed trees compare equal to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Str(a), Str(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w))
            }
            // pattern text, so compiled queries holding regexes compare equal
            (Regex(a), Regex(b)) => a.as_str() == b.as_str(),
            (Slice(a), Slice(b)) => a == b,
            _ => false,
        }
    }
}

/// Returns a human-readable type name for a Value
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "string",
        Value::Date(_) => "date",
        Value::DateTime(_) => "datetime",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Regex(_) => "regex",
        Value::Slice(_) => "slice",
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        type_name(self)
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            Value::Null => Dtype::NULL,
            Value::Bool(_) => Dtype::BOOL,
            Value::Int(_) => Dtype::INT,
            Value::Float(_) => Dtype::FLOAT,
            Value::Str(_) => Dtype::STR,
            Value::Date(_) => Dtype::DATE,
            Value::DateTime(_) => Dtype::DATETIME,
            Value::Array(_) => Dtype::ARR,
            Value::Object(_) => Dtype::OBJ,
            Value::Regex(_) => Dtype::REGEX,
            Value::Slice(_) => Dtype::SLICE,
        }
    }

    /// Numeric view of ints, floats and bools (true is 1).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Structural equality used by `==`, `in`, `index` and friends.
    ///
    /// Unlike `PartialEq`, ints and floats compare by numeric value,
    /// so `1 == 1.0` holds. Values of unrelated types are simply unequal,
    /// and a regex is never equal to anything.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Regex(_), _) | (_, Value::Regex(_)) => false,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Date(a), Value::DateTime(b)) | (Value::DateTime(b), Value::Date(a)) => {
                a.and_hms_opt(0, 0, 0).is_some_and(|d| d == *b)
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.value.equals(&y.value))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.value.equals(&w.value)))
            }
            _ => self == other,
        }
    }

    /// Ordering between two values.
    ///
    /// Numbers (ints, floats, bools) compare numerically with each other,
    /// strings ordinally, dates chronologically, arrays lexicographically.
    /// Null only compares with null. Anything else is an error.
    pub fn compare_to(&self, other: &Value) -> Result<Ordering, String> {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ok(Ordering::Equal),
            (Null, _) | (_, Null) => Err("Cannot compare null to non-null".to_string()),
            (Str(a), Str(b)) => Ok(a.cmp(b)),
            (Int(a), Int(b)) => Ok(a.cmp(b)),
            (Int(_) | Float(_) | Bool(_), Int(_) | Float(_) | Bool(_)) => {
                let (a, b) = (self.as_f64().unwrap_or(f64::NAN), other.as_f64().unwrap_or(f64::NAN));
                Ok(a.partial_cmp(&b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan())))
            }
            (Date(a), Date(b)) => Ok(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Ok(a.cmp(b)),
            (Date(a), DateTime(b)) => Ok(a.and_hms_opt(0, 0, 0).map_or(Ordering::Less, |d| d.cmp(b))),
            (DateTime(a), Date(b)) => Ok(b.and_hms_opt(0, 0, 0).map_or(Ordering::Greater, |d| a.cmp(&d))),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.value.compare_to(&y.value)? {
                        Ordering::Equal => continue,
                        ord => return Ok(ord),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (Object(_), Object(_)) if self.equals(other) => Ok(Ordering::Equal),
            (a, b) => Err(format!(
                "Cannot compare {} to {}",
                type_name(a),
                type_name(b)
            )),
        }
    }
}

/// Bitset of value types, used to declare what a function argument accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dtype(u16);

impl Dtype {
    pub const BOOL: Dtype = Dtype(1);
    pub const INT: Dtype = Dtype(1 << 1);
    pub const FLOAT: Dtype = Dtype(1 << 2);
    pub const STR: Dtype = Dtype(1 << 3);
    pub const NULL: Dtype = Dtype(1 << 4);
    pub const OBJ: Dtype = Dtype(1 << 5);
    pub const ARR: Dtype = Dtype(1 << 6);
    pub const REGEX: Dtype = Dtype(1 << 7);
    pub const SLICE: Dtype = Dtype(1 << 8);
    pub const DATE: Dtype = Dtype(1 << 9);
    pub const DATETIME: Dtype = Dtype(1 << 10);

    pub const FLOAT_OR_INT: Dtype = Dtype(Self::FLOAT.0 | Self::INT.0);
    pub const NUM: Dtype = Dtype(Self::FLOAT.0 | Self::INT.0 | Self::BOOL.0);
    pub const ITERABLE: Dtype = Dtype(Self::ARR.0 | Self::OBJ.0);
    pub const STR_OR_REGEX: Dtype = Dtype(Self::STR.0 | Self::REGEX.0);
    pub const INT_OR_SLICE: Dtype = Dtype(Self::INT.0 | Self::SLICE.0);
    pub const SCALAR: Dtype = Dtype(
        Self::NUM.0 | Self::STR.0 | Self::NULL.0 | Self::REGEX.0 | Self::DATE.0 | Self::DATETIME.0,
    );
    pub const ANYTHING: Dtype = Dtype(Self::SCALAR.0 | Self::ITERABLE.0 | Self::SLICE.0);

    pub fn contains(self, other: Dtype) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Dtype {
    type Output = Dtype;

    fn bitor(self, rhs: Dtype) -> Dtype {
        Dtype(self.0 | rhs.0)
    }
}

const DTYPE_NAMES: [(Dtype, &str); 11] = [
    (Dtype::BOOL, "bool"),
    (Dtype::INT, "int"),
    (Dtype::FLOAT, "float"),
    (Dtype::STR, "string"),
    (Dtype::NULL, "null"),
    (Dtype::OBJ, "object"),
    (Dtype::ARR, "array"),
    (Dtype::REGEX, "regex"),
    (Dtype::SLICE, "slice"),
    (Dtype::DATE, "date"),
    (Dtype::DATETIME, "datetime"),
];

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Dtype::ANYTHING {
            return write!(f, "anything");
        }
        let names: Vec<&str> = DTYPE_NAMES
            .iter()
            .filter(|(d, _)| self.contains(*d))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_display() {
        assert_eq!(Dtype::INT.to_string(), "int");
        assert_eq!(Dtype::FLOAT_OR_INT.to_string(), "int | float");
        assert_eq!(Dtype::ANYTHING.to_string(), "anything");
    }

    #[test]
    fn test_cross_type_number_compare() {
        let a = Value::Int(3);
        let b = Value::Float(3.5);
        assert_eq!(a.compare_to(&b), Ok(Ordering::Less));
        assert_eq!(b.compare_to(&a), Ok(Ordering::Greater));
        assert!(Value::Int(1).equals(&Value::Float(1.0)));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_null_compare_errors() {
        assert!(Value::Null.compare_to(&Value::Int(1)).is_err());
        assert!(Value::Str("a".into()).compare_to(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_regexes_are_never_equal() {
        let a = Value::Regex(Regex::new("a+").unwrap());
        let b = Value::Regex(Regex::new("a+").unwrap());
        assert!(!a.equals(&b));
        assert!(!a.equals(&Value::Str("a+".into())));
        assert!(a.compare_to(&b).is_err());
        assert_eq!(a, b);
    }
}
