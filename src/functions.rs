//! Built-in functions.
//!
//! Every function is described by a [`FunctionDef`]: its arity, the types it
//! accepts per argument, whether it vectorizes over its first argument, and
//! whether it is deterministic. Deterministic calls on constant arguments are
//! folded at compile time.
//!
//! Vectorized functions applied to an array or object map over its values,
//! keeping the shape: `s_len(["ab", "c"])` is `[2, 1]`.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    num::NonZeroUsize,
    sync::Mutex,
};

use indexmap::IndexMap;
use lazy_static::lazy_static;
use lru::LruCache;
use rand::{Rng, rngs::StdRng};
use regex::Regex;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    evaluator::{ArgumentError, EvalError},
    json_parser::{parse_json, try_parse_number},
    output::{display_string, to_json},
    slice::wrap_index,
    value::{Dtype, Node, ObjectMap, Value, type_name},
};

type FnResult = Result<Node, EvalError>;

/// How a function is invoked.
#[derive(Debug, Clone, Copy)]
pub enum Builtin {
    /// Same output for the same arguments
    Pure(fn(&[Node]) -> FnResult),
    /// Draws from the evaluator's random number generator
    Random(fn(&[Node], &mut StdRng) -> FnResult),
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
    /// Accepted types per argument; the last entry covers any further arguments
    pub arg_types: &'static [Dtype],
    pub vectorized: bool,
    pub builtin: Builtin,
}

impl FunctionDef {
    pub fn is_deterministic(&self) -> bool {
        matches!(self.builtin, Builtin::Pure(_))
    }

    pub fn arg_type(&self, index: usize) -> Dtype {
        self.arg_types
            .get(index)
            .or(self.arg_types.last())
            .copied()
            .unwrap_or(Dtype::ANYTHING)
    }

    pub fn check_arity(&self, count: usize) -> Result<(), ArgumentError> {
        if count < self.min_args {
            return Err(ArgumentError::new(
                self.name,
                count,
                format!("expected at least {} arguments, got {}", self.min_args, count),
            ));
        }
        if let Some(max) = self.max_args
            && count > max
        {
            return Err(ArgumentError::new(
                self.name,
                max,
                format!("expected at most {} arguments, got {}", max, count),
            ));
        }
        Ok(())
    }

    pub fn check_arg(&self, index: usize, arg: &Node) -> Result<(), ArgumentError> {
        let expected = self.arg_type(index);
        // omitted optional arguments are null
        if expected.contains(arg.dtype()) || (index >= self.min_args && matches!(arg.value, Value::Null)) {
            Ok(())
        } else {
            Err(ArgumentError::new(
                self.name,
                index,
                format!("expected {}, instead got {}", expected, arg.value.type_name()),
            ))
        }
    }

    /// Validate arity and types, pad optional arguments with null, and call.
    pub fn call(&self, mut args: Vec<Node>, rng: &mut StdRng) -> FnResult {
        self.check_arity(args.len())?;
        if let Some(max) = self.max_args {
            args.resize(max, Node::null());
        }
        for (i, arg) in args.iter().enumerate().skip(usize::from(self.vectorized)) {
            self.check_arg(i, arg)?;
        }
        if !self.vectorized {
            return self.invoke(&args, rng);
        }

        let rest = args.split_off(1.min(args.len()));
        let Some(first) = args.pop() else {
            return self.invoke(&rest, rng);
        };
        let mut apply = |x: Node| -> FnResult {
            self.check_arg(0, &x)?;
            let mut call_args = Vec::with_capacity(rest.len() + 1);
            call_args.push(x);
            call_args.extend(rest.iter().cloned());
            self.invoke(&call_args, rng)
        };
        match first.value {
            Value::Array(arr) => Ok(Node::array(arr.into_iter().map(&mut apply).collect::<Result<_, _>>()?)),
            Value::Object(obj) => Ok(Node::object(
                obj.into_iter()
                    .map(|(k, v)| apply(v).map(|r| (k, r)))
                    .collect::<Result<_, _>>()?,
            )),
            _ => apply(first),
        }
    }

    fn invoke(&self, args: &[Node], rng: &mut StdRng) -> FnResult {
        match self.builtin {
            Builtin::Pure(f) => f(args),
            Builtin::Random(f) => f(args, rng),
        }
    }
}

macro_rules! function {
    ($name:literal, $min:expr, $max:expr, [$($ty:expr),*], $vec:expr, $builtin:expr) => {
        (
            $name,
            FunctionDef {
                name: $name,
                min_args: $min,
                max_args: $max,
                arg_types: Box::leak(Box::new([$($ty),*])),
                vectorized: $vec,
                builtin: $builtin,
            },
        )
    };
}

lazy_static! {
    pub static ref FUNCTIONS: HashMap<&'static str, FunctionDef> = {
        use Builtin::{Pure, Random};
        use Dtype as D;
        let defs = [
            // ========================================
            // Whole-argument functions
            // ========================================
            function!("add_items", 3, None, [D::OBJ, D::STR, D::ANYTHING], false, Pure(add_items)),
            function!("all", 1, Some(1), [D::ARR], false, Pure(all)),
            function!("any", 1, Some(1), [D::ARR], false, Pure(any)),
            function!("append", 2, None, [D::ARR, D::ANYTHING], false, Pure(append)),
            function!("at", 2, Some(2), [D::ITERABLE, D::INT | D::STR | D::ARR], false, Pure(at)),
            function!("avg", 1, Some(1), [D::ARR], false, Pure(mean)),
            function!("concat", 2, None, [D::ITERABLE], false, Pure(concat)),
            function!("dict", 1, Some(1), [D::ARR], false, Pure(dict)),
            function!("enumerate", 1, Some(1), [D::ARR], false, Pure(enumerate)),
            function!("flatten", 1, Some(2), [D::ARR, D::INT], false, Pure(flatten)),
            function!("group_by", 2, Some(2), [D::ARR, D::STR | D::INT], false, Pure(group_by)),
            function!("in", 2, Some(2), [D::ANYTHING, D::ITERABLE], false, Pure(is_in)),
            function!("index", 2, Some(3), [D::ARR, D::SCALAR, D::BOOL], false, Pure(index)),
            function!("items", 1, Some(1), [D::OBJ], false, Pure(items)),
            function!("keys", 1, Some(1), [D::OBJ], false, Pure(keys)),
            function!("len", 1, Some(1), [D::ITERABLE], false, Pure(len)),
            function!("max", 1, Some(1), [D::ARR], false, Pure(max)),
            function!("max_by", 2, Some(2), [D::ARR, D::STR | D::INT], false, Pure(max_by)),
            function!("mean", 1, Some(1), [D::ARR], false, Pure(mean)),
            function!("min", 1, Some(1), [D::ARR], false, Pure(min)),
            function!("min_by", 2, Some(2), [D::ARR, D::STR | D::INT], false, Pure(min_by)),
            function!("pivot", 3, None, [D::ARR, D::STR | D::INT], false, Pure(pivot)),
            function!("quantile", 2, Some(2), [D::ARR, D::FLOAT_OR_INT], false, Pure(quantile)),
            function!("rand", 0, Some(0), [], false, Random(rand_float)),
            function!("randint", 1, Some(2), [D::INT], false, Random(randint)),
            function!("range", 1, Some(3), [D::INT], false, Pure(range)),
            function!("s_csv", 2, Some(5), [D::STR, D::INT, D::STR], false, Pure(s_csv)),
            function!("s_join", 2, Some(2), [D::STR, D::ARR], false, Pure(s_join)),
            function!("sort_by", 2, Some(3), [D::ARR, D::STR | D::INT, D::BOOL], false, Pure(sort_by)),
            function!("sorted", 1, Some(2), [D::ARR, D::BOOL], false, Pure(sorted)),
            function!("sum", 1, Some(1), [D::ARR], false, Pure(sum)),
            function!("unique", 1, Some(2), [D::ARR, D::BOOL], false, Pure(unique)),
            function!("value_counts", 1, Some(1), [D::ARR], false, Pure(value_counts)),
            function!("values", 1, Some(1), [D::OBJ], false, Pure(values)),
            function!("zip", 2, None, [D::ARR], false, Pure(zip)),
            // ========================================
            // Vectorized functions
            // ========================================
            function!("abs", 1, Some(1), [D::FLOAT_OR_INT], true, Pure(abs)),
            function!("float", 1, Some(1), [D::SCALAR], true, Pure(to_float)),
            function!("ifelse", 3, Some(3), [D::ANYTHING], true, Pure(ifelse)),
            function!("int", 1, Some(1), [D::SCALAR], true, Pure(to_int)),
            function!("is_expr", 1, Some(1), [D::ANYTHING], true, Pure(is_expr)),
            function!("is_num", 1, Some(1), [D::ANYTHING], true, Pure(is_num)),
            function!("is_str", 1, Some(1), [D::ANYTHING], true, Pure(is_str)),
            function!("isna", 1, Some(1), [D::ANYTHING], true, Pure(isna)),
            function!("isnull", 1, Some(1), [D::ANYTHING], true, Pure(isnull)),
            function!("log", 1, Some(2), [D::NUM, D::FLOAT_OR_INT], true, Pure(log)),
            function!("log2", 1, Some(1), [D::NUM], true, Pure(log2)),
            function!("not", 1, Some(1), [D::BOOL], true, Pure(not)),
            function!("parse", 1, Some(1), [D::STR], true, Pure(parse)),
            function!("round", 1, Some(2), [D::NUM, D::INT], true, Pure(round)),
            function!("s_count", 2, Some(2), [D::STR, D::STR_OR_REGEX], true, Pure(s_count)),
            function!("s_find", 2, Some(2), [D::STR, D::REGEX], true, Pure(s_find)),
            function!("s_len", 1, Some(1), [D::STR], true, Pure(s_len)),
            function!("s_lower", 1, Some(1), [D::STR], true, Pure(s_lower)),
            function!("s_mul", 2, Some(2), [D::STR, D::INT], true, Pure(s_mul)),
            function!("s_slice", 2, Some(2), [D::STR, D::INT_OR_SLICE], true, Pure(s_slice)),
            function!("s_split", 1, Some(2), [D::STR, D::STR_OR_REGEX], true, Pure(s_split)),
            function!("s_strip", 1, Some(1), [D::STR], true, Pure(s_strip)),
            function!("s_sub", 3, Some(3), [D::STR, D::STR_OR_REGEX, D::STR], true, Pure(s_sub)),
            function!("s_upper", 1, Some(1), [D::STR], true, Pure(s_upper)),
            function!("str", 1, Some(1), [D::ANYTHING], true, Pure(to_str)),
        ];
        defs.into_iter().collect()
    };

    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(128).unwrap_or(NonZeroUsize::MIN)));
}

pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    FUNCTIONS.get(name)
}

/// Compile `pattern`, reusing a previous compilation when possible.
pub fn cached_regex(pattern: &str) -> Result<Regex, EvalError> {
    let mut cache = REGEX_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| EvalError::Regex(e.to_string()))?;
    cache.push(pattern.to_string(), re.clone());
    Ok(re)
}

// ========================================
// Argument helpers
// ========================================

fn array_arg<'a>(args: &'a [Node], i: usize) -> Result<&'a [Node], EvalError> {
    match args.get(i).map(|n| &n.value) {
        Some(Value::Array(arr)) => Ok(arr),
        Some(v) => Err(EvalError::TypeMismatch(format!("Expected an array, got {}", type_name(v)))),
        None => Err(EvalError::Custom(format!("Missing argument {}", i))),
    }
}

fn object_arg<'a>(args: &'a [Node], i: usize) -> Result<&'a ObjectMap, EvalError> {
    match args.get(i).map(|n| &n.value) {
        Some(Value::Object(obj)) => Ok(obj),
        Some(v) => Err(EvalError::TypeMismatch(format!("Expected an object, got {}", type_name(v)))),
        None => Err(EvalError::Custom(format!("Missing argument {}", i))),
    }
}

fn str_arg<'a>(args: &'a [Node], i: usize) -> Result<&'a str, EvalError> {
    match args.get(i).map(|n| &n.value) {
        Some(Value::Str(s)) => Ok(s),
        Some(v) => Err(EvalError::TypeMismatch(format!("Expected a string, got {}", type_name(v)))),
        None => Err(EvalError::Custom(format!("Missing argument {}", i))),
    }
}

fn opt_int_arg(args: &[Node], i: usize) -> Option<i64> {
    match args.get(i).map(|n| &n.value) {
        Some(Value::Int(n)) => Some(*n),
        _ => None,
    }
}

fn opt_bool_arg(args: &[Node], i: usize) -> bool {
    matches!(args.get(i).map(|n| &n.value), Some(Value::Bool(true)))
}

fn opt_str_arg<'a>(args: &'a [Node], i: usize, default: &'a str) -> &'a str {
    match args.get(i).map(|n| &n.value) {
        Some(Value::Str(s)) => s,
        _ => default,
    }
}

fn numbers(arr: &[Node], fname: &str) -> Result<Vec<f64>, EvalError> {
    arr.iter()
        .map(|n| {
            n.value.as_f64().ok_or_else(|| {
                EvalError::TypeMismatch(format!("Function {} requires an array of all numbers", fname))
            })
        })
        .collect()
}

/// Sort by a fallible key comparison, failing up front if any two neighbours
/// cannot be compared.
fn sort_nodes<K>(nodes: &mut [Node], key: K) -> Result<(), EvalError>
where
    K: Fn(&Node) -> Result<&Value, EvalError>,
{
    for pair in nodes.windows(2) {
        key(&pair[0])?
            .compare_to(key(&pair[1])?)
            .map_err(EvalError::TypeMismatch)?;
    }
    nodes.sort_by(|a, b| match (key(a), key(b)) {
        (Ok(x), Ok(y)) => x.compare_to(y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    });
    Ok(())
}

/// Child of a row used by `sort_by`, `group_by` and friends: `key` is a
/// string for rows that are objects and an int for rows that are arrays.
fn row_field<'a>(row: &'a Node, key: &Node) -> Result<&'a Node, EvalError> {
    match (&row.value, &key.value) {
        (Value::Object(obj), Value::Str(k)) => obj
            .get(k)
            .ok_or_else(|| EvalError::Custom(format!("Object has no key {}", to_json(key)))),
        (Value::Array(arr), Value::Int(i)) => wrap_index(*i, arr.len())
            .map(|i| &arr[i])
            .ok_or(EvalError::IndexOutOfRange { index: *i, len: arr.len() }),
        (row, key) => Err(EvalError::TypeMismatch(format!(
            "Cannot index {} with {}",
            type_name(row),
            type_name(key)
        ))),
    }
}

/// Stable identity of a value for hashing: ints and floats stay distinct.
fn hash_key(node: &Node) -> String {
    format!("{}:{}", node.value.type_name(), to_json(node))
}

// ========================================
// Whole-argument functions
// ========================================

fn add_items(args: &[Node]) -> FnResult {
    let mut obj = object_arg(args, 0)?.clone();
    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        return Err(EvalError::Custom("add_items requires key-value pairs after the object".to_string()));
    }
    for pair in pairs.chunks(2) {
        let Value::Str(k) = &pair[0].value else {
            return Err(EvalError::TypeMismatch(
                "Even-numbered args to 'add_items' function (new keys) must be strings".to_string(),
            ));
        };
        obj.insert(k.clone(), pair[1].clone());
    }
    Ok(Node::object(obj))
}

fn all(args: &[Node]) -> FnResult {
    let mut result = true;
    for x in array_arg(args, 0)? {
        match x.value {
            Value::Bool(b) => result &= b,
            _ => return Err(EvalError::TypeMismatch("all requires an array of booleans".to_string())),
        }
    }
    Ok(Node::from(result))
}

fn any(args: &[Node]) -> FnResult {
    let mut result = false;
    for x in array_arg(args, 0)? {
        match x.value {
            Value::Bool(b) => result |= b,
            _ => return Err(EvalError::TypeMismatch("any requires an array of booleans".to_string())),
        }
    }
    Ok(Node::from(result))
}

fn append(args: &[Node]) -> FnResult {
    let mut arr = array_arg(args, 0)?.to_vec();
    arr.extend(args[1..].iter().cloned());
    Ok(Node::array(arr))
}

fn at(args: &[Node]) -> FnResult {
    fn one(target: &Node, idx: &Node) -> FnResult {
        match (&target.value, &idx.value) {
            (Value::Array(arr), Value::Int(i)) => wrap_index(*i, arr.len())
                .map(|i| arr[i].clone())
                .ok_or(EvalError::IndexOutOfRange { index: *i, len: arr.len() }),
            (Value::Object(obj), Value::Str(k)) => obj
                .get(k)
                .cloned()
                .ok_or_else(|| EvalError::Custom(format!("Object has no key {}", to_json(idx)))),
            (t, i) => Err(EvalError::TypeMismatch(format!(
                "at: cannot index {} with {}",
                type_name(t),
                type_name(i)
            ))),
        }
    }
    match &args[1].value {
        Value::Array(indices) => Ok(Node::array(
            indices.iter().map(|i| one(&args[0], i)).collect::<Result<_, _>>()?,
        )),
        _ => one(&args[0], &args[1]),
    }
}

fn concat(args: &[Node]) -> FnResult {
    let mismatch = || {
        EvalError::TypeMismatch(
            "All arguments to the 'concat' function must the same type - either arrays or objects".to_string(),
        )
    };
    match &args[0].value {
        Value::Array(first) => {
            let mut out = first.clone();
            for arg in &args[1..] {
                let Value::Array(arr) = &arg.value else {
                    return Err(mismatch());
                };
                out.extend(arr.iter().cloned());
            }
            Ok(Node::array(out))
        }
        Value::Object(first) => {
            let mut out = first.clone();
            for arg in &args[1..] {
                let Value::Object(obj) = &arg.value else {
                    return Err(mismatch());
                };
                for (k, v) in obj {
                    out.insert(k.clone(), v.clone());
                }
            }
            Ok(Node::object(out))
        }
        _ => Err(mismatch()),
    }
}

fn dict(args: &[Node]) -> FnResult {
    let mut out = ObjectMap::new();
    for pair in array_arg(args, 0)? {
        match &pair.value {
            Value::Array(kv) if kv.len() == 2 => match &kv[0].value {
                Value::Str(k) => {
                    out.insert(k.clone(), kv[1].clone());
                }
                _ => {
                    return Err(EvalError::TypeMismatch(
                        "dict requires every pair to start with a string key".to_string(),
                    ));
                }
            },
            _ => {
                return Err(EvalError::TypeMismatch(
                    "dict requires an array of [key, value] pairs".to_string(),
                ));
            }
        }
    }
    Ok(Node::object(out))
}

fn enumerate(args: &[Node]) -> FnResult {
    Ok(Node::array(
        array_arg(args, 0)?
            .iter()
            .enumerate()
            .map(|(i, x)| Node::array(vec![Node::from(i as i64), x.clone()]))
            .collect(),
    ))
}

fn flatten(args: &[Node]) -> FnResult {
    let depth = opt_int_arg(args, 1).unwrap_or(1);
    let mut flat = array_arg(args, 0)?.to_vec();
    for _ in 0..depth {
        let mut next = Vec::with_capacity(flat.len());
        for child in flat {
            match child.value {
                Value::Array(grandchildren) => next.extend(grandchildren),
                _ => next.push(child),
            }
        }
        flat = next;
    }
    Ok(Node::array(flat))
}

fn group_by(args: &[Node]) -> FnResult {
    let mut groups: IndexMap<String, Vec<Node>> = IndexMap::new();
    for row in array_arg(args, 0)? {
        let key = display_string(row_field(row, &args[1])?);
        groups.entry(key).or_default().push(row.clone());
    }
    Ok(Node::object(groups.into_iter().map(|(k, v)| (k, Node::array(v))).collect()))
}

fn is_in(args: &[Node]) -> FnResult {
    let elt = &args[0];
    match &args[1].value {
        Value::Array(arr) => Ok(Node::from(arr.iter().any(|x| x.value.equals(&elt.value)))),
        Value::Object(obj) => match &elt.value {
            Value::Str(k) => Ok(Node::from(obj.contains_key(k))),
            _ => Err(EvalError::TypeMismatch(
                "'in' function first argument must be string if second argument is an object".to_string(),
            )),
        },
        v => Err(EvalError::TypeMismatch(format!("Cannot search for an element in {}", type_name(v)))),
    }
}

fn index(args: &[Node]) -> FnResult {
    let arr = array_arg(args, 0)?;
    let elt = &args[1];
    let found = if opt_bool_arg(args, 2) {
        arr.iter().rposition(|x| x.value.equals(&elt.value))
    } else {
        arr.iter().position(|x| x.value.equals(&elt.value))
    };
    found
        .map(|i| Node::from(i as i64))
        .ok_or_else(|| EvalError::Custom(format!("Element {} not found in the array", to_json(elt))))
}

fn items(args: &[Node]) -> FnResult {
    Ok(Node::array(
        object_arg(args, 0)?
            .iter()
            .map(|(k, v)| Node::array(vec![Node::from(k.as_str()), v.clone()]))
            .collect(),
    ))
}

fn keys(args: &[Node]) -> FnResult {
    Ok(Node::array(object_arg(args, 0)?.keys().map(|k| Node::from(k.as_str())).collect()))
}

fn values(args: &[Node]) -> FnResult {
    Ok(Node::array(object_arg(args, 0)?.values().cloned().collect()))
}

fn len(args: &[Node]) -> FnResult {
    args[0]
        .len()
        .map(|n| Node::from(n as i64))
        .ok_or_else(|| EvalError::TypeMismatch(format!("len requires an iterable, got {}", args[0].value.type_name())))
}

fn extreme(args: &[Node], fname: &str, want: Ordering) -> FnResult {
    let arr = array_arg(args, 0)?;
    numbers(arr, fname)?;
    let mut best: Option<&Node> = None;
    for x in arr {
        if let Some(b) = best
            && x.value.compare_to(&b.value).map_err(EvalError::TypeMismatch)? != want
        {
            continue;
        }
        best = Some(x);
    }
    Ok(best.cloned().unwrap_or_else(|| {
        Node::from(if want == Ordering::Greater { f64::NEG_INFINITY } else { f64::INFINITY })
    }))
}

fn max(args: &[Node]) -> FnResult {
    extreme(args, "max", Ordering::Greater)
}

fn min(args: &[Node]) -> FnResult {
    extreme(args, "min", Ordering::Less)
}

fn extreme_by(args: &[Node], want: Ordering) -> FnResult {
    let mut best: Option<(&Node, &Node)> = None;
    for row in array_arg(args, 0)? {
        let field = row_field(row, &args[1])?;
        if let Some((_, best_field)) = best
            && field.value.compare_to(&best_field.value).map_err(EvalError::TypeMismatch)? != want
        {
            continue;
        }
        best = Some((row, field));
    }
    Ok(best.map(|(row, _)| row.clone()).unwrap_or_else(Node::null))
}

fn max_by(args: &[Node]) -> FnResult {
    extreme_by(args, Ordering::Greater)
}

fn min_by(args: &[Node]) -> FnResult {
    extreme_by(args, Ordering::Less)
}

fn sum(args: &[Node]) -> FnResult {
    Ok(Node::from(numbers(array_arg(args, 0)?, "sum")?.iter().sum::<f64>()))
}

fn mean(args: &[Node]) -> FnResult {
    let nums = numbers(array_arg(args, 0)?, "mean")?;
    Ok(Node::from(nums.iter().sum::<f64>() / nums.len() as f64))
}

/// Group the `val` column by the `by` column, then add every `uniq_ct`-th
/// value of each index column, where `uniq_ct` is the number of groups.
fn pivot(args: &[Node]) -> FnResult {
    let rows = array_arg(args, 0)?;
    let (by, val) = (&args[1], &args[2]);
    let mut out: IndexMap<String, Vec<Node>> = IndexMap::new();
    for row in rows {
        let key = display_string(row_field(row, by)?);
        out.entry(key).or_default().push(row_field(row, val)?.clone());
    }
    let uniq_ct = out.len().max(1);
    for idx_col in &args[3..] {
        let column = rows
            .iter()
            .step_by(uniq_ct)
            .map(|row| row_field(row, idx_col).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        out.insert(display_string(idx_col), column);
    }
    Ok(Node::object(out.into_iter().map(|(k, v)| (k, Node::array(v))).collect()))
}

fn quantile(args: &[Node]) -> FnResult {
    let mut sorted = numbers(array_arg(args, 0)?, "quantile")?;
    let q = args[1].value.as_f64().unwrap_or(f64::NAN);
    if !(0.0..=1.0).contains(&q) {
        return Err(EvalError::Custom(format!("Quantile must be between 0 and 1, got {}", q)));
    }
    if sorted.is_empty() {
        return Err(EvalError::Custom("Cannot find quantiles of an empty array".to_string()));
    }
    sorted.sort_by(f64::total_cmp);
    let ind = q * (sorted.len() - 1) as f64;
    let lower = ind.floor() as usize;
    let frac = ind - lower as f64;
    let result = match sorted.get(lower + 1) {
        Some(upper) if frac > 0.0 => upper * frac + sorted[lower] * (1.0 - frac),
        _ => sorted[lower],
    };
    Ok(Node::from(result))
}

fn rand_float(_args: &[Node], rng: &mut StdRng) -> FnResult {
    Ok(Node::from(rng.r#gen::<f64>()))
}

/// `randint(n)` is in `[0, n)`, `randint(a, b)` in `[a, b)`.
fn randint(args: &[Node], rng: &mut StdRng) -> FnResult {
    let (lo, hi) = match (opt_int_arg(args, 0), opt_int_arg(args, 1)) {
        (Some(a), Some(b)) => (a, b),
        (Some(n), None) => (0, n),
        _ => return Err(EvalError::Custom("randint requires an integer bound".to_string())),
    };
    if lo >= hi {
        return Err(EvalError::Custom(format!("randint range [{}, {}) is empty", lo, hi)));
    }
    Ok(Node::from(rng.gen_range(lo..hi)))
}

fn range(args: &[Node]) -> FnResult {
    let (start, stop, step) = match (opt_int_arg(args, 0), opt_int_arg(args, 1), opt_int_arg(args, 2)) {
        (Some(stop), None, _) => (0, stop, 1),
        (Some(start), Some(stop), step) => (start, stop, step.unwrap_or(1)),
        _ => return Err(EvalError::Custom("First argument for range function cannot be null".to_string())),
    };
    if step == 0 {
        return Err(EvalError::Custom("Can't have a step size of 0 for the range function".to_string()));
    }
    let mut nums = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        nums.push(Node::from(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Node::array(nums))
}

/// `s_csv(text, ncols, delim=",", newline="\n", quote="\"")`
///
/// Fields may be quoted; a doubled quote inside a quoted field is a literal
/// quote. Returns an array of rows, or an array of strings when `ncols` is 1.
/// A trailing newline is allowed.
fn s_csv(args: &[Node]) -> FnResult {
    let text = str_arg(args, 0)?;
    let ncols = opt_int_arg(args, 1).filter(|n| *n > 0).ok_or_else(|| {
        EvalError::Custom("s_csv requires a positive number of columns".to_string())
    })? as usize;
    let delim = opt_str_arg(args, 2, ",");
    let newline = opt_str_arg(args, 3, "\n");
    let quote = opt_str_arg(args, 4, "\"");
    let field_re = cached_regex(&format!(
        "^(?:{q}((?:[^{qc}]|{q}{q})*){q}|([^{dc}{qc}\\r\\n]*))",
        q = regex::escape(quote),
        qc = regex::escape(quote),
        dc = regex::escape(delim),
    ))?;
    let doubled = format!("{}{}", quote, quote);

    let mut rows = Vec::new();
    let mut rest = text;
    let mut row_num = 0;
    while !rest.is_empty() {
        let mut row = Vec::with_capacity(ncols);
        for col in 0..ncols {
            let caps = field_re.captures(rest).ok_or_else(|| {
                EvalError::Custom(format!("s_csv: could not read field {} of row {}", col, row_num))
            })?;
            let whole = caps.get(0).map_or(0, |m| m.end());
            let field = match (caps.get(1), caps.get(2)) {
                (Some(quoted), _) => quoted.as_str().replace(&doubled, quote),
                (None, Some(bare)) => bare.as_str().to_string(),
                (None, None) => String::new(),
            };
            row.push(Node::from(field));
            rest = &rest[whole..];
            let sep = if col + 1 < ncols { delim } else { newline };
            if let Some(after) = rest.strip_prefix(sep) {
                rest = after;
            } else if col + 1 < ncols || !(rest.is_empty() || rest.starts_with('\r')) {
                return Err(EvalError::Custom(format!(
                    "s_csv: row {} does not have {} columns",
                    row_num, ncols
                )));
            } else if let Some(after) = rest.strip_prefix('\r') {
                rest = after.strip_prefix(newline).unwrap_or(after);
            }
        }
        rows.push(if ncols == 1 {
            row.pop().unwrap_or_else(Node::null)
        } else {
            Node::array(row)
        });
        row_num += 1;
    }
    Ok(Node::array(rows))
}

fn s_join(args: &[Node]) -> FnResult {
    let sep = str_arg(args, 0)?;
    let parts = array_arg(args, 1)?
        .iter()
        .map(|x| {
            x.value
                .as_str()
                .ok_or_else(|| EvalError::TypeMismatch("s_join requires an array of strings".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Node::from(parts.join(sep)))
}

fn sorted(args: &[Node]) -> FnResult {
    let mut arr = array_arg(args, 0)?.to_vec();
    sort_nodes(&mut arr, |n| Ok(&n.value))?;
    if opt_bool_arg(args, 1) {
        arr.reverse();
    }
    Ok(Node::array(arr))
}

fn sort_by(args: &[Node]) -> FnResult {
    let mut arr = array_arg(args, 0)?.to_vec();
    let key = &args[1];
    sort_nodes(&mut arr, |row| row_field(row, key).map(|f| &f.value))?;
    if opt_bool_arg(args, 2) {
        arr.reverse();
    }
    Ok(Node::array(arr))
}

fn unique(args: &[Node]) -> FnResult {
    let mut seen = HashSet::new();
    let mut out: Vec<Node> = array_arg(args, 0)?
        .iter()
        .filter(|x| seen.insert(hash_key(x)))
        .cloned()
        .collect();
    if opt_bool_arg(args, 1) {
        sort_nodes(&mut out, |n| Ok(&n.value))?;
    }
    Ok(Node::array(out))
}

/// `[[value, count], ...]` in order of first appearance.
fn value_counts(args: &[Node]) -> FnResult {
    let mut counts: IndexMap<String, (Node, i64)> = IndexMap::new();
    for x in array_arg(args, 0)? {
        counts.entry(hash_key(x)).or_insert_with(|| (x.clone(), 0)).1 += 1;
    }
    Ok(Node::array(
        counts
            .into_values()
            .map(|(x, ct)| Node::array(vec![x, Node::from(ct)]))
            .collect(),
    ))
}

fn zip(args: &[Node]) -> FnResult {
    let arrays = (0..args.len()).map(|i| array_arg(args, i)).collect::<Result<Vec<_>, _>>()?;
    let n = arrays[0].len();
    if arrays.iter().any(|a| a.len() != n) {
        return Err(EvalError::ShapeMismatch(
            "The `zip` function expects all input arrays to have equal length".to_string(),
        ));
    }
    Ok(Node::array(
        (0..n)
            .map(|i| Node::array(arrays.iter().map(|a| a[i].clone()).collect()))
            .collect(),
    ))
}

// ========================================
// Vectorized functions
// ========================================

fn abs(args: &[Node]) -> FnResult {
    match args[0].value {
        Value::Int(n) => Ok(Node::from(n.checked_abs().map_or(Value::Float((n as f64).abs()), Value::Int))),
        Value::Float(f) => Ok(Node::from(f.abs())),
        ref v => Err(EvalError::TypeMismatch(format!("abs requires a number, got {}", type_name(v)))),
    }
}

fn to_float(args: &[Node]) -> FnResult {
    let x = &args[0];
    let parsed;
    let value = match &x.value {
        Value::Str(s) => {
            parsed = try_parse_number(s.trim());
            &parsed
        }
        v => v,
    };
    value
        .as_f64()
        .map(Node::from)
        .ok_or_else(|| EvalError::TypeMismatch(format!("Cannot convert {} to float", to_json(x))))
}

fn to_int(args: &[Node]) -> FnResult {
    let x = &args[0];
    match &x.value {
        Value::Int(n) => Ok(Node::from(*n)),
        Value::Bool(b) => Ok(Node::from(i64::from(*b))),
        Value::Float(f) if f.is_finite() => Ok(Node::from(f.round_ties_even() as i64)),
        Value::Str(s) => match try_parse_number(s.trim()) {
            Value::Int(n) => Ok(Node::from(n)),
            _ => Err(EvalError::TypeMismatch(format!("Cannot convert {} to int", to_json(x)))),
        },
        _ => Err(EvalError::TypeMismatch(format!("Cannot convert {} to int", to_json(x)))),
    }
}

fn to_str(args: &[Node]) -> FnResult {
    Ok(Node::from(display_string(&args[0])))
}

fn ifelse(args: &[Node]) -> FnResult {
    match args[0].value {
        Value::Bool(true) => Ok(args[1].clone()),
        Value::Bool(false) => Ok(args[2].clone()),
        ref v => Err(EvalError::TypeMismatch(format!("ifelse condition must be a bool, got {}", type_name(v)))),
    }
}

fn is_expr(args: &[Node]) -> FnResult {
    Ok(Node::from(args[0].is_iterable()))
}

fn is_num(args: &[Node]) -> FnResult {
    Ok(Node::from(Dtype::NUM.contains(args[0].dtype())))
}

fn is_str(args: &[Node]) -> FnResult {
    Ok(Node::from(matches!(args[0].value, Value::Str(_))))
}

fn isna(args: &[Node]) -> FnResult {
    Ok(Node::from(matches!(args[0].value, Value::Float(f) if f.is_nan())))
}

fn isnull(args: &[Node]) -> FnResult {
    Ok(Node::from(matches!(args[0].value, Value::Null)))
}

fn log(args: &[Node]) -> FnResult {
    let x = args[0].value.as_f64().unwrap_or(f64::NAN);
    Ok(Node::from(match args[1].value.as_f64() {
        Some(base) => x.log(base),
        None => x.ln(),
    }))
}

fn log2(args: &[Node]) -> FnResult {
    Ok(Node::from(args[0].value.as_f64().unwrap_or(f64::NAN).log2()))
}

fn not(args: &[Node]) -> FnResult {
    match args[0].value {
        Value::Bool(b) => Ok(Node::from(!b)),
        ref v => Err(EvalError::TypeMismatch(format!("Cannot negate {}", type_name(v)))),
    }
}

/// `{"result": <parsed>}` on success, `{"error": <message>}` otherwise.
fn parse(args: &[Node]) -> FnResult {
    let text = str_arg(args, 0)?;
    Ok(match parse_json(text) {
        Ok(node) => Node::object_from([("result", node)]),
        Err(e) => Node::object_from([("error", Node::from(e.to_string()))]),
    })
}

/// Ints are unchanged. Floats round half to even, to an int when no digit
/// count is given.
fn round(args: &[Node]) -> FnResult {
    let x = match args[0].value {
        Value::Int(n) => return Ok(Node::from(n)),
        Value::Bool(b) => return Ok(Node::from(i64::from(b))),
        Value::Float(f) => f,
        ref v => return Err(EvalError::TypeMismatch(format!("Cannot round {}", type_name(v)))),
    };
    if !x.is_finite() {
        return Ok(Node::from(x));
    }
    match opt_int_arg(args, 1) {
        None => Ok(Node::from(x.round_ties_even() as i64)),
        Some(digits) => {
            let rounded = Decimal::from_f64(x)
                .map(|d| d.round_dp(digits.clamp(0, 28) as u32))
                .and_then(|d| d.to_f64())
                .unwrap_or(x);
            Ok(Node::from(rounded))
        }
    }
}

fn s_count(args: &[Node]) -> FnResult {
    let s = str_arg(args, 0)?;
    let count = match &args[1].value {
        Value::Regex(re) => re.find_iter(s).count(),
        Value::Str(sub) if sub.is_empty() => s.chars().count() + 1,
        Value::Str(sub) => s.matches(sub.as_str()).count(),
        v => return Err(EvalError::TypeMismatch(format!("Cannot count {} in a string", type_name(v)))),
    };
    Ok(Node::from(count as i64))
}

fn s_find(args: &[Node]) -> FnResult {
    let s = str_arg(args, 0)?;
    let Value::Regex(re) = &args[1].value else {
        return Err(EvalError::TypeMismatch("s_find requires a regex".to_string()));
    };
    Ok(Node::array(re.find_iter(s).map(|m| Node::from(m.as_str())).collect()))
}

fn s_len(args: &[Node]) -> FnResult {
    Ok(Node::from(str_arg(args, 0)?.chars().count() as i64))
}

fn s_lower(args: &[Node]) -> FnResult {
    Ok(Node::from(str_arg(args, 0)?.to_lowercase()))
}

fn s_upper(args: &[Node]) -> FnResult {
    Ok(Node::from(str_arg(args, 0)?.to_uppercase()))
}

fn s_strip(args: &[Node]) -> FnResult {
    Ok(Node::from(str_arg(args, 0)?.trim()))
}

fn s_mul(args: &[Node]) -> FnResult {
    let n = opt_int_arg(args, 1).unwrap_or(0);
    Ok(Node::from(repeat_str(str_arg(args, 0)?, n)?))
}

/// Longest string, in bytes, that `s_mul` or `str * int` may build.
pub const MAX_REPEAT_LEN: usize = 1 << 26;

/// `s` repeated `n` times; a negative count gives the empty string.
pub fn repeat_str(s: &str, n: i64) -> Result<String, EvalError> {
    let n = usize::try_from(n).unwrap_or(0);
    match s.len().checked_mul(n) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(s.repeat(n)),
        _ => Err(EvalError::Custom(format!(
            "Repeating a string of length {} {} times exceeds the limit of {} bytes",
            s.len(),
            n,
            MAX_REPEAT_LEN
        ))),
    }
}

fn s_slice(args: &[Node]) -> FnResult {
    let s = str_arg(args, 0)?;
    match &args[1].value {
        Value::Slice(slice) => slice
            .slice_str(s)
            .map(Node::from)
            .map_err(|e| EvalError::Custom(e.to_string())),
        Value::Int(i) => {
            let chars: Vec<char> = s.chars().collect();
            wrap_index(*i, chars.len())
                .map(|idx| Node::from(chars[idx].to_string()))
                .ok_or(EvalError::IndexOutOfRange { index: *i, len: chars.len() })
        }
        v => Err(EvalError::TypeMismatch(format!("Cannot slice a string with {}", type_name(v)))),
    }
}

/// Split on a literal string, a regex, or (with no separator) runs of whitespace.
fn s_split(args: &[Node]) -> FnResult {
    let s = str_arg(args, 0)?;
    let parts: Vec<Node> = match &args[1].value {
        Value::Str(sep) if !sep.is_empty() => s.split(sep.as_str()).map(Node::from).collect(),
        Value::Regex(re) => re.split(s).map(Node::from).collect(),
        Value::Null => s.split_whitespace().map(Node::from).collect(),
        _ => return Err(EvalError::Custom("s_split separator cannot be empty".to_string())),
    };
    Ok(Node::array(parts))
}

/// Replace every occurrence of a literal string, or every regex match
/// (`$1` and friends expand to capture groups).
fn s_sub(args: &[Node]) -> FnResult {
    let s = str_arg(args, 0)?;
    let repl = str_arg(args, 2)?;
    match &args[1].value {
        Value::Str(sub) => Ok(Node::from(s.replace(sub.as_str(), repl))),
        Value::Regex(re) => Ok(Node::from(re.replace_all(s, repl).into_owned())),
        v => Err(EvalError::TypeMismatch(format!("Cannot substitute {} in a string", type_name(v)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn call(name: &str, args: Vec<Node>) -> FnResult {
        let mut rng = StdRng::seed_from_u64(0);
        lookup(name).ok_or_else(|| EvalError::Custom(name.to_string()))?.call(args, &mut rng)
    }

    fn strs(items: &[&str]) -> Node {
        Node::array(items.iter().map(|s| Node::from(*s)).collect())
    }

    #[test]
    fn test_vectorized_keeps_shape() {
        let out = call("s_len", vec![strs(&["ab", "c", ""])]).unwrap();
        assert_eq!(out, Node::array(vec![Node::from(2), Node::from(1), Node::from(0)]));
        let obj = Node::object_from([("a", Node::from("xyz"))]);
        assert_eq!(call("s_upper", vec![obj]).unwrap(), Node::object_from([("a", Node::from("XYZ"))]));
    }

    #[test]
    fn test_range_stops_before_overflow() {
        let out = call("range", vec![Node::from(i64::MAX - 1), Node::from(i64::MAX), Node::from(2)]).unwrap();
        assert_eq!(out, Node::array(vec![Node::from(i64::MAX - 1)]));
        let out = call("range", vec![Node::from(i64::MIN + 1), Node::from(i64::MIN), Node::from(-3)]).unwrap();
        assert_eq!(out, Node::array(vec![Node::from(i64::MIN + 1)]));
    }

    #[test]
    fn test_repeat_str_limit() {
        assert_eq!(repeat_str("ab", 2).unwrap(), "abab");
        assert_eq!(repeat_str("ab", -1).unwrap(), "");
        assert!(repeat_str("ab", i64::MAX).is_err());
        assert!(repeat_str("a", MAX_REPEAT_LEN as i64 + 1).is_err());
    }

    #[test]
    fn test_optional_args_padded() {
        let out = call("range", vec![Node::from(3)]).unwrap();
        assert_eq!(out, Node::array(vec![Node::from(0), Node::from(1), Node::from(2)]));
        let out = call("range", vec![Node::from(10), Node::from(4), Node::from(-2)]).unwrap();
        assert_eq!(out, Node::array(vec![Node::from(10), Node::from(8), Node::from(6)]));
    }

    #[test]
    fn test_arity_and_type_errors() {
        assert!(matches!(call("len", vec![]), Err(EvalError::Argument(_))));
        match call("s_len", vec![Node::from(1)]) {
            Err(EvalError::Argument(e)) => {
                assert_eq!(e.function, "s_len");
                assert_eq!(e.arg_index, 0);
            }
            other => panic!("expected argument error, got {:?}", other),
        }
    }

    #[test]
    fn test_s_csv() {
        let text = Node::from("a,b\n\"x,\"\"y\",2\n");
        let out = call("s_csv", vec![text, Node::from(2)]).unwrap();
        assert_eq!(out, Node::array(vec![strs(&["a", "b"]), strs(&["x,\"y", "2"])]));
        let bad = call("s_csv", vec![Node::from("a,b\nc\n"), Node::from(2)]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(call("round", vec![Node::from(2.5)]).unwrap(), Node::from(2));
        assert_eq!(call("round", vec![Node::from(1.2345), Node::from(2)]).unwrap(), Node::from(1.23));
    }

    #[test]
    fn test_randint_seeded_in_range() {
        for _ in 0..20 {
            let n = call("randint", vec![Node::from(3), Node::from(6)]).unwrap();
            assert!(matches!(n.value, Value::Int(3..=5)));
        }
    }
}
