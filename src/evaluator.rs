use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    fmt,
};

use rand::{SeedableRng, rngs::StdRng};
use regex::Regex;
use tracing::{debug, trace};

use crate::{
    ast::{BinOp, CompiledQuery, Expr, Indexer, IndexerKind, Program, Statement, UnaryOp},
    functions::{self, cached_regex},
    path::{self, Path, PathSegment},
    slice::{Slice, wrap_index},
    value::{Node, ObjectMap, Value, type_name},
};

/// Wrong arity or argument type for a built-in function.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentError {
    pub function: String,
    /// Zero-based position of the offending argument
    pub arg_index: usize,
    pub message: String,
}

impl ArgumentError {
    pub fn new(function: &str, arg_index: usize, message: impl Into<String>) -> Self {
        ArgumentError {
            function: function.to_string(),
            arg_index,
            message: message.into(),
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "For argument {} of function {}, {}",
            self.arg_index, self.function, self.message
        )
    }
}

impl std::error::Error for ArgumentError {}

/// Errors that can occur during query evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operation not defined for the given types
    TypeMismatch(String),

    /// Vectorized operands or boolean indices of different lengths or keys
    ShapeMismatch(String),

    /// Index past either end of an array or string
    IndexOutOfRange { index: i64, len: usize },

    /// Variable that was never bound
    UndefinedVariable(String),

    /// Variable used before its declaration
    ForwardReference(String),

    /// `for` over something other than an array
    LoopVarNotArray { name: String, type_name: &'static str },

    /// Mutation selector that does not address existing nodes of the input or a variable
    InvalidMutation(String),

    /// Integer division or modulo by zero
    DivisionByZero,

    /// Pattern that failed to compile
    Regex(String),

    /// Bad argument to a built-in function
    Argument(ArgumentError),

    /// Any other failure of a built-in function
    Custom(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::TypeMismatch(msg) => write!(f, "Type error: {}", msg),
            EvalError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            EvalError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for length {}", index, len)
            }
            EvalError::UndefinedVariable(name) => write!(f, "Undefined variable: {}", name),
            EvalError::ForwardReference(name) => {
                write!(f, "Variable {} was referenced before it was declared", name)
            }
            EvalError::LoopVarNotArray { name, type_name } => {
                write!(f, "Loop variable {} must be an array, got {}", name, type_name)
            }
            EvalError::InvalidMutation(msg) => write!(f, "Invalid mutation: {}", msg),
            EvalError::DivisionByZero => write!(f, "Division by zero"),
            EvalError::Regex(msg) => write!(f, "Regex error: {}", msg),
            EvalError::Argument(e) => write!(f, "{}", e),
            EvalError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<ArgumentError> for EvalError {
    fn from(e: ArgumentError) -> Self {
        EvalError::Argument(e)
    }
}

// ========================================
// Selections
// ========================================

/// A node picked out by one indexer step.
struct Selected<'x> {
    /// Key in the parent object, for selections that rebuild an object
    key: Option<String>,
    /// Location relative to the indexed node; `None` for computed nodes
    path: Option<Path>,
    node: Cow<'x, Node>,
}

impl<'x> Selected<'x> {
    fn child(segment: PathSegment, node: &'x Node) -> Self {
        let key = match &segment {
            PathSegment::Key(k) => Some(k.clone()),
            PathSegment::Index(_) => None,
        };
        Selected {
            key,
            path: Some(Path::from(segment)),
            node: Cow::Borrowed(node),
        }
    }

    fn computed(key: Option<String>, node: Node) -> Self {
        Selected {
            key,
            path: None,
            node: Cow::Owned(node),
        }
    }
}

/// Everything one indexer step picked out of a node.
struct Selection<'x> {
    items: Vec<Selected<'x>>,
    /// The step yields its lone item directly instead of a collection
    single: bool,
    /// Collections are rebuilt as objects rather than arrays
    keyed: bool,
    /// The items were computed rather than found in the indexed node
    projection: bool,
}

impl<'x> Selection<'x> {
    fn many(items: Vec<Selected<'x>>, keyed: bool) -> Self {
        Selection {
            items,
            single: false,
            keyed,
            projection: false,
        }
    }

    fn into_container(self) -> Node {
        if self.keyed {
            Node::object(
                self.items
                    .into_iter()
                    .map(|s| (s.key.unwrap_or_default(), s.node.into_owned()))
                    .collect(),
            )
        } else {
            Node::array(self.items.into_iter().map(|s| s.node.into_owned()).collect())
        }
    }

    fn into_result(mut self) -> Node {
        if self.single && self.items.len() == 1 {
            self.items.swap_remove(0).node.into_owned()
        } else {
            self.into_container()
        }
    }
}

enum KeySelector {
    Name(String),
    Pattern(Regex),
}

impl KeySelector {
    fn matches(&self, key: &str) -> bool {
        match self {
            KeySelector::Name(name) => name == key,
            KeySelector::Pattern(re) => re.is_match(key),
        }
    }
}

enum IndexSelector {
    At(i64),
    Range(Slice),
}

// ========================================
// Variables
// ========================================

/// What a mutation selector starts from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Root {
    Input,
    Var(String),
}

/// Where a variable's value was found, when it was bound to a selection of
/// the input or of another variable rather than computed.
///
/// `root` never names a variable that has an origin itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Origin {
    root: Root,
    path: Path,
}

impl Origin {
    fn child(&self, segment: PathSegment) -> Origin {
        Origin {
            root: self.root.clone(),
            path: self.path.child(segment),
        }
    }
}

/// A variable's current value.
///
/// Variables with an origin act as views: mutating one writes through to
/// its origin, and every view is re-read after each mutation.
#[derive(Debug, Clone)]
struct Binding {
    value: Node,
    origin: Option<Origin>,
}

/// Where an evaluated value was found, relative to the root it was read from.
enum Located {
    /// The value is the node at this path
    Whole(Path),
    /// The value is an array of the nodes at these paths
    Elements(Vec<Path>),
}

// ========================================
// Evaluator
// ========================================

/// The query evaluator.
///
/// Holds the variables bound by `var` and `for` statements and the random
/// number generator used by `rand` and `randint`. Variables are cleared at
/// the start of every run.
pub struct Evaluator {
    vars: HashMap<String, Binding>,
    rng: StdRng,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            vars: HashMap::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// An evaluator whose `rand` and `randint` results are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Evaluator {
            vars: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run a compiled query against `input`.
    ///
    /// `input` is never modified. The first write of a mutation clones it,
    /// and the edited copy is returned. Use [`run_mut`](Self::run_mut) to edit
    /// a tree in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use remespath::evaluator::Evaluator;
    /// use remespath::json_parser::parse_json;
    /// use remespath::parser::compile;
    ///
    /// let doc = parse_json(r#"{"a": [1, 2, 3]}"#).unwrap();
    /// let query = compile("@.a[@ > 1] * 10").unwrap();
    /// let out = Evaluator::new().run(&query, &doc).unwrap();
    /// assert_eq!(remespath::output::to_json(&out), "[20, 30]");
    /// ```
    pub fn run(&mut self, query: &CompiledQuery, input: &Node) -> Result<Node, EvalError> {
        match query {
            CompiledQuery::Const(node) => Ok(node.clone()),
            CompiledQuery::Deferred(program) => self.run_program(program, input),
        }
    }

    /// Run a compiled query, applying its mutations to `input` itself.
    ///
    /// Nodes a mutation does not address are left where they are. Mutations
    /// applied before an error stay applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use remespath::evaluator::Evaluator;
    /// use remespath::json_parser::parse_json;
    /// use remespath::parser::compile;
    ///
    /// let mut doc = parse_json(r#"{"a": [1, 2, 3]}"#).unwrap();
    /// let query = compile("@.a[0] = 99").unwrap();
    /// Evaluator::new().run_mut(&query, &mut doc).unwrap();
    /// assert_eq!(remespath::output::to_json(&doc), "{\"a\": [99, 2, 3]}");
    /// ```
    pub fn run_mut(&mut self, query: &CompiledQuery, input: &mut Node) -> Result<Node, EvalError> {
        let CompiledQuery::Deferred(program) = query else {
            return self.run(query, input);
        };
        self.vars.clear();
        let mut doc = Cow::Owned(std::mem::replace(input, Node::null()));
        let result = self.exec_block(&program.statements, &mut doc);
        *input = doc.into_owned();
        result
    }

    pub fn run_program(&mut self, program: &Program, input: &Node) -> Result<Node, EvalError> {
        self.vars.clear();
        let mut doc = Cow::Borrowed(input);
        self.exec_block(&program.statements, &mut doc)
    }

    fn exec_block(&mut self, statements: &[Statement], doc: &mut Cow<'_, Node>) -> Result<Node, EvalError> {
        let mut last = Node::null();
        for stmt in statements {
            last = self.exec_statement(stmt, doc)?;
        }
        Ok(last)
    }

    fn exec_statement(&mut self, stmt: &Statement, doc: &mut Cow<'_, Node>) -> Result<Node, EvalError> {
        match stmt {
            Statement::Expr(expr) => Ok(self.eval(expr, &**doc)?.into_owned()),
            Statement::Var { name, value } => {
                let (node, location) = self.eval_located(value, &**doc)?;
                let origin = match location {
                    Some((root, Located::Whole(path))) => self.absolute(&root, &path),
                    _ => None,
                };
                trace!(name = %name, view = origin.is_some(), "bound variable");
                self.bind(name, node.clone(), origin);
                Ok(node)
            }
            Statement::For { name, iterable, body } => {
                let (array, location) = self.eval_located(iterable, &**doc)?;
                let Value::Array(items) = &array.value else {
                    return Err(EvalError::LoopVarNotArray {
                        name: name.clone(),
                        type_name: array.value.type_name(),
                    });
                };
                let origins: Option<Vec<Origin>> = match location {
                    Some((root, Located::Whole(path))) => self
                        .absolute(&root, &path)
                        .map(|whole| (0..items.len()).map(|i| whole.child(PathSegment::Index(i))).collect()),
                    Some((root, Located::Elements(paths))) if paths.len() == items.len() => {
                        paths.iter().map(|p| self.absolute(&root, p)).collect()
                    }
                    _ => None,
                };
                let mut finals = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let origin = origins.as_ref().and_then(|o| o.get(i).cloned());
                    self.bind(name, item.clone(), origin);
                    self.exec_block(body, doc)?;
                    finals.push(self.vars.get(name).map_or_else(|| item.clone(), |b| b.value.clone()));
                }
                Ok(Node::array(finals))
            }
            Statement::Mutation { selector, mutator } => self.mutate(doc, selector, mutator),
        }
    }

    /// Bind `name`, detaching any views of its previous value.
    fn bind(&mut self, name: &str, value: Node, origin: Option<Origin>) {
        let root = Root::Var(name.to_string());
        for binding in self.vars.values_mut() {
            if binding.origin.as_ref().is_some_and(|o| o.root == root) {
                binding.origin = None;
            }
        }
        self.vars.insert(name.to_string(), Binding { value, origin });
    }

    fn var_value(&self, name: &str) -> Result<&Node, EvalError> {
        self.vars
            .get(name)
            .map(|b| &b.value)
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    /// Evaluate `expr` with `@` bound to `cur`.
    pub fn eval<'a>(&mut self, expr: &'a Expr, cur: &'a Node) -> Result<Cow<'a, Node>, EvalError> {
        match expr {
            Expr::Literal(node) => Ok(Cow::Borrowed(node)),
            Expr::Input => Ok(Cow::Borrowed(cur)),
            Expr::Var { name, forward } => match self.vars.get(name) {
                Some(binding) => Ok(Cow::Owned(binding.value.clone())),
                None if *forward => Err(EvalError::ForwardReference(name.clone())),
                None => Err(EvalError::UndefinedVariable(name.clone())),
            },
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand, cur)?;
                Ok(Cow::Owned(apply_unary(*op, &operand)?))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, cur)?;
                let right = self.eval(right, cur)?;
                Ok(Cow::Owned(apply_binop(*op, &left, &right)?))
            }
            Expr::Call { name, args } => {
                let def = functions::lookup(name)
                    .ok_or_else(|| EvalError::Custom(format!("'{}' is not the name of a RemesPath function", name)))?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Expr::Spread(inner) => match self.eval(inner, cur)?.into_owned().value {
                            Value::Array(items) => values.extend(items),
                            v => {
                                return Err(EvalError::TypeMismatch(format!(
                                    "Only arrays can be spread into arguments, got {}",
                                    type_name(&v)
                                )));
                            }
                        },
                        _ => values.push(self.eval(arg, cur)?.into_owned()),
                    }
                }
                Ok(Cow::Owned(def.call(values, &mut self.rng)?))
            }
            Expr::Spread(_) => Err(EvalError::Custom(
                "Spread is only allowed in function arguments".to_string(),
            )),
            Expr::Slice { start, stop, step } => {
                let mut bound = |e: &Option<Box<Expr>>| -> Result<Option<i64>, EvalError> {
                    let Some(e) = e else { return Ok(None) };
                    match self.eval(e, cur)?.value {
                        Value::Int(n) => Ok(Some(n)),
                        Value::Null => Ok(None),
                        ref v => Err(EvalError::TypeMismatch(format!(
                            "Slice bounds must be integers, got {}",
                            type_name(v)
                        ))),
                    }
                };
                let slice = Slice::new(bound(start)?, bound(stop)?, bound(step)?);
                Ok(Cow::Owned(Node::from(Value::Slice(slice))))
            }
            Expr::Indexed { target, indexers } => {
                let target = self.eval(target, cur)?;
                Ok(Cow::Owned(self.apply_chain(&target, indexers)?))
            }
        }
    }

    // ========================================
    // Indexer chains
    // ========================================

    fn apply_chain(&mut self, x: &Node, indexers: &[Indexer]) -> Result<Node, EvalError> {
        let Some((first, rest)) = indexers.split_first() else {
            return Ok(x.clone());
        };
        let sel = self.select(first, x)?;
        if sel.items.is_empty() {
            return Ok(sel.into_container());
        }
        if rest.is_empty() {
            return Ok(sel.into_result());
        }
        if sel.projection || sel.single {
            let built = sel.into_result();
            return self.apply_chain(&built, rest);
        }

        let keyed = sel.keyed;
        let mut arr = Vec::new();
        let mut obj = ObjectMap::new();
        for item in sel.items {
            let sub = self.apply_chain(&item.node, rest)?;
            if sub.len() == Some(0) {
                continue;
            }
            if keyed {
                obj.insert(item.key.unwrap_or_default(), sub);
            } else {
                arr.push(sub);
            }
        }
        Ok(if keyed { Node::object(obj) } else { Node::array(arr) })
    }

    /// Evaluate `expr` and, when it picks out existing nodes of the input or
    /// of a variable, where they were found. Variables and loops bound to
    /// such values become views.
    fn eval_located(&mut self, expr: &Expr, doc: &Node) -> Result<(Node, Option<(Root, Located)>), EvalError> {
        match expr {
            Expr::Input => Ok((doc.clone(), Some((Root::Input, Located::Whole(Path::root()))))),
            Expr::Var { name, .. } => {
                let value = self.eval(expr, doc)?.into_owned();
                Ok((value, Some((Root::Var(name.clone()), Located::Whole(Path::root())))))
            }
            Expr::Indexed { target, indexers } => {
                let (base, location) = self.eval_located(target, doc)?;
                match location {
                    Some((root, Located::Whole(path))) => {
                        let (node, located) = self.apply_chain_located(&base, indexers, &path)?;
                        Ok((node, located.map(|l| (root, l))))
                    }
                    _ => Ok((self.apply_chain(&base, indexers)?, None)),
                }
            }
            _ => Ok((self.eval(expr, doc)?.into_owned(), None)),
        }
    }

    /// [`apply_chain`](Self::apply_chain) on `x`, found at `base`, also
    /// reporting where the result came from.
    fn apply_chain_located(
        &mut self,
        x: &Node,
        indexers: &[Indexer],
        base: &Path,
    ) -> Result<(Node, Option<Located>), EvalError> {
        let Some((first, rest)) = indexers.split_first() else {
            return Ok((x.clone(), Some(Located::Whole(base.clone()))));
        };
        let mut sel = self.select(first, x)?;
        if sel.items.is_empty() {
            return Ok((sel.into_container(), None));
        }
        if sel.single && !sel.projection && sel.items.len() == 1 {
            let item = sel.items.swap_remove(0);
            return match &item.path {
                Some(rel) => self.apply_chain_located(&item.node, rest, &base.join(rel)),
                None => Ok((self.apply_chain(&item.node, rest)?, None)),
            };
        }
        if sel.projection || sel.single {
            let built = sel.into_result();
            return Ok((self.apply_chain(&built, rest)?, None));
        }

        let keyed = sel.keyed;
        let mut arr = Vec::new();
        let mut obj = ObjectMap::new();
        let mut paths = Some(Vec::new());
        for item in sel.items {
            let (sub, located) = match &item.path {
                Some(rel) => self.apply_chain_located(&item.node, rest, &base.join(rel))?,
                None => (self.apply_chain(&item.node, rest)?, None),
            };
            if !rest.is_empty() && sub.len() == Some(0) {
                continue;
            }
            match located {
                Some(Located::Whole(p)) => {
                    if let Some(ps) = paths.as_mut() {
                        ps.push(p);
                    }
                }
                _ => paths = None,
            }
            if keyed {
                obj.insert(item.key.unwrap_or_default(), sub);
            } else {
                arr.push(sub);
            }
        }
        if keyed {
            Ok((Node::object(obj), None))
        } else {
            Ok((Node::array(arr), paths.map(Located::Elements)))
        }
    }

    fn select<'x>(&mut self, ix: &Indexer, x: &'x Node) -> Result<Selection<'x>, EvalError> {
        let sel = match &ix.kind {
            IndexerKind::Keys(exprs) => {
                let keys = self.eval_keys(exprs, x)?;
                if ix.recursive {
                    let mut items = Vec::new();
                    recursive_keys(&keys, x, &Path::root(), &mut HashSet::new(), &mut items);
                    let single =
                        keys.len() == 1 && matches!(keys[0], KeySelector::Name(_)) && items.len() == 1;
                    Selection {
                        single,
                        ..Selection::many(items, false)
                    }
                } else {
                    select_keys(&keys, x)?
                }
            }
            IndexerKind::Indices(exprs) => {
                let indices = self.eval_indices(exprs, x)?;
                if ix.recursive {
                    let mut items = Vec::new();
                    recursive_indices(&indices, x, &Path::root(), &mut HashSet::new(), &mut items)?;
                    Selection::many(items, false)
                } else {
                    select_indices(&indices, x)?
                }
            }
            IndexerKind::Star if ix.recursive => {
                let mut items = Vec::new();
                flatten_scalars(x, &Path::root(), &mut items);
                Selection::many(items, false)
            }
            IndexerKind::Star => match &x.value {
                Value::Object(obj) => Selection::many(
                    obj.iter()
                        .map(|(k, v)| Selected::child(PathSegment::Key(k.clone()), v))
                        .collect(),
                    true,
                ),
                Value::Array(arr) => Selection::many(
                    arr.iter()
                        .enumerate()
                        .map(|(i, v)| Selected::child(PathSegment::Index(i), v))
                        .collect(),
                    false,
                ),
                v => {
                    return Err(EvalError::TypeMismatch(format!(
                        "Cannot select all children of {}",
                        type_name(v)
                    )));
                }
            },
            IndexerKind::Boolean(pred) => {
                let mask = self.eval(pred, x)?.into_owned();
                self.select_by_mask(mask, x)?
            }
            IndexerKind::ArrayProjection(exprs) => {
                let mut items = Vec::with_capacity(exprs.len());
                for e in exprs {
                    items.push(Selected::computed(None, self.eval(e, x)?.into_owned()));
                }
                Selection {
                    projection: true,
                    ..Selection::many(items, false)
                }
            }
            IndexerKind::ObjectProjection(pairs) => {
                let mut items = Vec::with_capacity(pairs.len());
                for (k, e) in pairs {
                    items.push(Selected::computed(Some(k.clone()), self.eval(e, x)?.into_owned()));
                }
                Selection {
                    projection: true,
                    ..Selection::many(items, true)
                }
            }
            IndexerKind::Map(e) => {
                let mapped = self.eval(e, x)?.into_owned();
                Selection {
                    items: vec![Selected::computed(None, mapped)],
                    single: true,
                    keyed: false,
                    projection: true,
                }
            }
        };
        if ix.negated {
            return complement(&sel, x);
        }
        Ok(sel)
    }

    fn eval_keys(&mut self, exprs: &[Expr], x: &Node) -> Result<Vec<KeySelector>, EvalError> {
        exprs
            .iter()
            .map(|e| match &self.eval(e, x)?.value {
                Value::Str(s) => Ok(KeySelector::Name(s.clone())),
                Value::Regex(re) => Ok(KeySelector::Pattern(re.clone())),
                v => Err(EvalError::TypeMismatch(format!(
                    "Object keys must be strings or regexes, got {}",
                    type_name(v)
                ))),
            })
            .collect()
    }

    fn eval_indices(&mut self, exprs: &[Expr], x: &Node) -> Result<Vec<IndexSelector>, EvalError> {
        exprs
            .iter()
            .map(|e| match self.eval(e, x)?.value {
                Value::Int(n) => Ok(IndexSelector::At(n)),
                Value::Slice(s) => Ok(IndexSelector::Range(s)),
                ref v => Err(EvalError::TypeMismatch(format!(
                    "Array indices must be integers or slices, got {}",
                    type_name(v)
                ))),
            })
            .collect()
    }

    /// Boolean indexing: a scalar `true` keeps every element of an array, or
    /// the node itself otherwise; an array or object of booleans must match
    /// the node's shape and picks children one by one.
    fn select_by_mask<'x>(&mut self, mask: Node, x: &'x Node) -> Result<Selection<'x>, EvalError> {
        let keyed = matches!(x.value, Value::Object(_));
        match (mask.value, &x.value) {
            (Value::Bool(true), Value::Array(arr)) => Ok(Selection::many(
                arr.iter()
                    .enumerate()
                    .map(|(i, v)| Selected::child(PathSegment::Index(i), v))
                    .collect(),
                false,
            )),
            (Value::Bool(true), _) => Ok(Selection {
                items: vec![Selected {
                    key: None,
                    path: Some(Path::root()),
                    node: Cow::Borrowed(x),
                }],
                single: true,
                keyed,
                projection: false,
            }),
            (Value::Bool(false), _) => Ok(Selection::many(Vec::new(), keyed)),
            (Value::Array(flags), Value::Array(arr)) => {
                if flags.len() != arr.len() {
                    return Err(EvalError::ShapeMismatch(format!(
                        "bool index length {} does not match object/array length {}",
                        flags.len(),
                        arr.len()
                    )));
                }
                let mut items = Vec::new();
                for (i, (flag, v)) in flags.iter().zip(arr).enumerate() {
                    if as_flag(flag)? {
                        items.push(Selected::child(PathSegment::Index(i), v));
                    }
                }
                Ok(Selection::many(items, false))
            }
            (Value::Object(flags), Value::Object(obj)) => {
                if flags.len() != obj.len() {
                    return Err(EvalError::ShapeMismatch(format!(
                        "bool index length {} does not match object/array length {}",
                        flags.len(),
                        obj.len()
                    )));
                }
                let mut items = Vec::new();
                for (k, v) in obj {
                    let flag = flags.get(k).ok_or_else(|| {
                        EvalError::ShapeMismatch(format!("bool index is missing key {:?}", k))
                    })?;
                    if as_flag(flag)? {
                        items.push(Selected::child(PathSegment::Key(k.clone()), v));
                    }
                }
                Ok(Selection::many(items, true))
            }
            (Value::Str(s), _) => select_keys(&[KeySelector::Name(s)], x),
            (Value::Regex(re), _) => select_keys(&[KeySelector::Pattern(re)], x),
            (Value::Int(n), _) => select_indices(&[IndexSelector::At(n)], x),
            (Value::Slice(s), _) => select_indices(&[IndexSelector::Range(s)], x),
            (m, v) => Err(EvalError::TypeMismatch(format!(
                "Cannot index {} with {}",
                type_name(v),
                type_name(&m)
            ))),
        }
    }

    // ========================================
    // Mutation
    // ========================================

    /// Replace every node addressed by `selector` with `mutator` evaluated
    /// against that node. Returns the value of the selector's root afterwards.
    ///
    /// A borrowed input is cloned on the first write.
    fn mutate(&mut self, doc: &mut Cow<'_, Node>, selector: &Expr, mutator: &Expr) -> Result<Node, EvalError> {
        let (root, paths) = self.resolve_selector(selector, &**doc)?;

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(paths.len());
        for p in &paths {
            if let Some(origin) = self.absolute(&root, p)
                && seen.insert(origin.clone())
            {
                targets.push(origin);
            }
        }

        let mut count = 0;
        for target in &targets {
            let Some(current) = self.read(target, &**doc).cloned() else {
                continue;
            };
            let replacement = self.eval(mutator, &current)?.into_owned();
            let slot = match &target.root {
                Root::Input => path::get_mut(doc.to_mut(), &target.path),
                Root::Var(name) => self
                    .vars
                    .get_mut(name)
                    .and_then(|b| path::get_mut(&mut b.value, &target.path)),
            };
            if let Some(slot) = slot {
                *slot = Node::new(replacement.value, current.position);
                count += 1;
            }
        }
        self.refresh_views(&**doc);
        debug!(count, "applied mutation");

        match root {
            Root::Input => Ok(Node::clone(&**doc)),
            Root::Var(name) => self.var_value(&name).cloned(),
        }
    }

    /// The root a mutation selector starts from and the paths it addresses
    /// relative to that root.
    ///
    /// Accepts `@` or a variable, optionally followed by indexers, and
    /// `at(selector, index)`.
    fn resolve_selector(&mut self, expr: &Expr, doc: &Node) -> Result<(Root, Vec<Path>), EvalError> {
        match expr {
            Expr::Input => Ok((Root::Input, vec![Path::root()])),
            Expr::Var { name, forward } => {
                if !self.vars.contains_key(name) {
                    return Err(if *forward {
                        EvalError::ForwardReference(name.clone())
                    } else {
                        EvalError::UndefinedVariable(name.clone())
                    });
                }
                Ok((Root::Var(name.clone()), vec![Path::root()]))
            }
            Expr::Indexed { target, indexers } => {
                let (root, bases) = self.resolve_selector(target, doc)?;
                let base_node = self.root_node(&root, doc)?;
                let mut out = Vec::new();
                for base in &bases {
                    if let Some(node) = path::get(&base_node, base) {
                        self.locate(node, indexers, base, &mut out)?;
                    }
                }
                Ok((root, out))
            }
            Expr::Call { name, args } if name == "at" && args.len() == 2 => {
                let (root, bases) = self.resolve_selector(&args[0], doc)?;
                let index = self.eval(&args[1], doc)?.into_owned();
                let base_node = self.root_node(&root, doc)?;
                let mut out = Vec::new();
                for base in &bases {
                    if let Some(node) = path::get(&base_node, base) {
                        at_paths(node, &index, base, &mut out)?;
                    }
                }
                Ok((root, out))
            }
            _ => Err(EvalError::InvalidMutation(
                "the left side of '=' must be @ or a variable, optionally indexed".to_string(),
            )),
        }
    }

    fn root_node<'d>(&self, root: &Root, doc: &'d Node) -> Result<Cow<'d, Node>, EvalError> {
        match root {
            Root::Input => Ok(Cow::Borrowed(doc)),
            Root::Var(name) => Ok(Cow::Owned(self.var_value(name)?.clone())),
        }
    }

    /// Rebase `path` under `root` onto a root that is not itself a view.
    fn absolute(&self, root: &Root, path: &Path) -> Option<Origin> {
        let rebased = match root {
            Root::Input => Origin {
                root: Root::Input,
                path: path.clone(),
            },
            Root::Var(name) => match &self.vars.get(name)?.origin {
                Some(o) => Origin {
                    root: o.root.clone(),
                    path: o.path.join(path),
                },
                None => Origin {
                    root: root.clone(),
                    path: path.clone(),
                },
            },
        };
        Some(rebased)
    }

    fn read<'n>(&'n self, origin: &Origin, doc: &'n Node) -> Option<&'n Node> {
        let base = match &origin.root {
            Root::Input => doc,
            Root::Var(name) => &self.vars.get(name)?.value,
        };
        path::get(base, &origin.path)
    }

    fn refresh_views(&mut self, doc: &Node) {
        let updates: Vec<(String, Node)> = self
            .vars
            .iter()
            .filter_map(|(name, b)| {
                let origin = b.origin.as_ref()?;
                self.read(origin, doc).map(|n| (name.clone(), n.clone()))
            })
            .collect();
        for (name, node) in updates {
            if let Some(b) = self.vars.get_mut(&name) {
                b.value = node;
            }
        }
    }

    fn locate(&mut self, x: &Node, indexers: &[Indexer], base: &Path, out: &mut Vec<Path>) -> Result<(), EvalError> {
        let Some((first, rest)) = indexers.split_first() else {
            out.push(base.clone());
            return Ok(());
        };
        if first.is_projection() {
            return Err(EvalError::InvalidMutation(
                "projections cannot be the target of a mutation".to_string(),
            ));
        }
        let sel = self.select(first, x)?;
        for item in &sel.items {
            let Some(rel) = &item.path else {
                return Err(EvalError::InvalidMutation(
                    "computed values cannot be the target of a mutation".to_string(),
                ));
            };
            self.locate(&item.node, rest, &base.join(rel), out)?;
        }
        Ok(())
    }
}

/// Paths picked out of `node` by the index argument of `at`.
fn at_paths(node: &Node, index: &Node, base: &Path, out: &mut Vec<Path>) -> Result<(), EvalError> {
    match (&node.value, &index.value) {
        (_, Value::Array(many)) => {
            for i in many {
                at_paths(node, i, base, out)?;
            }
            Ok(())
        }
        (Value::Array(arr), Value::Int(i)) => {
            let resolved = wrap_index(*i, arr.len()).ok_or(EvalError::IndexOutOfRange {
                index: *i,
                len: arr.len(),
            })?;
            out.push(base.child(PathSegment::Index(resolved)));
            Ok(())
        }
        (Value::Object(obj), Value::Str(k)) if obj.contains_key(k) => {
            out.push(base.child(PathSegment::Key(k.clone())));
            Ok(())
        }
        (Value::Object(_), Value::Str(k)) => Err(EvalError::Custom(format!("Object has no key {:?}", k))),
        (t, i) => Err(EvalError::TypeMismatch(format!(
            "at: cannot index {} with {}",
            type_name(t),
            type_name(i)
        ))),
    }
}

fn as_flag(node: &Node) -> Result<bool, EvalError> {
    node.value
        .as_bool()
        .ok_or_else(|| EvalError::TypeMismatch("bool index contains non-booleans".to_string()))
}

fn select_keys<'x>(keys: &[KeySelector], x: &'x Node) -> Result<Selection<'x>, EvalError> {
    let Value::Object(obj) = &x.value else {
        return Err(EvalError::TypeMismatch(format!(
            "Cannot select keys of {}",
            x.value.type_name()
        )));
    };
    let mut items = Vec::new();
    for key in keys {
        match key {
            KeySelector::Name(name) => {
                if let Some((k, v)) = obj.get_key_value(name) {
                    items.push(Selected::child(PathSegment::Key(k.clone()), v));
                }
            }
            KeySelector::Pattern(re) => items.extend(
                obj.iter()
                    .filter(|(k, _)| re.is_match(k))
                    .map(|(k, v)| Selected::child(PathSegment::Key(k.clone()), v)),
            ),
        }
    }
    let single = keys.len() == 1 && matches!(keys[0], KeySelector::Name(_));
    Ok(Selection {
        single,
        ..Selection::many(items, true)
    })
}

fn resolve_indices(indices: &[IndexSelector], len: usize) -> Result<Vec<usize>, EvalError> {
    let mut out = Vec::new();
    for ind in indices {
        match ind {
            // out-of-range indices select nothing
            IndexSelector::At(i) => out.extend(wrap_index(*i, len)),
            IndexSelector::Range(s) => out.extend(s.indices(len).map_err(|e| EvalError::Custom(e.to_string()))?),
        }
    }
    Ok(out)
}

fn select_indices<'x>(indices: &[IndexSelector], x: &'x Node) -> Result<Selection<'x>, EvalError> {
    let Value::Array(arr) = &x.value else {
        return Err(EvalError::TypeMismatch(format!(
            "Cannot select indices of {}",
            x.value.type_name()
        )));
    };
    let items = resolve_indices(indices, arr.len())?
        .into_iter()
        .map(|i| Selected::child(PathSegment::Index(i), &arr[i]))
        .collect();
    let single = indices.len() == 1 && matches!(indices[0], IndexSelector::At(_));
    Ok(Selection {
        single,
        ..Selection::many(items, false)
    })
}

/// Every child of `x` not picked out by `sel`.
fn complement<'x>(sel: &Selection<'_>, x: &'x Node) -> Result<Selection<'x>, EvalError> {
    let picked: HashSet<&PathSegment> = sel
        .items
        .iter()
        .filter_map(|s| s.path.as_ref().and_then(|p| p.segments().first()))
        .collect();
    match &x.value {
        Value::Object(obj) => Ok(Selection::many(
            obj.iter()
                .filter(|(k, _)| !picked.contains(&PathSegment::Key((*k).clone())))
                .map(|(k, v)| Selected::child(PathSegment::Key(k.clone()), v))
                .collect(),
            true,
        )),
        Value::Array(arr) => Ok(Selection::many(
            arr.iter()
                .enumerate()
                .filter(|(i, _)| !picked.contains(&PathSegment::Index(*i)))
                .map(|(i, v)| Selected::child(PathSegment::Index(i), v))
                .collect(),
            false,
        )),
        v => Err(EvalError::TypeMismatch(format!("Cannot negate an index into {}", type_name(v)))),
    }
}

/// Depth-first search for matching keys. A matching key is yielded and not
/// searched further; anything else is descended into.
fn recursive_keys<'x>(
    keys: &[KeySelector],
    x: &'x Node,
    at: &Path,
    visited: &mut HashSet<Path>,
    out: &mut Vec<Selected<'x>>,
) {
    match &x.value {
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                recursive_keys(keys, child, &at.child(PathSegment::Index(i)), visited, out);
            }
        }
        Value::Object(obj) => {
            for key in keys {
                for (k, v) in obj {
                    let p = at.child(PathSegment::Key(k.clone()));
                    if key.matches(k) {
                        if visited.insert(p.clone()) {
                            out.push(Selected {
                                key: None,
                                path: Some(p),
                                node: Cow::Borrowed(v),
                            });
                        }
                    } else {
                        recursive_keys(keys, v, &p, visited, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Apply an index list to every array in the tree, outermost first.
fn recursive_indices<'x>(
    indices: &[IndexSelector],
    x: &'x Node,
    at: &Path,
    visited: &mut HashSet<Path>,
    out: &mut Vec<Selected<'x>>,
) -> Result<(), EvalError> {
    match &x.value {
        Value::Array(arr) => {
            for i in resolve_indices(indices, arr.len())? {
                let p = at.child(PathSegment::Index(i));
                if visited.insert(p.clone()) {
                    out.push(Selected {
                        key: None,
                        path: Some(p),
                        node: Cow::Borrowed(&arr[i]),
                    });
                }
            }
            for (i, child) in arr.iter().enumerate() {
                recursive_indices(indices, child, &at.child(PathSegment::Index(i)), visited, out)?;
            }
        }
        Value::Object(obj) => {
            for (k, v) in obj {
                recursive_indices(indices, v, &at.child(PathSegment::Key(k.clone())), visited, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Every scalar below `x`, in document order.
fn flatten_scalars<'x>(x: &'x Node, at: &Path, out: &mut Vec<Selected<'x>>) {
    match &x.value {
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                flatten_scalars(child, &at.child(PathSegment::Index(i)), out);
            }
        }
        Value::Object(obj) => {
            for (k, child) in obj {
                flatten_scalars(child, &at.child(PathSegment::Key(k.clone())), out);
            }
        }
        _ => out.push(Selected {
            key: None,
            path: Some(at.clone()),
            node: Cow::Borrowed(x),
        }),
    }
}

// ========================================
// Operators
// ========================================

/// Apply `f` to a scalar, or to every value of an array or object.
fn map_values(node: &Node, f: &impl Fn(&Value) -> Result<Value, EvalError>) -> Result<Node, EvalError> {
    match &node.value {
        Value::Array(arr) => Ok(Node::array(
            arr.iter().map(|x| map_values(x, f)).collect::<Result<_, _>>()?,
        )),
        Value::Object(obj) => Ok(Node::object(
            obj.iter()
                .map(|(k, v)| map_values(v, f).map(|r| (k.clone(), r)))
                .collect::<Result<_, _>>()?,
        )),
        v => f(v).map(Node::from),
    }
}

pub fn apply_unary(op: UnaryOp, operand: &Node) -> Result<Node, EvalError> {
    map_values(operand, &|v| match (op, v) {
        (UnaryOp::Negate, Value::Int(n)) => Ok(n.checked_neg().map_or(Value::Float(-(*n as f64)), Value::Int)),
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Plus, Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(EvalError::TypeMismatch(format!(
            "Cannot apply unary '{}' to {}",
            op.symbol().trim(),
            type_name(v)
        ))),
    })
}

/// Apply a binary operator, elementwise when either side is an array or object.
///
/// Two arrays must have the same length and two objects the same keys.
/// A scalar against an iterable is broadcast to every element.
pub fn apply_binop(op: BinOp, left: &Node, right: &Node) -> Result<Node, EvalError> {
    match (&left.value, &right.value) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(EvalError::ShapeMismatch(format!(
                    "Cannot apply '{}' to arrays of lengths {} and {}",
                    op.symbol(),
                    a.len(),
                    b.len()
                )));
            }
            Ok(Node::array(
                a.iter().zip(b).map(|(x, y)| apply_binop(op, x, y)).collect::<Result<_, _>>()?,
            ))
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.len() != b.len() || a.keys().any(|k| !b.contains_key(k)) {
                return Err(EvalError::ShapeMismatch(format!(
                    "Cannot apply '{}' to objects with different keys",
                    op.symbol()
                )));
            }
            Ok(Node::object(
                a.iter()
                    .map(|(k, x)| {
                        let y = b.get(k).ok_or_else(|| EvalError::ShapeMismatch(format!("missing key {:?}", k)))?;
                        apply_binop(op, x, y).map(|r| (k.clone(), r))
                    })
                    .collect::<Result<_, _>>()?,
            ))
        }
        (Value::Array(_), Value::Object(_)) | (Value::Object(_), Value::Array(_)) => Err(EvalError::TypeMismatch(
            format!(
                "Cannot apply '{}' to {} and {}",
                op.symbol(),
                left.value.type_name(),
                right.value.type_name()
            ),
        )),
        (Value::Array(a), _) => Ok(Node::array(
            a.iter().map(|x| apply_binop(op, x, right)).collect::<Result<_, _>>()?,
        )),
        (Value::Object(a), _) => Ok(Node::object(
            a.iter()
                .map(|(k, x)| apply_binop(op, x, right).map(|r| (k.clone(), r)))
                .collect::<Result<_, _>>()?,
        )),
        (_, Value::Array(b)) => Ok(Node::array(
            b.iter().map(|y| apply_binop(op, left, y)).collect::<Result<_, _>>()?,
        )),
        (_, Value::Object(b)) => Ok(Node::object(
            b.iter()
                .map(|(k, y)| apply_binop(op, left, y).map(|r| (k.clone(), r)))
                .collect::<Result<_, _>>()?,
        )),
        (a, b) => scalar_binop(op, a, b).map(Node::from),
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

/// Integer arithmetic where both sides allow it, falling back to floats on
/// overflow or when either side is a float.
fn arithmetic(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Option<Value> {
    if let (Some(x), Some(y)) = (as_int(a), as_int(b))
        && let Some(r) = int_op(x, y)
    {
        return Some(Value::Int(r));
    }
    Some(Value::Float(float_op(a.as_f64()?, b.as_f64()?)))
}

fn scalar_binop(op: BinOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let mismatch = |verb: &str| {
        EvalError::TypeMismatch(format!("Cannot {} {} and {}", verb, type_name(a), type_name(b)))
    };
    match op {
        BinOp::Add => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
            _ => arithmetic(a, b, i64::checked_add, |x, y| x + y).ok_or_else(|| mismatch("add")),
        },
        BinOp::Subtract => arithmetic(a, b, i64::checked_sub, |x, y| x - y).ok_or_else(|| mismatch("subtract")),
        BinOp::Multiply => match (a, b) {
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                Ok(Value::Str(functions::repeat_str(s, *n)?))
            }
            _ => arithmetic(a, b, i64::checked_mul, |x, y| x * y).ok_or_else(|| mismatch("multiply")),
        },
        BinOp::Divide => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Float(x / y)),
            _ => Err(mismatch("divide")),
        },
        BinOp::FloorDivide => {
            if let (Some(x), Some(y)) = (as_int(a), as_int(b)) {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                // i64::MIN // -1 overflows and falls through to floats
                if let (Some(q), Some(r)) = (x.checked_div(y), x.checked_rem(y)) {
                    let floored = if r != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q };
                    return Ok(Value::Int(floored));
                }
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => {
                    let q = (x / y).floor();
                    Ok(if q.is_finite() && q.abs() < i64::MAX as f64 {
                        Value::Int(q as i64)
                    } else {
                        Value::Float(q)
                    })
                }
                _ => Err(mismatch("floor-divide")),
            }
        }
        BinOp::Modulo => {
            if let (Some(_), Some(0)) = (as_int(a), as_int(b)) {
                return Err(EvalError::DivisionByZero);
            }
            arithmetic(a, b, i64::checked_rem, |x, y| x % y).ok_or_else(|| mismatch("take the modulus of"))
        }
        BinOp::Power => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Float(x.powf(y))),
            _ => Err(mismatch("exponentiate")),
        },
        BinOp::Equal => Ok(Value::Bool(a.equals(b))),
        BinOp::NotEqual => Ok(Value::Bool(!a.equals(b))),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            let ord = a.compare_to(b).map_err(EvalError::TypeMismatch)?;
            Ok(Value::Bool(match op {
                BinOp::LessThan => ord.is_lt(),
                BinOp::GreaterThan => ord.is_gt(),
                BinOp::LessEqual => ord.is_le(),
                _ => ord.is_ge(),
            }))
        }
        BinOp::Match => match (a, b) {
            (Value::Str(s), Value::Regex(re)) => Ok(Value::Bool(re.is_match(s))),
            (Value::Str(s), Value::Str(pattern)) => Ok(Value::Bool(cached_regex(pattern)?.is_match(s))),
            _ => Err(mismatch("regex-match")),
        },
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(match op {
                BinOp::BitAnd => x & y,
                BinOp::BitOr => x | y,
                _ => x ^ y,
            })),
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(match op {
                BinOp::BitAnd => x & y,
                BinOp::BitOr => x | y,
                _ => x ^ y,
            })),
            _ => Err(mismatch(&format!("apply '{}' to", op.symbol()))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_overflow_becomes_float() {
        let big = Node::from(i64::MAX);
        let out = apply_binop(BinOp::Add, &big, &Node::from(1)).unwrap();
        assert!(matches!(out.value, Value::Float(_)));
    }

    #[test]
    fn test_floor_divide_negative() {
        let out = apply_binop(BinOp::FloorDivide, &Node::from(-7), &Node::from(2)).unwrap();
        assert_eq!(out, Node::from(-4));
        assert_eq!(
            apply_binop(BinOp::Modulo, &Node::from(1), &Node::from(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_broadcast_scalar() {
        let arr = Node::array(vec![Node::from(1), Node::from(2)]);
        let out = apply_binop(BinOp::Multiply, &Node::from(3), &arr).unwrap();
        assert_eq!(out, Node::array(vec![Node::from(3), Node::from(6)]));
    }
}
