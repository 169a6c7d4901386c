use crate::{
    ast::{BinOp, UnaryOp},
    value::Node,
};

/// Expression node of a RemesPath query.
///
/// Constant subtrees are folded to [`Expr::Literal`] while parsing, so a
/// fully evaluated tree only keeps the parts that depend on the input, on a
/// variable bound at run time, or on a random number generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal or folded constant
    ///
    /// # Example
    /// ```text
    /// 42
    /// `hello`
    /// len(j`[1, 2]`)
    /// ```
    Literal(Node),

    /// Current node (`@`)
    Input,

    /// Variable whose value is only known at run time
    ///
    /// `forward` is set when the reference appears before the declaration.
    Var { name: String, forward: bool },

    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Built-in function call
    ///
    /// # Example
    /// ```text
    /// s_sub(@.name, g`\s+`, _)
    /// ```
    Call { name: String, args: Vec<Expr> },

    /// Spread of an array into function arguments (`*arr`)
    Spread(Box<Expr>),

    /// Slice with computed bounds
    ///
    /// Slices with literal bounds are folded to a literal.
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },

    /// Target followed by a chain of indexers
    ///
    /// # Example
    /// ```text
    /// @.a[0].b
    /// ```
    Indexed {
        target: Box<Expr>,
        indexers: Vec<Indexer>,
    },
}

impl Expr {
    pub fn as_literal(&self) -> Option<&Node> {
        match self {
            Expr::Literal(node) => Some(node),
            _ => None,
        }
    }
}

/// One step of an indexer chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Indexer {
    pub kind: IndexerKind,
    /// `..` prefix
    pub recursive: bool,
    /// `!` prefix
    pub negated: bool,
}

impl Indexer {
    pub fn new(kind: IndexerKind) -> Self {
        Indexer {
            kind,
            recursive: false,
            negated: false,
        }
    }

    pub fn is_projection(&self) -> bool {
        matches!(
            self.kind,
            IndexerKind::ArrayProjection(_) | IndexerKind::ObjectProjection(_) | IndexerKind::Map(_)
        )
    }
}

/// What an indexer selects.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexerKind {
    /// Object keys: strings or regexes
    ///
    /// # Example
    /// ```text
    /// .a
    /// [`a`, g`^b`]
    /// ```
    Keys(Vec<Expr>),

    /// Array positions: ints or slices
    ///
    /// # Example
    /// ```text
    /// [0, -1, 2:5]
    /// ```
    Indices(Vec<Expr>),

    /// Every child (`[*]`, `.*`)
    Star,

    /// Filter by a predicate evaluated against the indexed node
    ///
    /// # Example
    /// ```text
    /// [@.x > 3]
    /// ```
    Boolean(Box<Expr>),

    /// Build an array (`{@.a, @.b}`)
    ArrayProjection(Vec<Expr>),

    /// Build an object (`{x: @.a, y: @.b}`)
    ObjectProjection(Vec<(String, Expr)>),

    /// Replace the node with an expression of it (`-> expr`)
    Map(Box<Expr>),
}
