/// Binary operators.
///
/// All of them vectorize: an array or object on either side applies the
/// operator elementwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Bitwise / logical
    /// Bitwise or logical AND (`&`)
    BitAnd,
    /// Bitwise or logical OR (`|`)
    BitOr,
    /// Bitwise or logical XOR (`^`)
    BitXor,

    // Comparison
    /// Equal (`==`)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
    /// Less than (`<`)
    LessThan,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than or equal (`>=`)
    GreaterEqual,
    /// Regex search (`=~`)
    Match,

    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division, always a float (`/`)
    Divide,
    /// Floor division, always an int (`//`)
    FloorDivide,
    /// Modulo (`%`)
    Modulo,
    /// Exponentiation (`**`)
    Power,
}

impl BinOp {
    /// Symbols ordered so that longer operators come before their prefixes.
    pub const BY_SYMBOL: [(&'static str, BinOp); 17] = [
        ("**", BinOp::Power),
        ("//", BinOp::FloorDivide),
        ("==", BinOp::Equal),
        ("!=", BinOp::NotEqual),
        ("=~", BinOp::Match),
        ("<=", BinOp::LessEqual),
        (">=", BinOp::GreaterEqual),
        ("<", BinOp::LessThan),
        (">", BinOp::GreaterThan),
        ("&", BinOp::BitAnd),
        ("|", BinOp::BitOr),
        ("^", BinOp::BitXor),
        ("+", BinOp::Add),
        ("-", BinOp::Subtract),
        ("*", BinOp::Multiply),
        ("/", BinOp::Divide),
        ("%", BinOp::Modulo),
    ];

    pub fn symbol(self) -> &'static str {
        Self::BY_SYMBOL
            .iter()
            .find(|(_, op)| *op == self)
            .map_or("?", |(sym, _)| sym)
    }

    /// Left binding power. Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => 0,
            BinOp::Equal
            | BinOp::NotEqual
            | BinOp::LessThan
            | BinOp::GreaterThan
            | BinOp::LessEqual
            | BinOp::GreaterEqual
            | BinOp::Match => 2,
            BinOp::Add | BinOp::Subtract => 4,
            BinOp::Multiply | BinOp::Divide | BinOp::FloorDivide | BinOp::Modulo => 6,
            BinOp::Power => 10,
        }
    }

    pub fn is_right_associative(self) -> bool {
        self == BinOp::Power
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `+x`
    Plus,
    /// `not x`
    Not,
}

impl UnaryOp {
    /// Binding power of the operand.
    ///
    /// `-` binds tighter than `*` but looser than `**`, so `-2 ** 2` is -4.
    /// `not` binds looser than comparisons, so `not @ == 1` negates the comparison.
    pub fn precedence(self) -> u8 {
        match self {
            UnaryOp::Negate | UnaryOp::Plus => 8,
            UnaryOp::Not => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "not ",
        }
    }
}
