//! Parser for RemesPath queries.
//!
//! Turns the token stream into a [`CompiledQuery`]. Before parsing, a prescan
//! over all tokens decides which variables may hold a different value from
//! one run to the next. Every subtree that depends on nothing but literals
//! and such constant variables is evaluated as soon as it is parsed.

use std::{
    collections::{HashMap, HashSet},
    fmt, mem,
};

use tracing::{debug, trace};

use crate::{
    ast::{BinOp, CompiledQuery, Expr, Indexer, IndexerKind, Program, Statement, Token, UnaryOp},
    evaluator::{ArgumentError, EvalError, Evaluator},
    functions::{self, FunctionDef},
    lexer::{self, LexError, MAX_QUERY_DEPTH, Spanned},
    output::to_json,
    value::{Dtype, Node, Value},
};

/// Malformed query syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Char offset of the offending token
    pub position: usize,
    pub message: String,
    pub query: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at position {}: {}\n{}\n{}^",
            self.position,
            self.message,
            self.query,
            " ".repeat(self.position)
        )
    }
}

impl std::error::Error for ParseError {}

/// Any failure while compiling or running a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    Lex(LexError),
    Parse(ParseError),
    Argument(ArgumentError),
    Eval(EvalError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Lex(e) => write!(f, "{}", e),
            QueryError::Parse(e) => write!(f, "{}", e),
            QueryError::Argument(e) => write!(f, "{}", e),
            QueryError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<LexError> for QueryError {
    fn from(e: LexError) -> Self {
        QueryError::Lex(e)
    }
}

impl From<ParseError> for QueryError {
    fn from(e: ParseError) -> Self {
        QueryError::Parse(e)
    }
}

impl From<ArgumentError> for QueryError {
    fn from(e: ArgumentError) -> Self {
        QueryError::Argument(e)
    }
}

impl From<EvalError> for QueryError {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::Argument(e) => QueryError::Argument(e),
            e => QueryError::Eval(e),
        }
    }
}

type PResult<T> = Result<T, QueryError>;

// ========================================
// Variable prescan
// ========================================

/// What the prescan learns about variables.
#[derive(Debug, Default)]
struct VarAnalysis {
    /// Every variable declared anywhere in the query
    declared: HashSet<String>,
    /// Variables that may change between runs or during a run, and so are
    /// never replaced by their value
    tainted: HashSet<String>,
}

fn split_statements(tokens: &[Spanned]) -> Vec<&[Spanned]> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, (tok, _)) in tokens.iter().enumerate() {
        if matches!(tok, Token::Semicolon | Token::Eof) {
            out.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    out
}

/// Identifiers that would resolve to variables: not a key after `.` and not
/// a function name before `(`.
fn referenced(toks: &[Spanned]) -> impl Iterator<Item = &str> {
    toks.iter().enumerate().filter_map(|(i, (tok, _))| {
        let Token::Ident(name) = tok else { return None };
        let after_dot = i > 0 && matches!(toks[i - 1].0, Token::Dot);
        let before_paren = matches!(toks.get(i + 1), Some((Token::LParen, _)));
        (!after_dot && !before_paren).then_some(name.as_str())
    })
}

fn calls_random(toks: &[Spanned]) -> bool {
    toks.windows(2).any(|w| {
        matches!(&w[0].0, Token::Ident(name) if name == "rand" || name == "randint")
            && matches!(w[1].0, Token::LParen)
    })
}

/// Find every variable whose value cannot be known at compile time.
///
/// A variable is tainted when its value refers to `@`, calls a random
/// function, refers to a tainted variable, is declared inside a loop or more
/// than once, is a loop variable, or is edited by a mutation (directly, or by
/// being the source of a variable that is).
fn analyze(tokens: &[Spanned]) -> VarAnalysis {
    let mut decls: Vec<(&str, &[Spanned])> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut tainted: HashSet<String> = HashSet::new();
    let mut mutation_lhs: Vec<&[Spanned]> = Vec::new();
    let mut loop_depth = 0usize;

    for stmt in split_statements(tokens) {
        match stmt {
            [(kw, _), (Token::Ident(name), _), (Token::Assign, _), rhs @ ..]
                if kw.is_ident("var") || kw.is_ident("for") =>
            {
                let is_loop = kw.is_ident("for");
                *counts.entry(name.as_str()).or_default() += 1;
                if is_loop || loop_depth > 0 || rhs.iter().any(|(t, _)| *t == Token::At) || calls_random(rhs) {
                    tainted.insert(name.clone());
                }
                if is_loop {
                    loop_depth += 1;
                }
                decls.push((name.as_str(), rhs));
            }
            [(end, _), (kw, _)] if end.is_ident("end") && kw.is_ident("for") => {
                loop_depth = loop_depth.saturating_sub(1);
            }
            _ => {
                if let Some(eq) = stmt.iter().position(|(t, _)| *t == Token::Assign) {
                    mutation_lhs.push(&stmt[..eq]);
                }
            }
        }
    }

    let declared: HashSet<String> = decls.iter().map(|(name, _)| name.to_string()).collect();
    tainted.extend(counts.iter().filter(|(_, n)| **n > 1).map(|(name, _)| name.to_string()));

    // variables edited by a mutation, plus the variables they were bound from
    let mut mutated: HashSet<&str> = mutation_lhs
        .iter()
        .filter_map(|lhs| referenced(lhs).find(|name| declared.contains(*name)))
        .collect();
    loop {
        let before = mutated.len();
        for (name, rhs) in &decls {
            if mutated.contains(name) {
                let sources: Vec<&str> = referenced(rhs).filter(|r| declared.contains(*r)).collect();
                mutated.extend(sources);
            }
        }
        if mutated.len() == before {
            break;
        }
    }
    tainted.extend(mutated.into_iter().map(str::to_string));

    loop {
        let mut changed = false;
        for (name, rhs) in &decls {
            if !tainted.contains(*name) && referenced(rhs).any(|r| tainted.contains(r)) {
                tainted.insert(name.to_string());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    VarAnalysis { declared, tainted }
}

// ========================================
// Constant folding
// ========================================

/// No variables and no random calls anywhere below. `@` is allowed, since
/// inside an indexer it refers to the indexed node.
fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Input => true,
        Expr::Var { .. } => false,
        Expr::Unary { operand, .. } => is_pure(operand),
        Expr::Spread(inner) => is_pure(inner),
        Expr::Binary { left, right, .. } => is_pure(left) && is_pure(right),
        Expr::Call { name, args } => {
            functions::lookup(name).is_some_and(FunctionDef::is_deterministic) && args.iter().all(is_pure)
        }
        Expr::Slice { start, stop, step } => [start, stop, step]
            .into_iter()
            .all(|b| b.as_deref().is_none_or(is_pure)),
        Expr::Indexed { target, indexers } => is_pure(target) && indexers.iter().all(indexer_is_pure),
    }
}

fn indexer_is_pure(ix: &Indexer) -> bool {
    match &ix.kind {
        IndexerKind::Keys(exprs) | IndexerKind::Indices(exprs) | IndexerKind::ArrayProjection(exprs) => {
            exprs.iter().all(is_pure)
        }
        IndexerKind::Star => true,
        IndexerKind::Boolean(e) | IndexerKind::Map(e) => is_pure(e),
        IndexerKind::ObjectProjection(pairs) => pairs.iter().all(|(_, e)| is_pure(e)),
    }
}

fn is_literal(expr: &Expr) -> bool {
    expr.as_literal().is_some()
}

/// Whether `expr` can be evaluated now. Children are folded first, so only
/// the top node needs checking.
fn is_foldable(expr: &Expr) -> bool {
    match expr {
        Expr::Unary { operand, .. } => is_literal(operand),
        Expr::Binary { left, right, .. } => is_literal(left) && is_literal(right),
        Expr::Call { name, args } => {
            functions::lookup(name).is_some_and(FunctionDef::is_deterministic)
                && args.iter().all(|a| match a {
                    Expr::Spread(inner) => is_literal(inner),
                    other => is_literal(other),
                })
        }
        Expr::Slice { start, stop, step } => [start, stop, step]
            .into_iter()
            .all(|b| b.as_deref().is_none_or(is_literal)),
        Expr::Indexed { target, indexers } => is_literal(target) && indexers.iter().all(indexer_is_pure),
        _ => false,
    }
}

/// A program with no loops or mutations whose statements are all literals
/// has the value of its last statement.
fn finish(statements: Vec<Statement>) -> CompiledQuery {
    let all_literal = statements.iter().all(|s| match s {
        Statement::Expr(e) | Statement::Var { value: e, .. } => is_literal(e),
        _ => false,
    });
    if all_literal
        && let Some(Statement::Expr(Expr::Literal(node)) | Statement::Var { value: Expr::Literal(node), .. }) =
            statements.last()
    {
        return CompiledQuery::Const(node.clone());
    }
    CompiledQuery::Deferred(Program { statements })
}

// ========================================
// Parser
// ========================================

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    query: String,
    vars: VarAnalysis,
    /// Variables declared before the current token
    in_scope: HashSet<String>,
    /// Values of untainted variables declared so far
    consts: HashMap<String, Node>,
    depth: usize,
    folder: Evaluator,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>, query: &str) -> Self {
        let vars = analyze(&tokens);
        trace!(declared = vars.declared.len(), tainted = vars.tainted.len(), "analyzed variables");
        Parser {
            tokens,
            pos: 0,
            query: query.to_string(),
            vars,
            in_scope: HashSet::new(),
            consts: HashMap::new(),
            depth: 0,
            folder: Evaluator::with_seed(0),
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        // the last token is always Eof
        let i = (self.pos + offset).min(self.tokens.len().saturating_sub(1));
        &self.tokens[i].0
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.query.chars().count(), |(_, p)| *p)
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Take the current token and move past it.
    fn next_token(&mut self) -> Token {
        let tok = match self.tokens.get_mut(self.pos) {
            Some((tok, _)) if *tok != Token::Eof => mem::replace(tok, Token::Eof),
            _ => Token::Eof,
        };
        self.advance();
        tok
    }

    fn expect(&mut self, expected: Token) -> PResult<()> {
        if mem::discriminant(self.peek()) != mem::discriminant(&expected) {
            return Err(self.error(format!("Expected {}, found {}", expected, self.peek())).into());
        }
        self.advance();
        Ok(())
    }

    fn at_end_for(&self) -> bool {
        self.peek().is_ident("end") && self.peek_at(1).is_ident("for")
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.position(), message)
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            position,
            message: message.into(),
            query: self.query.clone(),
        }
    }

    fn fold(&mut self, expr: Expr) -> PResult<Expr> {
        if !is_foldable(&expr) {
            return Ok(expr);
        }
        let value = self.folder.eval(&expr, &Node::null())?.into_owned();
        trace!(value = %to_json(&value), "folded constant expression");
        Ok(Expr::Literal(value))
    }

    // ========================================
    // Statements
    // ========================================

    /// Parse the whole query.
    pub fn parse_program(mut self) -> PResult<CompiledQuery> {
        let statements = self.parse_block(false)?;
        if !matches!(self.peek(), Token::Eof) {
            return Err(self.error(format!("Unexpected token {}", self.peek())).into());
        }
        if statements.is_empty() {
            return Err(self.error("Empty query").into());
        }
        Ok(finish(statements))
    }

    /// Statements up to the end of the query, or up to and including
    /// `end for` inside a loop.
    fn parse_block(&mut self, in_loop: bool) -> PResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek(), Token::Semicolon) {
                self.advance();
            }
            if matches!(self.peek(), Token::Eof) {
                break;
            }
            if self.at_end_for() {
                if !in_loop {
                    return Err(self.error("'end for' without a matching 'for'").into());
                }
                self.advance();
                self.advance();
                break;
            }
            statements.push(self.parse_statement()?);
            match self.peek() {
                Token::Semicolon => self.advance(),
                Token::Eof => {}
                other => {
                    return Err(self.error(format!("Expected ';' or end of query, found {}", other)).into());
                }
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        let is_decl = (self.peek().is_ident("var") || self.peek().is_ident("for"))
            && matches!(self.peek_at(1), Token::Ident(_))
            && matches!(self.peek_at(2), Token::Assign);
        if is_decl {
            return self.parse_declaration();
        }
        if matches!(self.peek(), Token::Assign) {
            return Err(self.error("Assignment with no LHS").into());
        }

        let selector = self.parse_expr(0)?;
        if !matches!(self.peek(), Token::Assign) {
            return Ok(Statement::Expr(selector));
        }
        self.advance();
        if matches!(self.peek(), Token::Semicolon | Token::Eof) || self.at_end_for() {
            return Err(self.error("Assignment with no RHS").into());
        }
        let mutator = self.parse_expr(0)?;
        if matches!(self.peek(), Token::Assign) {
            return Err(self.error("Only one '=' assignment operator allowed in a query").into());
        }
        if is_literal(&selector) {
            return Err(self.error("The left side of '=' must select part of the input or a variable").into());
        }
        Ok(Statement::Mutation { selector, mutator })
    }

    fn parse_declaration(&mut self) -> PResult<Statement> {
        let is_loop = self.peek().is_ident("for");
        self.advance();
        let Token::Ident(name) = self.next_token() else {
            return Err(self.error("Expected a variable name").into());
        };
        self.expect(Token::Assign)?;
        if matches!(self.peek(), Token::Semicolon | Token::Eof) {
            return Err(self.error(format!("Variable {} declared with no value", name)).into());
        }
        let value = self.parse_expr(0)?;
        self.in_scope.insert(name.clone());

        if !is_loop {
            if !self.vars.tainted.contains(&name)
                && let Expr::Literal(node) = &value
            {
                trace!(name = %name, "constant variable");
                self.consts.insert(name.clone(), node.clone());
            }
            return Ok(Statement::Var { name, value });
        }

        match self.peek() {
            Token::Semicolon => self.advance(),
            Token::Eof => {}
            other => {
                return Err(self.error(format!("Expected ';' after loop header, found {}", other)).into());
            }
        }
        let body = self.parse_block(true)?;
        Ok(Statement::For {
            name,
            iterable: value,
            body,
        })
    }

    // ========================================
    // Expressions
    // ========================================

    fn parse_expr(&mut self, min_bp: u8) -> PResult<Expr> {
        self.depth += 1;
        if self.depth > MAX_QUERY_DEPTH {
            return Err(self
                .error(format!("Maximum recursion depth ({}) reached", MAX_QUERY_DEPTH))
                .into());
        }
        let result = self.parse_binary(min_bp);
        self.depth -= 1;
        result
    }

    /// Precedence climbing over binary operators.
    fn parse_binary(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::BinOp(op) => *op,
                _ => break,
            };
            let bp = op.precedence();
            if bp < min_bp {
                break;
            }
            self.advance();
            let next_min = if op.is_right_associative() { bp } else { bp + 1 };
            let right = self.parse_expr(next_min)?;
            left = self.fold(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    /// `-x`, `+x` and `not x`. The operand extends over every binary operator
    /// that binds tighter than the unary one.
    fn parse_unary(&mut self) -> PResult<Expr> {
        let starts_operand = matches!(
            self.peek_at(1),
            Token::Literal(_) | Token::Ident(_) | Token::At | Token::BinOp(BinOp::Subtract | BinOp::Add)
        );
        let op = match self.peek() {
            Token::BinOp(BinOp::Subtract) => UnaryOp::Negate,
            Token::BinOp(BinOp::Add) => UnaryOp::Plus,
            t if t.is_ident("not") && starts_operand => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_expr(op.precedence())?;
        self.fold(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// A primary followed by any number of indexers. Scalar literals only
    /// take projections.
    fn parse_postfix(&mut self) -> PResult<Expr> {
        let target = self.parse_primary()?;
        let scalar = matches!(&target, Expr::Literal(n) if !n.is_iterable());
        let mut indexers = Vec::new();
        loop {
            let ix = match self.peek() {
                Token::LBrace => self.parse_projection()?,
                Token::Arrow => {
                    self.advance();
                    let body = self.parse_postfix()?;
                    Indexer::new(IndexerKind::Map(Box::new(body)))
                }
                Token::Dot | Token::LBracket | Token::Bang if !scalar => self.parse_indexer()?,
                _ => break,
            };
            indexers.push(ix);
        }
        if indexers.is_empty() {
            return Ok(target);
        }
        self.fold(Expr::Indexed {
            target: Box::new(target),
            indexers,
        })
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.position();
        match self.next_token() {
            Token::Literal(node) => Ok(Expr::Literal(node)),
            Token::At => Ok(Expr::Input),
            Token::LParen => {
                let expr = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Token::LParen) {
                    return self.parse_call(name, start);
                }
                if self.in_scope.contains(&name) {
                    return Ok(match self.consts.get(&name) {
                        Some(node) => Expr::Literal(node.clone()),
                        None => Expr::Var { name, forward: false },
                    });
                }
                if self.vars.declared.contains(&name) {
                    return Ok(Expr::Var { name, forward: true });
                }
                Ok(Expr::Literal(Node::new(Value::Str(name), start)))
            }
            Token::BinOp(op) => Err(self
                .error_at(start, format!("Binop {} without appropriate left operand", op.symbol()))
                .into()),
            Token::Eof => Err(self.error_at(start, "Unexpected end of query").into()),
            other => Err(self.error_at(start, format!("Unexpected token {}", other)).into()),
        }
    }

    fn parse_call(&mut self, name: String, start: usize) -> PResult<Expr> {
        let def = functions::lookup(&name).ok_or_else(|| {
            self.error_at(start, format!("'{}' is not the name of a RemesPath function", name))
        })?;
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        let mut spread = false;
        if matches!(self.peek(), Token::RParen) {
            self.advance();
        } else {
            loop {
                let index = args.len();
                let arg = match self.peek() {
                    Token::Comma | Token::RParen => {
                        if index < def.min_args {
                            return Err(ArgumentError::new(def.name, index, "required argument is missing").into());
                        }
                        Expr::Literal(Node::null())
                    }
                    Token::BinOp(BinOp::Multiply) => {
                        self.advance();
                        spread = true;
                        Expr::Spread(Box::new(self.parse_expr(0)?))
                    }
                    _ if def.arg_type(index).contains(Dtype::SLICE) => self.parse_slice_or_expr()?,
                    _ => self.parse_expr(0)?,
                };
                args.push(arg);
                match self.next_token() {
                    Token::Comma => {}
                    Token::RParen => break,
                    other => {
                        return Err(self
                            .error(format!(
                                "Arguments of function {} must be followed by ',' or ')', not {}",
                                name, other
                            ))
                            .into());
                    }
                }
            }
        }

        if !spread {
            def.check_arity(args.len())?;
            for (i, arg) in args.iter().enumerate() {
                if i == 0 && def.vectorized {
                    continue;
                }
                if let Expr::Literal(node) = arg {
                    def.check_arg(i, node)?;
                }
            }
        }
        self.fold(Expr::Call { name, args })
    }

    // ========================================
    // Indexers
    // ========================================

    fn parse_indexer(&mut self) -> PResult<Indexer> {
        let negated = matches!(self.peek(), Token::Bang);
        if negated {
            self.advance();
        }
        let mut recursive = false;
        let kind = match self.peek() {
            Token::Dot => {
                self.advance();
                if matches!(self.peek(), Token::Dot) {
                    self.advance();
                    recursive = true;
                }
                if recursive && matches!(self.peek(), Token::LBracket) {
                    self.parse_bracket()?
                } else {
                    self.parse_dot_key()?
                }
            }
            Token::LBracket => self.parse_bracket()?,
            other => {
                return Err(self.error(format!("Expected '.' or '[' after '!', found {}", other)).into());
            }
        };

        if recursive && negated {
            return Err(self.error("Negated indexers cannot be recursive").into());
        }
        if recursive && matches!(kind, IndexerKind::Boolean(_)) {
            return Err(self.error("Boolean indexers cannot be recursive").into());
        }
        if negated && matches!(kind, IndexerKind::Star) {
            return Err(self.error("'*' cannot be negated").into());
        }
        Ok(Indexer {
            kind,
            recursive,
            negated,
        })
    }

    fn parse_dot_key(&mut self) -> PResult<IndexerKind> {
        let start = self.position();
        match self.next_token() {
            Token::Ident(name) => Ok(IndexerKind::Keys(vec![Expr::Literal(Node::new(Value::Str(name), start))])),
            Token::Literal(node) if matches!(node.value, Value::Str(_) | Value::Regex(_)) => {
                Ok(IndexerKind::Keys(vec![Expr::Literal(node)]))
            }
            Token::BinOp(BinOp::Multiply) => Ok(IndexerKind::Star),
            _ => Err(self
                .error_at(
                    start,
                    "'.' syntax for indexers requires that the indexer be a string, regex, or '*'",
                )
                .into()),
        }
    }

    /// `[...]` after the opening bracket has been seen.
    fn parse_bracket(&mut self) -> PResult<IndexerKind> {
        self.expect(Token::LBracket)?;
        if matches!(self.peek(), Token::BinOp(BinOp::Multiply)) && matches!(self.peek_at(1), Token::RBracket) {
            self.advance();
            self.advance();
            return Ok(IndexerKind::Star);
        }

        let mut items = Vec::new();
        loop {
            match self.peek() {
                Token::RBracket if items.is_empty() => return Err(self.error("Empty indexer").into()),
                Token::RBracket => {
                    self.advance();
                    break;
                }
                Token::Comma => return Err(self.error("Comma with no preceding element in indexer").into()),
                _ => {}
            }
            items.push(self.parse_slice_or_expr()?);
            match self.peek() {
                Token::Comma => self.advance(),
                Token::RBracket => {}
                other => {
                    return Err(self
                        .error(format!("Elements of an indexer must be separated by ',', found {}", other))
                        .into());
                }
            }
        }
        self.classify(items)
    }

    /// Decide what a bracketed list selects from the kinds of its elements.
    fn classify(&self, mut items: Vec<Expr>) -> PResult<IndexerKind> {
        // Some(true): key, Some(false): index
        fn family(e: &Expr) -> Option<bool> {
            match e {
                Expr::Literal(n) => match n.value {
                    Value::Str(_) | Value::Regex(_) => Some(true),
                    Value::Int(_) | Value::Slice(_) => Some(false),
                    _ => None,
                },
                Expr::Slice { .. } => Some(false),
                _ => None,
            }
        }
        let has_keys = items.iter().any(|e| family(e) == Some(true));
        let has_indices = items.iter().any(|e| family(e) == Some(false));
        match (has_keys, has_indices) {
            (true, true) => Err(self
                .error("Cannot have indexers with a mix of ints/slicers and strings/regexes")
                .into()),
            (true, false) => Ok(IndexerKind::Keys(items)),
            (false, true) => Ok(IndexerKind::Indices(items)),
            (false, false) if items.len() == 1 => match items.pop() {
                Some(pred) => Ok(IndexerKind::Boolean(Box::new(pred))),
                None => Err(self.error("Empty indexer").into()),
            },
            (false, false) => Err(self
                .error("Entries in an indexer list must be string, regex, int, or slice")
                .into()),
        }
    }

    /// An expression, or a slice `start:stop:step` with any part omitted.
    fn parse_slice_or_expr(&mut self) -> PResult<Expr> {
        let start = if matches!(self.peek(), Token::Colon) {
            None
        } else {
            let e = self.parse_expr(0)?;
            if !matches!(self.peek(), Token::Colon) {
                return Ok(e);
            }
            Some(e)
        };

        let mut parts = vec![start];
        while matches!(self.peek(), Token::Colon) && parts.len() < 3 {
            self.advance();
            let part = if matches!(
                self.peek(),
                Token::Colon | Token::Comma | Token::RBracket | Token::RParen
            ) {
                None
            } else {
                Some(self.parse_expr(0)?)
            };
            parts.push(part);
        }

        for part in parts.iter().flatten() {
            if let Expr::Literal(n) = part
                && !matches!(n.value, Value::Int(_) | Value::Null)
            {
                return Err(self.error("Found non-integer while parsing a slicer").into());
            }
        }
        let mut parts = parts.into_iter().map(|p| p.map(Box::new));
        let (start, stop, step) = (
            parts.next().flatten(),
            parts.next().flatten(),
            parts.next().flatten(),
        );
        self.fold(Expr::Slice { start, stop, step })
    }

    /// `{a, b}` builds an array, `{k: a, j: b}` an object.
    fn parse_projection(&mut self) -> PResult<Indexer> {
        self.expect(Token::LBrace)?;
        let mut values = Vec::new();
        let mut pairs = Vec::new();
        loop {
            if matches!(self.peek(), Token::RBrace) {
                if values.is_empty() && pairs.is_empty() {
                    return Err(self.error("Empty projection").into());
                }
                self.advance();
                break;
            }

            let first = match (self.peek(), self.peek_at(1)) {
                (Token::Ident(name), Token::Colon) => {
                    let key = Expr::Literal(Node::from(name.as_str()));
                    self.advance();
                    key
                }
                _ => self.parse_expr(0)?,
            };

            if matches!(self.peek(), Token::Colon) {
                if !values.is_empty() {
                    return Err(self
                        .error("Mixture of values and key-value pairs in object/array projection")
                        .into());
                }
                let key = match first {
                    Expr::Literal(Node {
                        value: Value::Str(s), ..
                    }) => s,
                    Expr::Literal(n) => {
                        return Err(self
                            .error(format!(
                                "Object projection keys must be string, not {}",
                                n.value.type_name()
                            ))
                            .into());
                    }
                    _ => return Err(self.error("Object projection keys must be constant strings").into()),
                };
                self.advance();
                pairs.push((key, self.parse_expr(0)?));
            } else {
                if !pairs.is_empty() {
                    return Err(self
                        .error("Mixture of values and key-value pairs in object/array projection")
                        .into());
                }
                values.push(first);
            }

            match self.peek() {
                Token::Comma => self.advance(),
                Token::RBrace => {}
                _ => {
                    return Err(self
                        .error("Values or key-value pairs in a projection must be comma-delimited")
                        .into());
                }
            }
        }

        let kind = if pairs.is_empty() {
            IndexerKind::ArrayProjection(values)
        } else {
            IndexerKind::ObjectProjection(pairs)
        };
        Ok(Indexer::new(kind))
    }
}

/// Compile a query.
///
/// # Examples
///
/// ```
/// use remespath::parser::compile;
///
/// assert!(compile("len(j`[1, 2, 3]`) * 2").unwrap().is_const());
/// assert!(!compile("@.a[0]").unwrap().is_const());
/// assert!(compile("@.a[").is_err());
/// ```
pub fn compile(query: &str) -> Result<CompiledQuery, QueryError> {
    let tokens = lexer::tokenize(query)?;
    let compiled = Parser::new(tokens, query).parse_program()?;
    debug!(is_const = compiled.is_const(), mutation = compiled.is_mutation(), "compiled query");
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(query: &str) -> Node {
        match compile(query).unwrap() {
            CompiledQuery::Const(node) => node,
            other => panic!("expected a constant, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_binding() {
        assert_eq!(constant("-2 ** 2"), Node::from(-4.0));
        assert_eq!(constant("2 ** -1"), Node::from(0.5));
        assert_eq!(constant("-2 * 3"), Node::from(-6));
        assert_eq!(constant("2 ** 3 ** 2"), Node::from(512.0));
    }

    #[test]
    fn test_constant_variables_fold() {
        assert_eq!(constant("var x = 3; x * 2"), Node::from(6));
        assert!(!compile("var x = @; x * 2").unwrap().is_const());
    }

    #[test]
    fn test_taint_follows_references() {
        let tokens = lexer::tokenize("var a = @.x; var b = a + 1; var c = 2").unwrap();
        let vars = analyze(&tokens);
        assert!(vars.tainted.contains("a"));
        assert!(vars.tainted.contains("b"));
        assert!(!vars.tainted.contains("c"));
    }
}
