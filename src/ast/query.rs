use crate::{ast::Statement, value::Node};

/// Statements of a query that must run against an input.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn has_mutation(&self) -> bool {
        fn any_mutation(stmts: &[Statement]) -> bool {
            stmts.iter().any(|s| match s {
                Statement::Mutation { .. } => true,
                Statement::For { body, .. } => any_mutation(body),
                _ => false,
            })
        }
        any_mutation(&self.statements)
    }
}

/// Result of compiling a query.
///
/// A query with no dependence on its input is evaluated once at compile
/// time; anything else is kept as a program.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    /// Same value for every input
    Const(Node),
    /// Evaluated per input
    Deferred(Program),
}

impl CompiledQuery {
    pub fn is_const(&self) -> bool {
        matches!(self, CompiledQuery::Const(_))
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, CompiledQuery::Deferred(p) if p.has_mutation())
    }
}
