use crate::ast::Expr;

/// Statement of a RemesPath program.
///
/// Statements are separated by `;`. The value of a program is the value of
/// its last statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Plain expression
    ///
    /// # Example
    /// ```text
    /// @.items[0]
    /// ```
    Expr(Expr),

    /// Variable declaration; evaluates to the bound value
    ///
    /// # Example
    /// ```text
    /// var total = sum(@.prices)
    /// ```
    Var { name: String, value: Expr },

    /// Loop over an array; evaluates to the iterated array
    ///
    /// # Example
    /// ```text
    /// for x = range(3);
    ///     var y = x * 2;
    /// end for
    /// ```
    For {
        name: String,
        iterable: Expr,
        body: Vec<Statement>,
    },

    /// In-place edit of every node matched by `selector`; evaluates to the
    /// edited document
    ///
    /// # Example
    /// ```text
    /// @.prices[@ < 0] = 0
    /// ```
    Mutation { selector: Expr, mutator: Expr },
}
