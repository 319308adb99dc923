/*!
# Python-Subset Parser

Turns a source module into an AST suitable for canonicalization: a `logos`
lexer with an indentation pass, a recursive-descent grammar, and a
deterministic pretty-printer that inverts the parse.

The accepted subset covers the constructs a single pool function may use:
imports, one (async) function definition with nested functions and lambdas,
the usual statements and expressions, comprehensions, and `await`.
Classes, `yield`, f-strings, `with`, `try`, and `match` are rejected as
unsupported constructs with their source span.
*/

pub mod ast;
pub mod grammar;
pub mod lexer;
pub mod printer;

pub use ast::{Constant, Expr, ExprKind, Module, Position, Stmt, StmtKind};
pub use grammar::parse_module;
pub use printer::print_module;
