//! Shared mutable AST traversal used by the normalizer's passes.
//!
//! One walk order serves all passes: a `FunctionDef` visits its name, then
//! every parameter name in declaration order, then annotations and defaults,
//! then the body, then the decorators. This is what makes canonical-name
//! allocation reserve index 0 for the function and 1..k for the parameters.

use crate::core::Result;
use crate::parser::ast::*;

pub(crate) trait Transform {
    /// A `Name` reference (load, store or delete context).
    fn on_name(&mut self, _id: &mut String, _pos: Position) -> Result<()> {
        Ok(())
    }

    /// A binding occurrence: function name, parameter, `global`/`nonlocal`.
    fn on_binding(&mut self, _name: &mut String, _pos: Position) -> Result<()> {
        Ok(())
    }

    /// Called before walking into an expression; may replace the node.
    /// Return false to skip the (possibly replaced) subtree.
    fn pre_expr(&mut self, _expr: &mut Expr) -> Result<bool> {
        Ok(true)
    }

    /// Called on every statement before its children are walked.
    fn pre_stmt(&mut self, _stmt: &mut Stmt) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn walk_function_def<T: Transform + ?Sized>(
    t: &mut T,
    def: &mut FunctionDef,
    pos: Position,
) -> Result<()> {
    t.on_binding(&mut def.name, pos)?;
    walk_param_bindings(t, &mut def.args)?;
    walk_param_exprs(t, &mut def.args)?;
    if let Some(returns) = &mut def.returns {
        walk_expr(t, returns)?;
    }
    for stmt in &mut def.body {
        walk_stmt(t, stmt)?;
    }
    for decorator in &mut def.decorators {
        walk_expr(t, decorator)?;
    }
    Ok(())
}

fn walk_param_bindings<T: Transform + ?Sized>(t: &mut T, args: &mut Arguments) -> Result<()> {
    for param in args
        .posonly
        .iter_mut()
        .chain(args.args.iter_mut())
        .chain(args.vararg.iter_mut())
        .chain(args.kwonly.iter_mut())
        .chain(args.kwarg.iter_mut())
    {
        t.on_binding(&mut param.name, param.pos)?;
    }
    Ok(())
}

fn walk_param_exprs<T: Transform + ?Sized>(t: &mut T, args: &mut Arguments) -> Result<()> {
    for param in args
        .posonly
        .iter_mut()
        .chain(args.args.iter_mut())
        .chain(args.vararg.iter_mut())
        .chain(args.kwonly.iter_mut())
        .chain(args.kwarg.iter_mut())
    {
        if let Some(annotation) = &mut param.annotation {
            walk_expr(t, annotation)?;
        }
    }
    for default in &mut args.defaults {
        walk_expr(t, default)?;
    }
    for default in args.kw_defaults.iter_mut().flatten() {
        walk_expr(t, default)?;
    }
    Ok(())
}

pub(crate) fn walk_stmt<T: Transform + ?Sized>(t: &mut T, stmt: &mut Stmt) -> Result<()> {
    t.pre_stmt(stmt)?;
    let pos = stmt.pos;
    match &mut stmt.kind {
        StmtKind::FunctionDef(def) => walk_function_def(t, def, pos)?,
        StmtKind::Return { value } => {
            if let Some(value) = value {
                walk_expr(t, value)?;
            }
        }
        StmtKind::Assign { targets, value } => {
            for target in targets {
                walk_expr(t, target)?;
            }
            walk_expr(t, value)?;
        }
        StmtKind::AugAssign { target, value, .. } => {
            walk_expr(t, target)?;
            walk_expr(t, value)?;
        }
        StmtKind::Expr { value } => walk_expr(t, value)?,
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            walk_expr(t, test)?;
            for stmt in body.iter_mut().chain(orelse.iter_mut()) {
                walk_stmt(t, stmt)?;
            }
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            walk_expr(t, target)?;
            walk_expr(t, iter)?;
            for stmt in body.iter_mut().chain(orelse.iter_mut()) {
                walk_stmt(t, stmt)?;
            }
        }
        // Import-bound names are never renamed; the import classifier
        // handles these statements separately.
        StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => {}
        StmtKind::Global { names } | StmtKind::Nonlocal { names } => {
            for name in names {
                t.on_binding(name, pos)?;
            }
        }
        StmtKind::Delete { targets } => {
            for target in targets {
                walk_expr(t, target)?;
            }
        }
        StmtKind::Raise { exc, cause } => {
            if let Some(exc) = exc {
                walk_expr(t, exc)?;
            }
            if let Some(cause) = cause {
                walk_expr(t, cause)?;
            }
        }
        StmtKind::Assert { test, msg } => {
            walk_expr(t, test)?;
            if let Some(msg) = msg {
                walk_expr(t, msg)?;
            }
        }
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
    }
    Ok(())
}

pub(crate) fn walk_expr<T: Transform + ?Sized>(t: &mut T, expr: &mut Expr) -> Result<()> {
    if !t.pre_expr(expr)? {
        return Ok(());
    }
    let pos = expr.pos;
    match &mut expr.kind {
        ExprKind::Name { id } => t.on_name(id, pos)?,
        ExprKind::Constant { .. } => {}
        ExprKind::BinOp { left, right, .. } => {
            walk_expr(t, left)?;
            walk_expr(t, right)?;
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr(t, operand)?,
        ExprKind::BoolOp { values, .. } => {
            for value in values {
                walk_expr(t, value)?;
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr(t, left)?;
            for comparator in comparators {
                walk_expr(t, comparator)?;
            }
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            walk_expr(t, func)?;
            for arg in args {
                walk_expr(t, arg)?;
            }
            // Keyword-argument names at call sites stay untouched.
            for keyword in keywords {
                walk_expr(t, &mut keyword.value)?;
            }
        }
        // Attribute names (right of the dot) are never renamed.
        ExprKind::Attribute { value, .. } => walk_expr(t, value)?,
        ExprKind::Subscript { value, index } => {
            walk_expr(t, value)?;
            walk_expr(t, index)?;
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                walk_expr(t, part)?;
            }
        }
        ExprKind::List { elts } | ExprKind::Tuple { elts } | ExprKind::Set { elts } => {
            for elt in elts {
                walk_expr(t, elt)?;
            }
        }
        ExprKind::Dict { keys, values } => {
            for key in keys.iter_mut().flatten() {
                walk_expr(t, key)?;
            }
            for value in values {
                walk_expr(t, value)?;
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            walk_expr(t, body)?;
            walk_expr(t, test)?;
            walk_expr(t, orelse)?;
        }
        ExprKind::Lambda { args, body } => {
            walk_param_bindings(t, args)?;
            walk_param_exprs(t, args)?;
            walk_expr(t, body)?;
        }
        ExprKind::ListComp { elt, generators } | ExprKind::SetComp { elt, generators } => {
            walk_expr(t, elt)?;
            walk_generators(t, generators)?;
        }
        ExprKind::GeneratorExp { elt, generators } => {
            walk_expr(t, elt)?;
            walk_generators(t, generators)?;
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            walk_expr(t, key)?;
            walk_expr(t, value)?;
            walk_generators(t, generators)?;
        }
        ExprKind::Starred { value } | ExprKind::Await { value } => walk_expr(t, value)?,
    }
    Ok(())
}

fn walk_generators<T: Transform + ?Sized>(
    t: &mut T,
    generators: &mut [Comprehension],
) -> Result<()> {
    for generator in generators {
        walk_expr(t, &mut generator.target)?;
        walk_expr(t, &mut generator.iter)?;
        for cond in &mut generator.ifs {
            walk_expr(t, cond)?;
        }
    }
    Ok(())
}

