/*!
# Deterministic Pretty-Printer

Inverts the parse with one fixed set of rules, so that equal ASTs always
produce byte-identical text: 4-space indents, LF line endings, no trailing
whitespace, spaces around binary operators, `key=value` keywords, tuples
always parenthesized, minimal parentheses elsewhere driven by operator
precedence. Hashing depends on this determinism; the normalizer re-parses
the printed output and checks it reprints identically (fixed point).
*/

use super::ast::*;

const INDENT: &str = "    ";

// Precedence table; larger binds tighter. Children are printed with the
// minimum precedence their slot requires and get parenthesized below it.
const PREC_LAMBDA: u8 = 1;
const PREC_IFEXP: u8 = 2;
const PREC_OR: u8 = 3;
const PREC_AND: u8 = 4;
const PREC_NOT: u8 = 5;
const PREC_COMPARE: u8 = 6;
const PREC_BITOR: u8 = 7;
const PREC_BITXOR: u8 = 8;
const PREC_BITAND: u8 = 9;
const PREC_SHIFT: u8 = 10;
const PREC_ARITH: u8 = 11;
const PREC_TERM: u8 = 12;
const PREC_UNARY: u8 = 13;
const PREC_POW: u8 = 14;
const PREC_AWAIT: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_ATOM: u8 = 17;

/// Print a module deterministically.
pub fn print_module(module: &Module) -> String {
    let mut printer = Printer {
        out: String::new(),
        depth: 0,
    };
    for stmt in &module.body {
        printer.stmt(stmt);
    }
    // Statements each end with a newline; drop the last one so the text has
    // no trailing newline and rejoins stably.
    if printer.out.ends_with('\n') {
        printer.out.pop();
    }
    printer.out
}

struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::FunctionDef(def) => self.function_def(def),
            StmtKind::Return { value } => {
                self.line_start();
                match value {
                    Some(v) => {
                        self.push("return ");
                        self.expr(v, 0);
                    }
                    None => self.push("return"),
                }
                self.push("\n");
            }
            StmtKind::Assign { targets, value } => {
                self.line_start();
                for target in targets {
                    self.expr(target, 0);
                    self.push(" = ");
                }
                self.expr(value, 0);
                self.push("\n");
            }
            StmtKind::AugAssign { target, op, value } => {
                self.line_start();
                self.expr(target, 0);
                self.push(" ");
                self.push(op.symbol());
                self.push("= ");
                self.expr(value, 0);
                self.push("\n");
            }
            StmtKind::Expr { value } => {
                self.line_start();
                self.expr(value, 0);
                self.push("\n");
            }
            StmtKind::If { test, body, orelse } => self.if_chain(test, body, orelse, "if"),
            StmtKind::While { test, body, orelse } => {
                self.line_start();
                self.push("while ");
                self.expr(test, 0);
                self.push(":\n");
                self.block(body);
                if !orelse.is_empty() {
                    self.line_start();
                    self.push("else:\n");
                    self.block(orelse);
                }
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.line_start();
                self.push("for ");
                self.expr(target, 0);
                self.push(" in ");
                self.expr(iter, 0);
                self.push(":\n");
                self.block(body);
                if !orelse.is_empty() {
                    self.line_start();
                    self.push("else:\n");
                    self.block(orelse);
                }
            }
            StmtKind::Import { names } => {
                self.line_start();
                self.push("import ");
                self.aliases(names);
                self.push("\n");
            }
            StmtKind::ImportFrom { module, names } => {
                self.line_start();
                self.push("from ");
                self.push(module);
                self.push(" import ");
                self.aliases(names);
                self.push("\n");
            }
            StmtKind::Global { names } => {
                self.line_start();
                self.push("global ");
                self.push(&names.join(", "));
                self.push("\n");
            }
            StmtKind::Nonlocal { names } => {
                self.line_start();
                self.push("nonlocal ");
                self.push(&names.join(", "));
                self.push("\n");
            }
            StmtKind::Delete { targets } => {
                self.line_start();
                self.push("del ");
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(target, 0);
                }
                self.push("\n");
            }
            StmtKind::Raise { exc, cause } => {
                self.line_start();
                self.push("raise");
                if let Some(exc) = exc {
                    self.push(" ");
                    self.expr(exc, 0);
                    if let Some(cause) = cause {
                        self.push(" from ");
                        self.expr(cause, 0);
                    }
                }
                self.push("\n");
            }
            StmtKind::Assert { test, msg } => {
                self.line_start();
                self.push("assert ");
                self.expr(test, 0);
                if let Some(msg) = msg {
                    self.push(", ");
                    self.expr(msg, 0);
                }
                self.push("\n");
            }
            StmtKind::Pass => {
                self.line_start();
                self.push("pass\n");
            }
            StmtKind::Break => {
                self.line_start();
                self.push("break\n");
            }
            StmtKind::Continue => {
                self.line_start();
                self.push("continue\n");
            }
        }
    }

    fn if_chain(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt], keyword: &str) {
        self.line_start();
        self.push(keyword);
        self.push(" ");
        self.expr(test, 0);
        self.push(":\n");
        self.block(body);
        match orelse {
            [] => {}
            [Stmt {
                kind:
                    StmtKind::If {
                        test: inner_test,
                        body: inner_body,
                        orelse: inner_orelse,
                    },
                ..
            }] => self.if_chain(inner_test, inner_body, inner_orelse, "elif"),
            _ => {
                self.line_start();
                self.push("else:\n");
                self.block(orelse);
            }
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
    }

    fn function_def(&mut self, def: &FunctionDef) {
        for decorator in &def.decorators {
            self.line_start();
            self.push("@");
            self.expr(decorator, 0);
            self.push("\n");
        }
        self.line_start();
        if def.is_async {
            self.push("async ");
        }
        self.push("def ");
        self.push(&def.name);
        self.push("(");
        self.arguments(&def.args);
        self.push(")");
        if let Some(returns) = &def.returns {
            self.push(" -> ");
            self.expr(returns, 0);
        }
        self.push(":\n");
        self.block(&def.body);
    }

    fn arguments(&mut self, args: &Arguments) {
        let mut first = true;
        let mut sep = |p: &mut Self, first: &mut bool| {
            if !*first {
                p.push(", ");
            }
            *first = false;
        };

        // Defaults attach to the tail of posonly + args.
        let positional: Vec<&Param> = args.posonly.iter().chain(args.args.iter()).collect();
        let without_default = positional.len() - args.defaults.len();

        for (i, param) in positional.iter().enumerate() {
            sep(self, &mut first);
            self.param(param);
            if i >= without_default {
                self.push("=");
                self.expr(&args.defaults[i - without_default], PREC_LAMBDA);
            }
            if !args.posonly.is_empty() && i + 1 == args.posonly.len() {
                self.push(", /");
            }
        }

        if let Some(vararg) = &args.vararg {
            sep(self, &mut first);
            self.push("*");
            self.param(vararg);
        } else if !args.kwonly.is_empty() {
            sep(self, &mut first);
            self.push("*");
        }

        for (param, default) in args.kwonly.iter().zip(args.kw_defaults.iter()) {
            sep(self, &mut first);
            self.param(param);
            if let Some(default) = default {
                self.push("=");
                self.expr(default, PREC_LAMBDA);
            }
        }

        if let Some(kwarg) = &args.kwarg {
            sep(self, &mut first);
            self.push("**");
            self.param(kwarg);
        }
    }

    fn param(&mut self, param: &Param) {
        self.push(&param.name);
        if let Some(annotation) = &param.annotation {
            self.push(": ");
            self.expr(annotation, PREC_LAMBDA);
        }
    }

    fn aliases(&mut self, names: &[ImportAlias]) {
        for (i, alias) in names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&alias.name);
            if let Some(asname) = &alias.asname {
                self.push(" as ");
                self.push(asname);
            }
        }
    }

    fn expr(&mut self, expr: &Expr, min_prec: u8) {
        let prec = precedence(expr);
        let parens = prec < min_prec;
        if parens {
            self.push("(");
        }
        match &expr.kind {
            ExprKind::Name { id } => self.push(id),
            ExprKind::Constant { value } => self.constant(value),
            ExprKind::BinOp { left, op, right } => {
                let (lp, rp) = match op {
                    BinOp::Pow => (prec + 1, prec),
                    _ => (prec, prec + 1),
                };
                self.expr(left, lp);
                self.push(" ");
                self.push(op.symbol());
                self.push(" ");
                self.expr(right, rp);
            }
            ExprKind::UnaryOp { op, operand } => {
                self.push(op.symbol());
                let operand_prec = match op {
                    UnaryOp::Not => PREC_NOT,
                    _ => PREC_UNARY,
                };
                self.expr(operand, operand_prec);
            }
            ExprKind::BoolOp { op, values } => {
                let word = match op {
                    BoolOpKind::And => " and ",
                    BoolOpKind::Or => " or ",
                };
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(word);
                    }
                    self.expr(value, prec + 1);
                }
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                self.expr(left, PREC_BITOR);
                for (op, comparator) in ops.iter().zip(comparators.iter()) {
                    self.push(" ");
                    self.push(op.symbol());
                    self.push(" ");
                    self.expr(comparator, PREC_BITOR);
                }
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.expr(func, PREC_POSTFIX);
                self.push("(");
                let mut first = true;
                for arg in args {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.expr(arg, 0);
                }
                for keyword in keywords {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    match &keyword.arg {
                        Some(name) => {
                            self.push(name);
                            self.push("=");
                            self.expr(&keyword.value, PREC_LAMBDA);
                        }
                        None => {
                            self.push("**");
                            self.expr(&keyword.value, PREC_LAMBDA);
                        }
                    }
                }
                self.push(")");
            }
            ExprKind::Attribute { value, attr } => {
                self.expr(value, PREC_POSTFIX);
                self.push(".");
                self.push(attr);
            }
            ExprKind::Subscript { value, index } => {
                self.expr(value, PREC_POSTFIX);
                self.push("[");
                // Tuples and slices in subscripts print bare: `x[1:2, 3]`.
                match &index.kind {
                    ExprKind::Tuple { elts } if !elts.is_empty() => {
                        for (i, elt) in elts.iter().enumerate() {
                            if i > 0 {
                                self.push(", ");
                            }
                            self.expr(elt, 0);
                        }
                        if elts.len() == 1 {
                            self.push(",");
                        }
                    }
                    _ => self.expr(index, 0),
                }
                self.push("]");
            }
            ExprKind::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    self.expr(lower, PREC_IFEXP);
                }
                self.push(":");
                if let Some(upper) = upper {
                    self.expr(upper, PREC_IFEXP);
                }
                if let Some(step) = step {
                    self.push(":");
                    self.expr(step, PREC_IFEXP);
                }
            }
            ExprKind::List { elts } => {
                self.push("[");
                self.comma_separated(elts);
                self.push("]");
            }
            ExprKind::Tuple { elts } => {
                self.push("(");
                self.comma_separated(elts);
                if elts.len() == 1 {
                    self.push(",");
                }
                self.push(")");
            }
            ExprKind::Set { elts } => {
                self.push("{");
                self.comma_separated(elts);
                self.push("}");
            }
            ExprKind::Dict { keys, values } => {
                self.push("{");
                for (i, (key, value)) in keys.iter().zip(values.iter()).enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match key {
                        Some(key) => {
                            self.expr(key, 0);
                            self.push(": ");
                            self.expr(value, 0);
                        }
                        None => {
                            self.push("**");
                            self.expr(value, PREC_POSTFIX);
                        }
                    }
                }
                self.push("}");
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.expr(body, PREC_OR);
                self.push(" if ");
                self.expr(test, PREC_OR);
                self.push(" else ");
                self.expr(orelse, PREC_IFEXP);
            }
            ExprKind::Lambda { args, body } => {
                if args.is_empty() {
                    self.push("lambda");
                } else {
                    self.push("lambda ");
                    self.arguments(args);
                }
                self.push(": ");
                self.expr(body, PREC_LAMBDA);
            }
            ExprKind::ListComp { elt, generators } => {
                self.push("[");
                self.expr(elt, PREC_LAMBDA);
                self.generators(generators);
                self.push("]");
            }
            ExprKind::SetComp { elt, generators } => {
                self.push("{");
                self.expr(elt, PREC_LAMBDA);
                self.generators(generators);
                self.push("}");
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                self.push("{");
                self.expr(key, PREC_LAMBDA);
                self.push(": ");
                self.expr(value, PREC_LAMBDA);
                self.generators(generators);
                self.push("}");
            }
            ExprKind::GeneratorExp { elt, generators } => {
                self.push("(");
                self.expr(elt, PREC_LAMBDA);
                self.generators(generators);
                self.push(")");
            }
            ExprKind::Starred { value } => {
                self.push("*");
                self.expr(value, PREC_BITOR);
            }
            ExprKind::Await { value } => {
                self.push("await ");
                self.expr(value, PREC_POSTFIX);
            }
        }
        if parens {
            self.push(")");
        }
    }

    fn comma_separated(&mut self, elts: &[Expr]) {
        for (i, elt) in elts.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(elt, 0);
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) {
        for generator in generators {
            self.push(" for ");
            self.expr(&generator.target, 0);
            self.push(" in ");
            self.expr(&generator.iter, PREC_OR);
            for cond in &generator.ifs {
                self.push(" if ");
                self.expr(cond, PREC_OR);
            }
        }
    }

    fn constant(&mut self, value: &Constant) {
        match value {
            Constant::None => self.push("None"),
            Constant::Bool(true) => self.push("True"),
            Constant::Bool(false) => self.push("False"),
            Constant::Int(digits) => self.push(digits),
            Constant::Float(v) => {
                let text = format_float(*v);
                self.push(&text);
            }
            Constant::Str(s) => {
                let quoted = quote_string(s);
                self.push(&quoted);
            }
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Lambda { .. } => PREC_LAMBDA,
        ExprKind::IfExp { .. } => PREC_IFEXP,
        ExprKind::BoolOp { op, .. } => match op {
            BoolOpKind::Or => PREC_OR,
            BoolOpKind::And => PREC_AND,
        },
        ExprKind::UnaryOp { op, .. } => match op {
            UnaryOp::Not => PREC_NOT,
            _ => PREC_UNARY,
        },
        ExprKind::Compare { .. } => PREC_COMPARE,
        ExprKind::BinOp { op, .. } => match op {
            BinOp::BitOr => PREC_BITOR,
            BinOp::BitXor => PREC_BITXOR,
            BinOp::BitAnd => PREC_BITAND,
            BinOp::LShift | BinOp::RShift => PREC_SHIFT,
            BinOp::Add | BinOp::Sub => PREC_ARITH,
            BinOp::Mult | BinOp::Div | BinOp::FloorDiv | BinOp::Mod | BinOp::MatMult => PREC_TERM,
            BinOp::Pow => PREC_POW,
        },
        ExprKind::Await { .. } => PREC_AWAIT,
        ExprKind::Call { .. } | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => {
            PREC_POSTFIX
        }
        ExprKind::Starred { .. } => PREC_BITOR,
        _ => PREC_ATOM,
    }
}

/// Shortest round-tripping decimal form, always with a decimal point or
/// exponent so the literal re-lexes as a float.
fn format_float(v: f64) -> String {
    let text = format!("{v}");
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Python-repr-style quoting: single quotes unless the value contains a
/// single quote and no double quote.
fn quote_string(s: &str) -> String {
    let use_double = s.contains('\'') && !s.contains('"');
    let quote = if use_double { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::super::grammar::parse_module;
    use super::*;

    fn roundtrip(source: &str) -> String {
        print_module(&parse_module(source).unwrap())
    }

    /// Printing then reparsing then printing again must be a fixed point.
    fn assert_fixed_point(source: &str) {
        let once = roundtrip(source);
        let twice = roundtrip(&once);
        assert_eq!(once, twice, "printer not a fixed point for {source:?}");
    }

    #[test]
    fn test_print_simple_function() {
        let out = roundtrip("def add(a, b):\n    return a + b\n");
        assert_eq!(out, "def add(a, b):\n    return a + b");
    }

    #[test]
    fn test_inline_suite_expands() {
        let out = roundtrip("def noop(): pass\n");
        assert_eq!(out, "def noop():\n    pass");
    }

    #[test]
    fn test_docstring_prints_single_quoted() {
        let out = roundtrip("def f():\n    \"\"\"Doc\"\"\"\n    pass\n");
        assert_eq!(out, "def f():\n    'Doc'\n    pass");
    }

    #[test]
    fn test_elif_chains() {
        let source = "def f(x):\n    if x > 0:\n        return 1\n    elif x < 0:\n        return -1\n    else:\n        return 0\n";
        let out = roundtrip(source);
        assert!(out.contains("    elif x < 0:"));
        assert_fixed_point(source);
    }

    #[test]
    fn test_precedence_parentheses() {
        assert_eq!(
            roundtrip("def f(a, b, c):\n    return (a + b) * c\n"),
            "def f(a, b, c):\n    return (a + b) * c"
        );
        assert_eq!(
            roundtrip("def f(a, b, c):\n    return a + b * c\n"),
            "def f(a, b, c):\n    return a + b * c"
        );
    }

    #[test]
    fn test_power_associativity() {
        assert_eq!(
            roundtrip("def f(x):\n    return -x ** 2\n"),
            "def f(x):\n    return -x ** 2"
        );
        assert_eq!(
            roundtrip("def f(x):\n    return (-x) ** 2\n"),
            "def f(x):\n    return (-x) ** 2"
        );
    }

    #[test]
    fn test_tuple_always_parenthesized() {
        assert_eq!(
            roundtrip("def f(a, b):\n    return a, b\n"),
            "def f(a, b):\n    return (a, b)"
        );
        assert_fixed_point("def f(a, b):\n    return a, b\n");
    }

    #[test]
    fn test_subscript_slices() {
        assert_fixed_point("def f(xs):\n    return xs[1:10:2]\n");
        assert_eq!(
            roundtrip("def f(xs):\n    return xs[1:]\n"),
            "def f(xs):\n    return xs[1:]"
        );
    }

    #[test]
    fn test_string_quoting_rules() {
        assert_eq!(roundtrip("x = 'plain'"), "x = 'plain'");
        assert_eq!(roundtrip("x = \"it's\""), "x = \"it's\"");
        assert_eq!(roundtrip("x = 'a\\nb'"), "x = 'a\\nb'");
    }

    #[test]
    fn test_keyword_arguments_and_star_args() {
        assert_fixed_point("def f():\n    g(1, key=2, *rest, **extra)\n");
    }

    #[test]
    fn test_comprehension_printing() {
        assert_eq!(
            roundtrip("def f(xs):\n    return [x * 2 for x in xs if x > 0]\n"),
            "def f(xs):\n    return [x * 2 for x in xs if x > 0]"
        );
    }

    #[test]
    fn test_lambda_and_defaults() {
        assert_fixed_point("def f(a=1, *args, b=2, **kw):\n    return lambda x: x + a\n");
    }

    #[test]
    fn test_async_function_and_await() {
        let out = roundtrip("async def f(u):\n    r = await get(u)\n    return r\n");
        assert_eq!(out, "async def f(u):\n    r = await get(u)\n    return r");
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(roundtrip("x = 3.14"), "x = 3.14");
        assert_eq!(roundtrip("x = 1e3"), "x = 1000.0");
        assert_eq!(roundtrip("x = 10.0"), "x = 10.0");
    }

    #[test]
    fn test_fixed_point_on_varied_constructs() {
        for source in [
            "def f(x):\n    del x\n",
            "def f():\n    global a, b\n    a = 1\n",
            "def f(d):\n    return {k: v for k, v in d}\n",
            "def f():\n    return {1, 2}\n",
            "def f():\n    return {'a': 1, **extra}\n",
            "def f(x):\n    assert x > 0, 'must be positive'\n",
            "def f(x):\n    raise ValueError('bad') from x\n",
            "def f(xs):\n    return sum((x for x in xs))\n",
            "@decorator\ndef f():\n    pass\n",
        ] {
            assert_fixed_point(source);
        }
    }
}
