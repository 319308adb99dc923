/*!
# Grammar

Recursive-descent parser over the logical token stream. Operator precedence
follows the Python reference grammar; unsupported constructs (`class`,
`yield`, `with`, `try`, `match`, f-strings, wildcard imports, `:=`) are
reported with their source span rather than as generic parse errors.
*/

use super::ast::*;
use super::lexer::{tokenize, RawTok, TokKind, Token};
use crate::core::PoolError;

/// Parse a source module.
pub fn parse_module(source: &str) -> Result<Module, PoolError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, idx: 0 };
    parser.module()
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    fn peek(&self) -> &TokKind {
        &self.tokens[self.idx].kind
    }

    fn peek_raw(&self) -> Option<&RawTok> {
        match self.peek() {
            TokKind::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    fn pos(&self) -> Position {
        self.tokens[self.idx].pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.idx].clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        tok
    }

    fn check(&self, raw: &RawTok) -> bool {
        matches!(self.peek(), TokKind::Raw(r) if r == raw)
    }

    fn eat(&mut self, raw: &RawTok) -> bool {
        if self.check(raw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, raw: &RawTok, what: &str) -> Result<Token, PoolError> {
        if self.check(raw) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: String) -> PoolError {
        let pos = self.pos();
        PoolError::MalformedInput {
            line: pos.line,
            column: pos.column,
            message,
        }
    }

    fn unsupported(&self, construct: &str) -> PoolError {
        let pos = self.pos();
        PoolError::UnsupportedConstruct {
            construct: construct.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, PoolError> {
        match self.peek_raw() {
            Some(RawTok::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    // ---- statements ----

    fn module(&mut self) -> Result<Module, PoolError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokKind::Eof => break,
                TokKind::Raw(RawTok::Newline) => {
                    self.advance();
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(Module { body })
    }

    fn statement(&mut self) -> Result<Vec<Stmt>, PoolError> {
        match self.peek_raw() {
            Some(RawTok::At) => Ok(vec![self.decorated()?]),
            Some(RawTok::Def) => Ok(vec![self.function_def(Vec::new(), false)?]),
            Some(RawTok::Async) => Ok(vec![self.async_statement(Vec::new())?]),
            Some(RawTok::If) => Ok(vec![self.if_statement()?]),
            Some(RawTok::While) => Ok(vec![self.while_statement()?]),
            Some(RawTok::For) => Ok(vec![self.for_statement(false)?]),
            Some(RawTok::Class) => Err(self.unsupported("class definition")),
            Some(RawTok::With) => Err(self.unsupported("with statement")),
            Some(RawTok::Try) => Err(self.unsupported("try statement")),
            Some(RawTok::Ident(name)) if name == "match" && self.is_match_statement() => {
                Err(self.unsupported("match statement"))
            }
            _ => self.simple_statement_line(),
        }
    }

    /// `match` is a soft keyword: the statement form is `match <subject>:`
    /// with a colon at bracket depth zero before the line ends. Ordinary
    /// uses of the name (`match = 5`, `match(x)`) parse as expressions.
    fn is_match_statement(&self) -> bool {
        let mut depth = 0usize;
        for token in &self.tokens[self.idx + 1..] {
            match &token.kind {
                TokKind::Raw(RawTok::LParen | RawTok::LBracket | RawTok::LBrace) => depth += 1,
                TokKind::Raw(RawTok::RParen | RawTok::RBracket | RawTok::RBrace) => {
                    depth = depth.saturating_sub(1)
                }
                TokKind::Raw(RawTok::Colon) if depth == 0 => return true,
                TokKind::Raw(RawTok::Assign) if depth == 0 => return false,
                TokKind::Raw(RawTok::Newline) | TokKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    fn decorated(&mut self) -> Result<Stmt, PoolError> {
        let mut decorators = Vec::new();
        while self.eat(&RawTok::At) {
            decorators.push(self.expression()?);
            self.expect(&RawTok::Newline, "newline after decorator")?;
        }
        match self.peek_raw() {
            Some(RawTok::Def) => self.function_def(decorators, false),
            Some(RawTok::Async) => self.async_statement(decorators),
            Some(RawTok::Class) => Err(self.unsupported("class definition")),
            _ => Err(self.error("expected function definition after decorator".into())),
        }
    }

    fn async_statement(&mut self, decorators: Vec<Expr>) -> Result<Stmt, PoolError> {
        self.expect(&RawTok::Async, "async")?;
        match self.peek_raw() {
            Some(RawTok::Def) => self.function_def(decorators, true),
            Some(RawTok::For) => self.for_statement(true),
            Some(RawTok::With) => Err(self.unsupported("async with statement")),
            _ => Err(self.error("expected 'def' or 'for' after 'async'".into())),
        }
    }

    fn function_def(&mut self, decorators: Vec<Expr>, is_async: bool) -> Result<Stmt, PoolError> {
        let pos = self.pos();
        self.expect(&RawTok::Def, "def")?;
        let name = self.ident("function name")?;
        self.expect(&RawTok::LParen, "'('")?;
        let args = self.parameters(&RawTok::RParen)?;
        self.expect(&RawTok::RParen, "')'")?;
        let returns = if self.eat(&RawTok::Arrow) {
            Some(self.expression()?)
        } else {
            None
        };
        let body = self.suite()?;
        Ok(Stmt {
            kind: StmtKind::FunctionDef(FunctionDef {
                name,
                args,
                body,
                decorators,
                returns,
                is_async,
            }),
            pos,
        })
    }

    /// Parse a parameter list up to (not including) `end`.
    fn parameters(&mut self, end: &RawTok) -> Result<Arguments, PoolError> {
        let mut arguments = Arguments::default();
        let mut seen_star = false;
        let mut seen_default = false;

        while !self.check(end) {
            if self.eat(&RawTok::Slash) {
                // Everything collected so far was positional-only.
                arguments.posonly = std::mem::take(&mut arguments.args);
            } else if self.eat(&RawTok::DoubleStar) {
                arguments.kwarg = Some(self.parameter(end)?.0);
            } else if self.eat(&RawTok::Star) {
                seen_star = true;
                if !self.check(&RawTok::Comma) && !self.check(end) {
                    arguments.vararg = Some(self.parameter(end)?.0);
                }
            } else {
                let (param, default) = self.parameter(end)?;
                if seen_star {
                    arguments.kwonly.push(param);
                    arguments.kw_defaults.push(default);
                } else {
                    if default.is_some() {
                        seen_default = true;
                    } else if seen_default {
                        return Err(
                            self.error("parameter without default follows default".into())
                        );
                    }
                    if let Some(default) = default {
                        arguments.defaults.push(default);
                    }
                    arguments.args.push(param);
                }
            }
            if !self.eat(&RawTok::Comma) {
                break;
            }
        }
        Ok(arguments)
    }

    fn parameter(&mut self, end: &RawTok) -> Result<(Param, Option<Expr>), PoolError> {
        let pos = self.pos();
        let name = self.ident("parameter name")?;
        // Lambda parameter lists (end == ':') carry no annotations.
        let annotation = if end != &RawTok::Colon && self.eat(&RawTok::Colon) {
            Some(self.expression()?)
        } else {
            None
        };
        let default = if self.eat(&RawTok::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok((
            Param {
                name,
                annotation,
                pos,
            },
            default,
        ))
    }

    fn suite(&mut self) -> Result<Vec<Stmt>, PoolError> {
        self.expect(&RawTok::Colon, "':'")?;
        if self.eat(&RawTok::Newline) {
            if !matches!(self.peek(), TokKind::Indent) {
                return Err(self.error("expected an indented block".into()));
            }
            self.advance();
            let mut body = Vec::new();
            loop {
                match self.peek() {
                    TokKind::Dedent => {
                        self.advance();
                        break;
                    }
                    TokKind::Eof => break,
                    TokKind::Raw(RawTok::Newline) => {
                        self.advance();
                    }
                    _ => body.extend(self.statement()?),
                }
            }
            Ok(body)
        } else {
            // Inline suite: simple statements on the header line.
            self.simple_statement_line()
        }
    }

    fn simple_statement_line(&mut self) -> Result<Vec<Stmt>, PoolError> {
        let mut stmts = vec![self.simple_statement()?];
        while self.eat(&RawTok::Semicolon) {
            if self.check(&RawTok::Newline) || matches!(self.peek(), TokKind::Eof) {
                break;
            }
            stmts.push(self.simple_statement()?);
        }
        if !self.eat(&RawTok::Newline) && !matches!(self.peek(), TokKind::Eof) {
            return Err(self.error("expected end of statement".into()));
        }
        Ok(stmts)
    }

    fn simple_statement(&mut self) -> Result<Stmt, PoolError> {
        let pos = self.pos();
        let kind = match self.peek_raw() {
            Some(RawTok::Return) => {
                self.advance();
                let value = if self.ends_line() {
                    None
                } else {
                    Some(self.expression_list()?)
                };
                StmtKind::Return { value }
            }
            Some(RawTok::Pass) => {
                self.advance();
                StmtKind::Pass
            }
            Some(RawTok::Break) => {
                self.advance();
                StmtKind::Break
            }
            Some(RawTok::Continue) => {
                self.advance();
                StmtKind::Continue
            }
            Some(RawTok::Global) => {
                self.advance();
                StmtKind::Global {
                    names: self.name_list()?,
                }
            }
            Some(RawTok::Nonlocal) => {
                self.advance();
                StmtKind::Nonlocal {
                    names: self.name_list()?,
                }
            }
            Some(RawTok::Del) => {
                self.advance();
                let mut targets = vec![self.expression()?];
                while self.eat(&RawTok::Comma) {
                    targets.push(self.expression()?);
                }
                StmtKind::Delete { targets }
            }
            Some(RawTok::Raise) => {
                self.advance();
                if self.ends_line() {
                    StmtKind::Raise {
                        exc: None,
                        cause: None,
                    }
                } else {
                    let exc = self.expression()?;
                    let cause = if self.eat(&RawTok::From) {
                        Some(self.expression()?)
                    } else {
                        None
                    };
                    StmtKind::Raise {
                        exc: Some(exc),
                        cause,
                    }
                }
            }
            Some(RawTok::Assert) => {
                self.advance();
                let test = self.expression()?;
                let msg = if self.eat(&RawTok::Comma) {
                    Some(self.expression()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            Some(RawTok::Import) => {
                self.advance();
                StmtKind::Import {
                    names: self.import_aliases(false)?,
                }
            }
            Some(RawTok::From) => {
                self.advance();
                let module = self.dotted_name()?;
                self.expect(&RawTok::Import, "'import'")?;
                if self.check(&RawTok::Star) {
                    return Err(self.unsupported("wildcard import"));
                }
                let names = if self.eat(&RawTok::LParen) {
                    let names = self.import_aliases(true)?;
                    self.expect(&RawTok::RParen, "')'")?;
                    names
                } else {
                    self.import_aliases(true)?
                };
                StmtKind::ImportFrom { module, names }
            }
            Some(RawTok::Yield) => return Err(self.unsupported("yield expression")),
            _ => return self.expression_statement(),
        };
        Ok(Stmt { kind, pos })
    }

    fn ends_line(&self) -> bool {
        self.check(&RawTok::Newline)
            || self.check(&RawTok::Semicolon)
            || matches!(self.peek(), TokKind::Eof)
    }

    fn name_list(&mut self) -> Result<Vec<String>, PoolError> {
        let mut names = vec![self.ident("name")?];
        while self.eat(&RawTok::Comma) {
            names.push(self.ident("name")?);
        }
        Ok(names)
    }

    fn dotted_name(&mut self) -> Result<String, PoolError> {
        let mut name = self.ident("module name")?;
        while self.eat(&RawTok::Dot) {
            name.push('.');
            name.push_str(&self.ident("module name")?);
        }
        Ok(name)
    }

    fn import_aliases(&mut self, from_import: bool) -> Result<Vec<ImportAlias>, PoolError> {
        let mut aliases = Vec::new();
        loop {
            let name = if from_import {
                self.ident("imported name")?
            } else {
                self.dotted_name()?
            };
            let asname = if self.eat(&RawTok::As) {
                Some(self.ident("import alias")?)
            } else {
                None
            };
            aliases.push(ImportAlias { name, asname });
            if !self.eat(&RawTok::Comma) {
                break;
            }
        }
        Ok(aliases)
    }

    fn expression_statement(&mut self) -> Result<Stmt, PoolError> {
        let pos = self.pos();
        let first = self.expression_list()?;

        if let Some(op) = self.aug_assign_op() {
            self.advance();
            let value = self.expression_list()?;
            return Ok(Stmt {
                kind: StmtKind::AugAssign {
                    target: first,
                    op,
                    value,
                },
                pos,
            });
        }

        if self.check(&RawTok::Assign) {
            let mut targets = vec![first];
            let mut value = None;
            while self.eat(&RawTok::Assign) {
                let next = self.expression_list()?;
                if self.check(&RawTok::Assign) {
                    targets.push(next);
                } else {
                    value = Some(next);
                }
            }
            let value = value.ok_or_else(|| self.error("expected assignment value".into()))?;
            return Ok(Stmt {
                kind: StmtKind::Assign { targets, value },
                pos,
            });
        }

        Ok(Stmt {
            kind: StmtKind::Expr { value: first },
            pos,
        })
    }

    fn aug_assign_op(&self) -> Option<BinOp> {
        match self.peek_raw()? {
            RawTok::PlusAssign => Some(BinOp::Add),
            RawTok::MinusAssign => Some(BinOp::Sub),
            RawTok::StarAssign => Some(BinOp::Mult),
            RawTok::SlashAssign => Some(BinOp::Div),
            RawTok::DoubleSlashAssign => Some(BinOp::FloorDiv),
            RawTok::PercentAssign => Some(BinOp::Mod),
            RawTok::DoubleStarAssign => Some(BinOp::Pow),
            RawTok::AtAssign => Some(BinOp::MatMult),
            RawTok::AmpAssign => Some(BinOp::BitAnd),
            RawTok::PipeAssign => Some(BinOp::BitOr),
            RawTok::CaretAssign => Some(BinOp::BitXor),
            RawTok::LShiftAssign => Some(BinOp::LShift),
            RawTok::RShiftAssign => Some(BinOp::RShift),
            _ => None,
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, PoolError> {
        let pos = self.pos();
        self.advance(); // if / elif
        let test = self.expression()?;
        let body = self.suite()?;
        let orelse = match self.peek_raw() {
            Some(RawTok::Elif) => vec![self.if_statement()?],
            Some(RawTok::Else) => {
                self.advance();
                self.suite()?
            }
            _ => Vec::new(),
        };
        Ok(Stmt {
            kind: StmtKind::If { test, body, orelse },
            pos,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, PoolError> {
        let pos = self.pos();
        self.expect(&RawTok::While, "while")?;
        let test = self.expression()?;
        let body = self.suite()?;
        let orelse = if self.eat(&RawTok::Else) {
            self.suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            kind: StmtKind::While { test, body, orelse },
            pos,
        })
    }

    fn for_statement(&mut self, is_async: bool) -> Result<Stmt, PoolError> {
        if is_async {
            return Err(self.unsupported("async for statement"));
        }
        let pos = self.pos();
        self.expect(&RawTok::For, "for")?;
        let target = self.target_list()?;
        self.expect(&RawTok::In, "'in'")?;
        let iter = self.expression_list()?;
        let body = self.suite()?;
        let orelse = if self.eat(&RawTok::Else) {
            self.suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            kind: StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            pos,
        })
    }

    /// Comma-separated targets (`for` and assignment left-hand sides).
    fn target_list(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let first = self.target()?;
        if !self.check(&RawTok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&RawTok::Comma) {
            if self.check(&RawTok::In) || self.ends_line() {
                break;
            }
            elts.push(self.target()?);
        }
        Ok(Expr::new(ExprKind::Tuple { elts }, pos))
    }

    fn target(&mut self) -> Result<Expr, PoolError> {
        if self.check(&RawTok::Star) {
            let pos = self.pos();
            self.advance();
            let value = self.target()?;
            return Ok(Expr::new(
                ExprKind::Starred {
                    value: Box::new(value),
                },
                pos,
            ));
        }
        self.unary_postfix()
    }

    // ---- expressions ----

    /// A possibly-parenthesis-free tuple, e.g. `a, b = …` or `return x, y`.
    /// Elements may be starred (`a, *rest = …`).
    fn expression_list(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let first = self.star_or_expression()?;
        if !self.check(&RawTok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&RawTok::Comma) {
            if self.expression_starts() {
                elts.push(self.star_or_expression()?);
            } else {
                break;
            }
        }
        Ok(Expr::new(ExprKind::Tuple { elts }, pos))
    }

    fn expression_starts(&self) -> bool {
        match self.peek() {
            TokKind::Raw(raw) => !matches!(
                raw,
                RawTok::Newline
                    | RawTok::Semicolon
                    | RawTok::RParen
                    | RawTok::RBracket
                    | RawTok::RBrace
                    | RawTok::Colon
                    | RawTok::Assign
                    | RawTok::In
                    | RawTok::For
                    | RawTok::Comma
            ),
            _ => false,
        }
    }

    fn expression(&mut self) -> Result<Expr, PoolError> {
        if self.check(&RawTok::Lambda) {
            return self.lambda();
        }
        let pos = self.pos();
        let body = self.or_test()?;
        if self.check(&RawTok::Walrus) {
            return Err(self.unsupported("assignment expression"));
        }
        if self.eat(&RawTok::If) {
            let test = self.or_test()?;
            self.expect(&RawTok::Else, "'else'")?;
            let orelse = self.expression()?;
            return Ok(Expr::new(
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
                pos,
            ));
        }
        Ok(body)
    }

    fn lambda(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        self.expect(&RawTok::Lambda, "lambda")?;
        let args = self.parameters(&RawTok::Colon)?;
        self.expect(&RawTok::Colon, "':'")?;
        let body = self.expression()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                args: Box::new(args),
                body: Box::new(body),
            },
            pos,
        ))
    }

    fn or_test(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let first = self.and_test()?;
        if !self.check(&RawTok::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&RawTok::Or) {
            values.push(self.and_test()?);
        }
        Ok(Expr::new(
            ExprKind::BoolOp {
                op: BoolOpKind::Or,
                values,
            },
            pos,
        ))
    }

    fn and_test(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let first = self.not_test()?;
        if !self.check(&RawTok::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&RawTok::And) {
            values.push(self.not_test()?);
        }
        Ok(Expr::new(
            ExprKind::BoolOp {
                op: BoolOpKind::And,
                values,
            },
            pos,
        ))
    }

    fn not_test(&mut self) -> Result<Expr, PoolError> {
        if self.check(&RawTok::Not) {
            let pos = self.pos();
            self.advance();
            let operand = self.not_test()?;
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                pos,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let left = self.bit_or()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek_raw() {
                Some(RawTok::EqEq) => CmpOp::Eq,
                Some(RawTok::NotEq) => CmpOp::NotEq,
                Some(RawTok::Lt) => CmpOp::Lt,
                Some(RawTok::LtE) => CmpOp::LtE,
                Some(RawTok::Gt) => CmpOp::Gt,
                Some(RawTok::GtE) => CmpOp::GtE,
                Some(RawTok::In) => CmpOp::In,
                Some(RawTok::Is) => {
                    self.advance();
                    let op = if self.eat(&RawTok::Not) {
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    };
                    ops.push(op);
                    comparators.push(self.bit_or()?);
                    continue;
                }
                Some(RawTok::Not) => {
                    self.advance();
                    self.expect(&RawTok::In, "'in' after 'not'")?;
                    ops.push(CmpOp::NotIn);
                    comparators.push(self.bit_or()?);
                    continue;
                }
                _ => break,
            };
            self.advance();
            ops.push(op);
            comparators.push(self.bit_or()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            pos,
        ))
    }

    fn bit_or(&mut self) -> Result<Expr, PoolError> {
        let mut left = self.bit_xor()?;
        while self.check(&RawTok::Pipe) {
            let pos = left.pos;
            self.advance();
            let right = self.bit_xor()?;
            left = binop(left, BinOp::BitOr, right, pos);
        }
        Ok(left)
    }

    fn bit_xor(&mut self) -> Result<Expr, PoolError> {
        let mut left = self.bit_and()?;
        while self.check(&RawTok::Caret) {
            let pos = left.pos;
            self.advance();
            let right = self.bit_and()?;
            left = binop(left, BinOp::BitXor, right, pos);
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> Result<Expr, PoolError> {
        let mut left = self.shift()?;
        while self.check(&RawTok::Amp) {
            let pos = left.pos;
            self.advance();
            let right = self.shift()?;
            left = binop(left, BinOp::BitAnd, right, pos);
        }
        Ok(left)
    }

    fn shift(&mut self) -> Result<Expr, PoolError> {
        let mut left = self.arith()?;
        loop {
            let op = match self.peek_raw() {
                Some(RawTok::LShift) => BinOp::LShift,
                Some(RawTok::RShift) => BinOp::RShift,
                _ => break,
            };
            let pos = left.pos;
            self.advance();
            let right = self.arith()?;
            left = binop(left, op, right, pos);
        }
        Ok(left)
    }

    fn arith(&mut self) -> Result<Expr, PoolError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek_raw() {
                Some(RawTok::Plus) => BinOp::Add,
                Some(RawTok::Minus) => BinOp::Sub,
                _ => break,
            };
            let pos = left.pos;
            self.advance();
            let right = self.term()?;
            left = binop(left, op, right, pos);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, PoolError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek_raw() {
                Some(RawTok::Star) => BinOp::Mult,
                Some(RawTok::Slash) => BinOp::Div,
                Some(RawTok::DoubleSlash) => BinOp::FloorDiv,
                Some(RawTok::Percent) => BinOp::Mod,
                Some(RawTok::At) => BinOp::MatMult,
                _ => break,
            };
            let pos = left.pos;
            self.advance();
            let right = self.factor()?;
            left = binop(left, op, right, pos);
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let op = match self.peek_raw() {
            Some(RawTok::Minus) => Some(UnaryOp::USub),
            Some(RawTok::Plus) => Some(UnaryOp::UAdd),
            Some(RawTok::Tilde) => Some(UnaryOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.factor()?;
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
                pos,
            ));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, PoolError> {
        let left = self.unary_postfix()?;
        if self.check(&RawTok::DoubleStar) {
            let pos = left.pos;
            self.advance();
            // Right-associative; the exponent may itself carry a unary sign.
            let right = self.factor()?;
            return Ok(binop(left, BinOp::Pow, right, pos));
        }
        Ok(left)
    }

    fn unary_postfix(&mut self) -> Result<Expr, PoolError> {
        if self.check(&RawTok::Await) {
            let pos = self.pos();
            self.advance();
            let value = self.unary_postfix()?;
            return Ok(Expr::new(
                ExprKind::Await {
                    value: Box::new(value),
                },
                pos,
            ));
        }
        let mut expr = self.atom()?;
        loop {
            match self.peek_raw() {
                Some(RawTok::Dot) => {
                    let pos = expr.pos;
                    self.advance();
                    let attr = self.ident("attribute name")?;
                    expr = Expr::new(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                        pos,
                    );
                }
                Some(RawTok::LParen) => {
                    let pos = expr.pos;
                    self.advance();
                    let (args, keywords) = self.call_arguments()?;
                    self.expect(&RawTok::RParen, "')'")?;
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            keywords,
                        },
                        pos,
                    );
                }
                Some(RawTok::LBracket) => {
                    let pos = expr.pos;
                    self.advance();
                    let index = self.subscript()?;
                    self.expect(&RawTok::RBracket, "']'")?;
                    expr = Expr::new(
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        pos,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), PoolError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.check(&RawTok::RParen) {
            if self.eat(&RawTok::DoubleStar) {
                let value = self.expression()?;
                keywords.push(Keyword { arg: None, value });
            } else if self.check(&RawTok::Star) {
                let pos = self.pos();
                self.advance();
                let value = self.expression()?;
                args.push(Expr::new(
                    ExprKind::Starred {
                        value: Box::new(value),
                    },
                    pos,
                ));
            } else if self.is_keyword_argument() {
                let arg = self.ident("keyword argument name")?;
                self.expect(&RawTok::Assign, "'='")?;
                let value = self.expression()?;
                keywords.push(Keyword {
                    arg: Some(arg),
                    value,
                });
            } else {
                let value = self.expression()?;
                if self.check(&RawTok::For) && args.is_empty() && keywords.is_empty() {
                    // Bare generator expression as the sole argument.
                    let generators = self.comprehension_clauses()?;
                    let pos = value.pos;
                    args.push(Expr::new(
                        ExprKind::GeneratorExp {
                            elt: Box::new(value),
                            generators,
                        },
                        pos,
                    ));
                    break;
                }
                args.push(value);
            }
            if !self.eat(&RawTok::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn is_keyword_argument(&self) -> bool {
        if !matches!(self.peek_raw(), Some(RawTok::Ident(_))) {
            return false;
        }
        matches!(
            self.tokens.get(self.idx + 1).map(|t| &t.kind),
            Some(TokKind::Raw(RawTok::Assign))
        )
    }

    fn subscript(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let first = self.slice_item()?;
        if !self.check(&RawTok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&RawTok::Comma) {
            if self.check(&RawTok::RBracket) {
                break;
            }
            elts.push(self.slice_item()?);
        }
        Ok(Expr::new(ExprKind::Tuple { elts }, pos))
    }

    fn slice_item(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let lower = if self.check(&RawTok::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        if !self.eat(&RawTok::Colon) {
            return lower
                .map(|b| *b)
                .ok_or_else(|| self.error("expected subscript expression".into()));
        }
        let upper = if self.check(&RawTok::Colon)
            || self.check(&RawTok::RBracket)
            || self.check(&RawTok::Comma)
        {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        let step = if self.eat(&RawTok::Colon) {
            if self.check(&RawTok::RBracket) || self.check(&RawTok::Comma) {
                None
            } else {
                Some(Box::new(self.expression()?))
            }
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Slice { lower, upper, step }, pos))
    }

    fn comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, PoolError> {
        let mut generators = Vec::new();
        while self.check(&RawTok::For) {
            self.advance();
            let target = self.target_list_for_comprehension()?;
            self.expect(&RawTok::In, "'in'")?;
            let iter = self.or_test()?;
            let mut ifs = Vec::new();
            while self.eat(&RawTok::If) {
                ifs.push(self.or_test()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async: false,
            });
        }
        Ok(generators)
    }

    fn target_list_for_comprehension(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        let first = self.target()?;
        if !self.check(&RawTok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&RawTok::Comma) {
            if self.check(&RawTok::In) {
                break;
            }
            elts.push(self.target()?);
        }
        Ok(Expr::new(ExprKind::Tuple { elts }, pos))
    }

    fn atom(&mut self) -> Result<Expr, PoolError> {
        let pos = self.pos();
        match self.peek_raw().cloned() {
            Some(RawTok::Ident(name)) => {
                self.advance();
                Ok(Expr::name(name, pos))
            }
            Some(RawTok::Int(v)) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Constant {
                        value: Constant::Int(v),
                    },
                    pos,
                ))
            }
            Some(RawTok::Float(v)) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Constant {
                        value: Constant::Float(v),
                    },
                    pos,
                ))
            }
            Some(RawTok::Str(s)) => {
                self.advance();
                let mut value = s;
                // Adjacent string literals concatenate.
                while let Some(RawTok::Str(next)) = self.peek_raw() {
                    value.push_str(next);
                    self.advance();
                }
                Ok(Expr::new(
                    ExprKind::Constant {
                        value: Constant::Str(value),
                    },
                    pos,
                ))
            }
            Some(RawTok::NoneLit) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Constant {
                        value: Constant::None,
                    },
                    pos,
                ))
            }
            Some(RawTok::TrueLit) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Constant {
                        value: Constant::Bool(true),
                    },
                    pos,
                ))
            }
            Some(RawTok::FalseLit) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Constant {
                        value: Constant::Bool(false),
                    },
                    pos,
                ))
            }
            Some(RawTok::Lambda) => self.lambda(),
            Some(RawTok::LParen) => {
                self.advance();
                if self.eat(&RawTok::RParen) {
                    return Ok(Expr::new(ExprKind::Tuple { elts: Vec::new() }, pos));
                }
                let first = self.star_or_expression()?;
                if self.check(&RawTok::For) {
                    let generators = self.comprehension_clauses()?;
                    self.expect(&RawTok::RParen, "')'")?;
                    return Ok(Expr::new(
                        ExprKind::GeneratorExp {
                            elt: Box::new(first),
                            generators,
                        },
                        pos,
                    ));
                }
                if self.check(&RawTok::Comma) {
                    let mut elts = vec![first];
                    while self.eat(&RawTok::Comma) {
                        if self.check(&RawTok::RParen) {
                            break;
                        }
                        elts.push(self.star_or_expression()?);
                    }
                    self.expect(&RawTok::RParen, "')'")?;
                    return Ok(Expr::new(ExprKind::Tuple { elts }, pos));
                }
                self.expect(&RawTok::RParen, "')'")?;
                Ok(first)
            }
            Some(RawTok::LBracket) => {
                self.advance();
                if self.eat(&RawTok::RBracket) {
                    return Ok(Expr::new(ExprKind::List { elts: Vec::new() }, pos));
                }
                let first = self.star_or_expression()?;
                if self.check(&RawTok::For) {
                    let generators = self.comprehension_clauses()?;
                    self.expect(&RawTok::RBracket, "']'")?;
                    return Ok(Expr::new(
                        ExprKind::ListComp {
                            elt: Box::new(first),
                            generators,
                        },
                        pos,
                    ));
                }
                let mut elts = vec![first];
                while self.eat(&RawTok::Comma) {
                    if self.check(&RawTok::RBracket) {
                        break;
                    }
                    elts.push(self.star_or_expression()?);
                }
                self.expect(&RawTok::RBracket, "']'")?;
                Ok(Expr::new(ExprKind::List { elts }, pos))
            }
            Some(RawTok::LBrace) => {
                self.advance();
                self.brace_display(pos)
            }
            Some(RawTok::Yield) => Err(self.unsupported("yield expression")),
            Some(RawTok::Walrus) => Err(self.unsupported("assignment expression")),
            _ => Err(self.error("expected an expression".into())),
        }
    }

    fn star_or_expression(&mut self) -> Result<Expr, PoolError> {
        if self.check(&RawTok::Star) {
            let pos = self.pos();
            self.advance();
            let value = self.expression()?;
            return Ok(Expr::new(
                ExprKind::Starred {
                    value: Box::new(value),
                },
                pos,
            ));
        }
        self.expression()
    }

    fn brace_display(&mut self, pos: Position) -> Result<Expr, PoolError> {
        if self.eat(&RawTok::RBrace) {
            return Ok(Expr::new(
                ExprKind::Dict {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                pos,
            ));
        }

        if self.eat(&RawTok::DoubleStar) {
            let mut keys = vec![None];
            let mut values = vec![self.expression()?];
            while self.eat(&RawTok::Comma) {
                if self.check(&RawTok::RBrace) {
                    break;
                }
                if self.eat(&RawTok::DoubleStar) {
                    keys.push(None);
                    values.push(self.expression()?);
                } else {
                    let key = self.expression()?;
                    self.expect(&RawTok::Colon, "':'")?;
                    keys.push(Some(key));
                    values.push(self.expression()?);
                }
            }
            self.expect(&RawTok::RBrace, "'}'")?;
            return Ok(Expr::new(ExprKind::Dict { keys, values }, pos));
        }

        let first = self.expression()?;
        if self.eat(&RawTok::Colon) {
            let first_value = self.expression()?;
            if self.check(&RawTok::For) {
                let generators = self.comprehension_clauses()?;
                self.expect(&RawTok::RBrace, "'}'")?;
                return Ok(Expr::new(
                    ExprKind::DictComp {
                        key: Box::new(first),
                        value: Box::new(first_value),
                        generators,
                    },
                    pos,
                ));
            }
            let mut keys = vec![Some(first)];
            let mut values = vec![first_value];
            while self.eat(&RawTok::Comma) {
                if self.check(&RawTok::RBrace) {
                    break;
                }
                if self.eat(&RawTok::DoubleStar) {
                    keys.push(None);
                    values.push(self.expression()?);
                } else {
                    let key = self.expression()?;
                    self.expect(&RawTok::Colon, "':'")?;
                    keys.push(Some(key));
                    values.push(self.expression()?);
                }
            }
            self.expect(&RawTok::RBrace, "'}'")?;
            return Ok(Expr::new(ExprKind::Dict { keys, values }, pos));
        }

        if self.check(&RawTok::For) {
            let generators = self.comprehension_clauses()?;
            self.expect(&RawTok::RBrace, "'}'")?;
            return Ok(Expr::new(
                ExprKind::SetComp {
                    elt: Box::new(first),
                    generators,
                },
                pos,
            ));
        }

        let mut elts = vec![first];
        while self.eat(&RawTok::Comma) {
            if self.check(&RawTok::RBrace) {
                break;
            }
            elts.push(self.star_or_expression()?);
        }
        self.expect(&RawTok::RBrace, "'}'")?;
        Ok(Expr::new(ExprKind::Set { elts }, pos))
    }
}

fn binop(left: Expr, op: BinOp, right: Expr, pos: Position) -> Expr {
    Expr::new(
        ExprKind::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        pos,
    )
}
