//! A recursive-descent parser over the token stream.

use crate::ast::{BinOp, Expr, FuncDecl, Program, Stmt};
use crate::error::{Result, SyntaxError};
use crate::lex::{self, Literal, Token, TokenKind};

impl Program {
    /// Tokenize and parse a (preprocessed) source string.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = lex::tokenize(source)?;
        Parser::new(&tokens).parse_program()
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        debug_assert!(matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)));
        Self { tokens, pos: 0 }
    }

    /// The current token; the trailing EOF token once the stream is spent.
    fn peek(&self) -> &'a Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &'static str) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &'static str) -> SyntaxError {
        let token = self.peek();
        SyntaxError::Expected {
            what,
            found: token.kind.to_string(),
            line: token.line,
            col: token.col,
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// A literal in data position, where the digit string becomes bits.
    /// The data grammar has no sign; `-` is only meaningful in index and
    /// slice payloads.
    fn expect_literal(&mut self) -> Result<&'a Literal> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Literal(literal) => {
                if matches!(literal, Literal::Bits(digits) if digits.starts_with('-')) {
                    return Err(SyntaxError::Expected {
                        what: "an unsigned data literal",
                        found: token.kind.to_string(),
                        line: token.line,
                        col: token.col,
                    });
                }
                self.pos += 1;
                Ok(literal)
            }
            _ => Err(self.unexpected("a numeric literal")),
        }
    }

    fn parse_program(&mut self) -> Result<Program> {
        let mut functions = Vec::new();
        while !self.at(&TokenKind::Eof) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            self.expect(&TokenKind::Function, "`function`")?;
            functions.push(self.parse_func()?);
        }
        Ok(Program { functions })
    }

    fn parse_func(&mut self) -> Result<FuncDecl> {
        let name = self.expect_ident()?;
        let arg_bits = if self.eat(&TokenKind::Colon) {
            Some(self.expect_width()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(FuncDecl {
            name,
            arg_bits,
            body,
        })
    }

    fn expect_width(&mut self) -> Result<u32> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Literal(Literal::Bits(digits)) => {
                let width = digits.parse().map_err(|_| SyntaxError::Expected {
                    what: "a decimal bit-count",
                    found: token.kind.to_string(),
                    line: token.line,
                    col: token.col,
                })?;
                self.pos += 1;
                Ok(width)
            }
            _ => Err(self.unexpected("a decimal bit-count")),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&TokenKind::OpenBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::CloseBrace) && !self.at(&TokenKind::Eof) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::CloseBrace, "`}`")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        if self.eat(&TokenKind::Return) {
            let value = self.parse_primitive()?;
            self.expect(&TokenKind::Semicolon, "`;`")?;
            return Ok(Stmt::Return(value));
        }

        if matches!(self.peek().kind, TokenKind::Ident(_)) {
            return self.parse_assign();
        }

        Err(self.unexpected("a statement"))
    }

    fn parse_assign(&mut self) -> Result<Stmt> {
        let ident = Expr::Var(self.expect_ident()?);
        let target = self.parse_postfix(ident)?;
        self.expect(&TokenKind::Assign, "`=`")?;
        let value = self.parse_rhs()?;
        self.expect(&TokenKind::Semicolon, "`;`")?;
        Ok(Stmt::Assign { target, value })
    }

    /// The right-hand side of an assignment: the only position where
    /// negation, concatenation, binary operators and calls may appear.
    fn parse_rhs(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Tilde) {
            let sub = self.parse_primitive()?;
            return Ok(Expr::Not(Box::new(sub)));
        }

        let lhs = match &self.peek().kind {
            TokenKind::Ident(_) => {
                let ident = Expr::Var(self.expect_ident()?);
                if self.at(&TokenKind::OpenParen) {
                    return self.parse_call(ident);
                }
                self.parse_postfix(ident)?
            }
            TokenKind::Literal(_) => Expr::Literal(self.expect_literal()?.clone()),
            _ => return Err(self.unexpected("an expression")),
        };

        if self.at(&TokenKind::Semicolon) {
            return Ok(lhs);
        }

        if self.at(&TokenKind::Concat) {
            let mut operands = vec![lhs];
            while self.eat(&TokenKind::Concat) {
                operands.push(self.parse_primitive()?);
            }
            return Ok(Expr::Concat(operands));
        }

        let op = self.parse_binop()?;
        let rhs = self.parse_primitive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_binop(&mut self) -> Result<BinOp> {
        let op = match &self.peek().kind {
            TokenKind::Pipe => BinOp::Or,
            TokenKind::Amp => BinOp::And,
            TokenKind::Caret => BinOp::Xor,
            TokenKind::Eq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::AndAnd => BinOp::LogicalAnd,
            TokenKind::PipePipe => BinOp::LogicalOr,
            TokenKind::Shl => BinOp::Shl,
            TokenKind::Shr => BinOp::Shr,
            TokenKind::Rotl => BinOp::Rotl,
            TokenKind::Rotr => BinOp::Rotr,
            _ => return Err(self.unexpected("a binary operator")),
        };
        self.pos += 1;
        Ok(op)
    }

    /// A primitive: a variable (optionally indexed or sliced) or a literal.
    fn parse_primitive(&mut self) -> Result<Expr> {
        match &self.peek().kind {
            TokenKind::Ident(_) => {
                let ident = Expr::Var(self.expect_ident()?);
                if self.at(&TokenKind::OpenParen) {
                    let token = self.peek();
                    return Err(SyntaxError::CallInPrimitive {
                        line: token.line,
                        col: token.col,
                    });
                }
                self.parse_postfix(ident)
            }
            TokenKind::Literal(_) => Ok(Expr::Literal(self.expect_literal()?.clone())),
            _ => Err(self.unexpected("a primitive expression")),
        }
    }

    /// An optional `[index]` or `[start:end]` suffix after an identifier.
    fn parse_postfix(&mut self, ident: Expr) -> Result<Expr> {
        if !self.eat(&TokenKind::OpenBracket) {
            return Ok(ident);
        }

        let start = if self.at(&TokenKind::Colon) || self.at(&TokenKind::CloseBracket) {
            None
        } else {
            Some(self.expect_index()?)
        };

        if self.eat(&TokenKind::Colon) {
            let end = if self.at(&TokenKind::CloseBracket) {
                None
            } else {
                Some(self.expect_index()?)
            };
            self.expect(&TokenKind::CloseBracket, "`]`")?;
            return Ok(Expr::Slice {
                container: Box::new(ident),
                start,
                end,
            });
        }

        match start {
            Some(index) => {
                self.expect(&TokenKind::CloseBracket, "`]`")?;
                Ok(Expr::Index {
                    container: Box::new(ident),
                    index,
                })
            }
            None => Err(self.unexpected("an index or slice")),
        }
    }

    fn expect_index(&mut self) -> Result<i64> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Literal(literal) => {
                let value = literal.as_int().ok_or(SyntaxError::Expected {
                    what: "an index",
                    found: token.kind.to_string(),
                    line: token.line,
                    col: token.col,
                })?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.unexpected("an index")),
        }
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr> {
        self.expect(&TokenKind::OpenParen, "`(`")?;
        let arg = self.parse_primitive()?;
        self.expect(&TokenKind::CloseParen, "`)`")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            arg: Box::new(arg),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Program {
        Program::parse(input).unwrap()
    }

    fn body(input: &str) -> Vec<Stmt> {
        parse_ok(input).functions.remove(0).body
    }

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    #[test]
    fn function_header() {
        let program = parse_ok("function main:8 { return main; }");
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
        assert_eq!(program.functions[0].arg_bits, Some(8));
    }

    #[test]
    fn function_without_width() {
        let program = parse_ok("function helper { return helper; }");
        assert_eq!(program.functions[0].arg_bits, None);
    }

    #[test]
    fn assignment_and_return() {
        let stmts = body("function f { a = f; return a; }");
        assert_eq!(
            stmts,
            vec![
                Stmt::Assign {
                    target: var("a"),
                    value: var("f"),
                },
                Stmt::Return(var("a")),
            ]
        );
    }

    #[test]
    fn index_forms() {
        let stmts = body("function f { a = f[2]; b = f[-1]; }");
        assert_eq!(
            stmts[0],
            Stmt::Assign {
                target: var("a"),
                value: Expr::Index {
                    container: Box::new(var("f")),
                    index: 2,
                },
            }
        );
        assert_eq!(
            stmts[1],
            Stmt::Assign {
                target: var("b"),
                value: Expr::Index {
                    container: Box::new(var("f")),
                    index: -1,
                },
            }
        );
    }

    #[test]
    fn slice_forms() {
        let stmts = body("function f { a = f[:]; b = f[2:]; c = f[:3]; d = f[-1:]; }");
        let slice = |start, end| Expr::Slice {
            container: Box::new(var("f")),
            start,
            end,
        };
        assert_eq!(
            stmts,
            vec![
                Stmt::Assign { target: var("a"), value: slice(None, None) },
                Stmt::Assign { target: var("b"), value: slice(Some(2), None) },
                Stmt::Assign { target: var("c"), value: slice(None, Some(3)) },
                Stmt::Assign { target: var("d"), value: slice(Some(-1), None) },
            ]
        );
    }

    #[test]
    fn slice_assignment_target() {
        let stmts = body("function f { f[0:2] = f; }");
        assert_eq!(
            stmts[0],
            Stmt::Assign {
                target: Expr::Slice {
                    container: Box::new(var("f")),
                    start: Some(0),
                    end: Some(2),
                },
                value: var("f"),
            }
        );
    }

    #[test]
    fn concat_chain() {
        let stmts = body("function f { a = f :: 0x1 :: f[0]; }");
        let Stmt::Assign { value: Expr::Concat(operands), .. } = &stmts[0] else {
            panic!("expected a concat");
        };
        assert_eq!(operands.len(), 3);
    }

    #[test]
    fn binary_operators_parse() {
        for op in ["|", "&", "^", "==", "!=", "&&", "||", "<<", ">>", "<<<", ">>>"] {
            let source = format!("function f {{ a = f {op} 1; }}");
            let stmts = body(&source);
            assert!(matches!(stmts[0], Stmt::Assign { value: Expr::Binary { .. }, .. }));
        }
    }

    #[test]
    fn call_in_rhs() {
        let stmts = body("function f { a = g(f); }");
        assert_eq!(
            stmts[0],
            Stmt::Assign {
                target: var("a"),
                value: Expr::Call {
                    callee: Box::new(var("g")),
                    arg: Box::new(var("f")),
                },
            }
        );
    }

    #[test]
    fn call_in_primitive_position() {
        let err = Program::parse("function f { return g(f); }").unwrap_err();
        assert!(matches!(err, SyntaxError::CallInPrimitive { .. }));
    }

    #[test]
    fn return_takes_a_primitive_only() {
        let err = Program::parse("function f { return f & 1; }").unwrap_err();
        assert!(matches!(err, SyntaxError::Expected { what: "`;`", .. }));
    }

    #[test]
    fn missing_semicolon() {
        let err = Program::parse("function f { a = f }").unwrap_err();
        assert!(matches!(err, SyntaxError::Expected { what: "`;`", .. }));
    }

    #[test]
    fn stray_semicolons_are_skipped() {
        let program = parse_ok(";; function f { ;; a = f; ;; } ;;");
        assert_eq!(program.functions[0].body.len(), 1);
    }

    #[test]
    fn signed_literals_are_rejected_in_data_position() {
        for source in [
            "function main:4 { r = -5; return r; }",
            "function f { return -1; }",
            "function f { a = f & -1; }",
            "function f { a = f :: -1; }",
        ] {
            let err = Program::parse(source).unwrap_err();
            assert!(
                matches!(err, SyntaxError::Expected { what: "an unsigned data literal", .. }),
                "{source}"
            );
        }
    }

    #[test]
    fn signed_payloads_stay_valid_in_brackets() {
        // Index and slice payloads are numeric, not data, so the sign
        // is allowed there.
        assert!(Program::parse("function f { a = f[-1]; b = f[-2:-1]; }").is_ok());
    }

    #[test]
    fn empty_brackets_are_rejected() {
        let err = Program::parse("function f { a = f[]; }").unwrap_err();
        assert!(matches!(err, SyntaxError::Expected { what: "an index or slice", .. }));
    }

    #[test]
    fn width_must_be_decimal() {
        let err = Program::parse("function main:0xF { return main; }").unwrap_err();
        assert!(matches!(err, SyntaxError::Expected { what: "a decimal bit-count", .. }));
    }

    #[test]
    fn top_level_garbage() {
        let err = Program::parse("mask = 1;").unwrap_err();
        assert!(matches!(err, SyntaxError::Expected { what: "`function`", .. }));
    }
}
