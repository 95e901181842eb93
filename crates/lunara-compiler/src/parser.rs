//! Recursive-descent parser: token stream to AST.
//!
//! Fails on the first syntax error; there is no recovery.

use crate::ast::*;
use crate::error::{CompileError, ErrorKind};
use crate::lexer::Lexer;
use crate::token::Token;
use lunara_core::string::{StringId, StringInterner};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Parser {
            lexer: Lexer::new(source),
        }
    }

    pub fn with_strings(source: &'a [u8], strings: StringInterner) -> Self {
        Parser {
            lexer: Lexer::with_strings(source, strings),
        }
    }

    pub fn into_strings(self) -> StringInterner {
        self.lexer.strings
    }

    /// Parse a whole chunk: a block followed by end of input.
    pub fn parse_chunk(&mut self) -> Result<Block, CompileError> {
        let block = self.block()?;
        self.expect(&Token::Eof)?;
        Ok(block)
    }

    // ---- Token plumbing ----

    fn line(&self) -> u32 {
        self.lexer
            .current()
            .map(|t| t.span.line)
            .unwrap_or_else(|e| e.line)
    }

    fn error(&self, msg: impl Into<String>) -> CompileError {
        CompileError {
            message: msg.into(),
            line: self.line(),
            kind: ErrorKind::Syntactic,
        }
    }

    fn current(&self) -> Result<&Token, CompileError> {
        self.lexer
            .current()
            .map(|t| &t.token)
            .map_err(|e| e.clone().into())
    }

    fn check(&self, expected: &Token) -> bool {
        self.current().map(|t| t == expected).unwrap_or(false)
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        Ok(self.lexer.advance()?.token)
    }

    fn test_next(&mut self, expected: &Token) -> Result<bool, CompileError> {
        if self.check(expected) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        if self.check(expected) {
            self.advance()?;
            Ok(())
        } else {
            let found = self
                .current()
                .map(|t| t.to_string())
                .unwrap_or_else(|_| "<error>".to_string());
            Err(self.error(format!("'{expected}' expected near '{found}'")))
        }
    }

    fn expect_name(&mut self) -> Result<StringId, CompileError> {
        match self.current()?.clone() {
            Token::Name(id) => {
                self.advance()?;
                Ok(id)
            }
            other => Err(self.error(format!("<name> expected near '{other}'"))),
        }
    }

    fn block_follows(&self) -> bool {
        matches!(
            self.current(),
            Ok(Token::End) | Ok(Token::Else) | Ok(Token::ElseIf) | Ok(Token::Until) | Ok(Token::Eof)
        )
    }

    // ---- Blocks and statements ----

    fn block(&mut self) -> Result<Block, CompileError> {
        let mut stats = Vec::new();
        loop {
            if self.block_follows() {
                return Ok(Block { stats, ret: None });
            }
            if self.check(&Token::Return) {
                let ret = self.ret_stat()?;
                if !self.block_follows() {
                    let found = self
                        .current()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|_| "<error>".to_string());
                    return Err(self.error(format!("'end' expected near '{found}'")));
                }
                return Ok(Block {
                    stats,
                    ret: Some(ret),
                });
            }
            match self.statement()? {
                Stat::Empty => {}
                stat => stats.push(stat),
            }
        }
    }

    fn ret_stat(&mut self) -> Result<RetStat, CompileError> {
        let line = self.line();
        self.advance()?; // return
        let exprs = if self.block_follows() || self.check(&Token::Semi) {
            Vec::new()
        } else {
            self.expr_list()?
        };
        self.test_next(&Token::Semi)?;
        Ok(RetStat { exprs, line })
    }

    fn statement(&mut self) -> Result<Stat, CompileError> {
        match self.current()?.clone() {
            Token::Semi => {
                self.advance()?;
                Ok(Stat::Empty)
            }
            Token::Break => {
                let line = self.line();
                self.advance()?;
                Ok(Stat::Break { line })
            }
            Token::Do => self.do_stat(),
            Token::While => self.while_stat(),
            Token::Repeat => self.repeat_stat(),
            Token::If => self.if_stat(),
            Token::For => self.for_stat(),
            Token::Local => self.local_stat(),
            Token::Function => self.function_stat(),
            Token::Goto => Err(self.error("'goto' is not supported")),
            Token::DoubleColon => Err(self.error("labels are not supported")),
            _ => self.expr_stat(),
        }
    }

    fn do_stat(&mut self) -> Result<Stat, CompileError> {
        self.advance()?; // do
        let body = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::Do { body })
    }

    fn while_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.advance()?; // while
        let cond = self.expr()?;
        self.expect(&Token::Do)?;
        let body = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::While { cond, body, line })
    }

    fn repeat_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.advance()?; // repeat
        let body = self.block()?;
        self.expect(&Token::Until)?;
        let cond = self.expr()?;
        Ok(Stat::Repeat { body, cond, line })
    }

    fn if_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.advance()?; // if
        let mut arms = Vec::new();

        let cond = self.expr()?;
        self.expect(&Token::Then)?;
        arms.push((cond, self.block()?));

        while self.check(&Token::ElseIf) {
            self.advance()?;
            let cond = self.expr()?;
            self.expect(&Token::Then)?;
            arms.push((cond, self.block()?));
        }

        let else_body = if self.test_next(&Token::Else)? {
            Some(self.block()?)
        } else {
            None
        };
        self.expect(&Token::End)?;
        Ok(Stat::If {
            arms,
            else_body,
            line,
        })
    }

    fn for_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.advance()?; // for
        let first = self.expect_name()?;

        if self.test_next(&Token::Assign)? {
            let init = self.expr()?;
            self.expect(&Token::Comma)?;
            let limit = self.expr()?;
            let step = if self.test_next(&Token::Comma)? {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(&Token::Do)?;
            let body = self.block()?;
            self.expect(&Token::End)?;
            return Ok(Stat::NumericFor {
                var: first,
                init,
                limit,
                step,
                body,
                line,
            });
        }

        let mut names = vec![first];
        while self.test_next(&Token::Comma)? {
            names.push(self.expect_name()?);
        }
        self.expect(&Token::In)?;
        let exprs = self.expr_list()?;
        self.expect(&Token::Do)?;
        let body = self.block()?;
        self.expect(&Token::End)?;
        Ok(Stat::GenericFor {
            names,
            exprs,
            body,
            line,
        })
    }

    fn local_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.advance()?; // local

        if self.test_next(&Token::Function)? {
            let name = self.expect_name()?;
            let body = self.func_body(false)?;
            return Ok(Stat::LocalFunction { name, body, line });
        }

        let mut names = vec![self.expect_name()?];
        while self.test_next(&Token::Comma)? {
            names.push(self.expect_name()?);
        }
        let exprs = if self.test_next(&Token::Assign)? {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stat::Local { names, exprs, line })
    }

    /// `function Name{'.' Name}[':' Name] funcbody`, desugared to an
    /// assignment of a function expression.
    fn function_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        self.advance()?; // function

        let first = self.expect_name()?;
        let mut target = Expr::Name { id: first, line };
        let mut is_method = false;
        loop {
            if self.test_next(&Token::Dot)? {
                let key_line = self.line();
                let field = self.expect_name()?;
                target = Expr::Index {
                    obj: Box::new(target),
                    key: Box::new(Expr::Str {
                        id: field,
                        line: key_line,
                    }),
                    line: key_line,
                };
            } else if self.test_next(&Token::Colon)? {
                let key_line = self.line();
                let method = self.expect_name()?;
                target = Expr::Index {
                    obj: Box::new(target),
                    key: Box::new(Expr::Str {
                        id: method,
                        line: key_line,
                    }),
                    line: key_line,
                };
                is_method = true;
                break;
            } else {
                break;
            }
        }

        let body = self.func_body(is_method)?;
        Ok(Stat::Assign {
            targets: vec![target],
            values: vec![Expr::Function { body }],
            line,
        })
    }

    fn expr_stat(&mut self) -> Result<Stat, CompileError> {
        let line = self.line();
        let first = self.suffixed_expr()?;

        if self.check(&Token::Assign) || self.check(&Token::Comma) {
            let mut targets = vec![first];
            while self.test_next(&Token::Comma)? {
                targets.push(self.suffixed_expr()?);
            }
            for t in &targets {
                if !matches!(t, Expr::Name { .. } | Expr::Index { .. }) {
                    return Err(self.error("syntax error: cannot assign to this expression"));
                }
            }
            self.expect(&Token::Assign)?;
            let values = self.expr_list()?;
            return Ok(Stat::Assign {
                targets,
                values,
                line,
            });
        }

        match first {
            Expr::Call { .. } | Expr::MethodCall { .. } => Ok(Stat::Call { expr: first, line }),
            _ => Err(self.error("syntax error: unexpected expression statement")),
        }
    }

    // ---- Expressions ----

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.sub_expr(0)
    }

    fn expr_list(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut exprs = vec![self.expr()?];
        while self.test_next(&Token::Comma)? {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    /// Precedence climbing.
    fn sub_expr(&mut self, limit: u8) -> Result<Expr, CompileError> {
        let line = self.line();
        let lhs = if let Some(unop) = self.unary_op()? {
            self.advance()?;
            let operand = self.sub_expr(UNARY_PRIORITY)?;
            Expr::UnOp {
                op: unop,
                operand: Box::new(operand),
                line,
            }
        } else {
            self.simple_expr()?
        };
        self.binop_from(lhs, limit)
    }

    /// The binary-operator loop, entered with an already-parsed left side.
    fn binop_from(&mut self, mut lhs: Expr, limit: u8) -> Result<Expr, CompileError> {
        while let Some(op) = self.binary_op()? {
            let (left_prec, right_prec) = op.priority();
            if left_prec <= limit {
                break;
            }
            let line = self.line();
            self.advance()?;
            let rhs = self.sub_expr(right_prec)?;
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn unary_op(&self) -> Result<Option<UnOp>, CompileError> {
        Ok(match self.current()? {
            Token::Minus => Some(UnOp::Neg),
            Token::Not => Some(UnOp::Not),
            Token::Hash => Some(UnOp::Len),
            Token::Tilde => Some(UnOp::BNot),
            _ => None,
        })
    }

    fn binary_op(&self) -> Result<Option<BinOp>, CompileError> {
        Ok(match self.current()? {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::DoubleSlash => Some(BinOp::IDiv),
            Token::Percent => Some(BinOp::Mod),
            Token::Caret => Some(BinOp::Pow),
            Token::Concat => Some(BinOp::Concat),
            Token::Ampersand => Some(BinOp::BAnd),
            Token::Pipe => Some(BinOp::BOr),
            Token::Tilde => Some(BinOp::BXor),
            Token::LtLt => Some(BinOp::Shl),
            Token::GtGt => Some(BinOp::Shr),
            Token::Eq => Some(BinOp::Eq),
            Token::NotEq => Some(BinOp::NotEq),
            Token::Lt => Some(BinOp::Lt),
            Token::LtEq => Some(BinOp::LtEq),
            Token::Gt => Some(BinOp::Gt),
            Token::GtEq => Some(BinOp::GtEq),
            Token::And => Some(BinOp::And),
            Token::Or => Some(BinOp::Or),
            _ => None,
        })
    }

    fn simple_expr(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.current()?.clone() {
            Token::Nil => {
                self.advance()?;
                Ok(Expr::Nil { line })
            }
            Token::True => {
                self.advance()?;
                Ok(Expr::True { line })
            }
            Token::False => {
                self.advance()?;
                Ok(Expr::False { line })
            }
            Token::Ellipsis => {
                self.advance()?;
                Ok(Expr::Vararg { line })
            }
            Token::Integer(value) => {
                self.advance()?;
                Ok(Expr::Integer { value, line })
            }
            Token::Float(value) => {
                self.advance()?;
                Ok(Expr::Float { value, line })
            }
            Token::Str(id) => {
                self.advance()?;
                Ok(Expr::Str { id, line })
            }
            Token::LBrace => self.table_constructor(),
            Token::Function => {
                self.advance()?;
                let body = self.func_body(false)?;
                Ok(Expr::Function { body })
            }
            _ => self.suffixed_expr(),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.current()?.clone() {
            Token::Name(id) => {
                self.advance()?;
                Ok(Expr::Name { id, line })
            }
            Token::LParen => {
                self.advance()?;
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                })
            }
            other => Err(self.error(format!("unexpected symbol near '{other}'"))),
        }
    }

    fn suffixed_expr(&mut self) -> Result<Expr, CompileError> {
        let expr = self.primary_expr()?;
        self.suffixed_from(expr)
    }

    /// Suffix chain (`.name`, `[k]`, `:m(args)`, `(args)`) on a parsed prefix.
    fn suffixed_from(&mut self, mut expr: Expr) -> Result<Expr, CompileError> {
        loop {
            let line = self.line();
            match self.current()?.clone() {
                Token::Dot => {
                    self.advance()?;
                    let field = self.expect_name()?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(Expr::Str { id: field, line }),
                        line,
                    };
                }
                Token::LBracket => {
                    self.advance()?;
                    let key = self.expr()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                        line,
                    };
                }
                Token::Colon => {
                    self.advance()?;
                    let name = self.expect_name()?;
                    let args = self.call_args()?;
                    expr = Expr::MethodCall {
                        obj: Box::new(expr),
                        name,
                        args,
                        line,
                    };
                }
                Token::LParen | Token::LBrace | Token::Str(_) => {
                    let args = self.call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        line,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let line = self.line();
        match self.current()?.clone() {
            Token::LParen => {
                self.advance()?;
                let args = if self.check(&Token::RParen) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                self.expect(&Token::RParen)?;
                Ok(args)
            }
            Token::LBrace => Ok(vec![self.table_constructor()?]),
            Token::Str(id) => {
                self.advance()?;
                Ok(vec![Expr::Str { id, line }])
            }
            other => Err(self.error(format!("function arguments expected near '{other}'"))),
        }
    }

    fn table_constructor(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        self.expect(&Token::LBrace)?;
        let mut fields = Vec::new();

        while !self.check(&Token::RBrace) {
            match self.current()?.clone() {
                Token::LBracket => {
                    self.advance()?;
                    let key = self.expr()?;
                    self.expect(&Token::RBracket)?;
                    self.expect(&Token::Assign)?;
                    let value = self.expr()?;
                    fields.push(Field::Keyed { key, value });
                }
                Token::Name(id) => {
                    // `name = expr` needs one token of context past the name.
                    let name_line = self.line();
                    self.advance()?;
                    if self.test_next(&Token::Assign)? {
                        let value = self.expr()?;
                        fields.push(Field::Named { name: id, value });
                    } else {
                        let prefix = self.suffixed_from(Expr::Name {
                            id,
                            line: name_line,
                        })?;
                        let expr = self.binop_from(prefix, 0)?;
                        fields.push(Field::Item(expr));
                    }
                }
                _ => fields.push(Field::Item(self.expr()?)),
            }
            if !self.test_next(&Token::Comma)? && !self.test_next(&Token::Semi)? {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Table { fields, line })
    }

    fn func_body(&mut self, is_method: bool) -> Result<FuncBody, CompileError> {
        let line = self.line();
        self.expect(&Token::LParen)?;

        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(&Token::RParen) {
            loop {
                match self.current()?.clone() {
                    Token::Name(id) => {
                        self.advance()?;
                        params.push(id);
                    }
                    Token::Ellipsis => {
                        self.advance()?;
                        is_vararg = true;
                        break;
                    }
                    other => {
                        return Err(self.error(format!("<name> expected near '{other}'")));
                    }
                }
                if !self.test_next(&Token::Comma)? {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;

        let block = self.block()?;
        let end_line = self.line();
        self.expect(&Token::End)?;
        Ok(FuncBody {
            params,
            is_vararg,
            is_method,
            block,
            line,
            end_line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Block {
        let mut parser = Parser::new(source.as_bytes());
        parser
            .parse_chunk()
            .unwrap_or_else(|e| panic!("parse error: {e}"))
    }

    fn parse_err(source: &str) -> CompileError {
        let mut parser = Parser::new(source.as_bytes());
        parser.parse_chunk().expect_err("expected parse error")
    }

    #[test]
    fn empty_chunk() {
        let b = parse_ok("");
        assert!(b.stats.is_empty());
        assert!(b.ret.is_none());
    }

    #[test]
    fn semicolons_disappear() {
        let b = parse_ok(";;;");
        assert!(b.stats.is_empty());
    }

    #[test]
    fn local_declaration() {
        let b = parse_ok("local a, b = 1, 2");
        match &b.stats[0] {
            Stat::Local { names, exprs, .. } => {
                assert_eq!(names.len(), 2);
                assert_eq!(exprs.len(), 2);
            }
            other => panic!("unexpected stat {other:?}"),
        }
    }

    #[test]
    fn return_statement() {
        let b = parse_ok("return 1, 2");
        assert_eq!(b.ret.as_ref().unwrap().exprs.len(), 2);
        let b = parse_ok("return");
        assert!(b.ret.as_ref().unwrap().exprs.is_empty());
    }

    #[test]
    fn return_must_end_block() {
        let e = parse_err("return 1\nlocal x = 2");
        assert!(e.message.contains("'end' expected"));
    }

    #[test]
    fn precedence_shapes() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let b = parse_ok("return 1 + 2 * 3");
        match &b.ret.as_ref().unwrap().exprs[0] {
            Expr::BinOp { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(**rhs, Expr::BinOp { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn pow_is_right_associative() {
        // 2 ^ 3 ^ 2 parses as 2 ^ (3 ^ 2)
        let b = parse_ok("return 2 ^ 3 ^ 2");
        match &b.ret.as_ref().unwrap().exprs[0] {
            Expr::BinOp { op: BinOp::Pow, rhs, .. } => {
                assert!(matches!(**rhs, Expr::BinOp { op: BinOp::Pow, .. }));
            }
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn concat_is_right_associative() {
        let b = parse_ok("return 'a' .. 'b' .. 'c'");
        match &b.ret.as_ref().unwrap().exprs[0] {
            Expr::BinOp { op: BinOp::Concat, rhs, .. } => {
                assert!(matches!(**rhs, Expr::BinOp { op: BinOp::Concat, .. }));
            }
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn unary_binds_over_binary() {
        // -x + y parses as (-x) + y
        let b = parse_ok("return -x + y");
        assert!(matches!(
            &b.ret.as_ref().unwrap().exprs[0],
            Expr::BinOp { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn unary_under_pow() {
        // -x^2 parses as -(x^2)
        let b = parse_ok("return -x ^ 2");
        assert!(matches!(
            &b.ret.as_ref().unwrap().exprs[0],
            Expr::UnOp { op: UnOp::Neg, .. }
        ));
    }

    #[test]
    fn call_and_index_chain() {
        let b = parse_ok("return a.b[1]:m(2)");
        assert!(matches!(
            &b.ret.as_ref().unwrap().exprs[0],
            Expr::MethodCall { .. }
        ));
    }

    #[test]
    fn call_sugar_with_string_and_table() {
        parse_ok("f 'hello'");
        parse_ok("f {1, 2}");
    }

    #[test]
    fn function_statement_desugars_to_assignment() {
        let b = parse_ok("function t.a:m(x) return x end");
        match &b.stats[0] {
            Stat::Assign { targets, values, .. } => {
                assert!(matches!(targets[0], Expr::Index { .. }));
                match &values[0] {
                    Expr::Function { body } => {
                        assert!(body.is_method);
                        assert_eq!(body.params.len(), 1);
                    }
                    other => panic!("unexpected value {other:?}"),
                }
            }
            other => panic!("unexpected stat {other:?}"),
        }
    }

    #[test]
    fn numeric_and_generic_for() {
        let b = parse_ok("for i = 1, 10, 2 do end\nfor k, v in pairs(t) do end");
        assert!(matches!(b.stats[0], Stat::NumericFor { .. }));
        match &b.stats[1] {
            Stat::GenericFor { names, .. } => assert_eq!(names.len(), 2),
            other => panic!("unexpected stat {other:?}"),
        }
    }

    #[test]
    fn table_constructor_fields() {
        let b = parse_ok("return {1, x = 2, [3] = 4, y}");
        match &b.ret.as_ref().unwrap().exprs[0] {
            Expr::Table { fields, .. } => {
                assert_eq!(fields.len(), 4);
                assert!(matches!(fields[0], Field::Item(_)));
                assert!(matches!(fields[1], Field::Named { .. }));
                assert!(matches!(fields[2], Field::Keyed { .. }));
                assert!(matches!(fields[3], Field::Item(_)));
            }
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn vararg_params() {
        let b = parse_ok("local f = function(a, b, ...) end");
        match &b.stats[0] {
            Stat::Local { exprs, .. } => match &exprs[0] {
                Expr::Function { body } => {
                    assert_eq!(body.params.len(), 2);
                    assert!(body.is_vararg);
                }
                other => panic!("unexpected expr {other:?}"),
            },
            other => panic!("unexpected stat {other:?}"),
        }
    }

    #[test]
    fn repeat_until() {
        let b = parse_ok("repeat local x = 1 until x");
        assert!(matches!(b.stats[0], Stat::Repeat { .. }));
    }

    #[test]
    fn assignment_targets_validated() {
        let e = parse_err("f() = 1");
        assert!(e.message.contains("cannot assign"));
    }

    #[test]
    fn expression_is_not_a_statement() {
        let e = parse_err("1 + 2");
        assert_eq!(e.kind, ErrorKind::Syntactic);
    }

    #[test]
    fn goto_is_rejected() {
        let e = parse_err("goto out");
        assert!(e.message.contains("goto"));
        let e = parse_err("::label::");
        assert!(e.message.contains("labels"));
    }

    #[test]
    fn lexical_errors_surface_with_kind() {
        let e = parse_err("local x = \"unfinished");
        assert_eq!(e.kind, ErrorKind::Lexical);
    }

    #[test]
    fn error_carries_line() {
        let e = parse_err("local x = 1\nlocal = 2");
        assert_eq!(e.line, 2);
    }

    #[test]
    fn paren_wraps_multi_values() {
        let b = parse_ok("return (f())");
        assert!(matches!(
            &b.ret.as_ref().unwrap().exprs[0],
            Expr::Paren { .. }
        ));
    }
}
