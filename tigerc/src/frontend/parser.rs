//! Hand-rolled recursive-descent Tiger parser.
//!
//! Grounded on `examples/original_source/src/parser/parser.py`'s grammar
//! (precedence climbing through or/and/comparison/additive/multiplicative,
//! `&`/`|` desugared to `if` per the Tiger report), producing the AST types
//! `tiger_codegen::translate::ast` defines as the backend's input interface.

use tiger_codegen::result::{CompileResult, FrontendError, Line};
use tiger_codegen::translate::ast::{Declaration, ExpField, Expr, Field, FunctionDec, Oper, Type, TypeDec, Variable, VariableDec};

use crate::frontend::lexer::{Spanned, Token};

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

/// Parses a whole program: one top-level expression.
pub fn parse_program(tokens: Vec<Spanned>) -> CompileResult<Expr> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    parser.expect(Token::Eof)?;
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn line(&self) -> Line {
        self.tokens[self.pos].line
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, token: Token) -> CompileResult<()> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(FrontendError::syntactic(format!("expected {token:?}, found {:?}", self.peek()), self.line()))
        }
    }

    fn expect_ident(&mut self) -> CompileResult<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(FrontendError::syntactic(format!("expected identifier, found {other:?}"), self.line())),
        }
    }

    pub fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_and()?;
        while *self.peek() == Token::Or {
            let line = self.line();
            self.advance();
            let right = self.parse_and()?;
            left = Expr::If {
                test: Box::new(left),
                then_branch: Box::new(Expr::Int(1, line)),
                else_branch: Some(Box::new(right)),
                line,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_cmp()?;
        while *self.peek() == Token::And {
            let line = self.line();
            self.advance();
            let right = self.parse_cmp()?;
            left = Expr::If {
                test: Box::new(left),
                then_branch: Box::new(right),
                else_branch: Some(Box::new(Expr::Int(0, line))),
                line,
            };
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> CompileResult<Expr> {
        let left = self.parse_add()?;
        let oper = match self.peek() {
            Token::Eq => Oper::Eq,
            Token::Neq => Oper::Neq,
            Token::Lt => Oper::Lt,
            Token::Le => Oper::Le,
            Token::Gt => Oper::Gt,
            Token::Ge => Oper::Ge,
            _ => return Ok(left),
        };
        let line = self.line();
        self.advance();
        let right = self.parse_add()?;
        Ok(Expr::Op { oper, left: Box::new(left), right: Box::new(right), line })
    }

    fn parse_add(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_mul()?;
        loop {
            let oper = match self.peek() {
                Token::Plus => Oper::Plus,
                Token::Minus => Oper::Minus,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.parse_mul()?;
            left = Expr::Op { oper, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let oper = match self.peek() {
                Token::Times => Oper::Times,
                Token::Divide => Oper::Divide,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Op { oper, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        if *self.peek() == Token::Minus {
            let line = self.line();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Op {
                oper: Oper::Minus,
                left: Box::new(Expr::Int(0, line)),
                right: Box::new(operand),
                line,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        match self.peek().clone() {
            Token::Nil => {
                self.advance();
                Ok(Expr::Nil(line))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Int(n, line))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s, line))
            }
            Token::Break => {
                self.advance();
                Ok(Expr::Break(line))
            }
            Token::LParen => self.parse_sequence(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Let => self.parse_let(),
            Token::Ident(name) => {
                self.advance();
                self.parse_ident_led(name, line)
            }
            other => Err(FrontendError::syntactic(format!("unexpected token {other:?}"), line)),
        }
    }

    fn parse_sequence(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        self.expect(Token::LParen)?;
        if *self.peek() == Token::RParen {
            self.advance();
            return Ok(Expr::Empty(line));
        }
        let mut exprs = vec![self.parse_expr()?];
        while *self.peek() == Token::Semicolon {
            self.advance();
            exprs.push(self.parse_expr()?);
        }
        self.expect(Token::RParen)?;
        if exprs.len() == 1 {
            Ok(exprs.into_iter().next().unwrap())
        } else {
            Ok(Expr::Seq(exprs, line))
        }
    }

    fn parse_if(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        self.expect(Token::If)?;
        let test = self.parse_expr()?;
        self.expect(Token::Then)?;
        let then_branch = self.parse_expr()?;
        let else_branch = if *self.peek() == Token::Else {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Expr::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch, line })
    }

    fn parse_while(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        self.expect(Token::While)?;
        let test = self.parse_expr()?;
        self.expect(Token::Do)?;
        let body = self.parse_expr()?;
        Ok(Expr::While { test: Box::new(test), body: Box::new(body), line })
    }

    fn parse_for(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        self.expect(Token::For)?;
        let var = self.expect_ident()?;
        self.expect(Token::Assign)?;
        let lo = self.parse_expr()?;
        self.expect(Token::To)?;
        let hi = self.parse_expr()?;
        self.expect(Token::Do)?;
        let body = self.parse_expr()?;
        Ok(Expr::For { var, lo: Box::new(lo), hi: Box::new(hi), body: Box::new(body), line })
    }

    fn parse_let(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        self.expect(Token::Let)?;
        let decs = self.parse_decs()?;
        self.expect(Token::In)?;
        let mut body = Vec::new();
        if *self.peek() != Token::End {
            body.push(self.parse_expr()?);
            while *self.peek() == Token::Semicolon {
                self.advance();
                body.push(self.parse_expr()?);
            }
        }
        self.expect(Token::End)?;
        Ok(Expr::Let { decs, body, line })
    }

    fn parse_decs(&mut self) -> CompileResult<Vec<Declaration>> {
        let mut decs = Vec::new();
        loop {
            match self.peek() {
                Token::Type => {
                    let line = self.line();
                    let mut group = Vec::new();
                    while *self.peek() == Token::Type {
                        group.push(self.parse_type_dec()?);
                    }
                    decs.push(Declaration::Types(group, line));
                }
                Token::Function => {
                    let line = self.line();
                    let mut group = Vec::new();
                    while *self.peek() == Token::Function {
                        group.push(self.parse_function_dec()?);
                    }
                    decs.push(Declaration::Functions(group, line));
                }
                Token::Var => {
                    decs.push(Declaration::Variable(self.parse_variable_dec()?));
                }
                _ => break,
            }
        }
        Ok(decs)
    }

    fn parse_type_dec(&mut self) -> CompileResult<TypeDec> {
        let line = self.line();
        self.expect(Token::Type)?;
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let ty = self.parse_type()?;
        Ok(TypeDec { name, ty, line })
    }

    fn parse_type(&mut self) -> CompileResult<Type> {
        let line = self.line();
        match self.peek().clone() {
            Token::LBrace => {
                self.advance();
                let fields = self.parse_fields()?;
                self.expect(Token::RBrace)?;
                Ok(Type::Record { fields, line })
            }
            Token::Array => {
                self.advance();
                self.expect(Token::Of)?;
                let element = self.expect_ident()?;
                Ok(Type::Array { element, line })
            }
            Token::Ident(_) => {
                let name = self.expect_ident()?;
                Ok(Type::Name { name, line })
            }
            other => Err(FrontendError::syntactic(format!("expected a type, found {other:?}"), line)),
        }
    }

    fn parse_fields(&mut self) -> CompileResult<Vec<Field>> {
        let mut fields = Vec::new();
        if *self.peek() == Token::RBrace {
            return Ok(fields);
        }
        fields.push(self.parse_field()?);
        while *self.peek() == Token::Comma {
            self.advance();
            fields.push(self.parse_field()?);
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> CompileResult<Field> {
        let line = self.line();
        let name = self.expect_ident()?;
        self.expect(Token::Colon)?;
        let type_name = self.expect_ident()?;
        Ok(Field { name, type_name, line })
    }

    fn parse_function_dec(&mut self) -> CompileResult<FunctionDec> {
        let line = self.line();
        self.expect(Token::Function)?;
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let params = self.parse_fields()?;
        self.expect(Token::RParen)?;
        let return_type = if *self.peek() == Token::Colon {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Token::Eq)?;
        let body = self.parse_expr()?;
        Ok(FunctionDec { name, params, return_type, body, line })
    }

    fn parse_variable_dec(&mut self) -> CompileResult<VariableDec> {
        let line = self.line();
        self.expect(Token::Var)?;
        let name = self.expect_ident()?;
        let type_name = if *self.peek() == Token::Colon {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Token::Assign)?;
        let init = self.parse_expr()?;
        Ok(VariableDec { name, type_name, init, line })
    }

    /// Continues parsing after a leading identifier: a call, a record
    /// creation, an array creation, or an lvalue (possibly assigned to).
    fn parse_ident_led(&mut self, name: String, line: Line) -> CompileResult<Expr> {
        match self.peek() {
            Token::LParen => {
                self.advance();
                let mut args = Vec::new();
                if *self.peek() != Token::RParen {
                    args.push(self.parse_expr()?);
                    while *self.peek() == Token::Comma {
                        self.advance();
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call { func: name, args, line })
            }
            Token::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                if *self.peek() != Token::RBrace {
                    fields.push(self.parse_record_field()?);
                    while *self.peek() == Token::Comma {
                        self.advance();
                        fields.push(self.parse_record_field()?);
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Expr::Record { type_name: name, fields, line })
            }
            Token::LBrack => {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(Token::RBrack)?;
                if *self.peek() == Token::Of {
                    self.advance();
                    let init = self.parse_expr()?;
                    Ok(Expr::Array { type_name: name, size: Box::new(index), init: Box::new(init), line })
                } else {
                    let var = Variable::Subscript { var: Box::new(Variable::Simple { name, line }), index: Box::new(index), line };
                    self.parse_lvalue_tail(var)
                }
            }
            _ => self.parse_lvalue_tail(Variable::Simple { name, line }),
        }
    }

    fn parse_record_field(&mut self) -> CompileResult<ExpField> {
        let line = self.line();
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let exp = self.parse_expr()?;
        Ok(ExpField { name, exp, line })
    }

    /// Extends `var` with trailing `.field`/`[index]` postfixes, then yields
    /// either an assignment (if `:=` follows) or a plain variable read.
    fn parse_lvalue_tail(&mut self, mut var: Variable) -> CompileResult<Expr> {
        loop {
            match self.peek() {
                Token::Dot => {
                    let line = self.line();
                    self.advance();
                    let name = self.expect_ident()?;
                    var = Variable::Field { var: Box::new(var), name, line };
                }
                Token::LBrack => {
                    let line = self.line();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBrack)?;
                    var = Variable::Subscript { var: Box::new(var), index: Box::new(index), line };
                }
                _ => break,
            }
        }
        if *self.peek() == Token::Assign {
            let line = self.line();
            self.advance();
            let rhs = self.parse_expr()?;
            Ok(Expr::Assign { var: Box::new(var), exp: Box::new(rhs), line })
        } else {
            Ok(Expr::Var(Box::new(var)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::lex;

    fn parse(source: &str) -> Expr {
        parse_program(lex(source).unwrap()).unwrap()
    }

    #[test]
    fn integer_literal_parses_directly() {
        assert!(matches!(parse("42"), Expr::Int(42, _)));
    }

    #[test]
    fn and_desugars_to_an_if_expression() {
        assert!(matches!(parse("1 & 2"), Expr::If { .. }));
    }

    #[test]
    fn a_let_expression_groups_consecutive_type_declarations() {
        let expr = parse("let type a = int type b = int var x := 0 in x end");
        match expr {
            Expr::Let { decs, .. } => {
                assert!(matches!(decs[0], Declaration::Types(ref v, _) if v.len() == 2));
                assert!(matches!(decs[1], Declaration::Variable(_)));
            }
            _ => panic!("expected a let expression"),
        }
    }

    #[test]
    fn subscript_followed_by_of_is_an_array_creation() {
        assert!(matches!(parse("intArray[10] of 0"), Expr::Array { .. }));
    }

    #[test]
    fn subscript_not_followed_by_of_is_a_variable_read() {
        match parse("a[10]") {
            Expr::Var(v) => assert!(matches!(*v, Variable::Subscript { .. })),
            other => panic!("expected a variable, got {other:?}"),
        }
    }

    #[test]
    fn an_assignment_to_a_field_parses_the_full_lvalue_chain() {
        match parse("a.b.c := 1") {
            Expr::Assign { var, .. } => assert!(matches!(*var, Variable::Field { .. })),
            other => panic!("expected an assignment, got {other:?}"),
        }
    }
}
