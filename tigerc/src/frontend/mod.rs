//! The CLI's own lexer/parser, filling the out-of-scope frontend seam the
//! backend library only specifies by interface (the AST types in
//! `tiger_codegen::translate::ast`).

pub mod lexer;
pub mod parser;

use tiger_codegen::result::CompileResult;
use tiger_codegen::translate::ast::Expr;

pub fn parse_source(source: &str) -> CompileResult<Expr> {
    let tokens = lexer::lex(source)?;
    parser::parse_program(tokens)
}
