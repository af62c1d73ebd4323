//! CHTL-JS front-end and generator: the script-block extension adding
//! enhanced selectors, arrow access, event binding and the structured
//! `listen` / `delegate` / `animate` / `vir` / `module` blocks.

pub mod ast;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod tokens;

pub use ast::JsNode;
pub use generator::{JsGenerator, JsGeneratorConfig, ModuleFormat};
pub use lexer::{LexState, Lexer};
pub use parser::Parser;
pub use tokens::{Token, TokenKind};
