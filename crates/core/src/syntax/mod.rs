//! Minimal SystemVerilog front end: lexing, preprocessing and the metadata
//! scan the loader needs to discover dependencies.

pub mod lexer;
pub mod metadata;
pub mod preprocess;
pub mod tree;

pub use metadata::{DeclKind, ModuleDecl, PackageImport, TreeMetadata};
pub use preprocess::MacroDef;
pub use tree::SyntaxTree;
