pub mod ast;
mod builtins;
pub mod console;
pub mod error;
pub mod grammar;
mod interpreter;
pub mod parser;
pub mod value;

pub use ast::*;
pub use console::{Channel, ConsoleLine};
pub use error::{Result, ScriptError};
pub use interpreter::{run, Completion, Limits};
pub use parser::Parser;

#[cfg(test)]
mod tests;
