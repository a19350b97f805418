use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("SyntaxError at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// An uncaught `throw`, already rendered the way a console would print it.
    #[error("{0}")]
    Thrown(String),

    #[error("{0}")]
    Policy(String),

    #[error("Execution budget exceeded: {0}")]
    Budget(String),
}

impl From<pest::error::Error<crate::grammar::Rule>> for ScriptError {
    fn from(err: pest::error::Error<crate::grammar::Rule>) -> Self {
        if let pest::error::ErrorVariant::CustomError { message } = &err.variant {
            if message == "call limit reached" || message == "stack limit reached" {
                return ScriptError::Budget(format!("script is too complex to parse ({})", message));
            }
        }
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ScriptError::Syntax {
            line,
            column,
            message: err.variant.to_string(),
        }
    }
}
