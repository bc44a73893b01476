//! Custom page functions (`ø name`).
//!
//! The core only knows the [`FunctionRunner`] contract. Builds run with
//! [`NoFunctions`] unless the caller supplies an implementation, so there is
//! no mandatory dependency on any particular script runtime.

use crate::token::{Token, Vars};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("custom functions are not available (\"{0}\")")]
    Unavailable(String),
    #[error("external function \"{0}\" does not exist")]
    NotFound(String),
    #[error("function \"{name}\" failed: {message}")]
    Failed { name: String, message: String },
}

/// Read-only view of the calling document.
#[derive(Debug, Clone, Copy)]
pub struct FunctionInput<'a> {
    pub document_id: &'a str,
    pub vars: &'a Vars,
    pub tokens: &'a [Token],
}

/// Produces a text fragment for a named custom function.
pub trait FunctionRunner: Send + Sync {
    fn call(&self, name: &str, input: FunctionInput<'_>) -> Result<String, FunctionError>;
}

/// Default runner: every call fails recoverably.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFunctions;

impl FunctionRunner for NoFunctions {
    fn call(&self, name: &str, _input: FunctionInput<'_>) -> Result<String, FunctionError> {
        Err(FunctionError::Unavailable(name.to_string()))
    }
}

impl<F> FunctionRunner for F
where
    F: Fn(&str, FunctionInput<'_>) -> Result<String, FunctionError> + Send + Sync,
{
    fn call(&self, name: &str, input: FunctionInput<'_>) -> Result<String, FunctionError> {
        self(name, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_functions_is_unavailable() {
        let vars = Vars::new();
        let input = FunctionInput {
            document_id: "a",
            vars: &vars,
            tokens: &[],
        };
        assert_eq!(
            NoFunctions.call("toc", input),
            Err(FunctionError::Unavailable("toc".into()))
        );
    }

    #[test]
    fn closures_are_runners() {
        let runner = |name: &str, input: FunctionInput<'_>| {
            Ok::<_, FunctionError>(format!("{name}:{}", input.vars.len()))
        };
        let mut vars = Vars::new();
        vars.insert("a".into(), "1".into());
        let input = FunctionInput {
            document_id: "a",
            vars: &vars,
            tokens: &[],
        };
        assert_eq!(FunctionRunner::call(&runner, "count", input).unwrap(), "count:1");
    }
}
