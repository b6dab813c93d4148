use std::fmt;

use lethe::LetheError;

/// Exit code for failures without a more specific category
pub const EXIT_FAILURE: i32 = 1;
/// sysexits `EX_IOERR`: the data directory or its tables could not be used
pub const EXIT_STORAGE: i32 = 74;
/// sysexits `EX_CONFIG`: the configuration file or overrides are invalid
pub const EXIT_CONFIG: i32 = 78;

/// A failed command, with an optional next step for the operator
#[derive(Debug)]
pub struct CliError {
    message: String,
    hint: Option<&'static str>,
    exit_code: i32,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
            exit_code: EXIT_FAILURE,
        }
    }

    fn with_hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn hint(&self) -> Option<&'static str> {
        self.hint
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError::new(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        CliError::new(s)
    }
}

impl From<LetheError> for CliError {
    fn from(e: LetheError) -> Self {
        let error = CliError::new(e.to_string());
        match e {
            LetheError::NotFound(_) => {
                error.with_hint("run `lethe-cli memory list <user> --all` to see stored ids")
            }
            LetheError::Config(_) => error
                .with_hint("check the file from `lethe-cli config path` and any LETHE_* variables")
                .with_exit_code(EXIT_CONFIG),
            LetheError::Storage(_) | LetheError::Io(_) => error
                .with_hint("check that --data-dir points at a writable Lethe data directory")
                .with_exit_code(EXIT_STORAGE),
            LetheError::Serialization(_) => error,
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::new(format!("JSON error: {e}"))
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::new(format!("IO error: {e}")).with_exit_code(EXIT_STORAGE)
    }
}

pub type CliResult<T> = Result<T, CliError>;
