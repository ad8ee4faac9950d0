use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    NonFinite {
        msg: &'static str,
        value: f32,
    },
    TokenOutOfRange {
        token: u32,
        vocabulary: usize,
    },
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    InvalidInit(String),
    EmptyBatch,
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::NonFinite { msg, value } => write!(f, "{msg} (got {value})"),
            MlErr::TokenOutOfRange { token, vocabulary } => write!(
                f,
                "Token {token} is out of range for a vocabulary of {vocabulary} entries"
            ),
            MlErr::LabelOutOfRange { label, classes } => {
                write!(f, "Label {label} is out of range for {classes} classes")
            }
            MlErr::InvalidInit(detail) => {
                write!(f, "Failed to initialize the parameters: {detail}")
            }
            MlErr::EmptyBatch => f.write_str("Tried to process an empty batch"),
        }
    }
}

impl Error for MlErr {}
