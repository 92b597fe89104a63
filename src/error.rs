// error.rs - Library error type

use thiserror::Error;

/// Errors raised by the correlation engine and its data sources.
///
/// Only setup failures surface here. Sparse data inside a scan is folded into
/// the statistics (NaN mean, N = 0) and never becomes an error.
#[derive(Error, Debug)]
pub enum McorrError {
    #[error("{} not in alphabet {}", describe_unknown(.first, .second), String::from_utf8_lossy(.alphabet))]
    UnknownSymbol {
        first: Option<u8>,
        second: Option<u8>,
        alphabet: Vec<u8>,
    },

    #[error("different alphabets {}, {}", String::from_utf8_lossy(.0), String::from_utf8_lossy(.1))]
    AlphabetMismatch(Vec<u8>, Vec<u8>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed codon store: {0}")]
    MalformedStore(String),

    #[error("malformed alignment: {0}")]
    MalformedAlignment(String),

    #[error("alignment has no sequences: {0}")]
    EmptyAlignment(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scan thread panicked: {0}")]
    ThreadPanicked(String),
}

fn describe_unknown(first: &Option<u8>, second: &Option<u8>) -> String {
    match (*first, *second) {
        (Some(a), Some(b)) => format!("{} and {} are", a as char, b as char),
        (Some(a), None) | (None, Some(a)) => format!("{} is", a as char),
        (None, None) => "symbol is".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, McorrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_symbol_message() {
        let err = McorrError::UnknownSymbol {
            first: Some(b'N'),
            second: None,
            alphabet: b"ATGC".to_vec(),
        };
        assert_eq!(err.to_string(), "N is not in alphabet ATGC");

        let both = McorrError::UnknownSymbol {
            first: Some(b'-'),
            second: Some(b'N'),
            alphabet: b"ATGC".to_vec(),
        };
        assert_eq!(both.to_string(), "- and N are not in alphabet ATGC");
    }
}
