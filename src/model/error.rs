//! The error taxonomy of the query pipeline.
//!
//! Errors never escape the querier tree through `Result`: they travel inside
//! series sets and label results so that merge and failure strategies can
//! reshape them before anything reaches the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// DNS/TCP/TLS/timeout failure talking to a backend.
    #[error("error contacting remote: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered outside the 200-299 range.
    #[error("server answered with non-succesful status code {0}")]
    HttpStatus(u16),

    /// Backend envelope carried `status: "error"`.
    #[error("remote reported failure: {0}")]
    Reported(String),

    /// Malformed envelope or body.
    #[error("decoding remote response: {0}")]
    Decode(String),

    /// `string`, `scalar` or `none` result types are not supported.
    #[error("result type {0} is not supported")]
    UnsupportedResultType(String),

    /// Several child errors joined into one, preserving every message.
    #[error("{}", join_messages(.0))]
    Multiple(Vec<QueryError>),
}

impl QueryError {
    /// Join child errors the way the merge layer needs it: none stays none,
    /// one passes through, several become `Multiple`.
    pub fn join(mut errors: Vec<QueryError>) -> Option<QueryError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(QueryError::Multiple(errors)),
        }
    }
}

fn join_messages(errors: &[QueryError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_matches_the_wire_contract() {
        let err = QueryError::HttpStatus(500);
        assert_eq!(
            err.to_string(),
            "server answered with non-succesful status code 500"
        );
    }

    #[test]
    fn join_of_nothing_is_none() {
        assert!(QueryError::join(vec![]).is_none());
    }

    #[test]
    fn join_of_one_is_the_error_itself() {
        let joined = QueryError::join(vec![QueryError::HttpStatus(502)]).unwrap();
        assert!(matches!(joined, QueryError::HttpStatus(502)));
    }

    #[test]
    fn join_of_many_keeps_every_message() {
        let joined = QueryError::join(vec![
            QueryError::HttpStatus(500),
            QueryError::Reported("boom".into()),
        ])
        .unwrap();

        let message = joined.to_string();
        assert!(message.contains("status code 500"));
        assert!(message.contains("boom"));
    }
}
