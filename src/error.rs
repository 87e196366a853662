use thiserror::Error;

/// Stable error kinds for marketplace and verification operations.
///
/// `ExternalQuery` is always retryable and must never be collapsed into a
/// "not owned" or "not found" outcome by callers.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("external query failed: {0}")]
    ExternalQuery(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MarketError {
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::Validation(_) => "validation",
            MarketError::NotFound(_) => "not_found",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::Conflict(_) => "conflict",
            MarketError::ExternalQuery(_) => "external_query",
            MarketError::Internal(_) => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            MarketError::Validation(_) => 400,
            MarketError::NotFound(_) => 404,
            MarketError::Forbidden(_) => 403,
            MarketError::Conflict(_) => 409,
            MarketError::ExternalQuery(_) => 502,
            MarketError::Internal(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::ExternalQuery(_))
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        MarketError::Internal(anyhow::anyhow!("database error: {}", e))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(MarketError::Validation("x".into()).http_status(), 400);
        assert_eq!(MarketError::NotFound("x".into()).http_status(), 404);
        assert_eq!(MarketError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(MarketError::Conflict("x".into()).http_status(), 409);
        assert_eq!(MarketError::ExternalQuery("x".into()).http_status(), 502);
    }

    #[test]
    fn test_only_external_query_is_retryable() {
        assert!(MarketError::ExternalQuery("timeout".into()).is_retryable());
        assert!(!MarketError::Conflict("sold".into()).is_retryable());
        assert!(!MarketError::NotFound("gone".into()).is_retryable());
    }
}
