pub type CinegraphResult<T> = Result<T, CinegraphError>;

#[derive(thiserror::Error, Debug)]
pub enum CinegraphError {
    #[error("timeline error: {0}")]
    Timeline(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("media error: {0}")]
    Media(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CinegraphError {
    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CinegraphError::timeline("x")
                .to_string()
                .contains("timeline error:")
        );
        assert!(
            CinegraphError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            CinegraphError::graph("x")
                .to_string()
                .contains("graph error:")
        );
        assert!(
            CinegraphError::media("x")
                .to_string()
                .contains("media error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CinegraphError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
