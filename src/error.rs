pub type MovieResult<T> = Result<T, MovieError>;

#[derive(thiserror::Error, Debug)]
pub enum MovieError {
    /// Evaluating a property transitively required its own value within the
    /// same frame context.
    #[error("property '{name}' contains a circular reference")]
    CircularReference { name: String },

    /// A context pop with no matching push. Always a composition bug.
    #[error("evaluation context stack is empty")]
    StackEmpty,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MovieError {
    pub fn circular(name: impl Into<String>) -> Self {
        Self::CircularReference { name: name.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_property_name() {
        let err = MovieError::circular("opacity");
        assert_eq!(
            err.to_string(),
            "property 'opacity' contains a circular reference"
        );
    }

    #[test]
    fn io_preserves_source() {
        let err = MovieError::from(std::io::Error::other("sink closed"));
        assert!(err.to_string().contains("sink closed"));
    }
}
