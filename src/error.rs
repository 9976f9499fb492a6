use crate::diagram::ElementKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown alignment '{0}'")]
    UnknownAlignment(String),
    #[error("{kind} '{id}' does not exist")]
    MissingElement { kind: ElementKind, id: String },
    #[error("diagram '{0}' is not open in this session")]
    UnknownDiagram(String),
    #[error("invalid diagram: {message}")]
    InvalidDiagram { message: String },
    #[error("diagram JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn missing(kind: ElementKind, id: impl Into<String>) -> Self {
        Error::MissingElement {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidDiagram {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
