//! 错误处理

#[allow(unused)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // 标准库错误处理
    #[error("io error, {0}")]
    Io(std::io::Error),
    #[error("system time error, {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
    // std::sync::poison::rwlock
    #[error("lock error, {0}")]
    LockError(String),
    #[error("strum error, {0}")]
    ParseEnumString(String),

    #[error("py error, {0}")]
    PyErr(#[from] pyo3::PyErr),
    #[error("py downcast error, {0}")]
    PyDowncastError(String),

    #[error("tensor error, {0}")]
    TensorErr(#[from] candle_core::Error),
    #[error("invalid tensor shape, {0}")]
    InvalidTensorShape(String),

    #[error("invalid directory, {0}")]
    InvalidDirectory(String),
    #[error("invalid parameter, {0}")]
    InvalidParameter(String),
    #[error("file not found, {0}")]
    FileNotFound(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<strum::ParseError> for Error {
    fn from(e: strum::ParseError) -> Self {
        Error::ParseEnumString(e.to_string())
    }
}
