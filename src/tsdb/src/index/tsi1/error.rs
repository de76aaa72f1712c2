pub type Result<T> = std::result::Result<T, MeasurementBlockError>;

#[derive(thiserror::Error, Debug)]
pub enum MeasurementBlockError {
    #[error("unsupported measurement block version: {0}")]
    UnsupportedVersion(u16),

    #[error("measurement block size mismatch: trailer says {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("measurement block too short: {0} bytes")]
    ShortBuffer(usize),

    #[error("corrupt measurement block: {0}")]
    Corrupt(String),
}
