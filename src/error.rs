/// Result alias that carries the codec's [`FvzError`] type.
pub type Result<T> = std::result::Result<T, FvzError>;

/// Error type shared by the encoder, decoder and container codec.
#[derive(Debug, thiserror::Error)]
pub enum FvzError {
    /// Bad magic, short header, or a version other than 2.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The Zstd bit is set but no decompressor capability was injected.
    #[error("payload is Zstd-compressed but no decompressor was provided")]
    MissingDecompressor,

    /// The injected decompressor raised; the underlying reason is preserved.
    #[error("decompression failed: {0}")]
    DecompressionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The payload does not hold the number of bytes the header promises.
    #[error("payload size mismatch: expected {expected} bytes, found {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    /// Underlying byte source failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Encoder operation invoked out of order.
    #[error("encoder precondition failed: {0}")]
    EncoderPrecondition(&'static str),

    /// Encoder configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The audio provider could not produce PCM samples.
    #[error("audio decode failed: {0}")]
    AudioDecode(String),
}
