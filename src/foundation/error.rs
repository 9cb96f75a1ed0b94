/// Crate-wide result alias.
pub type ShadecastResult<T> = Result<T, ShadecastError>;

/// The error taxonomy: every failure is classed by the phase it occurred
/// in, which determines how the pipeline reacts to it.
#[derive(thiserror::Error, Debug)]
pub enum ShadecastError {
    /// Session setup failure: bad geometry, unknown format, missing device or
    /// unreachable endpoint. Always surfaced before any rendering happens.
    #[error("construction error: {0}")]
    Construct(String),

    /// Write failure while encoding. Fatal to the session; triggers an
    /// orderly cancellation and drain.
    #[error("encode error: {0}")]
    Encode(String),

    /// Transient resource fetch failure. Recovered locally by the provider;
    /// the previous snapshot is retained.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Hardware event loop failure. Terminates that provider's loop; the
    /// session continues on the stale snapshot.
    #[error("device error: {0}")]
    Device(String),

    /// Anything that does not fit the taxonomy.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShadecastError {
    /// A [`ShadecastError::Construct`] from a message.
    pub fn construct(msg: impl Into<String>) -> Self {
        Self::Construct(msg.into())
    }

    /// A [`ShadecastError::Encode`] from a message.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// A [`ShadecastError::Fetch`] from a message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// A [`ShadecastError::Device`] from a message.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}

impl From<std::io::Error> for ShadecastError {
    fn from(e: std::io::Error) -> Self {
        Self::Encode(e.to_string())
    }
}
