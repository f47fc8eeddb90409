use thiserror::Error;

/// Caller misuse detected before any computation or state change.
///
/// Every variant names the offending parameter so the failure can be reported
/// at the call site.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value must be strictly greater than zero
    #[error("Invalid {parameter}: must be greater than 0, got {value}")]
    NonPositive { parameter: &'static str, value: f64 },

    /// Value is NaN or infinite
    #[error("Invalid {parameter}: must be a finite number, got {value}")]
    NotFinite { parameter: &'static str, value: f64 },

    /// Value falls outside the accepted range
    #[error("Invalid {parameter}: {value} is outside {range}")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        range: &'static str,
    },

    /// Rectangle has zero or negative width or height
    #[error("Invalid {parameter}: extent has zero area (width {width}, height {height})")]
    DegenerateExtent {
        parameter: &'static str,
        width: f64,
        height: f64,
    },

    /// A block of tiles is too large to address in pixels
    #[error("Invalid {parameter}: {cells} tiles of {tile_size} px exceed the pixel limit")]
    PixelSizeOverflow {
        parameter: &'static str,
        cells: u64,
        tile_size: u32,
    },

    /// Zoom level list is empty
    #[error("Invalid {parameter}: zoom level list is empty")]
    EmptyZoomLevels { parameter: &'static str },

    /// Zoom level list is not strictly monotonic
    #[error("Invalid {parameter}: zoom levels must be strictly monotonic (index {index})")]
    UnorderedZoomLevels { parameter: &'static str, index: usize },
}

/// Errors from tile grid queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Materializing the cell list would exceed the cap
    #[error(
        "Too many cells: {count} exceeds the limit of {limit}; use the row/column range query instead"
    )]
    TooManyCells { count: u64, limit: u64 },

    /// Invalid grid input
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors at the image codec boundary.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Failed to decode stored tile bytes
    #[error("Failed to decode tile: {message}")]
    Decode { message: String },

    /// Failed to encode a pixel buffer
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// Pixel buffer dimensions do not match its byte length
    #[error("Invalid pixel buffer: {message}")]
    InvalidBuffer { message: String },
}

/// Errors raised by an external tile renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer itself failed
    #[error("Renderer failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The renderer returned a buffer of the wrong size
    #[error("Renderer returned {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

impl RenderError {
    /// Wrap an arbitrary renderer failure.
    pub fn failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        RenderError::Failed(err.into())
    }
}

/// Errors from tile cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Codec failure while encoding a tile for storage
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Grid query failure
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Invalid input
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from drawing a full frame through the cache.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
