//! Encode and decode configuration

/// Default limit on value nesting for both directions.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Configuration for an encode call.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Produce canonical output: sorted mappings and multisets, no
    /// identity-bearing kinds.
    pub canonical: bool,

    /// Maximum value nesting depth
    pub max_depth: usize,

    /// Log every written entry to the `freezer::trace` target
    pub trace: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            canonical: false,
            max_depth: DEFAULT_MAX_DEPTH,
            trace: false,
        }
    }
}

impl EncodeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for canonical (fingerprint) output.
    pub fn canonical() -> Self {
        Self {
            canonical: true,
            ..Default::default()
        }
    }

    /// Set a custom nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enable entry logging.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Configuration for a decode call.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Maximum value nesting depth
    pub max_depth: usize,

    /// Treat every codec failure as fatal, even outside program bodies,
    /// and reject streams that leave programs unfinished.
    pub strict: bool,

    /// Route input without the magic prefix to the legacy flat-tag decoder
    pub allow_legacy: bool,

    /// Log every read entry to the `freezer::trace` target
    pub trace: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict: false,
            allow_legacy: true,
            trace: false,
        }
    }
}

impl DecodeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict decoding.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Set a custom nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Allow or refuse the legacy flat-tag format.
    pub fn with_legacy(mut self, allow: bool) -> Self {
        self.allow_legacy = allow;
        self
    }

    /// Enable entry logging.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
