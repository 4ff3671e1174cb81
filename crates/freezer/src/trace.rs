//! Human-readable listings of encoded streams.
//!
//! When tracing is on, the encoder and decoder note one line per entry
//! they write or read, with its byte offset and nesting depth. The
//! listing is the quickest way to see why two encodings differ.

use std::fmt;

use tracing::trace;

use crate::codec::Codec;
use crate::context::DecodeOptions;
use crate::decoder::Decoder;
use crate::error::Result;

/// One listed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    /// Byte offset of the entry in the stream
    pub offset: usize,
    /// Value nesting depth
    pub depth: usize,
    /// Entry description, such as `.integer 5`
    pub text: String,
}

/// An entry-by-entry listing of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    lines: Vec<TraceLine>,
}

impl Trace {
    /// Empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listed entries in stream order.
    pub fn lines(&self) -> &[TraceLine] {
        &self.lines
    }

    /// Entry descriptions without offsets.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }

    /// Number of listed entries.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when nothing was listed.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(
                f,
                "{:6}  {}{}",
                line.offset,
                "  ".repeat(line.depth),
                line.text
            )?;
        }
        Ok(())
    }
}

/// Collects listing lines and mirrors them to the `freezer::trace`
/// log target.
#[derive(Debug, Default)]
pub(crate) struct Tracer {
    listing: Option<Trace>,
    log: bool,
}

impl Tracer {
    pub(crate) fn new(collect: bool, log: bool) -> Self {
        Tracer {
            listing: collect.then(Trace::new),
            log,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.log || self.listing.is_some()
    }

    pub(crate) fn note(&mut self, offset: usize, depth: usize, text: impl FnOnce() -> String) {
        if !self.is_active() {
            return;
        }
        let text = text();
        if self.log {
            trace!(target: "freezer::trace", offset, depth, "{}", text);
        }
        if let Some(listing) = &mut self.listing {
            listing.lines.push(TraceLine {
                offset,
                depth,
                text,
            });
        }
    }

    pub(crate) fn finish(self) -> Option<Trace> {
        self.listing
    }
}

/// Decode `bytes` and return the listing of every entry read.
pub fn disassemble(bytes: &[u8], codec: Option<&dyn Codec>) -> Result<Trace> {
    let decoder = Decoder::with_options(DecodeOptions::new().with_legacy(false));
    let (_, listing) = decoder.decode_listing(bytes, codec)?;
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inactive_tracer_skips_formatting() {
        let mut tracer = Tracer::new(false, false);
        tracer.note(0, 0, || unreachable!());
        assert!(tracer.finish().is_none());
    }

    #[test]
    fn test_display_indents_by_depth() {
        let mut tracer = Tracer::new(true, false);
        tracer.note(4, 0, || ".entry array, 1".to_string());
        tracer.note(5, 1, || ".integer 5".to_string());
        let listing = tracer.finish().unwrap();
        assert_eq!(listing.texts(), vec![".entry array, 1", ".integer 5"]);
        assert_eq!(
            listing.to_string(),
            "     4  .entry array, 1\n     5    .integer 5\n"
        );
    }
}
