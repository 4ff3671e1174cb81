//! Re-entrancy guard for nested decodes

use tracing::debug;

use super::decode_frame;
use crate::codec::{codec_key, Codec};
use crate::context::DecodeOptions;
use crate::error::{FreezerError, Result};
use crate::trace::Trace;
use crate::value::Value;

#[derive(Debug)]
struct Frame {
    input: Vec<u8>,
    codec: usize,
    root: Option<Value>,
}

/// The stack of decodes in flight.
///
/// A session is handed to [`Codec::decode_object`] so a codec can decode
/// further streams while an object is being restored. Decoding the same
/// input with the same codec again from inside such a hook does not
/// recurse: it yields the value that the outer decode is building.
/// Inputs match by content, so a copy of the outer bytes counts as the
/// same input.
#[derive(Debug, Default)]
pub struct DecodeSession {
    options: DecodeOptions,
    frames: Vec<Frame>,
}

impl DecodeSession {
    /// Session with no decodes in flight.
    pub fn new(options: DecodeOptions) -> Self {
        DecodeSession {
            options,
            frames: Vec::new(),
        }
    }

    /// Options every decode in this session uses.
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Number of decodes in flight.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Decode `bytes`, or return the root of the in-flight decode of the
    /// same input and codec.
    pub fn decode(&mut self, bytes: &[u8], codec: Option<&dyn Codec>) -> Result<Value> {
        self.enter(bytes, codec, false).map(|(value, _)| value)
    }

    pub(crate) fn enter(
        &mut self,
        bytes: &[u8],
        codec: Option<&dyn Codec>,
        collect: bool,
    ) -> Result<(Value, Option<Trace>)> {
        let key = codec_key(codec);
        if let Some(frame) = self
            .frames
            .iter()
            .rev()
            .find(|f| f.codec == key && f.input.as_slice() == bytes)
        {
            debug!(depth = self.frames.len(), "nested decode of an in-flight input");
            return frame
                .root
                .clone()
                .map(|root| (root, None))
                .ok_or_else(|| FreezerError::graph("Nested decode before the root value exists"));
        }

        self.frames.push(Frame {
            input: bytes.to_vec(),
            codec: key,
            root: None,
        });
        let result = decode_frame(bytes, codec, self, collect);
        self.frames.pop();
        result
    }

    /// Record the value at the first sequence id of the innermost decode.
    pub(crate) fn set_root(&mut self, root: &Value) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.root.is_none() {
                frame.root = Some(root.clone());
            }
        }
    }
}
