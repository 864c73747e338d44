//! Chunk-boundary-safe streaming transform: redacts text spread
//! across arbitrarily-sized byte chunks without ever splitting a PII span
//! or corrupting binary regions.

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tracing::{trace, warn};

use crate::registry::{Overrides, Registry};

/// Trailing window size, in characters, retained across chunk boundaries.
/// Must exceed the longest expected PII token; the default comfortably
/// fits a separated credit card number.
pub const DEFAULT_WINDOW: usize = 96;

/// A chunk is classified as binary if its first 512 bytes contain a NUL
/// byte or more than 10% control bytes.
const BINARY_SNIFF_LEN: usize = 512;
const BINARY_CONTROL_RATIO: f64 = 0.10;

fn looks_binary(chunk: &[u8]) -> bool {
    let sniff = &chunk[..chunk.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return true;
    }
    if sniff.is_empty() {
        return false;
    }
    let control = sniff
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();
    (control as f64) / (sniff.len() as f64) > BINARY_CONTROL_RATIO
}

/// Synchronous core of the streaming transform. Owns the trailing window
/// buffer and any UTF-8 bytes left over from a split multi-byte sequence.
///
/// One instance per stream; instances are never shared across concurrent
/// streams.
pub struct RedactionTransform<'a> {
    registry: &'a Registry,
    overrides: Option<Overrides>,
    window: usize,
    text_buffer: String,
    pending_bytes: BytesMut,
}

impl<'a> RedactionTransform<'a> {
    pub fn new(registry: &'a Registry, window: usize, overrides: Option<Overrides>) -> Self {
        Self {
            registry,
            overrides,
            window: window.max(1),
            text_buffer: String::new(),
            pending_bytes: BytesMut::new(),
        }
    }

    /// Feed one input chunk, returning zero or more output chunks.
    ///
    /// A binary-classified chunk flushes any buffered text first (as its
    /// own output chunk), then passes through byte-exactly. A text chunk
    /// is decoded incrementally and appended to the window buffer; a
    /// malformed byte sequence found mid-decode is reclassified as binary
    /// and passed through raw rather than aborting the stream. Once the
    /// buffer exceeds `window` characters,
    /// the excess prefix is redacted and emitted, retaining only the
    /// trailing `window` characters for the next call.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if looks_binary(chunk) {
            let mut out = Vec::new();
            if let Some(flushed) = self.flush_text() {
                out.push(flushed);
            }
            if !self.pending_bytes.is_empty() {
                warn!(
                    pending = self.pending_bytes.len(),
                    "dropping undecodable partial utf-8 sequence at binary boundary"
                );
                self.pending_bytes.clear();
            }
            out.push(Bytes::copy_from_slice(chunk));
            return out;
        }

        self.pending_bytes.extend_from_slice(chunk);
        let mut out = self.drain_decodable();

        let total_chars = self.text_buffer.chars().count();
        if total_chars > self.window {
            let cut = total_chars - self.window;
            let byte_cut = char_boundary_at(&self.text_buffer, cut);
            let to_emit = self.text_buffer[..byte_cut].to_string();
            self.text_buffer.replace_range(..byte_cut, "");
            trace!(emitted_chars = cut, "emitting redacted prefix");
            out.push(Bytes::from(self.redact(&to_emit)));
        }
        out
    }

    /// Decode as much of `pending_bytes` as possible into `text_buffer`.
    /// A trailing incomplete sequence (more bytes needed) is left in
    /// `pending_bytes` for the next chunk. A genuinely malformed sequence
    /// mid-buffer flushes the text so far and is emitted as a raw binary
    /// chunk, then decoding resumes on whatever follows it.
    fn drain_decodable(&mut self) -> Vec<Bytes> {
        let mut out = Vec::new();
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(s) => {
                    self.text_buffer.push_str(s);
                    self.pending_bytes.clear();
                    return out;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    let s = std::str::from_utf8(&self.pending_bytes[..valid_len])
                        .expect("prefix up to valid_up_to is valid utf-8");
                    self.text_buffer.push_str(s);
                    match e.error_len() {
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            let _ = self.pending_bytes.split_to(valid_len);
                            return out;
                        }
                        Some(bad_len) => {
                            warn!(
                                at = valid_len,
                                len = bad_len,
                                "malformed utf-8 sequence; reclassifying as binary passthrough"
                            );
                            if let Some(flushed) = self.flush_text() {
                                out.push(flushed);
                            }
                            let _ = self.pending_bytes.split_to(valid_len);
                            let bad = self.pending_bytes.split_to(bad_len);
                            out.push(bad.freeze());
                        }
                    }
                }
            }
        }
    }

    /// Redact and emit the remaining window tail. Call exactly once, at
    /// stream end.
    pub fn flush(&mut self) -> Option<Bytes> {
        if !self.pending_bytes.is_empty() {
            warn!(
                pending = self.pending_bytes.len(),
                "dropping undecodable partial utf-8 sequence at stream end"
            );
            self.pending_bytes.clear();
        }
        self.flush_text()
    }

    fn flush_text(&mut self) -> Option<Bytes> {
        if self.text_buffer.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.text_buffer);
        Some(Bytes::from(self.redact(&tail)))
    }

    fn redact(&self, text: &str) -> String {
        self.registry.redact(text, self.overrides.as_ref())
    }
}

fn char_boundary_at(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

/// Options for [`create_redaction_transform`].
#[derive(Default)]
pub struct TransformOptions {
    pub window: Option<usize>,
    pub policy_overrides: Option<Overrides>,
}

/// Build the async `Stream` adapter: consumes a stream of byte chunks and
/// yields a stream of redacted byte chunks,
/// maintaining the trailing window across chunk boundaries and flushing
/// it once the input stream ends.
pub fn create_redaction_transform<'a, S>(
    registry: &'a Registry,
    input: S,
    options: TransformOptions,
) -> impl Stream<Item = Bytes> + 'a
where
    S: Stream<Item = Bytes> + 'a,
{
    async_stream::stream! {
        let mut transform = RedactionTransform::new(
            registry,
            options.window.unwrap_or(DEFAULT_WINDOW),
            options.policy_overrides,
        );
        futures_util::pin_mut!(input);
        while let Some(chunk) = futures_util::StreamExt::next(&mut input).await {
            for out in transform.process_chunk(&chunk) {
                yield out;
            }
        }
        if let Some(out) = transform.flush() {
            yield out;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use futures_util::StreamExt;

    fn registry() -> Registry {
        Registry::new(Policy::default()).unwrap()
    }

    #[test]
    fn binary_chunk_passes_through_byte_exact() {
        let r = registry();
        let mut t = RedactionTransform::new(&r, DEFAULT_WINDOW, None);
        let mut binary = vec![0u8, 1, 2, 3, 255, 254];
        binary.extend(std::iter::repeat(0u8).take(10));
        let out = t.process_chunk(&binary);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref(), binary.as_slice());
    }

    #[test]
    fn short_pii_split_across_chunks_is_still_detected() {
        let r = registry();
        let mut t = RedactionTransform::new(&r, DEFAULT_WINDOW, None);
        let mut out = Vec::new();
        for chunk in ["Contact john@ex", "ample.com please"] {
            out.extend(t.process_chunk(chunk.as_bytes()));
        }
        if let Some(tail) = t.flush() {
            out.push(tail);
        }
        let joined: Vec<u8> = out.iter().flat_map(|b| b.to_vec()).collect();
        let text = String::from_utf8(joined).unwrap();
        assert_eq!(text, "Contact [REDACTED:email] please");
    }

    #[test]
    fn flush_emits_remaining_window_tail() {
        let r = registry();
        let mut t = RedactionTransform::new(&r, DEFAULT_WINDOW, None);
        t.process_chunk(b"short text, no pii here");
        assert!(t.flush().is_some());
        assert!(t.flush().is_none());
    }

    #[test]
    fn split_multibyte_sequence_across_chunks_decodes_correctly() {
        let r = registry();
        let mut t = RedactionTransform::new(&r, DEFAULT_WINDOW, None);
        let full = "caf\u{e9} au lait".as_bytes().to_vec();
        let (first, second) = full.split_at(4); // splits inside the 2-byte 'é'
        let mut out = Vec::new();
        out.extend(t.process_chunk(first));
        out.extend(t.process_chunk(second));
        if let Some(tail) = t.flush() {
            out.push(tail);
        }
        let joined: Vec<u8> = out.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(String::from_utf8(joined).unwrap(), "caf\u{e9} au lait");
    }

    #[test]
    fn async_adapter_reassembles_equivalent_output() {
        use futures_util::FutureExt;
        let r = registry();
        let input = futures_util::stream::iter(vec![
            Bytes::from_static(b"Email: a@b.com, IP "),
            Bytes::from_static(b"192.168.1.1 done"),
        ]);
        let collected = create_redaction_transform(&r, input, TransformOptions::default())
            .collect::<Vec<Bytes>>()
            .now_or_never()
            .expect("stream never actually suspends: no I/O-bound awaits");
        let joined: Vec<u8> = collected.iter().flat_map(|b| b.to_vec()).collect();
        let streamed = String::from_utf8(joined).unwrap();
        let direct = r.redact("Email: a@b.com, IP 192.168.1.1 done", None);
        assert_eq!(streamed, direct);
    }
}
