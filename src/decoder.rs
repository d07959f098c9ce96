//! Incremental UTF-8 decoding of a chunked byte stream.

use std::str;

const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

/// Stateful decoder that holds back a trailing partial UTF-8 sequence until
/// the next chunk completes it.
#[derive(Debug, Default, Clone)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk. Invalid sequences become U+FFFD; an incomplete
    /// sequence at the end of the chunk is carried into the next call.
    pub fn decode_chunk(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. Leftover bytes decode to a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode_chunk(b"Hi there"), "Hi there");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn split_multibyte_reassembles() {
        let whole = "café ☕ 🦀".as_bytes();
        for split in 0..=whole.len() {
            let mut decoder = StreamDecoder::new();
            let mut text = decoder.decode_chunk(&whole[..split]);
            text.push_str(&decoder.decode_chunk(&whole[split..]));
            text.push_str(&decoder.finish());
            assert_eq!(text, "café ☕ 🦀", "split at {split}");
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut decoder = StreamDecoder::new();
        let mut text = String::new();
        for byte in "🦀".as_bytes() {
            text.push_str(&decoder.decode_chunk(std::slice::from_ref(byte)));
        }
        assert_eq!(text, "🦀");
        assert_eq!(decoder.pending.len(), 0);
    }

    #[test]
    fn partial_sequence_is_held_back() {
        let crab = "🦀".as_bytes();
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode_chunk(&crab[..2]), "");
        assert_eq!(decoder.pending.len(), 2);
        assert_eq!(decoder.decode_chunk(&crab[2..]), "🦀");
    }

    #[test]
    fn truncated_tail_flushes_as_replacement() {
        let mut decoder = StreamDecoder::new();
        let euro = "€".as_bytes();
        assert_eq!(decoder.decode_chunk(&[b'a', euro[0], euro[1]]), "a");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode_chunk(b"a\xFFb\xC3("), "a\u{FFFD}b\u{FFFD}(");
        assert_eq!(decoder.pending.len(), 0);
    }
}
