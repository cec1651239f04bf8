//! Incremental UTF-8 decoding for network body chunks.
//!
//! Network chunks split multi-byte sequences at arbitrary offsets. The decoder
//! keeps the incomplete suffix of one chunk and completes it with the prefix of
//! the next. Invalid sequences decode to U+FFFD so decoding always advances.

/// Streaming UTF-8 decoder with a carried incomplete suffix.
#[derive(Clone, Debug, Default)]
pub struct Utf8ChunkDecoder {
    // Incomplete sequence from the previous chunk, at most 3 bytes.
    carry: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back waiting for the rest of their sequence.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Decode `bytes`, appending complete characters to `out`.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        let mut rest = bytes;

        while !self.carry.is_empty() && !rest.is_empty() {
            let want = sequence_len(self.carry[0]);
            if want == 0 {
                out.push(char::REPLACEMENT_CHARACTER);
                self.carry.clear();
                break;
            }
            let missing = want.saturating_sub(self.carry.len());
            if rest.len() < missing {
                self.carry.extend_from_slice(rest);
                return;
            }

            let mut joined = [0u8; 4];
            let held = self.carry.len();
            joined[..held].copy_from_slice(&self.carry);
            joined[held..held + missing].copy_from_slice(&rest[..missing]);
            self.carry.clear();
            rest = &rest[missing..];
            decode_lossy(&joined[..held + missing], out, &mut self.carry);
        }

        if !rest.is_empty() {
            decode_lossy(rest, out, &mut self.carry);
        }
    }

    /// Convenience wrapper returning the decoded text of one chunk.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        self.decode_into(bytes, &mut out);
        out
    }

    /// End of stream: a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        tail
    }
}

fn sequence_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

fn decode_lossy(mut bytes: &[u8], out: &mut String, carry: &mut Vec<u8>) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return;
            }
            Err(err) => {
                let (valid, after) = bytes.split_at(err.valid_up_to());
                if let Ok(valid) = std::str::from_utf8(valid) {
                    out.push_str(valid);
                }
                match err.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        bytes = &after[bad..];
                    }
                    None => {
                        carry.extend_from_slice(after);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Utf8ChunkDecoder;

    #[test]
    fn two_byte_sequence_split_across_chunks() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[0xC3]), "");
        assert_eq!(decoder.pending(), &[0xC3]);
        assert_eq!(decoder.decode(&[0x97]), "\u{D7}");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn carried_prefix_completes_and_rest_of_chunk_decodes() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[0xF0, 0x9F]), "");
        assert_eq!(decoder.decode(&[0x98, 0x80, b'<', b'p', b'>']), "\u{1F600}<p>");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn trailing_partial_sequence_is_carried_again() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[0xE2]), "");
        assert_eq!(decoder.decode(&[0x82, 0xAC, 0xE2]), "\u{20AC}");
        assert_eq!(decoder.pending(), &[0xE2]);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[0xFF, b'a']), "\u{FFFD}a");
    }

    #[test]
    fn finish_flushes_dangling_suffix() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(decoder.pending().is_empty());
        assert_eq!(decoder.finish(), "");
    }
}
