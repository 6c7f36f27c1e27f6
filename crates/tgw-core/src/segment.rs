//! Lossless message segmentation and wire framing.
//!
//! `split` breaks a long text into segments of at most `max_len` characters
//! (Unicode scalar values, never bytes) such that concatenating the segments
//! in order reproduces the original byte-for-byte. Packing is line-aware:
//! each line keeps its trailing newline inside the segment payload, so no
//! separator has to be re-invented on reassembly. A single line longer than
//! the limit is force-wrapped by character count.
//!
//! `split_and_encode` adds the transport framing: every segment is
//! base64-encoded (standard alphabet, padded) and prefixed with `GW<i>|`
//! where `i` is the 1-based segment index. `decode` is the inverse for one
//! framed segment.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::{Error, Result};

/// Split `text` into segments of at most `max_len` characters whose
/// in-order concatenation equals `text`. Empty input yields no segments.
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if line_len > max_len {
            // Oversized line: flush what we have, then wrap it by chars.
            // The last partial chunk stays in the buffer so following
            // lines can pack after it.
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let mut chunk = String::new();
            let mut chunk_len = 0usize;
            for ch in line.chars() {
                chunk.push(ch);
                chunk_len += 1;
                if chunk_len == max_len {
                    segments.push(std::mem::take(&mut chunk));
                    chunk_len = 0;
                }
            }
            current = chunk;
            current_len = chunk_len;
            continue;
        }

        if current_len + line_len > max_len {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Split and frame for an encoding transport: `GW<i>|<base64(segment)>`.
pub fn split_and_encode(text: &str, max_len: usize) -> Vec<String> {
    split(text, max_len)
        .iter()
        .enumerate()
        .map(|(i, part)| format!("GW{}|{}", i + 1, BASE64.encode(part.as_bytes())))
        .collect()
}

/// Decode one framed segment back into its 1-based index and payload.
pub fn decode(raw: &str) -> Result<(usize, String)> {
    let rest = raw
        .strip_prefix("GW")
        .ok_or_else(|| Error::MalformedSegment("missing GW prefix".into()))?;
    let (index, payload) = rest
        .split_once('|')
        .ok_or_else(|| Error::MalformedSegment("missing | separator".into()))?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedSegment(format!(
            "non-numeric segment index {index:?}"
        )));
    }
    let index: usize = index
        .parse()
        .map_err(|_| Error::MalformedSegment("segment index out of range".into()))?;
    if index == 0 {
        return Err(Error::MalformedSegment("segment index must be >= 1".into()));
    }
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| Error::MalformedSegment(format!("invalid base64 payload: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::MalformedSegment(format!("payload is not utf-8: {e}")))?;
    Ok((index, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(parts: &[String]) -> String {
        parts.concat()
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(split("", 100).is_empty());
        assert!(split_and_encode("", 100).is_empty());
    }

    #[test]
    fn short_input_is_a_single_segment() {
        assert_eq!(split("hello\nworld", 100), vec!["hello\nworld"]);
    }

    #[test]
    fn packing_respects_limit_and_reassembles() {
        let text = "alpha\nbeta\ngamma\ndelta\n";
        let parts = split(text, 12);
        for p in &parts {
            assert!(p.chars().count() <= 12, "segment too long: {p:?}");
        }
        assert_eq!(reassemble(&parts), text);
        // Lines break at newline boundaries when they fit.
        assert_eq!(parts[0], "alpha\nbeta\n");
    }

    #[test]
    fn oversized_line_is_force_wrapped() {
        let text = format!("{}\ntail", "x".repeat(25));
        let parts = split(&text, 10);
        for p in &parts {
            assert!(p.chars().count() <= 10);
        }
        assert_eq!(reassemble(&parts), text);
        assert_eq!(parts[0], "x".repeat(10));
        // The wrap remainder packs together with the following line.
        assert_eq!(parts.last().map(String::as_str), Some("xxxxx\ntail"));
    }

    #[test]
    fn limit_counts_chars_not_bytes() {
        // 6 chars, 18 bytes.
        let text = "ğüşiöç".repeat(100);
        let parts = split(&text, 7);
        for p in &parts {
            assert!(p.chars().count() <= 7);
        }
        assert_eq!(reassemble(&parts), text);
    }

    #[test]
    fn trailing_newlines_survive() {
        let text = "a\n\n\nb\n\n";
        let parts = split(text, 3);
        assert_eq!(reassemble(&parts), text);
    }

    #[test]
    fn encode_frames_with_one_based_indexes() {
        // 50 lines of 24 chars: 1200 chars against a 500 limit.
        let text = "line one is fairly long\n".repeat(50);
        assert_eq!(text.chars().count(), 1200);
        let framed = split_and_encode(&text, 500);
        assert_eq!(framed.len(), 3);
        assert!(framed[0].starts_with("GW1|"));
        assert!(framed[1].starts_with("GW2|"));
        assert!(framed[2].starts_with("GW3|"));

        let mut decoded = String::new();
        for (i, raw) in framed.iter().enumerate() {
            let (idx, payload) = decode(raw).unwrap();
            assert_eq!(idx, i + 1);
            decoded.push_str(&payload);
        }
        assert_eq!(decoded, text);
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        for raw in ["aGVsbG8=", "GW|aGVsbG8=", "GWx|aGVsbG8=", "GW0|aGVsbG8=", "GW1|!!!"] {
            match decode(raw) {
                Err(Error::MalformedSegment(_)) => {}
                other => panic!("expected MalformedSegment for {raw:?}, got {other:?}"),
            }
        }
    }
}
