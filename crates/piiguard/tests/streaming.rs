//! Round-trip laws: chunking a UTF-8 input any way you like and
//! feeding it through the streaming transform must reassemble to exactly
//! what `redact` produces on the whole string at once; a byte sequence
//! classified as binary at every boundary must pass through byte-exact.

use bytes::Bytes;
use proptest::prelude::*;
use piiguard::{Policy, Registry};

fn registry() -> Registry {
    Registry::new(Policy::default()).unwrap()
}

fn run_transform(registry: &Registry, chunks: &[&str]) -> String {
    let mut transform = piiguard::RedactionTransform::new(registry, piiguard::DEFAULT_WINDOW, None);
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(transform.process_chunk(chunk.as_bytes()));
    }
    if let Some(tail) = transform.flush() {
        out.push(tail);
    }
    let bytes: Vec<u8> = out.iter().flat_map(|b: &Bytes| b.to_vec()).collect();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn single_chunk_matches_direct_redact() {
    let registry = registry();
    let text = "Email john@example.com, card 4242-4242-4242-4242, ip 10.0.0.1";
    let direct = registry.redact(text, None);
    let streamed = run_transform(&registry, &[text]);
    assert_eq!(streamed, direct);
}

#[test]
fn byte_by_byte_chunking_matches_direct_redact() {
    let registry = registry();
    let text = "Reach jane@example.org at +14155552671 please";
    let direct = registry.redact(text, None);
    let chunks: Vec<String> = text.chars().map(|c| c.to_string()).collect();
    let refs: Vec<&str> = chunks.iter().map(|s| s.as_str()).collect();
    let streamed = run_transform(&registry, &refs);
    assert_eq!(streamed, direct);
}

proptest! {
    /// Arbitrary chunk boundaries over plain-ASCII text never change the
    /// final redacted result, as long as no individual chunk looks binary.
    #[test]
    fn arbitrary_chunking_is_equivalent_to_direct_redact(
        text in "[a-zA-Z0-9@. +-]{0,120}",
        cut_points in prop::collection::vec(0usize..120, 0..5),
    ) {
        let registry = registry();
        let mut points: Vec<usize> = cut_points
            .into_iter()
            .map(|p| p.min(text.len()))
            .collect();
        points.sort_unstable();
        points.dedup();

        let mut chunks = Vec::new();
        let mut prev = 0;
        for p in points {
            if p > prev {
                chunks.push(&text[prev..p]);
                prev = p;
            }
        }
        if prev < text.len() {
            chunks.push(&text[prev..]);
        }

        let direct = registry.redact(&text, None);
        let streamed = run_transform(&registry, &chunks);
        prop_assert_eq!(streamed, direct);
    }
}

#[test]
fn non_utf8_byte_sequence_is_never_corrupted_or_dropped() {
    let registry = registry();
    let mut transform = piiguard::RedactionTransform::new(&registry, piiguard::DEFAULT_WINDOW, None);
    let chunk_a: Vec<u8> = std::iter::once(0u8).chain(1..=20).collect();
    let chunk_b: Vec<u8> = (200..=255).collect();
    let mut out = Vec::new();
    out.extend(transform.process_chunk(&chunk_a));
    out.extend(transform.process_chunk(&chunk_b));
    if let Some(tail) = transform.flush() {
        out.push(tail);
    }
    let joined: Vec<u8> = out.iter().flat_map(|b| b.to_vec()).collect();
    let mut expected = chunk_a;
    expected.extend(chunk_b);
    assert_eq!(joined, expected);
}
