//! Overlap resolution: turns a possibly-overlapping set of hits
//! from multiple detectors into a disjoint, ascending, order-preserving
//! sequence.

use crate::types::Hit;

/// Resolve overlaps, returning hits in ascending `start` with ties broken
/// by descending `end` (longer wins at equal start).
///
/// Sorts by `(start asc, end desc, priority asc)` -- `Vec::sort_by` is a
/// stable sort, so candidates that remain tied on all three keep their
/// original registration order, which is what breaks length ties in the
/// walk below.
pub fn arbitrate(mut hits: Vec<Hit>) -> Vec<Hit> {
    hits.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.priority.cmp(&b.priority))
    });

    let mut accepted: Vec<Hit> = Vec::with_capacity(hits.len());
    for candidate in hits {
        let Some(last) = accepted.last() else {
            accepted.push(candidate);
            continue;
        };

        if !overlaps(last, &candidate) {
            accepted.push(candidate);
            continue;
        }

        if contains(&candidate, last) && candidate.priority < last.priority {
            let idx = accepted.len() - 1;
            accepted[idx] = candidate;
        } else if contains(last, &candidate) {
            // discard: candidate is fully inside the accepted hit
        } else {
            let replace = candidate.priority < last.priority
                || (candidate.priority == last.priority && span_len(&candidate) > span_len(last));
            if replace {
                let idx = accepted.len() - 1;
                accepted[idx] = candidate;
            }
            // else: last keeps its spot -- it registered first on a full tie
        }
    }
    accepted
}

fn overlaps(a: &Hit, b: &Hit) -> bool {
    a.start < b.end && b.start < a.end
}

fn contains(outer: &Hit, inner: &Hit) -> bool {
    outer.start <= inner.start && outer.end >= inner.end
}

fn span_len(h: &Hit) -> usize {
    h.end - h.start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PiiType, Risk};

    fn hit(ty: PiiType, start: usize, end: usize, priority: i32) -> Hit {
        Hit::new(ty, start, end, "x".repeat(end - start), Risk::Low).with_priority(priority)
    }

    #[test]
    fn disjoint_hits_all_survive_in_order() {
        let hits = vec![
            hit(PiiType::email(), 10, 20, 0),
            hit(PiiType::ipv4(), 0, 5, 0),
        ];
        let out = arbitrate(hits);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start, 0);
        assert_eq!(out[1].start, 10);
    }

    #[test]
    fn fully_contained_hit_is_discarded() {
        let hits = vec![
            hit(PiiType::email(), 0, 20, 0),
            hit(PiiType::ipv4(), 5, 10, 0),
        ];
        let out = arbitrate(hits);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start, out[0].end), (0, 20));
    }

    #[test]
    fn partial_overlap_lower_priority_number_wins() {
        let hits = vec![
            hit(PiiType::email(), 0, 10, 5),
            hit(PiiType::ipv4(), 5, 15, 1),
        ];
        let out = arbitrate(hits);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start, out[0].end), (5, 15));
        assert_eq!(out[0].priority, 1);
    }

    #[test]
    fn partial_overlap_priority_tie_keeps_longer() {
        let hits = vec![
            hit(PiiType::email(), 0, 10, 3),
            hit(PiiType::ipv4(), 5, 20, 3),
        ];
        let out = arbitrate(hits);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start, out[0].end), (5, 20));
    }

    #[test]
    fn full_tie_keeps_first_registered() {
        let a = hit(PiiType::email(), 0, 10, 0);
        let b = hit(PiiType::ipv4(), 3, 13, 0);
        let out = arbitrate(vec![a.clone(), b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ty, a.ty);
    }

    #[test]
    fn output_is_strictly_increasing_and_non_overlapping() {
        let hits = vec![
            hit(PiiType::email(), 0, 5, 0),
            hit(PiiType::ipv4(), 5, 10, 0),
            hit(PiiType::mac(), 10, 15, 0),
        ];
        let out = arbitrate(hits);
        assert_eq!(out.len(), 3);
        for w in out.windows(2) {
            assert!(w[0].end <= w[1].start);
        }
    }
}
