//! Piecewise aggregation of overlapping ranked intervals.

use std::cmp::Ordering;

use serde::Serialize;

use super::interval::{Interval, Spanned};

/// A maximal span over which the set of covering inputs is constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment<T, R> {
    pub start: T,
    pub end: T,
    /// Maximum rank over the covering inputs.
    pub rank: R,
    /// Indices into the input slice, ascending.
    pub covering: Vec<usize>,
    /// Covering input that supplies display attributes for this segment.
    pub representative: usize,
    pub ongoing: bool,
}

/// Partition the timeline into constant-coverage segments.
///
/// Breakpoints are every start and end in `items`. Open items extend
/// through the latest breakpoint for partitioning purposes only. Each
/// emitted segment reports the maximum `rank` of the items covering it.
/// Touching pairs with the same covering set form one segment.
pub fn aggregate_overlaps<T, E, R, F>(items: &[E], rank: F) -> Vec<Segment<T, R>>
where
    T: Ord + Copy,
    E: Spanned<T>,
    R: Ord + Copy,
    F: Fn(&E) -> R,
{
    let mut points: Vec<T> = items
        .iter()
        .flat_map(|item| std::iter::once(item.start()).chain(item.end()))
        .collect();
    points.sort();
    points.dedup();

    let Some(&horizon) = points.last() else {
        return Vec::new();
    };

    let mut segments: Vec<Segment<T, R>> = Vec::new();
    for pair in points.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let covering: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                let span = Interval {
                    start: item.start(),
                    end: item.end(),
                };
                span.contains(lo) && span.contains(hi)
            })
            .map(|(idx, _)| idx)
            .collect();

        let ongoing = hi == horizon && covering.iter().any(|&idx| items[idx].is_ongoing());
        // Zero-length items add breakpoints without changing coverage.
        if let Some(previous) = segments
            .last_mut()
            .filter(|previous| previous.end == lo && previous.covering == covering)
        {
            previous.end = hi;
            previous.ongoing = ongoing;
            continue;
        }

        let Some(best) = covering.iter().map(|&idx| rank(&items[idx])).max() else {
            continue;
        };
        let Some(representative) = covering
            .iter()
            .copied()
            .filter(|&idx| rank(&items[idx]) == best)
            .max_by(|&a, &b| {
                later_end(items[a].end(), items[b].end())
                    .then_with(|| items[a].start().cmp(&items[b].start()))
                    .then_with(|| b.cmp(&a))
            })
        else {
            continue;
        };
        segments.push(Segment {
            start: lo,
            end: hi,
            rank: best,
            covering,
            representative,
            ongoing,
        });
    }
    segments
}

/// Orders ends so that an absent end ranks above every present one.
fn later_end<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}
