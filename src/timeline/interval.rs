//! Intervals over a totally ordered time axis.

use serde::Serialize;

/// A `[start, end]` span; an absent end means open or ongoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval<T> {
    pub start: T,
    pub end: Option<T>,
}

impl<T: Ord + Copy> Interval<T> {
    /// Build an interval, rejecting `end < start`.
    pub fn new(start: T, end: Option<T>) -> Option<Self> {
        match end {
            Some(end) if end < start => None,
            _ => Some(Self { start, end }),
        }
    }

    /// Closed interval with both bounds present.
    pub fn closed(start: T, end: T) -> Option<Self> {
        Self::new(start, Some(end))
    }

    /// True when `point` lies within the span; open spans extend forever.
    pub fn contains(&self, point: T) -> bool {
        self.start <= point && self.end.map_or(true, |end| point <= end)
    }
}

/// Anything that occupies a span on the time axis.
///
/// `is_ongoing` defaults to "no end", but items whose end was imputed
/// from a cutoff keep reporting ongoing while carrying a concrete end.
pub trait Spanned<T> {
    fn start(&self) -> T;
    fn end(&self) -> Option<T>;
    fn is_ongoing(&self) -> bool {
        self.end().is_none()
    }
}

impl<T: Copy> Spanned<T> for Interval<T> {
    fn start(&self) -> T {
        self.start
    }

    fn end(&self) -> Option<T> {
        self.end
    }
}

impl<T: Copy, S: Spanned<T>> Spanned<T> for &S {
    fn start(&self) -> T {
        (**self).start()
    }

    fn end(&self) -> Option<T> {
        (**self).end()
    }

    fn is_ongoing(&self) -> bool {
        (**self).is_ongoing()
    }
}

/// Latest of two optional bounds, treating `None` as unbounded.
pub(crate) fn max_end<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}
