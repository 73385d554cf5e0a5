//! Contiguous-run bucketing of chronologically ordered events.

use serde::Serialize;

use super::interval::{max_end, Interval, Spanned};

/// Which earlier buckets a new event may join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// Only the most recently opened bucket is a candidate.
    AdjacentOnly,
    /// Any bucket is a candidate, searched from the most recent backwards.
    AnyEqual,
}

/// A run of equivalent events merged into one span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<T, E> {
    pub start: T,
    /// `None` while any member is open, unless closed at a cutoff.
    pub end: Option<T>,
    pub ongoing: bool,
    /// Set when `end` was substituted from a cutoff rather than observed.
    pub imputed_end: bool,
    pub members: Vec<E>,
}

impl<T: Ord + Copy, E: Spanned<T>> Bucket<T, E> {
    fn seed(event: E) -> Self {
        Self {
            start: event.start(),
            end: event.end(),
            ongoing: event.is_ongoing(),
            imputed_end: false,
            members: vec![event],
        }
    }

    fn admits<F>(&self, event: &E, same: &F) -> bool
    where
        F: Fn(&E, &E) -> bool,
    {
        let reachable = self.end.map_or(true, |end| event.start() <= end);
        reachable && self.members.last().map_or(false, |last| same(last, event))
    }

    fn absorb(&mut self, event: E) {
        self.start = self.start.min(event.start());
        self.end = max_end(self.end, event.end());
        self.ongoing |= event.is_ongoing();
        self.members.push(event);
    }
}

impl<T: Ord + Copy, E> Bucket<T, E> {
    /// Substitute `cutoff` as the effective end of an open bucket.
    ///
    /// The bucket stays `ongoing` so renderers can tell "still happening"
    /// apart from "ends exactly here".
    pub fn close_at(mut self, cutoff: T) -> Self {
        if self.end.is_none() {
            self.end = Some(cutoff.max(self.start));
            self.imputed_end = true;
        }
        self
    }

    pub fn interval(&self) -> Interval<T> {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

impl<T: Copy, E> Spanned<T> for Bucket<T, E> {
    fn start(&self) -> T {
        self.start
    }

    fn end(&self) -> Option<T> {
        self.end
    }

    fn is_ongoing(&self) -> bool {
        self.ongoing
    }
}

/// Group chronologically sorted events into contiguous buckets.
///
/// An event joins a candidate bucket when `same(last_member, event)` holds
/// and its start does not exceed the bucket's current end (open buckets
/// accept everything). Buckets come back in the order they were opened.
pub fn bucket_events<T, E, I, F>(events: I, same: F, mode: MergeMode) -> Vec<Bucket<T, E>>
where
    T: Ord + Copy,
    E: Spanned<T>,
    I: IntoIterator<Item = E>,
    F: Fn(&E, &E) -> bool,
{
    let mut buckets: Vec<Bucket<T, E>> = Vec::new();
    for event in events {
        let target = match mode {
            MergeMode::AdjacentOnly => buckets
                .last()
                .filter(|bucket| bucket.admits(&event, &same))
                .map(|_| buckets.len() - 1),
            MergeMode::AnyEqual => buckets
                .iter()
                .rposition(|bucket| bucket.admits(&event, &same)),
        };
        match target {
            Some(idx) => buckets[idx].absorb(event),
            None => buckets.push(Bucket::seed(event)),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ev {
        key: char,
        start: i64,
        end: Option<i64>,
    }

    impl Spanned<i64> for Ev {
        fn start(&self) -> i64 {
            self.start
        }
        fn end(&self) -> Option<i64> {
            self.end
        }
    }

    fn ev(key: char, start: i64, end: Option<i64>) -> Ev {
        Ev { key, start, end }
    }

    fn same_key(a: &Ev, b: &Ev) -> bool {
        a.key == b.key
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let buckets = bucket_events(Vec::<Ev>::new(), same_key, MergeMode::AdjacentOnly);
        assert!(buckets.is_empty());
    }

    #[test]
    fn overlapping_equal_events_merge() {
        let events = vec![ev('a', 0, Some(5)), ev('a', 5, Some(9)), ev('a', 12, Some(14))];
        let buckets = bucket_events(events, same_key, MergeMode::AdjacentOnly);
        assert_eq!(buckets.len(), 2);
        assert_eq!((buckets[0].start, buckets[0].end), (0, Some(9)));
        assert_eq!(buckets[0].members.len(), 2);
        assert_eq!((buckets[1].start, buckets[1].end), (12, Some(14)));
    }

    #[test]
    fn open_member_makes_bucket_ongoing_and_absorbs_later_events() {
        let events = vec![ev('a', 0, None), ev('a', 30, Some(40))];
        let buckets = bucket_events(events, same_key, MergeMode::AdjacentOnly);
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].ongoing);
        assert_eq!(buckets[0].end, None);
    }

    #[test]
    fn adjacent_only_breaks_on_interleaved_keys() {
        let events = vec![ev('a', 0, Some(10)), ev('b', 2, Some(3)), ev('a', 4, Some(12))];
        let buckets = bucket_events(events, same_key, MergeMode::AdjacentOnly);
        assert_eq!(buckets.len(), 3);
    }

    #[test]
    fn any_equal_rejoins_earlier_bucket() {
        let events = vec![ev('a', 0, Some(10)), ev('b', 2, Some(3)), ev('a', 4, Some(12))];
        let buckets = bucket_events(events, same_key, MergeMode::AnyEqual);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].end, Some(12));
        assert_eq!(buckets[0].members.len(), 2);
        assert_eq!(buckets[1].members[0].key, 'b');
    }

    #[test]
    fn close_at_keeps_ongoing_flag() {
        let buckets = bucket_events(vec![ev('a', 3, None)], same_key, MergeMode::AdjacentOnly);
        let closed = buckets.into_iter().next().map(|b| b.close_at(20));
        let closed = closed.expect("one bucket");
        assert_eq!(closed.end, Some(20));
        assert!(closed.ongoing);
        assert!(closed.imputed_end);
    }
}
