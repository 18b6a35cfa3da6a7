use std::cmp::Ordering;
use std::ops::Bound;
use serde::{Serialize, Deserialize};

/// One end of a range predicate, serializable so it can travel inside a shard plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeBound<T> {
    Unbounded,
    Included(T),
    Excluded(T),
}

impl<T> RangeBound<T> {
    pub fn as_bound(&self) -> Bound<&T> {
        match self {
            RangeBound::Unbounded => Bound::Unbounded,
            RangeBound::Included(v) => Bound::Included(v),
            RangeBound::Excluded(v) => Bound::Excluded(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RangeBound<U> {
        match self {
            RangeBound::Unbounded => RangeBound::Unbounded,
            RangeBound::Included(v) => RangeBound::Included(f(v)),
            RangeBound::Excluded(v) => RangeBound::Excluded(f(v)),
        }
    }
    fn value(&self) -> Option<&T> {
        match self {
            RangeBound::Unbounded => None,
            RangeBound::Included(v) | RangeBound::Excluded(v) => Some(v),
        }
    }
}

/// True when no value can satisfy both bounds. `BTreeMap::range` panics on such input.
pub fn is_empty_range<T: PartialOrd + ?Sized>(lower: Bound<&T>, upper: Bound<&T>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

/// The stricter of two lower bounds
pub fn tighter_lower<T>(
    a: RangeBound<T>,
    b: RangeBound<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> RangeBound<T> {
    if keeps_first(&a, &b, Ordering::Greater, cmp) { a } else { b }
}

/// The stricter of two upper bounds
pub fn tighter_upper<T>(
    a: RangeBound<T>,
    b: RangeBound<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> RangeBound<T> {
    if keeps_first(&a, &b, Ordering::Less, cmp) { a } else { b }
}

fn keeps_first<T>(
    a: &RangeBound<T>,
    b: &RangeBound<T>,
    stricter: Ordering,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> bool {
    match (a.value(), b.value()) {
        (None, _) => false,
        (_, None) => true,
        (Some(x), Some(y)) => match cmp(x, y) {
            Ordering::Equal => matches!(a, RangeBound::Excluded(_)),
            ord => ord == stricter,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_empty_ranges() {
        assert!(is_empty_range(Bound::Excluded(&1.0), Bound::Excluded(&1.0)));
        assert!(is_empty_range(Bound::Included(&3.0), Bound::Included(&2.0)));
        assert!(!is_empty_range(Bound::Included(&2.0), Bound::Included(&2.0)));
        assert!(!is_empty_range::<f64>(Bound::Unbounded, Bound::Excluded(&0.0)));
    }

    #[test]
    fn exclusive_bound_wins_on_tie() {
        let lower = tighter_lower(
            RangeBound::Included(1.0),
            RangeBound::Excluded(1.0),
            |a: &f64, b| a.total_cmp(b),
        );
        assert_eq!(lower, RangeBound::Excluded(1.0));

        let upper = tighter_upper(
            RangeBound::Included(3.0),
            RangeBound::Excluded(5.0),
            |a: &f64, b| a.total_cmp(b),
        );
        assert_eq!(upper, RangeBound::Included(3.0));
    }
}
