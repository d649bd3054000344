//! Sequence sets for FETCH-style message selections.
//!
//! A sequence set is a comma-separated list of single message numbers and
//! `start:end` ranges, where either bound may be the `*` wildcard meaning
//! the highest known message number.

use crate::{Error, Result};

/// One bound of a sequence element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqBound {
    /// A concrete message number (1-based).
    Num(u32),
    /// The `*` wildcard: highest known message number.
    Star,
}

impl SeqBound {
    const fn resolve(self, highest: u32) -> u32 {
        match self {
            Self::Num(n) => n,
            Self::Star => highest,
        }
    }
}

impl std::fmt::Display for SeqBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Star => write!(f, "*"),
        }
    }
}

/// One element of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqItem {
    /// A single message number (or `*`).
    Single(SeqBound),
    /// An inclusive `start:end` range.
    Range(SeqBound, SeqBound),
}

impl std::fmt::Display for SeqItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
        }
    }
}

/// A parsed sequence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet(Vec<SeqItem>);

impl SequenceSet {
    /// Parses the textual encoding, e.g. `1:3,5` or `4:*`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut items = Vec::new();
        for element in input.split(',') {
            items.push(parse_element(element)?);
        }
        Ok(Self(items))
    }

    /// The parsed elements, in input order.
    #[must_use]
    pub fn items(&self) -> &[SeqItem] {
        &self.0
    }

    /// Expands to the selected message numbers.
    ///
    /// Each element expands independently and the results concatenate in
    /// input order: duplicates stay, and a descending range expands
    /// descending. `*` resolves to `highest`; wildcard elements expand to
    /// nothing when the mailbox is empty.
    #[must_use]
    pub fn expand(&self, highest: u32) -> Vec<u32> {
        let mut out = Vec::new();
        for item in &self.0 {
            match *item {
                SeqItem::Single(bound) => {
                    let n = bound.resolve(highest);
                    if n > 0 {
                        out.push(n);
                    }
                }
                SeqItem::Range(start, end) => {
                    let start = start.resolve(highest);
                    let end = end.resolve(highest);
                    if start == 0 || end == 0 {
                        continue;
                    }
                    if start <= end {
                        out.extend(start..=end);
                    } else {
                        out.extend((end..=start).rev());
                    }
                }
            }
        }
        out
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: Vec<_> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", s.join(","))
    }
}

fn parse_element(element: &str) -> Result<SeqItem> {
    match element.split_once(':') {
        Some((start, end)) => Ok(SeqItem::Range(parse_bound(start)?, parse_bound(end)?)),
        None => Ok(SeqItem::Single(parse_bound(element)?)),
    }
}

fn parse_bound(text: &str) -> Result<SeqBound> {
    if text == "*" {
        return Ok(SeqBound::Star);
    }
    let n: u32 = text
        .parse()
        .map_err(|_| Error::parse(0, format!("invalid sequence number: {text:?}")))?;
    if n == 0 {
        return Err(Error::parse(0, "message numbers start at 1"));
    }
    Ok(SeqBound::Num(n))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn expand(input: &str, highest: u32) -> Vec<u32> {
        SequenceSet::parse(input).unwrap().expand(highest)
    }

    #[test]
    fn test_single() {
        assert_eq!(expand("5", 10), vec![5]);
    }

    #[test]
    fn test_range_and_single() {
        assert_eq!(expand("1:3,5", 10), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_star_range() {
        assert_eq!(expand("1:*", 10), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_star_single() {
        assert_eq!(expand("*", 10), vec![10]);
    }

    #[test]
    fn test_duplicates_preserved() {
        assert_eq!(expand("2,1:3", 10), vec![2, 1, 2, 3]);
    }

    #[test]
    fn test_descending_range_expands_descending() {
        assert_eq!(expand("5:2", 10), vec![5, 4, 3, 2]);
    }

    #[test]
    fn test_star_on_empty_mailbox() {
        assert_eq!(expand("1:*", 0), Vec::<u32>::new());
        assert_eq!(expand("*", 0), Vec::<u32>::new());
    }

    #[test]
    fn test_invalid_elements() {
        assert!(SequenceSet::parse("abc").is_err());
        assert!(SequenceSet::parse("1:x").is_err());
        assert!(SequenceSet::parse("0").is_err());
        assert!(SequenceSet::parse("").is_err());
        assert!(SequenceSet::parse("1,,3").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let set = SequenceSet::parse("1:3,5,4:*").unwrap();
        assert_eq!(set.to_string(), "1:3,5,4:*");
        assert_eq!(set.items().len(), 3);
    }
}
