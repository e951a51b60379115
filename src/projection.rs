use std::sync::Arc;

use tracing::{trace, warn};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Requested page of the grid, as reported by the pagination widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page_index: usize,
    pub page_size: usize,
}

impl PageInfo {
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    pub fn first(page_size: usize) -> Self {
        Self::new(0, page_size)
    }
}

impl Default for PageInfo {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// The two views of one ordered sequence. Both hold dataset indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// One page of the ordered rows.
    pub grid_rows: Vec<usize>,
    /// Every ordered row, unpaged.
    pub card_rows: Arc<Vec<usize>>,
    /// Page actually shown, after clamping.
    pub page: PageInfo,
    pub page_count: usize,
    /// Card list is larger than the configured warning threshold.
    pub card_overflow: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            grid_rows: Vec::new(),
            card_rows: Arc::new(Vec::new()),
            page: PageInfo::default(),
            page_count: 1,
            card_overflow: false,
        }
    }
}

/// Splits an ordered sequence into the paged grid view and the card list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeProjection {
    card_warn_threshold: Option<usize>,
}

impl ModeProjection {
    pub fn new(card_warn_threshold: Option<usize>) -> Self {
        Self {
            card_warn_threshold,
        }
    }

    pub fn project(&self, ordered: Arc<Vec<usize>>, page: PageInfo) -> Projection {
        let page_size = page.page_size.max(1);
        let page_count = ordered.len().div_ceil(page_size).max(1);
        let page_index = page.page_index.min(page_count - 1);
        if page_index != page.page_index {
            trace!("Clamped page {} to {}", page.page_index, page_index);
        }

        let begin = std::cmp::min(page_index * page_size, ordered.len());
        let end = std::cmp::min(begin + page_size, ordered.len());

        let card_overflow = self
            .card_warn_threshold
            .is_some_and(|limit| ordered.len() > limit);
        if card_overflow {
            warn!("Card list holds {} rows, it is not paginated", ordered.len());
        }

        Projection {
            grid_rows: ordered[begin..end].to_vec(),
            card_rows: ordered,
            page: PageInfo::new(page_index, page_size),
            page_count,
            card_overflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(n: usize) -> Arc<Vec<usize>> {
        Arc::new((0..n).rev().collect())
    }

    #[test]
    fn grid_gets_one_page_cards_get_all() {
        let p = ModeProjection::default().project(ordered(25), PageInfo::new(1, 10));
        assert_eq!(p.grid_rows, (5..15).rev().collect::<Vec<_>>());
        assert_eq!(p.card_rows.len(), 25);
        assert_eq!(p.page_count, 3);
        assert_eq!(p.page, PageInfo::new(1, 10));
    }

    #[test]
    fn last_page_may_be_short() {
        let p = ModeProjection::default().project(ordered(25), PageInfo::new(2, 10));
        assert_eq!(p.grid_rows, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn out_of_range_page_clamps_to_last() {
        let p = ModeProjection::default().project(ordered(25), PageInfo::new(9, 10));
        assert_eq!(p.page.page_index, 2);
        assert_eq!(p.grid_rows.len(), 5);
    }

    #[test]
    fn empty_sequence_has_one_empty_page() {
        let p = ModeProjection::default().project(ordered(0), PageInfo::new(3, 10));
        assert_eq!(p.page_count, 1);
        assert_eq!(p.page.page_index, 0);
        assert!(p.grid_rows.is_empty());
        assert!(p.card_rows.is_empty());
    }

    #[test]
    fn zero_page_size_is_one() {
        let p = ModeProjection::default().project(ordered(3), PageInfo::new(1, 0));
        assert_eq!(p.page, PageInfo::new(1, 1));
        assert_eq!(p.grid_rows, vec![1]);
    }

    #[test]
    fn flags_oversized_card_lists() {
        let projection = ModeProjection::new(Some(10));
        assert!(!projection.project(ordered(10), PageInfo::default()).card_overflow);
        assert!(projection.project(ordered(11), PageInfo::default()).card_overflow);
        assert!(!ModeProjection::default().project(ordered(10_000), PageInfo::default()).card_overflow);
    }
}
