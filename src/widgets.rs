//! Seams to the grid widgets the controller talks to.
//!
//! The sort header is the only place where sort display state can get lost
//! (a grid that is torn down forgets which column was active), so the
//! controller pushes the canonical sort into it instead of reading it back.

use tracing::trace;

use crate::projection::PageInfo;
use crate::sort::SortSpecification;

/// Grid sort header.
pub trait SortHeader {
    /// Sort indicator currently displayed.
    fn active(&self) -> Option<SortSpecification>;

    /// Display `spec` as the active sort.
    fn show(&mut self, spec: &SortSpecification);

    /// Forget the displayed sort, as a torn down header does.
    fn clear(&mut self);
}

/// Grid pagination widget.
pub trait Paginator {
    fn page_info(&self) -> PageInfo;

    fn set_page_index(&mut self, page_index: usize);

    fn set_page_size(&mut self, page_size: usize);

    fn first_page(&mut self) {
        self.set_page_index(0);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortHeaderState {
    active: Option<SortSpecification>,
}

impl SortHeader for SortHeaderState {
    fn active(&self) -> Option<SortSpecification> {
        self.active.clone()
    }

    fn show(&mut self, spec: &SortSpecification) {
        trace!("Sort header shows {}", spec);
        self.active = Some(spec.clone());
    }

    fn clear(&mut self) {
        self.active = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    info: PageInfo,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        Self {
            info: PageInfo::first(page_size),
        }
    }
}

impl Paginator for PageState {
    fn page_info(&self) -> PageInfo {
        self.info
    }

    fn set_page_index(&mut self, page_index: usize) {
        self.info.page_index = page_index;
    }

    fn set_page_size(&mut self, page_size: usize) {
        self.info.page_size = page_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;

    #[test]
    fn header_forgets_on_clear() {
        let mut header = SortHeaderState::default();
        let spec = SortSpecification::new("name", SortDirection::Desc);
        header.show(&spec);
        assert_eq!(header.active(), Some(spec));
        header.clear();
        assert_eq!(header.active(), None);
    }

    #[test]
    fn first_page_resets_index_only() {
        let mut pages = PageState::new(25);
        pages.set_page_index(4);
        pages.first_page();
        assert_eq!(pages.page_info(), PageInfo::new(0, 25));
    }
}
