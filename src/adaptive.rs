use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::action::RowAction;
use crate::column::ColumnRegistry;
use crate::filter::FilterEngine;
use crate::projection::{ModeProjection, PageInfo, Projection};
use crate::sort::{SortDirection, SortEngine, SortSpecification};
use crate::value::Row;
use crate::viewport::ViewportSubscription;
use crate::widgets::{Paginator, SortHeader};

/// Every input the derived views depend on.
#[derive(Debug)]
pub struct TableSnapshot<R> {
    pub dataset: Arc<Vec<R>>,
    pub query: String,
    pub sort: Option<SortSpecification>,
    pub is_compact_mode: bool,
}

impl<R> Clone for TableSnapshot<R> {
    fn clone(&self) -> Self {
        Self {
            dataset: Arc::clone(&self.dataset),
            query: self.query.clone(),
            sort: self.sort.clone(),
            is_compact_mode: self.is_compact_mode,
        }
    }
}

impl<R: Row> TableSnapshot<R> {
    /// Derives the views from scratch. The controller's cached views always
    /// equal this for the same page request.
    pub fn project(
        &self,
        registry: &ColumnRegistry<R>,
        mode_projection: ModeProjection,
        page: PageInfo,
    ) -> Projection {
        let filtered = FilterEngine::new(registry).filter(&self.dataset, &self.query);
        let ordered = SortEngine::new(registry).sort(&self.dataset, &filtered, self.sort.as_ref());
        mode_projection.project(Arc::new(ordered), page)
    }
}

// Pipeline stage an input change invalidates, later stages are rerun too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Filter,
    Sort,
    Page,
}

/// Owns the dataset, the query, the canonical sort and the mode flag, and
/// keeps the grid and card views derived from them.
pub struct AdaptiveTableController<R> {
    registry: ColumnRegistry<R>,
    actions: Vec<RowAction<R>>,
    sort_header: Box<dyn SortHeader>,
    paginator: Box<dyn Paginator>,
    mode_projection: ModeProjection,
    viewport: Option<ViewportSubscription>,

    dataset: Arc<Vec<R>>,
    query: String,
    sort: Option<SortSpecification>,
    is_compact_mode: bool,

    filtered: Arc<Vec<usize>>,
    ordered: Arc<Vec<usize>>,
    projection: Projection,
}

impl<R: Row> AdaptiveTableController<R> {
    pub fn new(
        registry: ColumnRegistry<R>,
        actions: Vec<RowAction<R>>,
        sort_header: impl SortHeader + 'static,
        paginator: impl Paginator + 'static,
    ) -> Self {
        let mut controller = Self {
            registry,
            actions,
            sort_header: Box::new(sort_header),
            paginator: Box::new(paginator),
            mode_projection: ModeProjection::default(),
            viewport: None,
            dataset: Arc::new(Vec::new()),
            query: String::new(),
            sort: None,
            is_compact_mode: false,
            filtered: Arc::new(Vec::new()),
            ordered: Arc::new(Vec::new()),
            projection: Projection::default(),
        };
        controller.recompute(Stage::Filter);
        controller
    }

    /// Flag card lists longer than `limit` rows.
    pub fn with_card_warn_threshold(mut self, limit: usize) -> Self {
        self.mode_projection = ModeProjection::new(Some(limit));
        self.recompute(Stage::Page);
        self
    }

    // -------------------- Transitions ---------------------- //

    /// Replaces the whole dataset. Seeds an ascending sort on the first
    /// sortable column if no sort was established yet.
    pub fn set_dataset(&mut self, rows: impl Into<Arc<Vec<R>>>) {
        self.dataset = rows.into();
        info!("Dataset replaced, {} rows", self.dataset.len());

        if self.sort.is_none() {
            if let Some(column) = self.registry.first_sortable_column() {
                let spec = SortSpecification::new(column.key.clone(), SortDirection::Asc);
                debug!("Seeding default sort {}", spec);
                if !self.is_compact_mode {
                    self.sort_header.show(&spec);
                }
                self.sort = Some(spec);
            }
        }
        self.recompute(Stage::Filter);
    }

    /// Stores the raw query and jumps back to the first grid page.
    pub fn set_query(&mut self, text: impl Into<String>) {
        self.query = text.into();
        debug!("Query \"{}\"", self.query);
        self.paginator.first_page();
        self.recompute(Stage::Filter);
    }

    /// A sortable grid header was activated.
    pub fn set_sort_from_grid(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.apply_sort(SortSpecification::new(field, direction));
    }

    /// The card list sort menu was used. A visible grid header is kept in
    /// step.
    pub fn set_sort_from_compact(&mut self, field: impl Into<String>, direction: SortDirection) {
        let spec = SortSpecification::new(field, direction);
        self.apply_sort(spec.clone());
        if !self.is_compact_mode {
            self.sort_header.show(&spec);
        }
    }

    /// Layout changed between grid and card list. On return to the grid the
    /// canonical sort is pushed to the sort header again.
    pub fn on_mode_change(&mut self, is_compact: bool) {
        if is_compact == self.is_compact_mode {
            trace!("Mode unchanged, compact: {}", is_compact);
            return;
        }
        self.is_compact_mode = is_compact;
        info!("Switched to {} mode", if is_compact { "compact" } else { "grid" });

        if !is_compact {
            if let Some(spec) = &self.sort {
                self.sort_header.show(spec);
            }
        }
        self.recompute(Stage::Page);
    }

    fn apply_sort(&mut self, spec: SortSpecification) {
        if self.registry.column(&spec.field).filter(|c| c.is_sortable()).is_none() {
            warn!("Sort on unknown or unsortable field \"{}\", keeping dataset order", spec.field);
        }
        debug!("Sort {}", spec);
        self.sort = Some(spec);
        self.recompute(Stage::Sort);
    }

    // -------------------- Pagination ---------------------- //

    pub fn set_page(&mut self, page_index: usize) {
        self.paginator.set_page_index(page_index);
        self.recompute(Stage::Page);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.projection.page.page_index + 1);
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.projection.page.page_index.saturating_sub(1));
    }

    pub fn first_page(&mut self) {
        self.set_page(0);
    }

    pub fn last_page(&mut self) {
        self.set_page(self.projection.page_count - 1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.paginator.set_page_size(page_size);
        self.paginator.first_page();
        self.recompute(Stage::Page);
    }

    // -------------------- Viewport ---------------------- //

    /// Subscribes to layout changes, applying the current state right away.
    pub fn attach_viewport(&mut self, subscription: ViewportSubscription) {
        self.viewport = Some(subscription);
        self.poll_viewport();
    }

    pub fn detach_viewport(&mut self) {
        self.viewport = None;
    }

    /// Applies the latest pending layout change. Returns true if there was
    /// one.
    pub fn poll_viewport(&mut self) -> bool {
        match self.viewport.as_ref().and_then(|v| v.take()) {
            Some(is_compact) => {
                self.on_mode_change(is_compact);
                true
            }
            None => false,
        }
    }

    // -------------------- Row actions ---------------------- //

    pub fn actions(&self) -> &[RowAction<R>] {
        &self.actions
    }

    pub fn visible_actions(&self, row: &R) -> Vec<&RowAction<R>> {
        self.actions.iter().filter(|a| a.is_visible(row)).collect()
    }

    /// Runs the visible action `key` on `row`. Returns false if there is no
    /// such action for this row.
    pub fn invoke_action(&self, key: &str, row: &R) -> bool {
        match self
            .actions
            .iter()
            .find(|a| a.key == key && a.is_visible(row))
        {
            Some(action) => {
                debug!("Invoking row action \"{}\"", key);
                action.invoke(row);
                true
            }
            None => {
                warn!("No visible row action \"{}\"", key);
                false
            }
        }
    }

    // -------------------- Derived views ---------------------- //

    fn recompute(&mut self, from: Stage) {
        if from <= Stage::Filter {
            self.filtered =
                Arc::new(FilterEngine::new(&self.registry).filter(&self.dataset, &self.query));
        }
        if from <= Stage::Sort {
            self.ordered = Arc::new(SortEngine::new(&self.registry).sort(
                &self.dataset,
                &self.filtered,
                self.sort.as_ref(),
            ));
        }

        let requested = self.paginator.page_info();
        self.projection = self
            .mode_projection
            .project(Arc::clone(&self.ordered), requested);
        if self.projection.page.page_index != requested.page_index {
            self.paginator
                .set_page_index(self.projection.page.page_index);
        }
        trace!(
            "Recomputed from {:?}: {} matches, page {}/{}",
            from,
            self.ordered.len(),
            self.projection.page.page_index + 1,
            self.projection.page_count
        );
    }

    fn rows(&self, indices: &[usize]) -> Vec<&R> {
        indices.iter().map(|&idx| &self.dataset[idx]).collect()
    }

    /// Rows of the current grid page.
    pub fn grid_rows(&self) -> Vec<&R> {
        self.rows(&self.projection.grid_rows)
    }

    /// All matching rows in canonical order.
    pub fn card_rows(&self) -> Vec<&R> {
        self.rows(&self.projection.card_rows)
    }

    /// Matching rows in dataset order.
    pub fn filtered_data(&self) -> Vec<&R> {
        self.rows(&self.filtered)
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn dataset(&self) -> &[R] {
        &self.dataset
    }

    pub fn snapshot(&self) -> TableSnapshot<R> {
        TableSnapshot {
            dataset: Arc::clone(&self.dataset),
            query: self.query.clone(),
            sort: self.sort.clone(),
            is_compact_mode: self.is_compact_mode,
        }
    }

    pub fn mode_projection(&self) -> ModeProjection {
        self.mode_projection
    }

    pub fn is_compact_mode(&self) -> bool {
        self.is_compact_mode
    }

    pub fn current_query(&self) -> &str {
        &self.query
    }

    pub fn current_sort(&self) -> Option<&SortSpecification> {
        self.sort.as_ref()
    }

    /// Header of the sorted column, for the card list sort menu.
    pub fn sort_label(&self) -> Option<String> {
        self.sort.as_ref().map(|s| self.registry.sort_label(s))
    }

    pub fn page(&self) -> PageInfo {
        self.projection.page
    }

    pub fn page_count(&self) -> usize {
        self.projection.page_count
    }

    pub fn total_matches(&self) -> usize {
        self.ordered.len()
    }

    pub fn registry(&self) -> &ColumnRegistry<R> {
        &self.registry
    }

    pub fn sort_header(&self) -> &dyn SortHeader {
        self.sort_header.as_ref()
    }

    pub fn sort_header_mut(&mut self) -> &mut dyn SortHeader {
        self.sort_header.as_mut()
    }

    pub fn paginator(&self) -> &dyn Paginator {
        self.paginator.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDefinition;
    use crate::value::{Record, Value};
    use crate::viewport::Viewport;
    use crate::widgets::{PageState, SortHeaderState};
    use std::sync::Mutex;

    fn registry() -> ColumnRegistry<Record> {
        ColumnRegistry::new(vec![
            ColumnDefinition::new("name", "Name").with_visible_in_compact_mode(true),
            ColumnDefinition::new("email", "Email").with_visible_in_compact_mode(true),
            ColumnDefinition::new("role", "Role").with_tag_color(|_, _| None),
            ColumnDefinition::actions("actions", "Actions"),
        ])
        .unwrap()
    }

    fn users(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new()
                    .with("name", format!("user{i:02}"))
                    .with("email", format!("u{i:02}@demo.cl"))
                    .with("role", if i % 3 == 0 { "ADMIN" } else { "GUEST" })
            })
            .collect()
    }

    fn controller() -> AdaptiveTableController<Record> {
        AdaptiveTableController::new(registry(), Vec::new(), SortHeaderState::default(), PageState::new(10))
    }

    fn names(rows: Vec<&Record>) -> Vec<String> {
        rows.iter().map(|r| r.get("name").unwrap().to_string()).collect()
    }

    #[test]
    fn empty_controller_has_empty_views() {
        let table = controller();
        assert!(table.grid_rows().is_empty());
        assert!(table.card_rows().is_empty());
        assert_eq!(table.current_sort(), None);
        assert_eq!(table.page_count(), 1);
    }

    #[test]
    fn dataset_seeds_default_sort_once() {
        let mut table = controller();
        table.set_dataset(users(3));
        let seeded = SortSpecification::new("name", SortDirection::Asc);
        assert_eq!(table.current_sort(), Some(&seeded));
        assert_eq!(table.sort_header().active(), Some(seeded));

        table.set_sort_from_grid("email", SortDirection::Desc);
        table.set_dataset(users(5));
        assert_eq!(
            table.current_sort(),
            Some(&SortSpecification::new("email", SortDirection::Desc))
        );
    }

    #[test]
    fn query_resets_to_first_page() {
        let mut table = controller();
        table.set_dataset(users(30));
        table.set_page(2);
        assert_eq!(table.page().page_index, 2);

        // still two pages of matches, but the position is reset
        table.set_query("guest");
        assert_eq!(table.page_count(), 2);
        assert_eq!(table.page().page_index, 0);
        assert_eq!(table.paginator().page_info().page_index, 0);
    }

    #[test]
    fn page_navigation_clamps() {
        let mut table = controller();
        table.set_dataset(users(25));
        table.last_page();
        assert_eq!(table.page().page_index, 2);
        table.next_page();
        assert_eq!(table.page().page_index, 2);
        assert_eq!(table.grid_rows().len(), 5);
        table.set_page(40);
        assert_eq!(table.paginator().page_info().page_index, 2);
        table.first_page();
        table.previous_page();
        assert_eq!(table.page().page_index, 0);
    }

    #[test]
    fn grid_sort_reorders_both_views() {
        let mut table = controller();
        table.set_dataset(users(4));
        table.set_sort_from_grid("name", SortDirection::Desc);
        assert_eq!(names(table.grid_rows()), ["user03", "user02", "user01", "user00"]);
        assert_eq!(names(table.card_rows()), names(table.grid_rows()));
        // the source is left in dataset order
        assert_eq!(names(table.dataset().iter().collect()), ["user00", "user01", "user02", "user03"]);
        assert_eq!(names(table.filtered_data()), ["user00", "user01", "user02", "user03"]);
    }

    #[test]
    fn compact_sort_updates_visible_grid_header() {
        let mut table = controller();
        table.set_dataset(users(3));
        table.set_sort_from_compact("email", SortDirection::Desc);
        assert_eq!(
            table.sort_header().active(),
            Some(SortSpecification::new("email", SortDirection::Desc))
        );

        table.on_mode_change(true);
        table.set_sort_from_compact("role", SortDirection::Asc);
        // header is not touched while the grid is hidden
        assert_eq!(
            table.sort_header().active(),
            Some(SortSpecification::new("email", SortDirection::Desc))
        );
    }

    #[test]
    fn unknown_sort_field_keeps_dataset_order() {
        let mut table = controller();
        table.set_dataset(users(3));
        table.set_sort_from_grid("salary", SortDirection::Desc);
        assert_eq!(table.current_sort().map(|s| s.field.as_str()), Some("salary"));
        assert_eq!(names(table.card_rows()), ["user00", "user01", "user02"]);
        assert_eq!(table.sort_label().as_deref(), Some("salary"));
    }

    #[test]
    fn unsortable_field_keeps_dataset_order_through_requery() {
        let mut table = controller();
        table.set_dataset(users(4));
        table.set_sort_from_compact("actions", SortDirection::Desc);
        assert_eq!(names(table.card_rows()), ["user00", "user01", "user02", "user03"]);

        // later recomputes reuse the stored sort without reordering
        table.set_query("user0");
        table.set_page_size(2);
        assert_eq!(table.current_sort().map(|s| s.field.as_str()), Some("actions"));
        assert_eq!(names(table.grid_rows()), ["user00", "user01"]);
        assert_eq!(names(table.card_rows()), ["user00", "user01", "user02", "user03"]);
    }

    #[test]
    fn mode_flag_never_changes_ordering() {
        let mut table = controller();
        table.set_dataset(users(12));
        table.set_query("user0");
        table.set_sort_from_grid("name", SortDirection::Desc);
        let grid = table.projection().clone();
        table.on_mode_change(true);
        assert!(table.is_compact_mode());
        assert_eq!(table.projection(), &grid);
    }

    #[test]
    fn cached_views_equal_fresh_derivation() {
        let mut table = controller();
        table.set_dataset(users(23));
        table.set_query("user1");
        table.set_sort_from_compact("email", SortDirection::Desc);
        table.set_page(1);

        let fresh = table
            .snapshot()
            .project(table.registry(), table.mode_projection(), table.paginator().page_info());
        assert_eq!(&fresh, table.projection());
    }

    #[test]
    fn viewport_drives_mode_changes() {
        let mut viewport = Viewport::new(80);
        viewport.publish_width(60);
        let mut table = controller();
        table.attach_viewport(viewport.subscribe());
        assert!(table.is_compact_mode());

        viewport.publish_width(70);
        assert!(!table.poll_viewport());
        viewport.publish_width(120);
        viewport.publish_width(40);
        viewport.publish_width(140);
        assert!(table.poll_viewport());
        assert!(!table.is_compact_mode());

        table.detach_viewport();
        assert_eq!(viewport.subscriber_count(), 0);
    }

    #[test]
    fn row_actions_respect_visibility() {
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&calls);
        let actions = vec![
            RowAction::new("delete", "Delete", "x", move |r: &Record| {
                sink.lock().unwrap().push(r.get("name").unwrap().to_string());
            })
            .with_visible(|r: &Record| r.get("role") != Some(&Value::from("ADMIN"))),
        ];
        let mut table =
            AdaptiveTableController::new(registry(), actions, SortHeaderState::default(), PageState::new(10));
        table.set_dataset(users(2));

        let admin = table.dataset()[0].clone();
        let user = table.dataset()[1].clone();
        assert!(table.visible_actions(&admin).is_empty());
        assert_eq!(table.visible_actions(&user).len(), 1);
        assert!(!table.invoke_action("delete", &admin));
        assert!(table.invoke_action("delete", &user));
        assert!(!table.invoke_action("archive", &user));
        assert_eq!(*calls.lock().unwrap(), ["user01"]);
    }

    #[test]
    fn oversized_card_list_is_flagged() {
        let mut table = controller().with_card_warn_threshold(5);
        table.set_dataset(users(6));
        assert!(table.projection().card_overflow);
        table.set_query("user00");
        assert!(!table.projection().card_overflow);
    }
}
