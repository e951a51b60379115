use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use atv::action::RowAction;
use atv::adaptive::AdaptiveTableController;
use atv::domain::{AtvConfig, AtvError, HELP_TEXT, InputMode, Message};
use atv::loader::{self, LoadedTable};
use atv::sort::{SortDirection, SortSpecification};
use atv::value::Record;
use atv::viewport::Viewport;
use atv::widgets::{PageState, SortHeaderState};

use crate::inputter::{InputResult, Inputter};
use crate::ui::CHROME_HEIGHT;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

// Row action handlers only describe what should happen, the model applies it
#[derive(Debug, Clone, PartialEq)]
enum ActionOutcome {
    Clipboard(String),
    Popup(String),
}

type Outbox = Arc<Mutex<Vec<ActionOutcome>>>;

pub struct Model {
    config: AtvConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    name: String,
    table: AdaptiveTableController<Record>,
    viewport: Viewport,
    width: u16,
    height: u16,
    cursor_row: usize,
    card_offset: usize,
    sort_column: usize,
    clipboard: Option<Clipboard>,
    outbox: Outbox,
    input: Inputter,
    input_mode: Option<InputMode>,
    query_before_edit: String,
    last_input: InputResult,
    popup_message: Option<String>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &AtvConfig,
        loaded: LoadedTable,
        ui_width: u16,
        ui_height: u16,
    ) -> Result<Self, AtvError> {
        let registry =
            loader::default_registry(&loaded.columns, config.compact_columns, &config.tags)?;
        let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
        let actions = row_actions(&loaded.columns, &outbox);

        let mut table = AdaptiveTableController::new(
            registry,
            actions,
            SortHeaderState::default(),
            PageState::new(config.page_size),
        )
        .with_card_warn_threshold(config.card_warn_threshold);

        let mut viewport = Viewport::new(config.compact_breakpoint);
        viewport.publish_width(ui_width);
        table.attach_viewport(viewport.subscribe());
        table.set_dataset(loaded.rows);

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            name: loaded.name,
            table,
            viewport,
            width: ui_width,
            height: ui_height,
            cursor_row: 0,
            card_offset: 0,
            sort_column: 0,
            clipboard: None,
            outbox,
            input: Inputter::default(),
            input_mode: None,
            query_before_edit: String::new(),
            last_input: InputResult::default(),
            popup_message: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.sync_sort_column();
        if model.table.is_compact_mode() {
            model.table.sort_header_mut().clear();
        }
        model.set_status_message(format!(
            "Loaded {} rows from {}",
            model.table.dataset().len(),
            model.name
        ));
        Ok(model)
    }

    // -------------------- Accessors for the ui ---------------------- //

    pub fn table(&self) -> &AdaptiveTableController<Record> {
        &self.table
    }

    pub fn config(&self) -> &AtvConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cursor_row(&self) -> usize {
        self.cursor_row
    }

    pub fn card_offset(&self) -> usize {
        self.card_offset
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn popup_message(&self) -> Option<&str> {
        self.popup_message.as_deref()
    }

    /// Filter line content while the filter is being edited.
    pub fn active_input(&self) -> Option<&InputResult> {
        self.input_mode.map(|_| &self.last_input)
    }

    /// Column selected for sorting, by header navigation or the card sort
    /// menu.
    pub fn selected_sort_field(&self) -> Option<&str> {
        self.table
            .registry()
            .list_sortable_columns()
            .get(self.sort_column)
            .map(|c| c.key.as_str())
    }

    pub fn selected_row(&self) -> Option<&Record> {
        let projection = self.table.projection();
        let idx = if self.table.is_compact_mode() {
            projection.card_rows.get(self.cursor_row)
        } else {
            projection.grid_rows.get(self.cursor_row)
        }?;
        self.table.dataset().get(*idx)
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        trace!(
            "Status message after {}ms: {}",
            self.last_status_message_update.elapsed().as_millis(),
            self.status_message
        );
        self.last_status_message_update = Instant::now();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), AtvError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveLeft => self.select_sort_column(-1),
                    Message::MoveRight => self.select_sort_column(1),
                    Message::PreviousPage => self.previous_page(),
                    Message::NextPage => self.next_page(),
                    Message::FirstPage => self.first_page(),
                    Message::LastPage => self.last_page(),
                    Message::SortAscending => self.sort_selected_column(SortDirection::Asc),
                    Message::SortDescending => self.sort_selected_column(SortDirection::Desc),
                    Message::ToggleSortDirection => self.toggle_sort_direction(),
                    Message::Filter => self.enter_input_mode(InputMode::Filter),
                    Message::Action(n) => self.run_row_action(n),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_popup(HELP_TEXT.to_string()),
                    Message::Exit => self.exit(),
                    Message::RawKey(_) => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Layout ---------------------- //

    fn ui_resize(&mut self, width: u16, height: u16) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.width, width, self.height, height
        );
        self.width = width;
        self.height = height;
        self.viewport.publish_width(width);
        if self.table.poll_viewport() {
            self.mode_changed();
        }
        self.clamp_cursor();
    }

    fn mode_changed(&mut self) {
        if self.table.is_compact_mode() {
            // The grid is torn down and its header forgets the active sort
            self.table.sort_header_mut().clear();
            self.set_status_message("Card list");
        } else {
            self.set_status_message("Grid");
        }
        self.cursor_row = 0;
        self.card_offset = 0;
    }

    /// Rows a card takes up: title, detail lines and a separator.
    pub fn card_height(&self) -> usize {
        self.table.registry().compact_detail_columns().len() + 2
    }

    fn card_capacity(&self) -> usize {
        let body = self.height.saturating_sub(CHROME_HEIGHT) as usize;
        (body / self.card_height()).max(1)
    }

    fn visible_row_count(&self) -> usize {
        let projection = self.table.projection();
        if self.table.is_compact_mode() {
            projection.card_rows.len()
        } else {
            projection.grid_rows.len()
        }
    }

    // -------------------- Selection ---------------------- //

    fn move_selection_up(&mut self, size: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(size);
        self.scroll_cards();
    }

    fn move_selection_down(&mut self, size: usize) {
        let last = self.visible_row_count().saturating_sub(1);
        self.cursor_row = self.cursor_row.saturating_add(size).min(last);
        self.scroll_cards();
    }

    fn clamp_cursor(&mut self) {
        let last = self.visible_row_count().saturating_sub(1);
        self.cursor_row = self.cursor_row.min(last);
        self.scroll_cards();
    }

    fn scroll_cards(&mut self) {
        let capacity = self.card_capacity();
        if self.cursor_row < self.card_offset {
            self.card_offset = self.cursor_row;
        } else if self.cursor_row >= self.card_offset + capacity {
            self.card_offset = self.cursor_row + 1 - capacity;
        }
    }

    // -------------------- Pagination ---------------------- //

    fn previous_page(&mut self) {
        if self.table.is_compact_mode() {
            self.move_selection_up(self.card_capacity());
        } else {
            self.table.previous_page();
            self.cursor_row = 0;
        }
    }

    fn next_page(&mut self) {
        if self.table.is_compact_mode() {
            self.move_selection_down(self.card_capacity());
        } else {
            self.table.next_page();
            self.cursor_row = 0;
        }
    }

    fn first_page(&mut self) {
        if !self.table.is_compact_mode() {
            self.table.first_page();
        }
        self.cursor_row = 0;
        self.scroll_cards();
    }

    fn last_page(&mut self) {
        if self.table.is_compact_mode() {
            self.move_selection_down(usize::MAX);
        } else {
            self.table.last_page();
            self.cursor_row = 0;
        }
    }

    // -------------------- Sorting ---------------------- //

    fn select_sort_column(&mut self, step: isize) {
        let count = self.table.registry().list_sortable_columns().len();
        if count == 0 {
            return;
        }
        self.sort_column = (self.sort_column as isize + step).rem_euclid(count as isize) as usize;
        trace!("Selected sort column {:?}", self.selected_sort_field());
    }

    fn sync_sort_column(&mut self) {
        let Some(field) = self.table.current_sort().map(|s| s.field.clone()) else {
            return;
        };
        if let Some(idx) = self
            .table
            .registry()
            .list_sortable_columns()
            .iter()
            .position(|c| c.key == field)
        {
            self.sort_column = idx;
        }
    }

    fn sort_selected_column(&mut self, direction: SortDirection) {
        if let Some(field) = self.selected_sort_field().map(str::to_string) {
            self.apply_sort(field, direction);
        }
    }

    fn toggle_sort_direction(&mut self) {
        if let Some(spec) = self.table.current_sort().cloned() {
            self.apply_sort(spec.field, spec.direction.toggle());
        }
    }

    fn apply_sort(&mut self, field: String, direction: SortDirection) {
        if self.table.is_compact_mode() {
            self.table.set_sort_from_compact(field, direction);
        } else {
            // Activating a header updates the header itself first
            let spec = SortSpecification::new(field.clone(), direction);
            self.table.sort_header_mut().show(&spec);
            self.table.set_sort_from_grid(field, direction);
        }
        self.sync_sort_column();
        self.clamp_cursor();
        if let Some(label) = self.table.sort_label() {
            self.set_status_message(format!("Sorted by {} {}", label, direction));
        }
    }

    // -------------------- Filter input ---------------------- //

    fn enter_input_mode(&mut self, mode: InputMode) {
        trace!("Entering input mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.input_mode = Some(mode);
        self.query_before_edit = self.table.current_query().to_string();
        self.input.set(&self.query_before_edit);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        let query = if self.last_input.canceled {
            self.query_before_edit.clone()
        } else {
            self.last_input.input.clone()
        };
        // The table filters while typing
        if query != self.table.current_query() {
            self.table.set_query(query);
            self.cursor_row = 0;
            self.card_offset = 0;
        }
        if self.last_input.finished {
            self.leave_input_mode();
        }
    }

    fn leave_input_mode(&mut self) {
        debug!("Filter \"{}\" finished", self.table.current_query());
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.input_mode = None;
        self.set_status_message(format!("{} matches", self.table.total_matches()));
    }

    // -------------------- Popup ---------------------- //

    fn show_popup(&mut self, message: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = Some(message);
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if !self.table.current_query().is_empty() {
                    self.table.set_query("");
                    self.cursor_row = 0;
                    self.card_offset = 0;
                    self.set_status_message("Filter cleared");
                }
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.popup_message = None;
            }
            Modus::CMDINPUT => {}
        }
    }

    // -------------------- Row actions ---------------------- //

    fn run_row_action(&mut self, number: usize) {
        let invoked = {
            let Some(row) = self.selected_row() else {
                return;
            };
            let key = number
                .checked_sub(1)
                .and_then(|idx| self.table.visible_actions(row).get(idx).map(|a| a.key.clone()));
            match key {
                Some(key) => self.table.invoke_action(&key, row),
                None => false,
            }
        };
        if invoked {
            self.apply_action_outcomes();
        } else {
            self.set_status_message(format!("No action {number} for this row"));
        }
    }

    fn apply_action_outcomes(&mut self) {
        let outcomes: Vec<ActionOutcome> = match self.outbox.lock() {
            Ok(mut outbox) => outbox.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                ActionOutcome::Clipboard(text) => self.copy_to_clipboard(text),
                ActionOutcome::Popup(text) => self.show_popup(text),
            }
        }
    }

    fn copy_to_clipboard(&mut self, text: String) {
        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new()
                .map_err(|e| warn!("No clipboard available: {:?}", e))
                .ok();
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard unavailable");
            return;
        };
        match clipboard.set_text(text) {
            Ok(_) => {
                info!("Copied to clipboard.");
                self.set_status_message("Copied to clipboard");
            }
            Err(e) => {
                warn!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Copy failed");
            }
        }
    }
}

fn push_outcome(outbox: &Outbox, outcome: ActionOutcome) {
    if let Ok(mut outbox) = outbox.lock() {
        outbox.push(outcome);
    }
}

fn cell_text(row: &Record, column: &str) -> String {
    row.get(column).map(ToString::to_string).unwrap_or_default()
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

/// Inspect the row, copy it as csv, copy its first field when it has one.
fn row_actions(columns: &[String], outbox: &Outbox) -> Vec<RowAction<Record>> {
    let sink = Arc::clone(outbox);
    let fields = columns.to_vec();
    let inspect = RowAction::new("inspect", "Inspect", "🔍", move |row: &Record| {
        let text = fields
            .iter()
            .map(|c| format!("{c}: {}", cell_text(row, c)))
            .collect::<Vec<String>>()
            .join("\n");
        push_outcome(&sink, ActionOutcome::Popup(text));
    });

    let sink = Arc::clone(outbox);
    let fields = columns.to_vec();
    let copy_row = RowAction::new("copy-row", "Copy row", "⧉", move |row: &Record| {
        let line = fields
            .iter()
            .map(|c| wrap_cell_content(&cell_text(row, c)))
            .collect::<Vec<String>>()
            .join(",");
        push_outcome(&sink, ActionOutcome::Clipboard(line));
    });

    let mut actions = vec![inspect, copy_row];
    if let Some(first) = columns.first() {
        let sink = Arc::clone(outbox);
        let field = first.clone();
        let present = first.clone();
        actions.push(
            RowAction::new("copy-key", format!("Copy {first}"), "⎘", move |row: &Record| {
                push_outcome(&sink, ActionOutcome::Clipboard(cell_text(row, &field)));
            })
            .with_visible(move |row: &Record| row.get(&present).is_some_and(|v| !v.is_null())),
        );
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use atv::value::Value;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn loaded() -> LoadedTable {
        let user = |name: &str, email: &str, role: &str| {
            Record::new()
                .with("name", name)
                .with("email", email)
                .with("role", role)
        };
        LoadedTable {
            name: "users.csv".into(),
            columns: vec!["name".into(), "email".into(), "role".into()],
            rows: vec![
                user("Carla", "carla@demo.cl", "ADMIN"),
                user("Ana", "ana@demo.cl", "EDITOR"),
                user("Luis", "luis@demo.cl", "VIEWER"),
            ],
        }
    }

    fn model(width: u16) -> Model {
        let config = AtvConfig::default()
            .with_page_size(2)
            .with_compact_breakpoint(80);
        Model::init(&config, loaded(), width, 40).unwrap()
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn type_keys(model: &mut Model, text: &str) {
        for c in text.chars() {
            send(model, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
    }

    fn key(code: KeyCode) -> Message {
        Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn names(model: &Model) -> Vec<String> {
        model
            .table()
            .card_rows()
            .iter()
            .map(|r| cell_text(r, "name"))
            .collect()
    }

    #[test]
    fn grid_header_survives_a_round_trip_through_cards() {
        let mut m = model(120);
        send(&mut m, Message::SortAscending);
        let name_asc = SortSpecification::new("name", SortDirection::Asc);
        assert_eq!(m.table().sort_header().active(), Some(name_asc));

        send(&mut m, Message::Resize(60, 40));
        assert!(m.table().is_compact_mode());
        assert_eq!(m.table().sort_header().active(), None);

        send(&mut m, Message::MoveRight);
        send(&mut m, Message::SortDescending);
        assert_eq!(names(&m), ["Luis", "Carla", "Ana"]);

        send(&mut m, Message::Resize(120, 40));
        assert!(!m.table().is_compact_mode());
        assert_eq!(
            m.table().sort_header().active(),
            Some(SortSpecification::new("email", SortDirection::Desc))
        );
        assert_eq!(m.selected_sort_field(), Some("email"));
    }

    #[test]
    fn filter_is_applied_while_typing() {
        let mut m = model(120);
        send(&mut m, Message::Filter);
        assert!(m.raw_keyevents());
        type_keys(&mut m, "ca");
        assert_eq!(names(&m), ["Carla"]);
        send(&mut m, key(KeyCode::Enter));
        assert!(!m.raw_keyevents());
        assert_eq!(m.table().current_query(), "ca");

        send(&mut m, Message::Exit);
        assert_eq!(m.table().current_query(), "");
        assert_eq!(names(&m).len(), 3);
    }

    #[test]
    fn canceled_filter_restores_previous_query() {
        let mut m = model(120);
        send(&mut m, Message::Filter);
        type_keys(&mut m, "a");
        send(&mut m, key(KeyCode::Enter));

        send(&mut m, Message::Filter);
        type_keys(&mut m, "na");
        assert_eq!(m.table().current_query(), "ana");
        send(&mut m, key(KeyCode::Esc));
        assert_eq!(m.table().current_query(), "a");
    }

    #[test]
    fn grid_pages_reset_cursor() {
        let mut m = model(120);
        send(&mut m, Message::MoveDown);
        assert_eq!(m.cursor_row(), 1);
        send(&mut m, Message::NextPage);
        assert_eq!(m.table().page().page_index, 1);
        assert_eq!(m.cursor_row(), 0);
        assert_eq!(m.selected_row().map(|r| cell_text(r, "name")).as_deref(), Some("Luis"));
        send(&mut m, Message::MoveDown);
        assert_eq!(m.cursor_row(), 0);
    }

    #[test]
    fn inspect_action_opens_popup() {
        let mut m = model(120);
        send(&mut m, Message::Action(1));
        assert!(m.popup_message().is_some_and(|p| p.contains("name: Ana")));
        send(&mut m, Message::MoveDown);
        assert_eq!(m.cursor_row(), 0);
        send(&mut m, Message::Exit);
        assert!(m.popup_message().is_none());
        send(&mut m, Message::Action(9));
        assert!(m.status_message().starts_with("No action 9"));
    }

    #[test]
    fn key_copy_hidden_for_empty_first_field() {
        let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
        let actions = row_actions(&["name".to_string()], &outbox);
        let empty = Record::new().with("name", Value::Null);
        let copy_key = actions.iter().find(|a| a.key == "copy-key").unwrap();
        assert!(!copy_key.is_visible(&empty));
        assert!(copy_key.is_visible(&Record::new().with("name", "Ana")));
    }

    #[test]
    fn rows_are_copied_as_csv() {
        let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
        let columns = vec!["name".to_string(), "note".to_string()];
        let actions = row_actions(&columns, &outbox);
        let row = Record::new().with("name", "Ana Soto").with("note", "say \"hi\"");
        actions[1].invoke(&row);
        assert_eq!(
            outbox.lock().unwrap().as_slice(),
            [ActionOutcome::Clipboard(
                "\"Ana Soto\",\"say \"\"hi\"\"\"".to_string()
            )]
        );
    }
}
