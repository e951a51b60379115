use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use atv::adaptive::AdaptiveTableController;
use atv::column::{ColumnDefinition, ColumnKind};
use atv::value::{Record, Value};

use crate::model::Model;

/// Lines around the data area: frame borders, sort bar, footer, status line.
pub const CHROME_HEIGHT: u16 = 5;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
const AVATAR_LETTERS: usize = 2;

#[derive(Debug, Default)]
pub struct TableUI {
    state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [main, footer, statusline] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let compact = model.table().is_compact_mode();
        let instructions = Line::from(vec![
            " Sort ".into(),
            "<s/S>".blue().bold(),
            " Filter ".into(),
            "</>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let title = format!(
            " {} [{}] ",
            model.name(),
            if compact { "cards" } else { "grid" }
        );
        let block = Block::bordered()
            .title(Line::from(title.bold()).centered())
            .title_bottom(instructions.centered())
            .border_set(border::ROUNDED);
        let inner = block.inner(main);
        frame.render_widget(block, main);

        let [sortbar, body] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(inner);
        frame.render_widget(Paragraph::new(sort_bar(model)), sortbar);

        if compact {
            frame.render_widget(Paragraph::new(card_lines(model, body.height as usize)), body);
        } else {
            self.state.select(Some(model.cursor_row()));
            frame.render_stateful_widget(grid(model), body, &mut self.state);
        }

        frame.render_widget(Paragraph::new(footer_line(model.table())), footer);
        self.draw_statusline(model, frame, statusline);

        if let Some(message) = model.popup_message() {
            let area = popup_area(frame.area(), 60, 60);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(message)
                    .wrap(Wrap { trim: false })
                    .block(Block::bordered().title(" <Esc> to close ")),
                area,
            );
        }
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        match model.active_input() {
            Some(input) => {
                let line = Line::from(vec!["/".yellow().bold(), input.input.as_str().into()]);
                frame.render_widget(Paragraph::new(line), area);
                frame.set_cursor_position((area.x + 1 + input.cursor_pos as u16, area.y));
            }
            None => {
                let query = model.table().current_query();
                let mut spans = vec![Span::raw(model.status_message().to_string())];
                if !query.is_empty() {
                    spans.push(" | filter: ".dark_gray());
                    spans.push(query.to_string().yellow());
                }
                frame.render_widget(Paragraph::new(Line::from(spans)), area);
            }
        }
    }
}

fn sort_bar(model: &Model) -> Line<'static> {
    let table = model.table();
    let selected = model
        .selected_sort_field()
        .and_then(|key| table.registry().column(key))
        .map(|c| c.header.clone())
        .unwrap_or_default();
    let current = match (table.sort_label(), table.current_sort()) {
        (Some(label), Some(spec)) => format!("{} {}", label, spec.direction.indicator()),
        _ => "none".to_string(),
    };

    if table.is_compact_mode() {
        Line::from(vec![
            "Sort by ".into(),
            format!("[{selected}]").bold(),
            " ←/→ field, s/S direction | current: ".dark_gray(),
            current.cyan(),
        ])
    } else {
        Line::from(vec![
            "Sorted by ".into(),
            current.cyan(),
            " | column: ".dark_gray(),
            selected.bold(),
        ])
    }
}

fn footer_line(table: &AdaptiveTableController<Record>) -> Line<'static> {
    let matches = table.total_matches();
    if table.is_compact_mode() {
        let mut spans = vec![Span::raw(format!(" {matches} cards"))];
        if table.projection().card_overflow {
            spans.push(" ⚠ long list, narrow it down with a filter".yellow());
        }
        Line::from(spans)
    } else {
        let page = table.page();
        Line::from(format!(
            " Page {}/{} | {} matches | {} per page",
            page.page_index + 1,
            table.page_count(),
            matches,
            page.page_size.max(1)
        ))
    }
}

fn grid(model: &Model) -> Table<'_> {
    let table = model.table();
    let registry = table.registry();
    let rows = table.grid_rows();
    let active = table.sort_header().active();
    let selected = model.selected_sort_field();
    let max_width = model.config().max_column_width;

    let header = Row::new(registry.columns().iter().map(|column| {
        let mut label = column.header.clone();
        if let Some(spec) = active.as_ref().filter(|s| s.field == column.key) {
            label = format!("{label} {}", spec.direction.indicator());
        }
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if selected == Some(column.key.as_str()) {
            style = style.bg(Color::Blue);
        }
        Cell::from(label).style(style)
    }))
    .style(Style::default().bg(Color::DarkGray));

    let cells: Vec<Vec<(String, Style)>> = rows
        .iter()
        .map(|row| {
            registry
                .columns()
                .iter()
                .map(|column| match column.kind {
                    ColumnKind::Actions => (action_hints(table, row), Style::default().fg(Color::DarkGray)),
                    ColumnKind::Tag => (
                        format!(" {} ", cell_text(&registry.resolve_value(column, row))),
                        tag_style(registry.tag_color(column, row).as_deref()),
                    ),
                    ColumnKind::Plain => (
                        cell_text(&registry.resolve_value(column, row)),
                        column_style(column),
                    ),
                })
                .collect()
        })
        .collect();

    let widths: Vec<Constraint> = registry
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let content = cells.iter().map(|r| r[idx].0.chars().count());
            Constraint::Length(column_width(&column.header, content, max_width) as u16)
        })
        .collect();

    let body = cells.into_iter().map(|row| {
        Row::new(
            row.into_iter()
                .map(|(text, style)| Cell::from(Span::styled(text, style))),
        )
    });

    Table::new(body, widths)
        .header(header)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
}

fn card_lines(model: &Model, height: usize) -> Vec<Line<'static>> {
    let table = model.table();
    let registry = table.registry();
    let headers = registry.compact_header_columns();
    let details = registry.compact_detail_columns();
    let dataset = table.dataset();

    let mut lines = Vec::new();
    for (pos, &idx) in table
        .projection()
        .card_rows
        .iter()
        .enumerate()
        .skip(model.card_offset())
    {
        if lines.len() + model.card_height() > height {
            break;
        }
        let row = &dataset[idx];
        let is_selected = pos == model.cursor_row();

        let titles: Vec<String> = headers
            .iter()
            .map(|c| cell_text(&registry.resolve_value(c, row)))
            .collect();
        let avatar = initials(titles.first().map(String::as_str).unwrap_or(""));
        let mut title_style = Style::default().add_modifier(Modifier::BOLD);
        if is_selected {
            title_style = title_style.add_modifier(Modifier::REVERSED);
        }
        let mut title = vec![
            Span::styled(format!(" {:^width$} ", avatar, width = AVATAR_LETTERS), Style::default().bg(Color::DarkGray)),
            Span::raw(" "),
            Span::styled(titles.join(" · "), title_style),
        ];
        if is_selected {
            title.push(Span::raw("  "));
            title.push(action_hints(table, row).dark_gray());
        }
        lines.push(Line::from(title));

        for column in details.iter() {
            let value = cell_text(&registry.resolve_value(column, row));
            let value = match column.kind {
                ColumnKind::Tag => {
                    Span::styled(format!(" {value} "), tag_style(registry.tag_color(column, row).as_deref()))
                }
                _ => Span::styled(value, column_style(column)),
            };
            lines.push(Line::from(vec![
                Span::raw("     "),
                format!("{}: ", column.header).dark_gray(),
                value,
            ]));
        }
        lines.push(Line::default());
    }
    lines
}

fn action_hints(table: &AdaptiveTableController<Record>, row: &Record) -> String {
    table
        .visible_actions(row)
        .iter()
        .enumerate()
        .map(|(n, a)| format!("{}:{}", n + 1, a.label))
        .collect::<Vec<String>>()
        .join(" ")
}

fn column_style(column: &ColumnDefinition<Record>) -> Style {
    if column.monospace {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

/// Single line cell content.
fn cell_text(value: &Value) -> String {
    value.to_string().replace("\r\n", " ↵ ").replace('\n', " ↵ ")
}

fn column_width(header: &str, content: impl Iterator<Item = usize>, max_width: usize) -> usize {
    let widest = content.max().unwrap_or(0);
    // Room for the sort indicator
    let header_width = header.chars().count() + COLUMN_WIDTH_MARGIN;
    widest.max(header_width).min(max_width.max(header_width))
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .take(AVATAR_LETTERS)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

fn tag_style(token: Option<&str>) -> Style {
    let color = match token {
        Some("primary") => Color::Blue,
        Some("accent") => Color::Magenta,
        Some("warn") => Color::Red,
        Some("green") => Color::Green,
        Some("yellow") => Color::Yellow,
        Some("cyan") => Color::Cyan,
        _ => Color::Gray,
    };
    Style::default().fg(Color::Black).bg(color)
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initials_from_first_two_words() {
        assert_eq!(initials("ana soto ruiz"), "AS");
        assert_eq!(initials("Luis"), "L");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn column_width_is_capped_but_fits_header() {
        assert_eq!(column_width("Name", [3, 12].into_iter(), 40), 12);
        assert_eq!(column_width("Name", [3, 120].into_iter(), 40), 40);
        assert_eq!(column_width("Name", std::iter::empty(), 40), 6);
        assert_eq!(column_width("A very long header", [2].into_iter(), 5), 20);
    }

    #[test]
    fn multiline_cells_are_flattened() {
        assert_eq!(cell_text(&Value::from("a\nb")), "a ↵ b");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn unknown_tag_tokens_are_gray() {
        assert_eq!(tag_style(Some("primary")).bg, Some(Color::Blue));
        assert_eq!(tag_style(Some("nope")).bg, Some(Color::Gray));
        assert_eq!(tag_style(None).bg, Some(Color::Gray));
    }

    #[test]
    fn popup_is_centered() {
        let area = popup_area(Rect::new(0, 0, 100, 50), 60, 60);
        assert_eq!(area, Rect::new(20, 10, 60, 30));
    }
}
