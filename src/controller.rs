use std::time::Duration;
use tracing::trace;

use crate::model::Model;
use atv::domain::{AtvConfig, AtvError, Message};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AtvConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, AtvError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    Self::handle_key(key)
                }
            }
            Event::Resize(width, height) => Some(Message::Resize(width, height)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::PreviousPage),
            (KeyCode::PageDown, _) => Some(Message::NextPage),
            (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char('s'), _) => Some(Message::SortAscending),
            (KeyCode::Char('S'), _) => Some(Message::SortDescending),
            (KeyCode::Char('t'), _) => Some(Message::ToggleSortDirection),
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char(c @ '1'..='9'), _) => c.to_digit(10).map(|n| Message::Action(n as usize)),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> Option<Message> {
        Controller::handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn maps_navigation_and_sorting() {
        assert_eq!(key(KeyCode::Char('q')), Some(Message::Quit));
        assert_eq!(key(KeyCode::PageDown), Some(Message::NextPage));
        assert_eq!(key(KeyCode::Char('S')), Some(Message::SortDescending));
        assert_eq!(key(KeyCode::Char('/')), Some(Message::Filter));
        assert_eq!(key(KeyCode::Char('x')), None);
    }

    #[test]
    fn digits_select_row_actions() {
        assert_eq!(key(KeyCode::Char('1')), Some(Message::Action(1)));
        assert_eq!(key(KeyCode::Char('9')), Some(Message::Action(9)));
        assert_eq!(key(KeyCode::Char('0')), None);
    }
}
