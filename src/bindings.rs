use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::OptionalControls;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    PrevSymbol,
    NextSymbol,
    LoadAnalysis,
    LoadPositions,
    LoadBacktest,
    RefreshSymbols,
    ToggleTheme,
    Search,
    Export,
    FocusNext,
    ScrollUp,
    ScrollDown,
    Quit,
}

impl Action {
    fn hint(&self) -> Option<&'static str> {
        match self {
            Action::LoadAnalysis => Some("load"),
            Action::LoadPositions => Some("positions"),
            Action::LoadBacktest => Some("backtest"),
            Action::RefreshSymbols => Some("refresh"),
            Action::ToggleTheme => Some("theme"),
            Action::Search => Some("search"),
            Action::Export => Some("export csv"),
            Action::FocusNext => Some("focus"),
            Action::Quit => Some("quit"),
            Action::PrevSymbol | Action::NextSymbol | Action::ScrollUp | Action::ScrollDown => {
                None
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Bindings {
    entries: Vec<(KeyCode, Action)>,
}

impl Bindings {
    pub fn new(controls: OptionalControls) -> Bindings {
        let mut entries = vec![
            (KeyCode::Up, Action::PrevSymbol),
            (KeyCode::Char('k'), Action::PrevSymbol),
            (KeyCode::Down, Action::NextSymbol),
            (KeyCode::Char('j'), Action::NextSymbol),
            (KeyCode::Enter, Action::LoadAnalysis),
            (KeyCode::Char('p'), Action::LoadPositions),
            (KeyCode::Char('b'), Action::LoadBacktest),
            (KeyCode::Char('t'), Action::ToggleTheme),
            (KeyCode::Tab, Action::FocusNext),
            (KeyCode::PageUp, Action::ScrollUp),
            (KeyCode::PageDown, Action::ScrollDown),
            (KeyCode::Char('q'), Action::Quit),
            (KeyCode::Esc, Action::Quit),
        ];
        if controls.refresh {
            entries.push((KeyCode::Char('r'), Action::RefreshSymbols));
        }
        if controls.search {
            entries.push((KeyCode::Char('/'), Action::Search));
        }
        if controls.export {
            entries.push((KeyCode::Char('e'), Action::Export));
        }
        Bindings { entries }
    }

    pub fn action_for(&self, key: &KeyEvent) -> Option<Action> {
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return None;
        }
        let code = match key.code {
            KeyCode::Char(ch) => KeyCode::Char(ch.to_ascii_lowercase()),
            other => other,
        };
        self.entries
            .iter()
            .find(|(bound, _)| *bound == code)
            .map(|(_, action)| *action)
    }

    pub fn help_line(&self) -> String {
        let mut parts = vec!["↑/↓ symbol".to_string()];
        let mut seen: Vec<Action> = Vec::new();
        for (code, action) in &self.entries {
            let Some(hint) = action.hint() else {
                continue;
            };
            if seen.contains(action) {
                continue;
            }
            seen.push(*action);
            parts.push(format!("{} {}", key_label(code), hint));
        }
        parts.push("PgUp/PgDn scroll".to_string());
        parts.join(" · ")
    }
}

fn key_label(code: &KeyCode) -> String {
    match code {
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Char(ch) => ch.to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn default_controls_bind_everything() {
        let bindings = Bindings::new(OptionalControls::default());
        assert_eq!(
            bindings.action_for(&press(KeyCode::Char('e'))),
            Some(Action::Export)
        );
        assert_eq!(
            bindings.action_for(&press(KeyCode::Char('/'))),
            Some(Action::Search)
        );
        assert_eq!(
            bindings.action_for(&press(KeyCode::Char('P'))),
            Some(Action::LoadPositions)
        );
        assert!(bindings.help_line().contains("e export csv"));
    }

    #[test]
    fn disabled_controls_stay_unbound() {
        let bindings = Bindings::new(OptionalControls {
            refresh: false,
            export: false,
            search: true,
        });
        assert_eq!(bindings.action_for(&press(KeyCode::Char('e'))), None);
        assert_eq!(bindings.action_for(&press(KeyCode::Char('r'))), None);
        assert_eq!(
            bindings.action_for(&press(KeyCode::Char('/'))),
            Some(Action::Search)
        );
        assert!(!bindings.help_line().contains("export"));
    }

    #[test]
    fn control_chords_are_not_actions() {
        let bindings = Bindings::new(OptionalControls::default());
        let chord = KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(bindings.action_for(&chord), None);
    }
}
