use anyhow::Result;
use ratatui::style::{Color, Modifier, Style};

use crate::command::BadgeCategory;
use crate::settings::SettingStore;

pub const THEME_KEY: &str = "theme";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThemeSetting {
    Light,
    #[default]
    Dark,
}

impl ThemeSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeSetting::Light => "light",
            ThemeSetting::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> ThemeSetting {
        match value.trim() {
            "light" => ThemeSetting::Light,
            _ => ThemeSetting::Dark,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub volume_bar: Color,
    pub range_bar: Color,
    pub pnl_bar: Color,
    pub loss_bar: Color,
    pub success: Color,
    pub warning: Color,
}

impl Palette {
    pub fn for_setting(setting: ThemeSetting) -> Palette {
        match setting {
            ThemeSetting::Dark => Palette {
                background: Color::Reset,
                text: Color::Gray,
                muted: Color::DarkGray,
                accent: Color::LightCyan,
                volume_bar: Color::Rgb(11, 127, 218),
                range_bar: Color::Rgb(15, 155, 142),
                pnl_bar: Color::Rgb(255, 123, 92),
                loss_bar: Color::LightRed,
                success: Color::Green,
                warning: Color::Yellow,
            },
            ThemeSetting::Light => Palette {
                background: Color::White,
                text: Color::Rgb(2, 18, 43),
                muted: Color::Rgb(110, 118, 129),
                accent: Color::Rgb(11, 127, 218),
                volume_bar: Color::Rgb(11, 127, 218),
                range_bar: Color::Rgb(15, 155, 142),
                pnl_bar: Color::Rgb(255, 123, 92),
                loss_bar: Color::Red,
                success: Color::Rgb(20, 130, 60),
                warning: Color::Rgb(181, 120, 0),
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }

    pub fn badge(&self, category: BadgeCategory) -> Style {
        let color = match category {
            BadgeCategory::Success => self.success,
            BadgeCategory::Warning => self.warning,
            BadgeCategory::Muted => self.muted,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}

pub struct ThemePreference {
    store: Box<dyn SettingStore>,
    setting: ThemeSetting,
    light_marker: bool,
    toggle_checked: bool,
    load_error: Option<String>,
}

impl ThemePreference {
    /// Reads the persisted setting and applies it. An unreadable store
    /// behaves like an unset one; the read error is kept for the caller.
    pub fn load(store: Box<dyn SettingStore>) -> ThemePreference {
        let (setting, load_error) = match store.read(THEME_KEY) {
            Ok(value) => (
                value
                    .map(|value| ThemeSetting::parse(&value))
                    .unwrap_or_default(),
                None,
            ),
            Err(err) => (ThemeSetting::default(), Some(format!("{err:#}"))),
        };
        let mut preference = ThemePreference {
            store,
            setting,
            light_marker: false,
            toggle_checked: false,
            load_error,
        };
        preference.apply();
        preference.toggle_checked = setting == ThemeSetting::Light;
        preference
    }

    /// Toggle change handler. The new setting is applied even when it
    /// cannot be persisted; the write error is returned for reporting.
    pub fn set_checked(&mut self, checked: bool) -> Result<()> {
        self.toggle_checked = checked;
        self.setting = if checked {
            ThemeSetting::Light
        } else {
            ThemeSetting::Dark
        };
        self.apply();
        self.store.write(THEME_KEY, self.setting.as_str())
    }

    pub fn toggle(&mut self) -> Result<()> {
        self.set_checked(!self.toggle_checked)
    }

    fn apply(&mut self) {
        self.light_marker = self.setting == ThemeSetting::Light;
    }

    pub fn take_load_error(&mut self) -> Option<String> {
        self.load_error.take()
    }

    pub fn setting(&self) -> ThemeSetting {
        self.setting
    }

    pub fn has_light_marker(&self) -> bool {
        self.light_marker
    }

    pub fn toggle_checked(&self) -> bool {
        self.toggle_checked
    }

    pub fn palette(&self) -> Palette {
        Palette::for_setting(self.setting)
    }
}
