/// Card color scheme, chosen by the `theme` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Normal,
    Dark,
    TransparentDark,
    TransparentLight,
    /// Equalizer bars only, no cover or text.
    Bars,
}

/// Resolved colors for a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub subtext: &'static str,
    pub accent: &'static str,
}

pub const ACCENT: &str = "#9C27B0";

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::Normal,
        Theme::Dark,
        Theme::TransparentDark,
        Theme::TransparentLight,
        Theme::Bars,
    ];

    /// Unknown names fall back to [`Theme::Normal`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "dark" => Theme::Dark,
            "transparent-dark" => Theme::TransparentDark,
            "transparent-light" => Theme::TransparentLight,
            "bars" | "novatorem" | "only-bars" => Theme::Bars,
            _ => Theme::Normal,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Normal => "normal",
            Theme::Dark => "dark",
            Theme::TransparentDark => "transparent-dark",
            Theme::TransparentLight => "transparent-light",
            Theme::Bars => "bars",
        }
    }

    pub fn is_bars_only(&self) -> bool {
        matches!(self, Theme::Bars)
    }

    pub fn palette(&self) -> Palette {
        let (background, text, subtext) = match self {
            Theme::Dark => ("#161b22", "#f0f6fc", "#16181A"),
            Theme::TransparentDark => ("transparent", "#0b1220", "#586273"),
            Theme::TransparentLight => ("transparent", "#ffffff", "#b6c2d1"),
            Theme::Normal | Theme::Bars => ("#ffffff", "#0b1220", "#586273"),
        };
        Palette {
            background,
            text,
            subtext,
            accent: ACCENT,
        }
    }
}
