//! SVG cards.
//!
//! Pure functions of `(record, cover, options)`. The record's `user` field
//! never reaches the output. Bars take the cover's accent color when it has
//! one, the theme accent otherwise.

pub mod theme;

use std::borrow::Cow;

use crate::cover_art::Cover;
use crate::plex::PlaybackRecord;

pub use theme::{Palette, Theme};

pub const IDLE_TITLE: &str = "Nothing playing";

/// Animation period per bar, cycled by bar index.
const BAR_DURATIONS_MS: [u32; 84] = [
    692, 881, 812, 949, 773, 802, 817, 699, 575, 538, 826, 843, 649, 606, 930, 714, 859, 506,
    544, 659, 770, 896, 867, 700, 671, 639, 751, 525, 865, 785, 734, 576, 641, 785, 840, 979,
    797, 752, 512, 659, 853, 568, 813, 656, 884, 646, 825, 668, 710, 585, 825, 775, 626, 522,
    827, 861, 554, 772, 559, 677, 651, 548, 952, 816, 519, 541, 683, 889, 844, 535, 587, 896,
    592, 680, 508, 954, 853, 582, 553, 618, 552, 990, 803, 749,
];

const BAR_WIDTH: u32 = 2;
const BAR_SPACING: u32 = 1;
const BAR_BASE_HEIGHT: u32 = 4;
const BAR_MAX_HEIGHT: u32 = 18;
const BAR_STAGGER_MS: i64 = 800;
const CARD_BARS: u32 = 96;

const COVER_X: u32 = 10;
const COVER_Y: u32 = 5;
const COVER_SIZE: u32 = 80;
const TEXT_Y: u32 = 20;
const RIGHT_MARGIN: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardOptions {
    pub width: u32,
    pub height: u32,
    pub theme: Theme,
}

impl CardOptions {
    pub const MIN_WIDTH: u32 = 160;
    pub const MAX_WIDTH: u32 = 2000;
    pub const MIN_HEIGHT: u32 = 40;
    pub const MAX_HEIGHT: u32 = 600;

    /// Dimensions are clamped so the layout math never goes negative.
    pub fn new(width: u32, height: u32, theme: Theme) -> Self {
        Self {
            width: width.clamp(Self::MIN_WIDTH, Self::MAX_WIDTH),
            height: height.clamp(Self::MIN_HEIGHT, Self::MAX_HEIGHT),
            theme,
        }
    }
}

fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Card for `record`, or the idle card when there is nothing to show.
///
/// `cover` holds an already-inlined image (normally a `data:` URL); a
/// placeholder square is drawn without one.
pub fn now_playing_svg(record: Option<&PlaybackRecord>, cover: Option<&Cover>, opts: &CardOptions) -> String {
    let palette = opts.theme.palette();
    let accent = cover
        .and_then(|c| c.accent.as_deref())
        .unwrap_or(palette.accent);

    if opts.theme.is_bars_only() {
        return bars_only_svg(opts, accent);
    }

    let title = record.map(|r| r.title.as_str()).filter(|t| !t.is_empty()).unwrap_or(IDLE_TITLE);
    let artist = record.and_then(|r| r.artist.as_deref()).unwrap_or("");
    let album = record.and_then(|r| r.album.as_deref()).filter(|a| !a.is_empty());

    let mut subtitle = escape(artist).into_owned();
    if let Some(album) = album {
        subtitle.push_str(" - ");
        subtitle.push_str(&escape(album));
    }

    let text_x = COVER_X + COVER_SIZE + 12;
    let content_width = opts.width.saturating_sub(text_x + RIGHT_MARGIN);
    let bars = svg_bars(CARD_BARS, accent, text_x, TEXT_Y + 47, content_width);

    let cover_markup = match cover {
        Some(art) => format!(
            r#"<image href="{}" x="{COVER_X}" y="{COVER_Y}" width="{COVER_SIZE}" height="{COVER_SIZE}" preserveAspectRatio="xMidYMid slice" />"#,
            escape(&art.data_url)
        ),
        None => format!(
            r##"<rect x="{COVER_X}" y="{COVER_Y}" width="{COVER_SIZE}" height="{COVER_SIZE}" rx="6" fill="#ddd" />"##
        ),
    };

    format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  <defs>
    <clipPath id="contentClip">
      <rect x="{text_x}" y="0" width="{content_width}" height="{h}" />
    </clipPath>
    <style>
      .bg {{ fill: {bg}; }}
      .title {{ font-family: 'Arial', 'Helvetica', sans-serif; font-size: 14px; font-weight: 700; fill: {text}; }}
      .artist {{ font-family: 'Arial', 'Helvetica', sans-serif; font-size: 12px; fill: {subtext}; }}
    </style>
  </defs>
  <rect class="bg" width="100%" height="100%" rx="8" />
  {cover_markup}
  <g clip-path="url(#contentClip)">
    <text x="{text_x}" y="{TEXT_Y}" class="title">{title}</text>
    <text x="{text_x}" y="{sub_y}" class="artist">{subtitle}</text>
    {bars}
  </g>
</svg>"#,
        w = opts.width,
        h = opts.height,
        bg = palette.background,
        text = palette.text,
        subtext = palette.subtext,
        title = escape(title),
        sub_y = TEXT_Y + 18,
    )
}

/// Equalizer only, spread across the card width.
fn bars_only_svg(opts: &CardOptions, accent: &str) -> String {
    let palette = opts.theme.palette();
    let left_margin = 8;
    let usable = opts.width.saturating_sub(2 * left_margin);
    let count = (usable / 12).clamp(8, 40);
    let baseline = (opts.height as f64 * 0.85) as u32;
    let bars = svg_bars(count, accent, left_margin, baseline.saturating_sub(15), usable);

    format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  <defs>
    <style>
      .bg {{ fill: {bg}; }}
    </style>
  </defs>
  <rect class="bg" width="100%" height="100%" rx="8" />
  {bars}
</svg>"#,
        w = opts.width,
        h = opts.height,
        bg = palette.background,
    )
}

/// Animated bars growing upwards from `top + BAR_MAX_HEIGHT`, centered in
/// `content_width`. The count shrinks to what fits.
fn svg_bars(requested: u32, color: &str, start_x: u32, top: u32, content_width: u32) -> String {
    let pitch = BAR_WIDTH + BAR_SPACING;
    let fits = (content_width + BAR_SPACING) / pitch;
    let count = requested.min(fits).max(1);
    let total = count * BAR_WIDTH + (count - 1) * BAR_SPACING;
    let offset = (content_width as f64 - total as f64) / 2.0;
    let bottom = top + BAR_MAX_HEIGHT;
    let (low_y, high_y) = (bottom - BAR_BASE_HEIGHT, bottom - BAR_MAX_HEIGHT);

    let mut out = String::new();
    for i in 0..count {
        let x = start_x as f64 + offset + (i * pitch) as f64;
        let dur = BAR_DURATIONS_MS[i as usize % BAR_DURATIONS_MS.len()];
        let begin = -BAR_STAGGER_MS * i as i64;
        out.push_str(&format!(
            r#"<rect x="{x}" y="{low_y}" width="{BAR_WIDTH}" height="{BAR_BASE_HEIGHT}" fill="{color}" opacity="0.35">
  <animate attributeName="height" values="{BAR_BASE_HEIGHT};{BAR_MAX_HEIGHT};{BAR_BASE_HEIGHT}" keyTimes="0;0.5;1" dur="{dur}ms" begin="{begin}ms" repeatCount="indefinite" />
  <animate attributeName="opacity" values="0.35;0.95;0.35" keyTimes="0;0.5;1" dur="{dur}ms" begin="{begin}ms" repeatCount="indefinite" />
  <animate attributeName="y" values="{low_y};{high_y};{low_y}" keyTimes="0;0.5;1" dur="{dur}ms" begin="{begin}ms" repeatCount="indefinite" />
</rect>"#
        ));
    }
    out
}

/// Visibly distinct card for failures, served in place of an error page.
pub fn error_svg(message: &str, width: u32, height: u32) -> String {
    let opts = CardOptions::new(width, height, Theme::Normal);
    format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  <defs>
    <style>
      .error-text {{ font-family: Arial, sans-serif; fill: #ff4444; font-size: 14px; text-anchor: middle; dominant-baseline: middle; }}
    </style>
  </defs>
  <rect width="100%" height="100%" rx="8" fill="#fff5f5" stroke="#ff4444" />
  <text x="{cx}" y="{cy}" class="error-text">{message}</text>
</svg>"##,
        w = opts.width,
        h = opts.height,
        cx = opts.width / 2,
        cy = opts.height / 2,
        message = escape(message),
    )
}
