//! Payload parsing shared by the session and history fetchers.
//!
//! Plex answers with XML or JSON depending on the endpoint and on whether it
//! honors `Accept`. The shape is sniffed from the first non-whitespace
//! character and both are reduced to a flat list of [`RawItem`]s.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::Value;

use super::{is_music_type, PlaybackRecord, ServerEndpoint};
use crate::error::{Error, Result};

/// Thumbnail fields in order of preference: track, album, artist, background.
const THUMB_FIELDS: usize = 4;

/// One metadata entry as the server sent it, before normalization.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawItem {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub grandparent_title: Option<String>,
    pub parent_title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub thumb: Option<String>,
    pub parent_thumb: Option<String>,
    pub grandparent_thumb: Option<String>,
    pub art: Option<String>,
    #[serde(rename = "User")]
    pub user: Option<RawUser>,
    #[serde(rename = "Player")]
    pub player: Option<RawPlayer>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawUser {
    pub title: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawPlayer {
    pub state: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl RawItem {
    pub fn is_music(&self) -> bool {
        self.kind.as_deref().is_some_and(is_music_type) || non_empty(&self.grandparent_title).is_some()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| non_empty(&u.title))
    }

    fn thumb_candidates(&self) -> [&Option<String>; THUMB_FIELDS] {
        [&self.thumb, &self.parent_thumb, &self.grandparent_thumb, &self.art]
    }

    /// Normalize into a record. `None` when the entry has no usable title.
    ///
    /// `state` and `user` fall back to the given defaults when the entry
    /// does not carry its own.
    pub fn normalize(
        &self,
        endpoint: &ServerEndpoint,
        default_state: &str,
        default_user: Option<&str>,
    ) -> Option<PlaybackRecord> {
        let title = non_empty(&self.title).or_else(|| non_empty(&self.original_title))?;
        let artist = non_empty(&self.grandparent_title).or_else(|| non_empty(&self.original_title));
        let thumbnail = self
            .thumb_candidates()
            .into_iter()
            .find_map(non_empty)
            .map(|t| endpoint.resolve_thumb(t));
        let media_type = non_empty(&self.kind)
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "track".to_string());
        let playback_state = self
            .player
            .as_ref()
            .and_then(|p| non_empty(&p.state))
            .unwrap_or(default_state);

        Some(PlaybackRecord {
            title: title.to_string(),
            artist: artist.map(str::to_string),
            album: non_empty(&self.parent_title).map(str::to_string),
            thumbnail,
            media_type,
            playback_state: playback_state.to_string(),
            user: self.user_name().or(default_user).map(str::to_string),
        })
    }
}

/// Sniff the payload shape and extract its entries.
///
/// An empty body is a valid, empty listing.
pub fn parse_entries(source: &str, body: &str) -> Result<Vec<RawItem>> {
    let body = body.trim_start();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body.starts_with('<') {
        parse_markup(source, body)
    } else {
        parse_structured(source, body)
    }
}

/// Direct children of the root element become items; their `<User>` and
/// `<Player>` children are attached to them.
fn parse_markup(source: &str, body: &str) -> Result<Vec<RawItem>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| Error::parse(source, e))?;
        match event {
            Event::Start(e) => {
                visit_element(source, &e, depth, &mut items)?;
                depth += 1;
            }
            Event::Empty(e) => visit_element(source, &e, depth, &mut items)?,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::parse(source, "unterminated XML document"));
    }
    Ok(items)
}

fn visit_element(source: &str, e: &BytesStart<'_>, depth: usize, items: &mut Vec<RawItem>) -> Result<()> {
    match depth {
        1 => items.push(item_from_attributes(source, e)?),
        2 => {
            let Some(item) = items.last_mut() else {
                return Ok(());
            };
            match e.name().as_ref() {
                b"User" => {
                    item.user = Some(RawUser {
                        title: attribute(source, e, b"title")?,
                    })
                }
                b"Player" => {
                    item.player = Some(RawPlayer {
                        state: attribute(source, e, b"state")?,
                    })
                }
                _ => {}
            }
        }
        _ => {}
    }
    Ok(())
}

fn item_from_attributes(source: &str, e: &BytesStart<'_>) -> Result<RawItem> {
    let mut item = RawItem::default();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::parse(source, err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| Error::parse(source, err))?
            .into_owned();
        let slot = match attr.key.as_ref() {
            b"title" => &mut item.title,
            b"originalTitle" => &mut item.original_title,
            b"grandparentTitle" => &mut item.grandparent_title,
            b"parentTitle" => &mut item.parent_title,
            b"type" => &mut item.kind,
            b"thumb" => &mut item.thumb,
            b"parentThumb" => &mut item.parent_thumb,
            b"grandparentThumb" => &mut item.grandparent_thumb,
            b"art" => &mut item.art,
            _ => continue,
        };
        *slot = Some(value);
    }
    Ok(item)
}

fn attribute(source: &str, e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::parse(source, err))?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|err| Error::parse(source, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// The list lives at the top level, under `items`, or under
/// `MediaContainer.Metadata`. Entries that are not objects, or whose fields
/// have unexpected types, are skipped.
fn parse_structured(source: &str, body: &str) -> Result<Vec<RawItem>> {
    let data: Value = serde_json::from_str(body).map_err(|e| Error::parse(source, e))?;

    let list = match &data {
        Value::Array(list) => Some(list),
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .or_else(|| {
                map.get("MediaContainer")
                    .and_then(|c| c.get("Metadata"))
                    .and_then(Value::as_array)
            }),
        _ => None,
    };
    let Some(list) = list else {
        // An empty container omits `Metadata` altogether.
        if data.get("MediaContainer").is_some_and(Value::is_object) {
            return Ok(Vec::new());
        }
        return Err(Error::parse(source, "no entry list in JSON payload"));
    };

    Ok(list
        .iter()
        .filter(|entry| entry.is_object())
        .filter_map(|entry| match RawItem::deserialize(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(source, "skipping malformed entry: {}", e);
                None
            }
        })
        .collect())
}
