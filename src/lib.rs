//! Now-playing cards for Plex.
//!
//! A request resolves to the live session, else a recently played track
//! (cached per user), and is rendered as an SVG card.

pub mod config;
pub mod cover_art;
pub mod error;
pub mod plex;
pub mod render;
pub mod resolver;
pub mod selection;
pub mod server;
pub mod storage;

pub use error::{Error, Result};
