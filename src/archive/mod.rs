//! Container formats.  Only the WAD is supported, and only the whole-game (IWAD) flavor of it.

pub mod wad;

pub use self::wad::{WADArchive, WADBuilder, WADType};
