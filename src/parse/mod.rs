//! nom parsers for every fixed binary layout in a WAD.  These only decode; deciding what the
//! bytes mean, and whether the indices in them make sense, happens elsewhere.

pub mod map;
pub mod picture;
pub mod texturex;
pub mod wad;

mod util;
