//! Reads Doom IWADs: the archive itself, the pictures and textures inside it, and levels, down to
//! walking their BSP trees and producing wall and floor geometry for a renderer.

extern crate bit_vec;
#[macro_use]
extern crate bitflags;
extern crate byteorder;
#[macro_use]
extern crate error_chain;
extern crate euclid;
#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;

pub mod archive;
pub mod bsp;
pub mod errors;
pub mod geom;
pub mod map;
pub mod parse;
pub mod picture;
pub mod scene;
pub mod universe;

pub use archive::{WADArchive, WADBuilder, WADType};
pub use bsp::{TextureCache, classify_point, find_sector, generate_subsector_geometry, traverse_all, traverse_near};
pub use errors::{Error, ErrorKind, Result};
pub use map::Level;
pub use picture::{Flat, Palette, Picture, TextureDef};
pub use scene::{ConvexFan, MaterialCache, Scene, SceneBuilder, Triangulator, build_scene};
pub use universe::Universe;
