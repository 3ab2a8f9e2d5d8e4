use std::cmp;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use super::archive::WADArchive;
use super::errors::{ErrorKind, Result};
use super::map::Level;
use super::parse::map::BareLevel;
use super::parse::picture::{parse_flat, parse_picture, parse_playpal};
use super::parse::texturex::{parse_pnames, parse_texturex};
use super::picture::{Flat, Palette, Picture, Playpal, RgbaImage, TextureDef};


/// How many entries after a level's marker can belong to it.
pub const LEVEL_WINDOW: usize = 10;

const TEXTURE_LUMPS: [&str; 2] = ["TEXTURE1", "TEXTURE2"];


/// For lack of a better name, a "universe" is the set of everything that can exist within a
/// running Doom-engine game, apart from the maps themselves: palettes, patches, textures, flats.
///
/// All of it is decoded up front, when the universe is opened, so a broken WAD fails right away
/// rather than halfway through drawing a level.  Levels are still read one at a time, on request.
pub struct Universe<R = File> {
    archive: WADArchive<R>,
    playpal: Playpal,
    pnames: Vec<String>,
    // Parallel to pnames; None for patches that couldn't be used
    patches: Vec<Option<Picture>>,
    textures: HashMap<String, TextureDef>,
    flats: HashMap<String, Flat>,
}

impl Universe<File> {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Universe::from_archive(WADArchive::open(path)?)
    }
}

impl<R: Read + Seek> Universe<R> {
    pub fn from_archive(mut archive: WADArchive<R>) -> Result<Self> {
        let playpal = parse_playpal(&archive.lump_bytes("PLAYPAL")?)?;
        let pnames = parse_pnames(&archive.lump_bytes("PNAMES")?)?;
        let patches = load_patches(&mut archive, &pnames)?;

        let mut textures = HashMap::new();
        for &lump_name in TEXTURE_LUMPS.iter() {
            // TEXTURE2 only exists in registered Doom, and neither is strictly required
            if archive.find_lump(lump_name).is_none() {
                continue;
            }
            let buf = archive.lump_bytes(lump_name)?;
            for texture in parse_texturex(lump_name, &buf)? {
                textures.insert(texture.name.to_uppercase(), texture);
            }
        }

        let mut flats = HashMap::new();
        for index in archive.entries_between("F_START", "F_END")? {
            let (name, size) = {
                let entry = &archive.directory()[index];
                (entry.name.clone(), entry.size)
            };
            // Nested markers like F1_START
            if size == 0 {
                continue;
            }
            let buf = archive.lump_bytes_at(index)?;
            flats.insert(name.to_uppercase(), parse_flat(&name, &buf)?);
        }

        info!(
            "decoded {} palettes, {} of {} patches, {} textures, {} flats",
            playpal.palettes().len(), patches.iter().filter(|p| p.is_some()).count(), pnames.len(),
            textures.len(), flats.len());

        Ok(Universe {
            archive,
            playpal,
            pnames,
            patches,
            textures,
            flats,
        })
    }

    pub fn archive(&self) -> &WADArchive<R> {
        &self.archive
    }

    pub fn level_names(&self) -> Vec<&str> {
        self.archive.level_names()
    }

    /// Reads and checks one level.  Its lumps are the handful of entries right after its marker;
    /// anything in there that isn't one of the eight kinds of geometry, like REJECT or BLOCKMAP,
    /// is skipped.
    pub fn read_level(&mut self, name: &str) -> Result<Level> {
        let anchor = self.archive.level_anchor(name)?;
        let end = cmp::min(anchor + 1 + LEVEL_WINDOW, self.archive.directory().len());

        let mut lumps = Vec::new();
        for index in (anchor + 1)..end {
            // Don't wander into the next level if this one is short a few lumps
            if self.archive.is_level_anchor(index) {
                break;
            }
            let lump_name = self.archive.directory()[index].name.clone();
            let buf = self.archive.lump_bytes_at(index)?;
            lumps.push((lump_name, buf));
        }

        let mut bare = BareLevel::default();
        for &(ref lump_name, ref buf) in lumps.iter() {
            if !bare.add_lump(lump_name, buf)? {
                info!("level {}: skipping {} lump", name, lump_name);
            }
        }
        Level::from_bare(&bare)
    }
}

impl<R> Universe<R> {
    pub fn playpal(&self) -> &Playpal {
        &self.playpal
    }

    /// The palette everything is actually coloured with.
    pub fn palette(&self) -> &Palette {
        self.playpal.first()
    }

    pub fn pnames(&self) -> &[String] {
        &self.pnames
    }

    /// A patch by its PNAMES index.  Patches that were skipped at load time are `NotFound`.
    pub fn load_picture(&self, index: usize) -> Result<&Picture> {
        match self.patch_slot(index)? {
            Some(picture) => Ok(picture),
            None => {
                bail!(ErrorKind::NotFound("patch", self.pnames[index].clone()));
            }
        }
    }

    fn patch_slot(&self, index: usize) -> Result<Option<&Picture>> {
        match self.patches.get(index) {
            Some(slot) => Ok(slot.as_ref()),
            None => {
                bail!(ErrorKind::DataIntegrity("patch", index, self.patches.len()));
            }
        }
    }

    pub fn load_texture(&self, name: &str) -> Result<&TextureDef> {
        Ok(self.textures.get(&name.to_uppercase())
            .ok_or_else(|| ErrorKind::NotFound("texture", name.to_owned()))?)
    }

    pub fn load_flat(&self, name: &str) -> Result<&Flat> {
        Ok(self.flats.get(&name.to_uppercase())
            .ok_or_else(|| ErrorKind::NotFound("flat", name.to_owned()))?)
    }

    pub fn texture_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.textures.values().map(|texture| texture.name.as_str()).collect();
        names.sort();
        names
    }

    pub fn flat_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.flats.keys().map(|name| name.as_str()).collect();
        names.sort();
        names
    }

    /// Paints a texture's patches together into palette indices.
    pub fn composite_texture(&self, name: &str) -> Result<Picture> {
        self.load_texture(name)?.composite(|index| self.patch_slot(index))
    }

    pub fn texture_rgba(&self, name: &str) -> Result<RgbaImage> {
        Ok(self.composite_texture(name)?.to_rgba(self.palette()))
    }

    pub fn flat_rgba(&self, name: &str) -> Result<RgbaImage> {
        Ok(self.load_flat(name)?.to_rgba(self.palette()))
    }
}

/// Decodes every patch PNAMES mentions.  A patch with no lump, or with absurd dimensions, is
/// skipped with a warning instead of failing the whole load.
fn load_patches<R: Read + Seek>(archive: &mut WADArchive<R>, pnames: &[String]) -> Result<Vec<Option<Picture>>> {
    let mut patches = Vec::with_capacity(pnames.len());
    for name in pnames.iter() {
        // PNAMES is sometimes lowercase, but lump names never are
        let index = match archive.find_lump(&name.to_uppercase()) {
            Some(index) => index,
            None => {
                warn!("patch {} has no lump; skipping it", name);
                patches.push(None);
                continue;
            }
        };
        let buf = archive.lump_bytes_at(index)?;
        match parse_picture(name, &buf) {
            Ok(picture) => patches.push(Some(picture)),
            Err(err) => {
                if let ErrorKind::OversizedImage(..) = *err.kind() {
                    warn!("skipping patch: {}", err);
                    patches.push(None);
                    continue;
                }
                return Err(err);
            }
        }
    }
    Ok(patches)
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;
    use ::archive::{WADBuilder, WADType};
    use ::errors::ErrorKind;
    use ::picture::TRANSPARENT_INDEX;

    fn pnames(names: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(names.len() as u32).unwrap();
        for name in names {
            ::archive::wad::write_name(&mut buf, name).unwrap();
        }
        buf
    }

    /// A 2x1 picture: left pixel `index`, right pixel transparent.
    fn half_picture(index: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        for &value in [2i16, 1, 0, 0].iter() {
            buf.write_i16::<LittleEndian>(value).unwrap();
        }
        buf.write_i32::<LittleEndian>(16).unwrap();
        buf.write_i32::<LittleEndian>(22).unwrap();
        buf.extend_from_slice(&[0, 1, 0, index, 0, 255]);
        buf.push(255);
        buf
    }

    fn texture1(patches: &[(i16, i16)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(1).unwrap();
        buf.write_i32::<LittleEndian>(8).unwrap();
        ::archive::wad::write_name(&mut buf, "duo").unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        buf.write_i16::<LittleEndian>(2).unwrap();
        buf.write_i16::<LittleEndian>(1).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        buf.write_i16::<LittleEndian>(patches.len() as i16).unwrap();
        for &(x_offset, patch) in patches {
            for &value in [x_offset, 0, patch, 1, 0].iter() {
                buf.write_i16::<LittleEndian>(value).unwrap();
            }
        }
        buf
    }

    fn builder() -> WADBuilder {
        let mut builder = WADBuilder::new(WADType::IWAD);
        builder
            .add_lump("PLAYPAL", vec![7u8; 768 * 14])
            .add_lump("PNAMES", pnames(&["wall1", "wall2", "GONE"]))
            .add_lump("WALL1", half_picture(10))
            .add_lump("WALL2", half_picture(20))
            .add_lump("TEXTURE1", texture1(&[(0, 0), (1, 1)]))
            .add_marker("F_START")
            .add_marker("F1_START")
            .add_lump("FLOOR4_8", vec![3u8; 4096])
            .add_marker("F1_END")
            .add_marker("F_END");
        builder
    }

    fn open(builder: &WADBuilder) -> Result<Universe<Cursor<Vec<u8>>>> {
        let archive = WADArchive::from_reader(Cursor::new(builder.to_bytes()?))?;
        Universe::from_archive(archive)
    }

    #[test]
    fn everything_is_decoded_up_front() {
        let universe = open(&builder()).unwrap();
        assert_eq!(universe.playpal().palettes().len(), 14);
        assert_eq!(universe.pnames().len(), 3);
        assert_eq!(universe.load_picture(1).unwrap().pixel(0, 0), Some(20));
        assert_eq!(universe.texture_names(), vec!["duo"]);
        assert_eq!(universe.flat_names(), vec!["FLOOR4_8"]);
        assert_eq!(universe.load_flat("floor4_8").unwrap().pixel(5, 5), 3);
    }

    #[test]
    fn missing_patch_lump_is_skipped() {
        let universe = open(&builder()).unwrap();
        match *universe.load_picture(2).unwrap_err().kind() {
            ErrorKind::NotFound("patch", ref name) => assert_eq!(name, "GONE"),
            ref other => panic!("unexpected error {:?}", other),
        }
        match *universe.load_picture(3).unwrap_err().kind() {
            ErrorKind::DataIntegrity("patch", 3, 3) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn oversized_patch_is_skipped() {
        let mut huge = Vec::new();
        for &value in [4097i16, 1, 0, 0].iter() {
            huge.write_i16::<LittleEndian>(value).unwrap();
        }
        let mut builder = WADBuilder::new(WADType::IWAD);
        builder
            .add_lump("PLAYPAL", vec![7u8; 768])
            .add_lump("PNAMES", pnames(&["WALL1", "HUGE"]))
            .add_lump("WALL1", half_picture(10))
            .add_lump("HUGE", huge)
            .add_lump("TEXTURE1", texture1(&[(1, 0), (0, 1)]))
            .add_marker("F_START")
            .add_marker("F_END");
        let universe = open(&builder).unwrap();

        assert_eq!(universe.load_picture(0).unwrap().pixel(0, 0), Some(10));
        match *universe.load_picture(1).unwrap_err().kind() {
            ErrorKind::NotFound("patch", ref name) => assert_eq!(name, "HUGE"),
            ref other => panic!("unexpected error {:?}", other),
        }
        // The oversized patch would have covered the whole texture; without it, only WALL1 shows
        let picture = universe.composite_texture("duo").unwrap();
        assert_eq!(picture.pixels(), &[TRANSPARENT_INDEX, 10]);
    }

    #[test]
    fn composite_overwrites_with_transparency() {
        let universe = open(&builder()).unwrap();
        // The second patch's transparent right half lands on nothing; its opaque left half covers
        // the first patch's transparent right half
        let picture = universe.composite_texture("DUO").unwrap();
        assert_eq!(picture.pixels(), &[10, 20]);

        let mut builder = builder();
        builder.add_lump("TEXTURE2", texture1(&[(0, 0), (-1, 1)]));
        let universe = open(&builder).unwrap();
        // Now the second patch's transparent half lands on the first patch's opaque pixel
        let picture = universe.composite_texture("duo").unwrap();
        assert_eq!(picture.pixels(), &[TRANSPARENT_INDEX, TRANSPARENT_INDEX]);
        let rgba = universe.texture_rgba("duo").unwrap();
        assert_eq!(rgba.rgba(0, 0), Some([7, 7, 7, 0]));
    }

    #[test]
    fn placement_outside_pnames() {
        let mut builder = builder();
        builder.add_lump("TEXTURE2", texture1(&[(0, 9)]));
        let universe = open(&builder).unwrap();
        match *universe.composite_texture("duo").unwrap_err().kind() {
            ErrorKind::DataIntegrity("patch", 9, 3) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unknown_names() {
        let universe = open(&builder()).unwrap();
        assert!(universe.load_texture("NOPE").is_err());
        assert!(universe.load_flat("NUKAGE1").is_err());
    }

    #[test]
    fn flat_markers_are_required() {
        let mut builder = WADBuilder::new(WADType::IWAD);
        builder
            .add_lump("PLAYPAL", vec![0u8; 768])
            .add_lump("PNAMES", pnames(&[]));
        match *open(&builder).err().unwrap().kind() {
            ErrorKind::NotFound("lump", ref name) => assert_eq!(name, "F_START"),
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn short_level_stops_at_the_next_marker() {
        let mut builder = builder();
        let mut vertexes = Vec::new();
        vertexes.write_i16::<LittleEndian>(5).unwrap();
        vertexes.write_i16::<LittleEndian>(6).unwrap();
        builder
            .add_marker("MAP01")
            .add_lump("THINGS", Vec::new())
            .add_lump("VERTEXES", vertexes)
            .add_marker("MAP02")
            .add_lump("THINGS", Vec::new())
            .add_lump("VERTEXES", Vec::new());
        let mut universe = open(&builder).unwrap();
        assert_eq!(universe.level_names(), vec!["MAP01", "MAP02"]);
        let level = universe.read_level("MAP01").unwrap();
        assert_eq!(level.vertices().len(), 1);
        assert!(universe.read_level("MAP02").unwrap().vertices().is_empty());
        assert!(universe.read_level("MAP03").is_err());
    }
}
