//! Indexed-colour images: patches, flats, composite textures, and the palettes that give them
//! colour.  Everything here is in palette indices until `to_rgba` is called.

use std::cmp;

use ::errors::{ErrorKind, Result};


/// Palette index that means "nothing drawn here".  Never a colour.
pub const TRANSPARENT_INDEX: u8 = 255;
/// Pictures claiming to be bigger than this in either direction are assumed to be garbage.
pub const MAX_PICTURE_DIMENSION: i16 = 4096;
/// Flats are always square, this many pixels to a side.
pub const FLAT_SIZE: usize = 64;
/// Number of palettes in a vanilla PLAYPAL.
pub const PALETTE_COUNT: usize = 14;


/// A decoded picture, row-major, one palette index per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Picture {
    width: usize,
    height: usize,
    left_offset: i16,
    top_offset: i16,
    pixels: Vec<u8>,
}

impl Picture {
    /// A blank canvas, entirely transparent.
    pub fn new_transparent(width: usize, height: usize) -> Self {
        Picture {
            width,
            height,
            left_offset: 0,
            top_offset: 0,
            pixels: vec![TRANSPARENT_INDEX; width * height],
        }
    }

    pub fn with_offsets(mut self, left_offset: i16, top_offset: i16) -> Self {
        self.left_offset = left_offset;
        self.top_offset = top_offset;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn left_offset(&self) -> i16 {
        self.left_offset
    }

    pub fn top_offset(&self) -> i16 {
        self.top_offset
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        }
        else {
            None
        }
    }

    /// Sets one pixel; coordinates outside the picture are quietly ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, index: u8) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = index;
        }
    }

    /// Copies every pixel of `source` onto this picture with its top-left corner at the given
    /// offset, clipped to this picture's bounds.
    ///
    /// This is a plain overwrite: a transparent source pixel replaces whatever was underneath,
    /// opaque or not.  That's how Doom's own texture compositing behaves, and multi-patch textures
    /// are authored against it.
    pub fn blit(&mut self, source: &Picture, x_offset: i32, y_offset: i32) {
        for sy in 0..source.height {
            let dy = sy as i32 + y_offset;
            if dy < 0 || dy >= self.height as i32 {
                continue;
            }
            for sx in 0..source.width {
                let dx = sx as i32 + x_offset;
                if dx < 0 || dx >= self.width as i32 {
                    continue;
                }
                self.pixels[dy as usize * self.width + dx as usize] = source.pixels[sy * source.width + sx];
            }
        }
    }

    pub fn to_rgba(&self, palette: &Palette) -> RgbaImage {
        RgbaImage::from_indices(self.width, self.height, &self.pixels, palette)
    }
}


/// A floor or ceiling texture: exactly `FLAT_SIZE` squared palette indices, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Flat {
    pixels: Vec<u8>,
}

impl Flat {
    pub fn from_pixels(pixels: &[u8]) -> Result<Self> {
        if pixels.len() < FLAT_SIZE * FLAT_SIZE {
            bail!(ErrorKind::TruncatedData("flat".to_owned()));
        }
        Ok(Flat{ pixels: pixels[.. FLAT_SIZE * FLAT_SIZE].to_vec() })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[(y % FLAT_SIZE) * FLAT_SIZE + (x % FLAT_SIZE)]
    }

    pub fn to_rgba(&self, palette: &Palette) -> RgbaImage {
        RgbaImage::from_indices(FLAT_SIZE, FLAT_SIZE, &self.pixels, palette)
    }
}


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One 256-colour palette.
#[derive(Clone, Debug)]
pub struct Palette {
    pub table: Vec<Rgb>,
}

impl Palette {
    /// RGBA for a palette index.  The transparent index keeps its table colour but gets zero
    /// alpha.
    pub fn color(&self, index: u8) -> [u8; 4] {
        let rgb = self.table.get(index as usize).cloned().unwrap_or(Rgb{ r: 0, g: 0, b: 0 });
        let alpha = if index == TRANSPARENT_INDEX { 0 } else { 255 };
        [rgb.r, rgb.g, rgb.b, alpha]
    }
}

/// All the palettes from PLAYPAL.  Only the first is used for colouring; the rest are the
/// pain/pickup/radiation-suit tints.
#[derive(Clone, Debug)]
pub struct Playpal {
    palettes: Vec<Palette>,
}

impl Playpal {
    /// Fails unless there's at least one palette to colour things with.
    pub fn new(palettes: Vec<Palette>) -> Result<Playpal> {
        if palettes.is_empty() {
            bail!(ErrorKind::TruncatedData("PLAYPAL".to_owned()));
        }
        Ok(Playpal{ palettes })
    }

    pub fn first(&self) -> &Palette {
        &self.palettes[0]
    }

    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }
}


/// A plain 8-bit RGBA image, row-major, ready to hand to a renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    fn from_indices(width: usize, height: usize, indices: &[u8], palette: &Palette) -> Self {
        let mut pixels = Vec::with_capacity(indices.len() * 4);
        for &index in indices {
            pixels.extend_from_slice(&palette.color(index));
        }
        RgbaImage{ width, height, pixels }
    }

    pub fn rgba(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }
}


/// Where one patch goes within a composite texture.
#[derive(Clone, Debug)]
pub struct PatchPlacement {
    pub x_offset: i16,
    pub y_offset: i16,
    /// Index into PNAMES
    pub patch: i16,
    // Both of these were never used by the engine
    pub step_dir: i16,
    pub colormap: i16,
}

/// A wall texture as defined in TEXTURE1/TEXTURE2: a size and a list of patches to paint onto it.
/// The pixels only exist once it's been composited.
#[derive(Clone, Debug)]
pub struct TextureDef {
    pub name: String,
    pub flags: i32,
    pub width: i16,
    pub height: i16,
    pub patches: Vec<PatchPlacement>,
}

impl TextureDef {
    /// Paints the patches onto a transparent canvas, in order, each one overwriting what's
    /// beneath it.
    ///
    /// `lookup` resolves a PNAMES index to its decoded picture; it returns `Ok(None)` for patches
    /// that exist but were skipped at load time, which are left out.
    pub fn composite<'a, F>(&self, mut lookup: F) -> Result<Picture>
    where
        F: FnMut(usize) -> Result<Option<&'a Picture>>,
    {
        let width = cmp::max(self.width, 0) as usize;
        let height = cmp::max(self.height, 0) as usize;
        let mut canvas = Picture::new_transparent(width, height);
        for placement in self.patches.iter() {
            // Negative indices are read as the unsigned values they'd be in a source port, which
            // lands them out of range of any real PNAMES
            let index = placement.patch as u16 as usize;
            match lookup(index)? {
                Some(picture) => {
                    canvas.blit(picture, placement.x_offset as i32, placement.y_offset as i32);
                }
                None => {
                    debug!("texture {} skips patch {}", self.name, index);
                }
            }
        }
        Ok(canvas)
    }
}
