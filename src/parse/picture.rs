use std::cmp;

use nom::{le_i16, le_i32, le_u8};

use ::errors::{ErrorKind, Result, nom_to_result};
use ::picture::{FLAT_SIZE, MAX_PICTURE_DIMENSION, PALETTE_COUNT, Palette, Picture, Playpal, Rgb, Flat};


const PICTURE_HEADER_SIZE: usize = 8;
const COLUMN_END: u8 = 255;
const PALETTE_SIZE: usize = 256 * 3;

#[derive(Clone, Debug)]
pub struct BarePictureHeader {
    pub width: i16,
    pub height: i16,
    pub left_offset: i16,
    pub top_offset: i16,
}

named!(picture_header<BarePictureHeader>, do_parse!(
    width: le_i16 >>
    height: le_i16 >>
    left_offset: le_i16 >>
    top_offset: le_i16 >>
    (BarePictureHeader{ width, height, left_offset, top_offset })
));

/// One vertical run of opaque pixels, a "post".
#[derive(Clone, Debug)]
struct BarePost<'a> {
    row_start: u8,
    pixels: &'a [u8],
}

named!(post<BarePost>, do_parse!(
    row_start: le_u8 >>
    count: le_u8 >>
    take!(1) >>  // padding
    pixels: take!(count) >>
    take!(1) >>  // padding
    (BarePost{ row_start, pixels })
));

// A column is any number of posts, then a lone 255 where the next row start would be
named!(column<Vec<BarePost>>, do_parse!(
    posts: many_till!(post, tag!(&[COLUMN_END][..])) >>
    (posts.0)
));

/// Decodes a picture in the column-of-posts format used by patches, sprites and the like.
///
/// Pixels no post covers stay transparent.  Pictures with a negative size, or bigger than
/// `MAX_PICTURE_DIMENSION`, are refused with `OversizedImage`; callers loading a whole patch
/// table skip those rather than giving up.
pub fn parse_picture(name: &str, buf: &[u8]) -> Result<Picture> {
    let header = nom_to_result(format!("picture {}", name), buf, picture_header(buf))?;
    if header.width < 0 || header.height < 0 ||
        header.width > MAX_PICTURE_DIMENSION || header.height > MAX_PICTURE_DIMENSION
    {
        bail!(ErrorKind::OversizedImage(name.to_owned(), header.width, header.height));
    }
    let width = header.width as usize;
    let height = header.height as usize;

    let table = &buf[PICTURE_HEADER_SIZE..];
    let offsets = nom_to_result(format!("picture {} column offsets", name), buf, count!(table, le_i32, width))?;

    let mut picture = Picture::new_transparent(width, height)
        .with_offsets(header.left_offset, header.top_offset);
    for (x, &offset) in offsets.iter().enumerate() {
        if offset < 0 {
            bail!(ErrorKind::NegativeOffset(format!("picture {}", name), x, offset as isize));
        }
        let offset = offset as usize;
        if offset >= buf.len() {
            bail!(ErrorKind::TruncatedData(format!("picture {} column {}", name, x)));
        }
        let posts = nom_to_result(format!("picture {} column {}", name, x), buf, column(&buf[offset..]))?;
        for post in posts {
            // Posts hanging off the bottom are clipped, not an error; tall patches in real WADs
            // do this
            let start = post.row_start as usize;
            let end = cmp::min(start + post.pixels.len(), height);
            for y in start..end {
                picture.set_pixel(x, y, post.pixels[y - start]);
            }
        }
    }
    Ok(picture)
}

/// Decodes a flat, which is nothing but 4096 raw palette indices.
pub fn parse_flat(name: &str, buf: &[u8]) -> Result<Flat> {
    let pixels = nom_to_result(format!("flat {}", name), buf, take!(buf, FLAT_SIZE * FLAT_SIZE))?;
    Flat::from_pixels(pixels)
}


named!(rgb<Rgb>, do_parse!(
    r: le_u8 >>
    g: le_u8 >>
    b: le_u8 >>
    (Rgb{ r, g, b })
));

named!(palette<Palette>, do_parse!(
    table: count!(rgb, 256) >>
    (Palette{ table })
));

/// Decodes PLAYPAL.  Vanilla has fourteen palettes; fewer is tolerated as long as there's at
/// least the one everything is coloured with.
pub fn parse_playpal(buf: &[u8]) -> Result<Playpal> {
    let count = cmp::min(buf.len() / PALETTE_SIZE, PALETTE_COUNT);
    if count == 0 {
        bail!(ErrorKind::TruncatedData("PLAYPAL".to_owned()));
    }
    let palettes = nom_to_result("PLAYPAL", buf, count!(buf, palette, count))?;
    Playpal::new(palettes)
}
