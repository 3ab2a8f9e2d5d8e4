use std::cmp;

use nom::{le_i16, le_i32, le_u32};

use super::util::fixed_length_ascii;
use ::errors::{ErrorKind, Result, nom_to_result};
use ::picture::{PatchPlacement, TextureDef};


const PNAME_SIZE: usize = 8;

named!(pnames_count<u32>, call!(le_u32));

/// Parses PNAMES, the table that gives every patch its number.
pub fn parse_pnames(buf: &[u8]) -> Result<Vec<String>> {
    let count = nom_to_result("PNAMES header", buf, pnames_count(buf))? as usize;
    // Check the declared count against what's actually there before trusting it with an
    // allocation
    if count > (buf.len() - 4) / PNAME_SIZE {
        bail!(ErrorKind::TruncatedData("PNAMES".to_owned()));
    }
    let table = &buf[4..];
    let names = nom_to_result("PNAMES", buf, count!(table, apply!(fixed_length_ascii, PNAME_SIZE), count))?;
    Ok(names.into_iter().map(|name| name.into_owned()).collect())
}


named!(texturex_count<i32>, call!(le_i32));

named!(patch_placement<PatchPlacement>, do_parse!(
    x_offset: le_i16 >>
    y_offset: le_i16 >>
    patch: le_i16 >>
    step_dir: le_i16 >>
    colormap: le_i16 >>
    (PatchPlacement{ x_offset, y_offset, patch, step_dir, colormap })
));

named!(texturex_lump_entry<TextureDef>, do_parse!(
    name: apply!(fixed_length_ascii, 8) >>
    flags: le_i32 >>
    width: le_i16 >>
    height: le_i16 >>
    le_i32 >>  // "columndirectory", unused
    patchcount: le_i16 >>
    patches: count!(patch_placement, cmp::max(patchcount, 0) as usize) >>
    (TextureDef{
        name: name.into_owned(),
        flags,
        width,
        height,
        patches,
    })
));

/// Parses a TEXTURE1 or TEXTURE2 lump into its texture definitions, in lump order.
pub fn parse_texturex(lump_name: &str, buf: &[u8]) -> Result<Vec<TextureDef>> {
    let count = nom_to_result(format!("{} header", lump_name), buf, texturex_count(buf))?;
    if count < 0 || count as usize > (buf.len() - 4) / 4 {
        bail!(ErrorKind::TruncatedData(format!("{} header", lump_name)));
    }
    let table = &buf[4..];
    let offsets = nom_to_result(format!("{} header", lump_name), buf, count!(table, le_i32, count as usize))?;

    let mut ret = Vec::with_capacity(offsets.len());
    for (i, &offset) in offsets.iter().enumerate() {
        if offset < 0 {
            bail!(ErrorKind::NegativeOffset(lump_name.to_owned(), i, offset as isize));
        }
        if offset as usize >= buf.len() {
            bail!(ErrorKind::TruncatedData(format!("{} entry {}", lump_name, i)));
        }
        ret.push(nom_to_result(lump_name, buf, texturex_lump_entry(&buf[(offset as usize)..]))?);
    }
    Ok(ret)
}


#[cfg(test)]
mod tests {
    use super::{parse_pnames, parse_texturex};
    use ::errors::ErrorKind;

    fn texture_lump() -> Vec<u8> {
        let mut buf = vec![
            1u8, 0, 0, 0,   // one texture
            8, 0, 0, 0,     // at offset 8
        ];
        buf.extend_from_slice(b"DOOR3\0\0\0");
        buf.extend_from_slice(&[0, 0, 0, 0]);  // flags
        buf.extend_from_slice(&[64, 0, 72, 0]);  // 64x72
        buf.extend_from_slice(&[0, 0, 0, 0]);  // column directory
        buf.extend_from_slice(&[2, 0]);  // two patches
        buf.extend_from_slice(&[0, 0, 0, 0, 3, 0, 1, 0, 0, 0]);
        buf.extend_from_slice(&[0xf0, 0xff, 8, 0, 1, 0, 1, 0, 0, 0]);
        buf
    }

    #[test]
    fn texture_with_patches() {
        let textures = parse_texturex("TEXTURE1", &texture_lump()).unwrap();
        assert_eq!(textures.len(), 1);
        let tex = &textures[0];
        assert_eq!(tex.name, "DOOR3");
        assert_eq!((tex.width, tex.height), (64, 72));
        assert_eq!(tex.patches.len(), 2);
        assert_eq!(tex.patches[0].patch, 3);
        assert_eq!(tex.patches[1].x_offset, -16);
        assert_eq!(tex.patches[1].y_offset, 8);
    }

    #[test]
    fn negative_texture_offset() {
        let mut buf = texture_lump();
        buf[7] = 0xff;
        match *parse_texturex("TEXTURE2", &buf).unwrap_err().kind() {
            ErrorKind::NegativeOffset(_, 0, _) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn pnames_in_order() {
        let mut buf = vec![2u8, 0, 0, 0];
        buf.extend_from_slice(b"WALL00_1");
        buf.extend_from_slice(b"w94_1\0\0\0");
        assert_eq!(parse_pnames(&buf).unwrap(), vec!["WALL00_1", "w94_1"]);
    }

    #[test]
    fn pnames_count_larger_than_lump() {
        let mut buf = vec![3u8, 0, 0, 0];
        buf.extend_from_slice(b"WALL00_1");
        match *parse_pnames(&buf).unwrap_err().kind() {
            ErrorKind::TruncatedData(_) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }
}
