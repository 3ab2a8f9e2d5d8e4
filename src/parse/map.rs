use std::borrow::Cow;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use nom::{IResult, le_i16, le_u16};

use super::util::fixed_length_ascii;
use ::archive::wad::write_name;
use ::errors::{Result, nom_to_result};


// Sizes of each record type, which are how the element counts are derived from lump sizes
pub const THING_SIZE: usize = 10;
pub const LINEDEF_SIZE: usize = 14;
pub const SIDEDEF_SIZE: usize = 30;
pub const VERTEX_SIZE: usize = 4;
pub const SEG_SIZE: usize = 12;
pub const SUBSECTOR_SIZE: usize = 4;
pub const NODE_SIZE: usize = 28;
pub const SECTOR_SIZE: usize = 26;

#[derive(Clone, Debug)]
pub struct BareThing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub doomednum: i16,
    pub flags: u16,
}

impl BareThing {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.x)?;
        writer.write_i16::<LittleEndian>(self.y)?;
        writer.write_i16::<LittleEndian>(self.angle)?;
        writer.write_i16::<LittleEndian>(self.doomednum)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        Ok(())
    }
}

named!(thing_record<BareThing>, do_parse!(
    x: le_i16 >>
    y: le_i16 >>
    angle: le_i16 >>
    doomednum: le_i16 >>
    flags: le_u16 >>
    (BareThing{ x, y, angle, doomednum, flags })
));


// NOTE: indices are read unsigned; vanilla treats them as signed, but a negative index makes no
// sense anyway, and source ports rely on the extra range.  0xffff is "no sidedef".
#[derive(Clone, Debug)]
pub struct BareLine {
    pub v0: u16,
    pub v1: u16,
    pub flags: u16,
    pub special: i16,
    pub sector_tag: i16,
    pub front_sidedef: u16,
    pub back_sidedef: u16,
}

impl BareLine {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.v0)?;
        writer.write_u16::<LittleEndian>(self.v1)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_i16::<LittleEndian>(self.special)?;
        writer.write_i16::<LittleEndian>(self.sector_tag)?;
        writer.write_u16::<LittleEndian>(self.front_sidedef)?;
        writer.write_u16::<LittleEndian>(self.back_sidedef)?;
        Ok(())
    }
}

named!(linedef_record<BareLine>, do_parse!(
    v0: le_u16 >>
    v1: le_u16 >>
    flags: le_u16 >>
    special: le_i16 >>
    sector_tag: le_i16 >>
    front_sidedef: le_u16 >>
    back_sidedef: le_u16 >>
    (BareLine{ v0, v1, flags, special, sector_tag, front_sidedef, back_sidedef })
));


#[derive(Clone, Debug)]
pub struct BareSide<'tex> {
    pub x_offset: i16,
    pub y_offset: i16,
    pub upper_texture: Cow<'tex, str>,
    pub lower_texture: Cow<'tex, str>,
    pub middle_texture: Cow<'tex, str>,
    pub sector: u16,
}

impl<'t> BareSide<'t> {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.x_offset)?;
        writer.write_i16::<LittleEndian>(self.y_offset)?;
        write_name(writer, &self.upper_texture)?;
        write_name(writer, &self.lower_texture)?;
        write_name(writer, &self.middle_texture)?;
        writer.write_u16::<LittleEndian>(self.sector)?;
        Ok(())
    }
}

named!(sidedef_record<BareSide>, do_parse!(
    x_offset: le_i16 >>
    y_offset: le_i16 >>
    upper_texture: apply!(fixed_length_ascii, 8) >>
    lower_texture: apply!(fixed_length_ascii, 8) >>
    middle_texture: apply!(fixed_length_ascii, 8) >>
    sector: le_u16 >>
    (BareSide{
        x_offset,
        y_offset,
        upper_texture,
        lower_texture,
        middle_texture,
        sector
    })
));


#[derive(Clone, Debug)]
pub struct BareVertex {
    pub x: i16,
    pub y: i16,
}

impl BareVertex {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.x)?;
        writer.write_i16::<LittleEndian>(self.y)?;
        Ok(())
    }
}

named!(vertex_record<BareVertex>, do_parse!(
    x: le_i16 >>
    y: le_i16 >>
    (BareVertex{ x, y })
));


#[derive(Clone, Debug)]
pub struct BareSeg {
    pub v0: u16,
    pub v1: u16,
    pub angle: i16,
    pub linedef: u16,
    // 0 when the seg runs along the linedef's front side, anything else for the back
    pub side: i16,
    pub offset: i16,
}

impl BareSeg {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.v0)?;
        writer.write_u16::<LittleEndian>(self.v1)?;
        writer.write_i16::<LittleEndian>(self.angle)?;
        writer.write_u16::<LittleEndian>(self.linedef)?;
        writer.write_i16::<LittleEndian>(self.side)?;
        writer.write_i16::<LittleEndian>(self.offset)?;
        Ok(())
    }
}

named!(seg_record<BareSeg>, do_parse!(
    v0: le_u16 >>
    v1: le_u16 >>
    angle: le_i16 >>
    linedef: le_u16 >>
    side: le_i16 >>
    offset: le_i16 >>
    (BareSeg{ v0, v1, angle, linedef, side, offset })
));


#[derive(Clone, Debug)]
pub struct BareSubsector {
    pub seg_count: u16,
    pub first_seg: u16,
}

impl BareSubsector {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.seg_count)?;
        writer.write_u16::<LittleEndian>(self.first_seg)?;
        Ok(())
    }
}

named!(subsector_record<BareSubsector>, do_parse!(
    seg_count: le_u16 >>
    first_seg: le_u16 >>
    (BareSubsector{ seg_count, first_seg })
));


#[derive(Clone, Debug)]
pub struct BareBoundingBox {
    pub top: i16,
    pub bottom: i16,
    pub left: i16,
    pub right: i16,
}

impl BareBoundingBox {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.top)?;
        writer.write_i16::<LittleEndian>(self.bottom)?;
        writer.write_i16::<LittleEndian>(self.left)?;
        writer.write_i16::<LittleEndian>(self.right)?;
        Ok(())
    }
}

named!(bounding_box<BareBoundingBox>, do_parse!(
    top: le_i16 >>
    bottom: le_i16 >>
    left: le_i16 >>
    right: le_i16 >>
    (BareBoundingBox{ top, bottom, left, right })
));

/// A BSP node, exactly as stored.  The children are raw: the high bit marks a subsector.
#[derive(Clone, Debug)]
pub struct BareNode {
    pub x: i16,
    pub y: i16,
    pub dx: i16,
    pub dy: i16,
    pub bboxes: [BareBoundingBox; 2],
    pub children: [u16; 2],
}

impl BareNode {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.x)?;
        writer.write_i16::<LittleEndian>(self.y)?;
        writer.write_i16::<LittleEndian>(self.dx)?;
        writer.write_i16::<LittleEndian>(self.dy)?;
        self.bboxes[0].write_to(writer)?;
        self.bboxes[1].write_to(writer)?;
        writer.write_u16::<LittleEndian>(self.children[0])?;
        writer.write_u16::<LittleEndian>(self.children[1])?;
        Ok(())
    }
}

named!(node_record<BareNode>, do_parse!(
    x: le_i16 >>
    y: le_i16 >>
    dx: le_i16 >>
    dy: le_i16 >>
    bbox0: bounding_box >>
    bbox1: bounding_box >>
    child0: le_u16 >>
    child1: le_u16 >>
    (BareNode{ x, y, dx, dy, bboxes: [bbox0, bbox1], children: [child0, child1] })
));


#[derive(Clone, Debug)]
pub struct BareSector<'tex> {
    pub floor_height: i16,
    pub ceiling_height: i16,
    pub floor_texture: Cow<'tex, str>,
    pub ceiling_texture: Cow<'tex, str>,
    pub light: i16,
    pub sector_type: i16,
    pub sector_tag: i16,
}

impl<'t> BareSector<'t> {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.floor_height)?;
        writer.write_i16::<LittleEndian>(self.ceiling_height)?;
        write_name(writer, &self.floor_texture)?;
        write_name(writer, &self.ceiling_texture)?;
        writer.write_i16::<LittleEndian>(self.light)?;
        writer.write_i16::<LittleEndian>(self.sector_type)?;
        writer.write_i16::<LittleEndian>(self.sector_tag)?;
        Ok(())
    }
}

named!(sector_record<BareSector>, do_parse!(
    floor_height: le_i16 >>
    ceiling_height: le_i16 >>
    floor_texture: apply!(fixed_length_ascii, 8) >>
    ceiling_texture: apply!(fixed_length_ascii, 8) >>
    light: le_i16 >>
    sector_type: le_i16 >>
    sector_tag: le_i16 >>
    (BareSector{
        floor_height,
        ceiling_height,
        floor_texture,
        ceiling_texture,
        light,
        sector_type,
        sector_tag,
    })
));


/// Parses as many whole records as fit in the lump; a partial record at the end is ignored, the
/// same as dividing the lump size by the record size.
fn record_array<'a, O, F>(whence: &str, buf: &'a [u8], record_size: usize, parser: F) -> Result<Vec<O>>
where
    F: Fn(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let count = buf.len() / record_size;
    nom_to_result(whence, buf, count!(buf, call!(parser), count))
}

pub fn parse_things(buf: &[u8]) -> Result<Vec<BareThing>> {
    record_array("THINGS lump", buf, THING_SIZE, thing_record)
}

pub fn parse_linedefs(buf: &[u8]) -> Result<Vec<BareLine>> {
    record_array("LINEDEFS lump", buf, LINEDEF_SIZE, linedef_record)
}

pub fn parse_sidedefs(buf: &[u8]) -> Result<Vec<BareSide>> {
    record_array("SIDEDEFS lump", buf, SIDEDEF_SIZE, sidedef_record)
}

pub fn parse_vertexes(buf: &[u8]) -> Result<Vec<BareVertex>> {
    record_array("VERTEXES lump", buf, VERTEX_SIZE, vertex_record)
}

pub fn parse_segs(buf: &[u8]) -> Result<Vec<BareSeg>> {
    record_array("SEGS lump", buf, SEG_SIZE, seg_record)
}

pub fn parse_subsectors(buf: &[u8]) -> Result<Vec<BareSubsector>> {
    record_array("SSECTORS lump", buf, SUBSECTOR_SIZE, subsector_record)
}

pub fn parse_nodes(buf: &[u8]) -> Result<Vec<BareNode>> {
    record_array("NODES lump", buf, NODE_SIZE, node_record)
}

pub fn parse_sectors(buf: &[u8]) -> Result<Vec<BareSector>> {
    record_array("SECTORS lump", buf, SECTOR_SIZE, sector_record)
}


/// The eight record arrays of one level, exactly as stored.  Nothing here has been checked;
/// indices may point anywhere.  See `map::Level::from_bare` for the checked version.
#[derive(Debug, Default)]
pub struct BareLevel<'a> {
    pub things: Vec<BareThing>,
    pub linedefs: Vec<BareLine>,
    pub sidedefs: Vec<BareSide<'a>>,
    pub vertexes: Vec<BareVertex>,
    pub segs: Vec<BareSeg>,
    pub subsectors: Vec<BareSubsector>,
    pub nodes: Vec<BareNode>,
    pub sectors: Vec<BareSector<'a>>,
}

impl<'a> BareLevel<'a> {
    /// Decodes one lump of a level into the matching array.  Returns false, leaving the level
    /// untouched, for lumps that aren't one of the eight kinds this crate cares about.
    pub fn add_lump(&mut self, name: &str, buf: &'a [u8]) -> Result<bool> {
        match name {
            "THINGS" => { self.things = parse_things(buf)?; }
            "LINEDEFS" => { self.linedefs = parse_linedefs(buf)?; }
            "SIDEDEFS" => { self.sidedefs = parse_sidedefs(buf)?; }
            "VERTEXES" => { self.vertexes = parse_vertexes(buf)?; }
            "SEGS" => { self.segs = parse_segs(buf)?; }
            "SSECTORS" => { self.subsectors = parse_subsectors(buf)?; }
            "NODES" => { self.nodes = parse_nodes(buf)?; }
            "SECTORS" => { self.sectors = parse_sectors(buf)?; }
            _ => { return Ok(false); }
        }
        Ok(true)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_partial_record_is_ignored() {
        let mut buf = Vec::new();
        BareVertex{ x: -64, y: 128 }.write_to(&mut buf).unwrap();
        BareVertex{ x: 32, y: -16 }.write_to(&mut buf).unwrap();
        buf.extend_from_slice(&[0xAA, 0xBB]);

        let vertexes = parse_vertexes(&buf).unwrap();
        assert_eq!(vertexes.len(), 2);
        assert_eq!((vertexes[0].x, vertexes[0].y), (-64, 128));
        assert_eq!((vertexes[1].x, vertexes[1].y), (32, -16));
    }

    #[test]
    fn missing_sidedef_reads_as_ffff() {
        let mut buf = Vec::new();
        BareLine{
            v0: 0, v1: 1, flags: 1, special: 0, sector_tag: 0,
            front_sidedef: 0, back_sidedef: 0xffff,
        }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), LINEDEF_SIZE);
        assert_eq!(&buf[12..14], &[0xff, 0xff]);

        let lines = parse_linedefs(&buf).unwrap();
        assert_eq!(lines[0].back_sidedef, 0xffff);
    }

    #[test]
    fn sidedef_names_and_sector() {
        let mut buf = Vec::new();
        BareSide{
            x_offset: 8, y_offset: -8,
            upper_texture: "-".into(), lower_texture: "STEP1".into(), middle_texture: "STARTAN3".into(),
            sector: 3,
        }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SIDEDEF_SIZE);

        let sides = parse_sidedefs(&buf).unwrap();
        assert_eq!(sides[0].upper_texture, "-");
        assert_eq!(sides[0].lower_texture, "STEP1");
        assert_eq!(sides[0].middle_texture, "STARTAN3");
        assert_eq!(sides[0].sector, 3);
    }

    #[test]
    fn sidedef_names_with_high_bytes() {
        let mut buf = Vec::new();
        buf.write_i16::<LittleEndian>(0).unwrap();
        buf.write_i16::<LittleEndian>(0).unwrap();
        buf.extend_from_slice(b"-\0\0\0\0\0\0\0");
        buf.extend_from_slice(b"-\0\0\0\0\0\0\0");
        buf.extend_from_slice(b"W\xe9LL\0\0\0\0");
        buf.write_u16::<LittleEndian>(0).unwrap();

        let sides = parse_sidedefs(&buf).unwrap();
        assert_eq!(sides[0].middle_texture, "W\u{e9}LL");
        assert_eq!(sides[0].upper_texture, "-");
    }

    #[test]
    fn node_layout() {
        let node = BareNode{
            x: 1, y: 2, dx: 3, dy: -4,
            bboxes: [
                BareBoundingBox{ top: 10, bottom: -10, left: -20, right: 20 },
                BareBoundingBox{ top: 5, bottom: -5, left: -6, right: 6 },
            ],
            children: [0x8001, 7],
        };
        let mut buf = Vec::new();
        node.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), NODE_SIZE);

        let nodes = parse_nodes(&buf).unwrap();
        assert_eq!(nodes[0].dy, -4);
        assert_eq!(nodes[0].bboxes[1].right, 6);
        assert_eq!(nodes[0].children, [0x8001, 7]);
    }

    #[test]
    fn unknown_lumps_are_declined() {
        let mut level = BareLevel::default();
        assert!(!level.add_lump("REJECT", &[0u8; 8]).unwrap());
        assert!(level.add_lump("SSECTORS", &[2u8, 0, 0, 0]).unwrap());
        assert_eq!(level.subsectors[0].seg_count, 2);
    }

    #[test]
    fn record_sizes_match_layouts() {
        let mut buf = Vec::new();
        BareThing{ x: 0, y: 0, angle: 90, doomednum: 1, flags: 7 }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), THING_SIZE);
        buf.clear();
        BareSeg{ v0: 0, v1: 1, angle: 0, linedef: 0, side: 1, offset: 0 }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SEG_SIZE);
        buf.clear();
        BareSector{
            floor_height: 0, ceiling_height: 128,
            floor_texture: "FLOOR4_8".into(), ceiling_texture: "CEIL3_5".into(),
            light: 160, sector_type: 0, sector_tag: 0,
        }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SECTOR_SIZE);
        let sectors = parse_sectors(&buf).unwrap();
        assert_eq!(sectors[0].floor_texture, "FLOOR4_8");
        assert_eq!(sectors[0].light, 160);
    }
}
