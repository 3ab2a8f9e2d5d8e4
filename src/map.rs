use std::cmp;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use super::errors::{ErrorKind, Result};
use super::geom::{MapPoint, MapRect, MapSize};
use super::parse::map::BareLevel;


/// Marks a node child slot as a subsector rather than another node.
pub const SUBSECTOR_BIT: u16 = 0x8000;
const NO_SIDEDEF: u16 = 0xffff;


/// An index into one of a level's arrays, typed by what it points at.  Handles only come out of a
/// `Level` that has already checked them, so looking one up never goes out of bounds.
pub struct Handle<T>(usize, PhantomData<*const T>);

impl<T> Handle<T> {
    pub fn index(&self) -> usize {
        self.0
    }
}

// Implemented by hand because the auto-generated Clone impl assumes T must also be Clone, but we
// don't actually own a T, so that trait is unnecessary.  Same for Copy, PartialEq, Debug.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        return Handle(self.0, PhantomData);
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl<T> From<usize> for Handle<T> {
    fn from(index: usize) -> Self {
        return Handle(index, PhantomData);
    }
}

fn checked<T>(what: &'static str, index: usize, len: usize) -> Result<Handle<T>> {
    if index >= len {
        bail!(ErrorKind::DataIntegrity(what, index, len));
    }
    Ok(index.into())
}


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn opposite(self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }
}


bitflags! {
    pub struct LineFlags: u16 {
        const BLOCKING = 0x0001;
        const BLOCK_MONSTERS = 0x0002;
        const TWO_SIDED = 0x0004;
        const UPPER_UNPEGGED = 0x0008;
        const LOWER_UNPEGGED = 0x0010;
        const SECRET = 0x0020;
        const BLOCK_SOUND = 0x0040;
        const NEVER_ON_AUTOMAP = 0x0080;
        const ALWAYS_ON_AUTOMAP = 0x0100;
    }
}


#[derive(Clone, Debug)]
pub struct Thing {
    pub point: MapPoint,
    pub angle: i16,
    pub doomednum: i16,
    pub flags: u16,
}

#[derive(Clone, Debug)]
pub struct Vertex {
    pub point: MapPoint,
}

#[derive(Clone, Debug)]
pub struct Line {
    pub start: Handle<Vertex>,
    pub end: Handle<Vertex>,
    pub flags: LineFlags,
    pub special: i16,
    pub sector_tag: i16,
    pub front: Option<Handle<Side>>,
    pub back: Option<Handle<Side>>,
}

impl Line {
    pub fn side(&self, facing: Facing) -> Option<Handle<Side>> {
        match facing {
            Facing::Front => self.front,
            Facing::Back => self.back,
        }
    }

    pub fn has_special(&self) -> bool {
        self.special != 0
    }
}

#[derive(Clone, Debug)]
pub struct Side {
    pub x_offset: i16,
    pub y_offset: i16,
    pub upper_texture: String,
    pub lower_texture: String,
    pub middle_texture: String,
    pub sector: Handle<Sector>,
}

/// A piece of a line, as cut up by the node builder.
#[derive(Clone, Debug)]
pub struct Seg {
    pub start: Handle<Vertex>,
    pub end: Handle<Vertex>,
    pub angle: i16,
    pub line: Handle<Line>,
    /// Which side of the line this seg runs along
    pub facing: Facing,
    pub offset: i16,
}

/// A convex leaf of the BSP tree: a contiguous run of segs.
#[derive(Clone, Debug)]
pub struct Subsector {
    pub first_seg: usize,
    pub seg_count: usize,
}

impl Subsector {
    pub fn seg_range(&self) -> Range<usize> {
        self.first_seg .. self.first_seg + self.seg_count
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

impl BoundingBox {
    /// Strictly inside; points on an edge are not contained.
    pub fn contains(&self, point: MapPoint) -> bool {
        point.x > self.left && point.x < self.right && point.y > self.bottom && point.y < self.top
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeChild {
    Node(Handle<Node>),
    Subsector(Handle<Subsector>),
}

impl NodeChild {
    /// Decodes an on-disk child slot.  The high bit marks a subsector; 0xffff (-1 when read
    /// signed) is special-cased to subsector 0.
    pub fn from_raw(raw: u16) -> NodeChild {
        if raw == 0xffff {
            NodeChild::Subsector(0usize.into())
        }
        else if raw & SUBSECTOR_BIT != 0 {
            NodeChild::Subsector(((raw & !SUBSECTOR_BIT) as usize).into())
        }
        else {
            NodeChild::Node((raw as usize).into())
        }
    }
}

/// A BSP node.  The split line's origin and direction are both kept exactly as stored on disk, in
/// whole map units.
#[derive(Clone, Debug)]
pub struct Node {
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
    /// Bounding boxes of the front (0) and back (1) children
    pub bboxes: [BoundingBox; 2],
    pub children: [NodeChild; 2],
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor_height: i16,
    pub ceiling_height: i16,
    pub floor_texture: String,
    pub ceiling_texture: String,
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}


/// One level's worth of geometry, with every cross-reference checked.  Read-only once built.
#[derive(Clone, Debug, Default)]
pub struct Level {
    things: Vec<Thing>,
    lines: Vec<Line>,
    sides: Vec<Side>,
    vertices: Vec<Vertex>,
    segs: Vec<Seg>,
    subsectors: Vec<Subsector>,
    nodes: Vec<Node>,
    sectors: Vec<Sector>,
}

impl Level {
    /// Converts the raw arrays, failing with `DataIntegrity` on the first index that points past
    /// the end of the array it refers to.
    pub fn from_bare(bare: &BareLevel) -> Result<Self> {
        let vertex_count = bare.vertexes.len();
        let side_count = bare.sidedefs.len();
        let sector_count = bare.sectors.len();
        let line_count = bare.linedefs.len();
        let seg_count = bare.segs.len();
        let subsector_count = bare.subsectors.len();
        let node_count = bare.nodes.len();

        let mut level = Level::default();

        for bare_thing in bare.things.iter() {
            level.things.push(Thing{
                point: MapPoint::new(bare_thing.x as i32, bare_thing.y as i32),
                angle: bare_thing.angle,
                doomednum: bare_thing.doomednum,
                flags: bare_thing.flags,
            });
        }

        for bare_vertex in bare.vertexes.iter() {
            level.vertices.push(Vertex{ point: MapPoint::new(bare_vertex.x as i32, bare_vertex.y as i32) });
        }

        for bare_sector in bare.sectors.iter() {
            level.sectors.push(Sector{
                floor_height: bare_sector.floor_height,
                ceiling_height: bare_sector.ceiling_height,
                floor_texture: bare_sector.floor_texture.to_string(),
                ceiling_texture: bare_sector.ceiling_texture.to_string(),
                light: bare_sector.light,
                special: bare_sector.sector_type,
                tag: bare_sector.sector_tag,
            });
        }

        for bare_side in bare.sidedefs.iter() {
            level.sides.push(Side{
                x_offset: bare_side.x_offset,
                y_offset: bare_side.y_offset,
                upper_texture: bare_side.upper_texture.to_string(),
                lower_texture: bare_side.lower_texture.to_string(),
                middle_texture: bare_side.middle_texture.to_string(),
                sector: checked("sector", bare_side.sector as usize, sector_count)?,
            });
        }

        for bare_line in bare.linedefs.iter() {
            let optional_side = |raw: u16| -> Result<Option<Handle<Side>>> {
                if raw == NO_SIDEDEF {
                    Ok(None)
                }
                else {
                    Ok(Some(checked("sidedef", raw as usize, side_count)?))
                }
            };
            level.lines.push(Line{
                start: checked("vertex", bare_line.v0 as usize, vertex_count)?,
                end: checked("vertex", bare_line.v1 as usize, vertex_count)?,
                flags: LineFlags::from_bits_truncate(bare_line.flags),
                special: bare_line.special,
                sector_tag: bare_line.sector_tag,
                front: optional_side(bare_line.front_sidedef)?,
                back: optional_side(bare_line.back_sidedef)?,
            });
        }

        for bare_seg in bare.segs.iter() {
            level.segs.push(Seg{
                start: checked("vertex", bare_seg.v0 as usize, vertex_count)?,
                end: checked("vertex", bare_seg.v1 as usize, vertex_count)?,
                angle: bare_seg.angle,
                line: checked("linedef", bare_seg.linedef as usize, line_count)?,
                facing: if bare_seg.side == 0 { Facing::Front } else { Facing::Back },
                offset: bare_seg.offset,
            });
        }

        for bare_subsector in bare.subsectors.iter() {
            let first_seg = bare_subsector.first_seg as usize;
            let count = bare_subsector.seg_count as usize;
            if count > 0 {
                checked::<Seg>("seg", first_seg + count - 1, seg_count)?;
            }
            level.subsectors.push(Subsector{ first_seg, seg_count: count });
        }

        for bare_node in bare.nodes.iter() {
            let mut bboxes = [BoundingBox{ top: 0, bottom: 0, left: 0, right: 0 }; 2];
            for (bbox, bare_bbox) in bboxes.iter_mut().zip(bare_node.bboxes.iter()) {
                *bbox = BoundingBox{
                    top: bare_bbox.top as i32,
                    bottom: bare_bbox.bottom as i32,
                    left: bare_bbox.left as i32,
                    right: bare_bbox.right as i32,
                };
            }
            let mut children = [NodeChild::Subsector(0usize.into()); 2];
            for (child, &raw) in children.iter_mut().zip(bare_node.children.iter()) {
                *child = match NodeChild::from_raw(raw) {
                    NodeChild::Node(h) => NodeChild::Node(checked("node", h.index(), node_count)?),
                    NodeChild::Subsector(h) => NodeChild::Subsector(checked("subsector", h.index(), subsector_count)?),
                };
            }
            level.nodes.push(Node{
                x: bare_node.x as i32,
                y: bare_node.y as i32,
                dx: bare_node.dx as i32,
                dy: bare_node.dy as i32,
                bboxes,
                children,
            });
        }

        debug!(
            "level has {} things, {} lines, {} sides, {} vertices, {} segs, {} subsectors, {} nodes, {} sectors",
            level.things.len(), level.lines.len(), level.sides.len(), level.vertices.len(),
            level.segs.len(), level.subsectors.len(), level.nodes.len(), level.sectors.len());
        Ok(level)
    }

    pub fn things(&self) -> &[Thing] {
        &self.things
    }
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }
    pub fn sides(&self) -> &[Side] {
        &self.sides
    }
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }
    pub fn segs(&self) -> &[Seg] {
        &self.segs
    }
    pub fn subsectors(&self) -> &[Subsector] {
        &self.subsectors
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn vertex(&self, handle: Handle<Vertex>) -> &Vertex {
        &self.vertices[handle.0]
    }
    pub fn line(&self, handle: Handle<Line>) -> &Line {
        &self.lines[handle.0]
    }
    pub fn side(&self, handle: Handle<Side>) -> &Side {
        &self.sides[handle.0]
    }
    pub fn sector(&self, handle: Handle<Sector>) -> &Sector {
        &self.sectors[handle.0]
    }
    pub fn node(&self, handle: Handle<Node>) -> &Node {
        &self.nodes[handle.0]
    }
    pub fn subsector(&self, handle: Handle<Subsector>) -> &Subsector {
        &self.subsectors[handle.0]
    }

    /// Handles can be made from any index, so anything taking one from outside checks it here
    /// first.
    pub fn check_subsector(&self, handle: Handle<Subsector>) -> Result<Handle<Subsector>> {
        checked("subsector", handle.index(), self.subsectors.len())
    }

    pub fn check_child(&self, child: NodeChild) -> Result<NodeChild> {
        Ok(match child {
            NodeChild::Node(h) => NodeChild::Node(checked("node", h.index(), self.nodes.len())?),
            NodeChild::Subsector(h) => NodeChild::Subsector(self.check_subsector(h)?),
        })
    }

    pub fn subsector_segs(&self, handle: Handle<Subsector>) -> &[Seg] {
        &self.segs[self.subsector(handle).seg_range()]
    }

    /// Where traversal starts: the last node, or for a level too small to need any nodes, its one
    /// subsector.
    pub fn root(&self) -> Option<NodeChild> {
        if !self.nodes.is_empty() {
            Some(NodeChild::Node((self.nodes.len() - 1).into()))
        }
        else if !self.subsectors.is_empty() {
            Some(NodeChild::Subsector(0usize.into()))
        }
        else {
            None
        }
    }

    /// The sidedef a seg is drawn along, if its line has one on that side.
    pub fn seg_side(&self, seg: &Seg) -> Option<&Side> {
        self.line(seg.line).side(seg.facing).map(|h| self.side(h))
    }

    /// The sidedef on the far side of a seg's line.
    pub fn seg_opposite_side(&self, seg: &Seg) -> Option<&Side> {
        self.line(seg.line).side(seg.facing.opposite()).map(|h| self.side(h))
    }

    pub fn line_endpoints(&self, line: &Line) -> (MapPoint, MapPoint) {
        (self.vertex(line.start).point, self.vertex(line.end).point)
    }

    /// Smallest rectangle containing every vertex.
    pub fn bbox(&self) -> MapRect {
        let mut iter = self.vertices.iter();
        let first = match iter.next() {
            Some(vertex) => vertex.point,
            None => return MapRect::new(MapPoint::new(0, 0), MapSize::new(0, 0)),
        };
        let (mut left, mut bottom, mut right, mut top) = (first.x, first.y, first.x, first.y);
        for vertex in iter {
            left = cmp::min(left, vertex.point.x);
            right = cmp::max(right, vertex.point.x);
            bottom = cmp::min(bottom, vertex.point.y);
            top = cmp::max(top, vertex.point.y);
        }
        MapRect::new(MapPoint::new(left, bottom), MapSize::new(right - left, top - bottom))
    }
}
