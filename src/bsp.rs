//! Everything that walks the BSP tree: which side of a splitter a point is on, visiting subsectors
//! in near-to-far order, finding the sector under a point, and turning a subsector into wall and
//! floor geometry.

use bit_vec::BitVec;

use super::errors::{ErrorKind, Result};
use super::geom::{MapPoint, TexCoord, WorldPoint, map_to_world};
use super::map::{Facing, Handle, Level, Node, NodeChild, Sector, Subsector};


/// Which side of a node's splitter a point falls on.
///
/// This is the same test the game's renderer makes, quirks included: the stored direction is
/// shifted right by 16 before multiplying, which leaves only 0 or -1 for any delta on disk.  Points
/// therefore land on exactly the side they do in the game.  Ties go to the back.
pub fn classify_point(point: MapPoint, node: &Node) -> Facing {
    let dx = point.x as i64 - node.x as i64;
    let dy = point.y as i64 - node.y as i64;
    let left = (node.dy >> 16) as i64 * dx;
    let right = (node.dx >> 16) as i64 * dy;
    if right < left {
        Facing::Front
    }
    else {
        Facing::Back
    }
}

fn child_slot(facing: Facing) -> usize {
    match facing {
        Facing::Front => 0,
        Facing::Back => 1,
    }
}


/// Visits subsectors starting from `start`, always descending into the child on the same side as
/// `point` first.  The far child is only descended into when `far_filter` says so.
///
/// The tree on disk is just an array of indices, so nothing stops it from looping back on itself;
/// reaching any node a second time fails with `CyclicTree`.
pub fn traverse<F, V>(level: &Level, point: MapPoint, start: NodeChild, mut far_filter: F, mut visit: V) -> Result<()>
where
    F: FnMut(NodeChild) -> bool,
    V: FnMut(Handle<Subsector>) -> Result<()>,
{
    let start = level.check_child(start)?;
    let mut visited = BitVec::from_elem(level.nodes().len(), false);
    traverse_from(level, point, start, &mut visited, &mut far_filter, &mut visit)
}

fn traverse_from<F, V>(
    level: &Level, point: MapPoint, child: NodeChild,
    visited: &mut BitVec, far_filter: &mut F, visit: &mut V,
) -> Result<()>
where
    F: FnMut(NodeChild) -> bool,
    V: FnMut(Handle<Subsector>) -> Result<()>,
{
    let handle = match child {
        NodeChild::Subsector(subsector) => {
            return visit(subsector);
        }
        NodeChild::Node(handle) => handle,
    };
    if visited.get(handle.index()).unwrap_or(false) {
        bail!(ErrorKind::CyclicTree(handle.index()));
    }
    visited.set(handle.index(), true);

    let node = level.node(handle);
    let near = child_slot(classify_point(point, node));
    traverse_from(level, point, node.children[near], visited, far_filter, visit)?;
    let far = node.children[near ^ 1];
    if far_filter(far) {
        traverse_from(level, point, far, visited, far_filter, visit)?;
    }
    Ok(())
}

/// Visits every subsector in the level, nearest to `point` first.  Does nothing for a level with
/// no subsectors at all.
pub fn traverse_all<V>(level: &Level, point: MapPoint, visit: V) -> Result<()>
where
    V: FnMut(Handle<Subsector>) -> Result<()>,
{
    match level.root() {
        Some(root) => traverse(level, point, root, |_| true, visit),
        None => Ok(()),
    }
}

/// Visits only the subsectors on `point`'s side of every splitter, which is just the one
/// containing it.
pub fn traverse_near<V>(level: &Level, point: MapPoint, visit: V) -> Result<()>
where
    V: FnMut(Handle<Subsector>) -> Result<()>,
{
    match level.root() {
        Some(root) => traverse(level, point, root, |_| false, visit),
        None => Ok(()),
    }
}


/// The sector at a point, found by descending through whichever child bounding box contains it,
/// front child first.  None if the point is outside every box along the way, or the subsector it
/// ends up in has no seg with a usable sidedef.
pub fn find_sector(level: &Level, point: MapPoint) -> Result<Option<Handle<Sector>>> {
    match level.root() {
        Some(root) => find_sector_from(level, point, root),
        None => Ok(None),
    }
}

pub fn find_sector_from(level: &Level, point: MapPoint, start: NodeChild) -> Result<Option<Handle<Sector>>> {
    let mut child = level.check_child(start)?;
    let mut last_node = 0;
    // A path through a well-formed tree can't touch more nodes than there are
    for _ in 0 ..= level.nodes().len() {
        let handle = match child {
            NodeChild::Subsector(subsector) => {
                return Ok(subsector_sector(level, subsector));
            }
            NodeChild::Node(handle) => handle,
        };
        last_node = handle.index();
        let node = level.node(handle);
        child = match node.bboxes.iter().position(|bbox| bbox.contains(point)) {
            Some(slot) => node.children[slot],
            None => {
                return Ok(None);
            }
        };
    }
    bail!(ErrorKind::CyclicTree(last_node));
}

/// The first sector any of a subsector's segs can vouch for, trying each seg's own side before
/// the side across the line.
pub fn subsector_sector(level: &Level, subsector: Handle<Subsector>) -> Option<Handle<Sector>> {
    for seg in level.subsector_segs(subsector) {
        if let Some(side) = level.seg_side(seg) {
            return Some(side.sector);
        }
        if let Some(side) = level.seg_opposite_side(seg) {
            return Some(side.sector);
        }
    }
    None
}


/// Whatever ends up holding decoded textures and flats for rendering.  Geometry generation asks
/// for every texture it references; asking twice for the same name must be harmless.
pub trait TextureCache {
    fn cache_texture(&mut self, name: &str) -> Result<()>;
    fn cache_flat(&mut self, name: &str) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WallPart {
    Upper,
    Middle,
    Lower,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshVertex {
    pub position: WorldPoint,
    pub uv: TexCoord,
}

/// One wall section as two triangles, ready to draw.  The texture spans the whole quad once: U
/// runs 0 to 1 along the line, V runs 0 at the top edge to 1 at the bottom edge.
#[derive(Clone, Debug)]
pub struct WallQuad {
    pub part: WallPart,
    pub texture: String,
    pub light: i16,
    pub vertices: [MeshVertex; 6],
}

/// A line's endpoints, which are on the boundary of the floor of one subsector.
#[derive(Clone, Debug)]
pub struct FloorContribution {
    pub sector: Handle<Sector>,
    pub flat: String,
    pub points: [MapPoint; 2],
}

#[derive(Clone, Debug, Default)]
pub struct SubsectorGeometry {
    pub walls: Vec<WallQuad>,
    pub floor: Vec<FloorContribution>,
}

fn is_textured(name: &str) -> bool {
    !name.is_empty() && name != "-"
}

/// Builds the quad between heights `a` and `b`, where `a` is the edge V=1 sits on.
fn wall_quad(part: WallPart, texture: &str, light: i16, start: MapPoint, end: MapPoint, a: i16, b: i16) -> WallQuad {
    let vertex = |point, height: i16, u, v| MeshVertex{
        position: map_to_world(point, height as i32),
        uv: TexCoord::new(u, v),
    };
    WallQuad{
        part,
        texture: texture.to_owned(),
        light,
        vertices: [
            vertex(start, a, 0.0, 1.0),
            vertex(start, b, 0.0, 0.0),
            vertex(end, b, 1.0, 0.0),
            vertex(end, b, 1.0, 0.0),
            vertex(end, a, 1.0, 1.0),
            vertex(start, a, 0.0, 1.0),
        ],
    }
}

/// Asks the cache for something, shrugging off names it's never heard of: a missing texture
/// shouldn't stop the rest of the level from being built.
fn request(result: Result<()>, what: &str, name: &str) -> Result<()> {
    if let Err(err) = result {
        if let ErrorKind::NotFound(..) = *err.kind() {
            warn!("{} {} is missing: {}", what, name, err);
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

/// Produces the walls and floor outline points for one subsector, asking `cache` for every
/// texture and flat they use along the way.
///
/// Each seg contributes through the sidedef it runs along; segs on the missing side of a
/// one-sided line contribute nothing.  Upper and lower sections only exist where there's a sector
/// on the other side to step up or down to.
pub fn generate_subsector_geometry(
    level: &Level, subsector: Handle<Subsector>, cache: &mut TextureCache,
) -> Result<SubsectorGeometry> {
    let subsector = level.check_subsector(subsector)?;
    let mut geometry = SubsectorGeometry::default();
    for seg in level.subsector_segs(subsector) {
        let side = match level.seg_side(seg) {
            Some(side) => side,
            None => continue,
        };
        let sector = level.sector(side.sector);
        let opposite = level.seg_opposite_side(seg).map(|other| level.sector(other.sector));
        let (start, end) = level.line_endpoints(level.line(seg.line));

        if is_textured(&sector.floor_texture) {
            geometry.floor.push(FloorContribution{
                sector: side.sector,
                flat: sector.floor_texture.clone(),
                points: [start, end],
            });
            request(cache.cache_flat(&sector.floor_texture), "flat", &sector.floor_texture)?;
        }

        if let Some(opposite) = opposite {
            if is_textured(&side.upper_texture) {
                geometry.walls.push(wall_quad(
                    WallPart::Upper, &side.upper_texture, sector.light, start, end,
                    sector.ceiling_height, opposite.ceiling_height));
                request(cache.cache_texture(&side.upper_texture), "texture", &side.upper_texture)?;
            }
        }

        if is_textured(&side.middle_texture) {
            geometry.walls.push(wall_quad(
                WallPart::Middle, &side.middle_texture, sector.light, start, end,
                sector.floor_height, sector.ceiling_height));
            request(cache.cache_texture(&side.middle_texture), "texture", &side.middle_texture)?;
        }

        if let Some(opposite) = opposite {
            if is_textured(&side.lower_texture) {
                geometry.walls.push(wall_quad(
                    WallPart::Lower, &side.lower_texture, sector.light, start, end,
                    sector.floor_height, opposite.floor_height));
                request(cache.cache_texture(&side.lower_texture), "texture", &side.lower_texture)?;
            }
        }
    }
    Ok(geometry)
}
