//! Assembling a whole level's renderable geometry: walls per subsector, floors per subsector
//! within each sector, and the decoded images they're textured with.

use std::collections::{BTreeMap, HashMap};

use super::bsp::{MeshVertex, SubsectorGeometry, TextureCache, WallQuad, generate_subsector_geometry, traverse_all};
use super::errors::Result;
use super::geom::{MapPoint, TexCoord, map_to_world};
use super::map::{Handle, Level, Sector, Subsector};
use super::picture::RgbaImage;
use super::universe::Universe;


/// Decoded RGBA images for every texture and flat the scene asks for, each decoded at most once.
pub struct MaterialCache<'u, R: 'u> {
    universe: &'u Universe<R>,
    textures: HashMap<String, RgbaImage>,
    flats: HashMap<String, RgbaImage>,
}

impl<'u, R> MaterialCache<'u, R> {
    pub fn new(universe: &'u Universe<R>) -> Self {
        MaterialCache {
            universe,
            textures: HashMap::new(),
            flats: HashMap::new(),
        }
    }

    pub fn texture(&self, name: &str) -> Option<&RgbaImage> {
        self.textures.get(name)
    }

    pub fn flat(&self, name: &str) -> Option<&RgbaImage> {
        self.flats.get(name)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn flat_count(&self) -> usize {
        self.flats.len()
    }
}

impl<'u, R> TextureCache for MaterialCache<'u, R> {
    fn cache_texture(&mut self, name: &str) -> Result<()> {
        if self.textures.contains_key(name) {
            return Ok(());
        }
        let image = self.universe.texture_rgba(name)?;
        self.textures.insert(name.to_owned(), image);
        Ok(())
    }

    fn cache_flat(&mut self, name: &str) -> Result<()> {
        if self.flats.contains_key(name) {
            return Ok(());
        }
        let image = self.universe.flat_rgba(name)?;
        self.flats.insert(name.to_owned(), image);
        Ok(())
    }
}


/// Turns a set of floor outline points into triangles.  Implementations return index triples
/// into `points`.
pub trait Triangulator {
    fn triangulate(&self, points: &[MapPoint]) -> Result<Vec<[usize; 3]>>;
}

/// Fans out from the first point after sorting them around their centroid.  Only correct for
/// convex outlines, which every subsector is.
#[derive(Copy, Clone, Debug, Default)]
pub struct ConvexFan;

impl Triangulator for ConvexFan {
    fn triangulate(&self, points: &[MapPoint]) -> Result<Vec<[usize; 3]>> {
        // Every line endpoint shows up twice, once per line meeting there
        let mut unique: Vec<usize> = Vec::new();
        for (i, point) in points.iter().enumerate() {
            if !unique.iter().any(|&j| points[j] == *point) {
                unique.push(i);
            }
        }
        if unique.len() < 3 {
            return Ok(Vec::new());
        }

        let n = unique.len() as f64;
        let cx = unique.iter().map(|&i| points[i].x as f64).sum::<f64>() / n;
        let cy = unique.iter().map(|&i| points[i].y as f64).sum::<f64>() / n;
        let angle = |i: usize| (points[i].y as f64 - cy).atan2(points[i].x as f64 - cx);
        unique.sort_by(|&a, &b| angle(a).partial_cmp(&angle(b)).unwrap_or(::std::cmp::Ordering::Equal));

        let mut triangles = Vec::with_capacity(unique.len() - 2);
        for k in 1 .. unique.len() - 1 {
            triangles.push([unique[0], unique[k], unique[k + 1]]);
        }
        Ok(triangles)
    }
}


/// One subsector's share of a sector's floor.
#[derive(Clone, Debug)]
pub struct FloorMesh {
    pub sector: Handle<Sector>,
    pub subsector: Handle<Subsector>,
    pub flat: String,
    pub light: i16,
    /// Three per triangle
    pub vertices: Vec<MeshVertex>,
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Wall quads, keyed by subsector index
    pub walls: BTreeMap<usize, Vec<WallQuad>>,
    pub floors: Vec<FloorMesh>,
}

impl Scene {
    pub fn wall_count(&self) -> usize {
        self.walls.values().map(|walls| walls.len()).sum()
    }
}

/// Flats tile every 128 units.  The 32767 shift keeps the coordinates positive.
fn floor_uv(coord: i32) -> f32 {
    (coord + 32767) as f32 / 128.0
}

/// Collects subsector geometry as it's generated, then triangulates the floors in one go.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    walls: BTreeMap<usize, Vec<WallQuad>>,
    // sector -> subsector -> outline points
    floor_points: BTreeMap<usize, BTreeMap<usize, Vec<MapPoint>>>,
    floor_flats: BTreeMap<usize, String>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        SceneBuilder::default()
    }

    pub fn add_subsector(&mut self, subsector: Handle<Subsector>, geometry: SubsectorGeometry) {
        for contribution in geometry.floor {
            self.floor_flats.insert(contribution.sector.index(), contribution.flat);
            self.floor_points
                .entry(contribution.sector.index()).or_insert_with(BTreeMap::new)
                .entry(subsector.index()).or_insert_with(Vec::new)
                .extend_from_slice(&contribution.points);
        }
        self.walls.entry(subsector.index()).or_insert_with(Vec::new).extend(geometry.walls);
    }

    /// Finishes the scene.  Floor outlines with fewer than three points can't be a surface and are
    /// dropped; triangulation failures are logged and that one floor piece is dropped too.
    pub fn build(self, level: &Level, triangulator: &Triangulator) -> Scene {
        let mut floors = Vec::new();
        for (&sector_index, subsectors) in self.floor_points.iter() {
            let sector_handle: Handle<Sector> = sector_index.into();
            let sector = level.sector(sector_handle);
            let flat = match self.floor_flats.get(&sector_index) {
                Some(flat) => flat.clone(),
                None => continue,
            };
            for (&subsector_index, points) in subsectors.iter() {
                if points.len() < 3 {
                    continue;
                }
                let triangles = match triangulator.triangulate(points) {
                    Ok(triangles) => triangles,
                    Err(err) => {
                        warn!("couldn't triangulate floor of subsector {}: {}", subsector_index, err);
                        continue;
                    }
                };
                let mut vertices = Vec::with_capacity(triangles.len() * 3);
                for &i in triangles.iter().flat_map(|triangle| triangle.iter()) {
                    let point = match points.get(i) {
                        Some(&point) => point,
                        None => {
                            warn!("triangulator gave bad index {} for subsector {}", i, subsector_index);
                            vertices.clear();
                            break;
                        }
                    };
                    vertices.push(MeshVertex{
                        position: map_to_world(point, sector.floor_height as i32),
                        uv: TexCoord::new(floor_uv(point.x), floor_uv(point.y)),
                    });
                }
                if vertices.is_empty() {
                    continue;
                }
                floors.push(FloorMesh{
                    sector: sector_handle,
                    subsector: subsector_index.into(),
                    flat: flat.clone(),
                    light: sector.light,
                    vertices,
                });
            }
        }
        Scene{ walls: self.walls, floors }
    }
}

/// Generates geometry for every subsector in the level, visiting them nearest to `viewpoint`
/// first, and triangulates the floors.
pub fn build_scene(level: &Level, viewpoint: MapPoint, cache: &mut TextureCache, triangulator: &Triangulator) -> Result<Scene> {
    let mut builder = SceneBuilder::new();
    traverse_all(level, viewpoint, |subsector| {
        let geometry = generate_subsector_geometry(level, subsector, &mut *cache)?;
        builder.add_subsector(subsector, geometry);
        Ok(())
    })?;
    Ok(builder.build(level, triangulator))
}


#[cfg(test)]
mod tests {
    use super::*;
    use ::errors::ErrorKind;
    use ::parse::map::*;

    #[test]
    fn fan_over_a_square_with_repeats() {
        let points = vec![
            MapPoint::new(0, 0), MapPoint::new(0, 64),
            MapPoint::new(0, 64), MapPoint::new(64, 64),
            MapPoint::new(64, 64), MapPoint::new(64, 0),
            MapPoint::new(64, 0), MapPoint::new(0, 0),
        ];
        let triangles = ConvexFan.triangulate(&points).unwrap();
        assert_eq!(triangles.len(), 2);
        for triangle in triangles.iter() {
            let mut corners: Vec<_> = triangle.iter().map(|&i| (points[i].x, points[i].y)).collect();
            corners.sort();
            corners.dedup();
            assert_eq!(corners.len(), 3);
        }
    }

    #[test]
    fn fan_needs_three_distinct_points() {
        let points = vec![MapPoint::new(0, 0), MapPoint::new(8, 8), MapPoint::new(0, 0)];
        assert!(ConvexFan.triangulate(&points).unwrap().is_empty());
    }

    struct NullCache;

    impl TextureCache for NullCache {
        fn cache_texture(&mut self, _name: &str) -> Result<()> {
            Ok(())
        }
        fn cache_flat(&mut self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    struct BrokenTriangulator;

    impl Triangulator for BrokenTriangulator {
        fn triangulate(&self, _points: &[MapPoint]) -> Result<Vec<[usize; 3]>> {
            bail!("degenerate input");
        }
    }

    /// A single square sector with floor at 8, one subsector of four segs.
    fn square_room<'a>() -> BareLevel<'a> {
        let mut bare = BareLevel::default();
        for &(x, y) in [(0, 0), (0, 64), (64, 64), (64, 0)].iter() {
            bare.vertexes.push(BareVertex{ x, y });
        }
        bare.sectors.push(BareSector{
            floor_height: 8, ceiling_height: 72,
            floor_texture: "FLOOR4_8".into(), ceiling_texture: "CEIL3_5".into(),
            light: 144, sector_type: 0, sector_tag: 0,
        });
        for i in 0..4 {
            bare.sidedefs.push(BareSide{
                x_offset: 0, y_offset: 0,
                upper_texture: "-".into(), lower_texture: "-".into(), middle_texture: "STARTAN3".into(),
                sector: 0,
            });
            bare.linedefs.push(BareLine{
                v0: i, v1: (i + 1) % 4, flags: 1, special: 0, sector_tag: 0,
                front_sidedef: i, back_sidedef: 0xffff,
            });
            bare.segs.push(BareSeg{ v0: i, v1: (i + 1) % 4, angle: 0, linedef: i, side: 0, offset: 0 });
        }
        bare.subsectors.push(BareSubsector{ seg_count: 4, first_seg: 0 });
        bare
    }

    #[test]
    fn room_scene() {
        let level = Level::from_bare(&square_room()).unwrap();
        let scene = build_scene(&level, MapPoint::new(32, 32), &mut NullCache, &ConvexFan).unwrap();
        assert_eq!(scene.wall_count(), 4);
        assert_eq!(scene.floors.len(), 1);

        let floor = &scene.floors[0];
        assert_eq!(floor.flat, "FLOOR4_8");
        assert_eq!(floor.light, 144);
        assert_eq!(floor.vertices.len(), 6);
        for vertex in floor.vertices.iter() {
            assert_eq!(vertex.position.y, 8.0);
            assert!(vertex.position.x == 0.0 || vertex.position.x == -64.0);
        }
        let origin = floor.vertices.iter().find(|v| v.position.x == 0.0 && v.position.z == 0.0).unwrap();
        assert_eq!((origin.uv.x, origin.uv.y), (32767.0 / 128.0, 32767.0 / 128.0));
    }

    #[test]
    fn failed_triangulation_drops_only_the_floor() {
        let level = Level::from_bare(&square_room()).unwrap();
        let scene = build_scene(&level, MapPoint::new(32, 32), &mut NullCache, &BrokenTriangulator).unwrap();
        assert_eq!(scene.wall_count(), 4);
        assert!(scene.floors.is_empty());
    }

    #[test]
    fn geometry_failure_aborts_the_scene() {
        struct FailingCache;
        impl TextureCache for FailingCache {
            fn cache_texture(&mut self, _name: &str) -> Result<()> {
                bail!(ErrorKind::DataIntegrity("patch", 1, 0));
            }
            fn cache_flat(&mut self, _name: &str) -> Result<()> {
                Ok(())
            }
        }
        let level = Level::from_bare(&square_room()).unwrap();
        assert!(build_scene(&level, MapPoint::new(32, 32), &mut FailingCache, &ConvexFan).is_err());
    }
}
