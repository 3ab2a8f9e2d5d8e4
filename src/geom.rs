use euclid::{TypedPoint2D, TypedPoint3D, TypedRect, TypedSize2D};

/// The map's own coordinate system: integer map units, +Y is north.
pub struct MapSpace;
pub type MapCoord = i32;
pub type MapPoint = TypedPoint2D<MapCoord, MapSpace>;
pub type MapRect = TypedRect<MapCoord, MapSpace>;
pub type MapSize = TypedSize2D<MapCoord, MapSpace>;

/// What a renderer sees: X is the map's X mirrored, Y is height, Z is the map's Y.
pub struct WorldSpace;
pub type WorldPoint = TypedPoint3D<f32, WorldSpace>;

pub struct TextureSpace;
pub type TexCoord = TypedPoint2D<f32, TextureSpace>;

/// Lifts a map point to a given height in world space.
pub fn map_to_world(point: MapPoint, height: i32) -> WorldPoint {
    WorldPoint::new(-point.x as f32, height as f32, point.y as f32)
}
