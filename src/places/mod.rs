mod fetch;

pub use fetch::{
    build_places_query, fetch_places, point_coordinates, BoundingBox, PlacesFetchConfig,
};
