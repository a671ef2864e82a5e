mod heatmap;
mod map;

pub use heatmap::{parse_figsize, render_heatmap};
pub use map::{render_scatter, write_leaflet_map};
