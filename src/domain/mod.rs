mod rows;
mod taxonomy;

pub use rows::{BaselineMetrics, PoiSubsetRow, PredictionRow};
pub use taxonomy::{find_top_level, is_top_level, AMBIGUOUS_CATEGORIES, TOP_LEVEL_CATEGORIES};
