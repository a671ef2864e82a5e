pub mod classify;
pub mod domain;
pub mod places;
pub mod report;
pub mod taxonomy;
pub mod utils;

pub use classify::{ClassifierRunner, ConfusionMatrix, LlmClient, MockLlmClient, OpenAiChatClient};
pub use domain::{PoiSubsetRow, PredictionRow, TOP_LEVEL_CATEGORIES};
pub use places::{BoundingBox, PlacesFetchConfig};
pub use taxonomy::{CategoryMap, CategoryTable, TableShape};
