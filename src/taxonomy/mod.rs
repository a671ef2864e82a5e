mod reference;
mod resolve;
mod subset;

pub use reference::{CategoryTable, DEFAULT_CATEGORIES_URL};
pub use resolve::{
    build_category_map, detect_shape, resolve_with_shape, split_path_head, split_taxonomy_head,
    walk_parent_chain, CategoryMap, TableShape,
};
pub use subset::{
    build_subset, parse_primary_category, prepare_subset, write_subset_outputs, PreparedSubset,
    SubsetOptions,
};
