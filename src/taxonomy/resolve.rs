use std::collections::{BTreeMap, HashSet};

use super::reference::CategoryTable;

pub type CategoryMap = BTreeMap<String, String>;

const CATEGORY_TOKENS: &[&str] = &["category", "value", "name"];
const CATEGORY_EXCLUDE: &[&str] = &["parent", "top"];
const PARENT_TOKENS: &[&str] = &["parent"];
const TOP_LEVEL_TOKENS: &[&str] = &["top_level", "toplevel", "top level"];
const PATH_TOKENS: &[&str] = &["path", "hierarchy", "lineage"];
const TAXONOMY_TOKENS: &[&str] = &["taxonomy"];

// Ordre de priorité des séparateurs de chemin hiérarchique.
const PATH_SEPARATORS: &[&str] = &[" > ", ">", "/", "|"];

/// Forme de schéma reconnue dans la table de référence. Détectée une seule
/// fois, puis résolue par une fonction pure par variante.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    TopLevelColumn { category: usize, top_level: usize },
    TaxonomyList { category: usize, taxonomy: usize },
    HierarchicalPath { category: usize, path: usize },
    ParentChain { category: usize, parent: usize },
    Identity { category: usize },
}

fn pick_column(headers: &[String], contains_any: &[&str], exclude_any: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let key = header.to_lowercase();
        let key = key.trim();
        contains_any.iter().any(|token| key.contains(token))
            && !exclude_any.iter().any(|token| key.contains(token))
    })
}

/// Détection par correspondance de sous-chaîne insensible à la casse, dans
/// l'ordre strict : colonne top-level, liste de taxonomie, chemin
/// hiérarchique, pointeur de parent, puis repli identité. La colonne de
/// catégorie retombe sur la première colonne si aucun nom ne correspond.
pub fn detect_shape(headers: &[String]) -> TableShape {
    let category = pick_column(headers, CATEGORY_TOKENS, CATEGORY_EXCLUDE).unwrap_or(0);

    if let Some(top_level) = pick_column(headers, TOP_LEVEL_TOKENS, &[]) {
        return TableShape::TopLevelColumn {
            category,
            top_level,
        };
    }
    if let Some(taxonomy) = pick_column(headers, TAXONOMY_TOKENS, &[]) {
        return TableShape::TaxonomyList { category, taxonomy };
    }
    if let Some(path) = pick_column(headers, PATH_TOKENS, &[]) {
        return TableShape::HierarchicalPath { category, path };
    }
    if let Some(parent) = pick_column(headers, PARENT_TOKENS, &[]) {
        return TableShape::ParentChain { category, parent };
    }
    TableShape::Identity { category }
}

/// Premier segment d'une liste `[a, b, c]` ou `a, b, c`.
pub fn split_taxonomy_head(value: &str) -> Option<String> {
    let mut text = value.trim();
    if text.starts_with('[') && text.ends_with(']') && text.len() >= 2 {
        text = &text[1..text.len() - 1];
    }
    let head = text.split(',').next()?.trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Premier segment d'un chemin hiérarchique, en coupant sur le premier
/// séparateur trouvé dans l'ordre de priorité.
pub fn split_path_head(value: &str) -> Option<String> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }
    for separator in PATH_SEPARATORS {
        if let Some((head, _)) = text.split_once(separator) {
            let head = head.trim();
            if head.is_empty() {
                return None;
            }
            return Some(head.to_string());
        }
    }
    Some(text.to_string())
}

/// Remonte la chaîne de parents jusqu'à la racine. L'ensemble des noeuds
/// visités borne la marche : sur un cycle, le noeud atteint au moment de la
/// répétition est renvoyé tel quel (repli assumé, pas une erreur).
pub fn walk_parent_chain<'a>(start: &'a str, parents: &'a BTreeMap<String, String>) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = start;
    while let Some(parent) = parents.get(current) {
        if !seen.insert(current) {
            break;
        }
        if parent.trim().is_empty() {
            break;
        }
        current = parent;
    }
    current.to_string()
}

pub fn build_category_map(table: &CategoryTable) -> CategoryMap {
    resolve_with_shape(table, detect_shape(&table.headers))
}

pub fn resolve_with_shape(table: &CategoryTable, shape: TableShape) -> CategoryMap {
    match shape {
        TableShape::TopLevelColumn {
            category,
            top_level,
        } => resolve_cells(table, category, top_level, |cell| Some(cell.to_string())),
        TableShape::TaxonomyList { category, taxonomy } => {
            resolve_cells(table, category, taxonomy, split_taxonomy_head)
        }
        TableShape::HierarchicalPath { category, path } => {
            resolve_cells(table, category, path, split_path_head)
        }
        TableShape::ParentChain { category, parent } => {
            resolve_parent_chain(table, category, parent)
        }
        TableShape::Identity { category } => resolve_identity(table, category),
    }
}

fn resolve_cells(
    table: &CategoryTable,
    category: usize,
    source: usize,
    extract: impl Fn(&str) -> Option<String>,
) -> CategoryMap {
    let mut map = CategoryMap::new();
    for row in &table.rows {
        let Some(leaf) = table.cell(row, category) else {
            continue;
        };
        let Some(cell) = table.cell(row, source) else {
            continue;
        };
        if let Some(top_level) = extract(cell) {
            map.insert(leaf.to_string(), top_level);
        }
    }
    map
}

fn resolve_parent_chain(table: &CategoryTable, category: usize, parent: usize) -> CategoryMap {
    // Les cellules de parent vides restent présentes (chaîne vide) : la
    // marche s'y arrête, comme sur une racine.
    let mut parents: BTreeMap<String, String> = BTreeMap::new();
    for row in &table.rows {
        let Some(leaf) = table.cell(row, category) else {
            continue;
        };
        let value = table.cell(row, parent).unwrap_or("");
        parents.insert(leaf.to_string(), value.to_string());
    }

    parents
        .keys()
        .map(|leaf| (leaf.clone(), walk_parent_chain(leaf, &parents)))
        .collect()
}

fn resolve_identity(table: &CategoryTable, category: usize) -> CategoryMap {
    let mut map = CategoryMap::new();
    for row in &table.rows {
        if let Some(leaf) = table.cell(row, category) {
            map.entry(leaf.to_string()).or_insert_with(|| leaf.to_string());
        }
    }
    map
}
