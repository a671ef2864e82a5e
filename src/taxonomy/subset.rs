use anyhow::{bail, Context, Result};
use chrono::Utc;
use geojson::{Feature, FeatureCollection, GeoJson};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{BaselineMetrics, PoiSubsetRow};
use super::resolve::CategoryMap;

#[derive(Debug, Clone, Copy)]
pub struct SubsetOptions {
    pub sample_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct PreparedSubset {
    pub rows: Vec<PoiSubsetRow>,
    /// Valeurs top-level distinctes et triées du mapping résolu.
    pub top_levels: Vec<String>,
    pub metrics: BaselineMetrics,
}

/// Catégorie feuille d'un enregistrement de lieu : membre `primary` du blob
/// `categories_json`, fourni soit en objet soit en texte JSON.
pub fn parse_primary_category(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::Object(map) => map.get("primary").and_then(Value::as_str).map(str::to_string),
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text).ok()?;
            parsed
                .as_object()?
                .get("primary")?
                .as_str()
                .map(str::to_string)
        }
        _ => None,
    }
}

fn property<'a>(feature: &'a Feature, key: &str) -> Option<&'a Value> {
    feature.properties.as_ref()?.get(key)
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    property(feature, key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

pub fn build_subset(
    collection: &FeatureCollection,
    map: &CategoryMap,
    options: SubsetOptions,
) -> Result<PreparedSubset> {
    let features = &collection.features;
    if features
        .iter()
        .all(|feature| property(feature, "categories_json").is_none())
    {
        bail!("places.geojson : champ categories_json absent des propriétés");
    }

    let mut all_rows = Vec::with_capacity(features.len());
    let mut with_primary_category = 0usize;
    let mut with_top_level_mapping = 0usize;

    for feature in features {
        let leaf = parse_primary_category(property(feature, "categories_json"));
        let top_level = leaf.as_deref().and_then(|leaf| map.get(leaf)).cloned();
        if leaf.is_some() {
            with_primary_category += 1;
        }
        if top_level.is_some() {
            with_top_level_mapping += 1;
        }

        all_rows.push(PoiSubsetRow {
            id: string_property(feature, "id").unwrap_or_default(),
            primary_name: string_property(feature, "primary_name").unwrap_or_default(),
            overture_primary_category: leaf,
            top_level_category: top_level,
            confidence: property(feature, "confidence").and_then(Value::as_f64),
            basic_category: string_property(feature, "basic_category"),
            operating_status: string_property(feature, "operating_status"),
            names_json: string_property(feature, "names_json"),
            addresses_json: string_property(feature, "addresses_json"),
            brand_json: string_property(feature, "brand_json"),
        });
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let amount = options.sample_size.min(all_rows.len());
    let rows: Vec<PoiSubsetRow> = rand::seq::index::sample(&mut rng, all_rows.len(), amount)
        .iter()
        .map(|index| all_rows[index].clone())
        .collect();

    let top_levels: Vec<String> = map
        .values()
        .filter(|value| !value.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let metrics = BaselineMetrics {
        total_pois: all_rows.len(),
        sample_size: rows.len(),
        with_primary_category,
        with_top_level_mapping,
        generated_at: Utc::now(),
    };

    Ok(PreparedSubset {
        rows,
        top_levels,
        metrics,
    })
}

pub fn prepare_subset(
    places_path: &Path,
    map: &CategoryMap,
    options: SubsetOptions,
) -> Result<PreparedSubset> {
    let raw = fs::read_to_string(places_path)
        .with_context(|| format!("impossible de lire les lieux depuis {:?}", places_path))?;
    let geojson: GeoJson = raw
        .parse()
        .with_context(|| format!("GeoJSON invalide dans {:?}", places_path))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        bail!("{:?} n'est pas une FeatureCollection", places_path);
    };

    info!(lieux = collection.features.len(), "lieux chargés");
    build_subset(&collection, map, options)
}

/// Écrit le sous-ensemble, la taxonomie et les métriques dans `outdir` ;
/// renvoie les trois chemins dans cet ordre.
pub fn write_subset_outputs(
    prepared: &PreparedSubset,
    outdir: &Path,
) -> Result<(PathBuf, PathBuf, PathBuf)> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("impossible de créer le dossier {:?}", outdir))?;

    let subset_path = outdir.join("poi_subset.csv");
    let taxonomy_path = outdir.join("top_level_categories.csv");
    let metrics_path = outdir.join("baseline_metrics.json");

    let mut writer = csv::Writer::from_path(&subset_path)
        .with_context(|| format!("impossible d'écrire {:?}", subset_path))?;
    for row in &prepared.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(&taxonomy_path)
        .with_context(|| format!("impossible d'écrire {:?}", taxonomy_path))?;
    writer.write_record(["top_level_category"])?;
    for value in &prepared.top_levels {
        writer.write_record([value.as_str()])?;
    }
    writer.flush()?;

    let data = serde_json::to_string_pretty(&prepared.metrics)?;
    fs::write(&metrics_path, data)
        .with_context(|| format!("impossible d'écrire {:?}", metrics_path))?;

    Ok((subset_path, taxonomy_path, metrics_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(features: &[Value]) -> FeatureCollection {
        let raw = json!({ "type": "FeatureCollection", "features": features }).to_string();
        match raw.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(collection) => collection,
            _ => unreachable!(),
        }
    }

    fn place(id: &str, name: &str, categories: Value) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [2.35, 48.85] },
            "properties": {
                "id": id,
                "primary_name": name,
                "confidence": 0.9,
                "categories_json": categories,
            },
        })
    }

    fn category_map() -> CategoryMap {
        [("bakery", "eat_and_drink"), ("hotel", "accommodation")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_primary_category_from_object_and_json_text() {
        let object = json!({ "primary": "bakery", "alternate": ["cafe"] });
        assert_eq!(
            parse_primary_category(Some(&object)),
            Some("bakery".to_string())
        );

        let text = json!("{\"primary\": \"hotel\"}");
        assert_eq!(parse_primary_category(Some(&text)), Some("hotel".to_string()));

        let broken = json!("pas du json");
        assert_eq!(parse_primary_category(Some(&broken)), None);
        assert_eq!(parse_primary_category(Some(&json!(42))), None);
        assert_eq!(parse_primary_category(None), None);
    }

    #[test]
    fn missing_categories_field_is_fatal() {
        let collection = collection(&[json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] },
            "properties": { "id": "x", "primary_name": "Sans catégorie" },
        })]);
        let err = build_subset(
            &collection,
            &category_map(),
            SubsetOptions {
                sample_size: 10,
                seed: 42,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("categories_json"));
    }

    #[test]
    fn joins_leaf_categories_onto_top_levels_and_counts() {
        let collection = collection(&[
            place("a", "Boulangerie Martin", json!({ "primary": "bakery" })),
            place("b", "Hôtel du Nord", json!("{\"primary\": \"hotel\"}")),
            place("c", "Mystère", json!({ "primary": "unmapped_leaf" })),
            place("d", "Sans rien", Value::Null),
        ]);
        let prepared = build_subset(
            &collection,
            &category_map(),
            SubsetOptions {
                sample_size: 10,
                seed: 42,
            },
        )
        .unwrap();

        assert_eq!(prepared.metrics.total_pois, 4);
        assert_eq!(prepared.metrics.sample_size, 4);
        assert_eq!(prepared.metrics.with_primary_category, 3);
        assert_eq!(prepared.metrics.with_top_level_mapping, 2);
        assert_eq!(
            prepared.top_levels,
            vec!["accommodation".to_string(), "eat_and_drink".to_string()]
        );

        let bakery = prepared.rows.iter().find(|r| r.id == "a").unwrap();
        assert_eq!(bakery.top_level_category.as_deref(), Some("eat_and_drink"));
        let unmapped = prepared.rows.iter().find(|r| r.id == "c").unwrap();
        assert_eq!(
            unmapped.overture_primary_category.as_deref(),
            Some("unmapped_leaf")
        );
        assert_eq!(unmapped.top_level_category, None);
    }

    #[test]
    fn same_seed_draws_the_same_sample() {
        let features: Vec<Value> = (0..50)
            .map(|i| place(&format!("id-{i}"), "Lieu", json!({ "primary": "bakery" })))
            .collect();
        let collection = collection(&features);
        let options = SubsetOptions {
            sample_size: 10,
            seed: 42,
        };

        let first = build_subset(&collection, &category_map(), options).unwrap();
        let second = build_subset(&collection, &category_map(), options).unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.rows.len(), 10);
    }

    #[test]
    fn rewriting_unchanged_subset_is_byte_identical() {
        let features: Vec<Value> = (0..20)
            .map(|i| place(&format!("id-{i}"), "Lieu", json!({ "primary": "bakery" })))
            .collect();
        let collection = collection(&features);
        let options = SubsetOptions {
            sample_size: 5,
            seed: 7,
        };
        let prepared = build_subset(&collection, &category_map(), options).unwrap();

        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let (subset_a, taxonomy_a, _) = write_subset_outputs(&prepared, dir_a.path()).unwrap();
        let (subset_b, taxonomy_b, _) = write_subset_outputs(&prepared, dir_b.path()).unwrap();

        assert_eq!(
            fs::read_to_string(subset_a).unwrap(),
            fs::read_to_string(subset_b).unwrap()
        );
        assert_eq!(
            fs::read_to_string(taxonomy_a).unwrap(),
            fs::read_to_string(taxonomy_b).unwrap()
        );
    }
}
