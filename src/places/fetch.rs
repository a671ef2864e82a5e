use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, BinaryArray, LargeBinaryArray};
use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use geojson::{Feature, FeatureCollection, JsonObject};
use geozero::wkb::Wkb;
use geozero::ToJson;
use object_store::aws::AmazonS3Builder;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use url::Url;

const OVERTURE_BUCKET: &str = "overturemaps-us-west-2";
const OVERTURE_REGION: &str = "us-west-2";

// Colonnes imbriquées sérialisées en texte JSON avant export, pour que le
// GeoJSON reste lisible par n'importe quel lecteur tabulaire.
const NESTED_COLUMNS: &[&str] = &["names", "sources", "categories", "addresses", "brand"];

/// Rectangle ouest/sud/est/nord en coordonnées géographiques (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }
}

impl FromStr for BoundingBox {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .with_context(|| format!("coordonnée invalide: {:?}", part))
            })
            .collect::<Result<_>>()?;
        let [west, south, east, north] = parts.as_slice() else {
            bail!("bbox attendue au format ouest,sud,est,nord: {:?}", raw);
        };
        Ok(Self {
            west: *west,
            south: *south,
            east: *east,
            north: *north,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlacesFetchConfig {
    pub release: String,
    pub bbox: BoundingBox,
    /// 0 = pas de LIMIT (la limite ne sert qu'au débogage).
    pub limit: usize,
}

impl PlacesFetchConfig {
    pub fn dataset_path(&self) -> String {
        format!(
            "s3://{OVERTURE_BUCKET}/release/{}/theme=places/type=place/",
            self.release
        )
    }
}

/// Filtre spatial en bloc : test de chevauchement de la bbox de chaque
/// ligne contre le rectangle demandé, projection d'un jeu de colonnes fixe.
pub fn build_places_query(config: &PlacesFetchConfig) -> String {
    let BoundingBox {
        west,
        south,
        east,
        north,
    } = config.bbox;
    let limit = if config.limit > 0 {
        format!("LIMIT {}", config.limit)
    } else {
        String::new()
    };

    // basic_category et operating_status manquent dans certaines releases ;
    // retirer ces deux lignes si la requête échoue.
    format!(
        r#"SELECT
  id,
  names['primary'] AS primary_name,
  confidence,
  basic_category,
  operating_status,
  names,
  sources,
  categories,
  addresses,
  brand,
  geometry
FROM places
WHERE bbox['xmin'] <= {east}
  AND bbox['xmax'] >= {west}
  AND bbox['ymin'] <= {north}
  AND bbox['ymax'] >= {south}
  AND geometry IS NOT NULL
{limit}"#
    )
}

/// Interroge le parquet partitionné d'Overture et matérialise une
/// FeatureCollection, une Feature par lieu, blobs imbriqués convertis en
/// texte JSON et géométrie décodée depuis le WKB.
pub fn fetch_places(config: &PlacesFetchConfig) -> Result<FeatureCollection> {
    let runtime = tokio::runtime::Runtime::new()
        .context("impossible de démarrer le runtime d'interrogation")?;
    runtime.block_on(query_places(config))
}

async fn query_places(config: &PlacesFetchConfig) -> Result<FeatureCollection> {
    let ctx = SessionContext::new();

    let store = AmazonS3Builder::new()
        .with_bucket_name(OVERTURE_BUCKET)
        .with_region(OVERTURE_REGION)
        .with_skip_signature(true)
        .build()
        .context("impossible de construire le store S3 anonyme")?;
    let url = Url::parse(&format!("s3://{OVERTURE_BUCKET}"))
        .context("URL de bucket invalide")?;
    let _ = ctx.register_object_store(&url, Arc::new(store));

    let dataset = config.dataset_path();
    info!(dataset = %dataset, "enregistrement du jeu de données Overture");
    ctx.register_parquet("places", &dataset, ParquetReadOptions::default())
        .await
        .context("impossible d'enregistrer le parquet Overture")?;

    let dataframe = ctx
        .sql(&build_places_query(config))
        .await
        .context("requête de lieux invalide")?;
    let batches = dataframe
        .collect()
        .await
        .context("échec de la requête de lieux Overture")?;

    let mut features = Vec::new();
    for batch in &batches {
        features.extend(batch_to_features(batch)?);
    }
    info!(lots = batches.len(), lieux = features.len(), "lieux téléchargés");

    if features.is_empty() {
        bail!("aucun lieu renvoyé pour cette bbox ; élargir la zone ou vérifier les coordonnées");
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn batch_to_features(batch: &RecordBatch) -> Result<Vec<Feature>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }

    let geometry_index = batch
        .schema()
        .index_of("geometry")
        .context("colonne geometry absente du résultat")?;
    let property_indices: Vec<usize> = (0..batch.num_columns())
        .filter(|index| *index != geometry_index)
        .collect();
    let properties_batch = batch
        .project(&property_indices)
        .context("projection des colonnes de propriétés impossible")?;

    let mut writer = ArrayWriter::new(Vec::new());
    writer
        .write(&properties_batch)
        .context("encodage JSON des propriétés impossible")?;
    writer.finish().context("finalisation de l'encodage JSON")?;
    let rows: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(&writer.into_inner())
        .context("relecture des propriétés encodées")?;

    let geometry_column = batch.column(geometry_index);
    let mut features = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.into_iter().enumerate() {
        let Some(wkb) = wkb_at(geometry_column.as_ref(), row_index)? else {
            continue;
        };
        let geometry_json = Wkb(wkb.to_vec())
            .to_json()
            .map_err(|err| anyhow!("géométrie WKB illisible: {err}"))?;
        let geometry: geojson::Geometry =
            serde_json::from_str(&geometry_json).context("géométrie GeoJSON invalide")?;

        features.push(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(feature_properties(row)?),
            foreign_members: None,
        });
    }
    Ok(features)
}

fn wkb_at(array: &dyn Array, row: usize) -> Result<Option<&[u8]>> {
    if array.is_null(row) {
        return Ok(None);
    }
    if let Some(binary) = array.as_any().downcast_ref::<BinaryArray>() {
        return Ok(Some(binary.value(row)));
    }
    if let Some(binary) = array.as_any().downcast_ref::<LargeBinaryArray>() {
        return Ok(Some(binary.value(row)));
    }
    bail!(
        "type de colonne geometry inattendu: {}",
        array.data_type()
    );
}

fn feature_properties(row: serde_json::Map<String, Value>) -> Result<JsonObject> {
    let mut properties = JsonObject::new();
    for (key, value) in row {
        if NESTED_COLUMNS.contains(&key.as_str()) {
            let serialized = if value.is_null() {
                Value::Null
            } else {
                Value::String(
                    serde_json::to_string(&value)
                        .with_context(|| format!("sérialisation du blob {key}"))?,
                )
            };
            properties.insert(format!("{key}_json"), serialized);
        } else {
            properties.insert(key, value);
        }
    }
    Ok(properties)
}

/// Coordonnées des géométries ponctuelles, pour le nuage de points et la
/// carte interactive. Les géométries non ponctuelles sont ignorées.
pub fn point_coordinates(collection: &FeatureCollection) -> Vec<(f64, f64)> {
    collection
        .features
        .iter()
        .filter_map(|feature| match &feature.geometry {
            Some(geometry) => match &geometry.value {
                geojson::Value::Point(position) if position.len() >= 2 => {
                    Some((position[0], position[1]))
                }
                _ => None,
            },
            None => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bbox_string() {
        let bbox: BoundingBox = "-122.52,37.70,-122.35,37.83".parse().unwrap();
        assert_eq!(bbox.west, -122.52);
        assert_eq!(bbox.north, 37.83);
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn query_embeds_overlap_predicate_and_limit() {
        let config = PlacesFetchConfig {
            release: "2026-01-21.0".into(),
            bbox: "-122.52,37.70,-122.35,37.83".parse().unwrap(),
            limit: 500,
        };
        let sql = build_places_query(&config);
        assert!(sql.contains("bbox['xmin'] <= -122.35"));
        assert!(sql.contains("bbox['xmax'] >= -122.52"));
        assert!(sql.contains("bbox['ymin'] <= 37.83"));
        assert!(sql.contains("bbox['ymax'] >= 37.7"));
        assert!(sql.contains("geometry IS NOT NULL"));
        assert!(sql.contains("LIMIT 500"));
        assert!(config.dataset_path().contains("release/2026-01-21.0/theme=places"));

        let unlimited = PlacesFetchConfig { limit: 0, ..config };
        assert!(!build_places_query(&unlimited).contains("LIMIT"));
    }

    #[test]
    fn nested_columns_become_json_text_properties() {
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), json!("08f2..."));
        row.insert("primary_name".to_string(), json!("Boulangerie Martin"));
        row.insert("confidence".to_string(), json!(0.93));
        row.insert(
            "categories".to_string(),
            json!({ "primary": "bakery", "alternate": ["cafe"] }),
        );
        row.insert("brand".to_string(), Value::Null);

        let properties = feature_properties(row).unwrap();
        assert_eq!(properties["primary_name"], json!("Boulangerie Martin"));
        let categories = properties["categories_json"].as_str().unwrap();
        assert!(categories.contains("\"primary\":\"bakery\""));
        assert_eq!(properties["brand_json"], Value::Null);
        assert!(!properties.contains_key("categories"));
    }

    #[test]
    fn extracts_point_coordinates_only() {
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [2.35, 48.85] },
                    "properties": {}
                },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                    },
                    "properties": {}
                }
            ]
        })
        .to_string();
        let geojson::GeoJson::FeatureCollection(collection) = raw.parse().unwrap() else {
            panic!("FeatureCollection attendue");
        };
        assert_eq!(point_coordinates(&collection), vec![(2.35, 48.85)]);
    }
}
