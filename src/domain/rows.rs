use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Les champs optionnels restent des Option simples : le codec CSV écrit une
// cellule vide pour None et doit garder une colonne par champ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiSubsetRow {
    #[serde(default)]
    pub id: String,
    pub primary_name: String,
    #[serde(default)]
    pub overture_primary_category: Option<String>,
    #[serde(default)]
    pub top_level_category: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub basic_category: Option<String>,
    #[serde(default)]
    pub operating_status: Option<String>,
    #[serde(default)]
    pub names_json: Option<String>,
    #[serde(default)]
    pub addresses_json: Option<String>,
    #[serde(default)]
    pub brand_json: Option<String>,
}

/// Une ligne du sous-ensemble, reprise intégralement, plus la prédiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    #[serde(default)]
    pub id: String,
    pub primary_name: String,
    #[serde(default)]
    pub overture_primary_category: Option<String>,
    #[serde(default)]
    pub top_level_category: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub basic_category: Option<String>,
    #[serde(default)]
    pub operating_status: Option<String>,
    #[serde(default)]
    pub names_json: Option<String>,
    #[serde(default)]
    pub addresses_json: Option<String>,
    #[serde(default)]
    pub brand_json: Option<String>,
    /// Membre de la taxonomie fixe, ou chaîne vide si aucune prédiction
    /// valide n'a pu être extraite.
    #[serde(default)]
    pub llm_top_level_category: String,
}

impl PredictionRow {
    pub fn from_subset(row: PoiSubsetRow, prediction: String) -> Self {
        Self {
            id: row.id,
            primary_name: row.primary_name,
            overture_primary_category: row.overture_primary_category,
            top_level_category: row.top_level_category,
            confidence: row.confidence,
            basic_category: row.basic_category,
            operating_status: row.operating_status,
            names_json: row.names_json,
            addresses_json: row.addresses_json,
            brand_json: row.brand_json,
            llm_top_level_category: prediction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub total_pois: usize,
    pub sample_size: usize,
    pub with_primary_category: usize,
    pub with_top_level_mapping: usize,
    pub generated_at: DateTime<Utc>,
}
