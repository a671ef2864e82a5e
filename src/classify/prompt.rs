use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::domain::{PoiSubsetRow, AMBIGUOUS_CATEGORIES, TOP_LEVEL_CATEGORIES};

/// Construit le prompt de classification : gabarit déterministe embarquant
/// la taxonomie fixe, le nom du POI et ses attributs secondaires non vides.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    subcategory_hints: BTreeMap<String, Vec<String>>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge la liste de sous-catégories des deux catégories ambiguës
    /// depuis un fichier JSON annexe. Fichier absent : section simplement
    /// omise, pas une erreur.
    pub fn with_subcategory_hints(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("impossible de lire {:?}", path))?;
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)
            .with_context(|| format!("JSON de sous-catégories invalide dans {:?}", path))?;

        let subcategory_hints: BTreeMap<String, Vec<String>> = parsed
            .into_iter()
            .filter(|(category, _)| AMBIGUOUS_CATEGORIES.contains(&category.as_str()))
            .collect();
        info!(
            "catégories" = subcategory_hints.len(),
            "sous-catégories de désambiguïsation chargées"
        );
        Ok(Self { subcategory_hints })
    }

    pub fn build(&self, row: &PoiSubsetRow) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You are classifying Points of Interest (POIs) into top-level Overture Places categories.\n\n",
        );
        prompt.push_str("Possible top-level categories:\n");
        for category in TOP_LEVEL_CATEGORIES {
            let _ = writeln!(prompt, "- {category}");
        }

        for category in AMBIGUOUS_CATEGORIES {
            if let Some(subcategories) = self.subcategory_hints.get(*category) {
                let _ = writeln!(
                    prompt,
                    "\nSubcategories of {category}: {}",
                    subcategories.join(", ")
                );
            }
        }

        let _ = write!(prompt, "\nGiven the POI name:\n\n\"{}\"\n", row.primary_name);

        let mut context_lines = String::new();
        push_context(&mut context_lines, "Overture primary category", row.overture_primary_category.as_deref());
        push_context(&mut context_lines, "Basic category", row.basic_category.as_deref());
        push_context(&mut context_lines, "Operating status", row.operating_status.as_deref());
        push_json_context(&mut context_lines, "Addresses", row.addresses_json.as_deref());
        push_json_context(&mut context_lines, "Brand", row.brand_json.as_deref());
        push_json_context(&mut context_lines, "Alternative names", row.names_json.as_deref());
        if !context_lines.is_empty() {
            let _ = write!(prompt, "\nAdditional context:\n{context_lines}");
        }

        prompt.push_str(
            "\nChoose exactly ONE category from the list above.\n\
             Return your answer strictly as JSON in this format:\n\n\
             {\"top_level_category\": \"<one_of_the_categories_above>\"}\n",
        );
        prompt
    }
}

fn push_context(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
        let _ = writeln!(out, "{label}: {value}");
    }
}

// Les blobs JSON ne sont repris que s'ils portent autre chose que null.
fn push_json_context(out: &mut String, label: &str, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return;
    };
    if matches!(serde_json::from_str::<Value>(value), Ok(Value::Null)) {
        return;
    }
    let _ = writeln!(out, "{label}: {value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> PoiSubsetRow {
        PoiSubsetRow {
            id: "x".into(),
            primary_name: name.into(),
            overture_primary_category: None,
            top_level_category: None,
            confidence: None,
            basic_category: None,
            operating_status: None,
            names_json: None,
            addresses_json: None,
            brand_json: None,
        }
    }

    #[test]
    fn embeds_taxonomy_and_name() {
        let prompt = PromptBuilder::new().build(&row("Boulangerie Martin"));
        assert!(prompt.contains("- retail"));
        assert!(prompt.contains("- eat_and_drink"));
        assert!(prompt.contains("\"Boulangerie Martin\""));
        assert!(prompt.contains("{\"top_level_category\""));
        assert!(!prompt.contains("Additional context"));
    }

    #[test]
    fn includes_only_non_empty_attributes() {
        let mut poi = row("Hôtel du Nord");
        poi.basic_category = Some("hotel".into());
        poi.operating_status = Some("  ".into());
        poi.brand_json = Some("null".into());
        poi.addresses_json = Some("[{\"locality\": \"Paris\"}]".into());

        let prompt = PromptBuilder::new().build(&poi);
        assert!(prompt.contains("Basic category: hotel"));
        assert!(prompt.contains("Addresses: [{\"locality\": \"Paris\"}]"));
        assert!(!prompt.contains("Operating status"));
        assert!(!prompt.contains("Brand"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let builder = PromptBuilder::new();
        assert_eq!(builder.build(&row("Café")), builder.build(&row("Café")));
    }

    #[test]
    fn absent_hint_file_is_silently_omitted() {
        let builder =
            PromptBuilder::with_subcategory_hints(Path::new("/nonexistent/hints.json")).unwrap();
        let prompt = builder.build(&row("Zoo"));
        assert!(!prompt.contains("Subcategories of"));
    }

    #[test]
    fn hint_file_adds_subcategories_for_ambiguous_pair_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subcategories.json");
        fs::write(
            &path,
            r#"{
                "attractions_and_activities": ["zoo", "water_park"],
                "retail": ["ignored"]
            }"#,
        )
        .unwrap();

        let builder = PromptBuilder::with_subcategory_hints(&path).unwrap();
        let prompt = builder.build(&row("Zoo de Vincennes"));
        assert!(prompt.contains("Subcategories of attractions_and_activities: zoo, water_park"));
        assert!(!prompt.contains("Subcategories of retail"));
    }
}
