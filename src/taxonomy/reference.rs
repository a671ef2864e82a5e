use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing::warn;

use crate::utils::download_if_needed;

pub const DEFAULT_CATEGORIES_URL: &str = "https://raw.githubusercontent.com/OvertureMaps/schema/main/docs/schema/concepts/by-theme/places/overture_categories.csv";

const REFERENCE_DELIMITER: u8 = b';';

/// Table de référence des catégories, chargée telle quelle : la forme du
/// schéma n'est pas fixée et sera détectée en aval.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CategoryTable {
    pub fn from_reader(reader: impl io::Read) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(REFERENCE_DELIMITER)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .context("en-têtes illisibles dans la table de référence")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            // Une ligne malformée est exclue du mapping, jamais fatale.
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!("erreur" = %err, "ligne de référence ignorée");
                    continue;
                }
            };
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("impossible de lire la table de référence {:?}", path))?;
        Self::from_reader(file)
    }

    /// Télécharge (au besoin) puis charge la table depuis le cache local.
    pub fn fetch(url: &str, cache: &Path) -> Result<Self> {
        download_if_needed(url, cache)?;
        Self::load(cache)
    }

    /// Cellule d'une ligne, None si absente ou vide.
    pub fn cell<'a>(&self, row: &'a [String], column: usize) -> Option<&'a str> {
        row.get(column)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}
