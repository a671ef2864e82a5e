use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::domain::PredictionRow;
use crate::utils::ensure_parent_dir;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracySummary {
    pub total: usize,
    pub valid: usize,
    /// Exactitude sur toutes les lignes ; une prédiction vide compte comme
    /// un échec.
    pub accuracy_all: f64,
    /// Exactitude restreinte aux prédictions non vides ; 0.0 s'il n'y en a
    /// aucune.
    pub accuracy_valid: f64,
}

pub fn accuracy(rows: &[PredictionRow]) -> AccuracySummary {
    let total = rows.len();
    let is_match = |row: &PredictionRow| {
        matches!(&row.top_level_category, Some(truth) if *truth == row.llm_top_level_category)
    };

    let matches_all = rows.iter().filter(|row| is_match(row)).count();
    let valid_rows: Vec<&PredictionRow> = rows
        .iter()
        .filter(|row| !row.llm_top_level_category.is_empty())
        .collect();
    let matches_valid = valid_rows.iter().filter(|row| is_match(row)).count();

    AccuracySummary {
        total,
        valid: valid_rows.len(),
        accuracy_all: ratio(matches_all, total),
        accuracy_valid: ratio(matches_valid, valid_rows.len()),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Tabulation croisée vérité terrain × prédiction. Les axes sont les
/// ensembles de labels observés et triés, pas la taxonomie complète.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub truth_labels: Vec<String>,
    pub predicted_labels: Vec<String>,
    /// Comptes en ordre ligne-majeur : `counts[vérité][prédiction]`.
    pub counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    /// Les lignes sans vérité terrain résolue sont écartées de la
    /// tabulation ; la prédiction vide reste une colonne à part entière.
    pub fn from_rows(rows: &[PredictionRow]) -> Self {
        let mut pair_counts: BTreeMap<(String, String), u64> = BTreeMap::new();
        let mut truth_set = BTreeSet::new();
        let mut predicted_set = BTreeSet::new();

        for row in rows {
            let Some(truth) = &row.top_level_category else {
                continue;
            };
            truth_set.insert(truth.clone());
            predicted_set.insert(row.llm_top_level_category.clone());
            *pair_counts
                .entry((truth.clone(), row.llm_top_level_category.clone()))
                .or_insert(0) += 1;
        }

        let truth_labels: Vec<String> = truth_set.into_iter().collect();
        let predicted_labels: Vec<String> = predicted_set.into_iter().collect();
        let counts = truth_labels
            .iter()
            .map(|truth| {
                predicted_labels
                    .iter()
                    .map(|predicted| {
                        pair_counts
                            .get(&(truth.clone(), predicted.clone()))
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect();

        Self {
            truth_labels,
            predicted_labels,
            counts,
        }
    }

    pub fn get(&self, truth: &str, predicted: &str) -> u64 {
        let Some(row) = self.truth_labels.iter().position(|label| label == truth) else {
            return 0;
        };
        let Some(column) = self
            .predicted_labels
            .iter()
            .position(|label| label == predicted)
        else {
            return 0;
        };
        self.counts[row][column]
    }

    pub fn max_count(&self) -> u64 {
        self.counts
            .iter()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Première colonne : labels de vérité terrain ; en-tête : labels
    /// prédits.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("impossible d'écrire {:?}", path))?;

        let mut header = vec!["top_level_category".to_string()];
        header.extend(self.predicted_labels.iter().cloned());
        writer.write_record(&header)?;

        for (truth, row) in self.truth_labels.iter().zip(&self.counts) {
            let mut record = vec![truth.clone()];
            record.extend(row.iter().map(u64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Relit n'importe quelle matrice rectangulaire étiquetée, sans toucher
    /// aux valeurs.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("impossible de lire la matrice {:?}", path))?;

        let predicted_labels: Vec<String> = reader
            .headers()
            .context("en-têtes illisibles dans la matrice de confusion")?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect();

        let mut truth_labels = Vec::new();
        let mut counts = Vec::new();
        for record in reader.records() {
            let record = record.context("ligne de matrice illisible")?;
            let mut cells = record.iter();
            let truth = cells
                .next()
                .context("ligne de matrice sans label de vérité")?
                .to_string();
            let row: Vec<u64> = cells
                .map(|cell| {
                    cell.trim()
                        .parse::<u64>()
                        .with_context(|| format!("compte non entier: {:?}", cell))
                })
                .collect::<Result<_>>()?;
            truth_labels.push(truth);
            counts.push(row);
        }

        Ok(Self {
            truth_labels,
            predicted_labels,
            counts,
        })
    }
}
