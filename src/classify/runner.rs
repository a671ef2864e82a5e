use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{PoiSubsetRow, PredictionRow};
use crate::utils::ensure_parent_dir;

use super::decode::decode_label;
use super::llm_client::LlmClient;
use super::prompt::PromptBuilder;

// Graine du ré-échantillonnage optionnel avant la passe de classification.
const RESAMPLE_SEED: u64 = 42;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// 0 = traiter toutes les lignes.
    pub sample_size: usize,
    pub pause: Duration,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub rows: Vec<PredictionRow>,
    /// Erreurs de transport rencontrées ; chacune a produit une prédiction
    /// vide sans interrompre la passe.
    pub errors: usize,
}

pub struct ClassifierRunner<C: LlmClient> {
    llm: Arc<C>,
    prompt_builder: PromptBuilder,
}

impl<C: LlmClient> ClassifierRunner<C> {
    pub fn new(llm: Arc<C>, prompt_builder: PromptBuilder) -> Self {
        Self {
            llm,
            prompt_builder,
        }
    }

    /// Exactement une prédiction (éventuellement vide) par ligne ; une
    /// réponse en échec ne fait jamais avorter la passe.
    pub fn run(&self, rows: Vec<PoiSubsetRow>, options: RunOptions) -> RunOutcome {
        let rows = resample(rows, options.sample_size);
        let total = rows.len();
        let mut outcome = RunOutcome {
            rows: Vec::with_capacity(total),
            errors: 0,
        };

        for (index, row) in rows.into_iter().enumerate() {
            let prompt = self.prompt_builder.build(&row);
            let prediction = match self.llm.complete(&prompt) {
                Ok(raw) => decode_label(&raw).as_str().to_string(),
                Err(err) => {
                    warn!("erreur" = %err, id = %row.id, "échec de l'appel de classification");
                    outcome.errors += 1;
                    String::new()
                }
            };

            debug!("traitées" = index + 1, total, id = %row.id, "ligne classée");
            outcome.rows.push(PredictionRow::from_subset(row, prediction));

            if !options.pause.is_zero() {
                sleep(options.pause);
            }
        }

        outcome
    }
}

fn resample(rows: Vec<PoiSubsetRow>, sample_size: usize) -> Vec<PoiSubsetRow> {
    if sample_size == 0 || sample_size >= rows.len() {
        return rows;
    }
    let mut rng = StdRng::seed_from_u64(RESAMPLE_SEED);
    rand::seq::index::sample(&mut rng, rows.len(), sample_size)
        .iter()
        .map(|index| rows[index].clone())
        .collect()
}

/// Charge le sous-ensemble de POI ; l'absence des colonnes attendues est
/// une erreur de forme fatale.
pub fn read_subset_csv(path: &Path) -> Result<Vec<PoiSubsetRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("impossible de lire le sous-ensemble {:?}", path))?;

    let headers = reader
        .headers()
        .context("en-têtes illisibles dans le sous-ensemble")?
        .clone();
    for required in ["primary_name", "top_level_category"] {
        if !headers.iter().any(|header| header == required) {
            bail!(
                "{:?} doit contenir les colonnes primary_name et top_level_category",
                path
            );
        }
    }

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: PoiSubsetRow =
            record.with_context(|| format!("ligne de sous-ensemble invalide dans {:?}", path))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_predictions_csv(rows: &[PredictionRow], path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("impossible d'écrire les prédictions {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
