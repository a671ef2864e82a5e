use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("impossible de créer le dossier {:?}", parent))?;
        }
    }
    Ok(())
}

/// Télécharge `url` vers `cache` sauf si le fichier existe déjà : la seule
/// présence du cache suffit, aucune vérification de fraîcheur.
pub fn download_if_needed(url: &str, cache: &Path) -> Result<()> {
    if cache.exists() {
        info!(cache = %cache.display(), "cache présent, téléchargement sauté");
        return Ok(());
    }
    ensure_parent_dir(cache)?;

    let http = HttpClient::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .context("impossible d'initialiser le client HTTP de téléchargement")?;
    let body = http
        .get(url)
        .send()
        .with_context(|| format!("téléchargement impossible depuis {}", url))?
        .error_for_status()
        .with_context(|| format!("statut d'erreur HTTP pour {}", url))?
        .bytes()
        .context("corps de réponse illisible")?;

    fs::write(cache, &body).with_context(|| format!("impossible d'écrire le cache {:?}", cache))?;
    info!(cache = %cache.display(), octets = body.len(), "table de référence téléchargée");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_cache_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("categories.csv");
        fs::write(&cache, "category;parent\n").unwrap();

        // URL invalide : ne doit jamais être contactée puisque le cache existe.
        download_if_needed("http://127.0.0.1:1/absent.csv", &cache).unwrap();
        assert_eq!(fs::read_to_string(&cache).unwrap(), "category;parent\n");
    }

    #[test]
    fn ensure_parent_dir_creates_missing_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.csv");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }
}
