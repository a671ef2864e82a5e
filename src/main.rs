use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use overture_poi::classify::{
    accuracy, read_subset_csv, write_predictions_csv, ClassifierRunner, ConfusionMatrix,
    OpenAiChatClient, PromptBuilder, RunOptions,
};
use overture_poi::places::{fetch_places, point_coordinates, BoundingBox, PlacesFetchConfig};
use overture_poi::report::{parse_figsize, render_heatmap, render_scatter, write_leaflet_map};
use overture_poi::taxonomy::{
    detect_shape, prepare_subset, resolve_with_shape, write_subset_outputs, CategoryTable,
    SubsetOptions, DEFAULT_CATEGORIES_URL,
};

#[derive(Parser)]
#[command(name = "overture-poi", version, about = "Overture Places POI classification baseline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Télécharge les lieux d'une bbox et produit GeoJSON, PNG et carte HTML.
    Fetch {
        #[arg(long, default_value = "2026-01-21.0")]
        release: String,
        /// Rectangle ouest,sud,est,nord (EPSG:4326).
        #[arg(long, default_value = "-122.52,37.70,-122.35,37.83")]
        bbox: String,
        /// LIMIT optionnel pour le débogage (0 = sans limite).
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long, default_value = "out_overture_places")]
        outdir: PathBuf,
    },
    /// Résout la taxonomie et échantillonne le sous-ensemble de POI.
    Prepare {
        #[arg(long, default_value = "out_overture_places/places.geojson")]
        places_path: PathBuf,
        #[arg(long, default_value = DEFAULT_CATEGORIES_URL)]
        categories_url: String,
        #[arg(long, default_value = "data/overture_categories.csv")]
        categories_cache: PathBuf,
        /// Nombre de POI à échantillonner.
        #[arg(long, default_value_t = 100)]
        n: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "data/week3")]
        outdir: PathBuf,
    },
    /// Classe chaque POI du sous-ensemble via l'endpoint de complétion.
    Classify {
        #[arg(long, default_value = "data/week3/poi_subset.csv")]
        input_csv: PathBuf,
        #[arg(long, default_value = "data/week3/poi_subset_with_llm.csv")]
        out_csv: PathBuf,
        #[arg(long, default_value = "data/week3/llm_top_level_confusion.csv")]
        out_confusion: PathBuf,
        /// Nombre de lignes à traiter (0 = toutes).
        #[arg(long, default_value_t = 100)]
        n: usize,
        /// Pause entre les appels, en secondes.
        #[arg(long, default_value_t = 0.0)]
        sleep: f64,
        #[arg(long, default_value = "gpt-4.1-mini")]
        model: String,
        #[arg(long, default_value = "https://api.openai.com/v1/chat/completions")]
        endpoint: String,
        #[arg(long, default_value = "data/subcategories.json")]
        subcategories_path: PathBuf,
    },
    /// Trace la matrice de confusion en carte de chaleur PNG.
    Plot {
        #[arg(long, default_value = "data/week3/llm_top_level_confusion.csv")]
        confusion_csv: PathBuf,
        #[arg(long, default_value = "data/week3/llm_top_level_confusion.png")]
        out: PathBuf,
        /// Taille de figure L,H.
        #[arg(long, default_value = "12,10")]
        figsize: String,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Fetch {
            release,
            bbox,
            limit,
            outdir,
        } => {
            let bbox: BoundingBox = bbox.parse()?;
            fs::create_dir_all(&outdir)
                .with_context(|| format!("impossible de créer le dossier {:?}", outdir))?;
            let config = PlacesFetchConfig {
                release: release.clone(),
                bbox,
                limit,
            };
            info!(dataset = %config.dataset_path(), ?bbox, "requête des lieux Overture");

            let collection = fetch_places(&config)?;
            let geojson_text = serde_json::to_string(&collection)?;
            let out_geojson = outdir.join("places.geojson");
            fs::write(&out_geojson, &geojson_text)
                .with_context(|| format!("impossible d'écrire {:?}", out_geojson))?;

            let title = format!("Overture places (release {release})");
            let out_png = outdir.join("places.png");
            let out_html = outdir.join("places.html");
            render_scatter(
                &point_coordinates(&collection),
                &bbox,
                &title,
                &out_png,
                (1000, 1000),
            )?;
            write_leaflet_map(&geojson_text, bbox.center(), &title, &out_html)?;

            println!("GeoJSON écrit : {}", out_geojson.display());
            println!("Nuage de points écrit : {}", out_png.display());
            println!("Carte interactive écrite : {}", out_html.display());
        }
        Commands::Prepare {
            places_path,
            categories_url,
            categories_cache,
            n,
            seed,
            outdir,
        } => {
            let table = CategoryTable::fetch(&categories_url, &categories_cache)?;
            let shape = detect_shape(&table.headers);
            info!(forme = ?shape, lignes = table.rows.len(), "table de référence chargée");
            let map = resolve_with_shape(&table, shape);

            let prepared = prepare_subset(
                &places_path,
                &map,
                SubsetOptions {
                    sample_size: n,
                    seed,
                },
            )?;
            let (subset_path, taxonomy_path, metrics_path) =
                write_subset_outputs(&prepared, &outdir)?;

            println!("Sous-ensemble écrit : {}", subset_path.display());
            println!("Taxonomie écrite : {}", taxonomy_path.display());
            println!("Métriques écrites : {}", metrics_path.display());
        }
        Commands::Classify {
            input_csv,
            out_csv,
            out_confusion,
            n,
            sleep,
            model,
            endpoint,
            subcategories_path,
        } => {
            let rows = read_subset_csv(&input_csv)?;
            let client = OpenAiChatClient::new(endpoint, model)?;
            info!("modèle" = client.model(), lignes = rows.len(), "passe de classification");
            let prompt_builder = PromptBuilder::with_subcategory_hints(&subcategories_path)?;
            let runner = ClassifierRunner::new(Arc::new(client), prompt_builder);

            let outcome = runner.run(
                rows,
                RunOptions {
                    sample_size: n,
                    pause: Duration::from_secs_f64(sleep.max(0.0)),
                },
            );
            let summary = accuracy(&outcome.rows);

            println!("\n--- RÉSULTATS ---");
            println!("Lignes traitées : {}", summary.total);
            println!("Prédictions valides : {}", summary.valid);
            println!("Prédictions invalides : {}", summary.total - summary.valid);
            println!("Exactitude (toutes lignes) : {:.3}", summary.accuracy_all);
            println!("Exactitude (valides seulement) : {:.3}", summary.accuracy_valid);
            println!("Erreurs d'API : {}", outcome.errors);

            write_predictions_csv(&outcome.rows, &out_csv)?;
            println!("Prédictions écrites : {}", out_csv.display());

            ConfusionMatrix::from_rows(&outcome.rows).write_csv(&out_confusion)?;
            println!("Matrice de confusion écrite : {}", out_confusion.display());
        }
        Commands::Plot {
            confusion_csv,
            out,
            figsize,
        } => {
            let size = parse_figsize(&figsize)?;
            let matrix = ConfusionMatrix::read_csv(&confusion_csv)?;
            render_heatmap(&matrix, &out, size)?;
            println!("Matrice tracée : {}", out.display());
        }
    }

    Ok(())
}
