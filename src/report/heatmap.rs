use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::path::Path;

use crate::classify::ConfusionMatrix;
use crate::utils::ensure_parent_dir;

// Bornes du dégradé séquentiel, du blanc cassé au bleu profond.
const LOW_COLOR: (u8, u8, u8) = (247, 251, 255);
const HIGH_COLOR: (u8, u8, u8) = (8, 48, 107);

/// Taille de figure `L,H` exprimée en unités d'un dixième de pixel rendu à
/// l'échelle 100 (12,10 -> 1200x1000 px).
pub fn parse_figsize(raw: &str) -> Result<(u32, u32)> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("dimension invalide: {:?}", part))
        })
        .collect::<Result<_>>()?;
    let [width, height] = parts.as_slice() else {
        bail!("figsize attendue au format L,H: {:?}", raw);
    };
    if *width <= 0.0 || *height <= 0.0 {
        bail!("figsize strictement positive attendue: {:?}", raw);
    }
    Ok(((width * 100.0) as u32, (height * 100.0) as u32))
}

fn cell_color(count: u64, max_count: u64) -> RGBColor {
    let t = if max_count == 0 {
        0.0
    } else {
        count as f64 / max_count as f64
    };
    let channel = |low: u8, high: u8| (low as f64 + (high as f64 - low as f64) * t) as u8;
    RGBColor(
        channel(LOW_COLOR.0, HIGH_COLOR.0),
        channel(LOW_COLOR.1, HIGH_COLOR.1),
        channel(LOW_COLOR.2, HIGH_COLOR.2),
    )
}

/// Rend la matrice telle quelle : une cellule par paire de labels observée,
/// compte annoté, sans retoucher les valeurs.
pub fn render_heatmap(matrix: &ConfusionMatrix, out: &Path, size: (u32, u32)) -> Result<()> {
    if matrix.truth_labels.is_empty() || matrix.predicted_labels.is_empty() {
        bail!("matrice de confusion vide, rien à tracer");
    }
    ensure_parent_dir(out)?;

    let columns = matrix.predicted_labels.len();
    let rows = matrix.truth_labels.len();
    let max_count = matrix.max_count();

    let root = BitMapBackend::new(out, size).into_drawing_area();
    root.fill(&WHITE)?;

    // Coordonnées segmentées : une case par paire de labels, étiquettes
    // d'axe centrées sur leur case.
    let mut chart = ChartBuilder::on(&root)
        .caption("LLM vs Overture Top-level Confusion Matrix", ("sans-serif", 26))
        .margin(16)
        .x_label_area_size(170)
        .y_label_area_size(220)
        .build_cartesian_2d(
            (0..columns as i32 - 1).into_segmented(),
            (0..rows as i32 - 1).into_segmented(),
        )?;

    let predicted_labels = matrix.predicted_labels.clone();
    let truth_labels = matrix.truth_labels.clone();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(columns)
        .y_labels(rows)
        .x_label_formatter(&|value| segment_label(&predicted_labels, value, false))
        .y_label_formatter(&|value| segment_label(&truth_labels, value, true))
        .x_label_style(("sans-serif", 13).into_font().transform(FontTransform::Rotate90))
        .y_label_style(("sans-serif", 13))
        .x_desc("LLM Predicted")
        .y_desc("Actual (Overture top-level)")
        .draw()?;

    // Première ligne de vérité terrain en haut, comme un tableau.
    chart.draw_series(matrix.counts.iter().enumerate().flat_map(|(row, counts)| {
        let y = (rows - 1 - row) as i32;
        counts.iter().enumerate().map(move |(column, count)| {
            let x = column as i32;
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                cell_color(*count, max_count).filled(),
            )
        })
    }))?;

    let annotation_style = |count: u64| {
        let color = if max_count > 0 && count * 2 > max_count {
            WHITE
        } else {
            BLACK
        };
        ("sans-serif", 14)
            .into_font()
            .color(&color)
            .pos(Pos::new(HPos::Center, VPos::Center))
    };
    chart.draw_series(matrix.counts.iter().enumerate().flat_map(|(row, counts)| {
        let y = (rows - 1 - row) as i32;
        counts.iter().enumerate().map(move |(column, count)| {
            Text::new(
                count.to_string(),
                (
                    SegmentValue::CenterOf(column as i32),
                    SegmentValue::CenterOf(y),
                ),
                annotation_style(*count),
            )
        })
    }))?;

    root.present().context("écriture du PNG de la matrice")?;
    Ok(())
}

fn segment_label(labels: &[String], value: &SegmentValue<i32>, reversed: bool) -> String {
    let SegmentValue::CenterOf(index) = value else {
        return String::new();
    };
    let Ok(index) = usize::try_from(*index) else {
        return String::new();
    };
    if index >= labels.len() {
        return String::new();
    }
    let index = if reversed { labels.len() - 1 - index } else { index };
    display_label(&labels[index])
}

fn display_label(label: &str) -> String {
    if label.is_empty() {
        "(vide)".to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_figsize_pairs() {
        assert_eq!(parse_figsize("12,10").unwrap(), (1200, 1000));
        assert_eq!(parse_figsize(" 8 , 6 ").unwrap(), (800, 600));
        assert!(parse_figsize("12").is_err());
        assert!(parse_figsize("0,10").is_err());
        assert!(parse_figsize("a,b").is_err());
    }

    #[test]
    fn gradient_spans_the_two_bounds() {
        assert_eq!(cell_color(0, 10), RGBColor(247, 251, 255));
        assert_eq!(cell_color(10, 10), RGBColor(8, 48, 107));
        // Pas de division par zéro sur une matrice entièrement nulle.
        assert_eq!(cell_color(0, 0), RGBColor(247, 251, 255));
    }

    #[test]
    fn axis_labels_only_on_segment_centers() {
        let labels = vec!["a".to_string(), String::new()];
        assert_eq!(segment_label(&labels, &SegmentValue::CenterOf(0), false), "a");
        assert_eq!(
            segment_label(&labels, &SegmentValue::CenterOf(1), false),
            "(vide)"
        );
        assert_eq!(segment_label(&labels, &SegmentValue::Exact(0), false), "");
        assert_eq!(segment_label(&labels, &SegmentValue::CenterOf(2), false), "");
        // Axe des vérités inversé : la première ligne s'affiche en haut.
        assert_eq!(
            segment_label(&labels, &SegmentValue::CenterOf(0), true),
            "(vide)"
        );
    }
}
