use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use std::fs;
use std::path::Path;

use crate::places::BoundingBox;
use crate::utils::ensure_parent_dir;

/// Nuage de points statique des lieux sur l'emprise demandée.
pub fn render_scatter(
    points: &[(f64, f64)],
    bbox: &BoundingBox,
    title: &str,
    out: &Path,
    size: (u32, u32),
) -> Result<()> {
    if points.is_empty() {
        bail!("aucune géométrie ponctuelle à tracer");
    }
    ensure_parent_dir(out)?;

    let root = BitMapBackend::new(out, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(bbox.west..bbox.east, bbox.south..bbox.north)?;

    chart
        .configure_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|(x, y)| Circle::new((*x, *y), 2, BLUE.filled())),
    )?;

    root.present().context("écriture du PNG des lieux")?;
    Ok(())
}

/// Carte interactive autonome : un document Leaflet embarquant le GeoJSON,
/// une infobulle par lieu construite depuis ses propriétés.
pub fn write_leaflet_map(
    geojson: &str,
    center: (f64, f64),
    title: &str,
    out: &Path,
) -> Result<()> {
    ensure_parent_dir(out)?;
    let (longitude, latitude) = center;
    let document = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <title>{title}</title>
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
  <div id="map"></div>
  <script>
    var map = L.map('map').setView([{latitude}, {longitude}], 13);
    L.tileLayer('https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
      attribution: '&copy; OpenStreetMap contributors'
    }}).addTo(map);

    var places = {geojson};
    L.geoJSON(places, {{
      pointToLayer: function (feature, latlng) {{
        return L.circleMarker(latlng, {{ radius: 4, weight: 1 }});
      }},
      onEachFeature: function (feature, layer) {{
        var properties = feature.properties || {{}};
        var lines = Object.keys(properties).map(function (key) {{
          return '<b>' + key + '</b>: ' + String(properties[key]);
        }});
        layer.bindPopup(lines.join('<br/>'));
      }}
    }}).addTo(map);
  </script>
</body>
</html>
"#
    );

    fs::write(out, document).with_context(|| format!("impossible d'écrire la carte {:?}", out))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaflet_document_embeds_geojson_and_center() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("places.html");
        let geojson = r#"{"type":"FeatureCollection","features":[]}"#;

        write_leaflet_map(geojson, (2.35, 48.85), "Lieux", &out).unwrap();
        let document = fs::read_to_string(&out).unwrap();
        assert!(document.contains("setView([48.85, 2.35]"));
        assert!(document.contains(geojson));
        assert!(document.contains("L.geoJSON"));
        assert!(document.contains("<title>Lieux</title>"));
    }
}
