use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{Dimension, EsgTable};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| hsl_to_color32((i as f32 / n as f32) * 360.0, 0.75, 0.55))
        .collect()
}

/// Blue (0.0) through green to red (1.0). Values outside [0, 1] are clamped.
pub fn heat_color(t: f64) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    hsl_to_color32(240.0 * (1.0 - t as f32), 0.65, 0.5)
}

/// Correlation coefficient in [-1, 1] on the same blue-to-red scale.
pub fn diverging_color(r: f64) -> Color32 {
    heat_color((r + 1.0) / 2.0)
}

fn hsl_to_color32(hue: f32, saturation: f32, lightness: f32) -> Color32 {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Color mapping: category label → Color32
// ---------------------------------------------------------------------------

/// Stable colours for regions, departments and years, so a category keeps
/// its colour across every chart.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Assign palette colours to `labels` in order; repeats keep their first
    /// colour.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !unique.contains(&label) {
                unique.push(label);
            }
        }
        let palette = generate_palette(unique.len());
        ColorMap {
            mapping: unique.into_iter().zip(palette).collect(),
            default_color: Color32::GRAY,
        }
    }

    pub fn for_table(table: &EsgTable) -> Self {
        let labels = [Dimension::Region, Dimension::Department, Dimension::Year]
            .into_iter()
            .flat_map(|dim| table.distinct_values(dim).iter().map(ToString::to_string));
        Self::new(labels)
    }

    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let colors = generate_palette(6);
        assert_eq!(colors.len(), 6);
        for (i, a) in colors.iter().enumerate() {
            assert!(colors[i + 1..].iter().all(|b| b != a));
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn unknown_labels_fall_back_to_gray() {
        let map = ColorMap::new(["EU", "NA", "EU"]);
        assert_ne!(map.color_for("EU"), map.color_for("NA"));
        assert_eq!(map.color_for("APAC"), Color32::GRAY);
    }

    #[test]
    fn heat_scale_ends() {
        assert_ne!(heat_color(0.0), heat_color(1.0));
        assert_eq!(heat_color(2.0), heat_color(1.0));
        assert_eq!(diverging_color(-1.0), heat_color(0.0));
    }
}
