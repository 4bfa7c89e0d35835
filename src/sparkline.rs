use crate::settings::LensSettings;

const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SEPARATOR: &str = "    ";

fn glyph_for(percentage: f64) -> char {
    let top = (GLYPHS.len() - 1) as f64;
    let level = (percentage / 100.0 * top).floor().clamp(0.0, top);
    GLYPHS[level as usize]
}

/// Renders percentages in `[0, 100]` as a bar glyph each, after a separator.
pub fn render(samples: Option<&[f64]>, settings: &LensSettings) -> String {
    match samples {
        Some(samples) if settings.sparkline.enabled && !samples.is_empty() => {
            let mut sparkline = String::from(SEPARATOR);
            sparkline.extend(samples.iter().map(|&sample| glyph_for(sample)));
            sparkline
        }
        _ => String::new(),
    }
}
