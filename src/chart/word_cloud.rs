//! Text-frequency visualization.
//!
//! All row values of the text column are folded into one corpus, tokenized,
//! counted with stopwords removed, capped at `MAX_TERMS`, and laid out as a
//! simple left-to-right flow with font size scaled by frequency.

use std::collections::HashMap;

use anyhow::Result;
use plotters::prelude::*;

/// Displayed-term cap.
pub const MAX_TERMS: usize = 100;

const MIN_FONT: f64 = 12.0;
const MAX_FONT: f64 = 46.0;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from",
    "had", "has", "have", "he", "her", "his", "i", "if", "in", "is", "it",
    "its", "my", "no", "not", "of", "on", "or", "our", "she", "so", "that",
    "the", "their", "them", "then", "there", "they", "this", "to", "was",
    "we", "were", "which", "will", "with", "you", "your",
];

/// Count term frequencies over the column values. Empty cells contribute
/// nothing. Terms are lowercased, single characters and stopwords are
/// dropped, ties keep first-seen order.
pub fn term_frequencies(values: &[String]) -> Vec<(String, u64)> {
    let mut counts: HashMap<String, (usize, u64)> = HashMap::new();
    let mut order = 0usize;

    for value in values {
        for token in value.split(|c: char| !c.is_alphanumeric()) {
            let term = token.to_lowercase();
            if term.chars().count() < 2 || STOPWORDS.contains(&term.as_str()) {
                continue;
            }
            let entry = counts.entry(term).or_insert_with(|| {
                order += 1;
                (order, 0)
            });
            entry.1 += 1;
        }
    }

    let mut terms: Vec<(String, usize, u64)> = counts
        .into_iter()
        .map(|(term, (first_seen, count))| (term, first_seen, count))
        .collect();
    terms.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
    terms.truncate(MAX_TERMS);
    terms.into_iter().map(|(term, _, count)| (term, count)).collect()
}

/// Draw the terms onto the canvas, largest first, wrapping rows until the
/// canvas is full.
pub fn draw_terms(
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    title: &str,
    terms: &[(String, u64)],
) -> Result<()> {
    let root = root.titled(title, ("sans-serif", 24).into_font())?;
    let (width, height) = root.dim_in_pixel();

    let max_count = terms.first().map(|(_, c)| *c).unwrap_or(1).max(1) as f64;

    let margin = 14i32;
    let mut x = margin;
    let mut y = margin + 10;
    let mut row_height = 0i32;

    for (idx, (term, count)) in terms.iter().enumerate() {
        let size = MIN_FONT + (MAX_FONT - MIN_FONT) * (*count as f64 / max_count);
        // Rough advance-width estimate; exact metrics don't matter for a cloud.
        let term_width = (term.chars().count() as f64 * size * 0.6) as i32;
        let term_height = size as i32 + 6;

        if x + term_width > width as i32 - margin {
            x = margin;
            y += row_height + 4;
            row_height = 0;
        }
        if y + term_height > height as i32 - margin {
            break;
        }

        let color = super::SLICE_COLORS[idx % super::SLICE_COLORS.len()];
        root.draw(&Text::new(
            term.clone(),
            (x, y),
            ("sans-serif", size).into_font().color(&color),
        ))?;

        x += term_width + 10;
        row_height = row_height.max(term_height);
    }

    Ok(())
}
