//! Slide-deck export boundary.
//!
//! Consumes the conversation and produces a paginated deck: one title
//! slide, one content slide per assistant turn, and one image slide per
//! chart attached to that turn, in call order. Chart images are rendered to
//! temporary files held by a guard that deletes them on every exit path, so
//! repeated exports never accumulate temp storage.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::session::{ChatTurn, Role};

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub enum SlideBody {
    Text(String),
    Image(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Slide {
    pub title: String,
    pub body: SlideBody,
}

/// Temp chart images awaiting persistence. Dropping the guard removes
/// every tracked file, whether or not the export finished.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove temp chart image");
            }
        }
    }
}

pub struct SlideDeck {
    pub slides: Vec<Slide>,
    artifacts: TempArtifacts,
}

/// Assemble a deck from the conversation. Charts that fail to render are
/// skipped with a warning; the deck is still produced.
pub fn build_deck(conversation: &[ChatTurn]) -> Result<SlideDeck> {
    let mut artifacts = TempArtifacts::default();
    let mut slides = vec![Slide {
        title: "Data Analysis Report".to_string(),
        body: SlideBody::Text("Generated by AI Assistant".to_string()),
    }];

    for turn in conversation {
        if turn.role != Role::Assistant {
            continue;
        }
        slides.push(Slide {
            title: "Analysis".to_string(),
            body: SlideBody::Text(turn.content.clone()),
        });

        for chart in &turn.charts {
            let path = temp_chart_path();
            match chart.write_png(&path) {
                Ok(()) => {
                    artifacts.track(path.clone());
                    slides.push(Slide {
                        title: chart.title.clone(),
                        body: SlideBody::Image(path),
                    });
                }
                Err(e) => {
                    warn!(title = %chart.title, error = %e, "Skipping chart that failed to render");
                }
            }
        }
    }

    Ok(SlideDeck { slides, artifacts })
}

fn temp_chart_path() -> PathBuf {
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "chart_{}_{seq}.png",
        Utc::now().format("%Y%m%d_%H%M%S_%f")
    ))
}

#[derive(serde::Serialize)]
struct ManifestSlide<'a> {
    index: usize,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

impl SlideDeck {
    /// Persist the deck into `dir`: images copied out of temp storage,
    /// plus a `manifest.json` describing every slide in order. The temp
    /// artifacts are cleaned up when the deck is dropped.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export dir {}", dir.display()))?;

        let mut manifest = Vec::with_capacity(self.slides.len());
        for (index, slide) in self.slides.iter().enumerate() {
            let entry = match &slide.body {
                SlideBody::Text(text) => ManifestSlide {
                    index,
                    title: &slide.title,
                    text: Some(text),
                    image: None,
                },
                SlideBody::Image(source) => {
                    let file_name = format!("slide_{index:03}.png");
                    fs::copy(source, dir.join(&file_name)).with_context(|| {
                        format!("Failed to copy chart image {}", source.display())
                    })?;
                    ManifestSlide {
                        index,
                        title: &slide.title,
                        text: None,
                        image: Some(file_name),
                    }
                }
            };
            manifest.push(entry);
        }

        let manifest_path = dir.join("manifest.json");
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        info!(path = %manifest_path.display(), slides = self.slides.len(), "Deck exported");
        Ok(manifest_path)
    }

    /// Number of slides that carry a chart image.
    pub fn image_count(&self) -> usize {
        self.slides
            .iter()
            .filter(|s| matches!(s.body, SlideBody::Image(_)))
            .count()
    }

    #[cfg(test)]
    fn artifact_paths(&self) -> Vec<PathBuf> {
        self.artifacts.paths.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatTurn;

    #[test]
    fn test_deck_structure_from_conversation() {
        let conversation = vec![
            ChatTurn::user("show me things"),
            ChatTurn::assistant("here are things", Vec::new()),
            ChatTurn::user("more"),
            ChatTurn::assistant("more things", Vec::new()),
        ];
        let deck = build_deck(&conversation).unwrap();

        // Title slide plus one content slide per assistant turn.
        assert_eq!(deck.slides.len(), 3);
        assert_eq!(deck.slides[0].title, "Data Analysis Report");
        assert_eq!(deck.slides[1].title, "Analysis");
        assert_eq!(deck.image_count(), 0);
        match &deck.slides[2].body {
            SlideBody::Text(text) => assert_eq!(text, "more things"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_temp_artifacts_removed_on_drop() {
        let path = temp_chart_path();
        fs::write(&path, b"fake png").unwrap();
        assert!(path.exists());

        {
            let mut artifacts = TempArtifacts::default();
            artifacts.track(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_save_writes_manifest() {
        let conversation = vec![
            ChatTurn::user("q"),
            ChatTurn::assistant("a", Vec::new()),
        ];
        let deck = build_deck(&conversation).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let manifest_path = deck.save(dir.path()).unwrap();
        assert!(manifest_path.exists());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
        assert_eq!(manifest.as_array().unwrap().len(), 2);
        assert_eq!(manifest[0]["title"], "Data Analysis Report");
        assert_eq!(manifest[1]["text"], "a");
    }

    #[test]
    fn test_deck_drop_cleans_tracked_images() {
        let path = temp_chart_path();
        fs::write(&path, b"fake png").unwrap();

        let deck = SlideDeck {
            slides: Vec::new(),
            artifacts: {
                let mut a = TempArtifacts::default();
                a.track(path.clone());
                a
            },
        };
        assert_eq!(deck.artifact_paths().len(), 1);
        drop(deck);
        assert!(!path.exists());
    }
}
