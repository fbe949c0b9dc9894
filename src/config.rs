use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const BUILTIN_SETTINGS: &str = include_str!("../config/defaults.toml");
const DEFAULT_CONFIG_PATH: &str = "config/subjects.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("subject {subject:?}: chapter key {key:?} is not a chapter number")]
    ChapterKey { subject: String, key: String },
}

/// Heuristic limits for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Chapter numbers above this are table-of-contents or footnote noise.
    pub chapter_cap: u32,
    /// Leading question numbers above this are page artifacts.
    pub question_cap: u32,
    pub min_stem_chars: usize,
    pub min_essay_chars: usize,
    /// Highest question number an answer key may carry.
    pub answer_cap: u32,
    /// Table entries needed before the loose fallback scan is skipped.
    pub table_threshold: usize,
    pub max_label_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            chapter_cap: 10,
            question_cap: 500,
            min_stem_chars: 4,
            min_essay_chars: 10,
            answer_cap: 40,
            table_threshold: 30,
            max_label_chars: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    pub chapter_cap: Option<u32>,
    pub question_cap: Option<u32>,
    pub min_stem_chars: Option<usize>,
    pub min_essay_chars: Option<usize>,
    pub answer_cap: Option<u32>,
    pub table_threshold: Option<usize>,
    pub max_label_chars: Option<usize>,
}

impl ThresholdOverrides {
    fn apply(&self, base: Thresholds) -> Thresholds {
        Thresholds {
            chapter_cap: self.chapter_cap.unwrap_or(base.chapter_cap),
            question_cap: self.question_cap.unwrap_or(base.question_cap),
            min_stem_chars: self.min_stem_chars.unwrap_or(base.min_stem_chars),
            min_essay_chars: self.min_essay_chars.unwrap_or(base.min_essay_chars),
            answer_cap: self.answer_cap.unwrap_or(base.answer_cap),
            table_threshold: self.table_threshold.unwrap_or(base.table_threshold),
            max_label_chars: self.max_label_chars.unwrap_or(base.max_label_chars),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubjectSettings {
    /// Chapter number (as a string key) → canonical chapter label.
    pub chapters: BTreeMap<String, String>,
    /// Extra phrases stripped for this subject only.
    pub boilerplate: Vec<String>,
    pub thresholds: ThresholdOverrides,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Page URL with a `{year}` placeholder.
    pub url_template: String,
    pub delay_ms: u64,
    pub backoff_ms: u64,
    pub retries: u32,
    pub timeout_secs: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        ScrapeSettings {
            url_template: String::new(),
            delay_ms: 1000,
            backoff_ms: 2000,
            retries: 1,
            timeout_secs: 30,
        }
    }
}

impl ScrapeSettings {
    pub fn url_for(&self, year: i32) -> String {
        self.url_template.replace("{year}", &year.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub boilerplate: Vec<String>,
    pub defaults: Thresholds,
    pub subjects: BTreeMap<String, SubjectSettings>,
    pub scrape: ScrapeSettings,
}

impl Settings {
    /// Built-in settings only (no file, no environment).
    pub fn builtin() -> Result<Settings, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(BUILTIN_SETTINGS, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Built-ins, then the optional settings file, then `EXAM_*` variables
    /// (`EXAM_DEFAULTS__MIN_STEM_CHARS=6`).
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };
        let settings = Config::builder()
            .add_source(File::from_str(BUILTIN_SETTINGS, FileFormat::Toml))
            .add_source(file)
            .add_source(
                Environment::with_prefix("EXAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Merge defaults with a subject's overrides into the read-only run config.
    pub fn extraction_config(&self, subject: &str) -> Result<ExtractionConfig, ConfigError> {
        let mut boilerplate = self.boilerplate.clone();
        let (chapters, limits) = match self.subjects.get(subject) {
            Some(s) => {
                boilerplate.extend(s.boilerplate.iter().cloned());
                (parse_chapter_keys(subject, &s.chapters)?, s.thresholds.apply(self.defaults))
            }
            None => {
                debug!(subject, "no subject settings, using defaults");
                (BTreeMap::new(), self.defaults)
            }
        };

        Ok(ExtractionConfig {
            subject: subject.to_string(),
            chapters,
            boilerplate,
            limits,
        })
    }
}

fn parse_chapter_keys(
    subject: &str,
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<u32, String>, ConfigError> {
    raw.iter()
        .map(|(key, label)| {
            let number = key.trim().parse::<u32>().map_err(|_| ConfigError::ChapterKey {
                subject: subject.to_string(),
                key: key.clone(),
            })?;
            Ok((number, label.trim().to_string()))
        })
        .collect()
}

/// Everything a single pipeline run reads. Built once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub subject: String,
    pub chapters: BTreeMap<u32, String>,
    pub boilerplate: Vec<String>,
    pub limits: Thresholds,
}

impl ExtractionConfig {
    pub fn chapter_name(&self, number: u32) -> Option<&str> {
        self.chapters.get(&number).map(String::as_str)
    }
}
