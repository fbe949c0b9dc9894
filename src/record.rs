use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[value(name = "choice")]
    ChoiceDoc,
    #[value(name = "essay")]
    EssayDoc,
    #[value(name = "html")]
    ScrapedHtml,
}

/// One document handed to the pipeline. Text is already extracted.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub name: String,
    pub text: String,
    pub kind: SourceKind,
    pub subject: String,
    /// Scraped pages only; used for labelling output.
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterBoundary {
    pub offset: usize,
    pub number: u32,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Choice,
    Essay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: char,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: usize,
    pub chapter: String,
    pub stem: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    pub answer_index: Option<usize>,
    pub kind: QuestionKind,
    pub subject: String,
}

pub const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// A→0 … D→3, either case.
pub fn letter_index(letter: char) -> Option<usize> {
    OPTION_LABELS
        .iter()
        .position(|l| *l == letter.to_ascii_uppercase())
}
