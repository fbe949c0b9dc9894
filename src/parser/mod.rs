pub mod answer_key;
pub mod assemble;
pub mod attribute;
pub mod chapters;
pub mod choice;
pub mod essay;
pub mod html;
pub mod normalize;

use serde::Serialize;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::record::{ChapterBoundary, QuestionRecord, RawSource, SourceKind};
use answer_key::{AnswerKey, AnswerSource};
use assemble::Assembler;

/// Per-source counters, printed in the batch summary and written to the
/// output envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Candidate blocks the extractor found.
    pub matched: usize,
    /// Rejected by the extractor (caps, short stems or bodies).
    pub rejected: usize,
    /// Rejected by the assembler.
    pub dropped: usize,
    pub emitted: usize,
    pub chapters: usize,
    pub answers_table: usize,
    pub answers_fallback: usize,
    pub fallback_ran: bool,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<QuestionRecord>,
    pub boundaries: Vec<ChapterBoundary>,
    pub answer_key: Option<AnswerKey>,
    pub report: ExtractionReport,
}

/// Normalize → segment → extract → attribute → (resolve answers) → assemble.
/// Pure: the same source and config always give the same records.
pub fn process_source(source: &RawSource, cfg: &ExtractionConfig) -> Extraction {
    let extraction = match source.kind {
        SourceKind::ChoiceDoc => process_choice(source, cfg),
        SourceKind::EssayDoc => process_essay(source, cfg),
        SourceKind::ScrapedHtml => process_html(source, cfg),
    };
    debug!(
        source = %source.name,
        subject = %cfg.subject,
        records = extraction.report.emitted,
        rejected = extraction.report.rejected + extraction.report.dropped,
        "processed"
    );
    extraction
}

/// Boundaries as they would be used for attribution, without extracting.
pub fn chapter_boundaries(source: &RawSource, cfg: &ExtractionConfig) -> Vec<ChapterBoundary> {
    match source.kind {
        SourceKind::ChoiceDoc => chapters::segment(&normalize::normalize(&source.text, &cfg.boilerplate), cfg),
        SourceKind::EssayDoc => essay_boundaries(&normalize::normalize_lines(&source.text), cfg).0,
        SourceKind::ScrapedHtml => chapters::segment(&html::mask_tags(&source.text), cfg),
    }
}

fn process_choice(source: &RawSource, cfg: &ExtractionConfig) -> Extraction {
    let text = normalize::normalize(&source.text, &cfg.boilerplate);
    let boundaries = chapters::segment(&text, cfg);
    let scan = choice::extract(&text, cfg);

    let mut asm = Assembler::new(cfg, &source.subject);
    for draft in scan.drafts {
        let chapter = attribute::attribute(draft.offset, &boundaries).to_string();
        let answer = draft.answer_index;
        asm.push_choice(draft, &chapter, answer);
    }
    finish(asm, boundaries, None, scan.matched, scan.rejected)
}

/// `第N章` headings and `N.M` section headers in one boundary list,
/// returned with the essay scan that produced the sections.
fn essay_boundaries(text: &str, cfg: &ExtractionConfig) -> (Vec<ChapterBoundary>, essay::EssayScan) {
    let mut scan = essay::extract(text, cfg);
    let sections = std::mem::take(&mut scan.sections);
    (chapters::merge(chapters::segment(text, cfg), sections), scan)
}

/// Essays take their chapter from the nearest heading or section header
/// above them.
fn process_essay(source: &RawSource, cfg: &ExtractionConfig) -> Extraction {
    let text = normalize::normalize_lines(&source.text);
    let (boundaries, scan) = essay_boundaries(&text, cfg);

    let mut asm = Assembler::new(cfg, &source.subject);
    for draft in scan.drafts {
        let chapter = attribute::attribute(draft.offset, &boundaries).to_string();
        asm.push_essay(draft, &chapter);
    }
    finish(asm, boundaries, None, scan.matched, scan.rejected)
}

/// The answer table wins over an inline `答案：X` mark in the question.
fn process_html(source: &RawSource, cfg: &ExtractionConfig) -> Extraction {
    let boundaries = chapters::segment(&html::mask_tags(&source.text), cfg);
    let key = AnswerKey::resolve(&source.text, &cfg.limits);
    if key.is_empty() {
        debug!(source = %source.name, "page has no answer key");
    }
    let scan = html::extract(&source.text, cfg);

    let mut asm = Assembler::new(cfg, &source.subject);
    for draft in scan.drafts {
        let chapter = attribute::attribute(draft.offset, &boundaries).to_string();
        let answer = key.get(draft.number).or(draft.answer_index);
        asm.push_choice(draft, &chapter, answer);
    }
    finish(asm, boundaries, Some(key), scan.matched, scan.rejected)
}

fn finish(
    asm: Assembler<'_>,
    boundaries: Vec<ChapterBoundary>,
    answer_key: Option<AnswerKey>,
    matched: usize,
    rejected: usize,
) -> Extraction {
    let (records, dropped) = asm.finish();
    let (answers_table, answers_fallback, fallback_ran) = answer_key.as_ref().map_or((0, 0, false), |k| {
        (
            k.count(AnswerSource::Table),
            k.count(AnswerSource::Fallback),
            k.fallback_ran(),
        )
    });
    let report = ExtractionReport {
        matched,
        rejected,
        dropped,
        emitted: records.len(),
        chapters: boundaries.len(),
        answers_table,
        answers_fallback,
        fallback_ran,
    };
    Extraction {
        records,
        boundaries,
        answer_key,
        report,
    }
}
