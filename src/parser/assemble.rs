use tracing::debug;

use super::choice::ChoiceDraft;
use super::essay::EssayDraft;
use crate::config::ExtractionConfig;
use crate::record::{QuestionKind, QuestionOption, QuestionRecord, OPTION_LABELS};

/// Final validation gate. Records get ids in the order they are accepted,
/// so ids stay contiguous no matter how many drafts are dropped.
pub struct Assembler<'a> {
    cfg: &'a ExtractionConfig,
    subject: &'a str,
    records: Vec<QuestionRecord>,
    dropped: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(cfg: &'a ExtractionConfig, subject: &'a str) -> Self {
        Assembler {
            cfg,
            subject,
            records: Vec::new(),
            dropped: 0,
        }
    }

    /// Needs a stem and four non-empty options.
    pub fn push_choice(&mut self, draft: ChoiceDraft, chapter: &str, answer_index: Option<usize>) -> bool {
        if draft.stem.is_empty() || draft.options.iter().any(|o| o.is_empty()) {
            debug!(number = draft.number, "choice draft failed validation");
            self.dropped += 1;
            return false;
        }

        let options = OPTION_LABELS
            .iter()
            .zip(draft.options)
            .map(|(&label, text)| QuestionOption { label, text })
            .collect();

        self.push(QuestionRecord {
            id: 0,
            chapter: chapter.to_string(),
            stem: draft.stem,
            options,
            answer_index: answer_index.filter(|&i| i < OPTION_LABELS.len()),
            kind: QuestionKind::Choice,
            subject: self.subject.to_string(),
        });
        true
    }

    pub fn push_essay(&mut self, draft: EssayDraft, chapter: &str) -> bool {
        if draft.body.chars().count() < self.cfg.limits.min_essay_chars {
            debug!(number = draft.number, "essay draft failed validation");
            self.dropped += 1;
            return false;
        }

        self.push(QuestionRecord {
            id: 0,
            chapter: chapter.to_string(),
            stem: draft.body,
            options: Vec::new(),
            answer_index: None,
            kind: QuestionKind::Essay,
            subject: self.subject.to_string(),
        });
        true
    }

    fn push(&mut self, mut record: QuestionRecord) {
        record.id = self.records.len() + 1;
        self.records.push(record);
    }

    pub fn finish(self) -> (Vec<QuestionRecord>, usize) {
        (self.records, self.dropped)
    }
}
