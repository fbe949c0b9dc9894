use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::html::QUESTION_START_RE;
use crate::config::Thresholds;
use crate::record::letter_index;

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"参考答案|答案速查|标准答案|答案汇总").unwrap());
static TABLE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</table\s*>").unwrap());
static TABLE_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<table\b").unwrap());
static TABLE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})(?:\s|&nbsp;|<[^>]*>|[.．、:：)）\-])*([A-D])").unwrap()
});
static LOOSE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2})\s+([A-D])").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Table,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerKeyEntry {
    pub question_number: u32,
    pub answer_index: usize,
    pub source: AnswerSource,
}

/// Question number → answer, at most one entry per number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerKey {
    entries: BTreeMap<u32, AnswerKeyEntry>,
    fallback_ran: bool,
}

impl AnswerKey {
    /// Table pass first; the loose full-page scan only runs when the table
    /// gave fewer than `table_threshold` entries, and only fills gaps.
    pub fn resolve(html: &str, limits: &Thresholds) -> AnswerKey {
        let mut key = AnswerKey::default();

        if let Some(region) = locate_table(html) {
            for (number, index) in pairs(&html[region], &TABLE_PAIR_RE, limits.answer_cap) {
                key.insert_if_absent(number, index, AnswerSource::Table);
            }
        }

        let table = key.len();
        if table < limits.table_threshold {
            key.fallback_ran = true;
            for (number, index) in pairs(html, &LOOSE_PAIR_RE, limits.answer_cap) {
                key.insert_if_absent(number, index, AnswerSource::Fallback);
            }
        }

        debug!(table, total = key.len(), fallback = key.fallback_ran, "answer key");
        key
    }

    fn insert_if_absent(&mut self, number: u32, index: usize, source: AnswerSource) {
        self.entries.entry(number).or_insert(AnswerKeyEntry {
            question_number: number,
            answer_index: index,
            source,
        });
    }

    pub fn get(&self, number: u32) -> Option<usize> {
        self.entry(number).map(|e| e.answer_index)
    }

    pub fn entry(&self, number: u32) -> Option<&AnswerKeyEntry> {
        self.entries.get(&number)
    }

    pub fn entries(&self) -> impl Iterator<Item = &AnswerKeyEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, source: AnswerSource) -> usize {
        self.entries.values().filter(|e| e.source == source).count()
    }

    pub fn fallback_ran(&self) -> bool {
        self.fallback_ran
    }
}

/// Span from the first answer-header phrase that is followed by a `<table`
/// (with no question starting in between) through the end of that table,
/// or end of page when the table is never closed. A phrase in the page
/// title or a closing remark after the table does not qualify.
pub fn locate_table(html: &str) -> Option<Range<usize>> {
    ANCHOR_RE.find_iter(html).find_map(|anchor| {
        let table = TABLE_START_RE.find_at(html, anchor.end())?;
        let question_first = QUESTION_START_RE
            .find_at(html, anchor.end())
            .is_some_and(|q| q.start() < table.start());
        if question_first {
            return None;
        }
        let end = TABLE_END_RE
            .find_at(html, table.end())
            .map_or(html.len(), |m| m.end());
        Some(anchor.start()..end)
    })
}

/// `(number, letter)` pairs with the number in `1..=cap`. A number glued to
/// a preceding digit (`2023`) or a letter glued to a following one (`1 Apple`)
/// does not count.
fn pairs(region: &str, re: &Regex, cap: u32) -> Vec<(u32, usize)> {
    re.captures_iter(region)
        .filter_map(|caps| {
            let num = caps.get(1)?;
            let letter = caps.get(2)?;
            let glued_before = region[..num.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_digit());
            let glued_after = region[letter.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic());
            if glued_before || glued_after {
                return None;
            }
            let number = num.as_str().parse::<u32>().ok()?;
            if !(1..=cap).contains(&number) {
                return None;
            }
            let index = letter.as_str().chars().next().and_then(letter_index)?;
            Some((number, index))
        })
        .collect()
}
