use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::normalize::{clean_field, contains_boilerplate, is_page_footer};
use crate::config::ExtractionConfig;
use crate::record::ChapterBoundary;

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\s+(.+)$").unwrap());
static QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})([.．、])\s*(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InSection,
    InQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssayDraft {
    pub offset: usize,
    pub number: u32,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct EssayScan {
    pub drafts: Vec<EssayDraft>,
    /// One boundary per `N.M` section header, in text order.
    pub sections: Vec<ChapterBoundary>,
    pub matched: usize,
    pub rejected: usize,
}

struct OpenQuestion {
    offset: usize,
    number: u32,
    body: String,
}

/// Walk line-normalized text. Section headers become chapter boundaries,
/// two-digit markers open a question, and the lines after a marker
/// accumulate into its body until the next marker or end of input.
pub fn extract(text: &str, cfg: &ExtractionConfig) -> EssayScan {
    let mut scan = EssayScan::default();
    let mut state = State::Idle;
    let mut open: Option<OpenQuestion> = None;
    let mut offset = 0;

    for raw in text.split('\n') {
        let line_offset = offset;
        offset += raw.len() + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SECTION_RE.captures(line) {
            flush(&mut open, cfg, &mut scan);
            let number = caps[1].parse().unwrap_or_default();
            let label = section_label(number, &caps[3], cfg);
            if !label.is_empty() {
                scan.sections.push(ChapterBoundary {
                    offset: line_offset,
                    number,
                    label,
                });
            }
            state = State::InSection;
            continue;
        }

        if let Some(caps) = QUESTION_RE.captures(line).filter(|c| !is_decimal(c)) {
            flush(&mut open, cfg, &mut scan);
            scan.matched += 1;
            open = Some(OpenQuestion {
                offset: line_offset,
                number: caps[1].parse().unwrap_or_default(),
                body: caps[3].trim().to_string(),
            });
            state = State::InQuestion;
            continue;
        }

        if state != State::InQuestion
            || contains_boilerplate(line, &cfg.boilerplate)
            || is_page_footer(line)
        {
            continue;
        }

        if let Some(q) = open.as_mut() {
            if !q.body.is_empty() {
                q.body.push('\n');
            }
            q.body.push_str(line);
        }
    }

    flush(&mut open, cfg, &mut scan);
    scan
}

fn flush(open: &mut Option<OpenQuestion>, cfg: &ExtractionConfig, scan: &mut EssayScan) {
    let Some(q) = open.take() else {
        return;
    };
    let body = clean_field(&q.body, &cfg.boilerplate);
    if body.chars().count() < cfg.limits.min_essay_chars {
        debug!(number = q.number, "essay body too short");
        scan.rejected += 1;
        return;
    }
    scan.drafts.push(EssayDraft {
        offset: q.offset,
        number: q.number,
        body,
    });
}

/// `12.5%` opens a continuation line, not question 12.
fn is_decimal(caps: &regex::Captures) -> bool {
    let dotted = matches!(&caps[2], "." | "．");
    dotted && caps[3].chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Table name for the chapter number, else the heading text itself.
fn section_label(number: u32, raw: &str, cfg: &ExtractionConfig) -> String {
    if let Some(name) = cfg.chapter_name(number) {
        return name.to_string();
    }
    clean_field(raw, &cfg.boilerplate)
        .chars()
        .take(cfg.limits.max_label_chars)
        .collect()
}
