use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::record::ChapterBoundary;

static ARABIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第\s*(\d{1,3})\s*章\s*([^\s()（）\[\]【】<>]*)").unwrap()
});
static CHINESE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第\s*([一二三四五六七八九十]{1,3})\s*章\s*([^\s()（）\[\]【】<>]*)").unwrap()
});
static HEADING_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"第\s*(?:\d{1,3}|[一二三四五六七八九十]{1,3})\s*章").unwrap());

struct Candidate {
    offset: usize,
    numeral: String,
    number: u32,
    title: String,
}

/// Find chapter headings, ordered by offset, one boundary per label
/// (the earliest one wins). An empty result is a valid "no chapters" state.
pub fn segment(text: &str, cfg: &ExtractionConfig) -> Vec<ChapterBoundary> {
    let limits = &cfg.limits;
    let mut candidates: Vec<Candidate> = Vec::new();

    for caps in ARABIC_RE.captures_iter(text) {
        let Ok(number) = caps[1].parse::<u32>() else {
            continue;
        };
        candidates.push(Candidate {
            offset: caps.get(0).map_or(0, |m| m.start()),
            numeral: caps[1].to_string(),
            number,
            title: caps[2].to_string(),
        });
    }
    for caps in CHINESE_RE.captures_iter(text) {
        let Some(number) = chinese_numeral(&caps[1]) else {
            continue;
        };
        candidates.push(Candidate {
            offset: caps.get(0).map_or(0, |m| m.start()),
            numeral: caps[1].to_string(),
            number,
            title: caps[2].to_string(),
        });
    }

    let found = candidates.len();
    let kept = candidates
        .into_iter()
        .filter(|c| c.number <= limits.chapter_cap)
        .filter_map(|c| {
            let title = clean_title(&c.title);
            let len = title.chars().count();
            if len == 0 || len > limits.max_label_chars {
                return None;
            }
            let label = match cfg.chapter_name(c.number) {
                Some(name) => name.to_string(),
                None => format!("第{}章 {}", c.numeral, title),
            };
            Some(ChapterBoundary {
                offset: c.offset,
                number: c.number,
                label,
            })
        });
    let boundaries = ordered(kept);

    debug!(found, kept = boundaries.len(), "chapter headings");
    boundaries
}

/// Combine two boundary lists into one, ordered by offset with one
/// boundary per label. On a shared label the earlier offset wins.
pub fn merge(a: Vec<ChapterBoundary>, b: Vec<ChapterBoundary>) -> Vec<ChapterBoundary> {
    ordered(a.into_iter().chain(b))
}

fn ordered(boundaries: impl IntoIterator<Item = ChapterBoundary>) -> Vec<ChapterBoundary> {
    boundaries
        .into_iter()
        .sorted_by_key(|b| b.offset)
        .unique_by(|b| b.label.clone())
        .collect()
}

/// Start of the next chapter heading at or after `from`.
pub fn next_heading_start(text: &str, from: usize) -> Option<usize> {
    HEADING_MARK_RE.find_at(text, from).map(|m| m.start())
}

fn clean_title(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '：' | '.' | '、' | '-' | '—'))
        .to_string()
}

/// 一..十 and two-place forms up to 九十九.
pub fn chinese_numeral(s: &str) -> Option<u32> {
    let digit = |c: char| -> Option<u32> {
        "一二三四五六七八九"
            .chars()
            .position(|d| d == c)
            .map(|p| p as u32 + 1)
    };
    let chars: Vec<char> = s.chars().collect();
    match chars.as_slice() {
        ['十'] => Some(10),
        [d] => digit(*d),
        ['十', u] => Some(10 + digit(*u)?),
        [t, '十'] => Some(digit(*t)? * 10),
        [t, '十', u] => Some(digit(*t)? * 10 + digit(*u)?),
        _ => None,
    }
}
