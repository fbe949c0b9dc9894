use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::chapters::next_heading_start;
use super::normalize::clean_field;
use crate::config::ExtractionConfig;
use crate::record::{letter_index, OPTION_LABELS};

/// `(12)` / `（12）`, or `12.` / `12．` / `12、` after whitespace.
static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[(（]\s*(\d{1,4})\s*[)）]|(?:^|\s)(\d{1,4})[.．、]").unwrap()
});
static OPTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    OPTION_LABELS
        .iter()
        .map(|l| Regex::new(&format!("{}[.．、]", l)).unwrap())
        .collect()
});
static ANSWER_MARK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:【\s*(?:正确|参考)?答案\s*】|(?:正确|参考)?答案\s*[:：])\s*([A-Da-d])").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marker {
    start: usize,
    end: usize,
    number: u32,
}

/// One raw "stem + A..D" match, byte spans into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMatch {
    pub start: usize,
    pub end: usize,
    pub number: u32,
    pub stem: String,
    pub options: [String; 4],
}

/// A choice question before chapter attribution and id assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceDraft {
    pub offset: usize,
    pub number: u32,
    pub stem: String,
    pub options: [String; 4],
    pub answer_index: Option<usize>,
}

#[derive(Debug, Default)]
pub struct ChoiceScan {
    pub drafts: Vec<ChoiceDraft>,
    pub matched: usize,
    pub rejected: usize,
}

/// Scan the whole text block by block. Each search resumes where the
/// previous match ended; rejected matches are dropped silently.
pub fn extract(text: &str, cfg: &ExtractionConfig) -> ChoiceScan {
    let limits = &cfg.limits;
    let mut scan = ChoiceScan::default();
    let mut cursor = 0;

    while let Some(block) = find_next_block(text, cursor) {
        cursor = block.end;
        scan.matched += 1;

        if block.number > limits.question_cap {
            debug!(number = block.number, "question number over cap");
            scan.rejected += 1;
            continue;
        }

        let stem = clean_field(&block.stem, &cfg.boilerplate);
        if stem.chars().count() < limits.min_stem_chars {
            debug!(number = block.number, stem = %stem, "stem too short");
            scan.rejected += 1;
            continue;
        }

        let [a, b, c, d] = block.options;
        let (d, answer_index) = split_answer_mark(&d);
        let options = [a, b, c, d].map(|o| clean_field(&o, &cfg.boilerplate));

        scan.drafts.push(ChoiceDraft {
            offset: block.start,
            number: block.number,
            stem,
            options,
            answer_index,
        });
    }

    scan
}

/// Leftmost block starting at or after `from`. A block runs from a question
/// marker through options A..D; the last option ends at the next question
/// marker, the next chapter heading, or end of text.
pub fn find_next_block(text: &str, from: usize) -> Option<BlockMatch> {
    let mut cursor = from;
    while let Some(marker) = next_marker(text, cursor) {
        let next_question = next_marker(text, marker.end).map(|m| m.start);
        let next_chapter = next_heading_start(text, marker.end);
        let bound = [next_question, next_chapter]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(text.len());

        if let Some(block) = match_options(text, marker, bound) {
            return Some(block);
        }
        cursor = marker.end;
    }
    None
}

fn match_options(text: &str, marker: Marker, bound: usize) -> Option<BlockMatch> {
    let spans = option_spans(text, marker.end, bound)?;
    Some(BlockMatch {
        start: marker.start,
        end: bound,
        number: marker.number,
        stem: text[marker.end..spans[0].0].to_string(),
        options: option_texts(text, &spans, bound),
    })
}

/// Byte spans of the `A.`..`D.` markers in `text[from..bound]`, in order.
/// Every field before a marker holds at least one character.
pub(crate) fn option_spans(text: &str, from: usize, bound: usize) -> Option<[(usize, usize); 4]> {
    let mut spans = [(0, 0); 4];
    let mut pos = from;
    for (span, re) in spans.iter_mut().zip(OPTION_RES.iter()) {
        let search_from = pos + text[pos..].chars().next()?.len_utf8();
        let m = re.find_at(text, search_from)?;
        if m.end() > bound {
            return None;
        }
        *span = (m.start(), m.end());
        pos = m.end();
    }
    Some(spans)
}

pub(crate) fn option_texts(text: &str, spans: &[(usize, usize); 4], bound: usize) -> [String; 4] {
    [
        text[spans[0].1..spans[1].0].to_string(),
        text[spans[1].1..spans[2].0].to_string(),
        text[spans[2].1..spans[3].0].to_string(),
        text[spans[3].1..bound].to_string(),
    ]
}

fn next_marker(text: &str, from: usize) -> Option<Marker> {
    let mut pos = from;
    while pos <= text.len() {
        let caps = QUESTION_RE.captures_at(text, pos)?;
        let whole = caps.get(0)?;
        let (digits, dotted) = match (caps.get(1), caps.get(2)) {
            (Some(d), _) => (d, false),
            (None, Some(d)) => (d, true),
            (None, None) => return None,
        };
        // `1.5` is a decimal, not a question number.
        let decimal = dotted
            && text[whole.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());
        if !decimal {
            if let Ok(number) = digits.as_str().parse::<u32>() {
                return Some(Marker {
                    start: whole.start(),
                    end: whole.end(),
                    number,
                });
            }
        }
        pos = whole.end();
    }
    None
}

/// Cut a trailing `答案：B` / `【参考答案】B` off the last option.
pub(crate) fn split_answer_mark(option: &str) -> (String, Option<usize>) {
    match ANSWER_MARK_RE.captures(option) {
        Some(caps) => {
            let at = caps.get(0).map_or(option.len(), |m| m.start());
            let index = caps[1].chars().next().and_then(letter_index);
            (option[..at].to_string(), index)
        }
        None => (option.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = "第1章 绪论 (1) 下列说法正确的是？ A. 甲 B. 乙 C. 丙 D. 丁 (2) 另一题？ A.一 B.二 C.三 D.四";

    fn cfg() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn two_blocks() {
        let scan = extract(SCENARIO_A, &cfg());
        assert_eq!(scan.drafts.len(), 2);
        assert_eq!(scan.rejected, 0);

        let q1 = &scan.drafts[0];
        assert_eq!(q1.number, 1);
        assert_eq!(q1.stem, "下列说法正确的是？");
        assert_eq!(q1.options, ["甲", "乙", "丙", "丁"].map(String::from));
        assert_eq!(q1.offset, SCENARIO_A.find("(1)").unwrap());

        let q2 = &scan.drafts[1];
        assert_eq!(q2.stem, "另一题？");
        assert_eq!(q2.options, ["一", "二", "三", "四"].map(String::from));
        assert!(q1.offset < q2.offset);
    }

    #[test]
    fn cursor_resumes_after_match() {
        let first = find_next_block(SCENARIO_A, 0).unwrap();
        assert_eq!(first.end, SCENARIO_A.find("(2)").unwrap());
        let second = find_next_block(SCENARIO_A, first.end).unwrap();
        assert_eq!(second.number, 2);
        assert_eq!(second.end, SCENARIO_A.len());
        assert!(find_next_block(SCENARIO_A, second.end).is_none());
    }

    #[test]
    fn number_over_cap_rejected() {
        let text = "(1200) 这是一道很长的题目？ A. 甲 B. 乙 C. 丙 D. 丁";
        let scan = extract(text, &cfg());
        assert!(scan.drafts.is_empty());
        assert_eq!(scan.matched, 1);
        assert_eq!(scan.rejected, 1);
    }

    #[test]
    fn short_stem_rejected() {
        let text = "(1) 题？ A. 甲 B. 乙 C. 丙 D. 丁 (2) 合格的题目？ A. 甲 B. 乙 C. 丙 D. 丁";
        let scan = extract(text, &cfg());
        assert_eq!(scan.drafts.len(), 1);
        assert_eq!(scan.drafts[0].number, 2);
        assert_eq!(scan.rejected, 1);
    }

    #[test]
    fn last_option_stops_at_chapter_heading() {
        let text = "(1) 第一题的题干？ A. 甲 B. 乙 C. 丙 D. 丁 第2章 线性表 (2) 第二题的题干？ A. 1 B. 2 C. 3 D. 4";
        let scan = extract(text, &cfg());
        assert_eq!(scan.drafts.len(), 2);
        assert_eq!(scan.drafts[0].options[3], "丁");
    }

    #[test]
    fn incomplete_block_skipped() {
        let text = "(1) 只有两个选项？ A. 甲 B. 乙 (2) 完整的题目？ A. 甲 B. 乙 C. 丙 D. 丁";
        let scan = extract(text, &cfg());
        assert_eq!(scan.drafts.len(), 1);
        assert_eq!(scan.drafts[0].number, 2);
        assert_eq!(scan.matched, 1);
    }

    #[test]
    fn dotted_markers_and_decimals() {
        let text = "1. 圆周率约为多少？ A. 3.14 B. 2.71 C. 1.41 D. 1.73 2、 下列哪个是质数？ A. 4 B. 6 C. 7 D. 9";
        let scan = extract(text, &cfg());
        assert_eq!(scan.drafts.len(), 2);
        assert_eq!(scan.drafts[0].options[0], "3.14");
        assert_eq!(scan.drafts[0].options[3], "1.73");
        assert_eq!(scan.drafts[1].number, 2);
        assert_eq!(scan.drafts[1].options[2], "7");
    }

    #[test]
    fn inline_boilerplate_cleaned_per_field() {
        let mut c = cfg();
        c.boilerplate = vec!["仅供学习交流使用".into()];
        let text = "(1) 下列说法正确的是？ A. 甲 B. 乙仅供学习交流使用 C. 丙 D. 丁";
        let scan = extract(text, &c);
        assert_eq!(scan.drafts[0].options[1], "乙");
    }

    #[test]
    fn inline_answer_mark() {
        let text = "(1) 下列说法正确的是？ A. 甲 B. 乙 C. 丙 D. 丁 答案：C (2) 另一道题目？ A. 甲 B. 乙 C. 丙 D. 丁【答案】a";
        let scan = extract(text, &cfg());
        assert_eq!(scan.drafts[0].options[3], "丁");
        assert_eq!(scan.drafts[0].answer_index, Some(2));
        assert_eq!(scan.drafts[1].answer_index, Some(0));
    }

    #[test]
    fn reference_answer_marks() {
        let text = "(1) 下列说法正确的是？ A. 甲 B. 乙 C. 丙 D. 丁【参考答案】B (2) 另一道题目？ A. 甲 B. 乙 C. 丙 D. 丁 参考答案：C";
        let scan = extract(text, &cfg());
        let answers: Vec<Option<usize>> = scan.drafts.iter().map(|d| d.answer_index).collect();
        assert_eq!(answers, vec![Some(1), Some(2)]);
        assert_eq!(scan.drafts[0].options[3], "丁");
        assert_eq!(scan.drafts[1].options[3], "丁");
    }

    #[test]
    fn stem_containing_option_letter_truncates() {
        // Known source-format limitation: the first "A." wins.
        let text = "(1) 关于DNA. 的说法正确的是？ A. 甲 B. 乙 C. 丙 D. 丁";
        let block = find_next_block(text, 0).unwrap();
        assert_eq!(block.stem.trim(), "关于DN");
    }

    #[test]
    fn empty_text() {
        let scan = extract("", &cfg());
        assert!(scan.drafts.is_empty());
        assert_eq!(scan.matched, 0);
    }
}
