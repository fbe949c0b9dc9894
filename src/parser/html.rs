use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::answer_key::locate_table;
use super::chapters::next_heading_start;
use super::choice::{option_spans, option_texts, split_answer_mark, ChoiceDraft};
use super::normalize::clean_field;
use crate::config::ExtractionConfig;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
pub(super) static QUESTION_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*(\d{1,4})\s*[.．、]").unwrap());
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").unwrap());
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li\s*>").unwrap());
static NUMBER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,4}\s*[.．、]\s*").unwrap());
static OPTION_A_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"A[.．、]").unwrap());
static LEADING_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-D]\s*[.．、]\s*").unwrap());

#[derive(Debug, Default)]
pub struct HtmlScan {
    pub drafts: Vec<ChoiceDraft>,
    pub matched: usize,
    pub rejected: usize,
}

/// Split the question part of a scraped page (everything before the answer
/// table) into numbered blocks and pull stem and options out of each.
/// Draft offsets are byte offsets into `html`.
pub fn extract(html: &str, cfg: &ExtractionConfig) -> HtmlScan {
    let region_end = locate_table(html).map_or(html.len(), |r| r.start);
    let questions = &html[..region_end];
    let starts = question_starts(questions);

    let mut scan = HtmlScan::default();
    for (i, &(start, number)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(questions.len(), |s| s.0);
        scan.matched += 1;

        if number == 0 || number > cfg.limits.answer_cap {
            debug!(number, "question number outside answer range");
            scan.rejected += 1;
            continue;
        }

        match build_draft(&questions[start..end], start, number, cfg) {
            Some(draft) => scan.drafts.push(draft),
            None => scan.rejected += 1,
        }
    }
    scan
}

/// `(offset of the opening tag, question number)` for every `>N.` start.
fn question_starts(html: &str) -> Vec<(usize, u32)> {
    QUESTION_START_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let decimal = html[whole.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());
            if decimal {
                return None;
            }
            let number = caps[1].parse::<u32>().ok()?;
            let tag_start = html[..whole.start()].rfind('<').unwrap_or(whole.start());
            Some((tag_start, number))
        })
        .collect()
}

fn build_draft(block: &str, offset: usize, number: u32, cfg: &ExtractionConfig) -> Option<ChoiceDraft> {
    let text = html_to_text(block);
    let mut body = NUMBER_PREFIX_RE.replace(&text, "").to_string();
    // A chapter heading between two questions belongs to neither.
    if let Some(at) = next_heading_start(&body, 0) {
        body.truncate(at);
    }

    let stem_source = paragraph_stem(block).unwrap_or_else(|| body.clone());
    let stem = clean_field(before_first_option(&stem_source), &cfg.boilerplate);
    if stem.chars().count() < cfg.limits.min_stem_chars {
        debug!(number, "scraped stem too short");
        return None;
    }

    let [a, b, c, d] = match option_spans(&body, 0, body.len()) {
        Some(spans) => option_texts(&body, &spans, body.len()),
        None => list_item_options(block),
    };
    let (d, answer_index) = split_answer_mark(&d);
    let options = [a, b, c, d].map(|o| clean_field(&o, &cfg.boilerplate));

    Some(ChoiceDraft {
        offset,
        number,
        stem,
        options,
        answer_index,
    })
}

/// First `<p>` in the block that carries stem text rather than an option.
fn paragraph_stem(block: &str) -> Option<String> {
    PARAGRAPH_RE.captures_iter(block).find_map(|caps| {
        let text = html_to_text(&caps[1]);
        let text = NUMBER_PREFIX_RE.replace(&text, "").to_string();
        if text.is_empty() || LEADING_LETTER_RE.is_match(&text) {
            None
        } else {
            Some(text)
        }
    })
}

fn before_first_option(text: &str) -> &str {
    match OPTION_A_RE.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

/// `<li>` fallback, truncated or padded to four entries.
fn list_item_options(block: &str) -> [String; 4] {
    let mut items = LIST_ITEM_RE
        .captures_iter(block)
        .map(|caps| {
            let text = html_to_text(&caps[1]);
            LEADING_LETTER_RE.replace(&text, "").to_string()
        })
        .take(4);
    std::array::from_fn(|_| items.next().unwrap_or_default())
}

/// Tags become spaces, entities are decoded, whitespace collapses.
pub fn html_to_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Replace every tag (and `&nbsp;`) with the same number of spaces so byte
/// offsets in the result line up with the original page.
pub fn mask_tags(html: &str) -> String {
    let masked = TAG_RE.replace_all(html, |caps: &regex::Captures| " ".repeat(caps[0].len()));
    masked.replace("&nbsp;", "      ")
}

pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn paragraph_stem_and_marked_options() {
        let html = "<div><p>1. 下列关于栈的叙述中，正确的是</p><p>A. 栈是先进先出</p><p>B. 栈是后进先出</p><p>C. 栈不能为空</p><p>D. 栈只能顺序存储</p></div>";
        let scan = extract(html, &cfg());
        assert_eq!(scan.drafts.len(), 1);
        let q = &scan.drafts[0];
        assert_eq!(q.number, 1);
        assert_eq!(q.offset, html.find("<p>").unwrap());
        assert_eq!(q.stem, "下列关于栈的叙述中，正确的是");
        assert_eq!(q.options[1], "栈是后进先出");
        assert_eq!(q.options[3], "栈只能顺序存储");
    }

    #[test]
    fn stem_falls_back_to_text_before_options() {
        let html = "<div>2. 若某队列的入队序列为 1,2,3 则出队序列为<br>A. 1,2,3<br>B. 3,2,1<br>C. 2,1,3<br>D. 1,3,2</div>";
        let scan = extract(html, &cfg());
        let q = &scan.drafts[0];
        assert_eq!(q.stem, "若某队列的入队序列为 1,2,3 则出队序列为");
        assert_eq!(q.options[0], "1,2,3");
        assert_eq!(q.options[3], "1,3,2");
    }

    #[test]
    fn options_fall_back_to_list_items() {
        let html = "<div><p>3. 以下哪种结构是非线性结构</p><ul><li>数组</li><li>链表</li><li>二叉树</li><li>队列</li><li>多余项</li></ul></div>";
        let scan = extract(html, &cfg());
        let q = &scan.drafts[0];
        assert_eq!(q.options, ["数组", "链表", "二叉树", "队列"].map(String::from));
    }

    #[test]
    fn short_list_padded_to_four() {
        let html = "<div><p>4. 只有两个候选答案的题目</p><ul><li>是</li><li>否</li></ul></div>";
        let scan = extract(html, &cfg());
        assert_eq!(scan.drafts[0].options, ["是", "否", "", ""].map(String::from));
    }

    #[test]
    fn answer_table_region_excluded() {
        let html = "<p>1. 第一题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁</p><h3>参考答案</h3><table><tr><td>1.</td><td>A</td></tr></table>";
        let scan = extract(html, &cfg());
        assert_eq!(scan.matched, 1);
        assert_eq!(scan.drafts[0].options[3], "丁");
    }

    #[test]
    fn title_anchor_keeps_questions() {
        let html = "<html><head><title>2019年408真题及参考答案</title></head><body>\
            <p>1. 第一题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁</p>\
            <p>2. 第二题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁</p></body></html>";
        let scan = extract(html, &cfg());
        assert_eq!(scan.matched, 2);
        assert_eq!(scan.drafts.len(), 2);
    }

    #[test]
    fn inline_reference_answers_do_not_cut_questions() {
        let html = "<p>1. 第一题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁【参考答案】B</p>\
            <p>2. 第二题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁 参考答案：C</p>";
        let scan = extract(html, &cfg());
        assert_eq!(scan.drafts.len(), 2);
        let answers: Vec<Option<usize>> = scan.drafts.iter().map(|d| d.answer_index).collect();
        assert_eq!(answers, vec![Some(1), Some(2)]);
        assert_eq!(scan.drafts[1].options[3], "丁");
    }

    #[test]
    fn number_outside_answer_range_rejected() {
        let html = "<p>1200. 这个编号来自页码而不是题号</p><p>A. 甲 B. 乙 C. 丙 D. 丁</p>";
        let scan = extract(html, &cfg());
        assert!(scan.drafts.is_empty());
        assert_eq!(scan.rejected, 1);
    }

    #[test]
    fn chapter_heading_ends_block() {
        let html = "<p>1. 第一题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁</p><h2>第2章 线性表</h2><p>2. 第二题的题干内容</p><p>A. 甲 B. 乙 C. 丙 D. 丁</p>";
        let scan = extract(html, &cfg());
        assert_eq!(scan.drafts.len(), 2);
        assert_eq!(scan.drafts[0].options[3], "丁");
    }

    #[test]
    fn masking_preserves_offsets() {
        let html = "<h2 class=\"c\">第1章&nbsp;绪论</h2><p>正文</p>";
        let masked = mask_tags(html);
        assert_eq!(masked.len(), html.len());
        assert_eq!(masked.find("第1章"), html.find("第1章"));
        assert_eq!(masked.find("正文"), html.find("正文"));
        assert!(masked.contains("第1章      绪论"));
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a &amp;lt; b &lt; c&nbsp;d"), "a &lt; b < c d");
        assert_eq!(html_to_text("<b>x</b>&nbsp;&nbsp;<i>y</i>"), "x y");
    }

    #[test]
    fn fixture_page() {
        let html = std::fs::read_to_string("tests/fixtures/exam_2019.html").unwrap();
        let scan = extract(&html, &cfg());
        assert_eq!(scan.drafts.len(), 4);
        assert!(scan.drafts.iter().all(|d| d.options.iter().all(|o| !o.is_empty())));
        let numbers: Vec<u32> = scan.drafts.iter().map(|d| d.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }
}
