use std::sync::LazyLock;

use regex::Regex;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FOOTER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^(?:
            -?\s*\d{1,4}\s*-?
          | 第\s*\d+\s*页(?:\s*[,，/]?\s*共\s*\d+\s*页)?
          | 共\s*\d+\s*页\s*[,，]?\s*第\s*\d+\s*页
          | page\s*\d+(?:\s*of\s*\d+)?
          | \d+\s*/\s*\d+
        )$",
    )
    .unwrap()
});

/// Flatten text for the offset-based extractors: every whitespace run
/// (newlines included) becomes one space and boilerplate phrases are
/// removed. Repeats until nothing changes, so a second call is a no-op.
pub fn normalize(text: &str, boilerplate: &[String]) -> String {
    let mut current = collapse(text);
    loop {
        let next = collapse(&strip_phrases(&current, boilerplate));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Line-preserving variant for the essay extractor. Boilerplate stays in
/// place so the caller can still skip lines that carry it.
pub fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(collapse)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Second cleanup pass, applied once a stem, option or body has been cut
/// out of the surrounding text.
pub fn clean_field(text: &str, boilerplate: &[String]) -> String {
    strip_phrases(text, boilerplate).trim().to_string()
}

pub fn contains_boilerplate(line: &str, boilerplate: &[String]) -> bool {
    boilerplate
        .iter()
        .any(|p| !p.is_empty() && line.contains(p.as_str()))
}

/// `12`, `- 12 -`, `第3页 共20页`, `Page 3 of 20`, `3/20`.
pub fn is_page_footer(line: &str) -> bool {
    FOOTER_LINE_RE.is_match(line.trim())
}

fn collapse(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

fn strip_phrases(text: &str, boilerplate: &[String]) -> String {
    let mut out = text.to_string();
    for phrase in boilerplate.iter().filter(|p| !p.is_empty()) {
        if out.contains(phrase.as_str()) {
            out = out.replace(phrase.as_str(), "");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrases() -> Vec<String> {
        vec!["仅供学习交流使用".into(), "更多资料请关注公众号".into()]
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize("", &phrases()), "");
        assert_eq!(normalize_lines(""), "");
        assert_eq!(normalize("  \n\n\t ", &phrases()), "");
    }

    #[test]
    fn collapses_newlines_and_spaces() {
        let text = "第1章  绪论\n\n\n(1)　下列\t说法\r\n正确";
        assert_eq!(normalize(text, &[]), "第1章 绪论 (1) 下列 说法 正确");
    }

    #[test]
    fn removes_boilerplate() {
        let text = "下列说法仅供学习交流使用正确的是\n更多资料请关注公众号\nA. 甲";
        assert_eq!(normalize(text, &phrases()), "下列说法正确的是 A. 甲");
    }

    #[test]
    fn removal_that_exposes_a_new_phrase() {
        let text = "前 仅供学习仅供学习交流使用交流使用 后";
        assert_eq!(normalize(text, &phrases()), "前 后");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "",
            "a  b",
            "第1章 绪论\n(1) 题目？ A. 甲 B. 乙",
            "x 仅供学习交流使用 y",
            "仅供学习 交流使用",
            " 更多资料请关注公众号 仅供学习交流使用 ",
            "仅供学习仅供学习交流使用交流使用",
        ];
        for s in samples {
            let once = normalize(s, &phrases());
            assert_eq!(normalize(&once, &phrases()), once, "input {:?}", s);
            let lines = normalize_lines(s);
            assert_eq!(normalize_lines(&lines), lines);
        }
    }

    #[test]
    fn lines_keep_breaks() {
        let text = "1.1  计算机网络体系结构\r\n\r\n01.请描述OSI七层模型。 \n  这是第二行内容。";
        assert_eq!(
            normalize_lines(text),
            "1.1 计算机网络体系结构\n01.请描述OSI七层模型。\n这是第二行内容。"
        );
    }

    #[test]
    fn field_cleanup() {
        assert_eq!(clean_field("  甲仅供学习交流使用 ", &phrases()), "甲");
        assert_eq!(clean_field("乙", &[]), "乙");
    }

    #[test]
    fn footer_lines() {
        for line in ["12", "- 12 -", "第3页", "第 3 页 共 20 页", "共20页 第3页", "Page 3 of 20", "3/20"] {
            assert!(is_page_footer(line), "{}", line);
        }
        for line in ["01.请描述OSI七层模型。", "这是第二行内容。", "第3章 存储系统"] {
            assert!(!is_page_footer(line), "{}", line);
        }
    }

    #[test]
    fn boilerplate_detection() {
        assert!(contains_boilerplate("xx更多资料请关注公众号yy", &phrases()));
        assert!(!contains_boilerplate("正文", &phrases()));
        assert!(!contains_boilerplate("正文", &[String::new()]));
    }
}
