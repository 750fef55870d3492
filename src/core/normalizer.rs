//! Content normalizer: turns email bodies (plain or HTML) into clean text.

use crate::domain::model::RawContent;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SCRIPT_STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});

static BLOCK_BREAK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br|hr)\s*/?\s*>|</\s*(p|div|li|tr|h[1-6]|table|ul|ol)\s*>")
        .expect("valid regex")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:(\d{1,7})|[xX]([0-9a-fA-F]{1,6}));").expect("valid regex"));

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&[a-zA-Z][a-zA-Z0-9]{1,31};").expect("valid regex"));

static HORIZONTAL_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{00A0}\r\x0B\x0C]+").expect("valid regex"));

/// 依內容型別清理：HTML 才去標籤與解碼 entity
pub fn normalize_content(content: &RawContent) -> String {
    if content.is_html() {
        normalize(&content.text)
    } else {
        normalize_plain(&content.text)
    }
}

/// 清理 HTML 內容；純函式，永不失敗
pub fn normalize(raw: &str) -> String {
    let without_blocks = SCRIPT_STYLE_BLOCK.replace_all(raw, " ");
    let with_breaks = BLOCK_BREAK_TAG.replace_all(&without_blocks, "\n");
    let without_tags = ANY_TAG.replace_all(&with_breaks, " ");
    normalize_plain(&decode_entities(&without_tags))
}

/// 純文字只整理空白與表格分隔線，"a < b > c" 原樣保留
pub fn normalize_plain(raw: &str) -> String {
    raw.replace('|', " ")
        .lines()
        .map(|line| HORIZONTAL_SPACE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 給 oracle 的單行版本
pub fn to_single_line(normalized: &str) -> String {
    normalized.lines().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'");

    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(dec), _) => dec.as_str().parse::<u32>().ok(),
            (None, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .filter(|c| !c.is_control() || c.is_whitespace())
            .map(|c| c.to_string())
            .unwrap_or_default()
    });

    // &amp; 最後處理，避免 "&amp;lt;" 被解成 "<"
    let stripped = NAMED_ENTITY.replace_all(&numeric, |caps: &Captures| {
        if &caps[0] == "&amp;" {
            "&".to_string()
        } else {
            String::new()
        }
    });

    stripped.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_keeps_block_lines() {
        let html = "<html><body><h1>Spring Concert</h1><p>Thursday,&nbsp;April 3, 2025</p>\
                    <p>Doors open at <b>6:30 PM</b></p></body></html>";
        assert_eq!(
            normalize(html),
            "Spring Concert\nThursday, April 3, 2025\nDoors open at 6:30 PM"
        );
    }

    #[test]
    fn test_removes_script_and_style_blocks() {
        let html = "<style>p { color: red; }</style><p>Field trip</p><script>alert('x')</script>";
        assert_eq!(normalize(html), "Field trip");
    }

    #[test]
    fn test_decodes_and_removes_entities() {
        assert_eq!(normalize("Tom &amp; Jerry &lt;3"), "Tom & Jerry <3");
        assert_eq!(normalize("caf&#233; &#x41;"), "café A");
        assert_eq!(normalize("&copy; School District"), "School District");
        assert_eq!(normalize("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_collapses_whitespace_and_pipes() {
        let text = "  Soccer   practice |  Field 3 \r\n\r\n\n\t Bring   water  ";
        assert_eq!(normalize(text), "Soccer practice Field 3\nBring water");
        assert_eq!(
            to_single_line(&normalize(text)),
            "Soccer practice Field 3 Bring water"
        );
    }

    #[test]
    fn test_plain_text_keeps_angle_brackets_and_entities() {
        let plain = RawContent::text("Score: a < b > c &amp; more\n\n  Bring  <snacks>  ");
        assert_eq!(
            normalize_content(&plain),
            "Score: a < b > c &amp; more\nBring <snacks>"
        );

        let html = RawContent::html("Score: a &lt; b<br>Bring <b>snacks</b>");
        assert_eq!(normalize_content(&html), "Score: a < b\nBring snacks");
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<br/><br/>"), "");
    }
}
