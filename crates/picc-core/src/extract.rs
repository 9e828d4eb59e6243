//! Title and main-content extraction from raw HTML.
//!
//! Main content is the first structural container, in priority order, whose
//! visible text is longer than `min_section_chars`. When none qualifies the
//! whole `<body>` is used. Script, style, and noscript text never counts.

use scraper::{ElementRef, Html, Selector};

/// Containers tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"div[class*="content"]"#,
    r#"div[class*="article"]"#,
    r#"div[class*="post"]"#,
];

/// Elements whose text is never part of the extracted content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
}

/// Parse `html` and extract its title and main content.
pub fn extract_page(html: &str, min_section_chars: usize) -> ExtractedPage {
    let document = Html::parse_document(html);
    ExtractedPage {
        title: extract_title(&document),
        content: extract_main_content(&document, min_section_chars),
    }
}

/// `<title>`, else the first `<h1>`, else [`UNTITLED`].
pub fn extract_title(document: &Html) -> String {
    for selector in ["title", "h1"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(el) = document.select(&sel).next() {
            let text = visible_text(el);
            if !text.is_empty() {
                return text;
            }
        }
    }
    UNTITLED.to_string()
}

pub fn extract_main_content(document: &Html, min_section_chars: usize) -> String {
    for selector in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(el) = document.select(&sel).next() {
            let text = visible_text(el);
            if text.chars().count() > min_section_chars {
                return text;
            }
        }
    }

    if let Ok(body) = Selector::parse("body") {
        if let Some(el) = document.select(&body).next() {
            return visible_text(el);
        }
    }

    visible_text(document.root_element())
}

/// Text under `el`, skipping hidden elements, with whitespace collapsed.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    collapse_whitespace(&raw)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(word: &str, n: usize) -> String {
        vec![word; n].join(" ")
    }

    #[test]
    fn test_title_prefers_title_tag() {
        let page = extract_page(
            "<html><head><title> Community News </title></head><body><h1>Heading</h1></body></html>",
            200,
        );
        assert_eq!(page.title, "Community News");
    }

    #[test]
    fn test_title_falls_back_to_h1_then_untitled() {
        let page = extract_page("<html><body><h1>Elders <b>Day</b></h1></body></html>", 200);
        assert_eq!(page.title, "Elders Day");

        let page = extract_page("<html><body><p>nothing</p></body></html>", 200);
        assert_eq!(page.title, UNTITLED);
    }

    #[test]
    fn test_prefers_article_over_body() {
        let article = long_text("story", 60);
        let html = format!(
            "<html><body><nav>Menu Home About</nav><article><p>{}</p></article>\
             <footer>Copyright</footer></body></html>",
            article
        );
        let page = extract_page(&html, 200);
        assert_eq!(page.content, article);
    }

    #[test]
    fn test_short_article_falls_through_to_body() {
        let html = "<html><body><article>tiny</article><p>other words</p></body></html>";
        let page = extract_page(html, 200);
        assert_eq!(page.content, "tiny other words");
    }

    #[test]
    fn test_class_container_priority() {
        let post = long_text("post", 60);
        let html = format!(
            "<html><body><div class=\"sidebar\">x</div>\
             <div class=\"blog-post\">{}</div></body></html>",
            post
        );
        assert_eq!(extract_page(&html, 200).content, post);
    }

    #[test]
    fn test_strips_scripts_styles_and_entities() {
        let html = "<html><head><style>body { color: red; }</style></head>\
                    <body><script>var x = 1;</script><p>Fish &amp; chips\n\n  today</p></body></html>";
        let page = extract_page(html, 200);
        assert_eq!(page.content, "Fish & chips today");
    }
}
