use scraper::{Html, Selector};
use std::collections::HashSet;

/// One container to look for on an article page, as an attribute matcher.
/// `class` values match any class token; other attributes match exactly.
#[derive(Debug, Clone)]
pub struct ContainerMatcher {
    pub attribute: &'static str,
    pub value: &'static str,
}

impl ContainerMatcher {
    pub const fn class(value: &'static str) -> Self {
        Self {
            attribute: "class",
            value,
        }
    }

    pub const fn id(value: &'static str) -> Self {
        Self {
            attribute: "id",
            value,
        }
    }

    fn selector(&self) -> Selector {
        let css = if self.attribute == "class" {
            format!("[class~=\"{}\"]", self.value)
        } else {
            format!("[{}=\"{}\"]", self.attribute, self.value)
        };
        Selector::parse(&css).expect("attribute selectors are always valid CSS")
    }
}

/// Rewrite scheme-relative URLs ("//host/...") to http.
pub fn fix_url_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}

/// Collect image URLs from an article page. For each container matcher in
/// listed order, the first matching container contributes every `img` src it
/// holds, scheme-normalized. Duplicates are removed preserving first
/// occurrence. An empty result is legitimate; the caller decides whether to
/// warn.
pub fn extract_image_urls(html: &str, containers: &[ContainerMatcher]) -> Vec<String> {
    let document = Html::parse_document(html);
    let img_selector = Selector::parse("img[src]").expect("static selector");

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for matcher in containers {
        let selector = matcher.selector();
        if let Some(container) = document.select(&selector).next() {
            for img in container.select(&img_selector) {
                if let Some(src) = img.value().attr("src") {
                    let url = fix_url_scheme(src.trim());
                    if !url.is_empty() && seen.insert(url.clone()) {
                        urls.push(url);
                    }
                }
            }
        }
    }

    urls
}

/// Outer HTML of the first element with the given tag name, if present.
/// Supports profiles whose body content lives on the article page rather than
/// in the feed.
pub fn extract_element_html(html: &str, tag: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(tag).ok()?;
    document.select(&selector).next().map(|el| el.html())
}

/// Strip markup from an HTML fragment, yielding plain text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<Vec<_>>().join("")
}
