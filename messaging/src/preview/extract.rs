//! HTML metadata extraction for link previews.

use scraper::{Html, Selector};
use url::Url;

/// Metadata extracted from a fetched page. All fields optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub favicon: Option<String>,
}

/// Extract preview metadata from an HTML document.
///
/// Fallback chains:
/// - title: `og:title` → `twitter:title` → `<title>`
/// - description: `og:description` → `twitter:description` → `description`
/// - image: `og:image` → `twitter:image`
/// - favicon: first `<link rel*=icon>`, absolute hrefs kept as-is, others
///   rooted at the page origin, else `<origin>/favicon.ico`
pub fn extract_metadata(html: &str, page_url: &str) -> PreviewMetadata {
    let document = Html::parse_document(html);

    PreviewMetadata {
        title: meta_property(&document, "og:title")
            .or_else(|| meta_name(&document, "twitter:title"))
            .or_else(|| title_text(&document)),
        description: meta_property(&document, "og:description")
            .or_else(|| meta_name(&document, "twitter:description"))
            .or_else(|| meta_name(&document, "description")),
        image: meta_property(&document, "og:image")
            .or_else(|| meta_name(&document, "twitter:image")),
        favicon: favicon_url(&document, page_url),
    }
}

fn meta_property(document: &Html, property: &str) -> Option<String> {
    meta_content(document, &format!(r#"meta[property="{property}"]"#))
}

fn meta_name(document: &Html, name: &str) -> Option<String> {
    meta_content(document, &format!(r#"meta[name="{name}"]"#))
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).expect("Invalid selector");
    document
        .select(&selector)
        .find_map(|meta| meta.value().attr("content"))
        .map(str::to_string)
        .filter(|content| !content.is_empty())
}

fn title_text(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("Invalid selector");
    let title = document.select(&selector).next()?;
    let text = title.text().collect::<String>().trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn favicon_url(document: &Html, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let selector = Selector::parse("link[rel][href]").expect("Invalid selector");

    let href = document
        .select(&selector)
        .find(|link| {
            link.value()
                .attr("rel")
                .is_some_and(|rel| rel.to_lowercase().contains("icon"))
        })
        .and_then(|link| link.value().attr("href"))
        .filter(|href| !href.is_empty());

    match href {
        Some(href) if href.starts_with("http") => Some(href.to_string()),
        // Non-absolute hrefs resolve against the origin, not the page path
        Some(href) if href.starts_with('/') => base.join(href).ok().map(|u| u.to_string()),
        Some(href) => base.join(&format!("/{href}")).ok().map(|u| u.to_string()),
        None => base.join("/favicon.ico").ok().map(|u| u.to_string()),
    }
}
