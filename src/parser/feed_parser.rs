// Selector-driven HTML feed parsing
use crate::config::SelectorConfig;
use crate::model::{Extraction, ParserError};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

pub trait Parser {
    fn parse(&self, html: &str) -> Result<Vec<Extraction>, ParserError>;
}

pub struct FeedParser {
    item: Selector,
    text: Selector,
    author: Option<Selector>,
    time: Option<Selector>,
    link: Option<Selector>,
    base_url: Option<Url>,
}

impl FeedParser {
    pub fn new(selectors: &SelectorConfig) -> Result<Self, ParserError> {
        Ok(Self {
            item: compile(&selectors.item)?,
            text: compile(&selectors.text)?,
            author: selectors.author.as_deref().map(compile).transpose()?,
            time: selectors.time.as_deref().map(compile).transpose()?,
            link: selectors.link.as_deref().map(compile).transpose()?,
            base_url: None,
        })
    }

    /// Relative links are resolved against `base`.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, ParserError> {
        let url = Url::parse(base).map_err(|e| ParserError::HtmlParseError(e.to_string()))?;
        self.base_url = Some(url);
        Ok(self)
    }

    fn resolve(&self, href: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}

fn compile(css: &str) -> Result<Selector, ParserError> {
    Selector::parse(css).map_err(|e| ParserError::HtmlParseError(format!("{css}: {e}")))
}

fn inner_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// The author node's own `href`, else the first link inside it.
fn profile_href(node: ElementRef<'_>) -> Option<&str> {
    if let Some(href) = node.value().attr("href") {
        return Some(href);
    }
    node.descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|child| child.value().attr("href"))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

impl Parser for FeedParser {
    /// Items whose text node is missing come back with empty text so the
    /// collector can count them as extraction noise.
    fn parse(&self, html: &str) -> Result<Vec<Extraction>, ParserError> {
        let document = Html::parse_document(html);
        let mut extractions = Vec::new();

        for element in document.select(&self.item) {
            let text = element
                .select(&self.text)
                .next()
                .map(inner_text)
                .unwrap_or_default();

            let author_node = self
                .author
                .as_ref()
                .and_then(|sel| element.select(sel).next());
            let author = author_node.map(inner_text).and_then(non_empty);
            let author_url = author_node
                .and_then(profile_href)
                .map(|href| self.resolve(href));

            let timestamp_iso = self
                .time
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .map(|node| {
                    node.value()
                        .attr("datetime")
                        .map(str::to_string)
                        .unwrap_or_else(|| inner_text(node))
                })
                .and_then(non_empty);

            let url = self
                .link
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .and_then(|node| node.value().attr("href"))
                .map(|href| self.resolve(href));

            extractions.push(Extraction {
                text,
                author,
                author_url,
                timestamp_iso,
                url,
            });
        }

        Ok(extractions)
    }
}
