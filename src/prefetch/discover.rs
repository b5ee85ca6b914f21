//! Sub-resource discovery using html5ever
//!
//! Parses a document permissively (malformed markup is recovered the way a
//! browser would) and collects `src`/`href` values from resource-bearing tags.

use crate::utils::FetchError;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::HashSet;
use url::Url;

const RESOURCE_TAGS: [&str; 3] = ["img", "script", "link"];
const RESOURCE_ATTRS: [&str; 2] = ["src", "href"];

/// Extracts referenced sub-resources from HTML
#[derive(Clone, Default)]
pub struct ResourceDiscoverer {
    opts: ParseOpts,
}

impl ResourceDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every distinct `src`/`href` on `img`, `script` and `link` elements
    ///
    /// Values are returned exactly as written; relative references are not
    /// resolved. Empty values are skipped.
    pub fn discover(&self, html: &[u8]) -> Result<HashSet<String>, FetchError> {
        let dom = parse_document(RcDom::default(), self.opts.clone())
            .from_utf8()
            .read_from(&mut &html[..])
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut found = HashSet::new();
        let mut stack: Vec<Handle> = vec![dom.document.clone()];
        while let Some(node) = stack.pop() {
            if let NodeData::Element { name, attrs, .. } = &node.data {
                if RESOURCE_TAGS.contains(&&*name.local) {
                    for attr in attrs.borrow().iter() {
                        let value = attr.value.to_string();
                        if RESOURCE_ATTRS.contains(&&*attr.name.local) && !value.is_empty() {
                            found.insert(value);
                        }
                    }
                }
            }
            stack.extend(node.children.borrow().iter().cloned());
        }
        Ok(found)
    }

    /// Resolve discovered references against the page URL
    ///
    /// Keeps only http(s) results; references that differ only in how they
    /// were written collapse to one URL.
    pub fn resolve<'a>(base: &Url, references: impl IntoIterator<Item = &'a String>) -> Vec<Url> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for reference in references {
            match base.join(reference.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    if seen.insert(url.to_string()) {
                        resolved.push(url);
                    }
                }
                Ok(url) => log::debug!("skipping non-http resource {}", url),
                Err(e) => log::debug!("skipping unresolvable resource {:?}: {}", reference, e),
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_discover_basic_page() {
        let found = ResourceDiscoverer::new()
            .discover(br#"<html><img src="a.png"><script src="b.js"></script></html>"#)
            .unwrap();
        assert_eq!(found, set(&["a.png", "b.js"]));
    }

    #[test]
    fn test_discover_link_href_and_dedup() {
        let html = br#"
            <html>
                <head>
                    <link rel="stylesheet" href="/site.css">
                    <link rel="icon" href="/site.css">
                </head>
                <body>
                    <img src="logo.png"><img src="logo.png">
                    <a href="/not-a-resource">link</a>
                    <iframe src="/frame.html"></iframe>
                </body>
            </html>
        "#;
        let found = ResourceDiscoverer::new().discover(html).unwrap();
        assert_eq!(found, set(&["/site.css", "logo.png"]));
    }

    #[test]
    fn test_discover_both_attributes_on_one_element() {
        let found = ResourceDiscoverer::new()
            .discover(br#"<script src="a.js" href="b.js"></script><img src="">"#)
            .unwrap();
        assert_eq!(found, set(&["a.js", "b.js"]));
    }

    #[test]
    fn test_discover_malformed_html() {
        let found = ResourceDiscoverer::new()
            .discover(b"<p>Unclosed<div>Another<img src=x.png><b><i>mis</b>nested</i><script src='y.js'>")
            .unwrap();
        assert_eq!(found, set(&["x.png", "y.js"]));
    }

    #[test]
    fn test_discover_empty_and_binary_input() {
        let discoverer = ResourceDiscoverer::new();
        assert!(discoverer.discover(b"").unwrap().is_empty());
        assert!(discoverer.discover(&[0xff, 0xfe, 0x00, 0x80]).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_against_base() {
        let base = Url::parse("http://x/dir/p").unwrap();
        let refs = set(&["a.png", "/b.js", "http://cdn/c.css", "data:image/png;base64,AA", "./a.png"]);
        let mut resolved: Vec<String> = ResourceDiscoverer::resolve(&base, &refs)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        resolved.sort();
        assert_eq!(resolved, vec!["http://cdn/c.css", "http://x/b.js", "http://x/dir/a.png"]);
    }

    proptest! {
        #[test]
        fn test_discover_returns_exact_set(
            values in proptest::collection::hash_set("[a-z]{1,8}\\.(png|js|css)", 0..20)
        ) {
            let mut html = String::from("<html><head></head><body>");
            for (i, value) in values.iter().enumerate() {
                match i % 3 {
                    0 => html.push_str(&format!(r#"<img src="{value}">"#)),
                    1 => html.push_str(&format!(r#"<script src="{value}"></script>"#)),
                    _ => html.push_str(&format!(r#"<link rel="preload" href="{value}">"#)),
                }
            }
            html.push_str("</body></html>");

            let found = ResourceDiscoverer::new().discover(html.as_bytes()).unwrap();
            prop_assert_eq!(found, values);
        }
    }
}
