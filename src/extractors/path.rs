//! Path expressions
//!
//! A narrow addressing language on top of CSS selectors:
//!
//! ```text
//! [>] css [^...] [@accessor] [[*]]
//! ```
//!
//! - `css` matches descendants of the context node (never the context itself);
//!   a leading `>` restricts matching to direct element children, and an empty
//!   selector addresses the context node
//! - every trailing `^` moves each match to its parent element
//! - `@text`, `@owntext`, `@html` or `@<attribute>` select what is read
//! - `[*]` keeps every value in document order instead of only the first
//!
//! Examples:
//! - `td:nth-of-type(3) > a[href^="/name/nm"] ^` - table cells holding a name link
//! - `> a@href` - href of the first child link
//! - `@owntext` - first non-blank text node directly under the context
//! - `div.alias@text[*]` - text of every alias wrapper

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use scraper::{ElementRef, Selector};

use crate::error::PathError;

/// What a path reads from each selected node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    /// No accessor given: the node itself, or its text when values are read
    Node,
    Text,
    OwnText,
    Html,
    Attr(String),
}

impl Accessor {
    fn parse(name: &str) -> Self {
        match name {
            "text" | "innerText" => Accessor::Text,
            "owntext" => Accessor::OwnText,
            "html" => Accessor::Html,
            attr => Accessor::Attr(attr.to_string()),
        }
    }

    fn read(&self, node: ElementRef<'_>, out: &mut Vec<String>) {
        match self {
            Accessor::Node | Accessor::Text => {
                let text = node.text().collect::<String>();
                out.push(text.trim().to_string());
            }
            Accessor::OwnText => {
                for child in node.children() {
                    if let Some(text) = child.value().as_text() {
                        let text = text.trim();
                        if !text.is_empty() {
                            out.push(text.to_string());
                        }
                    }
                }
            }
            Accessor::Html => out.push(node.html()),
            Accessor::Attr(name) => {
                if let Some(value) = node.value().attr(name) {
                    out.push(value.to_string());
                }
            }
        }
    }
}

/// A compiled path expression. Immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct PathExpression {
    source: String,
    selector: Option<Selector>,
    children_only: bool,
    parent_hops: usize,
    accessor: Accessor,
    all: bool,
}

impl PathExpression {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let source = path.trim();
        if source.is_empty() {
            return Err(PathError::Empty);
        }

        let (rest, all) = match source.strip_suffix("[*]") {
            Some(rest) => (rest.trim_end(), true),
            None => (source, false),
        };

        let (rest, accessor) = match split_accessor(rest) {
            Some((selector, name)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(PathError::EmptyAccessor(source.to_string()));
                }
                (selector, Accessor::parse(name))
            }
            None => (rest, Accessor::Node),
        };

        let mut rest = rest.trim();
        let mut parent_hops = 0;
        while let Some(stripped) = rest.strip_suffix('^') {
            parent_hops += 1;
            rest = stripped.trim_end();
        }

        let (css, children_only) = match rest.strip_prefix('>') {
            Some(css) => (css.trim(), true),
            None => (rest, false),
        };

        let selector = match (css.is_empty(), children_only) {
            (true, false) => None,
            (true, true) => Some(compile(source, "*")?),
            (false, _) => Some(compile(source, css)?),
        };

        Ok(Self {
            source: source.to_string(),
            selector,
            children_only,
            parent_hops,
            accessor,
            all,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    /// Whether the expression was written with `[*]`
    pub fn is_multi(&self) -> bool {
        self.all
    }

    /// Nodes addressed by this path, in document order and without duplicates.
    pub fn select<'a>(&self, context: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let matched: Vec<ElementRef<'a>> = match &self.selector {
            None => vec![context],
            Some(selector) if self.children_only => context
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| selector.matches(child))
                .collect(),
            Some(selector) => context
                .select(selector)
                .filter(|el| el.id() != context.id())
                .collect(),
        };

        if self.parent_hops == 0 {
            return matched;
        }

        let mut seen = HashSet::new();
        matched
            .into_iter()
            .filter_map(|el| self.climb(el))
            .filter(|el| seen.insert(el.id()))
            .collect()
    }

    /// Values read through the accessor, honouring `[*]`.
    pub fn values(&self, context: ElementRef<'_>) -> Vec<String> {
        self.collect(context, self.all)
    }

    /// Every value regardless of `[*]`.
    pub fn all_values(&self, context: ElementRef<'_>) -> Vec<String> {
        self.collect(context, true)
    }

    pub fn first_value(&self, context: ElementRef<'_>) -> Option<String> {
        self.collect(context, false).into_iter().next()
    }

    fn collect(&self, context: ElementRef<'_>, all: bool) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.select(context) {
            self.accessor.read(node, &mut out);
            if !all && !out.is_empty() {
                out.truncate(1);
                break;
            }
        }
        out
    }

    fn climb<'a>(&self, mut el: ElementRef<'a>) -> Option<ElementRef<'a>> {
        for _ in 0..self.parent_hops {
            el = el.parent().and_then(ElementRef::wrap)?;
        }
        Some(el)
    }
}

impl FromStr for PathExpression {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn compile(path: &str, css: &str) -> Result<Selector, PathError> {
    Selector::parse(css).map_err(|e| PathError::InvalidSelector {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Split at the last `@` that is outside brackets, parentheses and quotes,
/// so attribute selectors such as `a[href*="@"]` stay intact.
fn split_accessor(path: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut split = None;

    for (i, c) in path.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, '@') if depth == 0 => split = Some(i),
            _ => {}
        }
    }

    split.map(|i| (&path[..i], &path[i + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const ROWS: &str = r#"
        <table>
            <tr><td>1.</td><td><a href="/img/1">img</a></td>
                <td><a href="/name/nm0000154/">Mel Gibson</a> (I)<br><small>aka <em>"<div class="alias">Mad Max</div></em></small></td></tr>
            <tr><td>2.</td><td></td>
                <td>
                    <a href="/name/nm0000155/">Mel Brooks</a> <a href="/name/nm0000155/board">board</a>
                    <div class="alias">Melvin</div><div class="alias">Max</div>
                </td></tr>
        </table>
    "#;

    fn path(s: &str) -> PathExpression {
        PathExpression::parse(s).unwrap()
    }

    #[test]
    fn test_parse_components() {
        let p = path(r#"td:nth-of-type(3) > a[href^="/name/nm"] ^"#);
        assert_eq!(p.parent_hops, 1);
        assert!(!p.children_only);
        assert_eq!(p.accessor, Accessor::Node);

        let p = path("> a@href");
        assert!(p.children_only);
        assert_eq!(p.accessor, Accessor::Attr("href".to_string()));

        let p = path("div.alias@text[*]");
        assert!(p.is_multi());
        assert_eq!(p.accessor, Accessor::Text);

        let p = path("@owntext");
        assert!(p.selector.is_none());
        assert_eq!(p.accessor, Accessor::OwnText);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PathExpression::parse("   ").unwrap_err(), PathError::Empty);
        assert!(matches!(
            PathExpression::parse("a@"),
            Err(PathError::EmptyAccessor(_))
        ));
        assert!(matches!(
            PathExpression::parse("td[[@href"),
            Err(PathError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_at_inside_attribute_selector() {
        let p = path(r#"a[href*="@"]@href"#);
        assert_eq!(p.accessor, Accessor::Attr("href".to_string()));

        let doc = Html::parse_document(r#"<a href="mailto:x@y">mail</a><a href="/x">x</a>"#);
        assert_eq!(p.values(doc.root_element()), vec!["mailto:x@y"]);
    }

    #[test]
    fn test_parent_hops_dedupe_in_document_order() {
        let doc = Html::parse_document(ROWS);
        let roots = path(r#"td:nth-of-type(3) > a[href^="/name/nm"] ^"#).select(doc.root_element());

        // second cell holds two matching links but is returned once
        assert_eq!(roots.len(), 2);
        assert!(roots[0].text().collect::<String>().contains("Mel Gibson"));
        assert!(roots[1].text().collect::<String>().contains("Mel Brooks"));
    }

    #[test]
    fn test_relative_values() {
        let doc = Html::parse_document(ROWS);
        let roots = path(r#"td:nth-of-type(3) > a[href^="/name/nm"] ^"#).select(doc.root_element());

        assert_eq!(path("> a@href").first_value(roots[0]).as_deref(), Some("/name/nm0000154/"));
        assert_eq!(path("> a@text").first_value(roots[0]).as_deref(), Some("Mel Gibson"));
        assert_eq!(path("@owntext").first_value(roots[0]).as_deref(), Some("(I)"));
        assert_eq!(path("div.alias@text[*]").values(roots[0]), vec!["Mad Max"]);
        assert_eq!(path("div.alias@text[*]").values(roots[1]), vec!["Melvin", "Max"]);
        assert_eq!(path("div.alias@text").values(roots[1]), vec!["Melvin"]);
        assert_eq!(path("> a@href").all_values(roots[1]).len(), 2);
    }

    #[test]
    fn test_structural_miss_is_empty() {
        let doc = Html::parse_document(ROWS);
        let p = path("span.missing@title");
        assert!(p.values(doc.root_element()).is_empty());
        assert_eq!(p.first_value(doc.root_element()), None);
        assert!(path("a@data-missing[*]").values(doc.root_element()).is_empty());
    }

    #[test]
    fn test_context_never_matches_itself() {
        let doc = Html::parse_document(r#"<div class="x"><div class="x">inner</div></div>"#);
        let outer = path("div.x").select(doc.root_element())[0];
        let inner = path("div.x").select(outer);
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].text().collect::<String>(), "inner");
    }
}
