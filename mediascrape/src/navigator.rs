//! Tree-walk helpers over parsed HTML.
//!
//! Third-party pages have no stable schema, so extractors describe where a
//! value lives as a [`LocatorPath`]: a list of named [`LocatorStep`]s applied
//! one after another. When a page layout changes, the error names the step
//! that stopped matching instead of silently landing on the wrong element.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::fmt;

use crate::errors::ElementNotFound;

/// Parses a full HTML document.
#[must_use]
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Compiles a pattern that is known to be valid at build time.
#[allow(clippy::expect_used)]
pub(crate) fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex pattern must compile")
}

/// A single way of moving from one element to another.
#[derive(Debug, Clone)]
pub enum LocatorStep {
    /// First descendant with the tag.
    First(&'static str),
    /// First descendant with the tag and an exact attribute value.
    FirstWithAttr {
        /// Tag name.
        tag: &'static str,
        /// Attribute name.
        attr: &'static str,
        /// Required attribute value.
        value: &'static str,
    },
    /// The `index`-th direct child element with the tag.
    ChildAt {
        /// Tag name.
        tag: &'static str,
        /// Zero-based position among matching children.
        index: usize,
    },
    /// The `index`-th descendant with the tag, in document order.
    DescendantAt {
        /// Tag name.
        tag: &'static str,
        /// Zero-based position among matching descendants.
        index: usize,
    },
    /// The next sibling element.
    NextSibling,
    /// First descendant with the tag whose sole string matches the pattern.
    FirstMatching {
        /// Tag name.
        tag: &'static str,
        /// Pattern searched in the sole string.
        pattern: Regex,
    },
    /// First descendant with the tag that contains a label element (one of
    /// `label_tags`) whose sole string matches the pattern.
    Containing {
        /// Tag name of the element to return.
        tag: &'static str,
        /// Tags that may carry the label.
        label_tags: &'static [&'static str],
        /// Pattern searched in the label's sole string.
        pattern: Regex,
    },
}

impl LocatorStep {
    /// Applies the step to a scope element.
    #[must_use]
    pub fn apply<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        match self {
            Self::First(tag) => find_first(scope, tag),
            Self::FirstWithAttr { tag, attr, value } => descendants(scope)
                .find(|el| el.value().name() == *tag && el.value().attr(attr) == Some(*value)),
            Self::ChildAt { tag, index } => children(scope)
                .filter(|el| el.value().name() == *tag)
                .nth(*index),
            Self::DescendantAt { tag, index } => descendants(scope)
                .filter(|el| el.value().name() == *tag)
                .nth(*index),
            Self::NextSibling => scope.next_siblings().find_map(ElementRef::wrap),
            Self::FirstMatching { tag, pattern } => descendants(scope).find(|el| {
                el.value().name() == *tag && sole_string(*el).is_some_and(|s| pattern.is_match(&s))
            }),
            Self::Containing {
                tag,
                label_tags,
                pattern,
            } => descendants(scope).find(|el| {
                el.value().name() == *tag
                    && descendants(*el).any(|label| {
                        label_tags.iter().any(|t| *t == label.value().name())
                            && sole_string(label).is_some_and(|s| pattern.is_match(&s))
                    })
            }),
        }
    }

    /// Applies the step, failing with a named [`ElementNotFound`].
    pub fn locate<'a>(
        &self,
        scope: ElementRef<'a>,
        name: &str,
    ) -> Result<ElementRef<'a>, ElementNotFound> {
        self.apply(scope)
            .ok_or_else(|| ElementNotFound::new(name, self.to_string()))
    }
}

impl fmt::Display for LocatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First(tag) => write!(f, "first <{tag}>"),
            Self::FirstWithAttr { tag, attr, value } => write!(f, "first <{tag} {attr}=\"{value}\">"),
            Self::ChildAt { tag, index } => write!(f, "<{tag}> child #{index}"),
            Self::DescendantAt { tag, index } => write!(f, "<{tag}> descendant #{index}"),
            Self::NextSibling => write!(f, "next sibling element"),
            Self::FirstMatching { tag, pattern } => write!(f, "first <{tag}> matching /{pattern}/"),
            Self::Containing {
                tag,
                label_tags,
                pattern,
            } => write!(
                f,
                "first <{tag}> containing <{}> matching /{pattern}/",
                label_tags.join("|")
            ),
        }
    }
}

/// An ordered chain of named locator steps.
#[derive(Debug, Clone, Default)]
pub struct LocatorPath {
    steps: Vec<(&'static str, LocatorStep)>,
}

impl LocatorPath {
    /// Creates an empty path, which resolves to its scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named step.
    #[must_use]
    pub fn then(mut self, name: &'static str, step: LocatorStep) -> Self {
        self.steps.push((name, step));
        self
    }

    /// Appends every step of another path.
    #[must_use]
    pub fn extend(mut self, other: &Self) -> Self {
        self.steps.extend(other.steps.iter().cloned());
        self
    }

    /// Step names, in order.
    pub fn step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|(name, _)| *name)
    }

    /// Walks every step from `scope`, failing at the first step that matches nothing.
    pub fn resolve<'a>(&self, scope: ElementRef<'a>) -> Result<ElementRef<'a>, ElementNotFound> {
        self.steps
            .iter()
            .try_fold(scope, |current, (name, step)| step.locate(current, name))
    }
}

fn children<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    scope.children().filter_map(ElementRef::wrap)
}

fn descendants<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    scope.descendants().skip(1).filter_map(ElementRef::wrap)
}

/// First descendant with the tag.
#[must_use]
pub fn find_first<'a>(scope: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    descendants(scope).find(|el| el.value().name() == tag)
}

/// All elements with the tag: direct children only, or every descendant.
#[must_use]
pub fn find_all<'a>(scope: ElementRef<'a>, tag: &str, recursive: bool) -> Vec<ElementRef<'a>> {
    if recursive {
        descendants(scope)
            .filter(|el| el.value().name() == tag)
            .collect()
    } else {
        children(scope)
            .filter(|el| el.value().name() == tag)
            .collect()
    }
}

/// First element with the tag after `el` in document order, starting with
/// `el`'s own descendants.
#[must_use]
pub fn next_in_document<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    let within = el.descendants().skip(1);
    let after = std::iter::once(*el)
        .chain(el.ancestors())
        .flat_map(|node| node.next_siblings())
        .flat_map(|sibling| sibling.descendants());

    within
        .chain(after)
        .filter_map(ElementRef::wrap)
        .find(|candidate| candidate.value().name() == tag)
}

/// The element's single string payload.
///
/// Descends while the element has exactly one child; returns `None` when
/// it has no children or several.
#[must_use]
pub fn sole_string(el: ElementRef<'_>) -> Option<String> {
    let mut node = *el;
    loop {
        let mut kids = node.children();
        let only = kids.next()?;
        if kids.next().is_some() {
            return None;
        }
        if let Some(text) = only.value().as_text() {
            let payload: &str = text;
            return Some(payload.to_string());
        }
        node = only;
    }
}

/// Concatenated text of the element, trimmed.
#[must_use]
pub fn text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Attribute value, if present.
#[must_use]
pub fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value().attr(name).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
        <main>
          <div class="outer">
            <section id="s1">
              <div class="a">A</div>
              <div class="b"><span>B</span></div>
              <p>para</p>
              <div class="c"><div class="c-inner">C</div></div>
            </section>
            <section id="s2"><ul><li><span>Director</span><ul><li><a>Ann</a></li></ul></li></ul></section>
          </div>
          <span class="label">Run time : </span><span>2h</span>
        </main>
    </body></html>"#;

    fn names(els: &[ElementRef<'_>]) -> Vec<String> {
        els.iter()
            .map(|el| el.value().attr("class").unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_child_at_counts_only_direct_children_with_tag() {
        let doc = parse(PAGE);
        let section = LocatorStep::First("section").apply(doc.root_element()).unwrap();

        let second = LocatorStep::ChildAt { tag: "div", index: 1 }.apply(section).unwrap();
        assert_eq!(attr(second, "class").as_deref(), Some("b"));

        let third = LocatorStep::ChildAt { tag: "div", index: 2 }.apply(section).unwrap();
        assert_eq!(attr(third, "class").as_deref(), Some("c"));

        assert!(LocatorStep::ChildAt { tag: "div", index: 3 }.apply(section).is_none());
    }

    #[test]
    fn test_descendant_at_and_attr_steps() {
        let doc = parse(PAGE);
        let root = doc.root_element();

        let inner = LocatorStep::DescendantAt { tag: "div", index: 4 }.apply(root).unwrap();
        assert_eq!(attr(inner, "class").as_deref(), Some("c-inner"));

        let s2 = LocatorStep::FirstWithAttr {
            tag: "section",
            attr: "id",
            value: "s2",
        }
        .apply(root)
        .unwrap();
        assert_eq!(find_all(s2, "a", true).len(), 1);
    }

    #[test]
    fn test_next_sibling_skips_text_nodes() {
        let doc = parse(PAGE);
        let first = LocatorStep::First("section").apply(doc.root_element()).unwrap();
        let next = LocatorStep::NextSibling.apply(first).unwrap();
        assert_eq!(attr(next, "id").as_deref(), Some("s2"));
    }

    #[test]
    fn test_containing_finds_row_by_label() {
        let doc = parse(PAGE);
        let step = LocatorStep::Containing {
            tag: "li",
            label_tags: &["a", "span"],
            pattern: static_regex("Directors?"),
        };
        let row = step.apply(doc.root_element()).unwrap();
        let ul = find_first(row, "ul").unwrap();
        let names: Vec<String> = find_all(ul, "a", true).into_iter().map(text).collect();
        assert_eq!(names, vec!["Ann".to_string()]);
    }

    #[test]
    fn test_path_reports_failing_step() {
        let doc = parse(PAGE);
        let path = LocatorPath::new()
            .then("main", LocatorStep::First("main"))
            .then("first section", LocatorStep::First("section"))
            .then("fifth div", LocatorStep::ChildAt { tag: "div", index: 4 });

        let err = path.resolve(doc.root_element()).unwrap_err();
        assert_eq!(err.step, "fifth div");
        assert_eq!(err.locator, "<div> child #4");
    }

    #[test]
    fn test_path_extend_and_resolve() {
        let doc = parse(PAGE);
        let base = LocatorPath::new().then("section", LocatorStep::First("section"));
        let path = LocatorPath::new()
            .extend(&base)
            .then("third div", LocatorStep::ChildAt { tag: "div", index: 2 })
            .then("inner", LocatorStep::First("div"));

        assert_eq!(
            path.step_names().collect::<Vec<_>>(),
            vec!["section", "third div", "inner"]
        );
        assert_eq!(text(path.resolve(doc.root_element()).unwrap()), "C");
    }

    #[test]
    fn test_find_all_direct_versus_recursive() {
        let doc = parse(PAGE);
        let section = find_first(doc.root_element(), "section").unwrap();

        assert_eq!(names(&find_all(section, "div", false)), vec!["a", "b", "c"]);
        assert_eq!(
            names(&find_all(section, "div", true)),
            vec!["a", "b", "c", "c-inner"]
        );
    }

    #[test]
    fn test_sole_string() {
        let doc = parse(r#"<html><body><p id="one"><b>bold</b></p><p id="two">a<b>b</b></p><p id="three"></p></body></html>"#);
        let root = doc.root_element();
        let by_id = |id: &'static str| {
            LocatorStep::FirstWithAttr { tag: "p", attr: "id", value: id }
                .apply(root)
                .unwrap()
        };

        assert_eq!(sole_string(by_id("one")).as_deref(), Some("bold"));
        assert_eq!(sole_string(by_id("two")), None);
        assert_eq!(sole_string(by_id("three")), None);
    }

    #[test]
    fn test_first_matching_ignores_mixed_content_parents() {
        let doc = parse(
            r#"<html><body><span class="item"><span class="label">Director : </span><span>Ann</span></span></body></html>"#,
        );
        let label = LocatorStep::FirstMatching {
            tag: "span",
            pattern: static_regex("(?i)director"),
        }
        .apply(doc.root_element())
        .unwrap();

        assert_eq!(attr(label, "class").as_deref(), Some("label"));
        assert_eq!(text(next_in_document(label, "span").unwrap()), "Ann");
    }

    #[test]
    fn test_next_in_document_climbs_out_of_parents() {
        let doc = parse(PAGE);
        let s2 = LocatorStep::FirstWithAttr {
            tag: "section",
            attr: "id",
            value: "s2",
        }
        .apply(doc.root_element())
        .unwrap();

        let after = next_in_document(s2, "span").unwrap();
        assert_eq!(text(after), "Director");

        let label = LocatorStep::FirstWithAttr {
            tag: "span",
            attr: "class",
            value: "label",
        }
        .apply(doc.root_element())
        .unwrap();
        assert_eq!(text(next_in_document(label, "span").unwrap()), "2h");
        assert!(next_in_document(label, "section").is_none());
    }
}
