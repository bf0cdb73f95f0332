//! CSS selector synthesis for picked elements.
//!
//! Walks from the target element towards the document root, emitting one
//! compound selector per level: `tag#id` for id-anchored nodes (which end the
//! walk), otherwise `tag.class1.class2` with a `:nth-of-type(n)` qualifier when
//! the node is not the first sibling of its tag.

use scraper::{ElementRef, Selector};

/// Result of scope-aware synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedSelector {
    pub selector: String,
    /// True when an ancestor matched the scope and the selector is relative to it
    pub relative: bool,
}

/// Build a selector for `element`, root-most ancestor first.
pub fn synthesize(element: ElementRef<'_>) -> String {
    build_path(element, None).selector
}

/// Build a selector for `element` relative to the nearest ancestor matching `scope`.
///
/// Falls back to the absolute selector when no ancestor matches.
pub fn synthesize_within(element: ElementRef<'_>, scope: &Selector) -> ScopedSelector {
    build_path(element, Some(scope))
}

fn build_path(element: ElementRef<'_>, scope: Option<&Selector>) -> ScopedSelector {
    let mut path: Vec<String> = Vec::new();
    let mut current = Some(element);
    let mut relative = false;

    while let Some(node) = current {
        if node != element {
            if let Some(scope) = scope {
                if scope.matches(&node) {
                    relative = true;
                    break;
                }
            }
        }

        let (token, anchored) = node_token(node);
        path.push(token);
        if anchored {
            break;
        }

        current = node.parent().and_then(ElementRef::wrap);
    }

    // An id anchor below the scope boundary still counts as relative to it.
    if scope.is_some() && !relative {
        relative = has_matching_ancestor(element, scope);
    }

    if scope.is_some() && !relative {
        return build_path(element, None);
    }

    path.reverse();
    ScopedSelector {
        selector: path.join(" > "),
        relative,
    }
}

fn has_matching_ancestor(element: ElementRef<'_>, scope: Option<&Selector>) -> bool {
    let Some(scope) = scope else {
        return false;
    };
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| scope.matches(&ancestor))
}

/// Compound selector for one node; the flag is set when the node is id-anchored.
fn node_token(node: ElementRef<'_>) -> (String, bool) {
    let value = node.value();
    let tag = value.name().to_lowercase();

    if let Some(id) = value.attr("id").filter(|id| !id.is_empty()) {
        return (format!("{}#{}", tag, escape_ident(id)), true);
    }

    let nth = 1 + node
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name().eq_ignore_ascii_case(&tag))
        .count();

    let mut token = tag;
    if let Some(classes) = value.attr("class") {
        for class in classes.split_whitespace() {
            token.push('.');
            token.push_str(&escape_ident(class));
        }
    }

    if nth != 1 {
        token.push_str(&format!(":nth-of-type({})", nth));
    }

    (token, false)
}

/// Escape an id or class name so it parses as a CSS identifier.
pub fn escape_ident(ident: &str) -> String {
    let mut escaped = String::with_capacity(ident.len());

    for (index, ch) in ident.chars().enumerate() {
        let leading_digit = ch.is_ascii_digit()
            && (index == 0 || (index == 1 && ident.starts_with('-')));

        if leading_digit {
            escaped.push_str(&format!("\\{:x} ", ch as u32));
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            escaped.push(ch);
        } else {
            escaped.push('\\');
            escaped.push(ch);
        }
    }

    escaped
}
