//! HTML to well-formed XHTML for EPUB content documents.
//!
//! Feed content is tag-soup HTML. EPUB readers parse content documents as
//! XML, so the fragment is parsed with an HTML5 parser and written back out
//! with every element closed and every character escaped.
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const DROPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "iframe"];

pub fn to_xhtml(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    for child in fragment.root_element().children() {
        write_node(child, &mut out);
    }
    out
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Element(element) => {
            let name = element.name();
            if DROPPED_ELEMENTS.contains(&name) || !is_xml_name(name) {
                return;
            }
            // Prefixed names like Word's `o:p` have no namespace declaration.
            if name.contains(':') {
                for child in node.children() {
                    write_node(child, out);
                }
                return;
            }
            out.push('<');
            out.push_str(name);
            for (attr, value) in element.attrs() {
                if !is_xml_name(attr) || attr.contains(':') {
                    continue;
                }
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            if VOID_ELEMENTS.contains(&name) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in node.children() {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Comment(_) | Node::ProcessingInstruction(_) | Node::Doctype(_) => {}
        _ => {
            for child in node.children() {
                write_node(child, out);
            }
        }
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Escape markup characters and drop characters XML 1.0 forbids.
pub fn escape_text(s: &str) -> String {
    s.chars()
        .filter(|&c| is_xml_char(c))
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{fffe}' && c != '\u{ffff}')
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_void_elements_and_unclosed_paragraphs() {
        let out = to_xhtml("<p>one<br>two<p>three<img src=a.png>");
        assert_eq!(out, "<p>one<br/>two</p><p>three<img src=\"a.png\"/></p>");
    }

    #[test]
    fn escapes_text_and_attributes() {
        let out = to_xhtml(r#"<a href="?a=1&amp;b=&quot;2&quot;">Fish &amp; Chips &lt;3</a>"#);
        assert_eq!(
            out,
            r#"<a href="?a=1&amp;b=&quot;2&quot;">Fish &amp; Chips &lt;3</a>"#
        );
    }

    #[test]
    fn drops_scripts_and_comments() {
        let out = to_xhtml("<div><!-- hidden --><script>alert(1)</script>kept</div>");
        assert_eq!(out, "<div>kept</div>");
    }

    #[test]
    fn prefixed_elements_are_unwrapped() {
        let out = to_xhtml("<p>Word<o:p></o:p> <st1:place>Paris</st1:place></p>");
        assert_eq!(out, "<p>Word Paris</p>");
    }

    #[test]
    fn forbidden_control_characters_are_dropped() {
        let out = to_xhtml("<p title=\"a\u{1}b\">bell\u{8}char\u{b}\tok\n</p>");
        assert_eq!(out, "<p title=\"ab\">bellchar\tok\n</p>");
    }

    #[test]
    fn named_entities_become_characters() {
        assert_eq!(to_xhtml("caf&eacute;&nbsp;!"), "café\u{a0}!");
    }
}
