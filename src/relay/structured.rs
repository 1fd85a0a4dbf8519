//! Structured (XML-wrapped) envelope payloads.
//!
//! Some relay calls arrive as a structured message rather than a raw byte
//! stream. Before the pipeline sees them the message body is written out as
//! UTF-8 XML text, with no declaration, and from then on treated exactly
//! like a raw body.

use bytes::Bytes;

/// One node of a structured payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, element: XmlElement) -> Self {
        self.children.push(XmlNode::Element(element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode the element as UTF-8 XML text.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = String::new();
        self.write_into(&mut out);
        Bytes::from(out)
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(value, out);
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_into(out),
                XmlNode::Text(text) => escape_into(text, out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape_into(raw: &str, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_nested_elements() {
        let doc = XmlElement::new("order")
            .attr("id", "42")
            .child(XmlElement::new("item").text("book"))
            .child(XmlElement::new("gift"));

        assert_eq!(
            &doc.to_bytes()[..],
            br#"<order id="42"><item>book</item><gift/></order>"#
        );
    }

    #[test]
    fn escapes_markup_in_text_and_attributes() {
        let doc = XmlElement::new("note")
            .attr("title", "a \"quoted\" <title>")
            .text("fish & chips");

        assert_eq!(
            std::str::from_utf8(&doc.to_bytes()).unwrap(),
            "<note title=\"a &quot;quoted&quot; &lt;title&gt;\">fish &amp; chips</note>"
        );
    }
}
