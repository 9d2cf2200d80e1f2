// src/tree.rs

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// A generic document node: a tag, its string attributes in document order,
/// and its child elements.
///
/// This is all the compiler needs from the XML layer; text content and
/// comments are not represented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder helper: appends an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder helper: appends a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the value of the first attribute called `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(key, _)| key.as_str())
    }

    /// Iterates the children together with their 1-based position among
    /// siblings of the same tag, as used in diagnostic paths
    /// (`command[3]` is the third `<command>` child).
    pub fn indexed_children(&self) -> impl Iterator<Item = (usize, &Element)> {
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        self.children.iter().map(move |child| {
            let n = seen.entry(child.tag.as_str()).or_insert(0);
            *n += 1;
            (*n, child)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Element;
    use alloc::vec::Vec;

    #[test]
    fn test_attribute_lookup() {
        let el = Element::new("device")
            .with_attr("name", "drive")
            .with_attr("address", "5");
        assert_eq!(el.attr("name"), Some("drive"));
        assert_eq!(el.attr("address"), Some("5"));
        assert!(el.attr("parity").is_none());
        assert_eq!(el.attr_names().collect::<Vec<_>>(), ["name", "address"]);
    }

    #[test]
    fn test_indexed_children_count_per_tag() {
        let el = Element::new("commands")
            .with_child(Element::new("command"))
            .with_child(Element::new("description"))
            .with_child(Element::new("command"))
            .with_child(Element::new("command"));
        let indices: Vec<_> = el
            .indexed_children()
            .map(|(n, child)| (child.tag.as_str(), n))
            .collect();
        assert_eq!(
            indices,
            [("command", 1), ("description", 1), ("command", 2), ("command", 3)]
        );
    }
}
