//! Boundary to already-parsed form definition documents.
//!
//! Form discovery only needs a handful of tree queries, so the parser is
//! kept outside this crate: anything that can answer [`FormElement`]
//! queries can be used to derive a [`FormMetadata`](crate::FormMetadata).
//! [`XmlElement`] is a small owned tree for callers that build documents
//! themselves.

/// Read-only view of one element of a parsed form definition.
pub trait FormElement {
    /// The element's tag name, possibly namespace-prefixed (`h:head`).
    fn name(&self) -> &str;

    /// The element's text content, trimmed. `None` when blank.
    fn value(&self) -> Option<&str>;

    /// Direct child elements, in document order.
    fn children(&self) -> Vec<&Self>;

    /// Value of the attribute with the given name.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// The tag name without its namespace prefix.
    fn local_name(&self) -> &str {
        let name = self.name();
        name.rsplit_once(':').map_or(name, |(_, local)| local)
    }

    /// Check whether the attribute is present.
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Descendants reached by following `path`, one tag name per level.
    ///
    /// Tags are matched by local name, so `["head", "title"]` finds
    /// `<h:head><h:title>` as well.
    fn find_elements(&self, path: &[&str]) -> Vec<&Self> {
        let mut current = vec![self];
        for tag in path {
            current = current
                .into_iter()
                .flat_map(|element| element.children())
                .filter(|child| child.local_name() == *tag)
                .collect();
        }
        current
    }
}

/// An owned element tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an element with no attributes, text or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add an attribute, replacing any previous value for the same name.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Set the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }
}

impl FormElement for XmlElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    fn children(&self) -> Vec<&Self> {
        self.children.iter().collect()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
