use std::collections::BTreeMap;

/// `{uri}` (including the enclosing braces) → short prefix, e.g. `cm`.
/// Rebuilt wholesale at the start of every cycle and never mutated
/// afterward (§3); held by the pipeline controller behind an immutable
/// snapshot so every reader during a cycle sees one consistent mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceMapping {
    uri_to_prefix: BTreeMap<String, String>,
}

impl NamespaceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri_with_braces: String, prefix: String) {
        self.uri_to_prefix.insert(uri_with_braces, prefix);
    }

    pub fn len(&self) -> usize {
        self.uri_to_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uri_to_prefix.is_empty()
    }

    /// Splits a `{uri}localName` QName into `(prefix, localName)`, or
    /// `None` when the URI has no known prefix.
    pub fn resolve<'a>(&self, qname: &'a str) -> Option<(&str, &'a str)> {
        let (uri, local) = split_qname(qname)?;
        self.uri_to_prefix.get(uri).map(|prefix| (prefix.as_str(), local))
    }
}

/// Splits `{uri}localName` into `(uri_with_braces, localName)`. Returns
/// `None` for strings that don't start with `{`.
pub fn split_qname(qname: &str) -> Option<(&str, &str)> {
    if !qname.starts_with('{') {
        return None;
    }
    let close = qname.find('}')?;
    Some((&qname[..=close], &qname[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_uri_to_prefix() {
        let mut mapping = NamespaceMapping::new();
        mapping.insert("{http://www.alfresco.org/model/content/1.0}".to_string(), "cm".to_string());
        let (prefix, local) = mapping
            .resolve("{http://www.alfresco.org/model/content/1.0}name")
            .unwrap();
        assert_eq!(prefix, "cm");
        assert_eq!(local, "name");
    }

    #[test]
    fn unknown_uri_resolves_to_none() {
        let mapping = NamespaceMapping::new();
        assert!(mapping.resolve("{http://custom}foo").is_none());
    }

    #[test]
    fn non_qname_input_resolves_to_none() {
        let mapping = NamespaceMapping::new();
        assert!(mapping.resolve("cm:name").is_none());
    }
}
