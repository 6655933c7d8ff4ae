//! Maintains the process-wide `{uri} → prefix` mapping (§4.4).
//!
//! The mapping is published through an immutable snapshot swap (`RwLock<Arc<_>>`)
//! so every reader during a cycle sees one consistent `NamespaceMapping`,
//! per the design notes on avoiding partial-rebuild observation.

use std::sync::Arc;

use model::{
    namespace::split_qname,
    NamespaceMapping,
};
use parking_lot::RwLock;
use quick_xml::{
    events::Event,
    Reader,
};
use repo_client::RepoClient;

pub struct NamespaceMapper {
    repo: RepoClient,
    snapshot: RwLock<Arc<NamespaceMapping>>,
}

impl NamespaceMapper {
    pub fn new(repo: RepoClient) -> Self {
        Self {
            repo,
            snapshot: RwLock::new(Arc::new(NamespaceMapping::new())),
        }
    }

    pub fn current(&self) -> Arc<NamespaceMapping> {
        self.snapshot.read().clone()
    }

    /// Rebuilds the mapping from scratch. A single model's XML failing to
    /// parse is logged and skipped; the call as a whole does not fail
    /// unless the `modelsdiff` request itself errors.
    pub async fn sync(&self) -> anyhow::Result<()> {
        let diffs = self.repo.get_models_diff().await?;
        let mut mapping = NamespaceMapping::new();
        for diff in diffs.diffs {
            let Some((uri, _local)) = split_qname(&diff.name) else {
                tracing::warn!(qname = %diff.name, "modelsdiff entry is not a {{uri}}localName QName, skipping");
                continue;
            };
            match self.repo.get_model(&diff.name).await {
                Ok(xml) => match extract_prefix(&xml) {
                    Some(prefix) => {
                        mapping.insert(uri.to_string(), prefix);
                    },
                    None => {
                        tracing::warn!(qname = %diff.name, "model XML has no <model name=...> element, skipping");
                    },
                },
                Err(err) => {
                    tracing::warn!(qname = %diff.name, error = %err, "failed to fetch model XML, skipping");
                },
            }
        }
        *self.snapshot.write() = Arc::new(mapping);
        Ok(())
    }
}

/// Parses model XML, finds the `<model>` element by local name (ignoring
/// whatever namespace it's declared under), and splits its `name` attribute
/// (`prefix:localName`) to return just the prefix.
fn extract_prefix(xml: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => return None,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().local_name().as_ref() == b"model" {
                    let name_attr = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.local_name().as_ref() == b"name")?;
                    let value = name_attr.unescape_value().ok()?;
                    return value.split_once(':').map(|(prefix, _)| prefix.to_string());
                }
            },
            Err(_) => return None,
            _ => {},
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prefix_from_model_name_attribute() {
        let xml = br#"<model name="cm:contentmodel" xmlns="http://www.alfresco.org/model/dictionary/1.0"></model>"#;
        assert_eq!(extract_prefix(xml), Some("cm".to_string()));
    }

    #[test]
    fn matches_model_element_regardless_of_namespace_prefix() {
        let xml = br#"<d:model name="sys:system" xmlns:d="http://www.alfresco.org/model/dictionary/1.0"/>"#;
        assert_eq!(extract_prefix(xml), Some("sys".to_string()));
    }

    #[test]
    fn missing_model_element_yields_none() {
        let xml = br#"<root></root>"#;
        assert_eq!(extract_prefix(xml), None);
    }
}
