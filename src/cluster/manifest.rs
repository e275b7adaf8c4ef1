//! Multi-document manifest partitioning and parsing.

use kube::core::GroupVersionKind;
use serde_json::Value;

use super::error::DocError;

/// One candidate document cut out of a manifest file.
///
/// `index` is the 1-based partition ordinal counting empty partitions, so a
/// document keeps its number whether or not the file opens with `---`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RawDocument {
    pub index: usize,
    pub text: String,
}

/// A document parsed far enough to apply: identity plus the JSON-equivalent
/// payload submitted as the patch body.
pub(crate) struct ManifestDocument {
    pub gvk: GroupVersionKind,
    pub name: String,
    pub namespace: Option<String>,
    pub value: Value,
}

/// Partition `content` on lines equal to `---` (tolerating a trailing CR).
/// Coarse by design: a literal `---` line inside a block scalar is
/// miscounted, which real manifest files rarely contain.
pub(crate) fn split_documents(content: &str) -> Vec<RawDocument> {
    let mut documents = Vec::new();
    let mut current = String::new();
    let mut ordinal = 1;

    for line in content.lines() {
        if line.trim_end_matches('\r') == "---" {
            flush(ordinal, &mut current, &mut documents);
            ordinal += 1;
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    flush(ordinal, &mut current, &mut documents);
    documents
}

fn flush(ordinal: usize, current: &mut String, documents: &mut Vec<RawDocument>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        documents.push(RawDocument {
            index: ordinal,
            text: trimmed.to_string(),
        });
    }
    current.clear();
}

/// Parse one candidate into an applyable document.
///
/// Documents that are not a mapping (including comment-only documents, which
/// parse to null) and mappings without both `kind` and `apiVersion` fail the
/// identity check.
pub(crate) fn parse_document(raw: &RawDocument) -> Result<ManifestDocument, DocError> {
    let value: Value = serde_yaml::from_str(&raw.text).map_err(DocError::Parse)?;
    let object = value.as_object().ok_or(DocError::MissingKindOrApiVersion)?;

    let kind = object.get("kind").and_then(Value::as_str).unwrap_or("");
    let api_version = object
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or("");
    if kind.is_empty() || api_version.is_empty() {
        return Err(DocError::MissingKindOrApiVersion);
    }

    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    let gvk = GroupVersionKind::gvk(group, version, kind);

    let metadata = object.get("metadata").and_then(Value::as_object);
    let name = metadata
        .and_then(|meta| meta.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let namespace = metadata
        .and_then(|meta| meta.get("namespace"))
        .and_then(Value::as_str)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string);

    Ok(ManifestDocument {
        gvk,
        name,
        namespace,
        value,
    })
}
