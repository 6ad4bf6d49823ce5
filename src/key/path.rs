use serde_json::Value;

/// Resolves a path expression against an event document.
///
/// The engine only ever asks "what value, if any, lives at this path"; a
/// richer expression language (JMESPath and friends) plugs in through this
/// trait without the engine noticing.
pub trait PathEvaluator: Send + Sync {
    /// Returns the value at `path`, or `None` when the path has no match.
    fn evaluate(&self, path: &str, document: &Value) -> Option<Value>;
}

/// Default evaluator supporting dotted object traversal (`Body.id`) and
/// bracketed array indexing (`Records[0].messageId`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedPathEvaluator;

impl PathEvaluator for DottedPathEvaluator {
    fn evaluate(&self, path: &str, document: &Value) -> Option<Value> {
        let mut current = document;

        for segment in path.split('.') {
            let (name, indices) = split_segment(segment)?;
            if !name.is_empty() {
                current = current.get(name)?;
            }
            for index in indices {
                current = current.get(index)?;
            }
        }

        Some(current.clone())
    }
}

/// Splits `items[0][1]` into `("items", [0, 1])`. Returns `None` for
/// malformed brackets, which the caller treats as "no match".
fn split_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(bracket) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };

    let name = &segment[..bracket];
    let mut indices = Vec::new();
    for part in segment[bracket..].split('[').skip(1) {
        let index = part.strip_suffix(']')?;
        indices.push(index.parse().ok()?);
    }

    Some((name, indices))
}
