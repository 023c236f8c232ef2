//! Input contract: the caller-supplied primer list (§6).

/// A single primer pair as handed to the engine by its host service.
///
/// Sequences are expected to already be trimmed and uppercased by the time
/// they reach [`crate::encoder::encode_primers`]; that function re-normalizes
/// defensively so library callers don't have to trust their own ingest path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primer {
    pub id: String,
    pub gene: String,
    pub forward: String,
    pub reverse: String,
}

impl Primer {
    pub fn new(
        id: impl Into<String>,
        gene: impl Into<String>,
        forward: impl Into<String>,
        reverse: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            gene: gene.into(),
            forward: forward.into(),
            reverse: reverse.into(),
        }
    }
}
