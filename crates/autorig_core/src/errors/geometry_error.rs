use thiserror::Error;

/// Degenerate guide geometry, detected before any orientation math runs.
///
/// Variants carry the names of the offending guides so the failure reads
/// back to something selectable.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum GeometryError {
    #[error("limb is zero length: guides `{start}` and `{end}` are coincident")]
    ZeroLengthLimb { start: String, end: String },
    #[error("guides `{root}`, `{mid}` and `{end}` are collinear; no pole plane exists")]
    CollinearPivots {
        root: String,
        mid: String,
        end: String,
    },
    #[error("guides `{a}` and `{b}` are coincident; cannot derive an aim")]
    CoincidentGuides { a: String, b: String },
}
