use super::types::Limits;

/// Page size for a boundary request: the default when absent, clamped to `[1, max_page_size]`.
pub fn effective_page_size(requested: Option<usize>, default_page_size: usize, max_page_size: usize) -> Limits {
    let max_page_size = max_page_size.max(1);
    let page_size = requested
        .unwrap_or(default_page_size)
        .min(max_page_size)
        .max(1);
    Limits { page_size }
}
