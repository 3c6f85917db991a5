//! The request-filter hook: a hybrid query in a request forces
//! batched-reduce-size to its maximum sentinel, unconditionally, to avoid a
//! "top docs already consumed" race between per-shard collection and
//! hybrid normalization.

/// Sentinel meaning "do not batch the reduce phase".
pub const BATCHED_REDUCE_SIZE_MAX: u32 = i32::MAX as u32;

/// The narrow slice of a search request this hook needs: whether a hybrid
/// query is present, and the currently configured batched-reduce-size.
/// This crate does not model the host's full request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest {
    pub has_hybrid_query: bool,
    pub batched_reduce_size: u32,
}

/// Rewrites `request.batched_reduce_size` to [`BATCHED_REDUCE_SIZE_MAX`]
/// whenever a hybrid query is present, overriding whatever value was
/// configured. Requests without a hybrid query pass through unchanged.
pub fn disable_batched_reduce_for_hybrid(request: SearchRequest) -> SearchRequest {
    if request.has_hybrid_query {
        SearchRequest {
            batched_reduce_size: BATCHED_REDUCE_SIZE_MAX,
            ..request
        }
    } else {
        request
    }
}
