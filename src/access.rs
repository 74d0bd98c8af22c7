//! Upload access guard: a stateless password predicate.
//! Intentionally has no sessions, no attempts tracking, no per-request state.

/// True when the supplied password satisfies the configured one.
/// No configured password means every upload is authorized.
pub fn is_authorized(configured: Option<&str>, supplied: Option<&str>) -> bool {
    match configured {
        None => true,
        Some(expected) => supplied == Some(expected),
    }
}
