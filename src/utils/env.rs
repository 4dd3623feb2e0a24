use std::str::FromStr;

/// Get environment variable with MASQUERADE_ prefix, falling back to unprefixed version
///
/// Checks `MASQUERADE_{key}` first, then `{key}`, so hosts can share plain
/// variable names across services.
///
/// # Examples
///
/// ```rust
/// use masquerade::utils::get_env_with_prefix;
///
/// // Checks MASQUERADE_IMPERSONATION_COOKIE_NAME first, then IMPERSONATION_COOKIE_NAME
/// let name = get_env_with_prefix("IMPERSONATION_COOKIE_NAME");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("MASQUERADE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// [`get_env_with_prefix`], parsed. Unparseable values count as unset.
pub fn get_env_parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}
