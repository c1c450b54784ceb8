use anyhow::{Result, anyhow};

/// Normalizes a hostname to its lowercase ASCII form (IDNA), without a trailing dot.
pub fn normalize_hostname(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(anyhow!("hostname is required"));
    }
    let ascii =
        idna::domain_to_ascii(trimmed).map_err(|err| anyhow!("invalid hostname: {err}"))?;
    Ok(ascii.to_lowercase())
}

/// Hostnames are compared case-insensitively when selecting bindings.
pub fn hosts_match(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}

pub fn normalize_hostname_for_display(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('.');
    let (unicode, _) = idna::domain_to_unicode(trimmed);
    unicode.to_lowercase()
}
