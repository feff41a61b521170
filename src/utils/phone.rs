/// Argentina country calling code plus the mobile indicator WhatsApp expects.
const MOBILE_COUNTRY_PREFIX: &str = "549";
const COUNTRY_CODE: &str = "54";

/// Canonicalizes a raw phone string into the provider-addressable identifier.
///
/// Examples: `+54 11 5555-1234` -> `5491155551234`, `011 15-5555-1234` ->
/// `5491155551234`. Already-canonical numbers pass through unchanged, so the
/// function is idempotent. There is no error path: garbage in produces a
/// best-effort digit string and the provider's send rejection is the
/// authoritative validity check.
pub fn normalize_phone(raw: &str) -> String {
    // Dropping every non-digit also takes care of spaces, dashes,
    // parentheses and a leading '+'.
    let mut cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if cleaned.starts_with(MOBILE_COUNTRY_PREFIX) {
        return cleaned;
    }
    if let Some(national) = cleaned.strip_prefix(COUNTRY_CODE) {
        // Country code present but the mobile indicator is missing.
        return format!("{}{}", MOBILE_COUNTRY_PREFIX, national);
    }

    // National trunk prefix.
    if cleaned.starts_with('0') {
        cleaned.remove(0);
    }
    // Local mobile prefix.
    if cleaned.starts_with("15") {
        cleaned.drain(..2);
    }
    format!("{}{}", MOBILE_COUNTRY_PREFIX, cleaned)
}
