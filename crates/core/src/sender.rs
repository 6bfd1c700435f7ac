//! Display-name derivation from a free-text sender header.

/// Derive an account display name from a mail `From:` header.
///
/// - a bracketed `<address>` suffix and surrounding quotes are dropped
/// - `"Last, First"` becomes `"First Last"`
/// - anything else is used verbatim
/// - an empty result falls back to the local part of `email`
pub fn display_name(sender: &str, email: &str) -> String {
    let without_address = match sender.find('<') {
        Some(idx) => &sender[..idx],
        None => sender,
    };
    let name = without_address
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();

    let name = match name.split_once(',') {
        Some((last, first)) => {
            let (first, last) = (first.trim(), last.trim());
            match (first.is_empty(), last.is_empty()) {
                (false, false) => format!("{first} {last}"),
                (true, _) => last.to_string(),
                (false, true) => first.to_string(),
            }
        }
        None => name.to_string(),
    };

    if name.is_empty() {
        return email.split('@').next().unwrap_or(email).trim().to_string();
    }
    name
}
