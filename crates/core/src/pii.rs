/// Mask an email address for storage in the audit trail.
///
/// The local part keeps its first character (and its last, when longer than
/// two characters); the domain is kept as-is. Inputs without an `@` are
/// masked entirely rather than stored.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "***".to_string();
    };

    let mut chars = local.chars();
    let Some(first) = chars.next() else {
        return format!("***@{domain}");
    };

    if local.chars().count() <= 2 {
        return format!("{first}***@{domain}");
    }

    let last = local.chars().next_back().unwrap_or(first);
    format!("{first}***{last}@{domain}")
}
