//! Phone normalization for WhatsApp chat ids.

const CHILE_PREFIX: &str = "56";
const CHAT_SUFFIX: &str = "@c.us";

/// Digits-only phone number with the Chilean country code filled in.
///
/// A bare nine-digit mobile number starting with `9` gets the `56` prefix;
/// anything else is kept as typed, minus the non-digits.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.starts_with(CHILE_PREFIX) {
        return digits;
    }
    if digits.starts_with('9') && digits.len() == 9 {
        return format!("{}{}", CHILE_PREFIX, digits);
    }
    digits
}

/// `<digits>@c.us` for an already formatted phone.
pub fn chat_id(formatted: &str) -> String {
    format!("{}{}", formatted, CHAT_SUFFIX)
}
