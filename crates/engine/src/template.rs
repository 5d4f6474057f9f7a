//! Placeholder substitution for notification subjects and bodies.

/// Subject line of every stage notification.
pub const SUBJECT_TEMPLATE: &str = "Your account will expire in @remaining-period";

/// Values for the tokens a notification template may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub name: String,
    pub inactive_period: String,
    pub remaining_period: String,
    pub site_url: String,
}

impl Placeholders {
    /// Token/value pairs, in substitution order.
    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("@name", self.name.as_str()),
            ("@inactive-period", self.inactive_period.as_str()),
            ("@remaining-period", self.remaining_period.as_str()),
            ("@site-url", self.site_url.as_str()),
        ]
    }
}

/// Replace every recognized token in `template`.
///
/// Unknown `@tokens` are left alone. A missing template renders as an empty
/// string.
pub fn render(template: Option<&str>, placeholders: &Placeholders) -> String {
    let Some(template) = template else {
        return String::new();
    };

    placeholders
        .pairs()
        .into_iter()
        .fold(template.to_string(), |text, (token, value)| {
            text.replace(token, value)
        })
}
