//! Locator repository
//!
//! Semantic element names mapped to selector strings. The synchronization
//! engine treats selectors as opaque; only this table knows what they look
//! like. Compile-time hash map for O(1) lookup without runtime allocation.

use phf::phf_map;

use crate::{Error, Result};

/// Signup flow locators, keyed by semantic name
static LOCATORS: phf::Map<&'static str, &'static str> = phf_map! {
    "signup.first_name" => "#first-name",
    "signup.last_name" => "#last-name",
    "signup.email" => "#email",
    "signup.password" => "#password",
    "signup.confirm_password" => "#confirm-password",
    "signup.terms_checkbox" => "input[name='accept-terms']",
    "signup.newsletter_checkbox" => "input[name='newsletter-opt-in']",
    "signup.submit_button" => "button[type='submit']",
    "signup.loading_spinner" => ".loading-spinner",
    "signup.error_banner" => ".form-error-banner",
    "confirmation.heading" => ".confirmation h1",
    "confirmation.account_email" => ".confirmation .account-email",
    "confirmation.continue_button" => ".confirmation .continue",
};

/// Selector for a semantic element name. Unknown names are a wiring
/// mistake, not a page state, and fail fast.
pub fn selector(name: &str) -> Result<&'static str> {
    LOCATORS
        .get(name)
        .copied()
        .ok_or_else(|| Error::UnknownLocator(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_resolve() {
        assert_eq!(selector("signup.email").unwrap(), "#email");
        assert_eq!(
            selector("signup.terms_checkbox").unwrap(),
            "input[name='accept-terms']"
        );
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let err = selector("signup.nonexistent").unwrap_err();
        assert!(matches!(err, Error::UnknownLocator(_)));
        assert!(err.to_string().contains("signup.nonexistent"));
    }
}
