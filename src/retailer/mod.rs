//! Outbound retailer search links.

use serde::{Deserialize, Serialize};

/// Default retailer used for the search button.
pub const DEFAULT_RETAILER_URL: &str = "https://www.amazon.com";

/// Default label shown on the search button.
pub const DEFAULT_RETAILER_NAME: &str = "Amazon Books";

/// Builds `<base>/s?k=<title>` search URLs for one retailer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetailerSearch {
    /// Scheme and host, without a trailing slash
    pub base_url: String,

    /// Name shown on the button, e.g. "Amazon Books"
    pub name: String,
}

impl Default for RetailerSearch {
    fn default() -> Self {
        Self::new(DEFAULT_RETAILER_URL, DEFAULT_RETAILER_NAME)
    }
}

impl RetailerSearch {
    pub fn new(base_url: impl Into<String>, name: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.into(),
        }
    }

    /// Search URL for `title`.
    ///
    /// The title is percent-encoded with spaces written as `+`.
    pub fn search_url(&self, title: &str) -> String {
        let query = title
            .split(' ')
            .map(|word| urlencoding::encode(word).into_owned())
            .collect::<Vec<_>>()
            .join("+");
        format!("{}/s?k={}", self.base_url, query)
    }

    /// Button label, e.g. "Search on Amazon Books".
    pub fn button_label(&self) -> String {
        format!("Search on {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_become_plus() {
        let retailer = RetailerSearch::default();
        assert_eq!(
            retailer.search_url("The Da Vinci Code"),
            "https://www.amazon.com/s?k=The+Da+Vinci+Code"
        );
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let retailer = RetailerSearch::default();
        assert_eq!(
            retailer.search_url("Harry Potter and the Sorcerer's Stone"),
            "https://www.amazon.com/s?k=Harry+Potter+and+the+Sorcerer%27s+Stone"
        );
        assert_eq!(
            retailer.search_url("Q&A: 1+1"),
            "https://www.amazon.com/s?k=Q%26A%3A+1%2B1"
        );
    }

    #[test]
    fn test_custom_retailer() {
        let retailer = RetailerSearch::new("https://books.example.org/", "Example");
        assert_eq!(retailer.search_url("Emma"), "https://books.example.org/s?k=Emma");
        assert_eq!(retailer.button_label(), "Search on Example");
    }
}
