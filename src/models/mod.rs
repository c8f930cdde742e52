//! Core data models for the book recommender.
//!
//! This module contains the records loaded from the metadata artifact and the
//! values handed to front ends once a recommendation has been assembled.

use serde::{Deserialize, Deserializer, Serialize};

/// One row of the exported metadata table.
///
/// The offline export carries more columns (user id, ISBN, rating, publisher,
/// rating count); only the ones needed for rendering are kept. A title may
/// appear in many rows, one per rating, and the first row wins on lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookRecord {
    /// Book title, the join key with the title index
    pub title: String,

    /// Author name as exported
    pub author: String,

    /// Publication year; exports carry it as a number or as text
    #[serde(deserialize_with = "deserialize_year")]
    pub year: String,

    /// Cover image URL
    pub img_url: String,
}

impl BookRecord {
    /// Split off the fields shown next to a recommended title.
    pub fn details(&self) -> BookDetails {
        BookDetails {
            author: self.author.clone(),
            year: self.year.clone(),
            cover_url: self.img_url.clone(),
        }
    }
}

/// Metadata shown for a single book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookDetails {
    /// Author name
    pub author: String,

    /// Publication year as text
    pub year: String,

    /// Cover image URL
    pub cover_url: String,
}

/// A title returned by the recommender, joined with its metadata.
///
/// `details` is `None` when the metadata table has no row for the title;
/// front ends render a placeholder instead of dropping the book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedBook {
    /// Book title
    pub title: String,

    /// Author, year and cover, if the metadata table knows the title
    pub details: Option<BookDetails>,

    /// Distance from the query book reported by the neighbor index
    pub distance: f32,

    /// Retailer search URL for this title
    pub search_url: String,
}

impl RecommendedBook {
    /// Author for display, `"Unknown"` when metadata is missing.
    pub fn author_or_unknown(&self) -> &str {
        self.details
            .as_ref()
            .map(|d| d.author.as_str())
            .unwrap_or(UNKNOWN)
    }

    /// Year for display, `"Unknown"` when metadata is missing.
    pub fn year_or_unknown(&self) -> &str {
        self.details
            .as_ref()
            .map(|d| d.year.as_str())
            .unwrap_or(UNKNOWN)
    }

    /// Cover URL if known.
    pub fn cover_url(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.cover_url.as_str())
    }
}

/// Placeholder rendered for missing metadata fields.
pub const UNKNOWN: &str = "Unknown";

#[derive(Deserialize)]
#[serde(untagged)]
enum YearValue {
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_year<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match YearValue::deserialize(deserializer)? {
        YearValue::Int(y) => y.to_string(),
        // pandas widens integer columns with gaps to float64
        YearValue::Float(y) if y.fract() == 0.0 => format!("{}", y as i64),
        YearValue::Float(y) => y.to_string(),
        YearValue::Text(y) => y.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accepts_numeric_and_text_years() {
        let json = r#"[
            {"title": "A", "author": "X", "year": 2002, "img_url": "http://a"},
            {"title": "B", "author": "Y", "year": "1999", "img_url": "http://b"},
            {"title": "C", "author": "Z", "year": 2004.0, "img_url": "http://c"}
        ]"#;
        let records: Vec<BookRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].year, "2002");
        assert_eq!(records[1].year, "1999");
        assert_eq!(records[2].year, "2004");
    }

    #[test]
    fn test_record_ignores_extra_columns() {
        let json = r#"{
            "user_id": 277427, "ISBN": "0439064872", "rating": 10,
            "title": "Harry Potter and the Chamber of Secrets",
            "author": "J. K. Rowling", "year": "2000", "publisher": "Scholastic",
            "img_url": "http://images.amazon.com/images/P/0439064872.01.LZZZZZZZ.jpg",
            "num_of_rating": 82
        }"#;
        let record: BookRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.author, "J. K. Rowling");
        assert_eq!(record.details().cover_url, record.img_url);
    }

    #[test]
    fn test_placeholders_for_missing_details() {
        let book = RecommendedBook {
            title: "Orphan".to_string(),
            details: None,
            distance: 1.5,
            search_url: "https://www.amazon.com/s?k=Orphan".to_string(),
        };
        assert_eq!(book.author_or_unknown(), UNKNOWN);
        assert_eq!(book.year_or_unknown(), UNKNOWN);
        assert!(book.cover_url().is_none());
    }
}
