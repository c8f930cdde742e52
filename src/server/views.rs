//! Page rendering.

use minijinja::Environment;
use serde::Serialize;

use super::{rows_of, BookCard, ServerError, ServerResult, BOOKS_PER_ROW};

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// Everything the recommendation page shows.
#[derive(Debug, Serialize)]
pub struct PageView<'a> {
    /// Dropdown options, in dataset order
    pub titles: &'a [String],

    /// Preselected dropdown value; the first title when `None`
    pub selected: Option<&'a str>,

    /// Result cards grouped into display rows
    pub rows: Vec<Vec<BookCard>>,

    /// Message shown instead of results
    pub message: Option<&'a str>,

    /// Search button label
    pub search_label: String,
}

impl<'a> PageView<'a> {
    pub fn new(titles: &'a [String], search_label: String) -> Self {
        Self {
            titles,
            selected: titles.first().map(String::as_str),
            rows: Vec::new(),
            message: None,
            search_label,
        }
    }

    pub fn with_results(mut self, selected: &'a str, cards: &[BookCard]) -> Self {
        self.selected = Some(selected);
        self.rows = rows_of(cards, BOOKS_PER_ROW);
        self
    }

    pub fn with_message(mut self, message: &'a str) -> Self {
        self.message = Some(message);
        self
    }
}

/// Compiled templates. Output is HTML-escaped.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// # Errors
    /// Returns `ServerError::TemplateError` if a template fails to compile
    pub fn new() -> ServerResult<Self> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)
            .map_err(|e| ServerError::TemplateError(e.to_string()))?;
        Ok(Self { env })
    }

    pub fn render_page(&self, view: &PageView<'_>) -> ServerResult<String> {
        self.env
            .get_template("index.html")
            .and_then(|tmpl| tmpl.render(view))
            .map_err(|e| ServerError::TemplateError(e.to_string()))
    }
}
