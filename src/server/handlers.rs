//! Request handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::views::PageView;
use super::{
    AppError, BookCard, HealthResponse, RecommendRequest, RecommendResponse, SharedState,
    TitlesResponse,
};
use crate::recommend::{RecommendError, NOT_FOUND_MESSAGE};

/// Query string of `GET /recommend`.
#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    pub title: String,
}

fn cards_for(state: &SharedState, title: &str) -> Result<Vec<BookCard>, RecommendError> {
    let books = state.recommender.recommend_books(title)?;
    Ok(books.into_iter().map(BookCard::from).collect())
}

fn render(state: &SharedState, view: &PageView<'_>) -> Result<String, AppError> {
    state
        .views()
        .render_page(view)
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// `GET /`: the empty page with the first title preselected.
pub async fn index(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    let retailer = state.recommender.retailer();
    let view = PageView::new(state.recommender.titles(), retailer.button_label());
    Ok(Html(render(&state, &view)?))
}

/// `GET /recommend?title=...`: the page with results for `title`.
///
/// An unknown title renders the page with the not-found message and a 404.
pub async fn recommend_page(
    State(state): State<SharedState>,
    Query(params): Query<RecommendParams>,
) -> Result<(StatusCode, Html<String>), AppError> {
    let titles = state.recommender.titles();
    let label = state.recommender.retailer().button_label();

    match cards_for(&state, &params.title) {
        Ok(cards) => {
            info!("Rendered {} recommendations for {:?}", cards.len(), params.title);
            let view = PageView::new(titles, label).with_results(&params.title, &cards);
            Ok((StatusCode::OK, Html(render(&state, &view)?)))
        }
        Err(RecommendError::TitleNotFound(_)) => {
            debug!("Title not found: {:?}", params.title);
            let view = PageView::new(titles, label).with_message(NOT_FOUND_MESSAGE);
            Ok((StatusCode::NOT_FOUND, Html(render(&state, &view)?)))
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /api/titles`
pub async fn list_titles(State(state): State<SharedState>) -> Json<TitlesResponse> {
    let titles = state.recommender.titles().to_vec();
    Json(TitlesResponse {
        count: titles.len(),
        titles,
    })
}

/// `POST /api/recommend`
pub async fn recommend(
    State(state): State<SharedState>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::InvalidInput {
            field: "title".to_string(),
            reason: "must not be empty".to_string(),
        });
    }

    let results = cards_for(&state, &req.title)?;
    info!("Returned {} recommendations for {:?}", results.len(), req.title);

    Ok(Json(RecommendResponse {
        query: req.title,
        count: results.len(),
        results,
    }))
}

/// `GET /health`
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        titles: state.recommender.titles().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::{build_router, AppState, ErrorResponse};
    use super::*;
    use crate::models::{BookDetails, RecommendedBook};
    use crate::recommend::{RecommendResult, Recommender};
    use crate::retailer::RetailerSearch;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Recommends every title in list order, itself first.
    struct FixedRecommender {
        titles: Vec<String>,
        retailer: RetailerSearch,
    }

    impl FixedRecommender {
        fn new() -> Self {
            Self {
                titles: ["The Hobbit", "Emma", "Dune", "Persuasion"]
                    .iter()
                    .map(|t| t.to_string())
                    .collect(),
                retailer: RetailerSearch::default(),
            }
        }
    }

    impl Recommender for FixedRecommender {
        fn recommend(&self, title: &str) -> RecommendResult<Vec<String>> {
            if !self.titles.iter().any(|t| t == title) {
                return Err(RecommendError::TitleNotFound(title.to_string()));
            }
            let mut out = vec![title.to_string()];
            out.extend(self.titles.iter().filter(|t| *t != title).cloned());
            Ok(out)
        }

        fn recommend_books(&self, title: &str) -> RecommendResult<Vec<RecommendedBook>> {
            Ok(self
                .recommend(title)?
                .into_iter()
                .enumerate()
                .map(|(i, t)| RecommendedBook {
                    details: self.lookup(&t),
                    distance: i as f32,
                    search_url: self.retailer.search_url(&t),
                    title: t,
                })
                .collect())
        }

        fn lookup(&self, title: &str) -> Option<BookDetails> {
            (title != "Persuasion").then(|| BookDetails {
                author: format!("Author of {}", title),
                year: "1999".to_string(),
                cover_url: "http://covers/x.jpg".to_string(),
            })
        }

        fn titles(&self) -> &[String] {
            &self.titles
        }

        fn retailer(&self) -> &RetailerSearch {
            &self.retailer
        }
    }

    fn app() -> axum::Router {
        let state = AppState::new(Arc::new(FixedRecommender::new())).unwrap();
        build_router(Arc::new(state), None)
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains(r#"<option value="The Hobbit" selected>"#));
        assert!(html.contains("Recommend"));
    }

    #[tokio::test]
    async fn test_recommend_page_results() {
        let response = app()
            .oneshot(
                Request::get("/recommend?title=Dune")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("Recommended Books:"));
        assert_eq!(html.matches(r#"class="book-card""#).count(), 4);
        assert_eq!(html.matches(r#"class="book-row""#).count(), 2);
        assert!(html.contains("Author: <strong>Unknown</strong>"));
    }

    #[tokio::test]
    async fn test_recommend_page_unknown_title() {
        let response = app()
            .oneshot(
                Request::get("/recommend?title=Nonexistent%20Book%20XYZ")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains(NOT_FOUND_MESSAGE));
        assert!(!html.contains("Recommended Books:"));
    }

    #[tokio::test]
    async fn test_api_titles() {
        let response = app()
            .oneshot(Request::get("/api/titles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: TitlesResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.count, 4);
        assert_eq!(body.titles[0], "The Hobbit");
    }

    #[tokio::test]
    async fn test_api_recommend() {
        let response = app()
            .oneshot(post_json("/api/recommend", r#"{"title": "The Hobbit"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: RecommendResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.query, "The Hobbit");
        assert_eq!(body.count, 4);
        assert_eq!(body.results[0].title, "The Hobbit");
        assert_eq!(
            body.results[0].search_url,
            "https://www.amazon.com/s?k=The+Hobbit"
        );
        assert_eq!(body.results[3].author, "Unknown");
    }

    #[tokio::test]
    async fn test_api_recommend_not_found() {
        let response = app()
            .oneshot(post_json("/api/recommend", r#"{"title": "Nonexistent Book XYZ"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.code, "TITLE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_api_recommend_empty_title() {
        let response = app()
            .oneshot(post_json("/api/recommend", r#"{"title": "  "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.code, "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.titles, 4);
    }
}
