//! In-process stand-in for the weather provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{StatusCode, Uri};
use axum::Router;

/// Three forecast days for New York, current temperature 72°F.
pub const THREE_DAY_BODY: &str = r#"{
    "current_condition": [{"temp_F": "72", "temp_C": "22", "weatherDesc": [{"value": "Sunny"}]}],
    "nearest_area": [{"areaName": [{"value": "New York"}]}],
    "request": [{"query": "10001", "type": "Zipcode"}],
    "weather": [
        {"date": "2024-03-09", "maxtempF": "58", "mintempF": "41"},
        {"date": "2024-03-10", "maxtempF": "55", "mintempF": "40"},
        {"date": "2024-03-11", "maxtempF": "60", "mintempF": "45"}
    ]
}"#;

/// A provider that knows nothing about the location.
pub const EMPTY_BODY: &str = r#"{"current_condition": [], "nearest_area": [], "weather": []}"#;

/// Serves canned bodies keyed by request path; unknown paths get 404.
pub struct StubProvider {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl StubProvider {
    pub async fn spawn(routes: Vec<(&'static str, StatusCode, &'static str)>) -> Self {
        let routes: Arc<HashMap<&'static str, (StatusCode, &'static str)>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path, (status, body)))
                .collect(),
        );
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let app = Router::new().fallback(move |uri: Uri| {
            let routes = Arc::clone(&routes);
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                routes
                    .get(uri.path())
                    .map_or((StatusCode::NOT_FOUND, "{}"), |(status, body)| (*status, *body))
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
