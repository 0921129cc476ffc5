//! Placeholder pages for the two gated routes. The web frontend is served
//! separately; these only exist so the session gate has something to guard.

use axum::extract::Query;
use axum::response::Html;
use serde::Deserialize;

use charla_shared::constants::APP_NAME;

#[derive(Deserialize)]
pub(super) struct ChatQuery {
    phone: Option<String>,
}

pub(super) async fn landing() -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><title>{APP_NAME}</title></head>\
         <body data-page=\"landing\"></body></html>"
    ))
}

pub(super) async fn chat(Query(query): Query<ChatQuery>) -> Html<String> {
    // Only digits are echoed back into the page.
    let phone: String = query
        .phone
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    Html(format!(
        "<!DOCTYPE html><html><head><title>{APP_NAME}</title></head>\
         <body data-page=\"chat\" data-phone=\"{phone}\"></body></html>"
    ))
}
