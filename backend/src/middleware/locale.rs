//! Accept-Language negotiation
//!
//! The locale is stored in the thread-local and in the request extensions.
//! A task can move between worker threads while a handler awaits its body, so
//! handlers re-apply [`RequestLocale`] before rendering anything localized.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::ACCEPT_LANGUAGE,
    middleware::Next,
    response::Response,
};

use crate::utils::{i18n::normalize_locale, set_locale};

/// Locale negotiated for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLocale(pub String);

impl RequestLocale {
    pub fn apply(&self) -> &str {
        set_locale(&self.0);
        &self.0
    }
}

/// Falls back to `showplan.default_locale` when the header is absent
pub async fn locale_middleware(
    State(state): State<Arc<crate::AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let locale = match req.headers().get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()) {
        Some(header) => normalize_locale(header),
        None => state.config.showplan.default_locale.clone(),
    };

    set_locale(&locale);
    req.extensions_mut().insert(RequestLocale(locale));

    next.run(req).await
}
