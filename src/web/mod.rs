pub mod backoffice;
pub mod frontoffice;
pub mod templates;

use axum::Router;

use crate::{auth::web::web_auth_routes, state::AppState};

/// Server-rendered pages: sign-in, public catalogue and the backoffice.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(web_auth_routes())
        .merge(frontoffice::frontoffice_routes())
        .nest("/backoffice", backoffice::backoffice_routes())
}
