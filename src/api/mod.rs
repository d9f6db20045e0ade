pub mod bindings;
pub mod helpers;
pub mod packages;
pub mod projects;

use axum::Router;

use crate::store::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(bindings::router())
        .merge(packages::router())
}
