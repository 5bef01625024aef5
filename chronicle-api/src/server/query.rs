use crate::server::ServerError;
use axum::extract::{FromRequestParts, Query as AxumQuery};
use serde::Deserialize;

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// The `?page=` parameter of paginated listings, kept raw so that any value resolves to a page.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    #[must_use]
    pub fn requested(&self) -> Option<&str> {
        self.page.as_deref()
    }
}
