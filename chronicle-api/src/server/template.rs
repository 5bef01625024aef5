//! Hand-off to the rendering collaborator.
//!
//! Every page is one [`View`] naming its template. The rendered envelope carries the template
//! name, the current year shared by all pages, and the view model itself.

use crate::server::json::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::UtcDateTime;

pub trait View: Serialize {
    const TEMPLATE: &'static str;
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Template<V>(pub V);

#[derive(Serialize)]
struct Rendered<'a, V> {
    template: &'static str,
    year: i32,
    context: &'a V,
}

impl<V: View> IntoResponse for Template<V> {
    fn into_response(self) -> Response {
        Json(Rendered {
            template: V::TEMPLATE,
            year: UtcDateTime::now().year(),
            context: &self.0,
        })
        .into_response()
    }
}
