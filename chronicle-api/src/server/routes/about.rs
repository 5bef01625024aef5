use crate::server::{
    ServerRouter,
    template::Template,
    views::{AboutAuthorView, AboutTechView},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(about_author)
        .typed_get(about_tech)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/author/")]
struct AboutAuthorPath;

async fn about_author(_: AboutAuthorPath) -> Template<AboutAuthorView> {
    Template(AboutAuthorView {
        title: "About the author",
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/tech/")]
struct AboutTechPath;

async fn about_tech(_: AboutTechPath) -> Template<AboutTechView> {
    Template(AboutTechView {
        title: "Technologies",
    })
}
