use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use rust_embed::RustEmbed;
use std::path::PathBuf;

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Serve a page from the static directory when configured, else from the
/// embedded assets. `fallback` is sent as plain text if neither has it.
pub async fn serve_page(name: &str, static_dir: Option<&str>, fallback: &'static str) -> Response {
    if let Some(dir) = static_dir {
        let file_path = PathBuf::from(dir).join(name);
        if let Ok(content) = tokio::fs::read(&file_path).await {
            let mime_type = from_path(&file_path).first_or_octet_stream();
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime_type.to_string())],
                content,
            )
                .into_response();
        }
    }

    match Assets::get(name) {
        Some(content) => {
            let mime_type = from_path(name).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime_type.to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::OK, fallback).into_response(),
    }
}
