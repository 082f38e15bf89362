use crate::api::error::UploadError;
use crate::infrastructure::multipart::parse_form;
use crate::models::FormData;
use crate::services::context::RequestContext;
use crate::services::extractor::Extraction;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// The parsed request body, cached in the request extensions so chained
/// upload middlewares parse it only once.
#[derive(Debug, Clone)]
pub struct ParsedForm(pub Arc<FormData>);

/// Runs an [`Extraction`] and publishes the result as
/// `Extension<UploadState>` for the next handler.
///
/// ```ignore
/// let storage = MemoryStorage::default();
/// Router::new().route(
///     "/upload",
///     post(handler).layer(from_fn_with_state(storage.single("file"), upload_middleware)),
/// );
/// ```
pub async fn upload_middleware(
    State(extraction): State<Extraction>,
    req: Request,
    next: Next,
) -> Result<Response, UploadError> {
    let (mut parts, body) = req.into_parts();

    let cached = parts
        .extensions
        .get::<ParsedForm>()
        .map(|parsed| parsed.0.clone());
    let (form, body) = match cached {
        Some(form) => (form, body),
        None => {
            let form = Arc::new(parse_form(&parts, body).await?);
            parts.extensions.insert(ParsedForm(form.clone()));
            (form, Body::empty())
        }
    };

    let ctx = RequestContext::from_parts(&parts);
    if let Err(e) = extraction.run(&ctx, &form).await {
        tracing::warn!("Upload extraction failed: {}", e);
        return Err(e);
    }

    parts.extensions.insert(ctx.into_state());
    Ok(next.run(Request::from_parts(parts, body)).await)
}
