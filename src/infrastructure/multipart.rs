use crate::api::error::UploadError;
use crate::models::{FieldValue, FormData, FormFile};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header::CONTENT_TYPE, request::Parts};
use tracing::debug;

/// Reads a request body into [`FormData`].
///
/// Multipart parts carrying a `filename` become file values, every other
/// part is text. Urlencoded bodies only yield text; any other content type
/// yields an empty form.
pub async fn parse_form(parts: &Parts, body: Body) -> Result<FormData, UploadError> {
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok());

    let Some(content_type) = content_type else {
        return Ok(FormData::new());
    };

    // Extensions are forwarded so a route's DefaultBodyLimit still applies.
    let mut request = Request::new(body);
    *request.headers_mut() = parts.headers.clone();
    *request.extensions_mut() = parts.extensions.clone();

    if content_type.essence_str() == mime::MULTIPART_FORM_DATA.essence_str() {
        let multipart = Multipart::from_request(request, &()).await?;
        read_multipart(multipart).await
    } else if content_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
        let body = Bytes::from_request(request, &()).await?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)?;

        let mut form = FormData::new();
        for (name, value) in pairs {
            form.append(name, FieldValue::Text(value));
        }
        Ok(form)
    } else {
        debug!("Ignoring body with content type {}", content_type);
        Ok(FormData::new())
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormData, UploadError> {
    let mut form = FormData::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        let value = match file_name {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                debug!("Parsed file part '{}' ({} bytes)", name, data.len());
                FieldValue::File(FormFile::new(file_name, content_type, data))
            }
            None => FieldValue::Text(field.text().await?),
        };

        form.append(name, value);
    }

    Ok(form)
}
