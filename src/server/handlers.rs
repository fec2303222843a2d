use super::error::Error;
use super::flash::{clear_flash_cookie, take_flash};
use super::scratch::{has_svg_extension, upload_paths, ScratchFile};
use super::AppState;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Media type for STL downloads.
pub const STL_MEDIA_TYPE: &str = "application/sla";

/// `GET /`: the upload form, with any pending flash message.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let message = take_flash(&state.flash, &headers);
    match state.render_index(message.as_deref()) {
        Ok(html) => {
            let mut response = Html(html).into_response();
            if message.is_some() {
                response
                    .headers_mut()
                    .insert(SET_COOKIE, clear_flash_cookie());
            }
            response
        }
        Err(e) => {
            tracing::error!("Failed to render upload page: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub openscad_available: bool,
}

/// `GET /health`: liveness plus whether OpenSCAD resolves.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let tool = state.converter.tool_status().await;
    Json(HealthResponse {
        status: "healthy",
        message: "svg2stl is running",
        openscad_available: tool.available,
    })
}

/// `POST /upload`: convert the `file` field and send back the STL.
///
/// A body that is not `multipart/form-data` at all is treated like a form
/// without a file.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(%request_id, "upload is not a multipart form: {rejection}");
            return Error::no_file().into_response_with(&state);
        }
    };
    match handle_upload(&state, multipart)
        .instrument(info_span!("upload", %request_id))
        .await
    {
        Ok(response) => response,
        Err(e) => e.into_response_with(&state),
    }
}

async fn handle_upload(state: &AppState, mut multipart: Multipart) -> Result<Response, Error> {
    let limit = state.config.max_upload_bytes;

    // ── Step 1: Find and persist the file part ───────────────────────────
    let mut persisted = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::from_multipart(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        if original.is_empty() {
            return Err(Error::no_file());
        }
        if !has_svg_extension(&original) {
            return Err(Error::wrong_type());
        }

        let paths = upload_paths(&state.config.scratch_dir, &original);
        let guard = ScratchFile::new(&paths.upload);
        let size = persist_field(field, &paths.upload, limit).await?;
        info!(original = %original, size, upload = %paths.upload.display(), "upload received");
        persisted = Some((guard, paths));
        break;
    }
    let Some((upload_guard, paths)) = persisted else {
        return Err(Error::no_file());
    };

    // ── Step 2: Convert; the upload is deleted whatever the outcome ──────
    // The output guard exists before OpenSCAD runs so a partial mesh left
    // behind by a failed run is removed too.
    let output_guard = ScratchFile::new(&paths.output);
    let result = state.converter.convert(&paths.upload, &paths.output).await;
    drop(upload_guard);
    let output = result?;

    // ── Step 3: Stream the mesh back ─────────────────────────────────────
    stream_mesh(output_guard, &paths.download_name, output.output_bytes).await
}

/// Write one multipart field to `path`, chunk by chunk.
async fn persist_field(mut field: Field<'_>, path: &Path, limit: usize) -> Result<u64, Error> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::internal("create upload file", e))?;
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| Error::from_multipart(e, limit))?
    {
        size += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::internal("write upload file", e))?;
    }
    file.flush()
        .await
        .map_err(|e| Error::internal("write upload file", e))?;
    Ok(size)
}

/// Attach `guard`'s file as the response body; the file is deleted when the
/// body has been sent or abandoned.
async fn stream_mesh(guard: ScratchFile, download_name: &str, len: u64) -> Result<Response, Error> {
    let file = tokio::fs::File::open(guard.path())
        .await
        .map_err(|e| Error::internal("open converted mesh", e))?;
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _owner = &guard;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, STL_MEDIA_TYPE)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{download_name}\""),
        )
        .header(CONTENT_LENGTH, len)
        .body(Body::from_stream(stream))
        .map_err(|e| Error::internal("build download response", e))
}
