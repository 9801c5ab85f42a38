//! HTTP handler for the upload form.
//! Streams the `file` part into the configured `UploadStore` chunk by chunk
//! and answers in plain text. The upload is committed only after the whole
//! form has been read and validated.

use crate::{
    AppState,
    errors::{AppError, ValidationError},
    models::upload::UploadedFile,
    services::storage_service::{StagedUpload, UploadStore},
};
use axum::extract::{Multipart, State, multipart::MultipartRejection};

/// Name of the form field carrying the file.
pub const FILE_FIELD: &str = "file";

/// `POST /upload`
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, AppError> {
    let upload = receive_upload(state.store.as_ref(), multipart?).await?;

    tracing::info!(
        original_name = %upload.original_name,
        stored_name = %upload.stored_name,
        size_bytes = upload.size_bytes,
        "stored upload"
    );

    Ok(format!("Arquivo {} enviado com sucesso!", upload.original_name))
}

struct Pending {
    original_name: String,
    size_bytes: u64,
    upload: Box<dyn StagedUpload>,
}

/// Read the form, stream the single `file` attachment into `store` and
/// commit it. Any rejection discards what was staged.
pub async fn receive_upload(
    store: &dyn UploadStore,
    mut multipart: Multipart,
) -> Result<UploadedFile, AppError> {
    let mut pending: Option<Pending> = None;

    if let Err(err) = stage_form(store, &mut multipart, &mut pending).await {
        if let Some(staged) = pending.take() {
            staged.upload.abort().await;
        }
        return Err(err);
    }

    let Pending {
        original_name,
        size_bytes,
        upload,
    } = pending.ok_or(ValidationError::MissingField(FILE_FIELD))?;
    let stored_name = upload.commit().await?;

    Ok(UploadedFile {
        original_name,
        stored_name,
        size_bytes,
    })
}

/// Walk every part of the form.
///
/// Parts without a filename are plain text fields and are skipped, whatever
/// their name. An attachment under any name other than `file`, or a second
/// `file` attachment, rejects the request.
async fn stage_form(
    store: &dyn UploadStore,
    multipart: &mut Multipart,
    pending: &mut Option<Pending>,
) -> Result<(), AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(ValidationError::from)? {
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        match field.name() {
            Some(FILE_FIELD) => {}
            other => {
                let name = other.unwrap_or_default().to_owned();
                return Err(ValidationError::UnexpectedField(name).into());
            }
        }
        if pending.is_some() {
            return Err(ValidationError::DuplicateField(FILE_FIELD).into());
        }

        let upload = store.begin(&original_name).await?;
        let staged = pending.insert(Pending {
            original_name,
            size_bytes: 0,
            upload,
        });
        while let Some(chunk) = field.chunk().await.map_err(ValidationError::from)? {
            staged.upload.write_chunk(&chunk).await?;
            staged.size_bytes += chunk.len() as u64;
        }
    }
    Ok(())
}
