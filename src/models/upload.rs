//! Represents a single file received through the upload form.

/// One accepted multipart attachment, as persisted by the store.
///
/// `original_name` is whatever the client put in the `filename` parameter of
/// the part's `Content-Disposition`. It is not sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name supplied by the client.
    pub original_name: String,

    /// Name the bytes were written under.
    pub stored_name: String,

    /// Number of body bytes received.
    pub size_bytes: u64,
}

/// Build the on-disk name for an upload: `<epoch-millis>-<original_name>`.
///
/// Two uploads with the same original name in the same millisecond map to
/// the same stored name.
pub fn stored_name(epoch_millis: i64, original_name: &str) -> String {
    format!("{}-{}", epoch_millis, original_name)
}
