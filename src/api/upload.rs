use std::collections::HashMap;

use axum::extract::Multipart;

use crate::api::errors::ApiError;

/// A CSV upload: the `file` part plus any text fields sent alongside it.
pub(crate) struct CsvUpload {
    pub(crate) file_name: Option<String>,
    pub(crate) contents: Vec<u8>,
    pub(crate) fields: HashMap<String, String>,
}

impl CsvUpload {
    /// Trimmed, non-empty text field.
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
    }
}

pub(crate) async fn read_csv_upload(
    mut multipart: Multipart,
    max_upload_size_mb: u64,
) -> Result<CsvUpload, ApiError> {
    let max_bytes = max_upload_size_mb * 1024 * 1024;
    let mut contents: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut fields = HashMap::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
            {
                if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "File size exceeds {max_upload_size_mb}MB limit"
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            contents = Some(bytes);
        } else if !name.is_empty() {
            let text = field
                .text()
                .await
                .map_err(|_| ApiError::BadRequest(format!("Invalid value for {name}")))?;
            fields.insert(name, text);
        }
    }

    let contents = contents.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    if contents.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    Ok(CsvUpload { file_name, contents, fields })
}
