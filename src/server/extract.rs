use axum::http::StatusCode;

use super::models::ExtractResponse;
use super::state::ServerState;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

/// Validates the upload and runs the extraction pipeline. Blocking; the
/// handler wraps it in spawn_blocking.
pub(crate) fn extract_request(
    state: &ServerState,
    pdf_bytes: &[u8],
) -> Result<ExtractResponse, ServerError> {
    if pdf_bytes.is_empty() {
        return Err(ServerError::bad_request("Sem ficheiro"));
    }
    if !is_pdf(pdf_bytes) {
        return Err(ServerError::bad_request("O ficheiro enviado não é um PDF"));
    }

    let extraction = crate::process_pdf(pdf_bytes, &state.settings)?;
    Ok(ExtractResponse {
        ok: true,
        fields: extraction.fields,
        image_data_url: extraction.image_data_url,
    })
}

fn is_pdf(bytes: &[u8]) -> bool {
    infer::get(bytes)
        .map(|kind| kind.mime_type() == "application/pdf")
        .unwrap_or(false)
        || bytes.starts_with(b"%PDF-")
}
