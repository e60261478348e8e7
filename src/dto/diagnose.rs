use serde::Serialize;
use utoipa::ToSchema;

/// Returned instead of an error when the detector cannot produce a result, so the
/// client can render an empty diagnosis.
#[derive(Debug, Serialize, ToSchema)]
pub struct DiagnoseUnavailable {
    pub detected: bool,
    pub message: String,
    #[schema(value_type = Vec<Object>)]
    pub products: Vec<serde_json::Value>,
}

impl DiagnoseUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            detected: false,
            message: message.into(),
            products: Vec::new(),
        }
    }
}

/// Multipart body of a diagnosis request: one `file` part holding the photo.
#[derive(ToSchema)]
pub struct DiagnoseForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
