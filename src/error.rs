use thiserror::Error;

use crate::pdf::RenderError;

/// Error taxonomy for the portal core. Handlers convert these into short,
/// retry-able messages; raw transport errors stay out of the page layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("identifier not found")]
    NotFound,

    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::NotFound => "Cédula no encontrada",
            AppError::Network(_) => "Error de conexión. Verifica tu conexión a internet.",
            AppError::MalformedResponse(_) => "Error del servidor. Intenta más tarde.",
            AppError::Render(_) => "Error al descargar el certificado",
        }
    }
}
