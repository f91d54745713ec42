use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

use crate::certificates::{self, Certificate};
use crate::error::AppError;
use crate::pdf::RenderError;
use crate::state::AppState;

pub async fn session_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(state.session.snapshot().await)
}

pub async fn clear_session_error(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.clear_error().await;
    axum::Json(serde_json::json!({ "success": true }))
}

#[derive(Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    codigo: String,
}

pub async fn verificar_codigo(Query(params): Query<VerifyParams>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "codigo": params.codigo,
        "valido": certificates::verify_code(&params.codigo),
    }))
}

pub async fn download_certificado(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(user) = state.session.user().await else {
        return axum::response::Redirect::to("/login").into_response();
    };

    let certificados = super::pages::user_certificates(&state, &user).await;
    let Some(certificado) = certificados.into_iter().find(|c| c.id == id) else {
        return error_json(
            axum::http::StatusCode::NOT_FOUND,
            "Certificado no encontrado",
        );
    };

    // policy gate runs before any network call
    if let Err(blocked) = certificado.check_downloadable() {
        return error_json(axum::http::StatusCode::FORBIDDEN, blocked.user_message());
    }

    let token = state.session.token();
    let bytes = match state
        .api
        .download_certificate(&certificado.id, token.as_deref())
        .await
    {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, certificado = %certificado.id, "backend download unavailable, rendering overlay");
            match render_overlay(&state, &user.nombre_completo) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(%err, "overlay render failed");
                    return error_json(
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                        err.user_message(),
                    );
                }
            }
        }
    };

    attachment(bytes, &certificado.download_file_name(), "application/pdf")
}

/// Bulk bundle for the admin view: every certificate held by exactly one
/// recipient, zipped. Ambiguous certificates are skipped, never guessed.
pub async fn download_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(user) = state.session.user().await else {
        return axum::response::Redirect::to("/login").into_response();
    };
    if !user.is_admin() {
        return axum::response::Redirect::to("/dashboard").into_response();
    }

    let token = state.session.token();
    let certificados = match state
        .api
        .all_certificates(token.as_deref(), None, None, None)
        .await
    {
        Ok((certificados, _)) => certificados,
        Err(err) => {
            warn!(%err, "admin list unavailable for bulk download");
            return error_json(axum::http::StatusCode::BAD_GATEWAY, err.user_message());
        }
    };

    let mut zip_data = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_data));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);

        for certificado in certificados.iter().filter(|c| c.bulk_downloadable()) {
            let bytes = match certificate_bytes(&state, certificado, token.as_deref()).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(%err, certificado = %certificado.id, "skipping certificate in bundle");
                    continue;
                }
            };
            let _ = zip.start_file(certificado.download_file_name(), options);
            let _ = zip.write_all(&bytes);
        }

        let _ = zip.finish();
    }

    attachment(zip_data, "Certificados_Movilis.zip", "application/zip")
}

/// Backend document when available, local overlay for the single assigned
/// recipient otherwise.
async fn certificate_bytes(
    state: &AppState,
    certificado: &Certificate,
    token: Option<&str>,
) -> Result<Vec<u8>, AppError> {
    match state.api.download_certificate(&certificado.id, token).await {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            let Some(recipient) = certificado.assigned_users.first() else {
                return Err(err);
            };
            warn!(%err, certificado = %certificado.id, "backend download unavailable, rendering overlay");
            render_overlay(state, &recipient.name)
        }
    }
}

fn render_overlay(state: &AppState, nombre: &str) -> Result<Vec<u8>, AppError> {
    let template = std::fs::read(&state.config.template_file).map_err(|e| {
        AppError::Render(RenderError::Template(format!(
            "plantilla no disponible: {}",
            e
        )))
    })?;
    // a missing font is fine; the renderer falls back to Helvetica
    let font = std::fs::read(&state.config.font_file).ok();
    crate::pdf::render_certificate(&template, font.as_deref(), nombre).map_err(AppError::Render)
}

fn attachment(bytes: Vec<u8>, filename: &str, content_type: &str) -> axum::response::Response {
    axum::response::Response::builder()
        .header("Content-Type", content_type)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(axum::body::Body::from(bytes))
        .unwrap()
        .into_response()
}

fn error_json(status: axum::http::StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        axum::Json(serde_json::json!({ "success": false, "error": message })),
    )
        .into_response()
}
