mod certificados;

pub use certificados::{
    CreateCertificateRequest, CreateUserRequest, QuickCreateRequest, Recipient,
    UpdateCertificateRequest,
};

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;

/// Thin client over the external certificates backend. Every method talks
/// plain JSON and maps transport problems into the portal's error kinds;
/// nothing above this layer sees a raw reqwest error.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Adds the bearer header when a token is available. Endpoints stay
    /// usable without one; the backend decides what anonymous calls see.
    pub(crate) fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and returns the parsed JSON body of a 2xx answer.
    pub(crate) async fn send_json(&self, builder: RequestBuilder) -> Result<Value, AppError> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::Network(error_message(status, &text)));
        }

        serde_json::from_str(&text).map_err(|e| AppError::MalformedResponse(e.to_string()))
    }

    /// `POST /auth/login` with the sanitized cedula. The payload is handed
    /// back raw; the session normalizer owns interpreting its shape.
    pub async fn login(&self, cedula: &str) -> Result<Value, AppError> {
        debug!(%cedula, "backend login");
        self.send_json(
            self.client
                .post(self.url("/auth/login"))
                .json(&serde_json::json!({ "cedula": cedula })),
        )
        .await
    }

    /// `POST /auth/logout`. Callers treat failures as non-fatal.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "logout rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Pulls the backend's `error.message` out of a failure body when there is
/// one; otherwise reports the bare status.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.pointer("/message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("request failed with status {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_the_backend_detail() {
        let body = r#"{"error":{"message":"certificado no existe"}}"#;
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, body),
            "certificado no existe"
        );
    }

    #[test]
    fn error_message_falls_back_to_the_status() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "request failed with status 502 Bad Gateway"
        );
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, r#"{"message":"sin permisos"}"#),
            "sin permisos"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_a_network_error() {
        let api = ApiClient::new("http://127.0.0.1:9/", Duration::from_millis(400));
        assert_eq!(api.url("/auth/login"), "http://127.0.0.1:9/auth/login");
        let err = api.login("1234567890").await.expect_err("must fail");
        assert!(matches!(err, AppError::Network(_)));
    }
}
