use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiClient;
use crate::certificates::Certificate;
use crate::error::AppError;

/// Recipient entry as the backend reports it on a certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub cedula: Option<String>,
}

// The backend sends `id`, `_id` or both, and ids are sometimes numbers.
// A derive cannot express that, so the id is reconciled by hand.
impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            id: Option<Value>,
            #[serde(rename = "_id", default)]
            mongo_id: Option<Value>,
            #[serde(default)]
            name: String,
            #[serde(default)]
            email: Option<String>,
            #[serde(default)]
            cedula: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let id = raw
            .id
            .as_ref()
            .and_then(id_string)
            .or_else(|| raw.mongo_id.as_ref().and_then(id_string))
            .unwrap_or_default();
        Ok(Recipient {
            id,
            name: raw.name,
            email: raw.email,
            cedula: raw.cedula,
        })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificateRequest {
    pub course_name: String,
    pub institucion: String,
    pub destinatario_id: String,
    pub course_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

/// Quick create accepts a single recipient, a list, or both.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickCreateRequest {
    pub course_name: String,
    pub institucion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destinatario_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCertificateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destinatario_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institucion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserRequest {
    pub cedula: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ApiClient {
    /// `GET /certificados/recipient?email=`: the signed-in user's list.
    pub async fn certificates_by_recipient(
        &self,
        email: &str,
        token: Option<&str>,
    ) -> Result<Vec<Certificate>, AppError> {
        let builder = Self::authorize(
            self.client
                .get(self.url("/certificados/recipient"))
                .query(&[("email", email)]),
            token,
        );
        let payload = self.send_json(builder).await?;
        extract_certificates(&payload)
    }

    /// `GET /certificados`: the admin list, with optional paging and a
    /// status filter. Returns the certificates plus the backend's total.
    pub async fn all_certificates(
        &self,
        token: Option<&str>,
        page: Option<u32>,
        limit: Option<u32>,
        status: Option<&str>,
    ) -> Result<(Vec<Certificate>, u64), AppError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }

        let builder = Self::authorize(
            self.client.get(self.url("/certificados")).query(&query),
            token,
        );
        let payload = self.send_json(builder).await?;
        let certificates = extract_certificates(&payload)?;
        let total = payload
            .pointer("/pagination/total")
            .and_then(Value::as_u64)
            .unwrap_or(certificates.len() as u64);
        Ok((certificates, total))
    }

    /// `GET /certificados/{id}/download`: the issued document as raw
    /// bytes. The caller wraps them for the browser.
    pub async fn download_certificate(
        &self,
        id: &str,
        token: Option<&str>,
    ) -> Result<Vec<u8>, AppError> {
        let builder = Self::authorize(
            self.client
                .get(self.url(&format!("/certificados/{}/download", id))),
            token,
        );
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Network(super::error_message(status, &body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::MalformedResponse(
                "backend returned an empty document".into(),
            ));
        }
        Ok(bytes.to_vec())
    }

    /// `POST /certificados/`.
    pub async fn create_certificate(
        &self,
        request: &CreateCertificateRequest,
        token: Option<&str>,
    ) -> Result<Value, AppError> {
        let builder = Self::authorize(
            self.client.post(self.url("/certificados/")).json(request),
            token,
        );
        self.send_json(builder).await
    }

    /// `POST /certificados/quick`.
    pub async fn quick_create_certificate(
        &self,
        request: &QuickCreateRequest,
        token: Option<&str>,
    ) -> Result<Value, AppError> {
        let builder = Self::authorize(
            self.client.post(self.url("/certificados/quick")).json(request),
            token,
        );
        self.send_json(builder).await
    }

    /// `PUT /certificados/{id}`.
    pub async fn update_certificate(
        &self,
        id: &str,
        request: &UpdateCertificateRequest,
        token: Option<&str>,
    ) -> Result<Value, AppError> {
        let builder = Self::authorize(
            self.client
                .put(self.url(&format!("/certificados/{}", id)))
                .json(request),
            token,
        );
        self.send_json(builder).await
    }

    /// `GET /certificados/{id}/users`: recipients currently assigned.
    pub async fn assigned_users(
        &self,
        id: &str,
        token: Option<&str>,
    ) -> Result<Vec<Recipient>, AppError> {
        let builder = Self::authorize(
            self.client
                .get(self.url(&format!("/certificados/{}/users", id))),
            token,
        );
        let payload = self.send_json(builder).await?;
        let data = payload
            .pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(data
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect())
    }

    /// `POST /certificados/{id}/assign` with `{userIds}`. Reassignment is
    /// the only mutation the client performs on an issued certificate.
    pub async fn assign_recipients(
        &self,
        id: &str,
        user_ids: &[String],
        token: Option<&str>,
    ) -> Result<(), AppError> {
        let builder = Self::authorize(
            self.client
                .post(self.url(&format!("/certificados/{}/assign", id)))
                .json(&serde_json::json!({ "userIds": user_ids })),
            token,
        );
        self.send_json(builder).await.map(|_| ())
    }

    /// `POST /users` (admin).
    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
        token: Option<&str>,
    ) -> Result<Value, AppError> {
        let builder = Self::authorize(self.client.post(self.url("/users")).json(request), token);
        self.send_json(builder).await
    }

    /// `GET /users` (admin).
    pub async fn list_users(&self, token: Option<&str>) -> Result<Vec<Recipient>, AppError> {
        let builder = Self::authorize(self.client.get(self.url("/users")), token);
        let payload = self.send_json(builder).await?;
        let data = payload
            .pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(data
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect())
    }
}

/// Certificate lists arrive as `{success, data: [...]}`; entries the model
/// cannot make sense of are skipped rather than failing the whole list.
fn extract_certificates(payload: &Value) -> Result<Vec<Certificate>, AppError> {
    let data = payload
        .pointer("/data")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::MalformedResponse("certificate list has no data array".into()))?;
    Ok(data.iter().filter_map(Certificate::from_backend).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quick_create_omits_empty_optionals() {
        let request = QuickCreateRequest {
            course_name: "Marketing Digital".into(),
            institucion: "Movilis".into(),
            destinatario_id: None,
            user_ids: vec![],
            course_description: None,
            expiration_date: None,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        let obj = value.as_object().expect("object");
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("courseName"));
        assert!(obj.contains_key("institucion"));
    }

    #[test]
    fn quick_create_keeps_the_recipient_list() {
        let request = QuickCreateRequest {
            course_name: "Comunicación".into(),
            institucion: "Movilis".into(),
            destinatario_id: Some("u1".into()),
            user_ids: vec!["u1".into(), "u2".into()],
            course_description: Some("Curso corto".into()),
            expiration_date: Some("2026-12-31".into()),
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["destinatarioId"], json!("u1"));
        assert_eq!(value["userIds"], json!(["u1", "u2"]));
        assert_eq!(value["expirationDate"], json!("2026-12-31"));
    }

    #[test]
    fn extract_certificates_requires_a_data_array() {
        let ok = json!({ "success": true, "data": [] });
        assert!(extract_certificates(&ok).expect("empty list").is_empty());

        let bad = json!({ "success": true });
        assert!(matches!(
            extract_certificates(&bad),
            Err(AppError::MalformedResponse(_))
        ));
    }

    #[test]
    fn recipient_accepts_mongo_style_ids() {
        let recipient: Recipient =
            serde_json::from_value(json!({ "_id": "abc", "name": "Ana" })).expect("deserialize");
        assert_eq!(recipient.id, "abc");
        assert_eq!(recipient.name, "Ana");
    }

    #[test]
    fn recipient_reconciles_duplicate_and_numeric_ids() {
        let both: Recipient =
            serde_json::from_value(json!({ "id": "u1", "_id": "m1", "name": "Ana" }))
                .expect("deserialize");
        assert_eq!(both.id, "u1");

        let numeric: Recipient =
            serde_json::from_value(json!({ "id": 42, "name": "Ana" })).expect("deserialize");
        assert_eq!(numeric.id, "42");
    }
}
