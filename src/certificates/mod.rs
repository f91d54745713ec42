use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::api::Recipient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateKind {
    Laboral,
    Ingresos,
    Capacitacion,
    Participacion,
    Competencia,
    Otro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Vigente,
    Vencido,
    Revocado,
    Pendiente,
}

/// An issued credential as the portal sees it: read-only except for
/// recipient reassignment, which happens backend-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub tipo: CertificateKind,
    pub titulo: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub fecha_emision: NaiveDate,
    #[serde(default)]
    pub fecha_vencimiento: Option<NaiveDate>,
    pub estado: CertificateStatus,
    pub entidad_emisora: String,
    pub codigo_verificacion: String,
    pub firmado: bool,
    #[serde(default)]
    pub assigned_users: Vec<Recipient>,
}

const DEMO_ID_PREFIX: &str = "cert-demo-";

/// Why a download request was refused without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBlocked {
    Revoked,
    DemoOnly,
}

impl DownloadBlocked {
    pub fn user_message(&self) -> &'static str {
        match self {
            DownloadBlocked::Revoked => "Un certificado revocado no se puede descargar",
            DownloadBlocked::DemoOnly => {
                "Los certificados de demostración no se pueden descargar"
            }
        }
    }
}

impl Certificate {
    /// Maps the admin backend's certificate shape onto the model. Entries
    /// without a usable id are dropped by the caller.
    pub fn from_backend(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let id = ["_id", "id"]
            .iter()
            .find_map(|key| match obj.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })?;

        let status_raw = obj.get("status").and_then(Value::as_str).unwrap_or("");
        let issued = status_raw == "issued";

        let assigned = ["assignedUsers", "usuariosAsignados"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array))
            .map(|users| {
                users
                    .iter()
                    .filter_map(|u| serde_json::from_value(u.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Some(Certificate {
            id,
            tipo: CertificateKind::Capacitacion,
            titulo: obj
                .get("courseName")
                .and_then(Value::as_str)
                .unwrap_or("Certificado")
                .to_string(),
            descripcion: obj
                .get("courseDescription")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            fecha_emision: obj
                .get("issueDate")
                .and_then(Value::as_str)
                .and_then(parse_backend_date)
                .unwrap_or_else(|| Utc::now().date_naive()),
            fecha_vencimiento: obj
                .get("expirationDate")
                .and_then(Value::as_str)
                .and_then(parse_backend_date),
            estado: if issued {
                CertificateStatus::Vigente
            } else {
                parse_status(status_raw)
            },
            entidad_emisora: obj
                .get("institucion")
                .and_then(Value::as_str)
                .unwrap_or("Movilis")
                .to_string(),
            codigo_verificacion: ["verificationCode", "certificateNumber"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string(),
            firmado: issued,
            assigned_users: assigned,
        })
    }

    pub fn is_demo(&self) -> bool {
        self.id.starts_with(DEMO_ID_PREFIX)
    }

    /// Gate applied before any download attempt. Must run before the
    /// network call so a revoked certificate never reaches the backend.
    pub fn check_downloadable(&self) -> Result<(), DownloadBlocked> {
        if self.estado == CertificateStatus::Revocado {
            return Err(DownloadBlocked::Revoked);
        }
        if self.is_demo() {
            return Err(DownloadBlocked::DemoOnly);
        }
        Ok(())
    }

    /// Bulk views only offer certificates held by exactly one recipient;
    /// zero or several make the target document ambiguous.
    pub fn bulk_downloadable(&self) -> bool {
        self.check_downloadable().is_ok() && self.assigned_users.len() == 1
    }

    /// Attachment name for the browser, matching the portal's historical
    /// `Titulo_Con_Guiones_CODIGO.pdf` convention.
    pub fn download_file_name(&self) -> String {
        format!(
            "{}_{}.pdf",
            self.titulo.split_whitespace().collect::<Vec<_>>().join("_"),
            self.codigo_verificacion
        )
    }
}

fn parse_status(raw: &str) -> CertificateStatus {
    match raw {
        "vigente" => CertificateStatus::Vigente,
        "vencido" => CertificateStatus::Vencido,
        "revocado" | "revoked" => CertificateStatus::Revocado,
        _ => CertificateStatus::Pendiente,
    }
}

/// Dates arrive either as plain `YYYY-MM-DD` or as full ISO datetimes.
fn parse_backend_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Verification codes from known issuing entities.
pub fn verify_code(codigo: &str) -> bool {
    const KNOWN_PREFIXES: &[&str] = &["MOV-", "SENA-", "ISI-", "ACT-"];
    KNOWN_PREFIXES.iter().any(|p| codigo.starts_with(p))
}

fn generated_code(label: &str) -> String {
    format!(
        "MOV-{}-{}",
        label,
        Uuid::new_v4().to_string()[..8].to_uppercase()
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

fn fixture(
    id: &str,
    tipo: CertificateKind,
    titulo: &str,
    descripcion: &str,
    emision: NaiveDate,
    vencimiento: Option<NaiveDate>,
    entidad: &str,
    codigo: &str,
) -> Certificate {
    Certificate {
        id: id.to_string(),
        tipo,
        titulo: titulo.to_string(),
        descripcion: Some(descripcion.to_string()),
        fecha_emision: emision,
        fecha_vencimiento: vencimiento,
        estado: CertificateStatus::Vigente,
        entidad_emisora: entidad.to_string(),
        codigo_verificacion: codigo.to_string(),
        firmado: true,
        assigned_users: Vec::new(),
    }
}

/// Per-cedula demo certificates, served when the backend is unreachable.
/// Unknown cedulas get the generic pair so the portal stays demonstrable.
pub fn demo_certificates_for(cedula: &str) -> Vec<Certificate> {
    match cedula {
        "1234567890" => vec![
            fixture(
                "cert-001",
                CertificateKind::Laboral,
                "Certificado Laboral",
                "Certifica la vinculación laboral con la empresa desde el 15 de enero de 2020.",
                date(2024, 1, 15),
                Some(date(2025, 1, 15)),
                "Movilis S.A.S",
                "MOV-2024-001-XYZ",
            ),
            fixture(
                "cert-002",
                CertificateKind::Ingresos,
                "Certificado de Ingresos y Retenciones",
                "Certificado de ingresos y retenciones del año fiscal 2023.",
                date(2024, 2, 28),
                None,
                "Movilis S.A.S",
                "MOV-2024-002-ABC",
            ),
            fixture(
                "cert-003",
                CertificateKind::Capacitacion,
                "Certificado de Capacitación en Seguridad",
                "Certifica la culminación exitosa del curso de seguridad industrial.",
                date(2023, 11, 20),
                Some(date(2024, 11, 20)),
                "Instituto de Seguridad Industrial",
                "ISI-2023-1234",
            ),
        ],
        "9876543210" => vec![
            fixture(
                "cert-004",
                CertificateKind::Laboral,
                "Certificado Laboral",
                "Certifica la vinculación laboral con la empresa.",
                date(2024, 3, 1),
                Some(date(2025, 3, 1)),
                "Movilis S.A.S",
                "MOV-2024-004-DEF",
            ),
            fixture(
                "cert-005",
                CertificateKind::Participacion,
                "Certificado de Participación - Congreso 2024",
                "Por su participación en el Congreso Nacional de Tecnología 2024.",
                date(2024, 5, 15),
                None,
                "Asociación Colombiana de Tecnología",
                "ACT-2024-5678",
            ),
        ],
        "1122334455" => vec![fixture(
            "cert-006",
            CertificateKind::Competencia,
            "Certificado de Competencia Laboral",
            "Certificación de competencias en gestión de proyectos.",
            date(2023, 8, 10),
            Some(date(2026, 8, 10)),
            "SENA",
            "SENA-2023-9012",
        )],
        _ => generic_certificates(),
    }
}

fn generic_certificates() -> Vec<Certificate> {
    let today = Utc::now().date_naive();
    vec![
        fixture(
            "cert-demo-001",
            CertificateKind::Capacitacion,
            "Certificado de Marketing Digital",
            "Certifica la aprobación del curso de Marketing Digital con énfasis en \
             estrategias de redes sociales y publicidad online.",
            today,
            today.checked_add_days(Days::new(365)),
            "Movilis S.A.S",
            &generated_code("MKT"),
        ),
        fixture(
            "cert-demo-002",
            CertificateKind::Capacitacion,
            "Certificado de Comunicación",
            "Certifica la aprobación del curso de Comunicación Efectiva y Relaciones Públicas.",
            today,
            None,
            "Movilis S.A.S",
            &generated_code("COM"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipient(id: &str) -> Recipient {
        Recipient {
            id: id.to_string(),
            name: "Ana".to_string(),
            email: None,
            cedula: None,
        }
    }

    #[test]
    fn from_backend_maps_an_issued_certificate() {
        let value = json!({
            "_id": "65fa12",
            "courseName": "Curso de Seguridad",
            "courseDescription": "Descripción",
            "issueDate": "2024-06-01T10:30:00+00:00",
            "expirationDate": "2025-06-01",
            "status": "issued",
            "institucion": "Movilis S.A.S",
            "verificationCode": "MOV-2024-XYZ",
            "assignedUsers": [{ "_id": "u1", "name": "Ana" }]
        });
        let cert = Certificate::from_backend(&value).expect("mapped");
        assert_eq!(cert.id, "65fa12");
        assert_eq!(cert.titulo, "Curso de Seguridad");
        assert_eq!(cert.estado, CertificateStatus::Vigente);
        assert!(cert.firmado);
        assert_eq!(cert.fecha_emision, date(2024, 6, 1));
        assert_eq!(cert.fecha_vencimiento, Some(date(2025, 6, 1)));
        assert_eq!(cert.assigned_users.len(), 1);
    }

    #[test]
    fn from_backend_tolerates_numeric_ids_and_missing_fields() {
        let cert = Certificate::from_backend(&json!({ "id": 42 })).expect("mapped");
        assert_eq!(cert.id, "42");
        assert_eq!(cert.titulo, "Certificado");
        assert_eq!(cert.estado, CertificateStatus::Pendiente);
        assert!(!cert.firmado);
        assert!(cert.codigo_verificacion.is_empty());

        assert!(Certificate::from_backend(&json!({ "courseName": "sin id" })).is_none());
    }

    #[test]
    fn revoked_certificates_are_blocked_before_any_network_call() {
        let mut cert = demo_certificates_for("1234567890").remove(0);
        cert.estado = CertificateStatus::Revocado;
        assert_eq!(cert.check_downloadable(), Err(DownloadBlocked::Revoked));
    }

    #[test]
    fn demo_only_certificates_are_blocked() {
        let generic = demo_certificates_for("0000000000");
        assert!(generic.iter().all(|c| c.is_demo()));
        assert!(generic
            .iter()
            .all(|c| c.check_downloadable() == Err(DownloadBlocked::DemoOnly)));
    }

    #[test]
    fn seeded_demo_certificates_are_downloadable() {
        for cedula in ["1234567890", "9876543210", "1122334455"] {
            for cert in demo_certificates_for(cedula) {
                assert_eq!(cert.check_downloadable(), Ok(()));
                assert!(verify_code(&cert.codigo_verificacion));
            }
        }
    }

    #[test]
    fn bulk_download_requires_exactly_one_recipient() {
        let mut cert = demo_certificates_for("1122334455").remove(0);
        assert!(!cert.bulk_downloadable());

        cert.assigned_users = vec![recipient("u1")];
        assert!(cert.bulk_downloadable());

        cert.assigned_users = vec![recipient("u1"), recipient("u2")];
        assert!(!cert.bulk_downloadable());
    }

    #[test]
    fn download_file_name_joins_title_and_code() {
        let cert = demo_certificates_for("9876543210").remove(1);
        assert_eq!(
            cert.download_file_name(),
            "Certificado_de_Participación_-_Congreso_2024_ACT-2024-5678.pdf"
        );
    }

    #[test]
    fn verify_code_knows_the_issuing_prefixes() {
        assert!(verify_code("MOV-2024-001-XYZ"));
        assert!(verify_code("SENA-2023-9012"));
        assert!(!verify_code("XXX-123"));
        assert!(!verify_code(""));
    }
}
