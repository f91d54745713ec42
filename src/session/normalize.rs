use serde_json::{Map, Value};

use super::{Role, User};
use crate::error::AppError;

// The backend has shipped several response shapes over time: the user
// nested under "user" with a sibling token, or user fields inline at the
// top level, and the name under different keys depending on the version.
// Candidate keys are kept as data so a new shape is one slice entry away.
const ID_KEYS: &[&str] = &["cedula", "id", "_id"];
const NAME_KEYS: &[&str] = &["name", "nombre", "nombreCompleto"];
const EMAIL_KEYS: &[&str] = &["email", "correo"];
const ROLE_KEYS: &[&str] = &["role", "rol"];
const TOKEN_KEYS: &[&str] = &["token", "accessToken", "access_token"];

/// Canonical result of normalizing one auth response.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAuth {
    pub user: User,
    pub token: Option<String>,
}

/// Reconciles any of the observed backend response shapes into one
/// canonical user record. `submitted_cedula` is the sanitized identifier
/// the user logged in with; it backs the id when no id key is present.
pub fn normalize_auth(payload: &Value, submitted_cedula: &str) -> Result<NormalizedAuth, AppError> {
    let root = payload
        .as_object()
        .ok_or_else(|| AppError::MalformedResponse("auth payload is not an object".into()))?;

    let user_obj = root
        .get("user")
        .and_then(Value::as_object)
        .unwrap_or(root);

    let token = pick_string(root, TOKEN_KEYS).or_else(|| pick_string(user_obj, TOKEN_KEYS));

    let nombre_completo = full_name(user_obj)
        .ok_or_else(|| AppError::MalformedResponse("auth payload carries no name field".into()))?;

    let cedula = pick_string(user_obj, ID_KEYS)
        .map(|id| super::clean_cedula(&id))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| submitted_cedula.to_string());

    let parts = name_parts(user_obj, &nombre_completo);

    let role = pick_string(user_obj, ROLE_KEYS).and_then(|r| match r.as_str() {
        "admin" => Some(Role::Admin),
        "user" => Some(Role::User),
        "issuer" => Some(Role::Issuer),
        _ => None,
    });

    Ok(NormalizedAuth {
        user: User {
            cedula,
            nombre_completo,
            primer_nombre: parts[0].clone(),
            segundo_nombre: parts[1].clone(),
            primer_apellido: parts[2].clone(),
            segundo_apellido: parts[3].clone(),
            email: pick_string(user_obj, EMAIL_KEYS),
            role,
        },
        token,
    })
}

/// First non-empty value among the candidate keys. Numbers are accepted
/// for id-like fields (some backend versions send numeric ids).
fn pick_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The full name under a single key, or composed from the split
/// `nombres` + `apellidos` pair some backend versions use instead.
fn full_name(obj: &Map<String, Value>) -> Option<String> {
    if let Some(name) = pick_string(obj, NAME_KEYS) {
        return Some(name);
    }
    let nombres = pick_string(obj, &["nombres"])?;
    match pick_string(obj, &["apellidos"]) {
        Some(apellidos) => Some(format!("{} {}", nombres, apellidos)),
        None => Some(nombres),
    }
}

/// Four display-name slots: first name, middle name, first surname, second
/// surname. Explicit part keys win; otherwise the full name is split on
/// whitespace. The split is a best-effort heuristic, not a guarantee of
/// correct cultural name segmentation.
fn name_parts(obj: &Map<String, Value>, nombre_completo: &str) -> [String; 4] {
    let mut parts = split_full_name(nombre_completo);
    let explicit = [
        "primerNombre",
        "segundoNombre",
        "primerApellido",
        "segundoApellido",
    ];
    for (slot, key) in parts.iter_mut().zip(explicit) {
        if let Some(value) = pick_string(obj, &[key]) {
            *slot = value;
        }
    }
    parts
}

pub(super) fn split_full_name(nombre_completo: &str) -> [String; 4] {
    let tokens: Vec<&str> = nombre_completo.split_whitespace().collect();
    let mut parts = [const { String::new() }; 4];
    match tokens.len() {
        0 => {}
        1 => parts[0] = tokens[0].to_string(),
        2 => {
            parts[0] = tokens[0].to_string();
            parts[2] = tokens[1].to_string();
        }
        3 => {
            parts[0] = tokens[0].to_string();
            parts[2] = tokens[1].to_string();
            parts[3] = tokens[2].to_string();
        }
        _ => {
            parts[0] = tokens[0].to_string();
            parts[1] = tokens[1].to_string();
            parts[2] = tokens[2].to_string();
            parts[3] = tokens[3..].join(" ");
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_and_flat_payloads_normalize_identically() {
        let nested = json!({
            "user": {
                "cedula": "1234567890",
                "name": "Juan Carlos Pérez Rodríguez",
                "email": "juan.perez@email.com"
            },
            "token": "abc123"
        });
        let flat = json!({
            "cedula": "1234567890",
            "name": "Juan Carlos Pérez Rodríguez",
            "email": "juan.perez@email.com",
            "token": "abc123"
        });

        let a = normalize_auth(&nested, "1234567890").expect("nested");
        let b = normalize_auth(&flat, "1234567890").expect("flat");
        assert_eq!(a, b);
        assert_eq!(a.token.as_deref(), Some("abc123"));
        assert_eq!(a.user.primer_nombre, "Juan");
        assert_eq!(a.user.segundo_apellido, "Rodríguez");
    }

    #[test]
    fn name_keys_are_tried_in_order() {
        let payload = json!({
            "cedula": "1728963594",
            "nombre": "Jeremy Llumiquinga"
        });
        let auth = normalize_auth(&payload, "1728963594").expect("normalize");
        assert_eq!(auth.user.nombre_completo, "Jeremy Llumiquinga");
        assert_eq!(auth.user.primer_nombre, "Jeremy");
        assert_eq!(auth.user.segundo_nombre, "");
        assert_eq!(auth.user.primer_apellido, "Llumiquinga");
        assert_eq!(auth.user.segundo_apellido, "");
    }

    #[test]
    fn split_name_fields_are_composed() {
        let payload = json!({
            "user": {
                "_id": 99887766,
                "nombres": "María Fernanda",
                "apellidos": "López García"
            }
        });
        let auth = normalize_auth(&payload, "9876543210").expect("normalize");
        assert_eq!(auth.user.nombre_completo, "María Fernanda López García");
        assert_eq!(auth.user.cedula, "99887766");
        assert!(auth.token.is_none());
    }

    #[test]
    fn explicit_part_keys_override_the_split() {
        let payload = json!({
            "nombreCompleto": "Ana María de la Cruz",
            "primerApellido": "de la Cruz",
            "segundoApellido": ""
        });
        let auth = normalize_auth(&payload, "1122334455").expect("normalize");
        assert_eq!(auth.user.primer_apellido, "de la Cruz");
        // empty explicit value does not override the heuristic slot
        assert_eq!(auth.user.segundo_apellido, "la Cruz");
    }

    #[test]
    fn missing_id_falls_back_to_the_submitted_cedula() {
        let payload = json!({ "user": { "name": "Carlos Andrés Martínez Silva" } });
        let auth = normalize_auth(&payload, "1122334455").expect("normalize");
        assert_eq!(auth.user.cedula, "1122334455");
    }

    #[test]
    fn payload_without_a_name_is_malformed() {
        let payload = json!({ "user": { "cedula": "1234567890" } });
        assert!(matches!(
            normalize_auth(&payload, "1234567890"),
            Err(crate::error::AppError::MalformedResponse(_))
        ));
        assert!(matches!(
            normalize_auth(&json!("not an object"), "1234567890"),
            Err(crate::error::AppError::MalformedResponse(_))
        ));
    }

    #[test]
    fn role_is_parsed_when_known() {
        let payload = json!({
            "name": "Admin Uno",
            "rol": "admin"
        });
        let auth = normalize_auth(&payload, "6000001").expect("normalize");
        assert_eq!(auth.user.role, Some(Role::Admin));
    }

    #[test]
    fn split_handles_every_token_count() {
        assert_eq!(split_full_name(""), ["", "", "", ""].map(String::from));
        assert_eq!(
            split_full_name("Jeremy"),
            ["Jeremy", "", "", ""].map(String::from)
        );
        assert_eq!(
            split_full_name("Juan Pérez Rodríguez"),
            ["Juan", "", "Pérez", "Rodríguez"].map(String::from)
        );
        assert_eq!(
            split_full_name("Juan Carlos Pérez Rodríguez del Valle"),
            ["Juan", "Carlos", "Pérez", "Rodríguez del Valle"].map(String::from)
        );
    }
}
