use super::User;

// Seeded users served when no backend is reachable. Mirrors the accounts
// provisioned in the demo backend so either path logs in the same people.
const DEMO_USERS: &[(&str, &str, &str)] = &[
    (
        "1234567890",
        "Juan Carlos Pérez Rodríguez",
        "juan.perez@email.com",
    ),
    (
        "9876543210",
        "María Fernanda López García",
        "maria.lopez@email.com",
    ),
    (
        "1122334455",
        "Carlos Andrés Martínez Silva",
        "carlos.martinez@email.com",
    ),
    (
        "1728963594",
        "Jeremy Llumiquinga",
        "jeremy.llumiquinga@email.com",
    ),
];

/// Looks up the fixed demo table by sanitized cedula.
pub fn lookup(cedula: &str) -> Option<User> {
    DEMO_USERS
        .iter()
        .find(|(id, _, _)| *id == cedula)
        .map(|(id, nombre, email)| {
            let parts = super::normalize::split_full_name(nombre);
            User {
                cedula: (*id).to_string(),
                nombre_completo: (*nombre).to_string(),
                primer_nombre: parts[0].clone(),
                segundo_nombre: parts[1].clone(),
                primer_apellido: parts[2].clone(),
                segundo_apellido: parts[3].clone(),
                email: Some((*email).to_string()),
                role: None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_resolves_with_its_own_cedula() {
        for (cedula, nombre, _) in DEMO_USERS {
            let user = lookup(cedula).expect("table entry");
            assert_eq!(user.cedula, *cedula);
            assert_eq!(user.nombre_completo, *nombre);
            assert!(crate::session::is_valid_cedula(&user.cedula));
        }
    }

    #[test]
    fn unknown_cedula_has_no_entry() {
        assert!(lookup("0000000000").is_none());
    }

    #[test]
    fn single_surname_entry_splits_into_two_slots() {
        let user = lookup("1728963594").expect("table entry");
        assert_eq!(user.primer_nombre, "Jeremy");
        assert_eq!(user.segundo_nombre, "");
        assert_eq!(user.primer_apellido, "Llumiquinga");
        assert_eq!(user.segundo_apellido, "");
    }
}
