use std::collections::HashMap;
use std::sync::OnceLock;
use tera::{Tera, Value};

static TERA: OnceLock<Tera> = OnceLock::new();

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        tera.register_filter("fecha", fecha);
        let template_dir = std::path::Path::new("templates");
        if template_dir.exists() {
            tera.add_template_files(
                std::fs::read_dir(template_dir)
                    .unwrap()
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().map_or(false, |ext| ext == "html"))
                    .map(|e| {
                        let name = e
                            .path()
                            .file_name()
                            .unwrap()
                            .to_str()
                            .unwrap()
                            .to_string();
                        (e.path(), Some(name))
                    }),
            )
            .expect("Failed to load templates");
        }
        tera
    })
}

const MESES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// `{{ cert.fechaEmision | fecha }}` → "15 de enero de 2024".
fn fecha(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("fecha expects a date string"))?;
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| tera::Error::msg(format!("fecha: {}", e)))?;
    use chrono::Datelike;
    Ok(Value::String(format!(
        "{} de {} de {}",
        date.day(),
        MESES[date.month0() as usize],
        date.year()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fecha_formats_spanish_long_dates() {
        let out = fecha(&Value::String("2024-01-15".into()), &HashMap::new()).expect("format");
        assert_eq!(out, Value::String("15 de enero de 2024".into()));
    }

    #[test]
    fn fecha_rejects_non_dates() {
        assert!(fecha(&Value::String("mañana".into()), &HashMap::new()).is_err());
        assert!(fecha(&Value::Bool(true), &HashMap::new()).is_err());
    }
}
