use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub api_base_url: String,
    pub api_timeout: Duration,
    pub storage_folder: PathBuf,
    pub template_file: PathBuf,
    pub font_file: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/api".to_string());

        let api_timeout_ms: u64 = std::env::var("API_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .unwrap_or(30000);

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let storage_folder =
            base_dir.join(std::env::var("STORAGE_FOLDER").unwrap_or_else(|_| "storage".to_string()));
        let template_file = base_dir.join(
            std::env::var("TEMPLATE_FILE")
                .unwrap_or_else(|_| "assets/certificado_template.pdf".to_string()),
        );
        let font_file = base_dir.join(
            std::env::var("FONT_FILE")
                .unwrap_or_else(|_| "assets/AlexBrush-Regular.ttf".to_string()),
        );

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            api_base_url,
            api_timeout: Duration::from_millis(api_timeout_ms),
            storage_folder,
            template_file,
            font_file,
            host,
            port,
        })
    }
}
