use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Directory for file-backed storage. `None` keeps everything in memory.
    pub storage_dir: Option<String>,
    /// Tag stamped on every lead as its `source`.
    pub lead_source: String,
    /// Brand name used in notification subjects.
    pub brand_name: String,
    pub hubspot_api_key: Option<String>,
    pub hubspot_base_url: String,
    pub emailjs_service_id: Option<String>,
    pub emailjs_template_id: Option<String>,
    pub emailjs_public_key: Option<String>,
    pub emailjs_to_email: String,
    pub emailjs_base_url: String,
    /// Custom lead webhook.
    pub lead_api_endpoint: Option<String>,
    pub enable_email_notifications: bool,
    pub analytics_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            storage_dir: None,
            lead_source: "byoticabio_landing_page".to_string(),
            brand_name: "ByoticaBio.ai".to_string(),
            hubspot_api_key: None,
            hubspot_base_url: "https://api.hubapi.com".to_string(),
            emailjs_service_id: None,
            emailjs_template_id: None,
            emailjs_public_key: None,
            emailjs_to_email: "john@bioticabio.com".to_string(),
            emailjs_base_url: "https://api.emailjs.com".to_string(),
            lead_api_endpoint: None,
            enable_email_notifications: false,
            analytics_endpoint: None,
        }
    }
}

/// Reads an optional variable; blank values count as unset.
fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Reads an optional URL variable, which must be http(s) when present.
fn optional_url(name: &str) -> anyhow::Result<Option<String>> {
    match optional(name) {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            anyhow::bail!("{} must start with http:// or https://", name)
        }
        other => Ok(other),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            storage_dir: optional("STORAGE_DIR"),
            lead_source: optional("LEAD_SOURCE").unwrap_or(defaults.lead_source),
            brand_name: optional("BRAND_NAME").unwrap_or(defaults.brand_name),
            hubspot_api_key: optional("HUBSPOT_API_KEY"),
            hubspot_base_url: optional_url("HUBSPOT_BASE_URL")?
                .unwrap_or(defaults.hubspot_base_url),
            emailjs_service_id: optional("EMAILJS_SERVICE_ID"),
            emailjs_template_id: optional("EMAILJS_TEMPLATE_ID"),
            emailjs_public_key: optional("EMAILJS_PUBLIC_KEY"),
            emailjs_to_email: optional("EMAILJS_TO_EMAIL")
                .map(|email| {
                    crate::sanitize::sanitize_email(&email).map_err(|_| {
                        anyhow::anyhow!("EMAILJS_TO_EMAIL must be a valid email address")
                    })
                })
                .transpose()?
                .unwrap_or(defaults.emailjs_to_email),
            emailjs_base_url: optional_url("EMAILJS_BASE_URL")?
                .unwrap_or(defaults.emailjs_base_url),
            lead_api_endpoint: optional_url("LEAD_API_ENDPOINT")?,
            enable_email_notifications: match optional("ENABLE_EMAIL_NOTIFICATIONS") {
                None => false,
                Some(flag) => match flag.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => true,
                    "false" | "0" | "no" => false,
                    _ => anyhow::bail!("ENABLE_EMAIL_NOTIFICATIONS must be true or false"),
                },
            },
            analytics_endpoint: optional_url("ANALYTICS_ENDPOINT")?,
        };

        // Log what is configured (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Server Port: {}", config.port);
        match &config.storage_dir {
            Some(dir) => tracing::info!("File storage directory: {}", dir),
            None => tracing::warn!("STORAGE_DIR not set, leads are kept in memory only"),
        }
        tracing::debug!(
            "HubSpot configured: {}, EmailJS configured: {}, email notifications: {}",
            config.hubspot_api_key.is_some(),
            config.emailjs_configured(),
            config.enable_email_notifications
        );
        if let Some(ref endpoint) = config.lead_api_endpoint {
            tracing::info!("Lead API endpoint configured: {}", endpoint);
        }

        Ok(config)
    }

    pub fn emailjs_configured(&self) -> bool {
        self.emailjs_service_id.is_some()
            && self.emailjs_template_id.is_some()
            && self.emailjs_public_key.is_some()
    }
}
