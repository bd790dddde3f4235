use std::{collections::HashMap, fs};

#[derive(Debug)]
pub struct Settings {
    pub api_url: String,
    pub page_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8800/api".into(),
            page_limit: 25,
        }
    }
}

/// Settings resolution order: defaults, then `labdesk.toml` in the working
/// directory, then `LABDESK__*` environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("labdesk.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_url") {
                settings.api_url = v.clone();
            }
            if let Some(v) = file_cfg.get("page_limit") {
                if let Ok(parsed) = v.parse::<u32>() {
                    settings.page_limit = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("LABDESK__API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("LABDESK__PAGE_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.page_limit = parsed;
        }
    }

    settings
}
