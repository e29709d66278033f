use std::{collections::HashMap, fs};

#[derive(Debug)]
pub struct Settings {
    pub server_url: String,
    pub employee_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            employee_id: None,
        }
    }
}

/// Resolution order: defaults, then `gallery.toml` in the working directory,
/// then environment variables, then command-line flags (applied by the
/// caller).
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("gallery.toml") {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("GALLERY_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("GALLERY_EMPLOYEE_ID") {
        settings.employee_id = Some(v);
    }
    if let Ok(v) = std::env::var("APP__EMPLOYEE_ID") {
        settings.employee_id = Some(v);
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("server_url") {
            settings.server_url = v.clone();
        }
        if let Some(v) = file_cfg.get("employee_id") {
            settings.employee_id = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_settings_override_defaults() {
        let mut settings = Settings::default();
        apply_file_settings(
            &mut settings,
            "server_url = \"http://gallery.internal:5000\"\nemployee_id = \"E123\"\n",
        );
        assert_eq!(settings.server_url, "http://gallery.internal:5000");
        assert_eq!(settings.employee_id.as_deref(), Some("E123"));
    }

    #[test]
    fn unknown_keys_and_malformed_files_are_ignored() {
        let mut settings = Settings::default();
        apply_file_settings(&mut settings, "retries = \"3\"\n");
        assert_eq!(settings.server_url, Settings::default().server_url);

        apply_file_settings(&mut settings, "not toml at all [");
        assert_eq!(settings.server_url, Settings::default().server_url);
        assert_eq!(settings.employee_id, None);
    }
}
