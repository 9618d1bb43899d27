use super::Config;

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("DYNADUB_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.connection.endpoint = endpoint;
        }

        if let Ok(raw) = std::env::var("DYNADUB_MAX_ATTEMPTS")
            && let Ok(max_attempts) = raw.parse::<u32>()
        {
            self.connection.max_attempts = max_attempts;
        }

        if let Ok(raw) = std::env::var("DYNADUB_DUBBING")
            && let Some(enabled) = parse_flag(&raw)
        {
            self.injection.dyna_dubbing = enabled;
        }

        if let Ok(raw) = std::env::var("DYNADUB_FORCE_APPLY_ALL")
            && let Some(enabled) = parse_flag(&raw)
        {
            self.injection.force_apply_all = enabled;
        }

        if let Ok(level) = std::env::var("DYNADUB_LOG")
            && !level.is_empty()
        {
            self.log_level = level;
        }
    }
}
