use dynadub::{Config, ReversionRecord};

pub fn render_status(config: &Config) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    let lines = [
        "◆ dynadub status".to_string(),
        String::new(),
        format!("Version     {}", env!("CARGO_PKG_VERSION")),
        format!("Config      {}", config.config_path.display()),
        format!("Log level   {}", config.log_level),
        String::new(),
        format!("Endpoint    {}", config.connection.endpoint),
        format!("Attempts    {}", config.connection.max_attempts),
        format!("Retry       {} ms", config.connection.retry_delay_ms),
        String::new(),
        format!(
            "Tracking    {} (throttle {} ms, text ≤ {} chars)",
            flag(config.tracking.enabled_on_start),
            config.tracking.click_throttle_ms,
            config.tracking.max_text_chars
        ),
        format!("Dubbing     {}", flag(config.injection.dyna_dubbing)),
        format!("Force all   {}", flag(config.injection.force_apply_all)),
    ];
    lines.join("\n")
}

/// One line per applied instruction, in application order.
pub fn render_injections(records: &[ReversionRecord]) -> String {
    if records.is_empty() {
        return "No instructions applied.".to_string();
    }

    let mut lines = vec![format!("◆ {} instruction(s) applied", records.len())];
    for record in records {
        lines.push(format!(
            "  {:<12} {:<14} {}  (was {} bytes, at {})",
            record.id,
            record.action,
            record.selector,
            record.original_content.len(),
            record.applied_at.format("%H:%M:%S%.3f")
        ));
    }
    lines.join("\n")
}
