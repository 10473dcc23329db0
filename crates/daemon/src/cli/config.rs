use habctl_domain::config::{Config, ConfigSeverity};

/// `habctld config validate`: prints every issue, returns whether there
/// were zero errors (warnings don't fail validation).
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues.iter().any(|i| i.severity == ConfigSeverity::Error)
}

/// `habctld config show`: dump the resolved configuration as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("could not serialize config: {e}"),
    }
}
