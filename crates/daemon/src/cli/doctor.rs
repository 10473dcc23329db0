use habctl_domain::config::{Config, ConfigSeverity};
use habctl_domain::sun::SunCalculator;

use crate::sun::SunriseCrateSunCalculator;

/// `habctld doctor`: config validation plus a live sanity check that the
/// sun calculator produces a plausible result for the configured
/// latitude/longitude. Returns whether every check passed.
pub fn run(config: &Config, config_path: &str) -> bool {
    let mut passed = true;

    println!("config: {config_path}");
    for issue in config.validate() {
        println!("  {issue}");
        if issue.severity == ConfigSeverity::Error {
            passed = false;
        }
    }

    let calc = SunriseCrateSunCalculator;
    let now = chrono::Utc::now().timestamp();
    let rs = calc.riseset(now, config.settings.latitude, config.settings.longitude);
    match (rs.sunrise, rs.sunset) {
        (Some(_), Some(_)) => println!("  sun calculator: OK (rise and set found for today)"),
        _ => println!(
            "  sun calculator: no rise/set today at ({}, {}) — polar day/night or invalid coordinates",
            config.settings.latitude, config.settings.longitude
        ),
    }

    if passed {
        println!("all checks passed");
    } else {
        println!("one or more checks failed");
    }
    passed
}
