use config::{Config, ConfigError, Environment, File};
use reveille_models::settings::Settings;

/// Reads `appsettings`, then `appsettings.local`, then `APP_`-prefixed
/// environment variables such as `APP_SCHEDULER__RE_ALERT_INTERVAL_SECS`.
/// Every layer is optional.
pub fn load() -> Result<Settings, ConfigError> {
    let settings = Config::builder()
        .add_source(File::with_name("appsettings").required(false))
        .add_source(File::with_name("appsettings.local").required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
