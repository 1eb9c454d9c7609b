use crate::error::AppError;
use config::{Config as Cfg, Environment, File, Value};
use serde::de::DeserializeOwned;

/// Loads a layered configuration: built-in defaults, then an optional
/// `configuration` file, then `<PREFIX>__SECTION__KEY` environment variables.
///
/// Keys listed in `list_keys` are split on commas when read from the
/// environment.
pub fn load<T: DeserializeOwned>(
    env_prefix: &str,
    defaults: &[(&str, Value)],
    list_keys: &[&str],
) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let mut environment = Environment::with_prefix(env_prefix)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true);

    if !list_keys.is_empty() {
        environment = environment.list_separator(",");
        for key in list_keys {
            environment = environment.with_list_parse_key(key);
        }
    }

    let mut builder = Cfg::builder();
    for (key, value) in defaults {
        builder = builder.set_default(*key, value.clone())?;
    }

    let config = builder
        .add_source(File::with_name("configuration").required(false))
        .add_source(environment)
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        server: SampleServer,
    }

    #[derive(Debug, Deserialize)]
    struct SampleServer {
        port: u16,
        host: String,
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let sample: Sample = load(
            "CORE_CONFIG_TEST",
            &[
                ("server.port", Value::from(5000_i64)),
                ("server.host", Value::from("0.0.0.0")),
            ],
            &[],
        )
        .unwrap();

        assert_eq!(sample.server.port, 5000);
        assert_eq!(sample.server.host, "0.0.0.0");
    }
}
