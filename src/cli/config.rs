use anyhow::{anyhow, Result};

use super::ui::status;
use super::{App, ConfigAction, ConfigArgs};
use crate::config::{BackendKind, Config, SETTING_API_URL, SETTING_DEMO_MODE, SETTING_PAGE_SIZE};

pub fn run_config(app: &App, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Set { key, value } => {
            Config::store(&app.db, &key, &value)?;
            status("Saved.");
        }
        ConfigAction::Get { key: Some(key) } => {
            println!("{}", effective_value(&app.config, &key)?);
        }
        ConfigAction::Get { key: None } => {
            for key in Config::keys() {
                println!("{:<10}  {}", key, effective_value(&app.config, key)?);
            }
        }
        ConfigAction::Unset { key } => {
            check_key(&key)?;
            if app.db.delete_setting(&key)? {
                status("Removed.");
            } else {
                status("Not set.");
            }
        }
    }
    Ok(())
}

/// Value in effect for this run, after environment overrides.
fn effective_value(config: &Config, key: &str) -> Result<String> {
    match key {
        SETTING_API_URL => Ok(config.api_url.clone()),
        SETTING_DEMO_MODE => Ok((config.backend == BackendKind::Demo).to_string()),
        SETTING_PAGE_SIZE => Ok(config.page_size.to_string()),
        other => Err(unknown_key(other)),
    }
}

fn check_key(key: &str) -> Result<()> {
    if Config::keys().contains(&key) {
        Ok(())
    } else {
        Err(unknown_key(key))
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!(
        "Unknown setting '{}' (expected one of: {})",
        key,
        Config::keys().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_app;

    #[test]
    fn set_then_unset() {
        let app = test_app(None);
        run_config(
            &app,
            ConfigArgs {
                action: ConfigAction::Set {
                    key: SETTING_PAGE_SIZE.into(),
                    value: "40".into(),
                },
            },
        )
        .unwrap();
        assert_eq!(app.db.get_setting(SETTING_PAGE_SIZE).unwrap().as_deref(), Some("40"));

        run_config(
            &app,
            ConfigArgs {
                action: ConfigAction::Unset {
                    key: SETTING_PAGE_SIZE.into(),
                },
            },
        )
        .unwrap();
        assert!(app.db.get_setting(SETTING_PAGE_SIZE).unwrap().is_none());
    }

    #[test]
    fn effective_values_follow_loaded_config() {
        let app = test_app(None);
        assert_eq!(effective_value(&app.config, SETTING_DEMO_MODE).unwrap(), "true");
        assert_eq!(effective_value(&app.config, SETTING_PAGE_SIZE).unwrap(), "20");
        assert!(effective_value(&app.config, "theme").is_err());
    }
}
