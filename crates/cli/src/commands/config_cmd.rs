//! `threadloom config` — Configuration management commands.

use std::path::Path;
use threadloom_config::StoreConfig;

use super::load_config;

pub fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match load_config(path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if config.thread_id.is_none() {
                warnings.push("No thread_id set; stored history cannot be flushed or recalled");
            }
            if config.resource_id.is_none() {
                warnings.push("No resource_id set; ownership of recalled messages is not checked");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Thread:        {}", config.thread_id.as_deref().unwrap_or("(unbound)"));
            println!("   Resource:      {}", config.resource_id.as_deref().unwrap_or("(unbound)"));
            println!("   Merge recall:  {}", config.merge_across_recall);
            println!("   System:        {}", config.system.len());
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    println!("{}", default_path().display());
}

pub fn init() {
    print!("{}", StoreConfig::default_toml());
}

fn default_path() -> std::path::PathBuf {
    StoreConfig::config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        assert!(default_path().to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn default_toml_parses_back() {
        let parsed: StoreConfig = toml::from_str(&StoreConfig::default_toml()).unwrap();
        assert!(parsed.merge_across_recall);
        assert_eq!(parsed.placeholder_user_text, " ");
    }
}
