use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use normalizer_core::CanonicalNamePolicy;

/// Load a policy file (`.yaml`, `.yml` or `.json`), or the default policy
/// when no file is given. The result is validated.
pub fn load_policy(path: Option<&Path>) -> Result<CanonicalNamePolicy> {
    let policy = match path {
        None => CanonicalNamePolicy::default(),
        Some(path) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("Failed to read policy file {}", path.display()))?;
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            match ext {
                "yaml" | "yml" => serde_yaml::from_str(&body).with_context(|| {
                    format!("Failed to parse policy YAML {}", path.display())
                })?,
                "json" => serde_json::from_str(&body).with_context(|| {
                    format!("Failed to parse policy JSON {}", path.display())
                })?,
                other => {
                    return Err(anyhow!(
                        "Unsupported policy file extension '{}' (expected yaml, yml or json)",
                        other
                    ))
                }
            }
        }
    };
    policy.validate().context("Invalid policy")?;
    Ok(policy)
}

/// Print the effective policy as YAML (default) or JSON.
pub fn show_policy_command(policy_path: Option<&Path>, json: bool) -> Result<()> {
    let policy = load_policy(policy_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&policy)?);
    } else {
        print!("{}", serde_yaml::to_string(&policy)?);
    }
    Ok(())
}
