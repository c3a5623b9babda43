use anyhow::{Result, bail};

use snapcmp::config;

/// `snapcmp init`: create .snapcmp/config.toml.
pub fn init(force: bool) -> Result<()> {
    if !force && config::config_file_exists() {
        bail!(".snapcmp/config.toml already exists (use --force to overwrite)");
    }

    config::write_template()?;
    config::write_gitignore(force)?;

    let verb = if force { "Regenerated" } else { "Created" };
    println!("{verb} .snapcmp/config.toml");
    Ok(())
}
