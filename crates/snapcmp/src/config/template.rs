use std::path::Path;

use anyhow::{Context, Result};

use super::{CONFIG_DIR, config_path};

/// Hand-crafted config template with commented-out keys, so users see the
/// available knobs without reading docs.
const CONFIG_TEMPLATE: &str = r#"# ─────────────────────────────────────────────────────────
# Comparison. All fields optional.
# ─────────────────────────────────────────────────────────
[diff]
# precision = 1.0                   # fraction of bytes that must match (1.0 = exact)
# perceptual_precision = 1.0        # per-pixel similarity floor (0.98 ~ human eye)
# perceptual = true                 # false = always use the byte budget

# ─────────────────────────────────────────────────────────
# Failure artifacts (reference.png, failure.png, difference.png)
# ─────────────────────────────────────────────────────────
[artifacts]
# dir = ".snapcmp/difference"
"#;

pub fn config_file_exists() -> bool {
    config_path().exists()
}

pub fn write_gitignore(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_DIR).join(".gitignore");
    if !force && path.exists() {
        return Ok(());
    }
    std::fs::write(&path, "difference/\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the config template into `.snapcmp/`.
pub fn write_template() -> Result<()> {
    write_template_to(Path::new(CONFIG_DIR))
}

pub fn write_template_to(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("config.toml");
    std::fs::write(&path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
