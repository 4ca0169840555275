use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Template extension, without the dot
    pub extension: String,
    /// Secondary directory tried for `/`-rooted targets
    pub app_dir: String,
    /// Directory names never scanned (dependency managers)
    pub exclude_dirs: Vec<String>,
    pub unresolved_diagnostics: bool,
    pub cycle_diagnostics: bool,
    pub hover: bool,
    pub mixin_completions: bool,
}

impl Settings {
    pub fn new(root_dir: &Path) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/pugls/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.pugls",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("extension", "pug")?
            .set_default("app_dir", "app")?
            .set_default("exclude_dirs", vec!["node_modules"])?
            .set_default("unresolved_diagnostics", true)?
            .set_default("cycle_diagnostics", true)?
            .set_default("hover", true)?
            .set_default("mixin_completions", true)?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            extension: "pug".to_string(),
            app_dir: "app".to_string(),
            exclude_dirs: vec!["node_modules".to_string()],
            unresolved_diagnostics: true,
            cycle_diagnostics: true,
            hover: true,
            mixin_completions: true,
        }
    }
}
