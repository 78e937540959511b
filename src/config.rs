use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{color::ColorPolicy, model::OutputFormat, Cli};

pub const CONFIG_FILE: &str = "site-upkeep.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SafeDeleteRule {
    pub name: String,
    pub glob: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl SafeDeleteRule {
    fn new(name: &str, glob: &str, case_insensitive: bool) -> Self {
        Self {
            name: name.to_string(),
            glob: glob.to_string(),
            case_insensitive,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    root_document: Option<String>,
    site_dir: Option<String>,
    inventory_dirs: Option<Vec<String>>,
    inventory_files: Option<Vec<String>>,
    extra_inventory_globs: Option<Vec<String>>,
    root_prefixes: Option<Vec<String>>,
    reference_attrs: Option<Vec<String>>,
    allowlist: Option<Vec<String>>,
    safe_delete: Option<Vec<SafeDeleteRule>>,
    format: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub root_document: String,
    pub site_dir: String,
    pub inventory_dirs: Vec<String>,
    pub inventory_files: Vec<String>,
    pub extra_inventory_globs: Vec<String>,
    pub root_prefixes: Vec<String>,
    pub reference_attrs: Vec<String>,
    pub allowlist: Vec<String>,
    pub safe_delete: Vec<SafeDeleteRule>,
    pub format: OutputFormat,
    pub color: ColorPolicy,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self::from_file(FileConfig::default(), None, None)
    }
}

impl EffectiveConfig {
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli.config.clone().or_else(|| {
            let p = cli.root.join(CONFIG_FILE);
            if p.exists() { Some(p) } else { None }
        });

        let fcfg = if let Some(path) = path {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading config {}", path.display()))?;
            toml::from_str::<FileConfig>(&raw)
                .with_context(|| format!("failed parsing config {}", path.display()))?
        } else {
            FileConfig::default()
        };

        Ok(Self::from_file(fcfg, cli.format, cli.color))
    }

    fn from_file(fcfg: FileConfig, format: Option<OutputFormat>, color: Option<ColorPolicy>) -> Self {
        let format = format
            .or_else(|| parse_format(fcfg.format.as_deref()))
            .unwrap_or(OutputFormat::Human);

        let color = color
            .or_else(|| parse_color(fcfg.color.as_deref()))
            .unwrap_or(ColorPolicy::Auto);

        let mut reference_attrs = fcfg.reference_attrs.unwrap_or_else(|| strings(&["href", "src", "poster", "data-src", "data-href"]));
        for attr in &mut reference_attrs {
            *attr = attr.to_ascii_lowercase();
        }
        reference_attrs.sort();
        reference_attrs.dedup();

        Self {
            root_document: fcfg.root_document.unwrap_or_else(|| "index.html".to_string()),
            site_dir: fcfg
                .site_dir
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "site".to_string()),
            inventory_dirs: fcfg.inventory_dirs.unwrap_or_else(|| strings(&["site", "html", "files", "docs"])),
            inventory_files: fcfg
                .inventory_files
                .unwrap_or_else(|| strings(&["index.html", "robots.txt", "sitemap.xml", "CNAME"])),
            extra_inventory_globs: fcfg.extra_inventory_globs.unwrap_or_else(|| strings(&["_freeze *"])),
            root_prefixes: fcfg
                .root_prefixes
                .unwrap_or_else(|| strings(&["site/", "files/", "html/", "docs/"])),
            reference_attrs,
            allowlist: fcfg.allowlist.unwrap_or_else(|| {
                strings(&[
                    "site/search.json",
                    "site/listings.json",
                    "site/sitemap.xml",
                    "site/robots.txt",
                ])
            }),
            safe_delete: fcfg.safe_delete.unwrap_or_else(default_safe_delete),
            format,
            color,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// Order matters: the first matching rule is the one reported.
fn default_safe_delete() -> Vec<SafeDeleteRule> {
    vec![
        SafeDeleteRule::new("freeze-cache", "_freeze */**", false),
        SafeDeleteRule::new("legacy-docs", "docs/**", false),
        SafeDeleteRule::new("notebook-artifact", "site/**/*.ipynb", true),
        SafeDeleteRule::new("source-map", "site/**/*.map", true),
    ]
}

fn parse_format(v: Option<&str>) -> Option<OutputFormat> {
    match v {
        Some("json") => Some(OutputFormat::Json),
        Some("human") => Some(OutputFormat::Human),
        _ => None,
    }
}

fn parse_color(v: Option<&str>) -> Option<ColorPolicy> {
    match v {
        Some("always") => Some(ColorPolicy::Always),
        Some("never") => Some(ColorPolicy::Never),
        Some("auto") => Some(ColorPolicy::Auto),
        _ => None,
    }
}
