/// config.rs — Portfolio server config loader.
/// Reads config.json next to the binary, validates, falls back to defaults.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

// ─── Raw JSON shapes (with optional fields for validation) ────────────────────

#[derive(Deserialize, Default, Clone)]
struct RawServer {
    host:       Option<String>,
    port:       Option<u16>,
    log_level:  Option<String>,
    static_dir: Option<String>,
}

#[derive(Deserialize, Default, Clone)]
struct RawUpload {
    max_upload_mb: Option<u64>,
    uploads_dir:   Option<String>,
}

#[derive(Deserialize, Default, Clone)]
struct RawPublish {
    site_dir:    Option<String>,
    site_prefix: Option<String>,
    entry_point: Option<String>,
    work_dir:    Option<String>,
}

#[derive(Deserialize, Default, Clone)]
struct RawConfig {
    #[serde(default)]
    server:  RawServer,
    #[serde(default)]
    upload:  RawUpload,
    #[serde(default)]
    publish: RawPublish,
}

// ─── Validated, exported config ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct Config {
    // Server
    pub host:       String,
    pub port:       u16,
    pub log_level:  String,
    pub static_dir: String,

    // Upload
    pub max_upload_bytes: usize, // MB → bytes
    pub uploads_dir:      String,

    // Publish
    pub site_dir:    String,
    pub site_prefix: String,
    pub entry_point: String,
    /// Staging and rejected trees land here; must stay outside static_dir.
    pub work_dir:    String,
}

impl Config {
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join("config.json");
        let raw: RawConfig = if path.exists() {
            match fs::read_to_string(&path)
                .context("read config.json")
                .and_then(|s| {
                    // Keys starting with "_" are comments
                    let mut val: serde_json::Value = serde_json::from_str(&s)?;
                    strip_comment_keys(&mut val);
                    serde_json::from_value(val).map_err(Into::into)
                }) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("⚠️  config.json parse error: {e} → using defaults");
                    RawConfig::default()
                }
            }
        } else {
            RawConfig::default()
        };

        Self::from_raw(raw)
    }

    fn from_raw(r: RawConfig) -> Self {
        let s = &r.server;
        let u = &r.upload;
        let p = &r.publish;

        macro_rules! clamp {
            ($val:expr, $default:expr, $lo:expr, $hi:expr) => {{
                let v = $val.unwrap_or($default);
                let lo = $lo;
                let hi = $hi;
                if v < lo || v > hi {
                    eprintln!("⚠️  config value {} out of range [{lo},{hi}] → default {}", v, $default);
                    $default
                } else {
                    v
                }
            }};
        }

        let max_upload_mb = clamp!(u.max_upload_mb, 100, 1, 1024);

        let log_level_raw = s.log_level.clone().unwrap_or_else(|| "info".to_string());
        let log_level = if ["trace", "debug", "info", "warn", "error"].contains(&log_level_raw.as_str()) {
            log_level_raw
        } else {
            "info".to_string()
        };

        let site_prefix_raw = p.site_prefix.clone().unwrap_or_else(|| "/flipbook".to_string());
        let site_prefix = if site_prefix_raw.starts_with('/') {
            site_prefix_raw
        } else {
            format!("/{site_prefix_raw}")
        };

        Config {
            host:       s.host.clone().unwrap_or_else(|| "0.0.0.0".to_string()),
            port:       s.port.unwrap_or(8000),
            log_level,
            static_dir: s.static_dir.clone().unwrap_or_else(|| "public".to_string()),

            max_upload_bytes: (max_upload_mb as usize) * 1024 * 1024,
            uploads_dir:      u.uploads_dir.clone().unwrap_or_else(|| "public/uploads".to_string()),

            site_dir:    p.site_dir.clone().unwrap_or_else(|| "public/flipbook".to_string()),
            site_prefix,
            entry_point: p.entry_point.clone().unwrap_or_else(|| "index.html".to_string()),
            work_dir:    p.work_dir.clone().unwrap_or_else(|| ".publish-work".to_string()),
        }
    }

    pub fn print_summary(&self) {
        println!("{}", "─".repeat(60));
        println!("⚙️  Portfolio Server Config");
        let upload_mb = self.max_upload_bytes / 1024 / 1024;
        println!("   Server : {}:{}  log={}  static={}", self.host, self.port, self.log_level, self.static_dir);
        println!("   Upload : max={upload_mb}MB  dir={}", self.uploads_dir);
        println!("   Publish: dir={}  prefix={}  entry={}  work={}", self.site_dir, self.site_prefix, self.entry_point, self.work_dir);
        println!("{}", "─".repeat(60));
    }
}

fn strip_comment_keys(val: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = val {
        let keys_to_remove: Vec<String> = map.keys()
            .filter(|k| k.starts_with('_'))
            .cloned()
            .collect();
        for k in keys_to_remove {
            map.remove(&k);
        }
        for v in map.values_mut() {
            strip_comment_keys(v);
        }
    }
}
