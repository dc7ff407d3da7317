// tests/registry_config.rs
// Registry and aggregator config loading: env var precedence, CWD fallbacks,
// secret indirection. Tests that touch CWD or process env are #[serial].

use hometv_aggregator::config::aggregator::{ENV_CONFIG_PATH, ENV_JWT_SECRET};
use hometv_aggregator::registry::{load_sources_from, ENV_SOURCES_PATH};
use hometv_aggregator::{AggregatorConfig, RegistryHandle, SourceRegistry};
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Snapshot & restore env vars and CWD around a test.
struct Sandbox {
    saved: Vec<(String, Option<String>)>,
    old_cwd: PathBuf,
    dir: tempfile::TempDir,
}

impl Sandbox {
    /// Fresh temp CWD with the given vars removed.
    fn enter(vars: &[&str]) -> Self {
        let old_cwd = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        let saved = vars
            .iter()
            .map(|k| {
                let prev = env::var(k).ok();
                env::remove_var(k);
                (k.to_string(), prev)
            })
            .collect();
        Self {
            saved,
            old_cwd,
            dir,
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let p = self.path().join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, content).unwrap();
        p
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
        let _ = env::set_current_dir(&self.old_cwd);
    }
}

const TWO_SOURCES_TOML: &str = r#"
[[sources]]
key = "ffzy"
name = "非凡影视"
api = "http://ffzy.invalid/api.php/provide/vod/"

[[sources]]
key = "bfzy"
name = "暴风资源"
endpoint = "https://bfzy.invalid/api.php/provide/vod/"
active = false
"#;

#[test]
fn toml_and_json_sources_parse_with_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let p_toml = dir.path().join("sources.toml");
    fs::write(&p_toml, TWO_SOURCES_TOML).unwrap();
    let snap = load_sources_from(&p_toml).unwrap();
    assert_eq!(snap.len(), 2);
    assert_eq!(snap.all()[0].name, "非凡影视");
    assert!(!snap.all()[1].enabled);
    assert_eq!(snap.list_enabled_sources().len(), 1);

    let p_json = dir.path().join("sources.json");
    fs::write(
        &p_json,
        r#"[{"key":"lzi","api":"http://lzi.invalid/api","enabled":true}]"#,
    )
    .unwrap();
    let snap = load_sources_from(&p_json).unwrap();
    assert_eq!(snap.all()[0].key, "lzi");
    assert_eq!(snap.all()[0].name, "lzi");
}

#[test]
fn duplicate_keys_and_bad_endpoints_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dup = dir.path().join("dup.toml");
    fs::write(
        &dup,
        "[[sources]]\nkey = \"a\"\napi = \"http://a.invalid/\"\n\n[[sources]]\nkey = \"a\"\napi = \"http://b.invalid/\"\n",
    )
    .unwrap();
    assert!(load_sources_from(&dup).is_err());

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[[sources]]\nkey = \"a\"\napi = \"ftp://a.invalid/\"\n").unwrap();
    assert!(load_sources_from(&bad).is_err());
}

#[serial_test::serial]
#[test]
fn sources_default_uses_env_then_fallbacks() {
    let sb = Sandbox::enter(&[ENV_SOURCES_PATH]);

    // 1) nothing anywhere: empty registry
    let reg = RegistryHandle::load_default().unwrap();
    assert!(reg.snapshot().is_empty());

    // 2) ./config/sources.toml
    sb.write("config/sources.toml", TWO_SOURCES_TOML);
    let reg = RegistryHandle::load_default().unwrap();
    assert_eq!(reg.snapshot().len(), 2);

    // 3) env var wins
    let p_env = sb.write(
        "elsewhere.json",
        r#"{"sources":[{"key":"only","api":"http://only.invalid/"}]}"#,
    );
    env::set_var(ENV_SOURCES_PATH, p_env.display().to_string());
    let reg = RegistryHandle::load_default().unwrap();
    assert_eq!(reg.snapshot().len(), 1);
    assert!(reg.find_source("only").is_some());

    // 4) env var pointing nowhere is an error, not a silent fallback
    env::set_var(ENV_SOURCES_PATH, sb.path().join("missing.toml").display().to_string());
    assert!(RegistryHandle::load_default().is_err());
}

#[serial_test::serial]
#[test]
fn config_default_uses_env_then_fallbacks() {
    let sb = Sandbox::enter(&[ENV_CONFIG_PATH, ENV_JWT_SECRET]);
    env::set_var(ENV_JWT_SECRET, "from-env");

    // built-in defaults, secret resolved from env
    let cfg = AggregatorConfig::load_default().unwrap();
    assert_eq!(cfg.category.cap, 20);
    assert_eq!(cfg.auth.jwt_secret, "from-env");

    // ./config/aggregator.toml
    sb.write("config/aggregator.toml", "[category]\ncap = 7\n");
    assert_eq!(AggregatorConfig::load_default().unwrap().category.cap, 7);

    // env var wins, JSON accepted
    let p_env = sb.write(
        "agg.json",
        r#"{"category":{"cap":3},"auth":{"jwt_secret":"inline"}}"#,
    );
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let cfg = AggregatorConfig::load_default().unwrap();
    assert_eq!(cfg.category.cap, 3);
    assert_eq!(cfg.auth.jwt_secret, "inline");

    env::set_var(ENV_CONFIG_PATH, sb.path().join("nope.toml").display().to_string());
    assert!(AggregatorConfig::load_default().is_err());
}

#[serial_test::serial]
#[test]
fn required_auth_without_env_secret_fails_to_load() {
    let _sb = Sandbox::enter(&[ENV_CONFIG_PATH, ENV_JWT_SECRET]);
    let err = AggregatorConfig::load_default().unwrap_err();
    assert!(format!("{err:#}").contains(ENV_JWT_SECRET));
}

#[serial_test::serial]
#[test]
fn reload_swaps_the_shared_snapshot() {
    let sb = Sandbox::enter(&[]);
    let path = sb.write("sources.toml", TWO_SOURCES_TOML);
    let reg = RegistryHandle::from_path(&path).unwrap();
    let held = reg.snapshot();
    let clone = reg.clone();

    sb.write(
        "sources.toml",
        "[[sources]]\nkey = \"lzi\"\napi = \"http://lzi.invalid/\"\n",
    );
    assert_eq!(clone.reload().unwrap(), 1);

    // All handles see the new list; an already-taken snapshot is untouched.
    assert!(reg.find_source("ffzy").is_none());
    assert!(reg.find_source("lzi").is_some());
    assert_eq!(held.len(), 2);
}

#[serial_test::serial]
#[test]
fn failed_reload_keeps_previous_sources() {
    let sb = Sandbox::enter(&[]);
    let path = sb.write("sources.toml", TWO_SOURCES_TOML);
    let reg = RegistryHandle::from_path(&path).unwrap();

    sb.write("sources.toml", "this is = = not toml");
    assert!(reg.reload().is_err());
    assert_eq!(reg.snapshot().len(), 2);
}
