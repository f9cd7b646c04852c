//! Integration tests for ondie-cache

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const CERTS: &str = "content/OnDieCA/certs";
const CRLS: &str = "content/OnDieCA/crls";

/// Write a zip bundle laid out like the published one
fn write_bundle(path: &Path, files: &[(&str, &[u8])]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap();
}

/// Every regular file in `dir` with its contents
fn read_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .map(|p| {
            (
                p.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read(&p).unwrap(),
            )
        })
        .collect()
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).unwrap().next().is_none()
}

mod refresh_properties {
    use super::*;
    use ondie_cache::cache::{promote, CacheDirectory, Promotion, MARKER_NAME};
    use ondie_cache::fetch::FileSource;
    use ondie_cache::refresh::{RefreshCycle, RefreshOptions};
    use ondie_cache::CacheError;

    struct Setup {
        _root: TempDir,
        cache_dir: PathBuf,
        work_dir: PathBuf,
        bundles: PathBuf,
    }

    impl Setup {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let cache_dir = root.path().join("cache");
            let work_dir = root.path().join("work");
            let bundles = root.path().join("bundles");
            for dir in [&cache_dir, &work_dir, &bundles] {
                fs::create_dir(dir).unwrap();
            }
            Self {
                _root: root,
                cache_dir,
                work_dir,
                bundles,
            }
        }

        fn bundle(&self, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
            let path = self.bundles.join(name);
            write_bundle(&path, files);
            path
        }

        async fn cache(&self) -> CacheDirectory {
            CacheDirectory::open(&self.cache_dir).await.unwrap()
        }

        async fn refresh(&self, bundle: &Path, force: bool) -> Result<(), CacheError> {
            let cache = self.cache().await;
            let source = FileSource::new(bundle);
            let options = RefreshOptions {
                force,
                work_dir: Some(self.work_dir.clone()),
                ..RefreshOptions::default()
            };
            RefreshCycle::new(&cache, &source, options)
                .run()
                .await
                .map(|_| ())
        }
    }

    #[tokio::test]
    async fn forced_rerun_replaces_previous_shadow_set() {
        let setup = Setup::new();
        fs::write(setup.cache_dir.join("a.cer"), b"live-a").unwrap();
        let first = setup.bundle(
            "first.zip",
            &[
                (&format!("{CERTS}/a.cer"), b"first-a"),
                (&format!("{CRLS}/old.crl"), b"first-crl"),
            ],
        );
        let second = setup.bundle("second.zip", &[(&format!("{CERTS}/a.cer"), b"second-a")]);

        setup.refresh(&first, true).await.unwrap();
        setup.refresh(&second, true).await.unwrap();

        let tree = read_tree(&setup.cache_dir);
        let expected: BTreeMap<String, Vec<u8>> = [
            ("a.cer".to_string(), b"live-a".to_vec()),
            ("a.cer.new".to_string(), b"second-a".to_vec()),
            (MARKER_NAME.to_string(), Vec::new()),
        ]
        .into_iter()
        .collect();
        assert_eq!(tree, expected);
    }

    #[tokio::test]
    async fn pending_marker_blocks_unforced_refresh() {
        let setup = Setup::new();
        fs::write(setup.cache_dir.join("a.cer"), b"live").unwrap();
        fs::write(setup.cache_dir.join("a.cer.new"), b"unconsumed").unwrap();
        fs::write(setup.cache_dir.join(MARKER_NAME), b"").unwrap();
        let before = read_tree(&setup.cache_dir);
        let bundle = setup.bundle("b.zip", &[(&format!("{CERTS}/a.cer"), b"fresh")]);

        let err = setup.refresh(&bundle, false).await.unwrap_err();

        assert!(matches!(err, CacheError::PendingUpdate { .. }));
        assert_eq!(read_tree(&setup.cache_dir), before);
        assert!(is_empty_dir(&setup.work_dir));
    }

    #[tokio::test]
    async fn force_overrides_pending_marker() {
        let setup = Setup::new();
        fs::write(setup.cache_dir.join("a.cer"), b"live").unwrap();
        fs::write(setup.cache_dir.join("a.cer.new"), b"unconsumed").unwrap();
        fs::write(setup.cache_dir.join(MARKER_NAME), b"").unwrap();
        let bundle = setup.bundle(
            "b.zip",
            &[
                (&format!("{CERTS}/a.cer"), b"fresh"),
                (&format!("{CRLS}/a.crl"), b"fresh-crl"),
            ],
        );

        setup.refresh(&bundle, true).await.unwrap();

        let tree = read_tree(&setup.cache_dir);
        assert_eq!(tree["a.cer"], b"live");
        assert_eq!(tree["a.cer.new"], b"fresh");
        assert_eq!(tree["a.crl.new"], b"fresh-crl");
        assert!(tree.contains_key(MARKER_NAME));
    }

    #[tokio::test]
    async fn staging_failure_never_publishes() {
        let setup = Setup::new();
        let bundle = setup.bundle(
            "b.zip",
            &[
                (&format!("{CERTS}/a.cer"), b"a"),
                (&format!("{CERTS}/b.cer"), b"b"),
                (&format!("{CERTS}/c.cer"), b"c"),
            ],
        );
        // Artifact 2 of 3 cannot be written
        fs::create_dir(setup.cache_dir.join("b.cer.new")).unwrap();

        let err = setup.refresh(&bundle, false).await.unwrap_err();

        assert!(matches!(err, CacheError::Staging { .. }));
        let tree = read_tree(&setup.cache_dir);
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["a.cer.new"]);
        assert!(!setup.cache_dir.join(MARKER_NAME).exists());
        assert!(is_empty_dir(&setup.work_dir));
    }

    #[tokio::test]
    async fn publish_failure_leaves_only_orphan_shadows() {
        let setup = Setup::new();
        // Something squatting on the marker name as a directory
        fs::create_dir(setup.cache_dir.join(MARKER_NAME)).unwrap();
        let bundle = setup.bundle("b.zip", &[(&format!("{CERTS}/a.cer"), b"a")]);

        let err = setup.refresh(&bundle, true).await.unwrap_err();

        assert!(matches!(err, CacheError::Publish { .. }));
        assert!(setup.cache_dir.join("a.cer.new").is_file());
        assert!(is_empty_dir(&setup.work_dir));
    }

    #[tokio::test]
    async fn workspace_never_leaks_into_cache() {
        let setup = Setup::new();
        let good = setup.bundle("good.zip", &[(&format!("{CERTS}/a.cer"), b"a")]);
        let empty = setup.bundle("empty.zip", &[("content/readme.txt", b"nothing")]);
        let missing = setup.bundles.join("missing.zip");

        setup.refresh(&good, false).await.unwrap();
        assert!(setup.refresh(&empty, true).await.is_err());
        assert!(setup.refresh(&missing, true).await.is_err());

        let snapshot = setup.cache().await.snapshot().await.unwrap();
        assert!(snapshot.other.is_empty());
        assert!(!setup.cache_dir.join("csme.zip").exists());
        assert!(!setup.cache_dir.join("content").exists());
        assert!(is_empty_dir(&setup.work_dir));
    }

    #[tokio::test]
    async fn reader_round_trip() {
        let setup = Setup::new();
        fs::write(setup.cache_dir.join("a.cer"), b"old").unwrap();
        fs::write(setup.cache_dir.join("a.cer.new"), b"new").unwrap();
        fs::write(setup.cache_dir.join(MARKER_NAME), b"").unwrap();
        let cache = setup.cache().await;

        let promotion = promote(&cache).await.unwrap();

        assert!(matches!(promotion, Promotion::Promoted { .. }));
        let tree = read_tree(&setup.cache_dir);
        let expected: BTreeMap<String, Vec<u8>> =
            [("a.cer".to_string(), b"new".to_vec())].into_iter().collect();
        assert_eq!(tree, expected);
    }

    #[tokio::test]
    async fn refresh_then_promote_updates_live_files() {
        let setup = Setup::new();
        fs::write(setup.cache_dir.join("a.cer"), b"old").unwrap();
        let bundle = setup.bundle(
            "b.zip",
            &[
                (&format!("{CERTS}/a.cer"), b"v2"),
                (&format!("{CRLS}/a.crl"), b"crl-v2"),
            ],
        );

        setup.refresh(&bundle, false).await.unwrap();
        promote(&setup.cache().await).await.unwrap();

        let tree = read_tree(&setup.cache_dir);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree["a.cer"], b"v2");
        assert_eq!(tree["a.crl"], b"crl-v2");

        // The reader consumed the update, so an unforced refresh may run again
        setup.refresh(&bundle, false).await.unwrap();
    }
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use ondie_cache::config::Config;
    use predicates::prelude::*;

    struct Env {
        root: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            for dir in ["cache", "work", "state"] {
                fs::create_dir(root.path().join(dir)).unwrap();
            }

            let mut config = Config::default();
            config.general.audit_log = false;
            config.cache.work_dir = Some(root.path().join("work"));
            fs::write(
                root.path().join("config.toml"),
                toml::to_string_pretty(&config).unwrap(),
            )
            .unwrap();

            Self { root }
        }

        fn cache_dir(&self) -> PathBuf {
            self.root.path().join("cache")
        }

        fn bundle(&self, files: &[(&str, &[u8])]) -> PathBuf {
            let path = self.root.path().join("csme.zip");
            write_bundle(&path, files);
            path
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("ondie-cache");
            cmd.env("ONDIE_CACHE_CONFIG", self.root.path().join("config.toml"))
                .env("XDG_STATE_HOME", self.root.path().join("state"))
                .env_remove("ONDIE_CACHE_DIR")
                .env("CI", "1");
            cmd
        }

        fn update(&self, bundle: &Path) -> Command {
            let mut cmd = self.cmd();
            cmd.arg("update")
                .arg("--cache-dir")
                .arg(self.cache_dir())
                .arg("--source")
                .arg(bundle);
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("ondie-cache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Refresh a local OnDie CA certificate and CRL cache",
            ));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("ondie-cache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ondie-cache"));
    }

    #[test]
    fn update_stages_and_signals() {
        let env = Env::new();
        let bundle = env.bundle(&[
            (&format!("{CERTS}/a.cer"), b"cert"),
            (&format!("{CRLS}/a.crl"), b"crl"),
        ]);

        env.update(&bundle)
            .assert()
            .success()
            .stdout(predicate::str::contains("a.cer"))
            .stdout(predicate::str::contains("Update ready"));

        assert_eq!(fs::read(env.cache_dir().join("a.cer.new")).unwrap(), b"cert");
        assert!(env.cache_dir().join("cache_updated").exists());
    }

    #[test]
    fn update_refuses_pending_marker() {
        let env = Env::new();
        fs::write(env.cache_dir().join("cache_updated"), b"").unwrap();
        let bundle = env.bundle(&[(&format!("{CERTS}/a.cer"), b"cert")]);

        env.update(&bundle)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Previous update not yet processed"))
            .stderr(predicate::str::contains("--force"));

        assert!(!env.cache_dir().join("a.cer.new").exists());
    }

    #[test]
    fn update_force_overrides_marker() {
        let env = Env::new();
        fs::write(env.cache_dir().join("cache_updated"), b"").unwrap();
        let bundle = env.bundle(&[(&format!("{CERTS}/a.cer"), b"cert")]);

        env.update(&bundle).arg("-f").assert().success();

        assert!(env.cache_dir().join("a.cer.new").exists());
    }

    #[test]
    fn update_missing_bundle_is_transport_failure() {
        let env = Env::new();

        env.update(&env.root.path().join("absent.zip"))
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Failed to fetch bundle"));

        assert!(is_empty_dir(&env.cache_dir()));
        assert!(is_empty_dir(&env.root.path().join("work")));
    }

    #[test]
    fn update_without_cache_dir_fails() {
        let env = Env::new();
        env.cmd()
            .arg("update")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No cache directory given"));
    }

    #[test]
    fn update_missing_cache_dir_fails() {
        let env = Env::new();
        env.cmd()
            .args(["update", "--cache-dir"])
            .arg(env.root.path().join("nope"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache directory does not exist"));
    }

    #[test]
    fn status_reports_json() {
        let env = Env::new();
        fs::write(env.cache_dir().join("a.cer"), b"live").unwrap();
        fs::write(env.cache_dir().join("a.cer.new"), b"shadow").unwrap();
        fs::write(env.cache_dir().join("cache_updated"), b"").unwrap();

        let output = env
            .cmd()
            .args(["status", "--format", "json", "--cache-dir"])
            .arg(env.cache_dir())
            .output()
            .unwrap();
        assert!(output.status.success());

        let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(status["live"], serde_json::json!(["a.cer"]));
        assert_eq!(status["shadow"], serde_json::json!(["a.cer.new"]));
        assert_eq!(status["marker"], true);
        assert_eq!(status["marker_stale"], false);
        assert_eq!(status["new_artifacts"], serde_json::json!([]));
        assert!(status["last_event"].is_null());
    }

    #[test]
    fn promote_applies_update() {
        let env = Env::new();
        fs::write(env.cache_dir().join("a.cer"), b"old").unwrap();
        fs::write(env.cache_dir().join("a.cer.new"), b"new").unwrap();
        fs::write(env.cache_dir().join("cache_updated"), b"").unwrap();

        env.cmd()
            .args(["promote", "-c"])
            .arg(env.cache_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("Promoted 1 artifact(s)"));

        assert_eq!(fs::read(env.cache_dir().join("a.cer")).unwrap(), b"new");
        assert!(!env.cache_dir().join("cache_updated").exists());
    }

    #[test]
    fn audit_log_records_refresh() {
        let env = Env::new();
        let mut config = Config::default();
        config.cache.work_dir = Some(env.root.path().join("work"));
        fs::write(
            env.root.path().join("config.toml"),
            toml::to_string_pretty(&config).unwrap(),
        )
        .unwrap();
        let bundle = env.bundle(&[(&format!("{CERTS}/a.cer"), b"cert")]);

        env.update(&bundle).assert().success();

        let log = fs::read_to_string(env.root.path().join("state/ondie-cache/audit.log")).unwrap();
        assert!(log.contains("refresh.completed"));
        assert!(log.contains("a.cer"));

        let output = env
            .cmd()
            .args(["status", "--format", "json", "-c"])
            .arg(env.cache_dir())
            .output()
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(status["last_event"]["event"], "refresh.completed");
        assert_eq!(status["new_artifacts"], serde_json::json!(["a.cer"]));
    }

    #[test]
    fn config_path() {
        let env = Env::new();
        env.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let env = Env::new();
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[source]"));
    }
}
