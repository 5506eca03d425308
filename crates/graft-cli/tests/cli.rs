//! End-to-end tests for the `graft` binary.

use assert_cmd::prelude::*;
use graft_config::GraftEnvVar;
use graft_test_utils::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// Get the graft binary command.
fn graft() -> Command {
    let mut cmd = Command::cargo_bin("graft").expect("Failed to find graft binary");
    for var in GraftEnvVar::ALL {
        cmd.env_remove(var.as_str());
    }
    cmd
}

fn project() -> TempProject {
    TempProject::new()
        .with_graft_json()
        .with_php_class_content("App\\Dice", Fixtures::service_class("App", "Dice"))
        .with_file("src/functions.php", Fixtures::rand_function("N"))
        .build()
        .unwrap()
}

mod help {
    use super::*;

    #[test]
    fn no_arguments_prints_usage() {
        graft()
            .assert()
            .failure()
            .stderr(predicate::str::contains("Usage"));
    }

    #[test]
    fn version_flag() {
        graft()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("graft"));
    }
}

mod patch {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_patched_source() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["patch", "src/functions.php"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "$__GRAFT__0 = \\Graft\\Monkey::patched(__NAMESPACE__, 'rand', true); $__GRAFT__0(1, 2);",
            ));
    }

    #[test]
    fn rebases_onto_alias_path() {
        let project = TempProject::new()
            .with_file("src/boot.php", "<?php\n$a = __DIR__;\n")
            .build()
            .unwrap();
        let output = graft()
            .arg("-d")
            .arg(project.path())
            .args(["patch", "src/boot.php", "--as", "/srv/app/boot.php"])
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(
            String::from_utf8(output.stdout).unwrap(),
            "<?php\n$a = '/srv/app';\n"
        );
    }

    #[test]
    fn prefix_override_renames_variables() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["--prefix", "__X__", "patch", "src/functions.php"])
            .assert()
            .success()
            .stdout(predicate::str::contains("$__X__0(1, 2)"));
    }

    #[test]
    fn writes_to_output_file() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["patch", "src/functions.php", "-o", "out.php"])
            .assert()
            .success();
        assert_file_contains(&project.join("out.php"), "\\Graft\\Monkey::patched").unwrap();
    }

    #[test]
    fn missing_file_fails() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["patch", "src/Nope.php"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read"));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let project = project();
        std::fs::write(project.join("src/bad.php"), Fixtures::invalid_utf8()).unwrap();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["patch", "src/bad.php"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid UTF-8"));
    }
}

mod load {
    use super::*;

    #[test]
    fn patches_then_hits_cache() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["load", "App\\Dice"])
            .assert()
            .success()
            .stdout(predicate::str::contains("patched"));

        graft()
            .arg("-d")
            .arg(project.path())
            .args(["load", "App\\Dice"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache-hit"));
    }

    #[test]
    fn path_only_prints_cached_file() {
        let project = project();
        let output = graft()
            .arg("-d")
            .arg(project.path())
            .args(["load", "App\\Dice", "--path-only"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let loaded = String::from_utf8(output.stdout).unwrap();
        let loaded = std::path::Path::new(loaded.trim());
        assert!(loaded.starts_with(project.cache_path().canonicalize().unwrap()));
        assert_file_contains(loaded, "\\Graft\\Pointcut::before(").unwrap();
    }

    #[test]
    fn excluded_namespace_passes_through() {
        let project = TempProject::new()
            .with_graft_json()
            .with_config("exclude", serde_json::json!(["App"]))
            .with_php_class("App\\Dice")
            .build()
            .unwrap();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["load", "App\\Dice"])
            .assert()
            .success()
            .stdout(predicate::str::contains("excluded"));
        assert_no_artifacts(&project.cache_path()).unwrap();
    }

    #[test]
    fn unknown_class_fails() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["load", "App\\Missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("could not be located"));
    }
}

mod warm_and_cache {
    use super::*;

    #[test]
    fn warm_then_status_then_clear() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["warm", "src"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 patched"));
        assert_tree_file_count(&project.cache_path(), 2).unwrap();

        graft()
            .arg("-d")
            .arg(project.path())
            .args(["warm", "src"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 cached"));

        graft()
            .arg("-d")
            .arg(project.path())
            .args(["cache", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("files: 2"));

        graft()
            .arg("-d")
            .arg(project.path())
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache cleared"));
        assert!(!project.cache_path().exists());
    }

    #[test]
    fn cache_path_override() {
        let project = project();
        let other = tempfile::TempDir::new().unwrap();
        graft()
            .arg("-d")
            .arg(project.path())
            .arg("--cache-path")
            .arg(other.path())
            .args(["cache", "status", "--path-only"])
            .assert()
            .success()
            .stdout(predicate::str::contains(other.path().to_string_lossy().as_ref()));
    }

    #[test]
    fn warm_reports_failures() {
        let project = project();
        std::fs::write(project.join("src/bad.php"), Fixtures::invalid_utf8()).unwrap();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["warm", "src"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("1 failed"));
    }
}

mod config_errors {
    use super::*;

    #[test]
    fn invalid_prefix_is_reported() {
        let project = TempProject::new()
            .with_config("prefix", serde_json::json!("not valid"))
            .build()
            .unwrap();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["cache", "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("prefix"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let project = project();
        graft()
            .arg("-d")
            .arg(project.path())
            .args(["--config", "missing.json", "cache", "status"])
            .assert()
            .failure();
    }

    #[test]
    fn env_cache_dir_applies() {
        let project = project();
        let other = tempfile::TempDir::new().unwrap();
        graft()
            .env("GRAFT_CACHE_DIR", other.path())
            .arg("-d")
            .arg(project.path())
            .args(["cache", "status", "--path-only"])
            .assert()
            .success()
            .stdout(predicate::str::contains(other.path().to_string_lossy().as_ref()));
    }
}
