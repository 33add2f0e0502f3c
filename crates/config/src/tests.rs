#[cfg(test)]
mod loading_tests {
    use crate::AppConfig;

    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wafer-scheduler.toml");
        fs::write(
            &path,
            r#"
[benchmark]
robots = 5
cycles = 2

[strategies]
enabled = ["lock"]
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.benchmark.robots, 5);
        assert_eq!(config.benchmark.cycles, 2);
        assert_eq!(config.benchmark.carrier_groups, 10);
        assert_eq!(config.strategies.enabled, vec!["lock"]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(AppConfig::load(Some(path.to_str().unwrap())).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(
            &path,
            r#"
[coordinator]
dispatch_policy = "lifo"
"#,
        )
        .unwrap();

        assert!(AppConfig::load(Some(path.to_str().unwrap())).is_err());
    }
}
