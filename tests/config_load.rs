use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use animal_alarm::config::AlarmConfig;
use animal_alarm::filter::PrimaryPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ANIMAL_ALARM_CONFIG",
        "ANIMAL_ALARM_SOURCE",
        "ANIMAL_ALARM_THRESHOLD",
        "ANIMAL_ALARM_MONITORED",
        "ANIMAL_ALARM_SNAPSHOT_DIR",
        "ANIMAL_ALARM_ASSETS_DIR",
        "ANIMAL_ALARM_COOLDOWN_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AlarmConfig::load(None).expect("load defaults");
    assert_eq!(cfg.source.uri, "dog_video.mp4");
    assert_eq!(cfg.threshold, 0.5);
    assert_eq!(cfg.monitored, vec!["dog", "elephant", "bear", "cow"]);
    assert_eq!(cfg.snapshot_dir, PathBuf::from("snapshots"));
    assert_eq!(cfg.assets_dir, PathBuf::from("static"));
    assert_eq!(cfg.model.weights, PathBuf::from("yolov3-tiny.onnx"));
    assert_eq!(cfg.cooldown, Duration::ZERO);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "model": {
                "weights": "models/detector.onnx",
                "network": "models/detector.toml",
                "classes": "models/classes.txt"
            },
            "source": {"uri": "stub://yard", "width": 320, "height": 240},
            "threshold": 0.6,
            "monitored": ["dog", "fox"],
            "primary": "highest",
            "snapshot_dir": "captures",
            "cooldown_ms": 1500
        }"#,
    );

    std::env::set_var("ANIMAL_ALARM_CONFIG", file.path());
    std::env::set_var("ANIMAL_ALARM_THRESHOLD", "0.75");
    std::env::set_var("ANIMAL_ALARM_MONITORED", "bear, cow");
    std::env::set_var("ANIMAL_ALARM_ASSETS_DIR", "sounds");

    let cfg = AlarmConfig::load(None).expect("load config");

    assert_eq!(cfg.model.weights, PathBuf::from("models/detector.onnx"));
    assert_eq!(cfg.model.classes, PathBuf::from("models/classes.txt"));
    assert_eq!(cfg.source.uri, "stub://yard");
    assert_eq!((cfg.source.width, cfg.source.height), (320, 240));
    assert_eq!(cfg.threshold, 0.75);
    assert_eq!(cfg.monitored, vec!["bear", "cow"]);
    assert_eq!(cfg.primary, PrimaryPolicy::HighestConfidence);
    assert_eq!(cfg.snapshot_dir, PathBuf::from("captures"));
    assert_eq!(cfg.assets_dir, PathBuf::from("sounds"));
    assert_eq!(cfg.cooldown, Duration::from_millis(1500));

    clear_env();
}

#[test]
fn explicit_path_wins_over_env_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let from_env = write_config(r#"{"source": {"uri": "stub://env"}}"#);
    let explicit = write_config(r#"{"source": {"uri": "stub://explicit"}}"#);
    std::env::set_var("ANIMAL_ALARM_CONFIG", from_env.path());

    let cfg = AlarmConfig::load(Some(explicit.path())).expect("load config");
    assert_eq!(cfg.source.uri, "stub://explicit");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ANIMAL_ALARM_THRESHOLD", "1.5");
    assert!(AlarmConfig::load(None).is_err());
    clear_env();

    std::env::set_var("ANIMAL_ALARM_COOLDOWN_MS", "soon");
    assert!(AlarmConfig::load(None).is_err());
    clear_env();

    let file = write_config(r#"{"monitored": []}"#);
    assert!(AlarmConfig::load(Some(file.path())).is_err());

    let file = write_config(r#"{"source": {"uri": "http://camera.local/feed"}}"#);
    assert!(AlarmConfig::load(Some(file.path())).is_err());

    let file = write_config("not json");
    let err = AlarmConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
