//! Tests for shard-talk configuration loading.

use lion_error::{ConfigErrorKind, LionErrorKind};
use lion_talk::{Address, PeerId, PeerSettings, TalkConfig};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[server]
host = "10.0.0.2"
port = 6000

[peer]
appname = "leo"
host = "10.0.0.3"
port = 6001
shard_count = 4
shard_id = 3

[reconnect]
interval_ms = 500
jitter_ms = 100
"#
    )
    .unwrap();

    let config = TalkConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server, Address::new("10.0.0.2", 6000));
    assert_eq!(config.peer.peer_id(), PeerId::from("leo_04_03"));
    assert_eq!(config.reconnect.interval_ms, 500);

    let settings = PeerSettings::from_config(&config);
    assert_eq!(settings.appid(), &PeerId::from("leo_04_03"));
    assert_eq!(settings.basename(), "leo");
    assert_eq!(settings.address(), &Address::new("10.0.0.3", 6001));
    let delay = settings.reconnect().delay();
    assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_millis(600));
}

#[test]
fn test_reconnect_section_is_optional() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[server]
host = "127.0.0.1"
port = 5000

[peer]
appname = "analytics"
host = "127.0.0.1"
port = 0
"#
    )
    .unwrap();

    let config = TalkConfig::from_file(file.path()).unwrap();
    assert_eq!(config.peer.peer_id(), PeerId::from("analytics_01_00"));
    assert_eq!(config.reconnect.delay(), Duration::from_secs(30));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = TalkConfig::from_file(&path).unwrap_err();
    match err.kind() {
        LionErrorKind::Config(config) => {
            assert!(matches!(config.kind(), ConfigErrorKind::Read { .. }));
            assert_eq!(config.origin(), path.display().to_string());
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_incomplete_file_is_parse_error() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "[server]\nhost = \"127.0.0.1\"\nport = 5000\n").unwrap();

    let err = TalkConfig::from_file(file.path()).unwrap_err();
    match err.kind() {
        LionErrorKind::Config(config) => {
            assert!(matches!(config.kind(), ConfigErrorKind::Parse { .. }));
            assert_eq!(config.origin(), file.path().display().to_string());
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}
