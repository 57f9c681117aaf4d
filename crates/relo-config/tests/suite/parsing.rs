use pretty_assertions::assert_eq;
use relo_config::{ConfigError, ConflictPolicy, LoggingConfig, MoveConfig, ReloConfig};

#[test]
fn empty_config_uses_defaults() {
    let config = ReloConfig::load_from_str("").unwrap();
    assert_eq!(config, ReloConfig::default());
    assert!(config.r#move.search_references);
    assert!(config.r#move.synthesize_outer_instance);
    assert_eq!(config.r#move.outer_instance_name_attempts, 1_000);
    assert_eq!(config.r#move.conflict_policy, ConflictPolicy::Abort);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn reads_move_and_logging_sections() {
    let config = ReloConfig::load_from_str(
        r#"
[move]
search_in_comments = true
synthesize_outer_instance = false
outer_instance_name_attempts = 3
conflict_policy = "proceed"

[logging]
level = "relo.move=debug"
json = true
"#,
    )
    .unwrap();
    assert_eq!(
        config.r#move,
        MoveConfig {
            search_in_comments: true,
            synthesize_outer_instance: false,
            outer_instance_name_attempts: 3,
            conflict_policy: ConflictPolicy::Proceed,
            ..MoveConfig::default()
        }
    );
    assert_eq!(
        config.logging,
        LoggingConfig {
            level: "relo.move=debug".to_string(),
            json: true,
        }
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let err = ReloConfig::load_from_str("[move]\nsearch_everywhere = true\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "{err}");
    assert!(err.to_string().contains("search_everywhere"), "{err}");
}

#[test]
fn zero_name_attempts_are_invalid() {
    let err = ReloConfig::load_from_str("[move]\nouter_instance_name_attempts = 0\n").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid value for `move.outer_instance_name_attempts`: must be at least 1"
    );
}

#[test]
fn unknown_conflict_policy_is_a_parse_error() {
    let err = ReloConfig::load_from_str("[move]\nconflict_policy = \"ask\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "{err}");
}
