use std::path::PathBuf;

use sclink::config::{load_config_flags, parse_flag_tokens, validate_config, ConfigFlags};
use sclink::session::{Session, SessionError};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".sclinkrc");
    let content = r#"
# studio machine
--osc-host 10.0.0.5

--osc-port=57130
   
--sclang-path /Applications/SuperCollider.app/Contents/MacOS/sclang
"#;
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert_eq!(flags.osc_host.as_deref(), Some("10.0.0.5"));
    assert_eq!(flags.osc_port, Some(57130));
    assert_eq!(
        flags.sclang_path,
        Some(PathBuf::from("/Applications/SuperCollider.app/Contents/MacOS/sclang"))
    );
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".sclinkrc");
    std::fs::write(&path, "--quiet\n--osc-port 57200\n--lsp-port 57201\n").unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "sclink".to_string(),
        "--osc-port".to_string(),
        "57300".to_string(),
        "--no-language-server".to_string(),
        "status".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.quiet, "file flags should remain enabled");
    assert!(effective.no_language_server, "cli flags should be applied");
    assert_eq!(effective.osc_port, Some(57300), "cli should override port");
    assert_eq!(
        effective.lsp_port,
        Some(57201),
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_global_then_local_then_cli_layering() {
    let dir = tempfile::tempdir().unwrap();
    let global = dir.path().join("config");
    let local = dir.path().join(".sclinkrc");
    std::fs::write(&global, "--osc-host 10.0.0.1\n--osc-port 57200\n").unwrap();
    std::fs::write(&local, "--osc-port 57210\n").unwrap();

    let config = load_config_flags(&global)
        .unwrap()
        .union(&load_config_flags(&local).unwrap())
        .union(&ConfigFlags::default())
        .resolve();
    assert_eq!(config.osc_host, "10.0.0.1");
    assert_eq!(config.osc_port, 57210);
    assert_eq!(config.language_server_port, 57121);
}

#[test]
fn test_out_of_range_port_from_file_rejects_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".sclinkrc");
    std::fs::write(&path, "--lsp-port 70000\n").unwrap();

    let config = load_config_flags(&path).unwrap().resolve();
    assert_eq!(
        validate_config(&config),
        vec!["languageServerPort must be between 1 and 65535".to_string()]
    );
    match Session::new(config) {
        Err(SessionError::InvalidConfig(errors)) => assert_eq!(errors.len(), 1),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session should reject the port"),
    }
}
