// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_a_full_config() {
    let config = HostConfig::from_toml(
        r#"
        [[listen]]
        address = "127.0.0.1:8080"
        pipeline = "inbound"

        [[task]]
        pipeline = "tick"
        period_ms = 5000

        [[watch]]
        path = "routes.json"
        pipeline = "reload"
        "#,
    )
    .unwrap();

    assert_eq!(config.listen.len(), 1);
    assert_eq!(config.listen[0].address, "127.0.0.1:8080");
    assert_eq!(config.task[0].period(), Some(Duration::from_millis(5000)));
    // Watch period defaults when omitted.
    assert_eq!(config.watch[0].period(), Duration::from_millis(1000));
}

#[test]
fn empty_config_is_valid() {
    let config = HostConfig::from_toml("").unwrap();
    assert!(config.listen.is_empty());
    assert!(config.task.is_empty());
    assert!(config.watch.is_empty());
}

#[test]
fn one_shot_task_has_no_period() {
    let config = HostConfig::from_toml(
        r#"
        [[task]]
        pipeline = "once"
        "#,
    )
    .unwrap();
    assert_eq!(config.task[0].period(), None);
}

#[test]
fn invalid_toml_is_a_config_error() {
    let err = HostConfig::from_toml("[[listen]]\nnope").unwrap_err();
    assert!(matches!(err, AdapterError::Config(_)));
}
