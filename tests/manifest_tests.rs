mod common;

use common::*;
use manifest_runner::prelude::*;
use manifest_runner::{ParseError, VariableError};
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_default_used_when_unset() {
    let manifest = parse(
        "m",
        "deploy config=bundle.yaml target=t timeout=${MOJO_DEPLOY_TIMEOUT:-5400}",
        &HashMap::new(),
    )
    .unwrap();
    assert_eq!(manifest.steps[0].arg("timeout"), Some("5400"));

    let manifest = parse(
        "m",
        "deploy config=bundle.yaml target=t timeout=${MOJO_DEPLOY_TIMEOUT:-5400}",
        &env(&[("MOJO_DEPLOY_TIMEOUT", "10")]),
    )
    .unwrap();
    assert_eq!(manifest.steps[0].arg("timeout"), Some("10"));
}

#[test]
fn test_unresolved_variable_reports_line() {
    let err = parse(
        "m",
        "collect config=collect\ndeploy config=${BUNDLE} target=t\n",
        &HashMap::new(),
    )
    .unwrap_err();
    match err {
        ParseError::Variable { line, source } => {
            assert_eq!(line, 2);
            assert_eq!(source, VariableError::Unresolved("BUNDLE".to_string()));
        }
        other => panic!("expected variable error, got {other:?}"),
    }
}

#[test]
fn test_round_trip_is_whitespace_insensitive() {
    let env = env(&[("MOJO_SERIES", "trusty")]);
    let messy = "deploy    wait=true   config=keystone.yaml\ttarget=${MOJO_SERIES}-kilo\n\
                 verify config=check.py   fatal=false  MSG='hello world'\n";
    let tidy = "deploy config=keystone.yaml target=trusty-kilo wait=true\n\
                verify config=check.py MSG=\"hello world\" fatal=false\n";

    let first = parse("m", messy, &env).unwrap();
    let second = parse("m", tidy, &env).unwrap();
    assert_eq!(first.steps, second.steps);

    let reparsed = parse("m", &first.to_string(), &env).unwrap();
    assert_eq!(reparsed.steps, first.steps);
    assert_eq!(reparsed.to_string(), first.to_string());
}

#[test]
fn test_round_trip_keeps_resolved_placeholders_literal() {
    let env = env(&[("PW", "x${Y}"), ("Y", "leaked")]);
    let manifest = parse("m", "script config=a.sh PASS=${PW}\n", &env).unwrap();
    assert_eq!(manifest.steps[0].arg("PASS"), Some("x${Y}"));

    let canonical = manifest.to_string();
    assert_eq!(canonical, "script config=a.sh PASS=x$${Y}\n");

    let reparsed = parse("m", &canonical, &env).unwrap();
    assert_eq!(reparsed.steps, manifest.steps);
}

#[test]
fn test_round_trip_value_with_both_quotes() {
    let env = env(&[("MSG", r#"say "it's" now"#)]);
    let manifest = parse("m", "verify config=check.py MSG=${MSG} fatal=false\n", &env).unwrap();
    assert_eq!(manifest.steps[0].arg("MSG"), Some(r#"say "it's" now"#));

    let reparsed = parse("m", &manifest.to_string(), &HashMap::new()).unwrap();
    assert_eq!(reparsed.steps, manifest.steps);
    assert_eq!(reparsed.to_string(), manifest.to_string());
}

#[test]
fn test_parse_errors_abort_before_run() {
    assert!(matches!(
        parse("m", "reboot config=all", &HashMap::new()),
        Err(ParseError::UnknownStepKind { line: 1, .. })
    ));
    assert!(matches!(
        parse("m", "verify timeout=10", &HashMap::new()),
        Err(ParseError::MissingConfig { line: 1, .. })
    ));
    assert!(matches!(
        parse("m", "# only comments\n\n", &HashMap::new()),
        Err(ParseError::EmptyManifest(_))
    ));
}

#[test]
fn test_loader_and_runner_config_from_directory() {
    let dir = create_test_dir();
    write_runner_config(
        dir.path(),
        "default_timeout: 90s\nenv:\n  MOJO_SERIES: xenial\n",
    );
    write_manifest(
        dir.path(),
        "manifest",
        "collect config=collect-${MOJO_SERIES}\nscript config=post-deploy\n",
    );
    write_manifest(dir.path(), "upgrade.manifest", "script config=upgrade.sh\n");

    let config = RunnerConfig::load(dir.path().join("runner.yaml")).unwrap();
    assert_eq!(
        config.default_timeout,
        Some(std::time::Duration::from_secs(90))
    );

    let manifests = ManifestLoader::load_directory(dir.path(), &config.env).unwrap();
    assert_eq!(manifests.len(), 2);
    assert_eq!(manifests[0].name, "manifest");
    assert_eq!(manifests[0].steps[0].config, "collect-xenial");
    assert_eq!(manifests[1].name, "upgrade");
}

#[test]
fn test_runner_config_yaml_error() {
    let dir = create_test_dir();
    write_runner_config(dir.path(), "commands: [not, a, mapping]\n");

    let err = RunnerConfig::load(dir.path().join("runner.yaml")).unwrap_err();
    assert!(matches!(err, LoadError::Yaml { .. }));
}
