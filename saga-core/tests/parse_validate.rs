use std::time::Duration;

use saga_core::{
    load_config_file, parse_config_str, validate_saga, ConfigFormat, ExecutionRequest, Saga, Step,
};

fn order_yaml() -> &'static str {
    r#"
sagas:
  - name: order
    description: Place an order
    metadata:
      team: checkout
    steps:
      - name: reserve
        action: inventory.reserve
        compensating_action: inventory.release
        timeout: 5s
      - name: charge
        action: payments.charge
        compensating_action: payments.refund
        timeout: 250ms
        requires: [reserve]
      - name: ship
        action: shipping.create
        requires: [charge]
"#
}

#[test]
fn parse_yaml_and_validate_ok() {
    let parsed = parse_config_str(order_yaml(), ConfigFormat::Yaml).unwrap();
    let saga = &parsed.config.sagas[0];
    validate_saga(saga).unwrap();
    assert_eq!(saga.steps.len(), 3);
    assert_eq!(saga.metadata["team"], "checkout");
    assert_eq!(saga.steps[1].timeout, Duration::from_millis(250));
    assert_eq!(saga.steps[2].compensating_action, None);
}

#[test]
fn parse_auto_detects_yaml() {
    let parsed = parse_config_str(order_yaml(), ConfigFormat::Auto).unwrap();
    assert_eq!(parsed.format, ConfigFormat::Yaml);
}

#[test]
fn parse_json_with_nanosecond_timeouts() {
    let json = r#"
{
  "sagas": [
    {
      "name": "order",
      "description": "",
      "steps": [
        { "name": "reserve", "action": "inventory.reserve", "compensating_action": "", "timeout": 2000000000, "requires": [], "metadata": {} }
      ],
      "metadata": {}
    }
  ]
}
"#;
    let parsed = parse_config_str(json, ConfigFormat::Auto).unwrap();
    assert_eq!(parsed.format, ConfigFormat::Json);
    let step = &parsed.config.sagas[0].steps[0];
    assert_eq!(step.timeout, Duration::from_secs(2));
    assert_eq!(step.compensating_action, None, "empty string means no compensation");
}

#[test]
fn parse_rejects_garbage() {
    assert!(parse_config_str("sagas: [ {", ConfigFormat::Auto).is_err());
    assert!(parse_config_str("{ \"sagas\": 3 }", ConfigFormat::Json).is_err());
}

#[test]
fn load_config_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sagas.yaml");
    std::fs::write(&path, order_yaml()).unwrap();

    let parsed = load_config_file(&path).unwrap();
    assert_eq!(parsed.config.sagas[0].name, "order");

    assert!(load_config_file(&dir.path().join("missing.yaml")).is_err());
}

#[test]
fn saga_serializes_timeouts_as_strings() {
    let saga = Saga::new("order").with_step(
        Step::new("reserve", "inventory.reserve").with_timeout(Duration::from_secs(90)),
    );
    let json = serde_json::to_value(&saga).unwrap();
    assert_eq!(json["steps"][0]["timeout"], "90s");
    let back: Saga = serde_json::from_value(json).unwrap();
    assert_eq!(back, saga);
}

#[test]
fn validation_collects_all_step_problems() {
    let saga = Saga::new("broken")
        .with_step(Step::new("a", ""))
        .with_step(Step::new("a", "do_a"))
        .with_step(Step::new("b", "do_b").requires("b").requires("ghost"))
        .with_step(Step::new("c", "do_c").requires("a").requires("a"));

    let err = validate_saga(&saga).unwrap_err();
    let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"steps[0].action"));
    assert!(paths.contains(&"steps[1].name"));
    assert!(paths.contains(&"steps[2].requires[0]"));
    assert!(paths.contains(&"steps[2].requires[1]"));
    assert!(paths.contains(&"steps[3].requires[1]"));
    assert_eq!(err.saga, "broken");
}

#[test]
fn validation_rejects_blank_names_only() {
    let step = Step::new("a", "do_a");
    assert!(validate_saga(&Saga::new("").with_step(step.clone())).is_err());
    assert!(validate_saga(&Saga::new("   ").with_step(step.clone())).is_err());
    assert!(validate_saga(&Saga::new("order-v2.1").with_step(step.clone())).is_ok());
    assert!(validate_saga(&Saga::new("Order Fulfillment").with_step(step)).is_ok());

    let err = validate_saga(&Saga::new("order").with_step(Step::new(" ", "do_a"))).unwrap_err();
    assert_eq!(err.violations[0].path, "steps[0].name");
}

#[test]
fn explicit_nulls_read_as_empty() {
    let json = r#"
{
  "sagas": [
    {
      "name": "order",
      "description": null,
      "metadata": null,
      "steps": [
        { "name": "reserve", "action": "inventory.reserve", "compensating_action": null, "timeout": 0, "requires": null, "metadata": null },
        { "name": "charge", "action": "payments.charge", "requires": ["reserve"], "metadata": null }
      ]
    }
  ]
}
"#;
    let parsed = parse_config_str(json, ConfigFormat::Json).unwrap();
    let saga = &parsed.config.sagas[0];
    validate_saga(saga).unwrap();
    assert!(saga.metadata.is_empty());
    assert!(saga.steps[0].requires.is_empty());
    assert!(saga.steps[0].metadata.is_empty());
    assert_eq!(saga.steps[1].requires, vec!["reserve".to_string()]);

    let parsed = parse_config_str(r#"{"sagas": null}"#, ConfigFormat::Json).unwrap();
    assert!(parsed.config.sagas.is_empty());
}

#[test]
fn execution_request_accepts_null_payload() {
    let request: ExecutionRequest =
        serde_json::from_str(r#"{"saga_name":"order","payload":null,"trace_id":null}"#).unwrap();
    assert_eq!(request.saga_name, "order");
    assert!(request.payload.is_empty());
    assert!(request.trace_id.is_empty());
}
