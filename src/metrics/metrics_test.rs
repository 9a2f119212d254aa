use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("ngas".to_string()), None).unwrap();
    register_custom_metrics(&registry).unwrap();
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    DELIVERED_FILES.with_label_values(&["metrics-test-a"]).inc();
    let metric_names: Vec<_> = registry
        .gather()
        .iter()
        .map(|m| m.get_name().to_string())
        .collect();

    assert!(
        metric_names.contains(&"ngas_delivered_files_total".to_string()),
        "Missing ngas_delivered_files_total"
    );
}

#[test]
fn test_double_registration_is_rejected() {
    let registry = create_test_registry();
    assert!(register_custom_metrics(&registry).is_err());
}

#[test]
fn test_counter_increment() {
    let before = DELIVERY_FAILURES.with_label_values(&["metrics-test-b"]).get();

    DELIVERY_FAILURES.with_label_values(&["metrics-test-b"]).inc();
    DELIVERY_FAILURES.with_label_values(&["metrics-test-b"]).inc();

    let value = DELIVERY_FAILURES.with_label_values(&["metrics-test-b"]).get();
    assert_eq!(value, before + 2, "Counter should increment correctly");
}

#[test]
fn test_gather_text_renders_exposition_format() {
    let registry = create_test_registry();
    QUEUED_FILES.with_label_values(&["metrics-test-c"]).set(4);

    let text = gather_text(&registry);
    assert!(text.contains("ngas_queued_files{subscriber=\"metrics-test-c\"} 4"));
}
