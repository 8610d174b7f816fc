use attribution_core::{
    clock::Clock,
    config::{AttributionConfig, CookieIssuePoint},
    cookie::CookieAction,
    error::AttributionError,
    pipeline::{AttributionPipeline, SUBMITTED_AT_KEY},
    request::{CookieJar, PageRequest},
    store::AttributionStore,
};

// ── Test helpers ────────────────────────────────────────────────────────────

const NOW: i64 = 1_700_000_000;

fn make_pipeline(config: AttributionConfig) -> AttributionPipeline {
    let store = AttributionStore::in_memory().unwrap();
    store.migrate().unwrap();
    AttributionPipeline::with_config(store, config, Clock::fixed_at(NOW))
}

fn empty_request() -> PageRequest {
    PageRequest::from_query_string("", CookieJar::new(), true)
}

/// Hidden fields as a checkout form would post them back.
fn posted(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Submission writes one `<name>_order` key per non-empty posted field
/// and nothing for empty ones.
#[test]
fn submission_writes_order_keys_for_non_empty_fields() {
    let p = make_pipeline(AttributionConfig::default_test());
    let fields = posted(&[("_ref", "ABC123"), ("utm_source", "newsletter"), ("lid", "")]);
    p.on_checkout_submitted("order-1", &fields, &empty_request())
        .unwrap();

    let store = p.store();
    assert_eq!(
        store.order_meta("order-1", "referral_id_order").unwrap(),
        Some("ABC123".into())
    );
    assert_eq!(
        store.order_meta("order-1", "utm_source_order").unwrap(),
        Some("newsletter".into())
    );
    assert_eq!(store.order_meta("order-1", "landing_id_order").unwrap(), None);
}

/// Order metadata is write-once: a second submission for the same order
/// cannot overwrite the recorded attribution.
#[test]
fn order_meta_is_write_once() {
    let p = make_pipeline(AttributionConfig::default_test());
    p.on_checkout_submitted("order-1", &posted(&[("_ref", "FIRST")]), &empty_request())
        .unwrap();
    p.on_checkout_submitted("order-1", &posted(&[("_ref", "SECOND")]), &empty_request())
        .unwrap();

    assert_eq!(
        p.store().order_meta("order-1", "referral_id_order").unwrap(),
        Some("FIRST".into())
    );
}

/// Completion with {referral_id, utm_source} writes exactly two
/// `_completed` order keys and mirrors them onto the customer.
#[test]
fn completion_writes_exactly_the_non_empty_keys() {
    let p = make_pipeline(AttributionConfig::default_test());
    let fields = posted(&[("_ref", "ABC123"), ("utm_source", "newsletter")]);
    p.on_checkout_submitted("order-1", &fields, &empty_request())
        .unwrap();
    p.on_order_completed("order-1", Some("cust-9"), true).unwrap();

    let store = p.store();
    let completed: Vec<(String, String)> = store
        .order_meta_all("order-1")
        .unwrap()
        .into_iter()
        .filter(|(k, _)| k.ends_with("_completed"))
        .collect();
    assert_eq!(
        completed,
        vec![
            ("referral_id_completed".to_string(), "ABC123".to_string()),
            ("utm_source_completed".to_string(), "newsletter".to_string()),
        ]
    );

    assert_eq!(
        store.customer_meta("cust-9", "referral_id_completed").unwrap(),
        Some("ABC123".into())
    );
    assert_eq!(
        store.customer_meta("cust-9", "utm_source_completed").unwrap(),
        Some("newsletter".into())
    );
}

/// A guest order (no identified purchaser) writes order keys only.
#[test]
fn guest_completion_skips_customer_meta() {
    let p = make_pipeline(AttributionConfig::default_test());
    p.on_checkout_submitted("order-2", &posted(&[("_ref", "R2")]), &empty_request())
        .unwrap();
    p.on_order_completed("order-2", None, true).unwrap();

    assert_eq!(
        p.store().order_meta("order-2", "referral_id_completed").unwrap(),
        Some("R2".into())
    );
    assert!(p.store().customer_ids().unwrap().is_empty());
}

/// With the marker configured at completion time, submission issues no
/// cookie and completion issues the used marker for the referral id.
#[test]
fn used_marker_at_completion() {
    let p = make_pipeline(AttributionConfig {
        used_cookie_issued_at: CookieIssuePoint::Completion,
        ..AttributionConfig::default_test()
    });
    let at_submit = p
        .on_checkout_submitted("order-3", &posted(&[("_ref", "MARK1")]), &empty_request())
        .unwrap();
    assert!(at_submit.is_empty());

    let at_complete = p.on_order_completed("order-3", None, true).unwrap();
    match &at_complete[..] {
        [CookieAction::Set { name, value, .. }] => {
            assert_eq!(name, "used_ref_id");
            assert_eq!(value, "MARK1");
        }
        other => panic!("expected the used marker, got {other:?}"),
    }
}

/// With the marker configured at submission time, the roles swap.
#[test]
fn used_marker_at_submission() {
    let p = make_pipeline(AttributionConfig {
        used_cookie_issued_at: CookieIssuePoint::Submission,
        ..AttributionConfig::default_test()
    });
    let at_submit = p
        .on_checkout_submitted("order-4", &posted(&[("_ref", "MARK2")]), &empty_request())
        .unwrap();
    match &at_submit[..] {
        [CookieAction::Set { name, value, .. }] => {
            assert_eq!(name, "used_ref_id");
            assert_eq!(value, "MARK2");
        }
        other => panic!("expected the used marker, got {other:?}"),
    }

    let at_complete = p.on_order_completed("order-4", None, true).unwrap();
    assert!(at_complete.is_empty());
}

/// An order without a tracked referral id never produces a marker.
#[test]
fn no_referral_id_no_marker() {
    let p = make_pipeline(AttributionConfig::default_test());
    p.on_checkout_submitted("order-5", &posted(&[("utm_source", "ads")]), &empty_request())
        .unwrap();
    let actions = p.on_order_completed("order-5", None, true).unwrap();
    assert!(actions.is_empty());
}

/// Completing an order that never went through submission is a caller
/// bug and surfaces as an error rather than silently writing nothing.
#[test]
fn completion_without_submission_errors() {
    let p = make_pipeline(AttributionConfig::default_test());
    let err = p.on_order_completed("ghost-order", None, true).unwrap_err();
    assert!(matches!(err, AttributionError::OrderNotSubmitted { .. }));
}

/// Bookkeeping keys carry an underscore prefix; every other order-meta
/// key a submission writes is a `<name>_order` attribution value, so a
/// consumer iterating the metadata can split the two by prefix.
#[test]
fn bookkeeping_keys_are_underscore_prefixed() {
    let p = make_pipeline(AttributionConfig::default_test());
    let fields = posted(&[("_ref", "R7"), ("utm_source", "ads")]);
    p.on_checkout_submitted("order-7", &fields, &empty_request())
        .unwrap();

    let keys: Vec<String> = p
        .store()
        .order_meta_all("order-7")
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert!(SUBMITTED_AT_KEY.starts_with('_'));
    assert!(keys.contains(&SUBMITTED_AT_KEY.to_string()));
    for key in keys.iter().filter(|k| !k.starts_with('_')) {
        assert!(key.ends_with("_order"), "unexpected attribution key {key}");
    }
}

/// Recorded attribution survives the store connection: a second
/// connection to the same database sees the submitted order keys.
#[test]
fn order_meta_survives_a_store_reopen() {
    let store =
        AttributionStore::open("file:order_meta_reopen?mode=memory&cache=shared").unwrap();
    store.migrate().unwrap();
    let p = AttributionPipeline::with_config(
        store,
        AttributionConfig::default_test(),
        Clock::fixed_at(NOW),
    );
    p.on_checkout_submitted("order-8", &posted(&[("_ref", "R8")]), &empty_request())
        .unwrap();

    // The original connection stays alive, keeping the shared-memory
    // database around for the second one.
    let reopened = p.store().reopen().unwrap();
    assert_eq!(
        reopened.order_meta("order-8", "referral_id_order").unwrap(),
        Some("R8".into())
    );
}

/// With the whole system disabled, submission and completion write
/// nothing at all.
#[test]
fn disabled_system_writes_no_metadata() {
    let p = make_pipeline(AttributionConfig {
        enabled: false,
        ..AttributionConfig::default_test()
    });
    p.on_checkout_submitted("order-6", &posted(&[("_ref", "R6")]), &empty_request())
        .unwrap();
    let actions = p.on_order_completed("order-6", None, true).unwrap();
    assert!(actions.is_empty());
    assert!(p.store().order_meta_all("order-6").unwrap().is_empty());
    assert!(p.store().customer_ids().unwrap().is_empty());
}
