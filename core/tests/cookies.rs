use attribution_core::{
    clock::Clock,
    config::AttributionConfig,
    cookie::CookieAction,
    param::TrackedParameter,
    request::{CookieJar, PageRequest},
    resolver::AttributionResolver,
};

// ── Test helpers ────────────────────────────────────────────────────────────

const NOW: i64 = 1_700_000_000;

fn resolver_with(config: AttributionConfig) -> AttributionResolver {
    AttributionResolver::new(config)
}

fn request_with(query: &str, cookies: &[(&str, &str)], secure: bool) -> PageRequest {
    let mut jar = CookieJar::new();
    for (name, value) in cookies {
        jar.set(*name, *value);
    }
    PageRequest::from_query_string(query, jar, secure)
}

fn issue(resolver: &AttributionResolver, req: &PageRequest) -> Vec<CookieAction> {
    let snap = resolver.resolve(req);
    resolver.issue_cookies(req, &snap, Clock::fixed_at(NOW).now())
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A fresh value with no cookie issues a Set with the configured expiry:
/// exactly now + duration_days × 86400 seconds.
#[test]
fn issued_cookie_expiry_matches_configured_duration() {
    let config = AttributionConfig {
        cookie_duration_days: 30,
        ..AttributionConfig::default_test()
    };
    let req = request_with("_ref=ABC123", &[], true);
    let actions = issue(&resolver_with(config), &req);

    assert_eq!(actions.len(), 1);
    match &actions[0] {
        CookieAction::Set {
            name,
            value,
            expires_at,
            secure,
        } => {
            assert_eq!(name, "used_ref_id");
            assert_eq!(value, "ABC123");
            assert_eq!(expires_at.timestamp(), NOW + 30 * 24 * 60 * 60);
            assert!(*secure);
        }
        other => panic!("expected Set, got {other:?}"),
    }
}

/// The Secure attribute is tied to the request transport.
#[test]
fn secure_flag_follows_transport() {
    let r = resolver_with(AttributionConfig::default_test());

    let plain = request_with("lid=LAND1", &[], false);
    match &issue(&r, &plain)[0] {
        CookieAction::Set { secure, .. } => assert!(!*secure, "http request must not set Secure"),
        other => panic!("expected Set, got {other:?}"),
    }

    let tls = request_with("lid=LAND1", &[], true);
    match &issue(&r, &tls)[0] {
        CookieAction::Set { secure, .. } => assert!(*secure, "https request must set Secure"),
        other => panic!("expected Set, got {other:?}"),
    }
}

/// A cookie already holding the resolved value produces no directive —
/// resolving twice in a row in unchanged state is a no-op.
#[test]
fn unchanged_state_issues_no_directives() {
    let r = resolver_with(AttributionConfig::default_test());
    let req = request_with(
        "_ref=ABC123",
        &[("used_ref_id", "ABC123"), ("used_utm_source_id", "ads")],
        true,
    );
    let first = issue(&r, &req);
    let second = issue(&r, &req);
    assert!(first.is_empty(), "expected no directives, got {first:?}");
    assert_eq!(first, second);
}

/// With cookie tracking disabled, no directive is ever produced, even
/// with query parameters present.
#[test]
fn disabled_tracking_short_circuits() {
    let config = AttributionConfig {
        cookie_tracking_enabled: false,
        ..AttributionConfig::default_test()
    };
    let req = request_with("_ref=ABC123&utm_source=ads&cid=C1", &[], true);
    let actions = issue(&resolver_with(config), &req);
    assert!(actions.is_empty(), "expected none, got {actions:?}");
}

/// Every resolved parameter without a live cookie gets its own Set.
#[test]
fn one_directive_per_new_parameter() {
    let r = resolver_with(AttributionConfig::default_test());
    let req = request_with("_ref=R1&utm_source=ads&utm_medium=email", &[], true);
    let actions = issue(&r, &req);
    assert_eq!(actions.len(), 3);
    let names: Vec<&str> = actions.iter().map(|a| a.name()).collect();
    assert!(names.contains(&TrackedParameter::ReferralId.cookie_name()));
    assert!(names.contains(&TrackedParameter::UtmSource.cookie_name()));
    assert!(names.contains(&TrackedParameter::UtmMedium.cookie_name()));
}

/// A cookie-only value (no query arrival) is left alone — the fallback
/// path re-reads it but does not re-issue it.
#[test]
fn cookie_only_value_is_not_reissued() {
    let r = resolver_with(AttributionConfig::default_test());
    let req = request_with("", &[("used_utm_source_id", "newsletter")], true);
    let actions = issue(&r, &req);
    assert!(actions.is_empty(), "expected none, got {actions:?}");
}
