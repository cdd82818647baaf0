//! Tests for the cookie module

use super::*;
use crate::clock::FixedClock;
use crate::error::Error;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 5, 4, 12, 0, 0).unwrap()
}

fn store_at(root: &std::path::Path) -> CookieStore {
    CookieStore::new(root).with_clock(Arc::new(FixedClock::new(now())))
}

fn session_cookies(expires: DateTime<Utc>) -> CookieSet {
    [
        Cookie::new("JSESSIONID", "\"ajax:1234\"", ".www.linkedin.com", "/")
            .expires(expires)
            .secure(true),
        Cookie::new("li_at", "AQEDAR", ".www.linkedin.com", "/").expires(expires),
        Cookie::new("lang", "v=2&lang=en-us", ".linkedin.com", "/"),
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Cookie / CookieSet Tests
// ============================================================================

#[test]
fn test_cookie_debug_redacts_value() {
    let cookie = Cookie::new("li_at", "super-secret", "linkedin.com", "/");
    let debug = format!("{cookie:?}");
    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_cookie_expiry_is_strict() {
    let cookie = Cookie::new("JSESSIONID", "x", "d", "/").expires(now());
    assert!(!cookie.is_expired_at(now()));
    assert!(cookie.is_expired_at(now() + Duration::seconds(1)));

    let forever = Cookie::new("JSESSIONID", "x", "d", "/");
    assert!(!forever.is_expired_at(now() + Duration::days(100_000)));
}

#[test]
fn test_cookie_set_replaces_by_identity() {
    let mut set = CookieSet::new();
    set.insert(Cookie::new("a", "1", "d", "/"));
    set.insert(Cookie::new("b", "2", "d", "/"));
    set.insert(Cookie::new("a", "3", "d", "/"));
    set.insert(Cookie::new("a", "4", "d", "/other"));

    let values: Vec<_> = set.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, vec!["3", "2", "4"]);
}

#[test]
fn test_session_token_strips_quotes() {
    let set = session_cookies(now());
    assert_eq!(set.session_token("JSESSIONID"), Some("ajax:1234".to_string()));
    assert_eq!(set.session_token("missing"), None);

    assert_eq!(strip_quotes("\"abc\""), "abc");
    assert_eq!(strip_quotes("abc"), "abc");
    assert_eq!(strip_quotes("\"abc"), "\"abc");
}

#[test]
fn test_header_value() {
    let mut set = CookieSet::new();
    assert_eq!(set.header_value(), None);

    set.insert(Cookie::new("a", "1", "d", "/"));
    set.insert(Cookie::new("b", "\"2\"", "d", "/"));
    assert_eq!(set.header_value(), Some("a=1; b=\"2\"".to_string()));
}

// ============================================================================
// Store Tests
// ============================================================================

#[tokio::test]
async fn test_save_and_get_round_trip() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let cookies = session_cookies(now() + Duration::days(30));

    store.save(&cookies, "testuser").await.unwrap();
    let loaded = store.get("testuser").await.unwrap();

    assert_eq!(loaded, cookies);
    for (a, b) in loaded.iter().zip(cookies.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.value, b.value);
        assert_eq!(a.domain, b.domain);
        assert_eq!(a.path, b.path);
        assert_eq!(a.expires_at, b.expires_at);
        assert_eq!(a.secure, b.secure);
    }
}

#[tokio::test]
async fn test_round_trip_preserves_subsecond_expiry() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let expires = now() + Duration::milliseconds(86_400_123) + Duration::nanoseconds(456);
    let cookies: CookieSet = [Cookie::new("JSESSIONID", "v", "d", "/").expires(expires)]
        .into_iter()
        .collect();

    store.save(&cookies, "precise").await.unwrap();
    let loaded = store.get("precise").await.unwrap();
    assert_eq!(loaded.get("JSESSIONID").unwrap().expires_at, Some(expires));
}

#[tokio::test]
async fn test_get_missing_record_is_empty() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());

    let cookies = store.get("ghost").await.unwrap();
    assert!(cookies.is_empty());
    assert!(!store.exists("ghost").await.unwrap());
}

#[tokio::test]
async fn test_get_expired_session_cookie_fails() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let cookies = session_cookies(now() - Duration::days(1));

    store.save(&cookies, "testuserex").await.unwrap();
    let err = store.get("testuserex").await.unwrap_err();

    match err {
        Error::SessionExpired { user_id } => assert_eq!(user_id, "testuserex"),
        other => panic!("expected SessionExpired, got {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_non_identity_cookie_is_tolerated() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let mut cookies = session_cookies(now() + Duration::days(1));
    cookies.insert(Cookie::new("bcookie", "x", ".linkedin.com", "/").expires(now() - Duration::days(3)));

    store.save(&cookies, "mixed").await.unwrap();
    let loaded = store.get("mixed").await.unwrap();
    assert_eq!(loaded.len(), 4);
}

#[tokio::test]
async fn test_expiry_follows_injected_clock() {
    let dir = tempdir().unwrap();
    let clock = FixedClock::new(now());
    let store = CookieStore::new(dir.path()).with_clock(Arc::new(clock.clone()));
    let cookies = session_cookies(now() + Duration::hours(1));

    store.save(&cookies, "ticking").await.unwrap();
    assert!(store.get("ticking").await.is_ok());

    clock.advance(Duration::hours(2));
    assert!(matches!(
        store.get("ticking").await,
        Err(Error::SessionExpired { .. })
    ));
}

#[tokio::test]
async fn test_custom_session_cookie_name() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path()).with_session_cookie("li_at");
    let mut cookies = CookieSet::new();
    cookies.insert(Cookie::new("JSESSIONID", "a", "d", "/").expires(now() - Duration::days(1)));
    cookies.insert(Cookie::new("li_at", "b", "d", "/").expires(now() + Duration::days(1)));

    store.save(&cookies, "custom").await.unwrap();
    assert_eq!(store.get("custom").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_save_creates_root_lazily() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("nested").join("cookies");
    let store = store_at(&root);
    assert!(!root.exists());

    store
        .save(&session_cookies(now() + Duration::days(1)), "lazy")
        .await
        .unwrap();
    assert!(root.is_dir());
    assert!(store.exists("lazy").await.unwrap());
}

#[tokio::test]
async fn test_save_replaces_whole_record() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());

    store
        .save(&session_cookies(now() + Duration::days(1)), "replace")
        .await
        .unwrap();
    let smaller: CookieSet = [Cookie::new("JSESSIONID", "fresh", "d", "/")]
        .into_iter()
        .collect();
    store.save(&smaller, "replace").await.unwrap();

    assert_eq!(store.get("replace").await.unwrap(), smaller);
}

#[tokio::test]
async fn test_save_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    store
        .save(&session_cookies(now() + Duration::days(1)), "clean")
        .await
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["clean.json".to_string()]);
}

#[tokio::test]
async fn test_users_do_not_interfere() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let a: CookieSet = [Cookie::new("JSESSIONID", "a", "d", "/")].into_iter().collect();
    let b: CookieSet = [Cookie::new("JSESSIONID", "b", "d", "/")].into_iter().collect();

    let (ra, rb) = tokio::join!(store.save(&a, "alice@example.com"), store.save(&b, "bob"));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(store.get("alice@example.com").await.unwrap(), a);
    assert_eq!(store.get("bob").await.unwrap(), b);
}

#[tokio::test]
async fn test_concurrent_same_user_writes_last_writer_wins() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let set: CookieSet = [Cookie::new("JSESSIONID", format!("v{i}"), "d", "/")]
                .into_iter()
                .collect();
            store.save(&set, "racer").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whichever writer won, the record is one complete set
    let loaded = store.get("racer").await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.get("JSESSIONID").unwrap().value.starts_with('v'));
}

#[tokio::test]
async fn test_record_path_encodes_user_id() {
    let store = CookieStore::new("/tmp/cookies");
    let path = store.record_path("../evil/user").unwrap();
    assert_eq!(path.parent().unwrap(), std::path::Path::new("/tmp/cookies"));
    assert!(store.record_path("").is_err());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    store
        .save(&session_cookies(now() + Duration::days(1)), "bye")
        .await
        .unwrap();

    store.delete("bye").await.unwrap();
    store.delete("bye").await.unwrap();
    assert!(store.get("bye").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_record_is_storage_error() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

    assert!(matches!(
        store.get("broken").await,
        Err(Error::Storage { .. })
    ));
}

#[tokio::test]
async fn test_record_carries_metadata() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    store
        .save(&session_cookies(now() + Duration::days(1)), "meta")
        .await
        .unwrap();

    let record = store.load_record("meta").await.unwrap().unwrap();
    assert_eq!(record.user_id, "meta");
    assert_eq!(record.saved_at, now());
}
