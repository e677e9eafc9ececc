mod support;

use chrono::Utc;
use fileshare_client::*;
use pretty_assertions::assert_eq;
use support::jwt_expiring_in;

// --- TokenPair ---

#[test]
fn opaque_token_has_no_expiry() {
    let pair = TokenPair::new("opaque", "rt");
    assert_eq!(pair.access_expiry(), None);
    assert!(!pair.expires_within_secs(3600));
}

#[test]
fn jwt_expiry_is_read_from_claims() {
    let pair = TokenPair::new(jwt_expiring_in(600), "rt");
    let exp = pair.access_expiry().unwrap();
    let delta = (exp - Utc::now()).num_seconds();
    assert!((595..=600).contains(&delta), "{delta}");
}

#[test]
fn expires_within_margin() {
    let pair = TokenPair::new(jwt_expiring_in(10), "rt");
    assert!(pair.expires_within_secs(30));
    assert!(!pair.expires_within_secs(1));
}

#[test]
fn already_expired_token() {
    let pair = TokenPair::new(jwt_expiring_in(-60), "rt");
    assert!(pair.expires_within_secs(0));
}

#[test]
fn extreme_margins_do_not_overflow() {
    let pair = TokenPair::new(jwt_expiring_in(60), "rt");
    assert!(pair.expires_within_secs(i64::MAX));
    assert!(!pair.expires_within_secs(i64::MIN));
}

#[test]
fn malformed_payload_has_no_expiry() {
    let pair = TokenPair::new("a.!!!.c", "rt");
    assert_eq!(pair.access_expiry(), None);
}

#[test]
fn token_pair_serde() {
    let pair = TokenPair::new("at", "rt");
    let json = serde_json::to_value(&pair).unwrap();
    assert_eq!(json, serde_json::json!({ "access_token": "at", "refresh_token": "rt" }));
}

// --- Upload types ---

#[test]
fn terminal_stages() {
    assert!(UploadStage::Complete.is_terminal());
    assert!(UploadStage::Failed.is_terminal());
    assert!(!UploadStage::Queued.is_terminal());
    assert!(!UploadStage::Encrypting.is_terminal());
    assert!(!UploadStage::Uploading.is_terminal());
}

#[test]
fn cancellable_stages() {
    assert!(UploadStage::Queued.is_cancellable());
    assert!(UploadStage::Encrypting.is_cancellable());
    assert!(!UploadStage::Uploading.is_cancellable());
    assert!(!UploadStage::Complete.is_cancellable());
}

#[test]
fn upload_stage_serializes_lowercase() {
    let json = serde_json::to_string(&UploadStage::Encrypting).unwrap();
    assert_eq!(json, "\"encrypting\"");
}

#[test]
fn task_ids_are_unique() {
    assert_ne!(TaskId::new(), TaskId::new());
}

// --- API payloads ---

#[test]
fn register_request_uses_confirm_password_key() {
    let req = RegisterRequest {
        email: "a@b.c".into(),
        full_name: "A".into(),
        password: "pw".into(),
        confirm_password: "pw".into(),
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["confirmPassword"], "pw");
    assert!(json.get("confirm_password").is_none());
}

#[test]
fn file_record_optional_fields() {
    let json = serde_json::json!({
        "id": "6f1c2a9e-2b7d-4c1e-9a55-0d7c3e8b1f42",
        "name": "a.txt",
        "size": 3,
        "created_at": "2024-01-01T00:00:00Z"
    });
    let record: FileRecord = serde_json::from_value(json).unwrap();
    assert_eq!(record.owner_username, None);
    assert_eq!(record.updated_at, None);
    assert_eq!(record.mime_type, "");
}

#[test]
fn user_defaults_missing_flags() {
    let user: User =
        serde_json::from_value(serde_json::json!({ "id": 3, "email": "x@y.z" })).unwrap();
    assert!(!user.mfa_enabled);
    assert_eq!(user.full_name, "");
}
