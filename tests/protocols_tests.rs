use serde_json::json;
use xui_clients::errors::XuiError;
use xui_clients::protocols::{DEFAULT_SS_METHOD, build_client_record, create_client_settings};
use xui_clients::{ClientParameters, ClientRecord, IdentityField, Protocol};

#[test]
fn test_registry_table() {
    assert_eq!(Protocol::Vmess.required_secret(), "uuid");
    assert_eq!(Protocol::Vless.required_secret(), "uuid");
    assert_eq!(Protocol::Trojan.required_secret(), "password");
    assert_eq!(Protocol::Shadowsocks.required_secret(), "method");

    assert_eq!(Protocol::Vmess.identity_field(), IdentityField::Uuid);
    assert_eq!(Protocol::Vless.identity_field(), IdentityField::Uuid);
    assert_eq!(Protocol::Trojan.identity_field(), IdentityField::Password);
    assert_eq!(Protocol::Shadowsocks.identity_field(), IdentityField::Email);

    assert_eq!(IdentityField::Uuid.json_key(), "id");
}

#[test]
fn test_protocol_names() {
    assert_eq!("VLESS".parse::<Protocol>().unwrap(), Protocol::Vless);
    assert_eq!("Shadowsocks".parse::<Protocol>().unwrap(), Protocol::Shadowsocks);
    assert!(matches!(
        "wireguard".parse::<Protocol>(),
        Err(XuiError::Validation(_))
    ));

    for protocol in Protocol::ALL {
        assert_eq!(protocol.to_string().parse::<Protocol>().unwrap(), protocol);
        assert_eq!(serde_json::to_value(protocol).unwrap(), json!(protocol.as_str()));
    }
}

#[test]
fn test_vless_record() {
    let params = ClientParameters::new("alice@example.com")
        .with_uuid("b831381d-6324-4d53-ad4f-8cda48b30811")
        .with_flow("xtls-rprx-vision")
        .with_limits(3, 10_737_418_240, 1_735_689_600)
        .with_telegram_id("42")
        .with_subscription_id("alice-sub");

    let record = build_client_record(Protocol::Vless, &params).unwrap();

    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({
            "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
            "email": "alice@example.com",
            "enable": true,
            "flow": "xtls-rprx-vision",
            "limitIp": 3,
            "totalGB": 10_737_418_240_u64,
            "expiryTime": 1_735_689_600,
            "tgId": "42",
            "subId": "alice-sub"
        })
    );
}

#[test]
fn test_trojan_record_carries_only_password() {
    // A stray uuid on the parameters must not leak into a trojan record
    let params = ClientParameters::new("bob@example.com")
        .with_password("hunter2")
        .with_uuid("ignored");

    let record = build_client_record(Protocol::Trojan, &params).unwrap();
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["password"], "hunter2");
    assert!(value.get("id").is_none());
    assert!(value.get("method").is_none());
}

#[test]
fn test_missing_secrets() {
    let params = ClientParameters::new("carol@example.com");

    for protocol in [Protocol::Vmess, Protocol::Vless] {
        let err = build_client_record(protocol, &params).unwrap_err();
        assert!(matches!(err, XuiError::MissingSecret { field: "uuid", .. }));
        assert!(err.is_validation());
    }

    let err = build_client_record(Protocol::Trojan, &params).unwrap_err();
    assert!(matches!(err, XuiError::MissingSecret { field: "password", .. }));

    // Empty strings count as missing
    let empty = ClientParameters::new("carol@example.com").with_uuid("");
    assert!(build_client_record(Protocol::Vless, &empty).is_err());
}

#[test]
fn test_missing_email() {
    let params = ClientParameters::new("").with_uuid("b831381d-6324-4d53-ad4f-8cda48b30811");

    let err = build_client_record(Protocol::Vmess, &params).unwrap_err();

    assert!(matches!(err, XuiError::MissingField("email")));
}

#[test]
fn test_shadowsocks_method_defaults() {
    let params = ClientParameters::new("dave@example.com");

    let record = build_client_record(Protocol::Shadowsocks, &params).unwrap();
    assert_eq!(record.method.as_deref(), Some(DEFAULT_SS_METHOD));
    assert_eq!(DEFAULT_SS_METHOD, "aes-256-gcm");

    let settings = create_client_settings(Protocol::Shadowsocks, &params).unwrap();
    assert_eq!(settings.method.as_deref(), Some("aes-256-gcm"));
    assert_eq!(settings.clients[0].method, settings.method);
}

#[test]
fn test_shadowsocks_settings_mirror_custom_method() {
    let params = ClientParameters::new("erin@example.com").with_method("chacha20-ietf-poly1305");

    let settings = create_client_settings(Protocol::Shadowsocks, &params).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&settings.to_json_string().unwrap()).unwrap();

    assert_eq!(value["method"], "chacha20-ietf-poly1305");
    assert_eq!(value["clients"][0]["method"], "chacha20-ietf-poly1305");
    assert_eq!(value["decryption"], "none");
    assert_eq!(value["fallbacks"], json!([]));
}

#[test]
fn test_settings_without_top_level_method() {
    let params = ClientParameters::new("frank@example.com").with_password("pw");

    let settings = create_client_settings(Protocol::Trojan, &params).unwrap();
    let value = serde_json::to_value(&settings).unwrap();

    assert!(value.get("method").is_none());
    assert_eq!(value["clients"].as_array().unwrap().len(), 1);
}

#[test]
fn test_record_decoding_is_lenient() {
    let record: ClientRecord = serde_json::from_value(json!({
        "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
        "alterId": 0,
        "email": "grace@example.com",
        "tgId": 987654321,
        "reset": 30
    }))
    .unwrap();

    assert!(record.enable);
    assert_eq!(record.tg_id, "987654321");
    assert_eq!(record.total_gb, 0);
    assert_eq!(record.extra.get("alterId"), Some(&json!(0)));

    // Unknown fields survive re-encoding
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["reset"], 30);
    assert_eq!(value["tgId"], "987654321");
}

#[test]
fn test_identity_of_record() {
    let params = ClientParameters::new("heidi@example.com").with_password("pw");
    let record = build_client_record(Protocol::Trojan, &params).unwrap();

    assert_eq!(Protocol::Trojan.identity_of(&record).unwrap(), "pw");
    assert_eq!(Protocol::Shadowsocks.identity_of(&record).unwrap(), "heidi@example.com");
    assert!(matches!(
        Protocol::Vless.identity_of(&record),
        Err(XuiError::Validation(_))
    ));
}
