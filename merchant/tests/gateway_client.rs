//! Gateway client tests against a mock gateway.

use merchant::{
    GatewayClient, GatewayConfig, GatewayError, ParamSet, PaymentNotificationHandler,
    gateway::{JSON_FIELD, PaymentRequest},
    signature::{self, HashAlgorithm, SIGNATURE_FIELD},
};
use std::sync::Arc;
use url::{Url, form_urlencoded};
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path},
};

const REQUEST_KEY: &str = "request-key";
const RESULT_KEY: &str = "result-key";

struct IgnoreNotifications;

impl PaymentNotificationHandler for IgnoreNotifications {
    fn on_success(&self, _order_id: &str, _params: &ParamSet) {}
    fn on_fail(&self, _order_id: &str, _params: &ParamSet) {}
}

fn config(api_url: &str) -> GatewayConfig {
    GatewayConfig {
        outlet_id: "OUT1".to_string(),
        secret_key: REQUEST_KEY.to_string(),
        secret_key_result: RESULT_KEY.to_string(),
        hash_algo: HashAlgorithm::Md5,
        result_url: Url::parse("https://shop.example/sptest/result.php").unwrap(),
        strong_ssl: true,
        api_url: Url::parse(api_url).unwrap(),
        timeout_secs: 5,
    }
}

async fn client_for(server: &MockServer) -> GatewayClient {
    let api_url = format!("{}/sp/", server.uri());
    GatewayClient::try_new(&config(&api_url), Arc::new(IgnoreNotifications)).unwrap()
}

/// Parameter set carried in the `sp_json` form field of a captured request.
fn sent_params(request: &Request) -> ParamSet {
    let json = form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == JSON_FIELD)
        .map(|(_, value)| value.into_owned())
        .expect("request carries sp_json");
    ParamSet::from_json(serde_json::from_str(&json).unwrap()).unwrap()
}

fn assert_signed_for(params: &ParamSet, resource: &str) {
    let sig = params.get_string(SIGNATURE_FIELD).expect("request is signed");
    assert!(params.get_string("sp_salt").is_some_and(|salt| !salt.is_empty()));
    assert!(signature::verify(
        params,
        resource,
        REQUEST_KEY,
        HashAlgorithm::Md5,
        &sig
    ));
}

async fn single_request(server: &MockServer) -> Request {
    let mut requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    requests.remove(0)
}

#[tokio::test]
async fn test_direct_payment_posts_signed_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/init_payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sp_status": "ok",
            "sp_redirect_url": "https://pay.example/checkout/abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let payment = PaymentRequest::new(1001, 100.0, "Test payment")
        .with_client_email("payer@example.com")
        .with_payment_system("TEST");
    let response = client.direct_payment(&payment).await.unwrap();

    assert_eq!(
        response.get_string("sp_redirect_url").as_deref(),
        Some("https://pay.example/checkout/abc")
    );

    let request = single_request(&server).await;
    let sent = sent_params(&request);
    assert_eq!(sent.get_string("sp_outlet_id").as_deref(), Some("OUT1"));
    assert_eq!(sent.get_string("sp_order_id").as_deref(), Some("1001"));
    assert_eq!(sent.get_string("sp_amount").as_deref(), Some("100"));
    assert_eq!(sent.get_string("sp_lifetime").as_deref(), Some("86400"));
    assert_eq!(
        sent.get_string("sp_user_contact_email").as_deref(),
        Some("payer@example.com")
    );
    assert_eq!(
        sent.get_string("sp_result_url").as_deref(),
        Some("https://shop.example/sptest/result.php")
    );
    assert!(!sent.contains_key("sp_user_name"));
    assert_signed_for(&sent, "init_payment");
}

#[tokio::test]
async fn test_refund_defaults_to_full_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/refund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sp_status": "ok"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.refund_by_order_id(1001, None, None).await.unwrap();

    let sent = sent_params(&single_request(&server).await);
    assert_eq!(sent.get_string("sp_order_id").as_deref(), Some("1001"));
    assert_eq!(sent.get_string("sp_refund_amount").as_deref(), Some("0"));
    assert_eq!(sent.get_string("sp_description").as_deref(), Some("Refund"));
    assert!(!sent.contains_key("sp_payment_id"));
    assert_signed_for(&sent, "refund");
}

#[tokio::test]
async fn test_partial_refund_by_transaction_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/refund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sp_status": "ok"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .refund_by_transaction_id(555, Some(25.5), Some("Damaged item"))
        .await
        .unwrap();

    let sent = sent_params(&single_request(&server).await);
    assert_eq!(sent.get_string("sp_payment_id").as_deref(), Some("555"));
    assert_eq!(sent.get_string("sp_refund_amount").as_deref(), Some("25.5"));
    assert_eq!(sent.get_string("sp_description").as_deref(), Some("Damaged item"));
    assert_signed_for(&sent, "refund");
}

#[tokio::test]
async fn test_status_queries_use_matching_identifier() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/get_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sp_status": "ok",
            "sp_transaction_status": "success"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let by_order = client.order_status_by_order_id(1001).await.unwrap();
    assert_eq!(
        by_order.get_string("sp_transaction_status").as_deref(),
        Some("success")
    );
    client.order_status_by_transaction_id(777).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let first = sent_params(&requests[0]);
    let second = sent_params(&requests[1]);
    assert_eq!(first.get_string("sp_order_id").as_deref(), Some("1001"));
    assert!(!first.contains_key("sp_payment_id"));
    assert_eq!(second.get_string("sp_payment_id").as_deref(), Some("777"));
    assert_signed_for(&first, "get_status");
    assert_signed_for(&second, "get_status");
    assert_ne!(first.get_string("sp_salt"), second.get_string("sp_salt"));
}

#[tokio::test]
async fn test_recurring_payment_without_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/make_recurring_payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sp_status": "ok"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .recurring_payment("profile-9", 2002, "Monthly plan", None)
        .await
        .unwrap();

    let sent = sent_params(&single_request(&server).await);
    assert_eq!(sent.get_string("sp_recurring_profile").as_deref(), Some("profile-9"));
    assert_eq!(sent.get_string("sp_order_id").as_deref(), Some("2002"));
    assert!(!sent.contains_key("sp_amount"));
    assert_signed_for(&sent, "make_recurring_payment");
}

#[tokio::test]
async fn test_payment_systems_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/ps_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sp_status": "ok",
            "sp_payment_systems": [{"name": "TEST"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.payment_systems(100.0).await.unwrap();
    assert!(response.get("sp_payment_systems").is_some());

    let sent = sent_params(&single_request(&server).await);
    assert_eq!(sent.get_string("sp_amount").as_deref(), Some("100"));
    assert_signed_for(&sent, "ps_list");
}

#[tokio::test]
async fn test_non_json_response_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/get_status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.order_status_by_order_id(1).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode { .. }));
}

#[tokio::test]
async fn test_scalar_json_response_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/get_status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"ok\""))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.order_status_by_order_id(1).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode { .. }));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sp/refund"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.refund_by_order_id(1, None, None).await.unwrap_err();
    match err {
        GatewayError::HttpStatus { status, body, .. } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_gateway_is_a_transport_error() {
    let client = GatewayClient::try_new(
        &config("http://127.0.0.1:1/sp/"),
        Arc::new(IgnoreNotifications),
    )
    .unwrap();
    let err = client.payment_systems(10.0).await.unwrap_err();
    assert!(matches!(err, GatewayError::Http { .. }));
}

#[test]
fn test_redirect_url_carries_signed_query() {
    let client = GatewayClient::try_new(
        &config("https://api.simplepay.pro/sp/"),
        Arc::new(IgnoreNotifications),
    )
    .unwrap();
    let payment = PaymentRequest::new(1001, 100.0, "Test payment").with_recurring_start(true);
    let url = client.payment_redirect_url(&payment);

    assert_eq!(url.path(), "/sp/payment");
    let params = ParamSet::from_pairs(url.query_pairs().into_owned());
    assert_eq!(params.get_string("sp_order_id").as_deref(), Some("1001"));
    assert_eq!(params.get_string("sp_recurring_start").as_deref(), Some("1"));
    assert_signed_for(&params, "payment");
}
