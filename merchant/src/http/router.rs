use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRef, Path, Query, RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use log::{error, warn};
use merchant::{
    GatewayClient, GatewayError, NotificationEnvelope, NotificationError, ParamSet,
    gateway::{PaymentRequest, RecurringPaymentRequest, RefundRequest},
};
use std::sync::Arc;

use super::{
    config::Config,
    model::{ErrorResponse, PaymentSystemsQuery},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<GatewayClient>,
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<GatewayClient> {
    fn from_ref(state: &AppState) -> Self {
        state.gateway.clone()
    }
}

pub const PAYMENTS_ROUTE: &str = "/payments";
pub const DIRECT_PAYMENTS_ROUTE: &str = "/payments/direct";
pub const PAYMENT_SYSTEMS_ROUTE: &str = "/payment-systems";
pub const ORDER_STATUS_ROUTE: &str = "/orders/{order_id}/status";
pub const ORDER_REFUND_ROUTE: &str = "/orders/{order_id}/refund";
pub const TRANSACTION_STATUS_ROUTE: &str = "/transactions/{transaction_id}/status";
pub const TRANSACTION_REFUND_ROUTE: &str = "/transactions/{transaction_id}/refund";
pub const RECURRING_ROUTE: &str = "/recurring";

/// Merchant API routes. The result URL path must not coincide with any of them.
pub const API_ROUTES: &[&str] = &[
    PAYMENTS_ROUTE,
    DIRECT_PAYMENTS_ROUTE,
    PAYMENT_SYSTEMS_ROUTE,
    ORDER_STATUS_ROUTE,
    ORDER_REFUND_ROUTE,
    TRANSACTION_STATUS_ROUTE,
    TRANSACTION_REFUND_ROUTE,
    RECURRING_ROUTE,
];

pub fn build_router(state: AppState) -> Router {
    // The gateway posts results to whatever path the outlet's result URL names.
    let result_path = state.config.gateway.result_url.path().to_string();

    Router::new()
        .route(&result_path, get(handle_result).post(handle_result))
        .route(PAYMENTS_ROUTE, post(handle_payment))
        .route(DIRECT_PAYMENTS_ROUTE, post(handle_direct_payment))
        .route(PAYMENT_SYSTEMS_ROUTE, get(handle_payment_systems))
        .route(ORDER_STATUS_ROUTE, get(handle_order_status))
        .route(ORDER_REFUND_ROUTE, post(handle_order_refund))
        .route(TRANSACTION_STATUS_ROUTE, get(handle_transaction_status))
        .route(TRANSACTION_REFUND_ROUTE, post(handle_transaction_refund))
        .route(RECURRING_ROUTE, post(handle_recurring))
        .with_state(state)
}

async fn handle_result(
    State(gateway): State<Arc<GatewayClient>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let envelope = match NotificationEnvelope::from_request(query.as_deref(), &body) {
        Ok(envelope) => envelope,
        Err(e) => return notification_error(e),
    };

    match gateway.process_result_notification(&envelope) {
        Ok(ack) => {
            let content_type = ack.content_type();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                ack.into_body(),
            )
                .into_response()
        }
        Err(e) => notification_error(e),
    }
}

fn notification_error(e: NotificationError) -> Response {
    match e {
        NotificationError::Acknowledgement(_) => {
            error!("Failed to answer result notification: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        _ => {
            warn!("Rejected result notification: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn handle_payment(
    State(gateway): State<Arc<GatewayClient>>,
    Json(payment): Json<PaymentRequest>,
) -> Response {
    let url = gateway.payment_redirect_url(&payment);
    Redirect::to(url.as_str()).into_response()
}

async fn handle_direct_payment(
    State(gateway): State<Arc<GatewayClient>>,
    Json(payment): Json<PaymentRequest>,
) -> Response {
    gateway_response(gateway.direct_payment(&payment).await)
}

async fn handle_payment_systems(
    State(gateway): State<Arc<GatewayClient>>,
    Query(query): Query<PaymentSystemsQuery>,
) -> Response {
    gateway_response(gateway.payment_systems(query.amount).await)
}

async fn handle_order_status(
    State(gateway): State<Arc<GatewayClient>>,
    Path(order_id): Path<u64>,
) -> Response {
    gateway_response(gateway.order_status_by_order_id(order_id).await)
}

async fn handle_transaction_status(
    State(gateway): State<Arc<GatewayClient>>,
    Path(transaction_id): Path<u64>,
) -> Response {
    gateway_response(gateway.order_status_by_transaction_id(transaction_id).await)
}

async fn handle_order_refund(
    State(gateway): State<Arc<GatewayClient>>,
    Path(order_id): Path<u64>,
    Json(refund): Json<RefundRequest>,
) -> Response {
    gateway_response(
        gateway
            .refund_by_order_id(order_id, refund.amount, refund.description.as_deref())
            .await,
    )
}

async fn handle_transaction_refund(
    State(gateway): State<Arc<GatewayClient>>,
    Path(transaction_id): Path<u64>,
    Json(refund): Json<RefundRequest>,
) -> Response {
    gateway_response(
        gateway
            .refund_by_transaction_id(transaction_id, refund.amount, refund.description.as_deref())
            .await,
    )
}

async fn handle_recurring(
    State(gateway): State<Arc<GatewayClient>>,
    Json(request): Json<RecurringPaymentRequest>,
) -> Response {
    gateway_response(
        gateway
            .recurring_payment(
                &request.recurring_profile,
                request.order_id,
                &request.description,
                request.amount,
            )
            .await,
    )
}

fn gateway_response(result: Result<ParamSet, GatewayError>) -> Response {
    match result {
        Ok(params) => (StatusCode::OK, Json(params)).into_response(),
        Err(e) => {
            error!("Gateway request failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "Payment gateway request failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::LoggingNotificationHandler;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use merchant::{
        GatewayConfig,
        gateway::JSON_FIELD,
        signature::{self, HashAlgorithm, SIGNATURE_FIELD},
    };
    use tower::ServiceExt;
    use url::{Url, form_urlencoded};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const RESULT_KEY: &str = "result-key";

    fn router(api_url: &str) -> Router {
        let config = Config {
            log_level: log::Level::Info,
            server_port: 3000,
            server_host: "127.0.0.1".to_string(),
            gateway: GatewayConfig {
                outlet_id: "OUT1".to_string(),
                secret_key: "request-key".to_string(),
                secret_key_result: RESULT_KEY.to_string(),
                hash_algo: HashAlgorithm::Md5,
                result_url: Url::parse("https://shop.example/sp/result.php").unwrap(),
                strong_ssl: true,
                api_url: Url::parse(api_url).unwrap(),
                timeout_secs: 5,
            },
        };
        let gateway =
            GatewayClient::try_new(&config.gateway, Arc::new(LoggingNotificationHandler)).unwrap();
        build_router(AppState {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
        })
    }

    fn notification() -> ParamSet {
        ParamSet::new()
            .with("sp_order_id", 1001)
            .with("sp_result", 1)
            .with("sp_amount", 100.0)
            .with("sp_salt", "42")
    }

    fn query(params: &ParamSet) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.to_query_pairs())
            .finish()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get_result(query: &str) -> (StatusCode, String, String) {
        let request = Request::builder()
            .uri(format!("/sp/result.php?{query}"))
            .body(Body::empty())
            .unwrap();
        send(router("https://api.simplepay.pro/sp/"), request).await
    }

    #[tokio::test]
    async fn test_query_without_signature_is_not_payment_data() {
        let (status, content_type, body) = get_result(&query(&notification())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, "No recognizable payment data in request");
    }

    #[tokio::test]
    async fn test_unsigned_json_notification_is_rejected() {
        let payload = serde_json::to_string(&vec![notification()]).unwrap();
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair(JSON_FIELD, &payload)
            .finish();
        let request = Request::builder()
            .method("POST")
            .uri("/sp/result.php")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();

        let (status, content_type, body) =
            send(router("https://api.simplepay.pro/sp/"), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, "Invalid request parameters");
        assert!(!body.contains("sp_sig"));
    }

    #[tokio::test]
    async fn test_badly_signed_notification_is_rejected() {
        let params = notification().with(SIGNATURE_FIELD, "bad");
        let (status, content_type, body) = get_result(&query(&params)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, "Invalid request signature");
        assert!(!body.contains("bad"));
        assert!(!body.contains("<response>"));
    }

    #[tokio::test]
    async fn test_signed_query_notification_is_acknowledged() {
        let params = notification();
        let sig = signature::sign(&params, "result.php", RESULT_KEY, HashAlgorithm::Md5);
        let (status, content_type, body) =
            get_result(&query(&params.with(SIGNATURE_FIELD, sig.as_str()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/xml");
        assert!(body.contains("<response>"));
        assert!(body.contains("<sp_salt>42</sp_salt>"));
        assert!(!body.contains(&sig));
    }

    #[tokio::test]
    async fn test_posted_form_notification_is_acknowledged() {
        let params = notification();
        let sig = signature::sign(&params, "result.php", RESULT_KEY, HashAlgorithm::Md5);
        let request = Request::builder()
            .method("POST")
            .uri("/sp/result.php")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(query(&params.with(SIGNATURE_FIELD, sig))))
            .unwrap();

        let (status, content_type, _) =
            send(router("https://api.simplepay.pro/sp/"), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/xml");
    }

    #[tokio::test]
    async fn test_gateway_failure_maps_to_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sp/get_status"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal trace"))
            .mount(&server)
            .await;

        let request = Request::builder()
            .uri("/orders/1001/status")
            .body(Body::empty())
            .unwrap();
        let (status, content_type, body) =
            send(router(&format!("{}/sp/", server.uri())), request).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(content_type, "application/json");
        let error: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["error"], "Payment gateway request failed");
        assert!(!body.contains("internal trace"));
    }

    #[tokio::test]
    async fn test_payment_redirects_to_signed_checkout() {
        let request = Request::builder()
            .method("POST")
            .uri(PAYMENTS_ROUTE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"order_id":1001,"amount":100,"description":"Test payment"}"#,
            ))
            .unwrap();
        let response = router("https://api.simplepay.pro/sp/")
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://api.simplepay.pro/sp/payment?"));
        assert!(location.contains("sp_sig="));
    }
}
