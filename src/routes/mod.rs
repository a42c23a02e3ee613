use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers};
use crate::handlers::{
    apply_promo, create_claim, create_policy, flight_status, get_policy, health_check,
    list_claims, list_policies,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/policies", post(create_policy).get(list_policies))
        .route("/policies/:id", get(get_policy))
        .route("/policies/:id/claims", post(create_claim))
        .route("/claims", get(list_claims))
        .route("/promo-codes/apply", post(apply_promo))
        .route("/flight-status", get(flight_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer());

    with_security_headers(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::promo::{DiscountType, PromoCode};
    use crate::promo::{InMemoryPromoCodes, PromoCodeEngine};
    use crate::store::InMemoryPolicyStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_codes() -> InMemoryPromoCodes {
        // No expiry dates so the tests do not rot with the calendar.
        InMemoryPromoCodes::new([
            PromoCode {
                code: "TWENTY".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: Decimal::from(20),
                max_uses: Some(200),
                current_uses: 120,
                expires_at: None,
                min_ticket_price: Some(Decimal::from(5000)),
                is_valid: true,
            },
            PromoCode {
                code: "USEDUP".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: Decimal::from(50),
                max_uses: Some(50),
                current_uses: 50,
                expires_at: None,
                min_ticket_price: None,
                is_valid: true,
            },
        ])
    }

    fn app() -> Router {
        let store = Arc::new(InMemoryPolicyStore::new());
        let promo = Arc::new(PromoCodeEngine::new(Box::new(test_codes())));
        create_routes(AppState::new(store, promo, None))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn policy_request() -> Value {
        json!({
            "ownerAddress": "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0",
            "flight": {
                "airline": "Aeroméxico",
                "flightNumber": "AM123",
                "date": "2026-09-15",
                "departureAirport": "MEX"
            },
            "ticketPrice": 8500
        })
    }

    fn decimal(v: &Value) -> Decimal {
        match v {
            Value::String(s) => s.parse().unwrap(),
            Value::Number(n) => n.to_string().parse().unwrap(),
            other => panic!("not a decimal: {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(&app(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let response = app().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn create_policy_defaults_premium_from_ticket_price() {
        let (status, body) = send(&app(), post_json("/policies", policy_request())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "active");
        assert_eq!(decimal(&body["premium"]), Decimal::from(425));
        assert_eq!(decimal(&body["originalPremium"]), Decimal::from(425));
        assert_eq!(decimal(&body["discountAmount"]), Decimal::ZERO);
        // Expiration defaults to the flight date.
        assert_eq!(body["expirationDate"], "2026-09-15");
        assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn create_policy_without_owner_is_rejected() {
        let mut req = policy_request();
        req["ownerAddress"] = json!("  ");
        let (status, body) = send(&app(), post_json("/policies", req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn create_policy_rejects_inconsistent_premiums() {
        let mut req = policy_request();
        req["premium"] = json!(425);
        req["originalPremium"] = json!(425);
        req["discountAmount"] = json!(100);
        let (status, body) = send(&app(), post_json("/policies", req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn policies_are_listed_by_owner_case_insensitively() {
        let app = app();
        send(&app, post_json("/policies", policy_request())).await;

        let (status, body) = send(
            &app,
            get_req("/policies?owner=0x742d35cc6634c0532925a3b844bc9e7595f0beb0"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, get_req("/policies?owner=0xother")).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_policy_round_trips() {
        let app = app();
        let (_, created) = send(&app, post_json("/policies", policy_request())).await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = send(&app, get_req(&format!("/policies/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], *id);
    }

    #[tokio::test]
    async fn unknown_policy_is_404() {
        let (status, body) = send(&app(), get_req("/policies/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn onchain_policy_id_is_404_with_explanation() {
        let (status, body) = send(&app(), get_req("/policies/onchain-42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("on-chain"));
    }

    #[tokio::test]
    async fn claim_flow_creates_then_conflicts() {
        let app = app();
        let (_, created) = send(&app, post_json("/policies", policy_request())).await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            post_json(&format!("/policies/{id}/claims"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["claim"]["status"], "in_verification");
        // Amount defaulted to the coverage (= ticket price).
        assert_eq!(decimal(&body["claim"]["amount"]), Decimal::from(8500));
        assert_eq!(body["policy"]["status"], "claimed");

        let (status, body) = send(
            &app,
            post_json(&format!("/policies/{id}/claims"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn claim_with_nonpositive_amount_is_rejected() {
        let app = app();
        let (_, created) = send(&app, post_json("/policies", policy_request())).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            post_json(&format!("/policies/{id}/claims"), json!({"amount": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn claims_list_derives_from_claimed_policies() {
        let app = app();
        let (_, created) = send(&app, post_json("/policies", policy_request())).await;
        let id = created["id"].as_str().unwrap();
        send(
            &app,
            post_json(&format!("/policies/{id}/claims"), json!({})),
        )
        .await;

        let (status, body) = send(&app, get_req("/claims")).await;
        assert_eq!(status, StatusCode::OK);
        let claims = body.as_array().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0]["id"], format!("claim-{id}"));
        assert_eq!(claims[0]["policyId"], *id);
        assert_eq!(claims[0]["airline"], "Aeroméxico");
    }

    #[tokio::test]
    async fn promo_quote_applies_percentage_discount() {
        let (status, body) = send(
            &app(),
            post_json(
                "/promo-codes/apply",
                json!({"code": "twenty", "ticketPrice": 8500}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "TWENTY");
        assert_eq!(decimal(&body["originalPremium"]), Decimal::from(425));
        assert_eq!(decimal(&body["discountAmount"]), Decimal::from(1700));
        assert_eq!(decimal(&body["finalPremium"]), Decimal::ZERO);
    }

    #[tokio::test]
    async fn unknown_promo_code_is_not_found() {
        let (status, body) = send(
            &app(),
            post_json(
                "/promo-codes/apply",
                json!({"code": "NOPE", "ticketPrice": 1000}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "the promo code is not valid");
    }

    #[tokio::test]
    async fn exhausted_promo_code_is_a_validation_error() {
        let (status, body) = send(
            &app(),
            post_json(
                "/promo-codes/apply",
                json!({"code": "USEDUP", "ticketPrice": 1000}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("usage limit"));
    }

    #[tokio::test]
    async fn empty_promo_code_is_rejected() {
        let (status, _) = send(
            &app(),
            post_json("/promo-codes/apply", json!({"code": " ", "ticketPrice": 1000})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn flight_status_without_provider_cannot_verify() {
        let (status, body) = send(
            &app(),
            get_req("/flight-status?airline=aeromexico&flightNumber=AM123&date=2026-09-15"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "could_not_verify");
    }
}
