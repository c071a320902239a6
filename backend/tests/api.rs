//! End-to-end flows over the full `/v1` surface, backed by the fixture
//! adapters.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test as actix_test, web, App};
use serde_json::{json, Value};

use reelgate::domain::account::AccountId;
use reelgate::domain::ports::MailTemplate;
use reelgate::domain::ports::PermissionRepository;
use reelgate::domain::Permission;
use reelgate::inbound::http;
use reelgate::inbound::http::state::{FixturePorts, HttpState};
use reelgate::middleware::{RateLimit, RateLimiter, RateLimiterSettings};
use reelgate::tasks::BackgroundTasks;

fn fixture_state() -> (web::Data<HttpState>, FixturePorts) {
    let fixtures = FixturePorts::new();
    let state = HttpState::new(
        fixtures.ports(),
        Arc::new(BackgroundTasks::default()),
        "test",
    );
    (web::Data::new(state), fixtures)
}

fn app_over(
    state: web::Data<HttpState>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new().app_data(state).configure(http::configure)
}

type TestService = actix_web::dev::ServiceResponse;

async fn post_json(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = TestService,
        Error = actix_web::Error,
    >,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> TestService {
    let mut request = actix_test::TestRequest::post().uri(uri).set_json(body);
    if let Some(token) = token {
        request = request.insert_header(("Authorization", format!("Bearer {token}")));
    }
    actix_test::call_service(app, request.to_request()).await
}

async fn get_with_token(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = TestService,
        Error = actix_web::Error,
    >,
    uri: &str,
    token: Option<&str>,
) -> TestService {
    let mut request = actix_test::TestRequest::get().uri(uri);
    if let Some(token) = token {
        request = request.insert_header(("Authorization", format!("Bearer {token}")));
    }
    actix_test::call_service(app, request.to_request()).await
}

fn error_code(body: &Value) -> Option<&str> {
    body.get("code").and_then(Value::as_str)
}

/// Register an account and return its id.
async fn register(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = TestService,
        Error = actix_web::Error,
    >,
    email: &str,
) -> i64 {
    let response = post_json(
        app,
        "/v1/accounts",
        None,
        json!({ "name": "Test Account", "email": email, "password": "correct-horse" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value = actix_test::read_body_json(response).await;
    body.get("account")
        .and_then(|a| a.get("id"))
        .and_then(Value::as_i64)
        .expect("account id")
}

/// Pull the most recent token of `template` mailed to `email`.
async fn mailed_token(
    state: &web::Data<HttpState>,
    fixtures: &FixturePorts,
    email: &str,
    template: MailTemplate,
    payload_key: &str,
) -> String {
    state.tasks.drain().await;
    fixtures
        .mailer
        .sent()
        .iter()
        .rev()
        .find(|mail| mail.recipient.as_ref() == email && mail.template == template)
        .and_then(|mail| mail.payload.get(payload_key).and_then(Value::as_str))
        .expect("mailed token")
        .to_owned()
}

async fn activate(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = TestService,
        Error = actix_web::Error,
    >,
    token: &str,
) -> TestService {
    let request = actix_test::TestRequest::put()
        .uri("/v1/accounts/activated")
        .set_json(json!({ "token": token }))
        .to_request();
    actix_test::call_service(app, request).await
}

async fn login(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = TestService,
        Error = actix_web::Error,
    >,
    email: &str,
    password: &str,
) -> TestService {
    post_json(
        app,
        "/v1/tokens/authentication",
        None,
        json!({ "email": email, "password": password }),
    )
    .await
}

async fn login_token(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = TestService,
        Error = actix_web::Error,
    >,
    email: &str,
) -> String {
    let response = login(app, email, "correct-horse").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = actix_test::read_body_json(response).await;
    body.get("authenticationToken")
        .and_then(|t| t.get("token"))
        .and_then(Value::as_str)
        .expect("token")
        .to_owned()
}

#[actix_web::test]
async fn registration_activation_and_authorization_flow() {
    let (state, fixtures) = fixture_state();
    let app = actix_test::init_service(app_over(state.clone())).await;

    register(&app, "ada@example.com").await;
    let token = login_token(&app, "ada@example.com").await;

    // Authenticated but not activated: the second guard fires, never the
    // permission check.
    let response = get_with_token(&app, "/v1/items", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(error_code(&body), Some("account_not_activated"));

    // Redeem the activation token from the welcome mail.
    let activation = mailed_token(
        &state,
        &fixtures,
        "ada@example.com",
        MailTemplate::Welcome,
        "activationToken",
    )
    .await;
    let response = activate(&app, &activation).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(
        body.get("account")
            .and_then(|a| a.get("activated"))
            .and_then(Value::as_bool),
        Some(true)
    );

    // The same action now passes: registration granted catalog:read.
    let response = get_with_token(&app, "/v1/items", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Activation is single-shot: the redeemed token was deleted.
    let response = activate(&app, &activation).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn guard_ordering_for_anonymous_and_unpermitted_callers() {
    let (state, fixtures) = fixture_state();
    let app = actix_test::init_service(app_over(state.clone())).await;

    // Anonymous: the first guard fires, never the permission check.
    let response = get_with_token(&app, "/v1/items", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(error_code(&body), Some("authentication_required"));

    // Activated but holding only catalog:read: writes are denied.
    let id = register(&app, "ada@example.com").await;
    let activation = mailed_token(
        &state,
        &fixtures,
        "ada@example.com",
        MailTemplate::Welcome,
        "activationToken",
    )
    .await;
    assert_eq!(activate(&app, &activation).await.status(), StatusCode::OK);
    let token = login_token(&app, "ada@example.com").await;

    let create = json!({ "title": "Alien", "year": 1979, "duration": 117, "tags": ["horror"] });
    let response = post_json(&app, "/v1/items", Some(&token), create.clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(error_code(&body), Some("permission_denied"));

    // Grants take effect on the next request: the set is fetched per
    // request, never cached.
    fixtures
        .permissions
        .grant(AccountId::new(id), &[Permission::CatalogWrite])
        .await
        .expect("grant succeeds");
    let response = post_json(&app, "/v1/items", Some(&token), create).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn credential_rejections_are_uniform_and_scoped() {
    let (state, fixtures) = fixture_state();
    let app = actix_test::init_service(app_over(state.clone())).await;

    register(&app, "ada@example.com").await;
    let activation = mailed_token(
        &state,
        &fixtures,
        "ada@example.com",
        MailTemplate::Welcome,
        "activationToken",
    )
    .await;
    assert_eq!(activate(&app, &activation).await.status(), StatusCode::OK);
    let token = login_token(&app, "ada@example.com").await;

    // The real token resolves to its account.
    let response = get_with_token(&app, "/v1/items", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // A tampered token (one flipped character) is indistinguishable from
    // an unknown one.
    let mut tampered: Vec<char> = token.chars().collect();
    tampered[0] = if tampered[0] == 'A' { 'B' } else { 'A' };
    let tampered: String = tampered.into_iter().collect();
    let response = get_with_token(&app, "/v1/items", Some(&tampered)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(error_code(&body), Some("invalid_or_expired_credential"));

    // An activation-scoped token never authenticates a request, even
    // before expiry.
    let fresh_activation = post_json(
        &app,
        "/v1/tokens/activation",
        None,
        json!({ "email": "bea@example.com" }),
    )
    .await;
    assert_eq!(fresh_activation.status(), StatusCode::ACCEPTED);
    register(&app, "bea@example.com").await;
    let bea_activation = mailed_token(
        &state,
        &fixtures,
        "bea@example.com",
        MailTemplate::Welcome,
        "activationToken",
    )
    .await;
    let response = get_with_token(&app, "/v1/items", Some(&bea_activation)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(error_code(&body), Some("invalid_or_expired_credential"));
}

#[actix_web::test]
async fn concurrent_updates_from_the_same_version_produce_one_winner() {
    let (state, fixtures) = fixture_state();
    let app = actix_test::init_service(app_over(state.clone())).await;

    let id = register(&app, "ada@example.com").await;
    let activation = mailed_token(
        &state,
        &fixtures,
        "ada@example.com",
        MailTemplate::Welcome,
        "activationToken",
    )
    .await;
    assert_eq!(activate(&app, &activation).await.status(), StatusCode::OK);
    fixtures
        .permissions
        .grant(AccountId::new(id), &[Permission::CatalogWrite])
        .await
        .expect("grant succeeds");
    let token = login_token(&app, "ada@example.com").await;

    let response = post_json(
        &app,
        "/v1/items",
        Some(&token),
        json!({ "title": "Alien", "year": 1979, "duration": 117, "tags": ["horror"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = actix_test::read_body_json(response).await;
    let item_id = body
        .get("item")
        .and_then(|i| i.get("id"))
        .and_then(Value::as_i64)
        .expect("item id");

    let patch = |title: &str| {
        actix_test::TestRequest::patch()
            .uri(&format!("/v1/items/{item_id}"))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .insert_header(("X-Expected-Version", "1"))
            .set_json(json!({ "title": title }))
            .to_request()
    };

    // Both writers observed version 1; exactly one commits version 2.
    let (first, second) = futures::join!(
        actix_test::call_service(&app, patch("Alien (1979)")),
        actix_test::call_service(&app, patch("Alien, restored")),
    );
    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let winner = if first.status() == StatusCode::OK {
        first
    } else {
        second
    };
    let body: Value = actix_test::read_body_json(winner).await;
    assert_eq!(
        body.get("item")
            .and_then(|i| i.get("version"))
            .and_then(Value::as_u64),
        Some(2)
    );
}

#[actix_web::test]
async fn password_reset_replaces_the_credential_once() {
    let (state, fixtures) = fixture_state();
    let app = actix_test::init_service(app_over(state.clone())).await;

    register(&app, "ada@example.com").await;
    let activation = mailed_token(
        &state,
        &fixtures,
        "ada@example.com",
        MailTemplate::Welcome,
        "activationToken",
    )
    .await;
    assert_eq!(activate(&app, &activation).await.status(), StatusCode::OK);

    let response = post_json(
        &app,
        "/v1/tokens/password-reset",
        None,
        json!({ "email": "ada@example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let reset = mailed_token(
        &state,
        &fixtures,
        "ada@example.com",
        MailTemplate::PasswordResetToken,
        "passwordResetToken",
    )
    .await;

    let redeem = |password: &str| {
        actix_test::TestRequest::put()
            .uri("/v1/accounts/password")
            .set_json(json!({ "token": reset, "password": password }))
            .to_request()
    };
    let response = actix_test::call_service(&app, redeem("battery-staple-9")).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The old credential stops working; the new one logs in.
    let response = login(&app, "ada@example.com", "correct-horse").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = login(&app, "ada@example.com", "battery-staple-9").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The reset token was invalidated on use.
    let response = actix_test::call_service(&app, redeem("another-password-1")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn the_rate_limiter_bounds_bursts_end_to_end() {
    let (state, _fixtures) = fixture_state();
    let limiter = Arc::new(
        RateLimiter::new(RateLimiterSettings::default()).expect("valid settings"),
    );
    let app = actix_test::init_service(
        App::new()
            .app_data(state)
            .configure(http::configure)
            .wrap(RateLimit::new(limiter)),
    )
    .await;

    // Burst of burst + 1 instantaneous requests: exactly `burst` admitted.
    let mut statuses = Vec::new();
    for _ in 0..5 {
        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri("/v1/healthcheck").to_request())
                .await;
        statuses.push(response.status());
    }
    let admitted = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let rejected = statuses
        .iter()
        .filter(|s| **s == StatusCode::TOO_MANY_REQUESTS)
        .count();
    assert_eq!(admitted, 4);
    assert_eq!(rejected, 1);
}

#[actix_web::test]
async fn a_disabled_limiter_admits_arbitrarily_fast_clients() {
    let (state, _fixtures) = fixture_state();
    let limiter = Arc::new(RateLimiter::disabled());
    let app = actix_test::init_service(
        App::new()
            .app_data(state)
            .configure(http::configure)
            .wrap(RateLimit::new(limiter)),
    )
    .await;

    for _ in 0..20 {
        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri("/v1/healthcheck").to_request())
                .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
