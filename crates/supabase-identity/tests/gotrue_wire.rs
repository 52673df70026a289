//! Wire-level tests against a mock server standing in for both Supabase Auth
//! and the web app.

use auth_session::{
    AuthMethod, ChallengeAnchor, ErrorCategory, HostSignal, IdentityProvider, RecordingHost,
    SessionStore, SignInOrchestrator, SubmitOutcome,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use supabase_identity::{
    GoTrueClient, SocialLoginClient, SocialLoginStart, SupabaseIdentityProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN_U1: &str = r#"{
    "access_token": "access-1",
    "refresh_token": "refresh-1",
    "expires_in": 3600,
    "user": {"id": "u1", "email": "dev@foo.com", "app_metadata": {"provider": "email"}}
}"#;

fn json(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json")
}

async fn requests_to(server: &MockServer, verb: &str, endpoint: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == endpoint)
        .collect()
}

fn body_of(request: &Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

struct Setup {
    server: MockServer,
    provider: Arc<SupabaseIdentityProvider>,
    store: Arc<SessionStore>,
    host: Arc<RecordingHost>,
    modal: SignInOrchestrator,
}

async fn setup_with(
    server: MockServer,
    configure: impl FnOnce(SupabaseIdentityProvider) -> SupabaseIdentityProvider,
) -> Setup {
    let base = server.uri();
    let provider = SupabaseIdentityProvider::new(
        GoTrueClient::new(&base, "test-key"),
        SocialLoginClient::new(&base).with_poll_interval(Duration::from_millis(10)),
    );
    let provider = Arc::new(configure(provider));
    let store = Arc::new(SessionStore::new(provider.clone()));
    let host = Arc::new(RecordingHost::new());
    let modal = SignInOrchestrator::new(store.clone(), host.clone())
        .with_challenge_anchor(ChallengeAnchor::new("captcha-token"));
    modal.open();
    Setup {
        server,
        provider,
        store,
        host,
        modal,
    }
}

async fn setup(server: MockServer) -> Setup {
    setup_with(server, |p| p).await
}

#[tokio::test]
async fn password_sign_in_establishes_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(json(200, TOKEN_U1))
        .expect(1)
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.modal.choose_email().unwrap();
    s.modal.set_email("dev@foo.com");
    s.modal.set_password("pw");
    let outcome = s.modal.submit_password().await;

    let SubmitOutcome::Authenticated(identity) = outcome else {
        panic!("expected sign-in, got {outcome:?}");
    };
    assert_eq!(identity.uid, "u1");
    assert_eq!(identity.provider_id, "password");
    assert!(s.store.current_identity().is_authenticated());
    assert_eq!(s.host.count(HostSignal::NavigateToAuthenticatedArea), 1);

    let requests = requests_to(&s.server, "POST", "/auth/v1/token").await;
    assert_eq!(requests.len(), 1);
    assert!(body_of(&requests[0]).contains("dev@foo.com"));
    assert_eq!(
        requests[0].headers.get("apikey").and_then(|v| v.to_str().ok()),
        Some("test-key")
    );
}

#[tokio::test]
async fn rejected_credentials_are_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(json(
            400,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        ))
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.modal.choose_email().unwrap();
    s.modal.set_email("dev@foo.com");
    s.modal.set_password("wrong");
    let outcome = s.modal.submit_password().await;

    let SubmitOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.category(), ErrorCategory::Unauthenticated);
    assert!(!s.store.current_identity().is_authenticated());
    assert!(s.host.is_empty());
}

#[tokio::test]
async fn sign_up_sets_display_name_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(json(200, TOKEN_U1))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/auth/v1/user"))
        .respond_with(json(
            200,
            r#"{"id":"u1","email":"dev@foo.com","user_metadata":{"display_name":"Dev"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.modal.toggle_mode().unwrap();
    s.modal.choose_email().unwrap();
    s.modal.set_email("dev@foo.com");
    s.modal.set_password("abc123");
    s.modal.set_display_name("Dev");
    let outcome = s.modal.submit_password().await;
    assert!(matches!(outcome, SubmitOutcome::Authenticated(_)));

    let updates = requests_to(&s.server, "PUT", "/auth/v1/user").await;
    assert!(body_of(&updates[0]).contains(r#""display_name":"Dev""#));
    assert_eq!(
        updates[0]
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok()),
        Some("Bearer access-1")
    );
    assert_eq!(
        s.provider.current_identity().and_then(|i| i.display_name),
        Some("Dev".to_string())
    );
}

#[tokio::test]
async fn sign_up_pending_confirmation_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(json(200, r#"{"id":"u9","email":"new@foo.com"}"#))
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.modal.toggle_mode().unwrap();
    s.modal.choose_email().unwrap();
    s.modal.set_email("new@foo.com");
    s.modal.set_password("abc123");
    s.modal.set_display_name("New");
    let outcome = s.modal.submit_password().await;

    let SubmitOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.category(), ErrorCategory::Unknown);
    assert!(s.provider.current_identity().is_none());
    assert!(requests_to(&s.server, "PUT", "/auth/v1/user").await.is_empty());
}

#[tokio::test]
async fn phone_challenge_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .respond_with(json(200, "{}"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .respond_with(json(
            200,
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,
                "user":{"id":"p1","phone":"15550000","app_metadata":{"provider":"phone"}}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.modal.set_phone_number("+15550000");
    assert_eq!(s.modal.submit_phone().await, SubmitOutcome::ChallengeIssued);
    let otp = requests_to(&s.server, "POST", "/auth/v1/otp").await;
    assert!(body_of(&otp[0]).contains("captcha-token"));

    s.modal.set_verification_code("123456");
    let outcome = s.modal.submit_verification_code().await;
    let SubmitOutcome::Authenticated(identity) = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    assert_eq!(identity.provider_id, "phone");

    let verify = requests_to(&s.server, "POST", "/auth/v1/verify").await;
    let body = body_of(&verify[0]);
    assert!(body.contains(r#""type":"sms""#));
    assert!(body.contains("+15550000"));
}

#[tokio::test]
async fn rate_limited_challenge_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .respond_with(json(
            429,
            r#"{"code":429,"error_code":"over_sms_send_rate_limit","msg":"slow down"}"#,
        ))
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.modal.set_phone_number("+15550000");
    let outcome = s.modal.submit_phone().await;
    let SubmitOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.category(), ErrorCategory::RateLimited);
    assert!(!s.modal.state().phone_challenge_issued);
}

#[tokio::test]
async fn federated_sign_in_polls_until_success() {
    let server = MockServer::start().await;
    // The first matching mock wins until it is used up.
    Mock::given(method("GET"))
        .and(path("/api/cli-login-status"))
        .respond_with(json(200, r#"{"status":"pending"}"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cli-login-status"))
        .respond_with(json(
            200,
            r#"{"status":"success","session":{"access_token":"fa","refresh_token":"fr",
                "expires_at":"2099-01-01T00:00:00Z","user_id":"g1"}}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(json(
            200,
            r#"{"id":"g1","email":"g@foo.com","app_metadata":{"provider":"google"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let urls = Arc::new(Mutex::new(Vec::new()));
    let sink = urls.clone();
    let s = setup_with(server, move |p| {
        p.with_login_url_handler(Arc::new(move |start: &SocialLoginStart| {
            sink.lock().push(start.login_url.clone());
        }))
    })
    .await;

    let outcome = s.modal.submit_federated().await;
    let SubmitOutcome::Authenticated(identity) = outcome else {
        panic!("expected federated sign-in, got {outcome:?}");
    };
    assert_eq!(identity.uid, "g1");
    assert_eq!(identity.provider_id, "google");
    assert_eq!(urls.lock().len(), 1);
    assert!(urls.lock()[0].contains("/cli-auth?login_id="));

    let polls = requests_to(&s.server, "GET", "/api/cli-login-status").await;
    assert_eq!(polls.len(), 2);
    let login_id = polls[0]
        .url
        .query_pairs()
        .find(|(key, _)| key == "login_id")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    assert!(urls.lock()[0].contains(&login_id));
}

#[tokio::test]
async fn expired_federated_login_is_user_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cli-login-status"))
        .respond_with(json(200, r#"{"status":"expired"}"#))
        .mount(&server)
        .await;
    let s = setup(server).await;

    let outcome = s.modal.submit_federated().await;
    let SubmitOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.category(), ErrorCategory::UserCancelled);
    assert_eq!(s.modal.state().active_method, None);
    assert!(!s.modal.is_in_progress(AuthMethod::Federated));
    assert_eq!(s.host.count(HostSignal::NavigateToAuthenticatedArea), 0);
}

#[tokio::test]
async fn sign_out_revokes_and_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(json(200, TOKEN_U1))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.provider
        .authenticate_with_password("dev@foo.com", "pw")
        .await
        .unwrap();
    assert!(s.store.current_identity().is_authenticated());

    s.store.sign_out().await.unwrap();
    assert!(!s.store.current_identity().is_authenticated());
    let logout = requests_to(&s.server, "POST", "/auth/v1/logout").await;
    assert_eq!(
        logout[0]
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok()),
        Some("Bearer access-1")
    );
}

#[tokio::test]
async fn refresh_rejection_signs_out_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(json(
            200,
            r#"{"access_token":"short","refresh_token":"stale","expires_in":1,
                "user":{"id":"u1"}}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(json(
            400,
            r#"{"error_code":"refresh_token_not_found","msg":"Invalid Refresh Token"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let s = setup(server).await;

    s.provider
        .authenticate_with_password("dev@foo.com", "pw")
        .await
        .unwrap();
    assert!(s.store.current_identity().is_authenticated());

    assert!(s.provider.access_token().await.is_err());
    assert!(s.provider.current_identity().is_none());
    assert!(!s.store.current_identity().is_authenticated());
}
