//! Test doubles shared by the unit tests: token issuers, an in-process
//! backend, and a fully wired client harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::{oneshot, watch};

use crate::backend::{ApiClient, ApiError, HttpTokenIssuer};
use crate::config::ClientConfig;
use crate::navigation::{RecordingNavigator, RecordingNotifier};
use crate::session::{FakeIdentityProvider, SessionSource, TokenBridge, TokenIssuer};
use crate::storage::MemoryTokenStore;

pub const PATIENT_EMAIL: &str = "nadia@uni.edu";
pub const DOCTOR_EMAIL: &str = "rahman@uni.edu";
pub const PASSWORD: &str = "secret1";

// ═══════════════════════════════════════════════════════════
// Token issuers
// ═══════════════════════════════════════════════════════════

enum StaticOutcome {
    Token(String),
    NoToken,
    Failing,
}

/// Issuer with a fixed outcome.
pub struct StaticIssuer {
    outcome: StaticOutcome,
    calls: AtomicUsize,
}

impl StaticIssuer {
    pub fn token(token: &str) -> Self {
        Self::with(StaticOutcome::Token(token.to_string()))
    }

    pub fn no_token() -> Self {
        Self::with(StaticOutcome::NoToken)
    }

    pub fn failing() -> Self {
        Self::with(StaticOutcome::Failing)
    }

    fn with(outcome: StaticOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for StaticIssuer {
    async fn issue(&self, _email: &str) -> Result<Option<String>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            StaticOutcome::Token(t) => Ok(Some(t.clone())),
            StaticOutcome::NoToken => Ok(None),
            StaticOutcome::Failing => Err(ApiError::Connection("http://127.0.0.1:9".into())),
        }
    }
}

/// Issuer whose exchanges stay in flight until the test releases them.
pub struct GatedIssuer {
    pending: Mutex<HashMap<String, oneshot::Sender<Result<Option<String>, ApiError>>>>,
    requests: watch::Sender<usize>,
}

impl GatedIssuer {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            requests: watch::channel(0).0,
        }
    }

    /// Resolve once `count` exchanges have reached the issuer.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.requests.subscribe();
        rx.wait_for(|n| *n >= count).await.unwrap();
    }

    pub fn release(&self, email: &str, result: Result<Option<String>, ApiError>) {
        let gate = self
            .pending
            .lock()
            .unwrap()
            .remove(email)
            .expect("no exchange in flight for email");
        let _ = gate.send(result);
    }
}

#[async_trait]
impl TokenIssuer for GatedIssuer {
    async fn issue(&self, email: &str) -> Result<Option<String>, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(email.to_string(), tx);
        self.requests.send_modify(|n| *n += 1);
        rx.await
            .unwrap_or_else(|_| Err(ApiError::Http("gate dropped".into())))
    }
}

// ═══════════════════════════════════════════════════════════
// In-process backend
// ═══════════════════════════════════════════════════════════

/// Serve `router` on an ephemeral localhost port; returns the base URL.
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Records held by the fake backend.
#[derive(Default)]
pub struct BackendState {
    pub doctors: Vec<Value>,
    pub appointments: Vec<Value>,
    pub prescriptions: Vec<Value>,
    pub admins: Vec<String>,
    /// When set, role checks answer 500.
    pub role_check_broken: bool,
    pub role_checks: usize,
    next_id: u32,
}

impl BackendState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

pub type SharedBackend = Arc<Mutex<BackendState>>;

type Reply = (StatusCode, Json<Value>);

fn ok(data: Value) -> Reply {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "success": false, "message": message })))
}

fn authorized(headers: &HeaderMap) -> Result<(), Reply> {
    let valid = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer jwt-"));
    if valid {
        Ok(())
    } else {
        Err(fail(StatusCode::UNAUTHORIZED, "unauthorized access"))
    }
}

/// A backend with one registered doctor (`d1`, Dr. Rahman).
pub fn seeded_backend() -> SharedBackend {
    let state = BackendState {
        doctors: vec![json!({
            "_id": "d1",
            "name": "Dr. Rahman",
            "email": DOCTOR_EMAIL,
            "specialization": "Cardiology",
            "bio": "Consultant cardiologist at the university hospital.",
            "experience": "12 years",
            "rating": 4.8,
            "availableTimeSlots": ["10:30 AM", "2:00 PM"]
        })],
        admins: vec![DOCTOR_EMAIL.to_string()],
        next_id: 1,
        ..Default::default()
    };
    Arc::new(Mutex::new(state))
}

/// Router implementing the booking backend's REST surface in memory.
pub fn fake_backend(state: SharedBackend) -> Router {
    Router::new()
        .route("/jwt", post(issue_jwt))
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/doctors/admin/:email", get(role_check))
        .route("/doctors/:id", get(get_doctor).put(update_doctor))
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/:id",
            axum::routing::put(approve_appointment).delete(delete_appointment),
        )
        .route("/prescriptions", post(create_prescription))
        .route("/prescriptions/patient/:email", get(prescriptions_for_patient))
        .route("/prescriptions/doctor/:doctor_id", get(prescriptions_for_doctor))
        .route("/prescriptions/:id", get(get_prescription))
        .with_state(state)
}

async fn issue_jwt(Json(body): Json<Value>) -> Json<Value> {
    let email = body["email"].as_str().unwrap_or_default();
    Json(json!({ "token": format!("jwt-{email}") }))
}

async fn list_doctors(State(state): State<SharedBackend>) -> Reply {
    ok(Value::Array(state.lock().unwrap().doctors.clone()))
}

async fn get_doctor(State(state): State<SharedBackend>, Path(id): Path<String>) -> Reply {
    let state = state.lock().unwrap();
    match state.doctors.iter().find(|d| d["_id"] == id.as_str()) {
        Some(doctor) => ok(doctor.clone()),
        None => fail(StatusCode::NOT_FOUND, "Doctor not found"),
    }
}

async fn create_doctor(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    if state.doctors.iter().any(|d| d["email"] == body["email"]) {
        return fail(StatusCode::CONFLICT, "A doctor with this email already exists");
    }
    body["_id"] = json!(state.next_id("d"));
    body["rating"] = json!(0.0);
    state.doctors.push(body.clone());
    ok(body)
}

async fn update_doctor(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    let Some(doctor) = state.doctors.iter_mut().find(|d| d["_id"] == id.as_str()) else {
        return fail(StatusCode::NOT_FOUND, "Doctor not found");
    };
    if let (Some(target), Some(fields)) = (doctor.as_object_mut(), body.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    ok(json!({ "modifiedCount": 1 }))
}

async fn role_check(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    state.role_checks += 1;
    if state.role_check_broken {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "role service down");
    }
    let is_admin = state.admins.contains(&email);
    (StatusCode::OK, Json(json!({ "isAdmin": is_admin })))
}

async fn list_appointments(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let state = state.lock().unwrap();
    let items: Vec<Value> = state
        .appointments
        .iter()
        .filter(|a| match query.get("email") {
            Some(email) => a["patientEmail"] == email.as_str(),
            None => true,
        })
        .cloned()
        .collect();
    ok(Value::Array(items))
}

async fn create_appointment(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    let taken = state.appointments.iter().any(|a| {
        a["doctorId"] == body["doctorId"] && a["date"] == body["date"] && a["time"] == body["time"]
    });
    if taken {
        return fail(StatusCode::CONFLICT, "This time slot is already booked");
    }
    body["_id"] = json!(state.next_id("A"));
    body["booking"] = json!(false);
    state.appointments.push(body.clone());
    ok(body)
}

async fn approve_appointment(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    match state.appointments.iter_mut().find(|a| a["_id"] == id.as_str()) {
        Some(appointment) => {
            appointment["booking"] = body["booking"].clone();
            ok(json!({ "modifiedCount": 1 }))
        }
        None => fail(StatusCode::NOT_FOUND, "Appointment not found"),
    }
}

async fn delete_appointment(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    let before = state.appointments.len();
    state.appointments.retain(|a| a["_id"] != id.as_str());
    if state.appointments.len() == before {
        return fail(StatusCode::NOT_FOUND, "Appointment not found");
    }
    ok(json!({ "deletedCount": 1 }))
}

async fn create_prescription(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().unwrap();
    body["_id"] = json!(state.next_id("P"));
    state.prescriptions.push(body.clone());
    ok(body)
}

async fn prescriptions_for_patient(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let state = state.lock().unwrap();
    let items: Vec<Value> = state
        .prescriptions
        .iter()
        .filter(|p| p["patientEmail"] == email.as_str())
        .cloned()
        .collect();
    ok(Value::Array(items))
}

async fn prescriptions_for_doctor(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(doctor_id): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let state = state.lock().unwrap();
    let items: Vec<Value> = state
        .prescriptions
        .iter()
        .filter(|p| p["doctorId"] == doctor_id.as_str())
        .cloned()
        .collect();
    ok(Value::Array(items))
}

async fn get_prescription(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let state = state.lock().unwrap();
    match state.prescriptions.iter().find(|p| p["_id"] == id.as_str()) {
        Some(p) => ok(p.clone()),
        None => fail(StatusCode::NOT_FOUND, "Prescription not found"),
    }
}

// ═══════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════

/// A fully wired client against `base`.
pub struct Harness {
    pub config: ClientConfig,
    pub provider: Arc<FakeIdentityProvider>,
    pub session: Arc<SessionSource>,
    pub store: Arc<MemoryTokenStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub client: Arc<ApiClient>,
}

impl Harness {
    /// Short timings: readiness bound of 5 x 10ms, no settle delay.
    pub fn config(base: &str) -> ClientConfig {
        ClientConfig {
            api_base_url: base.to_string(),
            settle_delay_ms: 0,
            ready_poll_interval_ms: 10,
            ready_max_attempts: 5,
            request_timeout_secs: 5,
            ..ClientConfig::default()
        }
    }

    pub async fn signed_out(base: &str, issuer: Arc<dyn TokenIssuer>) -> Self {
        let config = Self::config(base);
        let provider = Arc::new(
            FakeIdentityProvider::new()
                .with_account(PATIENT_EMAIL, PASSWORD, Some("Nadia Islam"))
                .with_account(DOCTOR_EMAIL, PASSWORD, Some("Dr. Rahman"))
                .with_account("stranger@uni.edu", PASSWORD, None),
        );
        let store = Arc::new(MemoryTokenStore::new());
        let bridge = Arc::new(TokenBridge::new(issuer, store.clone(), config.settle_delay()));
        let session = SessionSource::start(provider.clone(), bridge);
        let navigator = Arc::new(RecordingNavigator::new());
        let client = Arc::new(
            ApiClient::new(&config, session.clone(), store.clone(), navigator.clone()).unwrap(),
        );
        session.wait_idle().await;
        Self {
            config,
            provider,
            session,
            store,
            navigator,
            notifier: Arc::new(RecordingNotifier::new()),
            client,
        }
    }

    /// Signed in as the patient account.
    pub async fn signed_in(base: &str, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self::signed_in_as(base, issuer, PATIENT_EMAIL).await
    }

    pub async fn signed_in_as(base: &str, issuer: Arc<dyn TokenIssuer>, email: &str) -> Self {
        let harness = Self::signed_out(base, issuer).await;
        harness
            .session
            .sign_in_with_password(email, PASSWORD)
            .await
            .unwrap();
        harness
    }

    /// Fake backend plus a harness using its real `/jwt` endpoint.
    pub async fn with_backend(email: Option<&str>) -> (Self, SharedBackend) {
        let state = seeded_backend();
        let base = spawn_backend(fake_backend(state.clone())).await;
        let issuer = Arc::new(HttpTokenIssuer::new(&Self::config(&base)).unwrap());
        let harness = match email {
            Some(email) => Self::signed_in_as(&base, issuer, email).await,
            None => Self::signed_out(&base, issuer).await,
        };
        (harness, state)
    }
}
