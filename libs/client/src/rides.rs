//! Ride reads and booking actions

use std::collections::HashMap;

use chrono::Utc;
use common::{
    booking::{self, Command, Decision},
    connectivity::{ConnectivityState, Link},
    models::{
        BookRideRequest, CancelRideRequest, NewRide, ResolveRequestBody, Ride,
        RideActionResponse,
    },
    search::RideFilter,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Result of a booking action
#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    /// The backend committed the change; this is its copy of the ride
    Persisted(Ride),
    /// The backend was unreachable; the change exists only in this value
    LocalOnly(Ride),
}

impl BookingOutcome {
    pub fn ride(&self) -> &Ride {
        match self {
            BookingOutcome::Persisted(ride) | BookingOutcome::LocalOnly(ride) => ride,
        }
    }

    pub fn into_ride(self) -> Ride {
        match self {
            BookingOutcome::Persisted(ride) | BookingOutcome::LocalOnly(ride) => ride,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, BookingOutcome::Persisted(_))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

async fn api_error(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(error) => error.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
        Err(_) => body,
    };

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Client for the ride endpoints of the API service
pub struct RideClient {
    base_url: String,
    token: Option<String>,
    http: Client,
    rides: Mutex<HashMap<Uuid, Ride>>,
    connectivity: ConnectivityState,
}

impl RideClient {
    pub fn new(base_url: impl Into<String>, connectivity: ConnectivityState) -> Self {
        Self::with_http(base_url, Client::new(), connectivity)
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, pooling)
    pub fn with_http(
        base_url: impl Into<String>,
        http: Client,
        connectivity: ConnectivityState,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            http,
            rides: Mutex::new(HashMap::new()),
            connectivity,
        }
    }

    /// Bearer token sent with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn connectivity(&self) -> &ConnectivityState {
        &self.connectivity
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a successful JSON answer
    ///
    /// Any answer from the backend marks it reachable; only a failed send
    /// marks it offline.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.connectivity.mark(Link::Backend, false);
                return Err(ClientError::Transport(e));
            }
        };
        self.connectivity.mark(Link::Backend, true);

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response.json().await.map_err(ClientError::Decode)
    }

    /// Fetch a ride, serving repeated reads from the local cache
    pub async fn get_ride(&self, id: Uuid) -> ClientResult<Ride> {
        if let Some(ride) = self.rides.lock().await.get(&id) {
            return Ok(ride.clone());
        }

        let ride: Ride = self
            .send(self.http.get(self.url(&format!("/api/rides/{}", id))))
            .await?;

        self.rides.lock().await.insert(id, ride.clone());
        Ok(ride)
    }

    /// Drop the cached copy of a ride
    pub async fn invalidate(&self, id: Uuid) {
        self.rides.lock().await.remove(&id);
    }

    pub async fn list_rides(&self) -> ClientResult<Vec<Ride>> {
        self.send(self.http.get(self.url("/api/rides"))).await
    }

    pub async fn search(&self, filter: &RideFilter) -> ClientResult<Vec<Ride>> {
        let url = self.url("/api/rides/search/find");
        self.send(self.http.get(url).query(filter)).await
    }

    pub async fn driver_rides(&self, driver_id: Uuid) -> ClientResult<Vec<Ride>> {
        let url = self.url(&format!("/api/rides/driver/{}", driver_id));
        self.send(self.http.get(url)).await
    }

    /// Publish a ride; never applied offline
    pub async fn create_ride(&self, ride: &NewRide) -> ClientResult<Ride> {
        self.send(self.http.post(self.url("/api/rides")).json(ride)).await
    }

    pub async fn book(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
        message: Option<String>,
    ) -> ClientResult<BookingOutcome> {
        let request = self
            .http
            .post(self.url(&format!("/api/rides/{}/book", ride_id)))
            .json(&BookRideRequest {
                user_id: Some(user_id),
                message: message.clone(),
            });

        self.mutate(ride_id, Command::Book { user_id, message }, request)
            .await
    }

    /// Cancel the whole ride (driver) or one's own booking (passenger)
    pub async fn cancel(
        &self,
        ride_id: Uuid,
        actor: Uuid,
        reason: impl Into<String>,
    ) -> ClientResult<BookingOutcome> {
        let reason = reason.into();
        let request = self
            .http
            .post(self.url(&format!("/api/rides/{}/cancel", ride_id)))
            .json(&CancelRideRequest {
                user_id: Some(actor),
                reason: reason.clone(),
            });

        self.mutate(ride_id, Command::Cancel { actor, reason }, request)
            .await
    }

    pub async fn resolve_request(
        &self,
        ride_id: Uuid,
        actor: Uuid,
        request_id: Uuid,
        decision: Decision,
    ) -> ClientResult<BookingOutcome> {
        let request = self
            .http
            .post(self.url(&format!(
                "/api/rides/{}/requests/{}",
                ride_id, request_id
            )))
            .json(&ResolveRequestBody { decision });

        self.mutate(
            ride_id,
            Command::Resolve {
                actor,
                request_id,
                decision,
            },
            request,
        )
        .await
    }

    pub async fn remove_passenger(
        &self,
        ride_id: Uuid,
        actor: Uuid,
        passenger_id: Uuid,
    ) -> ClientResult<BookingOutcome> {
        let request = self.http.delete(self.url(&format!(
            "/api/rides/{}/passengers/{}",
            ride_id, passenger_id
        )));

        self.mutate(
            ride_id,
            Command::RemovePassenger {
                actor,
                passenger_id,
            },
            request,
        )
        .await
    }

    async fn mutate(
        &self,
        ride_id: Uuid,
        command: Command,
        request: RequestBuilder,
    ) -> ClientResult<BookingOutcome> {
        match self.send::<RideActionResponse>(request).await {
            Ok(response) => {
                self.invalidate(ride_id).await;
                debug!("{} (ride {})", response.message, ride_id);
                Ok(BookingOutcome::Persisted(response.ride))
            }
            Err(ClientError::Transport(e)) => {
                warn!(
                    "Backend unreachable, ride {} changed locally only: {}",
                    ride_id, e
                );
                self.apply_locally(ride_id, &command).await
            }
            Err(e) => Err(e),
        }
    }

    /// Run the state machine on a copy of the cached ride; the cache keeps
    /// the last copy the backend confirmed
    async fn apply_locally(
        &self,
        ride_id: Uuid,
        command: &Command,
    ) -> ClientResult<BookingOutcome> {
        let mut ride = self
            .rides
            .lock()
            .await
            .get(&ride_id)
            .cloned()
            .ok_or(ClientError::NotCached(ride_id))?;

        booking::apply(&mut ride, command, Utc::now())?;
        Ok(BookingOutcome::LocalOnly(ride))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        routing::{get, post},
    };
    use chrono::Duration;
    use common::{
        error::BookingError,
        models::{Amenities, Location, PaymentType},
    };
    use serde_json::{Value, json};
    use tokio::{net::TcpListener, task::JoinHandle};

    const TOKEN: &str = "test-token";

    type Rejection = (StatusCode, Json<Value>);

    #[derive(Clone)]
    struct Backend {
        ride: Ride,
        fetches: Arc<AtomicUsize>,
    }

    fn ride(driver_id: Uuid) -> Ride {
        let departure = Utc::now() + Duration::days(3);
        NewRide {
            from: Location {
                name: "Pune".to_string(),
                address: "Swargate".to_string(),
            },
            to: Location {
                name: "Mumbai".to_string(),
                address: "Bandra".to_string(),
            },
            departure_time: departure,
            arrival_time: departure + Duration::hours(4),
            price: 500.0,
            available_seats: 2,
            vehicle: None,
            instant_booking: true,
            payment_type: PaymentType::Cash,
            amenities: Amenities::default(),
            stopovers: Vec::new(),
        }
        .into_ride(driver_id, Utc::now())
    }

    fn rejection(status: StatusCode, message: String, code: &str) -> Rejection {
        (status, Json(json!({ "message": message, "error": code })))
    }

    async fn fetch_ride(
        State(backend): State<Backend>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<Ride>, Rejection> {
        backend.fetches.fetch_add(1, Ordering::SeqCst);
        if id == backend.ride.id {
            Ok(Json(backend.ride))
        } else {
            Err(rejection(
                StatusCode::NOT_FOUND,
                "Ride not found".to_string(),
                "not_found",
            ))
        }
    }

    async fn search_rides(
        State(backend): State<Backend>,
        Query(filter): Query<RideFilter>,
    ) -> Json<Vec<Ride>> {
        Json(
            vec![backend.ride]
                .into_iter()
                .filter(|ride| filter.matches(ride))
                .collect(),
        )
    }

    async fn book_ride(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Json(body): Json<BookRideRequest>,
    ) -> Result<Json<RideActionResponse>, Rejection> {
        let bearer = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if bearer != Some("Bearer test-token") {
            return Err(rejection(
                StatusCode::UNAUTHORIZED,
                "Missing bearer token".to_string(),
                "unauthorized",
            ));
        }

        let mut ride = backend.ride;
        let command = Command::Book {
            user_id: body.user_id.unwrap(),
            message: body.message,
        };
        match booking::apply(&mut ride, &command, Utc::now()) {
            Ok(transition) => Ok(Json(RideActionResponse {
                message: transition.summary().to_string(),
                ride,
            })),
            Err(e) => Err(rejection(StatusCode::CONFLICT, e.to_string(), "conflict")),
        }
    }

    async fn serve(backend: Backend) -> (String, JoinHandle<()>) {
        let app = Router::new()
            .route("/api/rides/search/find", get(search_rides))
            .route("/api/rides/:id", get(fetch_ride))
            .route("/api/rides/:id/book", post(book_ride))
            .with_state(backend);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", address), handle)
    }

    /// Fresh connection per request, so a stopped server is seen immediately
    fn client(base_url: &str) -> RideClient {
        let http = Client::builder().pool_max_idle_per_host(0).build().unwrap();
        RideClient::with_http(base_url, http, ConnectivityState::new()).with_token(TOKEN)
    }

    async fn setup() -> (RideClient, Backend, JoinHandle<()>) {
        let backend = Backend {
            ride: ride(Uuid::new_v4()),
            fetches: Arc::new(AtomicUsize::new(0)),
        };
        let (url, handle) = serve(backend.clone()).await;
        (client(&url), backend, handle)
    }

    async fn stop(handle: JoinHandle<()>) {
        handle.abort();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_get_ride_is_read_through() {
        let (client, backend, _server) = setup().await;

        let first = client.get_ride(backend.ride.id).await.unwrap();
        let second = client.get_ride(backend.ride.id).await.unwrap();

        assert_eq!(first, backend.ride);
        assert_eq!(second, backend.ride);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_ride_is_reported_by_the_backend() {
        let (client, _, _server) = setup().await;

        match client.get_ride(Uuid::new_v4()).await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Ride not found");
            }
            other => panic!("expected an API error, got {:?}", other),
        }
        assert!(client.connectivity().is_reachable(Link::Backend));
    }

    #[tokio::test]
    async fn test_persisted_booking_invalidates_cached_ride() {
        let (client, backend, _server) = setup().await;
        let passenger = Uuid::new_v4();
        client.get_ride(backend.ride.id).await.unwrap();

        let outcome = client
            .book(backend.ride.id, passenger, Some("Two bags".to_string()))
            .await
            .unwrap();

        assert!(outcome.is_persisted());
        assert_eq!(outcome.ride().passengers, vec![passenger]);
        assert_eq!(outcome.ride().available_seats, 1);

        client.get_ride(backend.ride.id).await.unwrap();
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_booking_does_not_fall_back() {
        let (client, backend, _server) = setup().await;
        client.get_ride(backend.ride.id).await.unwrap();

        let result = client
            .book(backend.ride.id, backend.ride.driver_id, None)
            .await;

        match result {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 409);
                assert_eq!(message, BookingError::OwnRide.to_string());
            }
            other => panic!("expected an API error, got {:?}", other),
        }
        assert!(client.connectivity().is_reachable(Link::Backend));
    }

    #[tokio::test]
    async fn test_requests_carry_the_bearer_token() {
        let backend = Backend {
            ride: ride(Uuid::new_v4()),
            fetches: Arc::new(AtomicUsize::new(0)),
        };
        let (url, _server) = serve(backend.clone()).await;
        let anonymous = RideClient::new(url, ConnectivityState::new());

        let result = anonymous.book(backend.ride.id, Uuid::new_v4(), None).await;

        assert!(matches!(result, Err(ClientError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_backend_applies_booking_locally() {
        let (client, backend, server) = setup().await;
        let passenger = Uuid::new_v4();
        client.get_ride(backend.ride.id).await.unwrap();
        stop(server).await;

        let outcome = client.book(backend.ride.id, passenger, None).await.unwrap();

        match &outcome {
            BookingOutcome::LocalOnly(ride) => {
                assert_eq!(ride.passengers, vec![passenger]);
                assert_eq!(ride.available_seats, 1);
            }
            other => panic!("expected a local-only outcome, got {:?}", other),
        }
        assert!(!client.connectivity().is_reachable(Link::Backend));

        // the cache still holds the last confirmed copy
        let cached = client.get_ride(backend.ride.id).await.unwrap();
        assert_eq!(cached, backend.ride);
    }

    #[tokio::test]
    async fn test_offline_booking_still_follows_the_rules() {
        let (client, backend, server) = setup().await;
        client.get_ride(backend.ride.id).await.unwrap();
        stop(server).await;

        let result = client
            .book(backend.ride.id, backend.ride.driver_id, None)
            .await;

        assert!(matches!(
            result,
            Err(ClientError::Booking(BookingError::OwnRide))
        ));
    }

    #[tokio::test]
    async fn test_offline_without_a_cached_copy() {
        let (client, backend, server) = setup().await;
        stop(server).await;

        let error = client
            .cancel(backend.ride.id, backend.ride.driver_id, "Flat tyre")
            .await
            .unwrap_err();

        assert!(matches!(error, ClientError::NotCached(id) if id == backend.ride.id));
        assert!(error.is_offline());
    }

    #[tokio::test]
    async fn test_reads_fail_while_offline() {
        let (client, _, server) = setup().await;
        stop(server).await;

        let error = client.list_rides().await.unwrap_err();

        assert!(matches!(error, ClientError::Transport(_)));
        assert!(!client.connectivity().is_reachable(Link::Backend));
    }

    #[tokio::test]
    async fn test_search_sends_the_filter_as_query() {
        let (client, _, _server) = setup().await;

        let to_mumbai = client
            .search(&RideFilter {
                from: Some("pune".to_string()),
                to: Some("bandra".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let to_chennai = client
            .search(&RideFilter {
                to: Some("Chennai".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(to_mumbai.len(), 1);
        assert!(to_chennai.is_empty());
    }
}
