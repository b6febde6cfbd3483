use crate::{AdvanceOutcome, Error, GameApi, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tea_core::{
    GameId, GameSession, Player, PlayerId, ProductionPlan, ProductionSubmitResponse,
    SettlementRecord,
};
use tracing::{debug, warn};
use url::Url;

/// Header carrying the player's session token.
pub const SESSION_HEADER: &str = "X-Session-Token";

/// HTTP client for the game server API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session_token: Option<String>,
}

impl ApiClient {
    /// `base_url` includes the API prefix, e.g. `http://127.0.0.1:8000/api/v1`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        match base.scheme() {
            "http" | "https" => {}
            other => return Err(Error::InvalidScheme(other.to_string())),
        }
        // Url::join drops the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            session_token: None,
        })
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.session_token {
            req = req.header(SESSION_HEADER, token);
        }
        Ok(req)
    }

    /// Send and return the response body once status and envelope checks pass.
    async fn call(&self, req: RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status();
        let url = resp.url().clone();
        match status {
            StatusCode::UNAUTHORIZED => return Err(Error::Unauthorized),
            StatusCode::NOT_FOUND => return Err(Error::NotFound),
            _ => {}
        }
        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            warn!(%url, %status, %message, "request failed");
            return Err(Error::Failed { status, message });
        }
        let value: Value = serde_json::from_str(&body)?;
        if value.get("success") == Some(&Value::Bool(false)) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request rejected")
                .to_string();
            return Err(Error::Rejected(message));
        }
        debug!(%url, %status, "request ok");
        Ok(value)
    }

    /// Pull `data` out of an envelope; null or missing is an error.
    fn data(mut body: Value) -> Result<Value> {
        match body.get_mut("data").map(Value::take) {
            None | Some(Value::Null) => Err(Error::EmptyResponse),
            Some(data) => Ok(data),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.call(self.request(Method::GET, path)?).await?;
        Ok(serde_json::from_value(Self::data(body)?)?)
    }
}

impl GameApi for ApiClient {
    async fn get_game(&self, game_id: GameId) -> Result<GameSession> {
        self.get(&format!("games/{game_id}")).await
    }

    async fn get_players(&self, game_id: GameId) -> Result<Vec<Player>> {
        self.get(&format!("games/{game_id}/players")).await
    }

    async fn get_player(&self, player_id: PlayerId) -> Result<Player> {
        self.get(&format!("players/{player_id}")).await
    }

    async fn advance_round(&self, game_id: GameId) -> Result<AdvanceOutcome> {
        let req = self.request(Method::POST, &format!("rounds/{game_id}/advance"))?;
        let body = self.call(req).await?;
        // The outcome is either wrapped in `data` or sits at the top level.
        let outcome = match Self::data(body.clone()) {
            Ok(data) => data,
            Err(_) => body,
        };
        Ok(serde_json::from_value(outcome)?)
    }

    async fn get_round_summary(&self, game_id: GameId, round: u32) -> Result<SettlementRecord> {
        let req = self.request(Method::GET, &format!("rounds/{game_id}/{round}/summary"))?;
        let raw = Self::data(self.call(req).await?)?;
        Ok(SettlementRecord::from_payload(round, raw)?)
    }

    async fn submit_production(&self, plan: &ProductionPlan) -> Result<ProductionSubmitResponse> {
        let req = self.request(Method::POST, "production/submit")?.json(plan);
        let body = self.call(req).await?;
        match Self::data(body) {
            Ok(data) => Ok(serde_json::from_value(data)?),
            Err(Error::EmptyResponse) => Ok(ProductionSubmitResponse::default()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::net::SocketAddr;
    use tea_core::{GameStatus, Production};

    const TOKEN: &str = "tok-123";

    struct TestServer {
        base_url: String,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == TOKEN)
            .unwrap_or(false)
    }

    fn deny() -> Response {
        (
            AxumStatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "login required"})),
        )
            .into_response()
    }

    async fn game(headers: HeaderMap, Path(id): Path<u64>) -> Response {
        if !authorized(&headers) {
            return deny();
        }
        match id {
            13 => Json(json!({"success": false, "error": "game closed"})).into_response(),
            500 => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "db down"})),
            )
                .into_response(),
            _ => Json(json!({"success": true, "data": {
                "id": id, "name": "Room", "max_players": 4, "current_round": 3, "status": "in_progress"
            }}))
            .into_response(),
        }
    }

    async fn players(Path(id): Path<u64>) -> Response {
        Json(json!({"success": true, "data": [
            {"id": 1, "game_id": id, "name": "A", "cash": 1000.5},
            {"id": 2, "game_id": id, "name": "B", "cash": 800}
        ]}))
        .into_response()
    }

    async fn player(Path(id): Path<u64>) -> Response {
        if id == 404 {
            return (
                AxumStatusCode::NOT_FOUND,
                Json(json!({"success": false, "error": "no such player"})),
            )
                .into_response();
        }
        Json(json!({"success": true, "data": {"id": id, "game_id": 1, "name": "Me", "cash": 50}}))
            .into_response()
    }

    async fn advance(Path(game_id): Path<u64>) -> Response {
        Json(json!({"success": true, "previous_round": 3, "current_round": 4,
                    "game_finished": false, "game": game_id}))
        .into_response()
    }

    async fn summary(Path((_game, round)): Path<(u64, u32)>) -> Response {
        if round == 1 {
            return Json(json!({"success": true, "data": [
                {"player_id": 1, "nickname": "A", "total_revenue": 90, "total_sold": 3}
            ]}))
            .into_response();
        }
        Json(json!({"success": true, "data": {
            "round_number": round,
            "customer_flow": {"round_number": round, "high_tier_customers": 12, "low_tier_customers": 30},
            "players": [{"player_id": 2, "nickname": "B", "total_revenue": 120, "total_sold": 4}]
        }}))
        .into_response()
    }

    async fn submit(Json(body): Json<serde_json::Value>) -> Response {
        let last = body["player_id"] == json!(2);
        Json(json!({"success": true, "data": {
            "material_costs": {"total_cost": 42.5},
            "all_players_submitted": last
        }}))
        .into_response()
    }

    async fn start() -> TestServer {
        let router = Router::new()
            .route("/api/v1/games/:id", get(game))
            .route("/api/v1/games/:id/players", get(players))
            .route("/api/v1/players/:id", get(player))
            .route("/api/v1/rounds/:game_id/advance", post(advance))
            .route("/api/v1/rounds/:game_id/:round/summary", get(summary))
            .route("/api/v1/production/submit", post(submit));
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        TestServer {
            base_url: format!("http://{addr}/api/v1"),
            handle,
        }
    }

    fn client(server: &TestServer) -> ApiClient {
        ApiClient::new(&server.base_url, Duration::from_secs(5))
            .unwrap()
            .with_session_token(TOKEN)
    }

    #[tokio::test]
    async fn game_is_fetched_with_session_token() {
        let server = start().await;
        let game = client(&server).get_game(7).await.unwrap();
        assert_eq!(game.id, 7);
        assert_eq!(game.current_round, 3);
        assert_eq!(game.status, GameStatus::InProgress);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let server = start().await;
        let anon = ApiClient::new(&server.base_url, Duration::from_secs(5)).unwrap();
        let err = anon.get_game(7).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn missing_player_is_not_found() {
        let server = start().await;
        let err = client(&server).get_player(404).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
        let me = client(&server).get_player(5).await.unwrap();
        assert_eq!(me.name, "Me");
    }

    #[tokio::test]
    async fn envelope_rejection_and_server_errors() {
        let server = start().await;
        let c = client(&server);
        match c.get_game(13).await.unwrap_err() {
            Error::Rejected(msg) => assert_eq!(msg, "game closed"),
            other => panic!("unexpected error: {other:?}"),
        }
        match c.get_game(500).await.unwrap_err() {
            Error::Failed { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn roster_decodes() {
        let server = start().await;
        let roster = client(&server).get_players(9).await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].game_id, 9);
    }

    #[tokio::test]
    async fn summary_in_both_shapes() {
        let server = start().await;
        let c = client(&server);
        let first = c.get_round_summary(1, 1).await.unwrap();
        assert_eq!(first.players[0].nickname, "A");
        assert!(first.customer_flow.is_none());
        let later = c.get_round_summary(1, 4).await.unwrap();
        assert_eq!(later.round_number, 4);
        assert_eq!(later.customer_flow.unwrap().high_tier_customers, 12);
    }

    #[tokio::test]
    async fn advance_reads_top_level_outcome() {
        let server = start().await;
        let outcome = client(&server).advance_round(1).await.unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome {
                previous_round: 3,
                current_round: 4,
                game_finished: false
            }
        );
    }

    #[tokio::test]
    async fn submission_reports_last_submitter() {
        let server = start().await;
        let c = client(&server);
        let plan = |player_id| ProductionPlan {
            player_id,
            round_number: 2,
            productions: vec![Production {
                product_id: 1,
                productivity: 10,
                price: Decimal::new(1850, 2),
            }],
        };
        assert!(!c.submit_production(&plan(1)).await.unwrap().all_players_submitted);
        let resp = c.submit_production(&plan(2)).await.unwrap();
        assert!(resp.all_players_submitted);
        assert!(resp.material_costs.is_some());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(matches!(
            ApiClient::new("ftp://example.com/api", Duration::from_secs(1)),
            Err(Error::InvalidScheme(_))
        ));
    }

    #[test]
    fn joins_paths_under_prefix() {
        let c = ApiClient::new("http://localhost:8000/api/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.url("/rounds/3/2/summary").unwrap().as_str(),
            "http://localhost:8000/api/v1/rounds/3/2/summary"
        );
    }

    #[tokio::test]
    async fn closed_port_is_transient() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let c = ApiClient::new(&format!("http://{addr}/api/v1"), Duration::from_secs(2)).unwrap();
        let err = c.get_game(1).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!err.is_session_fatal());
    }
}
