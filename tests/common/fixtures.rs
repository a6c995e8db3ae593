//! Mock SIAET server and canned bodies

use serde_json::{Value, json};
use siaet_dl::{Config, Credentials};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/api/token/";
pub const DATA_PATH: &str = "/api/aet/detalhe/v1/";

pub fn token_body(token: &str) -> Value {
    json!({"siaet": {"retorno": "token", "codigo": "200", "mensagem": token}})
}

pub fn error_body(code: &str, message: &str) -> Value {
    json!({"siaet": {"retorno": "erro", "codigo": code, "mensagem": message}})
}

pub fn records_body(month: u32, count: usize) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| json!({"numeroAet": format!("{:02}-{:03}", month, i + 1), "situacao": "LIBERADA"}))
        .collect();
    json!({ "AET": records })
}

/// Config pointed at `server`, writing into `dir`, with no delays
pub fn config_for(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::new(Credentials::new("client-id", "client-secret"), 2024);
    config.api.base_url = server.uri();
    config.api.request_timeout = Duration::from_millis(500);
    config.retry.delay = Duration::ZERO;
    config.month_delay = Duration::ZERO;
    config.output.base_dir = dir.path().join("aetsbaixadas");
    config
}

/// Token endpoint always issuing `token`
pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("Id", "client-id"))
        .and(query_param("Secret", "client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token)))
        .mount(server)
        .await;
}

/// Data endpoint answering `body` for `month`
pub async fn mount_month(server: &MockServer, month: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("mesLiberacaoAet", format!("{:02}", month)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
