//! Shared test helpers: a scripted transport and canned API bodies.

use crate::error::TransportFailure;
use crate::transport::{ApiTransport, TransportResponse};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

type Reply = Result<TransportResponse, TransportFailure>;

/// A request seen by [`ScriptedTransport`]
#[derive(Clone, Debug)]
pub(crate) struct Call {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport answering from two scripts: one for the token endpoint, one for
/// the data endpoint. The last reply of a script repeats once it is reached.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    token_replies: Mutex<VecDeque<Reply>>,
    data_replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_json(self, body: Value) -> Self {
        self.token_reply(Ok(ok_json(body)))
    }

    pub fn token_reply(self, reply: Reply) -> Self {
        self.token_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn data_json(self, body: Value) -> Self {
        self.data_reply(Ok(ok_json(body)))
    }

    pub fn data_reply(self, reply: Reply) -> Self {
        self.data_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn token_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.path.contains("token")).count()
    }

    pub fn data_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !c.path.contains("token"))
            .collect()
    }
}

fn next_reply(queue: &Mutex<VecDeque<Reply>>) -> Reply {
    let mut queue = queue.lock().unwrap();
    match queue.len() {
        0 => Err(TransportFailure::new("no scripted reply")),
        1 => queue[0].clone(),
        _ => queue.pop_front().unwrap(),
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn get(&self, url: &Url, query: &[(&str, &str)]) -> Reply {
        let path = url.path().to_string();
        self.calls.lock().unwrap().push(Call {
            path: path.clone(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        if path.contains("token") {
            next_reply(&self.token_replies)
        } else {
            next_reply(&self.data_replies)
        }
    }
}

pub(crate) fn ok_json(body: Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        body: body.to_string(),
    }
}

pub(crate) fn token_body(token: &str) -> Value {
    json!({"siaet": {"retorno": "token", "codigo": "200", "mensagem": token}})
}

pub(crate) fn error_body(code: &str, message: &str) -> Value {
    json!({"siaet": {"retorno": "erro", "codigo": code, "mensagem": message}})
}

pub(crate) fn records_body(count: usize) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| json!({"numeroAet": format!("AET-{:04}", i + 1)}))
        .collect();
    json!({ "AET": records })
}
