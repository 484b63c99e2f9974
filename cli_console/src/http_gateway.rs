use std::thread::JoinHandle;
use std::time::Duration;

use color_eyre::Result;
use console_core::{
    CommandGateway, Completion, Endpoint, HttpMethod, OutboundRequest, Service, TransportError,
};
use crossbeam_channel::{Receiver, Sender};
use reqwest::blocking::Client;
use reqwest::Url;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    simulation: String,
    predictor: String,
}

impl ServiceEndpoints {
    pub fn new(simulation: String, predictor: String) -> Self {
        Self {
            simulation: simulation.trim_end_matches('/').to_string(),
            predictor: predictor.trim_end_matches('/').to_string(),
        }
    }

    fn base(&self, service: Service) -> &str {
        match service {
            Service::Simulation => &self.simulation,
            Service::Predictor => &self.predictor,
        }
    }
}

/// Hands requests to the HTTP workers without blocking the UI thread.
pub struct HttpGateway {
    sender: Sender<OutboundRequest>,
}

impl HttpGateway {
    pub fn new(sender: Sender<OutboundRequest>) -> Self {
        Self { sender }
    }
}

impl CommandGateway for HttpGateway {
    fn submit(&mut self, request: OutboundRequest) {
        if let Err(err) = self.sender.send(request) {
            error!(request = ?err.0, "http.workers_gone");
        }
    }
}

pub fn spawn_http_workers(
    count: usize,
    endpoints: ServiceEndpoints,
    requests: Receiver<OutboundRequest>,
    completions: Sender<Completion>,
) -> Result<Vec<JoinHandle<()>>> {
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
    let handles = (0..count.max(1))
        .map(|index| {
            let client = client.clone();
            let endpoints = endpoints.clone();
            let requests = requests.clone();
            let completions = completions.clone();
            std::thread::Builder::new()
                .name(format!("http-worker-{index}"))
                .spawn(move || run_http_worker(&client, &endpoints, requests, completions))
        })
        .collect::<std::io::Result<Vec<_>>>()?;
    Ok(handles)
}

fn run_http_worker(
    client: &Client,
    endpoints: &ServiceEndpoints,
    requests: Receiver<OutboundRequest>,
    completions: Sender<Completion>,
) {
    for request in requests {
        let completion = dispatch(client, endpoints, &request);
        if completions.send(completion).is_err() {
            break;
        }
    }
}

/// Performs one request. Every failure is folded into the completion; there
/// are no retries.
fn dispatch(client: &Client, endpoints: &ServiceEndpoints, request: &OutboundRequest) -> Completion {
    let endpoint = request.endpoint();
    let url = match request_url(endpoints.base(endpoint.service), &endpoint) {
        Ok(url) => url,
        Err(err) => return request.fail(err),
    };
    let body = match request.body() {
        Ok(body) => body,
        Err(err) => return request.fail(TransportError::Decode(err.to_string())),
    };

    let builder = match endpoint.method {
        HttpMethod::Get => client.get(url.clone()),
        HttpMethod::Post => client.post(url.clone()),
        HttpMethod::Delete => client.delete(url.clone()),
    };
    let builder = match body {
        Some(json) => builder.json(&json),
        None => builder,
    };

    let response = match builder.send() {
        Ok(response) => response,
        Err(err) => {
            warn!(%url, error = %err, "http.send_failed");
            return request.fail(TransportError::Network(err.to_string()));
        }
    };
    let status = response.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "http.status");
        return request.fail(TransportError::Status(status.as_u16()));
    }
    match response.text() {
        Ok(text) => {
            debug!(%url, bytes = text.len(), "http.completed");
            request.complete(&text)
        }
        Err(err) => request.fail(TransportError::Network(err.to_string())),
    }
}

/// Joins the service base with the route, percent-encoding the id segment and
/// the query values.
fn request_url(base: &str, endpoint: &Endpoint) -> Result<Url, TransportError> {
    let mut url = Url::parse(&format!("{base}{}", endpoint.path))
        .map_err(|err| TransportError::Rejected(format!("bad service url {base}: {err}")))?;
    if let Some(segment) = &endpoint.segment {
        url.path_segments_mut()
            .map_err(|()| TransportError::Rejected(format!("service url {base} has no path")))?
            .push(segment);
    }
    if !endpoint.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &endpoint.query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}
