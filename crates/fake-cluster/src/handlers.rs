use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use api_types::INFERENCE_SERVICE_LABEL;
use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::web::Json;
use poem::web::Path;
use poem::web::Query;
use poem::Request;
use poem::Response;
use serde_json::json;
use serde_json::Value;

use crate::state::top_class;
use crate::state::ClusterState;
use crate::state::MISSING_INSTANCES;

pub(crate) type SharedState = Arc<Mutex<ClusterState>>;

const REQUEST_EVENT: &str = "org.kubeflow.serving.inference.request";
const RESPONSE_EVENT: &str = "org.kubeflow.serving.inference.response";

fn json_response(status: StatusCode, body: &Value) -> Response {
    Response::builder()
        .status(status)
        .content_type("application/json")
        .body(body.to_string())
}

/// `Status` failure object as returned by the API server.
fn status_failure(status: StatusCode, reason: &str, message: String) -> Response {
    json_response(
        status,
        &json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": status.as_u16(),
        }),
    )
}

fn not_found(kind: &str, name: &str) -> Response {
    status_failure(
        StatusCode::NOT_FOUND,
        "NotFound",
        format!("{kind} \"{name}\" not found"),
    )
}

#[handler]
pub(crate) async fn create_isvc(
    Path(namespace): Path<String>,
    Data(state): Data<&SharedState>,
    Json(isvc): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("cluster state poisoned");
    match state.admit(&namespace, isvc) {
        Ok(created) => json_response(StatusCode::CREATED, &created),
        Err(message) => status_failure(StatusCode::CONFLICT, "AlreadyExists", message),
    }
}

#[handler]
pub(crate) async fn get_isvc(
    Path((namespace, name)): Path<(String, String)>,
    Data(state): Data<&SharedState>,
) -> Response {
    let mut state = state.lock().expect("cluster state poisoned");
    if state.take_get_failure(&name) {
        return status_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            format!("etcdserver: request timed out reading {name}"),
        );
    }
    match state.isvcs.get(&(namespace, name.clone())) {
        Some(isvc) => json_response(StatusCode::OK, isvc),
        None => not_found("inferenceservices.serving.kubeflow.org", &name),
    }
}

#[handler]
pub(crate) async fn delete_isvc(
    Path((namespace, name)): Path<(String, String)>,
    Data(state): Data<&SharedState>,
) -> Response {
    let mut state = state.lock().expect("cluster state poisoned");
    match state.remove(&namespace, &name) {
        Some(isvc) => json_response(StatusCode::OK, &isvc),
        None => not_found("inferenceservices.serving.kubeflow.org", &name),
    }
}

#[handler]
pub(crate) async fn list_pods(
    Path(namespace): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Data(state): Data<&SharedState>,
) -> Response {
    let state = state.lock().expect("cluster state poisoned");
    let selected = params.get("labelSelector").and_then(|selector| {
        selector
            .split_once('=')
            .filter(|(key, _)| *key == INFERENCE_SERVICE_LABEL)
            .map(|(_, value)| value.to_string())
    });
    let items = match (params.contains_key("labelSelector"), selected) {
        (true, None) => Vec::new(),
        (_, selected) => state.pods_json(&namespace, selected.as_deref()),
    };
    json_response(
        StatusCode::OK,
        &json!({
            "apiVersion": "v1",
            "kind": "PodList",
            "metadata": { "resourceVersion": "1" },
            "items": items,
        }),
    )
}

#[handler]
pub(crate) async fn pod_log(
    Path((namespace, name)): Path<(String, String)>,
    Data(state): Data<&SharedState>,
) -> Response {
    let state = state.lock().expect("cluster state poisoned");
    match state.pods.get(&(namespace, name.clone())) {
        Some(pod) => Response::builder()
            .status(StatusCode::OK)
            .content_type("text/plain")
            .body(pod.log.clone()),
        None => not_found("pods", &name),
    }
}

#[handler]
pub(crate) async fn get_service(
    Path((namespace, name)): Path<(String, String)>,
    Data(state): Data<&SharedState>,
) -> Response {
    if namespace != "istio-system" || name != "istio-ingressgateway" {
        return not_found("services", &name);
    }
    let state = state.lock().expect("cluster state poisoned");
    json_response(
        StatusCode::OK,
        &json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": name, "namespace": namespace },
            "spec": { "clusterIP": "10.96.0.10" },
            "status": {
                "loadBalancer": { "ingress": [{ "hostname": state.ingress_address }] }
            },
        }),
    )
}

/// Predictor behind the ingress gateway, routed on the `Host` header.
///
/// Mirrors the logger sidecar: request and response are forwarded as cloud
/// events to the pods of the service named by the logger URL.
#[handler]
pub(crate) async fn predict(
    req: &Request,
    Path(model): Path<String>,
    Data(state): Data<&SharedState>,
    Json(payload): Json<Value>,
) -> Response {
    let Some(service) = model.strip_suffix(":predict") else {
        return Response::builder().status(StatusCode::NOT_FOUND).finish();
    };
    let host = req.header("host").unwrap_or_default().to_string();

    let mut state = state.lock().expect("cluster state poisoned");
    let Some((_, isvc)) = state.route(&host) else {
        return Response::builder().status(StatusCode::NOT_FOUND).finish();
    };
    if isvc.pointer("/metadata/name").and_then(Value::as_str) != Some(service) {
        return Response::builder().status(StatusCode::NOT_FOUND).finish();
    }
    state.predict_requests += 1;

    let valid = state.accept_invalid
        || payload.get("instances").is_some()
        || payload.get("inputs").is_some();
    let (status, body) = if valid {
        let scores = state.scores.clone();
        let top = top_class(&scores);
        (
            StatusCode::OK,
            json!({ "predictions": [{ "scores": scores, "prediction": top, "key": "   1" }] }),
        )
    } else {
        (StatusCode::BAD_REQUEST, json!({ "error": MISSING_INSTANCES }))
    };

    let logger = isvc.pointer("/spec/default/predictor/logger").cloned();
    if let Some(sink) = logger.as_ref().and_then(|l| l["url"].as_str()).and_then(sink_of) {
        let mode = logger
            .as_ref()
            .and_then(|l| l["mode"].as_str())
            .unwrap_or("all")
            .to_string();
        let source = format!("http://localhost:9081/{service}");
        if mode == "all" || mode == "request" {
            let event = state.cloud_event(REQUEST_EVENT, &source, &payload);
            state.append_log(&sink.1, &sink.0, &event);
        }
        if mode == "all" || mode == "response" {
            let event = state.cloud_event(RESPONSE_EVENT, &source, &body);
            state.append_log(&sink.1, &sink.0, &event);
        }
    }

    json_response(status, &body)
}

/// (service, namespace) addressed by an in-cluster URL such as
/// `http://message-dumper.ns.svc.cluster.local`.
fn sink_of(url: &str) -> Option<(String, String)> {
    let host = url.split("://").nth(1).unwrap_or(url);
    let mut labels = host.split(['.', '/', ':']);
    let service = labels.next().filter(|s| !s.is_empty())?;
    let namespace = labels.next().filter(|s| !s.is_empty())?;
    Some((service.to_string(), namespace.to_string()))
}
