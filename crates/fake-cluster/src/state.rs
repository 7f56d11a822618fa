use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

use api_types::INFERENCE_SERVICE_LABEL;
use serde_json::json;
use serde_json::Value;

pub(crate) const DEFAULT_SCORES: [f64; 6] = [0.9991, 0.0001, 0.0001, 0.0003, 0.0003, 0.0001];
pub(crate) const MISSING_INSTANCES: &str = "Missing 'inputs' or 'instances' key";

/// A pod backing one inference service.
#[derive(Debug, Clone)]
pub(crate) struct FakePod {
    pub isvc: String,
    pub container: String,
    pub image: String,
    pub log: String,
}

impl FakePod {
    pub fn to_json(&self, namespace: &str, name: &str, ready: bool) -> Value {
        let mut labels = serde_json::Map::new();
        labels.insert(INFERENCE_SERVICE_LABEL.to_string(), json!(self.isvc));
        let phase = if ready { "Running" } else { "Pending" };
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels,
            },
            "spec": {
                "containers": [{ "name": self.container, "image": self.image }],
            },
            "status": { "phase": phase },
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct ClusterState {
    /// (namespace, name) -> stored object
    pub isvcs: BTreeMap<(String, String), Value>,
    /// (namespace, pod name) -> pod
    pub pods: BTreeMap<(String, String), FakePod>,
    pub never_ready: HashSet<String>,
    /// service name -> GETs still answered with 500
    pub failing_gets: HashMap<String, usize>,
    /// answer payloads without `instances`/`inputs` like valid ones
    pub accept_invalid: bool,
    pub scores: Vec<f64>,
    pub ingress_address: String,
    pub predict_requests: usize,
    pub event_counter: u64,
}

impl ClusterState {
    pub fn is_ready(&self, namespace: &str, name: &str) -> bool {
        self.isvcs
            .get(&(namespace.to_string(), name.to_string()))
            .and_then(|isvc| isvc.pointer("/status/conditions/0/status"))
            .and_then(Value::as_str)
            == Some("True")
    }

    pub fn set_ready(&mut self, namespace: &str, name: &str, ready: bool) {
        if let Some(isvc) = self
            .isvcs
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            isvc["status"]["conditions"] = ready_conditions(ready);
        }
    }

    /// Consume one injected GET failure for `name`, if any are left.
    pub fn take_get_failure(&mut self, name: &str) -> bool {
        match self.failing_gets.get_mut(name) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    /// Store a submitted inference service and schedule its pod.
    pub fn admit(&mut self, namespace: &str, mut isvc: Value) -> Result<Value, String> {
        let name = isvc
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| "metadata.name is required".to_string())?
            .to_string();
        let key = (namespace.to_string(), name.clone());
        if self.isvcs.contains_key(&key) {
            return Err(format!("inferenceservices \"{name}\" already exists"));
        }

        let ready = !self.never_ready.contains(&name);
        isvc["metadata"]["namespace"] = json!(namespace);
        isvc["status"] = json!({
            "url": format!("http://{name}.{namespace}.example.com"),
            "conditions": ready_conditions(ready),
        });

        let predictor = isvc.pointer("/spec/default/predictor");
        let (container, image) = match predictor.and_then(|p| p.pointer("/custom/container")) {
            Some(container) => (
                container["name"].as_str().unwrap_or("kfserving-container").to_string(),
                container["image"].as_str().unwrap_or_default().to_string(),
            ),
            None => (
                "kfserving-container".to_string(),
                "tensorflow/serving:1.14.0".to_string(),
            ),
        };
        let pod_name = format!("{name}-predictor-default-00001-deployment-0");
        self.pods.insert(
            (namespace.to_string(), pod_name),
            FakePod {
                isvc: name.clone(),
                container,
                image,
                log: String::new(),
            },
        );

        self.isvcs.insert(key, isvc.clone());
        Ok(isvc)
    }

    pub fn remove(&mut self, namespace: &str, name: &str) -> Option<Value> {
        let removed = self
            .isvcs
            .remove(&(namespace.to_string(), name.to_string()))?;
        self.pods
            .retain(|(ns, _), pod| !(ns == namespace && pod.isvc == name));
        Some(removed)
    }

    pub fn pods_json(&self, namespace: &str, isvc: Option<&str>) -> Vec<Value> {
        self.pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && isvc.map_or(true, |name| pod.isvc == name))
            .map(|((ns, name), pod)| pod.to_json(ns, name, self.is_ready(ns, &pod.isvc)))
            .collect()
    }

    /// Append `entry` to the log of every pod of inference service `isvc`.
    pub fn append_log(&mut self, namespace: &str, isvc: &str, entry: &str) {
        for ((ns, _), pod) in self.pods.iter_mut() {
            if ns == namespace && pod.isvc == isvc {
                pod.log.push_str(entry);
            }
        }
    }

    /// Inference service answering requests for `host`.
    pub fn route(&self, host: &str) -> Option<(String, Value)> {
        self.isvcs.iter().find_map(|((namespace, _), isvc)| {
            let url = isvc.pointer("/status/url").and_then(Value::as_str)?;
            let route_host = url.strip_prefix("http://").unwrap_or(url);
            (route_host == host).then(|| (namespace.clone(), isvc.clone()))
        })
    }

    /// Cloud event as printed by the event display container.
    pub fn cloud_event(&mut self, event_type: &str, source: &str, data: &Value) -> String {
        self.event_counter += 1;
        format!(
            "Context Attributes,\n  specversion: 1.0\n  type: {event_type}\n  source: {source}\n  id: {id}\n  datacontenttype: application/json\nData,\n  {data}\n",
            id = self.event_counter,
        )
    }
}

pub(crate) fn ready_conditions(ready: bool) -> Value {
    let status = if ready { "True" } else { "False" };
    json!([{ "type": "Ready", "status": status }])
}

/// Argmax, first index on ties.
pub(crate) fn top_class(scores: &[f64]) -> usize {
    let mut best = 0;
    for (index, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = index;
        }
    }
    best
}
