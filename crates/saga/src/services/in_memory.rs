//! In-memory CRUD service for tests and local runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Method, RequestPayload, ResourceId, StepInput, StepResult};

use super::{Compensator, StepExecutor};
use crate::error::ServiceError;

#[derive(Debug, Default)]
struct InMemoryCrudState {
    /// Resources per service base URL.
    resources: HashMap<String, HashMap<ResourceId, RequestPayload>>,
    next_id: u32,
    scripted_ids: HashMap<String, VecDeque<ResourceId>>,
    failing: HashSet<String>,
    flaky: HashMap<String, u32>,
    hanging: HashSet<String>,
    failing_undo: HashSet<String>,
    calls: HashMap<String, u32>,
    compensation_log: Vec<String>,
}

/// In-memory stand-in for the three external services.
///
/// Services are told apart by base URL. Every call to [`Compensator::undo`]
/// is appended to a compensation log as `undo(<base_url>, <id>)`, whether or
/// not it succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCrudService {
    state: Arc<RwLock<InMemoryCrudState>>,
}

impl InMemoryCrudService {
    /// Creates a new in-memory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the id returned by the next create against `base_url`.
    pub fn push_id(&self, base_url: &str, id: impl Into<ResourceId>) {
        self.state
            .write()
            .unwrap()
            .scripted_ids
            .entry(base_url.to_string())
            .or_default()
            .push_back(id.into());
    }

    /// Stores a pre-existing resource, as if created by an earlier run.
    pub fn seed(&self, base_url: &str, id: impl Into<ResourceId>) {
        let id = id.into();
        let payload = RequestPayload {
            operation: "seed".to_string(),
            data: Default::default(),
            meta: None,
        };
        self.state
            .write()
            .unwrap()
            .resources
            .entry(base_url.to_string())
            .or_default()
            .insert(id, payload);
    }

    /// Configures every operation against `base_url` to fail.
    pub fn set_fail(&self, base_url: &str, fail: bool) {
        let mut state = self.state.write().unwrap();
        if fail {
            state.failing.insert(base_url.to_string());
        } else {
            state.failing.remove(base_url);
        }
    }

    /// Fails the next `times` operations against `base_url`, then recovers.
    pub fn fail_times(&self, base_url: &str, times: u32) {
        self.state
            .write()
            .unwrap()
            .flaky
            .insert(base_url.to_string(), times);
    }

    /// Makes operations against `base_url` never return.
    pub fn set_hang(&self, base_url: &str, hang: bool) {
        let mut state = self.state.write().unwrap();
        if hang {
            state.hanging.insert(base_url.to_string());
        } else {
            state.hanging.remove(base_url);
        }
    }

    /// Configures undo calls against `base_url` to fail.
    pub fn set_fail_on_undo(&self, base_url: &str, fail: bool) {
        let mut state = self.state.write().unwrap();
        if fail {
            state.failing_undo.insert(base_url.to_string());
        } else {
            state.failing_undo.remove(base_url);
        }
    }

    /// Every undo attempted so far, in call order.
    pub fn compensation_log(&self) -> Vec<String> {
        self.state.read().unwrap().compensation_log.clone()
    }

    /// Number of step operations received by `base_url`.
    pub fn call_count(&self, base_url: &str) -> u32 {
        self.state
            .read()
            .unwrap()
            .calls
            .get(base_url)
            .copied()
            .unwrap_or(0)
    }

    /// Number of live resources held by `base_url`.
    pub fn resource_count(&self, base_url: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .resources
            .get(base_url)
            .map_or(0, HashMap::len)
    }

    /// Returns true if `base_url` holds a resource with the given id.
    pub fn has_resource(&self, base_url: &str, id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .resources
            .get(base_url)
            .is_some_and(|resources| resources.contains_key(&ResourceId::from(id)))
    }

    fn apply(&self, input: &StepInput) -> Result<StepResult, ServiceError> {
        let mut state = self.state.write().unwrap();
        let base_url = input.base_url.as_str();

        if state.failing.contains(base_url) {
            return Err(ServiceError::Api {
                status: 500,
                body: format!("{base_url} unavailable"),
            });
        }
        if let Some(remaining) = state.flaky.get_mut(base_url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ServiceError::Api {
                    status: 503,
                    body: format!("{base_url} busy"),
                });
            }
        }

        match input.method {
            Method::Create => {
                let scripted = state
                    .scripted_ids
                    .get_mut(base_url)
                    .and_then(VecDeque::pop_front);
                let id = match scripted {
                    Some(id) => id,
                    None => {
                        state.next_id += 1;
                        ResourceId::new(format!("RES-{:04}", state.next_id))
                    }
                };
                state
                    .resources
                    .entry(base_url.to_string())
                    .or_default()
                    .insert(id.clone(), input.payload.clone());
                Ok(StepResult::new(id))
            }
            Method::Update | Method::Delete => {
                let id = input
                    .resource_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .ok_or(ServiceError::MissingResourceId {
                        method: input.method,
                    })?;
                let resources = state.resources.entry(base_url.to_string()).or_default();
                if !resources.contains_key(&id) {
                    return Err(ServiceError::Api {
                        status: 404,
                        body: format!("{id} not found"),
                    });
                }
                if input.method == Method::Update {
                    resources.insert(id.clone(), input.payload.clone());
                } else {
                    resources.remove(&id);
                }
                Ok(StepResult::new(id))
            }
        }
    }
}

#[async_trait]
impl StepExecutor for InMemoryCrudService {
    async fn perform(&self, input: &StepInput) -> Result<StepResult, ServiceError> {
        let hang = {
            let mut state = self.state.write().unwrap();
            *state.calls.entry(input.base_url.clone()).or_default() += 1;
            state.hanging.contains(&input.base_url)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        self.apply(input)
    }
}

#[async_trait]
impl Compensator for InMemoryCrudService {
    async fn undo(&self, base_url: &str, resource_id: &ResourceId) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state
            .compensation_log
            .push(format!("undo({base_url}, {resource_id})"));

        if state.failing_undo.contains(base_url) {
            return Err(ServiceError::Api {
                status: 500,
                body: "rollback failed".to_string(),
            });
        }
        if let Some(resources) = state.resources.get_mut(base_url) {
            resources.remove(resource_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StepId;

    fn input(base_url: &str, method: Method, resource_id: Option<&str>) -> StepInput {
        StepInput {
            base_url: base_url.to_string(),
            method,
            resource_id: resource_id.map(ResourceId::from),
            payload: RequestPayload::for_step(StepId::Step1, Default::default()),
        }
    }

    #[tokio::test]
    async fn test_create_and_undo() {
        let service = InMemoryCrudService::new();

        let result = service
            .perform(&input("svc1", Method::Create, None))
            .await
            .unwrap();
        assert!(result.resource_id.as_str().starts_with("RES-"));
        assert_eq!(service.resource_count("svc1"), 1);
        assert!(service.has_resource("svc1", result.resource_id.as_str()));

        service.undo("svc1", &result.resource_id).await.unwrap();
        assert_eq!(service.resource_count("svc1"), 0);
        assert_eq!(
            service.compensation_log(),
            vec![format!("undo(svc1, {})", result.resource_id)]
        );
    }

    #[tokio::test]
    async fn test_sequential_and_scripted_ids() {
        let service = InMemoryCrudService::new();
        service.push_id("svc2", "b2");

        let r1 = service
            .perform(&input("svc1", Method::Create, None))
            .await
            .unwrap();
        let r2 = service
            .perform(&input("svc2", Method::Create, None))
            .await
            .unwrap();
        let r3 = service
            .perform(&input("svc2", Method::Create, None))
            .await
            .unwrap();

        assert_eq!(r1.resource_id.as_str(), "RES-0001");
        assert_eq!(r2.resource_id.as_str(), "b2");
        assert_eq!(r3.resource_id.as_str(), "RES-0002");
    }

    #[tokio::test]
    async fn test_update_and_delete_require_existing_resource() {
        let service = InMemoryCrudService::new();
        service.seed("svc1", "a1");

        let missing = service.perform(&input("svc1", Method::Update, None)).await;
        assert_eq!(
            missing,
            Err(ServiceError::MissingResourceId {
                method: Method::Update
            })
        );

        let unknown = service
            .perform(&input("svc1", Method::Delete, Some("zz")))
            .await;
        assert!(matches!(unknown, Err(ServiceError::Api { status: 404, .. })));

        let updated = service
            .perform(&input("svc1", Method::Update, Some("a1")))
            .await
            .unwrap();
        assert_eq!(updated.resource_id.as_str(), "a1");

        service
            .perform(&input("svc1", Method::Delete, Some("a1")))
            .await
            .unwrap();
        assert!(!service.has_resource("svc1", "a1"));
        assert_eq!(service.call_count("svc1"), 4);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let service = InMemoryCrudService::new();
        service.set_fail("svc1", true);
        assert!(service.perform(&input("svc1", Method::Create, None)).await.is_err());
        service.set_fail("svc1", false);

        service.fail_times("svc1", 1);
        assert!(service.perform(&input("svc1", Method::Create, None)).await.is_err());
        assert!(service.perform(&input("svc1", Method::Create, None)).await.is_ok());

        service.set_fail_on_undo("svc1", true);
        assert!(service.undo("svc1", &"RES-0001".into()).await.is_err());
        assert_eq!(service.compensation_log().len(), 1);
    }
}
