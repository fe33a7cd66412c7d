// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: in-memory stores and storage backends, plus a mock
//! Kubernetes API service.

use async_trait::async_trait;
use http::{Request, Response};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, Resource, ResourceExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

use crate::error::{Error, Result};
use crate::storage::{ChartRegistry, ObjectStorage, StorageError, StorageResult};
use crate::store::{FinalizeApi, ListSelector, ObjectIndex, ResourceStore};
use crate::types::chart::{Chart, ChartSpec};
use crate::types::chart_group::{ChartGroup, ChartGroupSpec};
use crate::types::key::ResourceKey;

/// Anything the fakes can hold
pub trait FakeObject: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {}

impl<K> FakeObject for K where K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {}

/// Store operations recorded by [`FakeStore`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Get,
    List,
    Create,
    Update,
    UpdateStatus,
    Finalize,
    Delete,
}

/// One-shot failure injected into the next matching operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Conflict,
    NotFound,
    Unavailable,
}

struct FakeState<K> {
    objects: BTreeMap<ResourceKey, K>,
    calls: Vec<Op>,
    faults: Vec<(Op, Fault)>,
    deleted_uids: Vec<Option<String>>,
    revision: u64,
}

/// In-memory store emulating resource versions, UIDs and the store-owned
/// deletion timestamp.
///
/// Doubles as the read-through index so controller tests see their own writes.
pub struct FakeStore<K> {
    state: Mutex<FakeState<K>>,
    finalize_api: bool,
}

impl<K: FakeObject> Default for FakeStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: FakeObject> FakeStore<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                objects: BTreeMap::new(),
                calls: Vec::new(),
                faults: Vec::new(),
                deleted_uids: Vec::new(),
                revision: 0,
            }),
            finalize_api: false,
        }
    }

    /// Expose the dedicated finalize sub-resource
    pub fn with_finalize_api(mut self) -> Self {
        self.finalize_api = true;
        self
    }

    /// Store `obj` directly, assigning a resource version and a UID if missing
    pub fn insert(&self, mut obj: K) -> K {
        let mut state = self.state.lock().unwrap();
        state.revision += 1;
        obj.meta_mut().resource_version = Some(state.revision.to_string());
        if obj.meta().uid.is_none() {
            obj.meta_mut().uid = Some(format!("uid-{}", state.revision));
        }
        state.objects.insert(ResourceKey::of(&obj), obj.clone());
        obj
    }

    pub fn remove(&self, key: &ResourceKey) -> Option<K> {
        self.state.lock().unwrap().objects.remove(key)
    }

    /// Current stored object, without recording a call
    pub fn object(&self, key: &ResourceKey) -> Option<K> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn objects(&self) -> Vec<K> {
        self.state.lock().unwrap().objects.values().cloned().collect()
    }

    pub fn inject(&self, op: Op, fault: Fault) {
        self.state.lock().unwrap().faults.push((op, fault));
    }

    pub fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == op)
            .count()
    }

    /// UID preconditions of successful deletes, in order
    pub fn deleted_uids(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().deleted_uids.clone()
    }

    /// Record the call and take a matching injected fault
    fn begin(&self, op: Op, key: &ResourceKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        let Some(pos) = state.faults.iter().position(|(o, _)| *o == op) else {
            return Ok(());
        };
        let (_, fault) = state.faults.remove(pos);
        Err(fault_error::<K>(fault, key))
    }

    /// Guarded write: the stored object must exist with the same UID and resource version
    fn write(&self, op: Op, obj: &K) -> Result<K> {
        let key = ResourceKey::of(obj);
        self.begin(op, &key)?;

        let mut state = self.state.lock().unwrap();
        let stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found::<K>(&key))?;
        if stored.meta().uid != obj.meta().uid
            || stored.meta().resource_version != obj.meta().resource_version
        {
            return Err(conflict::<K>(&key));
        }

        let mut next = obj.clone();
        next.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
        state.revision += 1;
        next.meta_mut().resource_version = Some(state.revision.to_string());
        state.objects.insert(key, next.clone());
        Ok(next)
    }
}

fn not_found<K: FakeObject>(key: &ResourceKey) -> Error {
    Error::NotFound {
        kind: K::kind(&()).to_string(),
        key: key.to_string(),
    }
}

fn conflict<K: FakeObject>(key: &ResourceKey) -> Error {
    Error::Conflict {
        kind: K::kind(&()).to_string(),
        key: key.to_string(),
    }
}

fn fault_error<K: FakeObject>(fault: Fault, key: &ResourceKey) -> Error {
    match fault {
        Fault::Conflict => conflict::<K>(key),
        Fault::NotFound => not_found::<K>(key),
        Fault::Unavailable => Error::Storage("store unavailable".to_string()),
    }
}

#[async_trait]
impl<K: FakeObject> ResourceStore<K> for FakeStore<K> {
    async fn get(&self, key: &ResourceKey) -> Result<K> {
        self.begin(Op::Get, key)?;
        self.object(key).ok_or_else(|| not_found::<K>(key))
    }

    async fn list(&self, selector: &ListSelector) -> Result<Vec<K>> {
        self.begin(Op::List, &ResourceKey::cluster("*"))?;
        Ok(self
            .objects()
            .into_iter()
            .filter(|o| selector.matches(o.namespace().as_deref(), o.labels()))
            .collect())
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let key = ResourceKey::of(obj);
        self.begin(Op::Create, &key)?;
        if self.object(&key).is_some() {
            return Err(Error::AlreadyExists {
                kind: K::kind(&()).to_string(),
                key: key.to_string(),
            });
        }
        let mut obj = obj.clone();
        obj.meta_mut().uid = None;
        Ok(self.insert(obj))
    }

    async fn update(&self, obj: &K) -> Result<K> {
        self.write(Op::Update, obj)
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        self.write(Op::UpdateStatus, obj)
    }

    async fn delete(&self, key: &ResourceKey, uid: Option<&str>) -> Result<()> {
        self.begin(Op::Delete, key)?;
        let mut state = self.state.lock().unwrap();
        let stored = state.objects.get(key).ok_or_else(|| not_found::<K>(key))?;
        if uid.is_some() && stored.meta().uid.as_deref() != uid {
            return Err(conflict::<K>(key));
        }
        state.objects.remove(key);
        state.deleted_uids.push(uid.map(str::to_string));
        Ok(())
    }

    fn finalize_api(&self) -> Option<&dyn FinalizeApi<K>> {
        if self.finalize_api {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl<K: FakeObject> FinalizeApi<K> for FakeStore<K> {
    async fn finalize(&self, obj: &K) -> Result<K> {
        self.write(Op::Finalize, obj)
    }
}

#[async_trait]
impl<K: FakeObject> ObjectIndex<K> for FakeStore<K> {
    fn get(&self, key: &ResourceKey) -> Option<Arc<K>> {
        self.object(key).map(Arc::new)
    }

    fn list(&self, selector: &ListSelector) -> Vec<Arc<K>> {
        self.objects()
            .into_iter()
            .filter(|o| selector.matches(o.namespace().as_deref(), o.labels()))
            .map(Arc::new)
            .collect()
    }

    async fn wait_until_ready(&self) -> Result<()> {
        Ok(())
    }
}

/// A cluster-scoped ChartGroup owned by tenant `t1`
pub fn make_group(name: &str, uid: &str) -> ChartGroup {
    ChartGroup {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        spec: ChartGroupSpec {
            tenant_id: "t1".to_string(),
            ..Default::default()
        },
        status: None,
    }
}

/// A Chart of tenant `t1` inside `group`
pub fn make_chart(group: &str, name: &str, uid: &str) -> Chart {
    Chart {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(group.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        spec: ChartSpec {
            tenant_id: "t1".to_string(),
            ..Default::default()
        },
        status: None,
    }
}

/// Object storage keeping paths in memory
#[derive(Default)]
pub struct FakeObjectStorage {
    objects: Mutex<BTreeSet<String>>,
    deleted: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<String>>,
}

impl FakeObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(self, paths: &[&str]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .extend(paths.iter().map(|p| p.to_string()));
        self
    }

    /// Make every delete of `path` fail with a backend error
    pub fn fail_on(self, path: &str) -> Self {
        self.failing.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains(path)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeObjectStorage {
    async fn delete_object(&self, path: &str) -> StorageResult<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(StorageError::Backend(format!("cannot delete {}", path)));
        }
        if !self.objects.lock().unwrap().remove(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

/// External chart registry recording delete calls
#[derive(Default)]
pub struct FakeChartRegistry {
    deleted: Mutex<Vec<(String, String)>>,
}

impl FakeChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChartRegistry for FakeChartRegistry {
    async fn delete_chart(&self, project: &str, name: &str) -> StorageResult<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((project.to_string(), name.to_string()));
        Ok(())
    }
}

type Responses = HashMap<(String, String), (u16, String)>;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone, Default)]
pub struct MockService {
    responses: Arc<Mutex<Responses>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Method and path of every request served so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, status_json(404, "NotFound", "not found")));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// A Kubernetes `Status` failure body
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Serialize an object the way the API server would return it
pub fn object_json<K: FakeObject + serde::Serialize>(obj: &K) -> String {
    let mut value = serde_json::to_value(obj).unwrap();
    value["apiVersion"] = K::api_version(&()).to_string().into();
    value["kind"] = K::kind(&()).to_string().into();
    value.to_string()
}
