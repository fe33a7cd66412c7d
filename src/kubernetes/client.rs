// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Store client backed by the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{DeleteParams, ListParams, PostParams, Preconditions};
use kube::{Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, instrument};

use crate::constants::OPERATOR_NAME;
use crate::engine::backoff::RateLimiter;
use crate::error::{Error, Result};
use crate::store::{ListSelector, RateLimiterProvider, ResourceStore};
use crate::types::key::ResourceKey;

/// Any kind the Kubernetes store can read and write
pub trait KubeObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> KubeObject for K where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

type ApiFor<K> = fn(Client, Option<&str>) -> Api<K>;

fn namespaced_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

fn cluster_api<K>(client: Client, _namespace: Option<&str>) -> Api<K>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    Api::all(client)
}

pub struct KubeStore<K> {
    client: Client,
    api_for: ApiFor<K>,
    limiter: RateLimiter,
}

impl<K> KubeStore<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    pub fn namespaced(client: Client) -> Self {
        Self {
            client,
            api_for: namespaced_api::<K>,
            limiter: RateLimiter::default(),
        }
    }
}

impl<K> KubeStore<K>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    pub fn cluster(client: Client) -> Self {
        Self {
            client,
            api_for: cluster_api::<K>,
            limiter: RateLimiter::default(),
        }
    }
}

impl<K: KubeObject> KubeStore<K> {
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn api(&self, namespace: Option<&str>) -> Api<K> {
        (self.api_for)(self.client.clone(), namespace)
    }

    fn api_for_key(&self, key: &ResourceKey) -> Api<K> {
        self.api(key.namespace.as_deref())
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }

    /// Turn API status codes into the typed variants the controllers branch on
    fn map_error(e: kube::Error, key: &ResourceKey) -> Error {
        let kind = K::kind(&()).to_string();
        let key = key.to_string();
        match &e {
            kube::Error::Api(resp) if resp.code == 404 => Error::NotFound { kind, key },
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Error::AlreadyExists { kind, key }
            }
            kube::Error::Api(resp) if resp.code == 409 => Error::Conflict { kind, key },
            _ => Error::Kube(e),
        }
    }
}

#[async_trait]
impl<K: KubeObject> ResourceStore<K> for KubeStore<K> {
    async fn get(&self, key: &ResourceKey) -> Result<K> {
        self.api_for_key(key)
            .get(&key.name)
            .await
            .map_err(|e| Self::map_error(e, key))
    }

    async fn list(&self, selector: &ListSelector) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if let Some(labels) = selector.label_selector() {
            params = params.labels(&labels);
        }
        let list = self.api(selector.namespace.as_deref()).list(&params).await?;
        Ok(list.items)
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), key = %ResourceKey::of(obj)))]
    async fn create(&self, obj: &K) -> Result<K> {
        let key = ResourceKey::of(obj);
        debug!("Creating object");
        self.api_for_key(&key)
            .create(&Self::post_params(), obj)
            .await
            .map_err(|e| Self::map_error(e, &key))
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), key = %ResourceKey::of(obj)))]
    async fn update(&self, obj: &K) -> Result<K> {
        let key = ResourceKey::of(obj);
        self.api_for_key(&key)
            .replace(&key.name, &Self::post_params(), obj)
            .await
            .map_err(|e| Self::map_error(e, &key))
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), key = %ResourceKey::of(obj)))]
    async fn update_status(&self, obj: &K) -> Result<K> {
        let key = ResourceKey::of(obj);
        let data = serde_json::to_vec(obj)?;
        self.api_for_key(&key)
            .replace_status(&key.name, &Self::post_params(), data)
            .await
            .map_err(|e| Self::map_error(e, &key))
    }

    #[instrument(skip(self), fields(kind = %K::kind(&()), key = %key))]
    async fn delete(&self, key: &ResourceKey, uid: Option<&str>) -> Result<()> {
        let params = DeleteParams {
            preconditions: uid.map(|uid| Preconditions {
                uid: Some(uid.to_string()),
                resource_version: None,
            }),
            ..Default::default()
        };
        self.api_for_key(key)
            .delete(&key.name, &params)
            .await
            .map_err(|e| Self::map_error(e, key))?;
        Ok(())
    }

    fn rate_limiter_provider(&self) -> Option<&dyn RateLimiterProvider> {
        Some(self)
    }
}

impl<K: KubeObject> RateLimiterProvider for KubeStore<K> {
    fn rate_limiter(&self) -> RateLimiter {
        self.limiter.clone()
    }
}
