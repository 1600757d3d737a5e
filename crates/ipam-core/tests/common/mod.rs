//! Test doubles and common utilities for contract tests
//!
//! `MockAuthority` behaves like the IPAM authority as far as the engine can
//! observe: it assigns references, rejects duplicate networks, reports
//! missing objects as not found, and stores one-element EA lists as plain
//! scalars.

#![allow(dead_code)]

use ipam_core::ea::WireAttributeMap;
use ipam_core::model::{ObjectRef, ObjectType};
use ipam_core::traits::{Connector, ConnectorError, ContainerFields, StateStore, TrackedContainer};
use ipam_core::{AttributeMap, AttributeValue, MemoryStateStore, NetworkContainer, NetworkFamily};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Counters {
    create: AtomicUsize,
    get: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Default)]
struct Objects {
    next_id: usize,
    by_ref: BTreeMap<String, (ObjectType, ContainerFields)>,
}

/// In-memory stand-in for the IPAM authority
#[derive(Clone, Default)]
pub struct MockAuthority {
    objects: Arc<Mutex<Objects>>,
    counters: Arc<Counters>,
    /// Failure returned by the next call, whatever it is
    fail_next: Arc<Mutex<Option<ConnectorError>>>,
    /// Failure returned by the next read only
    fail_next_read: Arc<Mutex<Option<ConnectorError>>>,
    /// Failure returned by the next delete only
    fail_next_delete: Arc<Mutex<Option<ConnectorError>>>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed handle sharing objects and counters with this one
    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(self.clone())
    }

    pub fn create_call_count(&self) -> usize {
        self.counters.create.load(Ordering::SeqCst)
    }

    pub fn get_call_count(&self) -> usize {
        self.counters.get.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.counters.update.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    /// Total remote calls of any kind
    pub fn call_count(&self) -> usize {
        self.create_call_count()
            + self.get_call_count()
            + self.update_call_count()
            + self.delete_call_count()
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: ConnectorError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Make the next read fail with `error`
    pub fn fail_next_read(&self, error: ConnectorError) {
        *self.fail_next_read.lock().unwrap() = Some(error);
    }

    /// Make the next delete fail with `error`
    pub fn fail_next_delete(&self, error: ConnectorError) {
        *self.fail_next_delete.lock().unwrap() = Some(error);
    }

    /// Number of objects currently stored
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().by_ref.len()
    }

    /// Raw stored `extattrs` of an object
    pub fn stored_extattrs(&self, reference: &ObjectRef) -> Option<WireAttributeMap> {
        self.objects
            .lock()
            .unwrap()
            .by_ref
            .get(reference.as_str())
            .and_then(|(_, fields)| fields.extattrs.clone())
    }

    /// Raw stored comment of an object
    pub fn stored_comment(&self, reference: &ObjectRef) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .by_ref
            .get(reference.as_str())
            .and_then(|(_, fields)| fields.comment.clone())
    }

    /// Set an attribute behind the engine's back
    pub fn set_attribute_out_of_band(&self, reference: &ObjectRef, name: &str, value: Value) {
        let mut objects = self.objects.lock().unwrap();
        if let Some((_, fields)) = objects.by_ref.get_mut(reference.as_str()) {
            let mut entry = serde_json::Map::new();
            entry.insert("value".to_string(), value);
            fields
                .extattrs
                .get_or_insert_with(Default::default)
                .insert(name.to_string(), Value::Object(entry));
            collapse(fields);
        }
    }

    /// Delete an object behind the engine's back
    pub fn delete_out_of_band(&self, reference: &ObjectRef) {
        self.objects.lock().unwrap().by_ref.remove(reference.as_str());
    }

    fn take_failure(&self) -> Result<(), ConnectorError> {
        match self.fail_next.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Store one-element lists as their only element
fn collapse(fields: &mut ContainerFields) {
    let Some(extattrs) = fields.extattrs.as_mut() else {
        return;
    };
    for entry in extattrs.values_mut() {
        if let Some(Value::Array(items)) = entry.get("value")
            && items.len() == 1
        {
            let only = items[0].clone();
            entry["value"] = only;
        }
    }
}

#[async_trait::async_trait]
impl Connector for MockAuthority {
    async fn create(
        &self,
        object_type: ObjectType,
        fields: &ContainerFields,
    ) -> Result<ObjectRef, ConnectorError> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let view = fields.network_view.clone().unwrap_or_else(|| "default".into());
        let network = fields
            .network
            .clone()
            .ok_or_else(|| ConnectorError::Malformed("network is required".into()))?;

        let mut objects = self.objects.lock().unwrap();
        let duplicate = objects.by_ref.values().any(|(kind, existing)| {
            *kind == object_type
                && existing.network.as_deref() == Some(network.as_str())
                && existing.network_view.as_deref() == Some(view.as_str())
        });
        if duplicate {
            return Err(ConnectorError::Conflict(format!(
                "The network container {} already exists",
                network
            )));
        }

        objects.next_id += 1;
        let reference = format!(
            "{}/ZG5zLm5ldHdvcmtfY29udGFpbmVy{}:{}/{}",
            object_type.wapi_name(),
            objects.next_id,
            network,
            view
        );

        let mut stored = ContainerFields {
            network_view: Some(view),
            network: Some(network),
            comment: fields.comment.clone(),
            extattrs: fields.extattrs.clone(),
            ..Default::default()
        };
        collapse(&mut stored);
        objects
            .by_ref
            .insert(reference.clone(), (object_type, stored));

        Ok(ObjectRef::new(reference))
    }

    async fn get(&self, reference: &ObjectRef) -> Result<ContainerFields, ConnectorError> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        if let Some(error) = self.fail_next_read.lock().unwrap().take() {
            return Err(error);
        }

        let objects = self.objects.lock().unwrap();
        let (_, fields) = objects
            .by_ref
            .get(reference.as_str())
            .ok_or_else(|| ConnectorError::NotFound(reference.to_string()))?;

        Ok(ContainerFields {
            extattrs: Some(fields.extattrs.clone().unwrap_or_default()),
            ..fields.clone()
        })
    }

    async fn update(
        &self,
        reference: &ObjectRef,
        fields: &ContainerFields,
    ) -> Result<ObjectRef, ConnectorError> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let mut objects = self.objects.lock().unwrap();
        let (_, stored) = objects
            .by_ref
            .get_mut(reference.as_str())
            .ok_or_else(|| ConnectorError::NotFound(reference.to_string()))?;

        if let Some(comment) = &fields.comment {
            stored.comment = Some(comment.clone());
        }
        if let Some(extattrs) = &fields.extattrs {
            stored.extattrs = Some(extattrs.clone());
        }
        if let Some(add) = &fields.extattrs_add {
            let current = stored.extattrs.get_or_insert_with(Default::default);
            for (name, entry) in add {
                current.insert(name.clone(), entry.clone());
            }
        }
        if let Some(remove) = &fields.extattrs_remove
            && let Some(current) = stored.extattrs.as_mut()
        {
            for name in remove.keys() {
                current.remove(name);
            }
        }
        collapse(stored);

        Ok(reference.clone())
    }

    async fn delete(&self, reference: &ObjectRef) -> Result<ObjectRef, ConnectorError> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        if let Some(error) = self.fail_next_delete.lock().unwrap().take() {
            return Err(error);
        }

        self.objects
            .lock()
            .unwrap()
            .by_ref
            .remove(reference.as_str())
            .map(|_| reference.clone())
            .ok_or_else(|| ConnectorError::NotFound(reference.to_string()))
    }

    fn connector_name(&self) -> &'static str {
        "mock"
    }
}

/// Memory store whose writes can be made to fail
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStateStore,
    failing_puts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail
    pub fn fail_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Number of tracked containers
    pub async fn tracked_count(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait::async_trait]
impl StateStore for FlakyStore {
    async fn get(&self, name: &str) -> Result<Option<TrackedContainer>, ipam_core::Error> {
        self.inner.get(name).await
    }

    async fn put(&self, name: &str, record: &TrackedContainer) -> Result<(), ipam_core::Error> {
        let failing = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ipam_core::Error::state_store("disk full"));
        }
        self.inner.put(name, record).await
    }

    async fn remove(&self, name: &str) -> Result<(), ipam_core::Error> {
        self.inner.remove(name).await
    }

    async fn list(&self) -> Result<Vec<String>, ipam_core::Error> {
        self.inner.list().await
    }

    async fn flush(&self) -> Result<(), ipam_core::Error> {
        self.inner.flush().await
    }
}

/// Build an attribute map from literal pairs
pub fn attrs<const N: usize>(entries: [(&str, AttributeValue); N]) -> AttributeMap {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Desired IPv4 container in the default view
pub fn v4_container(cidr: &str, comment: &str, attributes: AttributeMap) -> NetworkContainer {
    NetworkContainer::new(NetworkFamily::V4, "default", cidr, comment, attributes)
        .expect("valid test container")
}

/// Desired IPv6 container in the default view
pub fn v6_container(cidr: &str, comment: &str, attributes: AttributeMap) -> NetworkContainer {
    NetworkContainer::new(NetworkFamily::V6, "default", cidr, comment, attributes)
        .expect("valid test container")
}

/// The multi-value attribute set used across the lifecycle tests
pub fn scenario_attributes() -> AttributeMap {
    attrs([
        ("Location", "Test loc.".into()),
        ("Site", "Test site".into()),
        ("TestEA1", AttributeValue::list(["text1", "text2"])),
        ("TestEA2", AttributeValue::list([4, 5])),
    ])
}
