//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Creating, reading, updating and deleting containers through a Connector
//! - Deciding what an update must send, using the EA differ
//! - Tracking managed containers in a StateStore
//! - Verifying that destroyed containers are gone
//!
//! ## Architecture
//!
//! ```text
//!                      desired NetworkContainer
//!                                 │
//!                                 ▼
//!                         ┌──────────────┐
//!                         │  Reconciler  │
//!                         └──────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//! ┌──────────────┐        ┌──────────────┐        ┌─────────────┐
//! │  StateStore  │        │  Connector   │        │   Events    │
//! │ (ref, snap)  │        │ (remote I/O) │        │  (notify)   │
//! └──────────────┘        └──────────────┘        └─────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! Each container moves through
//! `Absent → Creating → Present → Updating → Present → Deleting → Absent`.
//! `Present` is the only stable state. Transitions are published as
//! [`EngineEvent::StateChanged`].
//!
//! ## Failures
//!
//! The engine never retries. Validation and immutable-field errors are
//! raised before any remote call. A connector failure other than not-found is
//! reported as [`Error::Transport`] and never taken as evidence that an
//! object exists or is gone.

mod verify;

pub use verify::{VerificationCondition, VerificationFailure, VerificationReport};

use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, TENANT_ID_ATTRIBUTE};
use crate::ea::{self, AttributeDiffer, AttributeMap, AttributePatch, AttributeValue};
use crate::error::{Error, Operation, Result};
use crate::model::{NetworkContainer, NetworkFamily, ObjectRef};
use crate::traits::{Connector, ConnectorError, ContainerFields, StateStore, TrackedContainer};

/// Lifecycle state of a managed container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl LifecycleState {
    /// Whether the state persists between operations
    pub fn is_stable(self) -> bool {
        matches!(self, LifecycleState::Present)
    }

    /// Whether `next` is a legal successor
    ///
    /// A failed transient step falls back to the state it started from.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present)
                | (Creating, Absent)
                | (Present, Updating)
                | (Updating, Present)
                | (Present, Deleting)
                | (Deleting, Absent)
                | (Deleting, Present)
        )
    }
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Lifecycle transition of a named container
    StateChanged {
        name: String,
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Container created
    Created { name: String, reference: ObjectRef },

    /// Container updated
    Updated {
        name: String,
        reference: ObjectRef,
        comment_changed: bool,
        attributes_set: usize,
        attributes_removed: usize,
    },

    /// Container already matched the desired state
    Unchanged { name: String, reference: ObjectRef },

    /// Tracked container no longer exists remotely and will be created again
    Vanished { name: String, reference: ObjectRef },

    /// Container deleted
    Deleted { name: String, reference: ObjectRef },

    /// Operation failed
    Failed {
        name: String,
        operation: Operation,
        error: String,
    },
}

/// Changes an update must send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// New comment, when it differs (may be the empty string)
    pub comment: Option<String>,
    /// Attribute changes
    pub attributes: AttributePatch,
}

impl UpdatePlan {
    /// True when no update call is needed
    pub fn is_empty(&self) -> bool {
        self.comment.is_none() && self.attributes.is_empty()
    }

    /// Request body carrying only the changed fields
    pub fn to_fields(&self) -> ContainerFields {
        let patch = &self.attributes;
        ContainerFields {
            comment: self.comment.clone(),
            extattrs_add: (!patch.to_set.is_empty()).then(|| ea::encode(&patch.to_set)),
            extattrs_remove: (!patch.to_remove.is_empty())
                .then(|| ea::encode_removals(&patch.to_remove)),
            ..Default::default()
        }
    }
}

/// What applying a desired container would do
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Not tracked yet
    Create,
    /// Tracked, but the authority no longer has it
    Recreate { stale: ObjectRef },
    /// Present and drifted
    Update {
        observed: NetworkContainer,
        changes: UpdatePlan,
    },
    /// Present and equivalent
    NoOp { observed: NetworkContainer },
}

/// Result of an update or apply
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Created(NetworkContainer),
    Updated(NetworkContainer),
    Unchanged(NetworkContainer),
}

impl ApplyOutcome {
    /// The container as last observed
    pub fn container(&self) -> &NetworkContainer {
        match self {
            ApplyOutcome::Created(c) | ApplyOutcome::Updated(c) | ApplyOutcome::Unchanged(c) => c,
        }
    }

    /// Consume the outcome, returning the container
    pub fn into_container(self) -> NetworkContainer {
        match self {
            ApplyOutcome::Created(c) | ApplyOutcome::Updated(c) | ApplyOutcome::Unchanged(c) => c,
        }
    }
}

/// Core reconciliation engine
///
/// Holds the connector and state store it was given; it reads no global
/// state. Every remote call is awaited before the operation returns and
/// nothing runs in the background.
pub struct Reconciler {
    /// Remote authority
    connector: Box<dyn Connector>,

    /// Tracked containers
    state_store: Box<dyn StateStore>,

    /// Attribute comparison rules
    differ: AttributeDiffer,

    /// Tenant written on create
    tenant_id: Option<String>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields engine events
    pub fn new(
        connector: Box<dyn Connector>,
        state_store: Box<dyn StateStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let mut retained = config.retained_attributes;
        if config.tenant_id.is_some() {
            retained.push(TENANT_ID_ATTRIBUTE.to_string());
        }

        let reconciler = Self {
            connector,
            state_store,
            differ: AttributeDiffer::new(config.diff_mode).with_retained(retained),
            tenant_id: config.tenant_id,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Create a container on the authority
    ///
    /// Returns the desired container with its reference set. A duplicate
    /// network fails with [`Error::Conflict`]; the existing object is not
    /// adopted.
    pub async fn create(&self, desired: &NetworkContainer) -> Result<NetworkContainer> {
        if let Some(reference) = desired.reference() {
            return Err(Error::validation(format!(
                "container {} already exists as {}",
                desired.cidr(),
                reference
            )));
        }

        let mut created = desired.clone();
        if let Some(tenant) = &self.tenant_id {
            created
                .attributes_mut()
                .entry(TENANT_ID_ATTRIBUTE.to_string())
                .or_insert_with(|| AttributeValue::from(tenant.as_str()));
        }

        let attributes = ea::encode(created.attributes());
        let fields = ContainerFields {
            network_view: Some(created.network_view().to_string()),
            network: Some(created.cidr().to_string()),
            comment: (!created.comment().is_empty()).then(|| created.comment().to_string()),
            extattrs: (!attributes.is_empty()).then_some(attributes),
            ..Default::default()
        };

        let object_type = created.object_type();
        debug!(
            "Creating {} {} in view {}",
            object_type,
            created.cidr(),
            created.network_view()
        );

        let reference = self
            .connector
            .create(object_type, &fields)
            .await
            .map_err(|e| match e {
                ConnectorError::Conflict(_) => Error::Conflict {
                    object_type: object_type.to_string(),
                    network: created.cidr().to_string(),
                },
                other => Error::transport(Operation::Create, None, other.to_string()),
            })?;

        info!("Created {} {} as {}", object_type, created.cidr(), reference);
        created.set_reference(reference);
        Ok(created)
    }

    /// Read a container by reference
    ///
    /// A missing object is [`Error::Absent`]; any other failure is
    /// [`Error::Transport`].
    pub async fn read(&self, reference: &ObjectRef) -> Result<NetworkContainer> {
        let fields = self
            .connector
            .get(reference)
            .await
            .map_err(|e| remote_error(Operation::Read, reference, e))?;

        decode_container(reference, fields)
    }

    /// Update a container towards `desired`
    ///
    /// `current` is the last known state and must carry a reference.
    /// `cleared` names attributes that used to be managed and should be
    /// removed. Changing the CIDR or the network view fails with
    /// [`Error::ImmutableFieldChange`] before any remote call. When the
    /// freshly read state is already equivalent, no update is sent.
    pub async fn update(
        &self,
        current: &NetworkContainer,
        desired: &NetworkContainer,
        cleared: &BTreeSet<String>,
    ) -> Result<ApplyOutcome> {
        let reference = current
            .reference()
            .ok_or_else(|| Error::validation("cannot update a container that was never created"))?;
        check_immutable(current, desired)?;

        let observed = self.read(reference).await?;
        let changes = self.plan_update(desired, &observed, cleared);
        self.execute_update(reference, observed, &changes).await
    }

    /// Delete a container by reference
    ///
    /// Deleting an object that no longer exists succeeds.
    pub async fn delete(&self, reference: &ObjectRef) -> Result<()> {
        match self.connector.delete(reference).await {
            Ok(_) => {
                info!("Deleted {}", reference);
                Ok(())
            }
            Err(ConnectorError::NotFound(_)) => {
                debug!("{} already absent, nothing to delete", reference);
                Ok(())
            }
            Err(e) => Err(remote_error(Operation::Delete, reference, e)),
        }
    }

    /// Check that every reference resolves to absent
    pub async fn verify_destroyed<'a, I>(&self, references: I) -> VerificationReport
    where
        I: IntoIterator<Item = &'a ObjectRef>,
    {
        let mut report = VerificationReport::default();

        for reference in references {
            report.checked += 1;
            match self.read(reference).await {
                Err(Error::Absent { .. }) => {
                    debug!("{} verified absent", reference);
                }
                Ok(_) => {
                    warn!("Object with ID '{}' remains", reference);
                    report.record(reference, VerificationCondition::StillPresent);
                }
                Err(e) => {
                    warn!("Could not verify {}: {}", reference, e);
                    report.record(reference, VerificationCondition::ReadFailed(e.to_string()));
                }
            }
        }

        report
    }

    /// Compare the desired container with what is tracked and observed
    ///
    /// Performs at most one read and never writes.
    pub async fn plan(&self, name: &str, desired: &NetworkContainer) -> Result<Plan> {
        let tracked = self.state_store.get(name).await?;
        self.plan_tracked(tracked, desired).await
    }

    async fn plan_tracked(
        &self,
        tracked: Option<TrackedContainer>,
        desired: &NetworkContainer,
    ) -> Result<Plan> {
        let Some(tracked) = tracked else {
            return Ok(Plan::Create);
        };
        check_immutable(&tracked.snapshot, desired)?;

        match self.read(&tracked.reference).await {
            Ok(observed) => {
                let cleared = cleared_attributes(&tracked, desired);
                let changes = self.plan_update(desired, &observed, &cleared);
                if changes.is_empty() {
                    Ok(Plan::NoOp { observed })
                } else {
                    Ok(Plan::Update { observed, changes })
                }
            }
            Err(Error::Absent { reference }) => Ok(Plan::Recreate { stale: reference }),
            Err(e) => Err(e),
        }
    }

    /// Bring the named container to the desired state
    ///
    /// Creates untracked containers, recreates tracked ones that vanished
    /// remotely, and updates the rest. The result is recorded in the state
    /// store. A failure is published as [`EngineEvent::Failed`] labelled with
    /// the step being attempted: `create` for an untracked or vanished
    /// container, `update` for a tracked one.
    pub async fn apply(&self, name: &str, desired: &NetworkContainer) -> Result<ApplyOutcome> {
        let tracked = match self.state_store.get(name).await {
            Ok(tracked) => tracked,
            Err(e) => return Err(self.report_failure(name, Operation::Read, e)),
        };
        let operation = if tracked.is_some() {
            Operation::Update
        } else {
            Operation::Create
        };

        let plan = match self.plan_tracked(tracked, desired).await {
            Ok(plan) => plan,
            Err(e) => return Err(self.report_failure(name, operation, e)),
        };
        let operation = match plan {
            Plan::Create | Plan::Recreate { .. } => Operation::Create,
            Plan::Update { .. } | Plan::NoOp { .. } => Operation::Update,
        };

        match self.apply_plan(name, desired, plan).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.report_failure(name, operation, e)),
        }
    }

    fn report_failure(&self, name: &str, operation: Operation, error: Error) -> Error {
        self.emit_event(EngineEvent::Failed {
            name: name.to_string(),
            operation,
            error: error.to_string(),
        });
        error
    }

    async fn apply_plan(
        &self,
        name: &str,
        desired: &NetworkContainer,
        plan: Plan,
    ) -> Result<ApplyOutcome> {
        match plan {
            Plan::Create => self.create_tracked(name, desired).await,
            Plan::Recreate { stale } => {
                warn!("{} ({}) vanished from the authority, recreating", name, stale);
                self.state_store.remove(name).await?;
                self.emit_event(EngineEvent::Vanished {
                    name: name.to_string(),
                    reference: stale,
                });
                self.transition(name, LifecycleState::Present, LifecycleState::Deleting);
                self.transition(name, LifecycleState::Deleting, LifecycleState::Absent);
                self.create_tracked(name, desired).await
            }
            Plan::NoOp { observed } => {
                let reference = tracked_reference(&observed)?;
                debug!("{} is up to date", name);
                self.track(name, &observed, desired).await?;
                self.emit_event(EngineEvent::Unchanged {
                    name: name.to_string(),
                    reference,
                });
                Ok(ApplyOutcome::Unchanged(observed))
            }
            Plan::Update { observed, changes } => {
                let reference = tracked_reference(&observed)?;
                self.transition(name, LifecycleState::Present, LifecycleState::Updating);

                let outcome = self.execute_update(&reference, observed, &changes).await;
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.transition(name, LifecycleState::Updating, LifecycleState::Present);
                        return Err(e);
                    }
                };

                let updated = outcome.container();
                self.track(name, updated, desired).await?;
                self.transition(name, LifecycleState::Updating, LifecycleState::Present);
                self.emit_event(EngineEvent::Updated {
                    name: name.to_string(),
                    reference: tracked_reference(updated)?,
                    comment_changed: changes.comment.is_some(),
                    attributes_set: changes.attributes.to_set.len(),
                    attributes_removed: changes.attributes.to_remove.len(),
                });
                Ok(outcome)
            }
        }
    }

    /// Delete the named container and stop tracking it
    ///
    /// Returns the deleted reference for later verification, or `None` when
    /// the name was not tracked.
    pub async fn destroy(&self, name: &str) -> Result<Option<ObjectRef>> {
        let Some(tracked) = self.state_store.get(name).await? else {
            debug!("{} is not tracked, nothing to destroy", name);
            return Ok(None);
        };

        self.transition(name, LifecycleState::Present, LifecycleState::Deleting);
        if let Err(e) = self.delete(&tracked.reference).await {
            self.transition(name, LifecycleState::Deleting, LifecycleState::Present);
            self.emit_event(EngineEvent::Failed {
                name: name.to_string(),
                operation: Operation::Delete,
                error: e.to_string(),
            });
            return Err(e);
        }

        self.state_store.remove(name).await?;
        self.transition(name, LifecycleState::Deleting, LifecycleState::Absent);
        self.emit_event(EngineEvent::Deleted {
            name: name.to_string(),
            reference: tracked.reference.clone(),
        });
        Ok(Some(tracked.reference))
    }

    /// Destroy every tracked container
    ///
    /// Stops at the first failure; containers destroyed so far stay
    /// destroyed and untracked.
    pub async fn destroy_all(&self) -> Result<Vec<ObjectRef>> {
        let mut destroyed = Vec::new();
        for name in self.state_store.list().await? {
            if let Some(reference) = self.destroy(&name).await? {
                destroyed.push(reference);
            }
        }
        Ok(destroyed)
    }

    /// References of all tracked containers
    pub async fn tracked_references(&self) -> Result<Vec<ObjectRef>> {
        let mut references = Vec::new();
        for name in self.state_store.list().await? {
            if let Some(tracked) = self.state_store.get(&name).await? {
                references.push(tracked.reference);
            }
        }
        Ok(references)
    }

    /// Persist tracked state
    pub async fn flush(&self) -> Result<()> {
        self.state_store.flush().await
    }

    /// Comment and attribute changes between desired and observed
    pub fn plan_update(
        &self,
        desired: &NetworkContainer,
        observed: &NetworkContainer,
        cleared: &BTreeSet<String>,
    ) -> UpdatePlan {
        UpdatePlan {
            comment: (desired.comment() != observed.comment())
                .then(|| desired.comment().to_string()),
            attributes: self
                .differ
                .patch(desired.attributes(), observed.attributes(), cleared),
        }
    }

    async fn execute_update(
        &self,
        reference: &ObjectRef,
        observed: NetworkContainer,
        changes: &UpdatePlan,
    ) -> Result<ApplyOutcome> {
        if changes.is_empty() {
            debug!("{} matches desired state, no update sent", reference);
            return Ok(ApplyOutcome::Unchanged(observed));
        }

        debug!(
            "Updating {}: comment {}, {} attribute(s) to set, {} to remove",
            reference,
            if changes.comment.is_some() { "changed" } else { "unchanged" },
            changes.attributes.to_set.len(),
            changes.attributes.to_remove.len()
        );

        let new_reference = self
            .connector
            .update(reference, &changes.to_fields())
            .await
            .map_err(|e| remote_error(Operation::Update, reference, e))?;

        info!("Updated {}", new_reference);
        let refreshed = self.read(&new_reference).await?;
        Ok(ApplyOutcome::Updated(refreshed))
    }

    async fn create_tracked(&self, name: &str, desired: &NetworkContainer) -> Result<ApplyOutcome> {
        self.transition(name, LifecycleState::Absent, LifecycleState::Creating);

        let created = match self.create(desired).await {
            Ok(created) => created,
            Err(e) => {
                self.transition(name, LifecycleState::Creating, LifecycleState::Absent);
                return Err(e);
            }
        };
        let reference = tracked_reference(&created)?;

        // Track before reading back so a failed read cannot orphan the object.
        if let Err(e) = self.track(name, &created, desired).await {
            return Err(self.abandon_untracked(name, &reference, e).await);
        }
        self.transition(name, LifecycleState::Creating, LifecycleState::Present);
        self.emit_event(EngineEvent::Created {
            name: name.to_string(),
            reference: reference.clone(),
        });

        let observed = self.read(&reference).await?;
        self.track(name, &observed, desired).await?;
        Ok(ApplyOutcome::Created(observed))
    }

    /// Delete a freshly created object whose reference could not be stored
    ///
    /// When the delete fails too, the returned error carries the reference so
    /// the caller can remove the object by hand.
    async fn abandon_untracked(&self, name: &str, reference: &ObjectRef, cause: Error) -> Error {
        warn!(
            "Could not track {} ({}): {}; deleting it again",
            name, reference, cause
        );

        let deleted = match self.delete(reference).await {
            Ok(()) => {
                self.transition(name, LifecycleState::Creating, LifecycleState::Absent);
                true
            }
            Err(e) => {
                error!("{} exists on the authority but is not tracked: {}", reference, e);
                self.transition(name, LifecycleState::Creating, LifecycleState::Present);
                false
            }
        };

        Error::Untracked {
            reference: reference.clone(),
            deleted,
            message: cause.to_string(),
        }
    }

    async fn track(
        &self,
        name: &str,
        snapshot: &NetworkContainer,
        desired: &NetworkContainer,
    ) -> Result<()> {
        let reference = tracked_reference(snapshot)?;
        let managed = desired.attributes().keys().cloned().collect();
        let record = TrackedContainer::new(reference, snapshot.clone(), managed);
        self.state_store.put(name, &record).await
    }

    fn transition(&self, name: &str, from: LifecycleState, to: LifecycleState) {
        debug_assert!(
            from.can_transition_to(to),
            "illegal lifecycle transition {:?} -> {:?}",
            from,
            to
        );
        self.emit_event(EngineEvent::StateChanged {
            name: name.to_string(),
            from,
            to,
        });
    }

    /// Emit an engine event, dropping it when the channel is full
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Attribute names managed at the last apply that the desired state no
/// longer declares
fn cleared_attributes(tracked: &TrackedContainer, desired: &NetworkContainer) -> BTreeSet<String> {
    tracked
        .managed_attributes
        .iter()
        .filter(|name| !desired.attributes().contains_key(*name))
        .cloned()
        .collect()
}

fn check_immutable(current: &NetworkContainer, desired: &NetworkContainer) -> Result<()> {
    if current.network_view() != desired.network_view() {
        return Err(Error::ImmutableFieldChange {
            field: "network_view",
            from: current.network_view().to_string(),
            to: desired.network_view().to_string(),
        });
    }
    if current.family() != desired.family() || current.cidr() != desired.cidr() {
        return Err(Error::ImmutableFieldChange {
            field: "cidr",
            from: current.cidr().to_string(),
            to: desired.cidr().to_string(),
        });
    }
    Ok(())
}

fn tracked_reference(container: &NetworkContainer) -> Result<ObjectRef> {
    container
        .reference()
        .cloned()
        .ok_or_else(|| Error::Other(format!("container {} has no reference", container.cidr())))
}

fn remote_error(operation: Operation, reference: &ObjectRef, err: ConnectorError) -> Error {
    match err {
        ConnectorError::NotFound(_) => Error::Absent {
            reference: reference.clone(),
        },
        other => Error::transport(operation, Some(reference), other.to_string()),
    }
}

/// Turn a read response into a container
///
/// The family comes from the reference prefix, or from the reported network
/// when the prefix is not recognised.
fn decode_container(reference: &ObjectRef, fields: ContainerFields) -> Result<NetworkContainer> {
    let malformed = |message: String| Error::transport(Operation::Read, Some(reference), message);

    let network = fields
        .network
        .ok_or_else(|| malformed("response has no 'network' field".to_string()))?;
    let network_view = fields
        .network_view
        .ok_or_else(|| malformed("response has no 'network_view' field".to_string()))?;

    let family = match reference.object_type() {
        Some(object_type) => object_type.family(),
        None => match network.parse::<ipnet::IpNet>() {
            Ok(ipnet::IpNet::V4(_)) => NetworkFamily::V4,
            Ok(ipnet::IpNet::V6(_)) => NetworkFamily::V6,
            Err(e) => return Err(malformed(format!("unrecognised network '{}': {}", network, e))),
        },
    };

    let attributes = match fields.extattrs {
        Some(wire) => ea::decode(&wire)
            .map_err(|e| malformed(format!("undecodable extattrs: {}", e)))?,
        None => AttributeMap::new(),
    };

    Ok(NetworkContainer::observed(
        family,
        network_view,
        network,
        fields.comment.unwrap_or_default(),
        attributes,
        reference.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_transitions() {
        use LifecycleState::*;
        assert!(Absent.can_transition_to(Creating));
        assert!(Creating.can_transition_to(Present));
        assert!(Present.can_transition_to(Updating));
        assert!(Updating.can_transition_to(Present));
        assert!(Present.can_transition_to(Deleting));
        assert!(Deleting.can_transition_to(Absent));

        assert!(!Absent.can_transition_to(Present));
        assert!(!Absent.can_transition_to(Updating));
        assert!(!Updating.can_transition_to(Deleting));

        assert!(Present.is_stable());
        assert!(!Creating.is_stable());
    }

    #[test]
    fn test_update_plan_fields() {
        let mut to_set = AttributeMap::new();
        to_set.insert("TestEA2".into(), 7.into());
        let plan = UpdatePlan {
            comment: Some(String::new()),
            attributes: AttributePatch {
                to_set,
                to_remove: BTreeSet::from(["Site".to_string()]),
            },
        };

        assert_eq!(
            serde_json::to_value(plan.to_fields()).unwrap(),
            json!({
                "comment": "",
                "extattrs+": { "TestEA2": { "value": 7 } },
                "extattrs-": { "Site": {} }
            })
        );
        assert!(UpdatePlan::default().to_fields().is_empty());
    }

    #[test]
    fn test_decode_container_family_from_reference() {
        let reference = ObjectRef::new("ipv6networkcontainer/ZG5z:fc00%3A%3A/56/default");
        let fields = ContainerFields {
            network_view: Some("default".into()),
            network: Some("fc00::/56".into()),
            ..Default::default()
        };

        let container = decode_container(&reference, fields).unwrap();
        assert_eq!(container.family(), NetworkFamily::V6);
        assert_eq!(container.comment(), "");
        assert!(container.attributes().is_empty());
        assert_eq!(container.reference(), Some(&reference));
    }

    #[test]
    fn test_decode_container_missing_network_is_transport_error() {
        let reference = ObjectRef::new("networkcontainer/ZG5z:10.0.0.0/16/default");
        let err = decode_container(&reference, ContainerFields::default()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_immutable_fields() {
        let current = NetworkContainer::new(
            NetworkFamily::V4,
            "default",
            "10.0.0.0/16",
            "",
            AttributeMap::new(),
        )
        .unwrap();
        let moved =
            NetworkContainer::new(NetworkFamily::V4, "default", "10.1.0.0/16", "", AttributeMap::new())
                .unwrap();
        let other_view =
            NetworkContainer::new(NetworkFamily::V4, "lab", "10.0.0.0/16", "", AttributeMap::new())
                .unwrap();

        assert!(check_immutable(&current, &current).is_ok());
        assert!(matches!(
            check_immutable(&current, &moved),
            Err(Error::ImmutableFieldChange { field: "cidr", .. })
        ));
        assert!(matches!(
            check_immutable(&current, &other_view),
            Err(Error::ImmutableFieldChange {
                field: "network_view",
                ..
            })
        ));
    }
}
