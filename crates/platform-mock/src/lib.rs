//! In-memory mock of the orchestration platform for testing deployment
//! flows: one component whose instances respond to lifecycle calls, with
//! every call recorded and individual calls armable to fail.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use esroll_platform::{Component, Instance, Platform};

/// A recorded lifecycle call, tagged with the instance identifier.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Start(String),
    Stop(String),
    Delete(String),
    WaitStarted(String),
    WaitStopped(String),
    WaitDeleted(String),
}

impl Call {
    const fn kind(&self) -> CallKind {
        match self {
            Self::Start(_) => CallKind::Start,
            Self::Stop(_) => CallKind::Stop,
            Self::Delete(_) => CallKind::Delete,
            Self::WaitStarted(_) => CallKind::WaitStarted,
            Self::WaitStopped(_) => CallKind::WaitStopped,
            Self::WaitDeleted(_) => CallKind::WaitDeleted,
        }
    }
}

/// Payload-free lifecycle call discriminant, used to arm failures.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CallKind {
    Start,
    Stop,
    Delete,
    WaitStarted,
    WaitStopped,
    WaitDeleted,
}

impl CallKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Start => "start_instance",
            Self::Stop => "stop_instance",
            Self::Delete => "delete_instance",
            Self::WaitStarted => "wait_for_started",
            Self::WaitStopped => "wait_for_stopped",
            Self::WaitDeleted => "wait_for_deleted",
        }
    }
}

#[derive(Debug)]
struct Inner {
    component: Mutex<Component>,
    calls: Mutex<Vec<Call>>,
    loads: Mutex<usize>,
    armed_failures: Mutex<HashSet<CallKind>>,
}

/// Mock implementation of [`Platform`] owning a single component. Cheap to
/// clone; clones share state, so a test can hand one clone to the deployer
/// and keep another for assertions.
///
/// Lifecycle calls mutate the held component the way the real platform
/// would: starting an instance brings it up on the component's target
/// release, stopping clears its started flag, deleting removes it.
#[derive(Clone, Debug)]
pub struct MockPlatform {
    inner: Arc<Inner>,
}

impl MockPlatform {
    /// A mock platform owning the given component.
    #[must_use]
    pub fn new(component: Component) -> Self {
        Self {
            inner: Arc::new(Inner {
                component: Mutex::new(component),
                calls: Mutex::new(Vec::new()),
                loads: Mutex::new(0),
                armed_failures: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Arm every future occurrence of `kind` to fail.
    pub fn fail_on(&self, kind: CallKind) {
        self.inner.armed_failures.lock().unwrap().insert(kind);
    }

    /// Every lifecycle call recorded so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// How many times the component has been loaded.
    #[must_use]
    pub fn loads(&self) -> usize {
        *self.inner.loads.lock().unwrap()
    }

    /// A snapshot of the component as the platform currently sees it.
    #[must_use]
    pub fn component(&self) -> Component {
        self.inner.component.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), Error> {
        let kind = call.kind();
        if self.inner.armed_failures.lock().unwrap().contains(&kind) {
            return Err(Error::Armed(kind.name()));
        }
        self.inner.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn with_instance(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Instance, &str),
    ) -> Result<(), Error> {
        let mut component = self.inner.component.lock().unwrap();
        let target_release = component.target_release.id.clone();
        let instance = component
            .instances
            .iter_mut()
            .find(|instance| instance.id == id)
            .ok_or_else(|| Error::UnknownInstance(id.to_string()))?;
        mutate(instance, &target_release);
        Ok(())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    type Error = Error;

    async fn load_component(&self, _app: &str, _component: &str) -> Result<Component, Error> {
        *self.inner.loads.lock().unwrap() += 1;
        Ok(self.inner.component.lock().unwrap().clone())
    }

    async fn start_instance(&self, instance: &Instance) -> Result<(), Error> {
        self.record(Call::Start(instance.id.clone()))?;
        self.with_instance(&instance.id, |instance, target_release| {
            instance.started = true;
            instance.release_id = target_release.to_string();
        })
    }

    async fn stop_instance(&self, instance: &Instance) -> Result<(), Error> {
        self.record(Call::Stop(instance.id.clone()))?;
        self.with_instance(&instance.id, |instance, _| instance.started = false)
    }

    async fn delete_instance(&self, instance: &Instance) -> Result<(), Error> {
        self.record(Call::Delete(instance.id.clone()))?;
        let mut component = self.inner.component.lock().unwrap();
        component.instances.retain(|i| i.id != instance.id);
        Ok(())
    }

    async fn wait_for_started(&self, instance: &Instance) -> Result<(), Error> {
        self.record(Call::WaitStarted(instance.id.clone()))
    }

    async fn wait_for_stopped(&self, instance: &Instance) -> Result<(), Error> {
        self.record(Call::WaitStopped(instance.id.clone()))
    }

    async fn wait_for_deleted(&self, instance: &Instance) -> Result<(), Error> {
        self.record(Call::WaitDeleted(instance.id.clone()))
    }
}
