//! Rendezvous between the station's credential requests and the registry.
//!
//! The station holds an [`AgentChannel`] and awaits each answer; the
//! [`AgentService`] task receives requests over a bounded channel and answers
//! them in arrival order through [`AgentRegistry::dispatch`] semantics. The
//! service never waits on entity state, so a scenario suspended in a wait and
//! an in-flight credential request never block each other.

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    AgentError,
    AgentId,
    AgentRegistry,
    CancelReason,
    Credential,
    CredentialRequest,
    DispatchError,
    registry::{consult, no_agent},
};
use crate::{
    bus::ObjectBus,
    entity::{EntityId, EntityKind, Snapshot, Value},
};

type Reply = oneshot::Sender<Result<Credential, DispatchError>>;

/// Entity under which the `n`th request handled by a mirroring service is
/// published. Numbering starts at 1.
#[must_use]
pub fn mirrored_request(n: u64) -> EntityId { EntityId::new(format!("/agent_request/{n}")) }

struct Envelope {
    request: CredentialRequest,
    reply: Reply,
}

/// Cloneable handle the station uses to request credentials.
#[derive(Clone, Debug)]
pub struct AgentChannel {
    tx: mpsc::Sender<Envelope>,
}

impl AgentChannel {
    /// Send `request` and wait for the answer.
    ///
    /// # Errors
    ///
    /// Returns the dispatch outcome's error, or
    /// [`DispatchError::ServiceClosed`] if the service is not running.
    pub async fn request(&self, request: CredentialRequest) -> Result<Credential, DispatchError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| DispatchError::ServiceClosed)?;
        answer.await.map_err(|_| DispatchError::ServiceClosed)?
    }
}

/// Background task answering credential requests.
pub struct AgentService {
    channel: AgentChannel,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl AgentService {
    /// Spawn the service on the current runtime.
    ///
    /// `capacity` bounds the number of queued requests. When `mirror` is set
    /// every request is also published on that bus as an
    /// [`EntityKind::AgentRequest`] entity with fields `network`, `kind`,
    /// `agent` and `outcome`. Mirrored entities are removed when the service
    /// stops.
    #[must_use]
    pub fn spawn(registry: AgentRegistry, capacity: usize, mirror: Option<ObjectBus>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let token = CancellationToken::new();
        let worker = Worker {
            registry,
            mirror,
            token: token.clone(),
            next_request: 1,
            published: Vec::new(),
        };
        let task = tokio::spawn(worker.run(rx));
        Self {
            channel: AgentChannel { tx },
            token,
            task,
        }
    }

    /// Handle for issuing requests.
    #[must_use]
    pub fn channel(&self) -> AgentChannel { self.channel.clone() }

    /// Stop the service and wait for it to finish.
    ///
    /// A request in flight is withdrawn from its agent with
    /// [`CancelReason::Shutdown`]; later requests fail with
    /// [`DispatchError::ServiceClosed`].
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "agent service task failed");
        }
    }
}

impl Drop for AgentService {
    fn drop(&mut self) { self.token.cancel(); }
}

impl std::fmt::Debug for AgentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentService")
            .field("running", &!self.task.is_finished())
            .finish_non_exhaustive()
    }
}

struct Worker {
    registry: AgentRegistry,
    mirror: Option<ObjectBus>,
    token: CancellationToken,
    next_request: u64,
    published: Vec<EntityId>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        debug!("agent service started");
        loop {
            let envelope = tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                next = rx.recv() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            self.handle(envelope).await;
        }
        rx.close();
        while let Ok(envelope) = rx.try_recv() {
            let _ = envelope.reply.send(Err(DispatchError::ServiceClosed));
        }
        self.withdraw_mirrors();
        debug!("agent service stopped");
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope { request, mut reply } = envelope;
        let mirrored = self.publish_request(&request);

        let Some(agent) = self.registry.head() else {
            self.publish_outcome(mirrored.as_ref(), None, "no-agent");
            let _ = reply.send(Err(no_agent(&request)));
            return;
        };

        tokio::select! {
            result = consult(agent.as_ref(), &request) => {
                let outcome = match &result {
                    Ok(_) => "answered",
                    Err(DispatchError::Agent { source: AgentError::Declined, .. }) => "declined",
                    Err(DispatchError::Agent { source: AgentError::Canceled, .. }) => "canceled",
                    Err(_) => "failed",
                };
                self.publish_outcome(mirrored.as_ref(), Some(agent.id()), outcome);
                if reply.send(result).is_err() {
                    debug!(agent = %agent.id(), "requester went away before the answer");
                }
            }
            () = reply.closed() => {
                agent.cancel(CancelReason::UserCanceled);
                self.publish_outcome(mirrored.as_ref(), Some(agent.id()), "withdrawn");
            }
            () = self.token.cancelled() => {
                agent.cancel(CancelReason::Shutdown);
                self.publish_outcome(mirrored.as_ref(), Some(agent.id()), "withdrawn");
                let _ = reply.send(Err(DispatchError::ServiceClosed));
            }
        }
    }

    fn publish_request(&mut self, request: &CredentialRequest) -> Option<EntityId> {
        let bus = self.mirror.as_ref()?;
        let n = self.next_request;
        self.next_request += 1;
        let snapshot = Snapshot::new(mirrored_request(n), EntityKind::AgentRequest)
            .with("network", request.network.clone())
            .with("kind", request.kind.as_str())
            .with("agent", Value::Null)
            .with("outcome", "pending");
        let id = snapshot.id().clone();
        match bus.insert(snapshot) {
            Ok(()) => {
                self.published.push(id.clone());
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to mirror agent request");
                None
            }
        }
    }

    fn withdraw_mirrors(&mut self) {
        let Some(bus) = self.mirror.as_ref() else {
            return;
        };
        for id in self.published.drain(..) {
            if let Err(e) = bus.remove(&id) {
                debug!(entity = %id, error = %e, "mirrored request already gone");
            }
        }
    }

    fn publish_outcome(
        &self,
        id: Option<&EntityId>,
        agent: Option<&AgentId>,
        outcome: &str,
    ) {
        let (Some(bus), Some(id)) = (self.mirror.as_ref(), id) else {
            return;
        };
        let agent = agent.map_or(Value::Null, |a| Value::Str(a.to_string()));
        if let Err(e) = bus.update(id, [("agent", agent), ("outcome", Value::from(outcome))]) {
            warn!(error = %e, "failed to mirror agent outcome");
        }
    }
}
