//! Ready-made agent answering from queues of secrets.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tracing::debug;

use super::{
    Agent,
    AgentError,
    AgentId,
    CancelReason,
    Credential,
    CredentialRequest,
    RequestKind,
    Secret,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Agent holding a queue of passphrases and a queue of user credentials.
///
/// Each passphrase request consumes the next passphrase and each user
/// credential request the next (user, password) pair. An exhausted queue
/// answers [`AgentError::Canceled`]; user credential requests to an agent
/// given no users at all are [`AgentError::Declined`]. Every request is
/// recorded.
///
/// ```
/// use airharness::agent::{Agent, Credential, CredentialRequest, PskAgent, Secret};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let agent = PskAgent::new("secret123");
/// let answer = agent.resolve(&CredentialRequest::passphrase("/net/1")).await;
/// assert_eq!(answer, Ok(Credential::Passphrase(Secret::new("secret123"))));
/// assert_eq!(agent.requests().len(), 1);
/// # }
/// ```
pub struct PskAgent {
    id: AgentId,
    passphrases: Mutex<VecDeque<Secret>>,
    users: Mutex<VecDeque<(String, Secret)>>,
    handles_users: bool,
    requests: Mutex<Vec<CredentialRequest>>,
    cancellations: Mutex<Vec<CancelReason>>,
    released: AtomicBool,
}

impl PskAgent {
    /// Agent answering a single passphrase request with `passphrase`.
    #[must_use]
    pub fn new(passphrase: &str) -> Self { Self::with_passphrases([passphrase]) }

    /// Agent answering passphrase requests from `passphrases`, in order.
    #[must_use]
    pub fn with_passphrases<'a>(passphrases: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            id: AgentId::unique(),
            passphrases: Mutex::new(passphrases.into_iter().map(Secret::from).collect()),
            users: Mutex::new(VecDeque::new()),
            handles_users: false,
            requests: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Add (user, password) pairs for 802.1X requests.
    #[must_use]
    pub fn users<'a>(mut self, users: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.handles_users = true;
        lock(&self.users).extend(
            users
                .into_iter()
                .map(|(user, password)| (user.to_owned(), Secret::from(password))),
        );
        self
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    /// Requests answered or refused so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<CredentialRequest> { lock(&self.requests).clone() }

    /// Cancellations received so far.
    #[must_use]
    pub fn cancellations(&self) -> Vec<CancelReason> { lock(&self.cancellations).clone() }

    /// Whether the registry has released this agent.
    #[must_use]
    pub fn is_released(&self) -> bool { self.released.load(Ordering::Acquire) }

    fn next_user(&self, wanted: Option<&str>) -> Option<(String, Secret)> {
        let mut users = lock(&self.users);
        match wanted {
            None => users.pop_front(),
            Some(name) => {
                let index = users.iter().position(|(user, _)| user == name)?;
                users.remove(index)
            }
        }
    }
}

#[async_trait]
impl Agent for PskAgent {
    fn id(&self) -> &AgentId { &self.id }

    async fn resolve(&self, request: &CredentialRequest) -> Result<Credential, AgentError> {
        lock(&self.requests).push(request.clone());
        debug!(
            agent = %self.id,
            network = %request.network,
            kind = request.kind.as_str(),
            "credential requested"
        );
        match &request.kind {
            RequestKind::Passphrase | RequestKind::PrivateKeyPassphrase => lock(&self.passphrases)
                .pop_front()
                .map(Credential::Passphrase)
                .ok_or(AgentError::Canceled),
            RequestKind::UserNameAndPassword | RequestKind::UserPassword { .. }
                if !self.handles_users =>
            {
                Err(AgentError::Declined)
            }
            RequestKind::UserNameAndPassword => self
                .next_user(None)
                .map(|(user, password)| Credential::UserAndPassword { user, password })
                .ok_or(AgentError::Canceled),
            RequestKind::UserPassword { user } => self
                .next_user(user.as_deref())
                .map(|(_, password)| Credential::Password(password))
                .ok_or(AgentError::Canceled),
        }
    }

    fn release(&self) { self.released.store(true, Ordering::Release); }

    fn cancel(&self, reason: CancelReason) { lock(&self.cancellations).push(reason); }
}

impl std::fmt::Debug for PskAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskAgent")
            .field("id", &self.id)
            .field("passphrases", &lock(&self.passphrases).len())
            .field("users", &lock(&self.users).len())
            .finish_non_exhaustive()
    }
}
