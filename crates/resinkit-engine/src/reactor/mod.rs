//! Event reactor
//!
//! A single-threaded dispatch loop over heterogeneous readiness sources.
//! Resources announce readiness by sending a notice on an unbounded channel;
//! the loop blocks on that channel, reads each ready resource and hands every
//! payload to the subscribers of the resource's [`EventKind`], in
//! subscription order. All payloads of one resource are dispatched before the
//! next notice is looked at.
//!
//! Timers, signal listeners and other asynchronous producers run on a small
//! tokio runtime owned by the reactor. They never call subscribers; they only
//! wake the loop.

mod resources;

pub use resources::{
    spawn_line_reader, InterruptLine, InterruptResource, QueueResource, QueueSender,
    SignalResource, TimerHandle, TimerResource,
};

use parking_lot::Mutex;
use resinkit_core::{EventData, EventKind, ReactorError};
use std::collections::HashMap;
use std::future::Future;
use std::ops::BitOr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Index of a registered resource
pub type Token = usize;

/// Reserved token used to wake the loop for a stop request
const STOP_TOKEN: Token = usize::MAX;

/// Readiness flags carried by a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness(u8);

impl Readiness {
    pub const READABLE: Readiness = Readiness(0b001);
    pub const ERROR: Readiness = Readiness(0b010);
    pub const HANGUP: Readiness = Readiness(0b100);

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersects(&self, other: Readiness) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    fn bitor(self, rhs: Self) -> Self::Output {
        Readiness(self.0 | rhs.0)
    }
}

/// A readiness notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub token: Token,
    pub readiness: Readiness,
}

/// Wait handle given to a resource at registration
#[derive(Debug, Clone)]
pub struct Notifier {
    token: Token,
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Wake the reactor; false once the reactor is gone
    pub fn notify(&self, readiness: Readiness) -> bool {
        self.tx
            .send(Notice {
                token: self.token,
                readiness,
            })
            .is_ok()
    }
}

/// Registration shared between a resource and the handles that drive it
#[derive(Clone, Default)]
pub(crate) struct ResourceWaker {
    attachment: Arc<Mutex<Option<(Notifier, Handle)>>>,
}

impl ResourceWaker {
    pub(crate) fn attach(&self, notifier: Notifier, runtime: Handle) {
        *self.attachment.lock() = Some((notifier, runtime));
    }

    pub(crate) fn wake(&self, readiness: Readiness) -> bool {
        match self.attachment.lock().as_ref() {
            Some((notifier, _)) => notifier.notify(readiness),
            None => false,
        }
    }

    pub(crate) fn spawn<F>(&self, future: F) -> Result<JoinHandle<()>, ReactorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.attachment.lock().as_ref() {
            Some((_, runtime)) => Ok(runtime.spawn(future)),
            None => Err(ReactorError::NotAttached),
        }
    }
}

/// A readiness-capable event source
pub trait Resource {
    /// Readiness flags this resource acts on
    fn interest(&self) -> Readiness {
        Readiness::READABLE
    }

    /// Called once at registration with the resource's wait handle
    fn attach(&mut self, notifier: Notifier, runtime: Handle) -> Result<(), ReactorError>;

    /// Produce the payloads that are ready, possibly none
    fn read(&mut self) -> Result<Vec<EventData>, ReactorError>;
}

/// Subscriber invoked for each payload of its event kind
pub type Callback = Box<dyn FnMut(&EventData)>;

/// Requests the reactor to stop; usable from any thread
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Notice>,
}

impl StopHandle {
    pub fn stop(&self) {
        tracing::info!("Reactor stop requested");
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.tx.send(Notice {
            token: STOP_TOKEN,
            readiness: Readiness::READABLE,
        });
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct Entry {
    kind: EventKind,
    resource: Box<dyn Resource>,
}

/// The event loop
pub struct Reactor {
    runtime: Runtime,
    tx: mpsc::UnboundedSender<Notice>,
    rx: mpsc::UnboundedReceiver<Notice>,
    resources: Vec<Entry>,
    kinds: HashMap<EventKind, Token>,
    subscribers: HashMap<EventKind, Vec<Callback>>,
    stopped: Arc<AtomicBool>,
}

impl Reactor {
    pub fn new() -> resinkit_core::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("resinkit-reactor-io")
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            runtime,
            tx,
            rx,
            resources: Vec::new(),
            kinds: HashMap::new(),
            subscribers: HashMap::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle to the runtime driving timers and signal listeners
    pub fn runtime(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Associate a resource with an event kind; one resource per kind
    pub fn register<R>(&mut self, kind: EventKind, mut resource: R) -> Result<Token, ReactorError>
    where
        R: Resource + 'static,
    {
        if self.kinds.contains_key(&kind) {
            return Err(ReactorError::AlreadyRegistered {
                kind: kind.to_string(),
            });
        }
        let token = self.resources.len();
        let notifier = Notifier {
            token,
            tx: self.tx.clone(),
        };
        resource.attach(notifier, self.runtime())?;
        self.resources.push(Entry {
            kind,
            resource: Box::new(resource),
        });
        self.kinds.insert(kind, token);
        tracing::debug!("Registered {} resource as token {}", kind, token);
        Ok(token)
    }

    /// Register a one-shot or repeating timer and return its control handle
    pub fn add_timer(&mut self, kind: EventKind) -> Result<TimerHandle, ReactorError> {
        let timer = TimerResource::new();
        let handle = timer.handle();
        self.register(kind, timer)?;
        Ok(handle)
    }

    /// Register an inter-thread queue and return its sending side
    pub fn add_queue(&mut self, kind: EventKind) -> Result<QueueSender, ReactorError> {
        let queue = QueueResource::new();
        let sender = queue.sender();
        self.register(kind, queue)?;
        Ok(sender)
    }

    /// Register an interrupt-driven source and return its interrupt line
    pub fn add_interrupt<F>(&mut self, kind: EventKind, reader: F) -> Result<InterruptLine, ReactorError>
    where
        F: FnMut() -> Result<Option<EventData>, resinkit_core::HardwareError> + 'static,
    {
        let resource = InterruptResource::new(kind, reader);
        let line = resource.line();
        self.register(kind, resource)?;
        Ok(line)
    }

    /// Add an observer for an event kind
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&EventData) + 'static,
    {
        self.subscribers.entry(kind).or_default().push(Box::new(callback));
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stopped: self.stopped.clone(),
            tx: self.tx.clone(),
        }
    }

    /// Dispatch events until stopped
    pub fn run(&mut self) -> Result<(), ReactorError> {
        tracing::info!("Reactor running with {} resources", self.resources.len());
        while !self.stopped.load(Ordering::SeqCst) {
            self.run_once(None)?;
        }
        tracing::info!("Reactor stopped");
        Ok(())
    }

    /// Wait for one wakeup, then dispatch every notice already queued
    ///
    /// With a timeout, returns `Ok(0)` if nothing arrived in time. Returns the
    /// number of notices handled otherwise.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<usize, ReactorError> {
        let first = match timeout {
            None => self.rx.blocking_recv(),
            Some(limit) => {
                let rx = &mut self.rx;
                match self
                    .runtime
                    .block_on(async { tokio::time::timeout(limit, rx.recv()).await })
                {
                    Ok(notice) => notice,
                    Err(_) => return Ok(0),
                }
            }
        };
        let Some(first) = first else {
            return Err(ReactorError::Closed);
        };

        let mut batch = vec![first];
        while let Ok(notice) = self.rx.try_recv() {
            batch.push(notice);
        }
        let handled = batch.len();
        for notice in batch {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            self.dispatch(notice);
        }
        Ok(handled)
    }

    /// Dispatch whatever is queued without blocking
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notice) = self.rx.try_recv() {
            handled += 1;
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            self.dispatch(notice);
        }
        handled
    }

    fn dispatch(&mut self, notice: Notice) {
        if notice.token == STOP_TOKEN {
            return;
        }
        let Some(entry) = self.resources.get_mut(notice.token) else {
            tracing::warn!("{}", ReactorError::UnknownResource { token: notice.token });
            return;
        };
        let kind = entry.kind;
        if !notice.readiness.intersects(entry.resource.interest()) {
            tracing::warn!(
                "Ignoring readiness {:?} on {} resource",
                notice.readiness,
                kind
            );
            return;
        }
        let payloads = match entry.resource.read() {
            Ok(payloads) => payloads,
            Err(e) => {
                tracing::warn!("Reading {} resource failed: {}", kind, e);
                return;
            }
        };
        if let Some(callbacks) = self.subscribers.get_mut(&kind) {
            for payload in &payloads {
                for callback in callbacks.iter_mut() {
                    callback(payload);
                }
            }
        }
    }
}
