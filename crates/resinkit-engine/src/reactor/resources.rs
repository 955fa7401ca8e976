//! Resources the reactor multiplexes

use super::{Notifier, Readiness, Resource, ResourceWaker};
use parking_lot::Mutex;
use resinkit_core::{
    thread_safe_deque, EventData, EventKind, HardwareError, ReactorError, ThreadSafeDeque,
};
use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

// =============================================================================
// TIMERS
// =============================================================================

#[derive(Default)]
struct TimerState {
    generation: u64,
    expired: u32,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl TimerState {
    /// Invalidate any armed or expired-but-unread countdown
    fn reset(&mut self) -> Option<Duration> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation = self.generation.wrapping_add(1);
        self.expired = 0;
        self.deadline
            .take()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Timer resource; controlled through a [`TimerHandle`]
pub struct TimerResource {
    state: Arc<Mutex<TimerState>>,
    waker: ResourceWaker,
}

impl TimerResource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::default())),
            waker: ResourceWaker::default(),
        }
    }

    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            state: self.state.clone(),
            waker: self.waker.clone(),
        }
    }
}

impl Default for TimerResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for TimerResource {
    fn attach(&mut self, notifier: Notifier, runtime: Handle) -> Result<(), ReactorError> {
        self.waker.attach(notifier, runtime);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<EventData>, ReactorError> {
        let mut state = self.state.lock();
        if state.expired == 0 {
            return Ok(Vec::new());
        }
        // Expiries of a repeating timer that piled up are coalesced
        state.expired = 0;
        Ok(vec![EventData::None])
    }
}

/// Starts and clears a registered timer
///
/// Starting always clears the previous countdown first, so at most one
/// expiry is outstanding per timer. An expiry that was already signalled but
/// not yet read is discarded by `clear` or `start`.
#[derive(Clone)]
pub struct TimerHandle {
    state: Arc<Mutex<TimerState>>,
    waker: ResourceWaker,
}

impl TimerHandle {
    /// Arm a one-shot countdown
    pub fn start(&self, delay: Duration) -> Result<(), ReactorError> {
        self.arm(delay, false)
    }

    /// Arm a countdown that re-arms itself every `period`
    pub fn start_repeating(&self, period: Duration) -> Result<(), ReactorError> {
        self.arm(period, true)
    }

    fn arm(&self, period: Duration, repeating: bool) -> Result<(), ReactorError> {
        let mut state = self.state.lock();
        state.reset();
        let generation = state.generation;
        state.deadline = Some(Instant::now() + period);

        let shared = self.state.clone();
        let waker = self.waker.clone();
        let task = self.waker.spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                {
                    let mut state = shared.lock();
                    if state.generation != generation {
                        return;
                    }
                    state.expired = state.expired.saturating_add(1);
                    state.deadline = repeating.then(|| Instant::now() + period);
                }
                waker.wake(Readiness::READABLE);
                if !repeating {
                    return;
                }
            }
        })?;
        state.task = Some(task);
        Ok(())
    }

    /// Disarm, returning the time that was left
    pub fn clear(&self) -> Option<Duration> {
        self.state.lock().reset()
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().deadline.is_some()
    }
}

// =============================================================================
// QUEUES
// =============================================================================

/// Inter-thread queue; every read drains all queued payloads
pub struct QueueResource {
    queue: ThreadSafeDeque<EventData>,
    waker: ResourceWaker,
}

impl QueueResource {
    pub fn new() -> Self {
        Self {
            queue: thread_safe_deque(),
            waker: ResourceWaker::default(),
        }
    }

    pub fn sender(&self) -> QueueSender {
        QueueSender {
            queue: self.queue.clone(),
            waker: self.waker.clone(),
        }
    }
}

impl Default for QueueResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for QueueResource {
    fn attach(&mut self, notifier: Notifier, runtime: Handle) -> Result<(), ReactorError> {
        self.waker.attach(notifier, runtime);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<EventData>, ReactorError> {
        Ok(self.queue.lock().drain(..).collect())
    }
}

/// Producer side of a [`QueueResource`]; cloneable and `Send`
#[derive(Clone)]
pub struct QueueSender {
    queue: ThreadSafeDeque<EventData>,
    waker: ResourceWaker,
}

impl QueueSender {
    /// Enqueue a payload and wake the reactor
    pub fn push(&self, data: EventData) {
        self.queue.lock().push_back(data);
        if !self.waker.wake(Readiness::READABLE) {
            tracing::debug!("Queued payload while no reactor is listening");
        }
    }
}

// =============================================================================
// INTERRUPTS
// =============================================================================

type InterruptReader = Box<dyn FnMut() -> Result<Option<EventData>, HardwareError>>;

/// Edge-triggered source: each interrupt reads one payload, e.g. a status
/// register or a GPIO level
pub struct InterruptResource {
    kind: EventKind,
    reader: InterruptReader,
    waker: ResourceWaker,
}

impl InterruptResource {
    pub fn new<F>(kind: EventKind, reader: F) -> Self
    where
        F: FnMut() -> Result<Option<EventData>, HardwareError> + 'static,
    {
        Self {
            kind,
            reader: Box::new(reader),
            waker: ResourceWaker::default(),
        }
    }

    pub fn line(&self) -> InterruptLine {
        InterruptLine {
            waker: self.waker.clone(),
        }
    }
}

impl Resource for InterruptResource {
    fn interest(&self) -> Readiness {
        Readiness::READABLE | Readiness::ERROR
    }

    fn attach(&mut self, notifier: Notifier, runtime: Handle) -> Result<(), ReactorError> {
        self.waker.attach(notifier, runtime);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<EventData>, ReactorError> {
        match (self.reader)() {
            Ok(payload) => Ok(payload.into_iter().collect()),
            Err(e) => Err(ReactorError::ResourceRead {
                kind: self.kind.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Raises an [`InterruptResource`]'s interrupt; cloneable and `Send`
#[derive(Clone)]
pub struct InterruptLine {
    waker: ResourceWaker,
}

impl InterruptLine {
    pub fn trigger(&self) {
        self.waker.wake(Readiness::READABLE);
    }

    /// Report an error condition on the line
    pub fn fault(&self) {
        self.waker.wake(Readiness::ERROR);
    }
}

// =============================================================================
// PIPES AND SIGNALS
// =============================================================================

/// Forward non-empty lines from `reader` into a queue on a dedicated thread
pub fn spawn_line_reader<R>(reader: R, sender: QueueSender) -> std::io::Result<std::thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("resinkit-command-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            sender.push(EventData::Text(line.to_string()));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Command pipe read failed: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Command pipe closed");
        })
}

/// Termination signals; payload is the signal name
pub struct SignalResource {
    queue: QueueResource,
}

impl SignalResource {
    pub fn new() -> Self {
        Self {
            queue: QueueResource::new(),
        }
    }
}

impl Default for SignalResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for SignalResource {
    fn attach(&mut self, notifier: Notifier, runtime: Handle) -> Result<(), ReactorError> {
        self.queue.attach(notifier, runtime.clone())?;
        let sender = self.queue.sender();
        runtime.spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut term = match signal(SignalKind::terminate()) {
                    Ok(term) => term,
                    Err(e) => {
                        tracing::warn!("Cannot listen for SIGTERM: {}", e);
                        return;
                    }
                };
                loop {
                    let name = tokio::select! {
                        result = tokio::signal::ctrl_c() => match result {
                            Ok(()) => "SIGINT",
                            Err(_) => return,
                        },
                        received = term.recv() => match received {
                            Some(()) => "SIGTERM",
                            None => return,
                        },
                    };
                    sender.push(EventData::Text(name.to_string()));
                }
            }
            #[cfg(not(unix))]
            {
                while tokio::signal::ctrl_c().await.is_ok() {
                    sender.push(EventData::Text("SIGINT".to_string()));
                }
            }
        });
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<EventData>, ReactorError> {
        self.queue.read()
    }
}
