//! Device thread.
//!
//! A registry borrows its storage through `Cell`/`RefCell` and cannot cross
//! threads, so it lives on one dedicated OS thread for its whole life. Async
//! connection tasks talk to it through a [`DeviceHandle`]: jobs go over a
//! channel and replies come back on oneshot channels. Periodic publications
//! are rendered on the same thread and fanned out over a broadcast channel.

use crate::config::Config;
use crate::error::ServerError;
use devobj_core::{Device, Registry, RegistryError, Reply};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot};

/// Buffered publications per subscriber before it starts lagging.
const PUBLICATION_CAPACITY: usize = 64;

/// Storage for a set of data objects, owned by the device thread.
pub trait ObjectTable {
    /// Builds the registry over this table's storage and passes it to `run`.
    ///
    /// `run` returns once the device stops.
    fn with_registry(&self, run: &mut dyn FnMut(Registry<'_>)) -> Result<(), RegistryError>;

    /// Refreshes values that change outside of requests, such as
    /// measurements. Called on the device thread before every job and every
    /// publication.
    fn update(&self) {}
}

/// When and what to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSchedule {
    pub interval: Duration,
    pub ids: Vec<u16>,
}

/// Buffer sizes and behaviour of the device thread.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub response_buffer_len: usize,
    pub max_tokens: usize,
    pub verbose_status: bool,
    pub publish: Option<PublishSchedule>,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DeviceOptions {
    pub fn from_config(config: &Config) -> Self {
        let publish = config.publish.enabled.then(|| PublishSchedule {
            interval: config.publish.interval(),
            ids: config.publish.ids.clone(),
        });
        Self {
            response_buffer_len: config.protocol.response_buffer_len,
            max_tokens: config.protocol.max_tokens,
            verbose_status: config.protocol.verbose_status,
            publish,
        }
    }

    /// Sets the publication schedule.
    pub fn with_publish(mut self, interval: Duration, ids: Vec<u16>) -> Self {
        self.publish = Some(PublishSchedule { interval, ids });
        self
    }
}

enum Job {
    Process {
        request: String,
        reply: oneshot::Sender<Reply>,
    },
    Publish {
        ids: Vec<u16>,
        reply: oneshot::Sender<Reply>,
    },
    Shutdown,
}

/// Cloneable, thread-safe handle to the device thread.
#[derive(Clone)]
pub struct DeviceHandle {
    jobs: mpsc::Sender<Job>,
    publications: broadcast::Sender<String>,
}

impl DeviceHandle {
    /// Runs a text request on the device.
    pub async fn process(&self, request: impl Into<String>) -> Result<Reply, ServerError> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job::Process {
                request: request.into(),
                reply,
            })
            .map_err(|_| ServerError::DeviceGone)?;
        response.await.map_err(|_| ServerError::DeviceGone)
    }

    /// Renders a publication message for `ids` on demand.
    pub async fn publish(&self, ids: &[u16]) -> Result<Reply, ServerError> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job::Publish {
                ids: ids.to_vec(),
                reply,
            })
            .map_err(|_| ServerError::DeviceGone)?;
        response.await.map_err(|_| ServerError::DeviceGone)
    }

    /// Subscribes to periodic publications.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.publications.subscribe()
    }
}

/// The running device thread.
pub struct DeviceThread {
    handle: DeviceHandle,
    join: Option<JoinHandle<()>>,
}

impl DeviceThread {
    /// Starts the device thread.
    ///
    /// `build` runs on the new thread and creates the object storage, which
    /// therefore never has to be `Send`. Returns once the registry has been
    /// built, or with the error that prevented it.
    pub fn spawn<T, F>(build: F, options: DeviceOptions) -> Result<Self, ServerError>
    where
        T: ObjectTable,
        F: FnOnce() -> T + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (publications, _) = broadcast::channel(PUBLICATION_CAPACITY);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), RegistryError>>();

        let thread_publications = publications.clone();
        let join = thread::Builder::new()
            .name("devobj-device".to_string())
            .spawn(move || {
                let table = build();
                let mut ready = Some(ready_tx);
                let result = table.with_registry(&mut |registry| {
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Ok(()));
                    }
                    serve(registry, &table, &jobs_rx, &thread_publications, &options);
                });
                if let Err(e) = result {
                    tracing::error!("Failed to build registry: {}", e);
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                handle: DeviceHandle {
                    jobs: jobs_tx,
                    publications,
                },
                join: Some(join),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ServerError::DeviceGone),
        }
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle.clone()
    }

    /// Stops the device thread and waits for it to exit.
    pub fn shutdown(mut self) -> Result<(), ServerError> {
        let _ = self.handle.jobs.send(Job::Shutdown);
        match self.join.take() {
            Some(join) => join.join().map_err(|_| ServerError::DeviceGone),
            None => Ok(()),
        }
    }
}

impl Drop for DeviceThread {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.handle.jobs.send(Job::Shutdown);
        }
    }
}

fn serve(
    registry: Registry<'_>,
    table: &dyn ObjectTable,
    jobs: &Receiver<Job>,
    publications: &broadcast::Sender<String>,
    options: &DeviceOptions,
) {
    let mut device = Device::new(registry, options.response_buffer_len, options.max_tokens)
        .with_verbose(options.verbose_status);
    tracing::info!(
        "Device started: {} objects, {} byte responses, {} tokens",
        device.registry().len(),
        device.response_capacity(),
        device.token_capacity()
    );

    let schedule = options.publish.as_ref();
    let mut next_publication = schedule.map(|schedule| Instant::now() + schedule.interval);

    loop {
        let job = match next_publication {
            Some(deadline) => {
                match jobs.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(job) => Some(job),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match jobs.recv() {
                Ok(job) => Some(job),
                Err(_) => break,
            },
        };

        table.update();

        match job {
            Some(Job::Process { request, reply }) => {
                let result = device.process(&request);
                tracing::debug!("Request {:?}: {}", request, result.status.code());
                let _ = reply.send(result);
            }
            Some(Job::Publish { ids, reply }) => {
                let _ = reply.send(device.publish(&ids));
            }
            Some(Job::Shutdown) => break,
            None => {}
        }

        if let (Some(deadline), Some(schedule)) = (next_publication, schedule) {
            if Instant::now() >= deadline {
                emit_publication(&mut device, schedule, publications);
                next_publication = Some(Instant::now() + schedule.interval);
            }
        }
    }

    tracing::info!("Device stopped");
}

fn emit_publication(
    device: &mut Device<'_>,
    schedule: &PublishSchedule,
    publications: &broadcast::Sender<String>,
) {
    let reply = device.publish(&schedule.ids);
    if !reply.is_success() {
        tracing::warn!("Dropping publication: {}", reply.status);
        return;
    }
    // Fails only when nobody is subscribed.
    if publications.send(reply.text).is_err() {
        tracing::trace!("Publication without subscribers");
    }
}
