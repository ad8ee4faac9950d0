use std::{net::SocketAddr, sync::Arc};

use log::{debug, info, warn};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    runtime::Runtime,
    signal,
    sync::watch,
    task::JoinSet,
};

use super::{ClusterCoordinator, Placement};
use crate::{Result, TrainerErr, task_spec::TaskSpec};

/// Stops a `RoleAware` server and releases anyone joined on it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    fn new() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }

    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// A process inside a cluster: it serves an endpoint on its task address for as long as it
/// lives.
pub struct RoleAware {
    runtime: Runtime,
    placement: Placement,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
}

impl RoleAware {
    /// Binds this task's cluster address and starts accepting peers in the background.
    ///
    /// # Arguments
    /// * `task_spec` - The task, which must have an address in its cluster.
    ///
    /// # Returns
    /// The running coordinator or an error if the address is missing or can't be bound.
    pub fn start(task_spec: &TaskSpec) -> Result<Self> {
        let address = task_spec.address().ok_or_else(|| {
            TrainerErr::InvalidTaskSpec(format!(
                "{} {} has no address in the cluster",
                task_spec.job_name, task_spec.index
            ))
        })?;

        let runtime = Runtime::new()?;
        let listener = runtime.block_on(TcpListener::bind(address))?;
        let local_addr = listener.local_addr()?;

        info!(
            index = task_spec.index;
            "{} server listening on {local_addr}", task_spec.job_name
        );

        let shutdown = ShutdownHandle::new();
        runtime.spawn(serve(listener, shutdown.subscribe()));

        Ok(Self {
            runtime,
            placement: Placement::for_task(task_spec),
            local_addr,
            shutdown,
        })
    }

    /// The address the server actually bound, useful when the cluster asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }
}

impl ClusterCoordinator for RoleAware {
    fn placement(&self) -> &Placement {
        &self.placement
    }

    fn join(&mut self) -> Result<()> {
        info!("joining server at {}", self.local_addr);

        let mut shutdown = self.shutdown.subscribe();
        self.runtime.block_on(async {
            tokio::select! {
                res = signal::ctrl_c() => res,
                _ = shutdown.wait_for(|&stop| stop) => Ok(()),
            }
        })?;

        info!("server at {} shut down", self.local_addr);
        Ok(())
    }
}

impl Drop for RoleAware {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

/// Accepts peers until shut down.
///
/// # Returns
/// The amount of peers still connected at shutdown.
async fn serve(listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> usize {
    let mut peers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("peer {peer} connected");
                    peers.spawn(hold(stream, peer));
                }
                Err(e) => warn!("failed to accept a peer: {e}"),
            },
            Some(_) = peers.join_next() => {}
        }
    }

    let connected = peers.len();
    debug!("dropping {connected} connected peers");
    peers.shutdown().await;
    connected
}

/// Keeps a peer's connection open until it hangs up.
async fn hold(mut stream: TcpStream, peer: SocketAddr) {
    let mut buf = [0; 512];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("peer {peer} errored: {e}");
                break;
            }
        }
    }

    debug!("peer {peer} disconnected");
}

#[cfg(test)]
mod tests {
    use std::{net::TcpStream as StdTcpStream, thread, time::Duration};

    use super::*;
    use crate::task_spec::{ClusterSpec, JobName};

    fn ps_task() -> TaskSpec {
        let cluster = ClusterSpec::new()
            .with_job(JobName::Worker, ["127.0.0.1:0"])
            .with_job(JobName::Ps, ["127.0.0.1:0"]);
        TaskSpec::new(JobName::Ps, 0, Some(cluster))
    }

    #[test]
    fn accepts_peers_on_the_task_address() {
        let coordinator = RoleAware::start(&ps_task()).unwrap();
        assert!(StdTcpStream::connect(coordinator.local_addr()).is_ok());
    }

    #[test]
    fn join_returns_on_shutdown() {
        let mut coordinator = RoleAware::start(&ps_task()).unwrap();
        let handle = coordinator.shutdown_handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.shutdown();
        });

        coordinator.join().unwrap();
        stopper.join().unwrap();
    }

    #[test]
    fn tasks_need_an_address() {
        let task = TaskSpec::new(JobName::Worker, 0, Some(ClusterSpec::new()));
        assert!(matches!(
            RoleAware::start(&task),
            Err(TrainerErr::InvalidTaskSpec(_))
        ));
    }

    #[test]
    fn hung_up_peers_are_released() {
        let runtime = Runtime::new().unwrap();
        let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = watch::channel(false);
        let server = runtime.spawn(serve(listener, stopped));

        for _ in 0..3 {
            drop(StdTcpStream::connect(addr).unwrap());
        }
        let live = StdTcpStream::connect(addr).unwrap();
        thread::sleep(Duration::from_millis(200));

        stop.send_replace(true);
        assert_eq!(runtime.block_on(server).unwrap(), 1);
        drop(live);
    }
}
