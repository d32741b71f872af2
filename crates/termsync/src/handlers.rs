use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use bytes::Bytes;
use termsync_core::WindowId;
use termsync_daemon::{
    BroadcastChannel, BusError, HttpSidecar, HubBus, HubServer, Reconciler, SignalHandler,
    TerminalLifecycle, TerminalTransport, TmuxTransport, WindowConfig, WindowHandle,
    WindowRuntime, now_millis,
};
use termsync_ipc::BroadcastMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CliError;
use crate::presenter::{ErrorView, Presenter};
use crate::shell::{self, HELP, ShellCommand};

const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(100);
const RELAY_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

pub type HandlerResult = Result<(), CliError>;

#[derive(Debug, Clone, Default)]
pub struct WindowOptions {
    pub standalone: bool,
    pub tmux_socket: Option<String>,
}

/// Applies command-line overrides on top of the environment.
pub fn resolve_config(
    mut config: WindowConfig,
    socket: Option<std::path::PathBuf>,
    window_id: Option<String>,
) -> Result<WindowConfig, CliError> {
    if let Some(socket) = socket {
        config = config.with_socket_path(socket);
    }
    if let Some(id) = window_id {
        let id = WindowId::try_new(id).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        config = config.with_window_id(id);
    }
    Ok(config)
}

pub async fn run_hub(config: &WindowConfig, presenter: &dyn Presenter) -> HandlerResult {
    let shutdown = Arc::new(AtomicBool::new(false));
    let _signals = SignalHandler::setup(Arc::clone(&shutdown))?;

    let server = HubServer::bind(
        &config.socket_path,
        config.max_message_bytes,
        config.channel_capacity,
    )
    .await?;
    presenter.present_success(&format!("Hub listening on {}", server.path().display()));

    server.serve(shutdown).await?;
    presenter.present_info("Hub stopped");
    Ok(())
}

/// Publishes `reload-all` and waits for the hub to relay it back, which
/// means every connected window was sent it too.
pub async fn reload_all(config: &WindowConfig, presenter: &dyn Presenter) -> HandlerResult {
    let bus = HubBus::connect(
        &config.socket_path,
        config.max_message_bytes,
        config.channel_capacity,
    )
    .await?;

    let from = format!("cli-{}", Uuid::new_v4());
    let payload = BroadcastMessage::reload_all(from.clone(), now_millis())
        .encode()
        .map_err(BusError::from)?;
    let mut relayed = bus.subscribe();
    bus.publish(Bytes::from(payload))?;

    let confirmed = tokio::time::timeout(RELAY_CONFIRM_TIMEOUT, async {
        loop {
            match relayed.recv().await {
                Ok(frame) => {
                    let ours = BroadcastMessage::decode(&frame)
                        .map(|message| message.from == from)
                        .unwrap_or(false);
                    if ours {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    })
    .await
    .map_err(|_| CliError::NotRelayed {
        timeout_ms: RELAY_CONFIRM_TIMEOUT.as_millis() as u64,
    })?;
    confirmed?;

    presenter.present_success("Reload requested for every window");
    Ok(())
}

/// Runs one window until stdin closes, `quit` is read, or a signal arrives.
pub async fn run_window(
    config: WindowConfig,
    options: WindowOptions,
    presenter: &dyn Presenter,
) -> HandlerResult {
    let shutdown = Arc::new(AtomicBool::new(false));
    let signals = SignalHandler::setup(Arc::clone(&shutdown))?;

    let bus = if options.standalone {
        None
    } else {
        match HubBus::connect(
            &config.socket_path,
            config.max_message_bytes,
            config.channel_capacity,
        )
        .await
        {
            Ok(bus) => {
                let bus: Arc<dyn BroadcastChannel> = Arc::new(bus);
                Some(bus)
            }
            Err(e) => {
                warn!(error = %e, "Hub unavailable, running as a single window");
                presenter.present_info(&format!("{} (running as a single window)", e));
                None
            }
        }
    };
    let connected = bus.is_some();

    let mut tmux = TmuxTransport::new(config.session_prefix.clone(), config.channel_capacity);
    if let Some(name) = options.tmux_socket {
        tmux = tmux.with_socket_name(name);
    }
    let tmux = Arc::new(tmux);
    let _watch = tmux.watch(config.poll_interval);
    let transport: Arc<dyn TerminalTransport> = tmux;

    let (runtime, handle) = WindowRuntime::new(&config, bus, Arc::clone(&transport));
    let window_task = runtime.spawn();

    let reconciler_task = match HttpSidecar::new(&config.backend_url, config.query_timeout) {
        Ok(sidecar) => {
            let sidecar = Arc::new(sidecar);
            let reconciler = Arc::new(Reconciler::new(
                handle.clone(),
                sidecar.clone(),
                sidecar,
                config.query_timeout,
            ));
            Some(tokio::spawn(reconciler.run(config.poll_interval)))
        }
        Err(e) => {
            warn!(error = %e, url = %config.backend_url, "Status sidecar disabled");
            None
        }
    };

    let lifecycle = TerminalLifecycle::new(
        handle.clone(),
        transport,
        config.session_prefix.clone(),
    );
    info!(window_id = %config.window_id, connected, "Window ready");
    presenter.present_success(&format!(
        "Window {} ready{}",
        config.window_id,
        if connected { "" } else { " (single window)" }
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signals.wait(SIGNAL_POLL_INTERVAL) => break,
        };
        let Some(line) = line else {
            break;
        };
        match shell::parse(&line) {
            Ok(None) => {}
            Ok(Some(ShellCommand::Quit)) => break,
            Ok(Some(command)) => execute(&lifecycle, &handle, command, presenter).await,
            Err(e) => presenter.present_error(&ErrorView::from(&e)),
        }
    }

    handle.shutdown().await;
    let _ = window_task.await;
    if let Some(task) = reconciler_task {
        task.abort();
    }
    presenter.present_info(&format!("Window {} stopped", config.window_id));
    Ok(())
}

/// Runs one line command against the window. Failures are reported and the
/// window keeps running.
pub async fn execute(
    lifecycle: &TerminalLifecycle,
    handle: &WindowHandle,
    command: ShellCommand,
    presenter: &dyn Presenter,
) {
    let result = match command {
        ShellCommand::New {
            terminal_type,
            working_dir,
        } => lifecycle
            .create(&terminal_type, working_dir)
            .await
            .map(|t| presenter.present_terminal("Created", &t)),
        ShellCommand::Attach(id) => lifecycle
            .reattach(&id)
            .await
            .map(|t| presenter.present_terminal("Attached", &t)),
        ShellCommand::Detach(id) => lifecycle
            .detach(&id)
            .await
            .map(|t| presenter.present_terminal("Detached", &t)),
        ShellCommand::Close(id) => lifecycle
            .close(&id)
            .await
            .map(|()| presenter.present_success(&format!("Closed {}", id))),
        ShellCommand::Rename { id, name } => lifecycle
            .rename(&id, &name)
            .await
            .map(|t| presenter.present_terminal("Renamed", &t)),
        ShellCommand::AutoName { id, enabled } => lifecycle
            .set_auto_update_name(&id, enabled)
            .await
            .map(|t| presenter.present_terminal("Updated", &t)),
        ShellCommand::Focus(id) => lifecycle
            .focus(&id)
            .await
            .map(|()| presenter.present_success(&format!("Focused {}", id))),
        ShellCommand::List => lifecycle
            .list()
            .await
            .map(|snapshot| presenter.present_snapshot(&snapshot, lifecycle.window_id())),
        ShellCommand::ReloadAll => handle
            .reload_all()
            .await
            .map(|()| presenter.present_success("Reload requested for every window")),
        ShellCommand::Help => {
            presenter.present_raw(HELP);
            Ok(())
        }
        ShellCommand::Quit => Ok(()),
    };
    if let Err(e) = result {
        presenter.present_error(&ErrorView::from(&e));
    }
}
