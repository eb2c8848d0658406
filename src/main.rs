mod cli;
mod ipc;
mod wayland;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::Parser;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use wayland_client::{Connection, EventQueue};

use blueshift::controller::{self, Control, Settings, Target};
use blueshift::scheduling::{self, CurveOptions, PhaseOffsets, PhasePresets};
use blueshift::ScheduleConfig;
use blueshift::color::{MAX_KELVIN, MIN_KELVIN};
use cli::Opts;
use ipc::{SharedAppState, handle_stdin_commands, lock, start_socket_server};
use wayland::Displays;

fn settings_from(opts: &Opts) -> Result<Settings> {
    let offsets = PhaseOffsets::new(opts.evening_offset, opts.night_offset)
        .context("invalid phase offsets")?;
    let presets = PhasePresets {
        daylight: opts.daylight_temp,
        evening: opts.evening_temp,
        night: opts.night_temp,
    };
    for (flag, kelvin) in [
        ("--daylight", presets.daylight),
        ("--evening", presets.evening),
        ("--night", presets.night),
    ] {
        if !(MIN_KELVIN..=MAX_KELVIN).contains(&kelvin) {
            bail!("{flag} {kelvin}K is outside {MIN_KELVIN}..={MAX_KELVIN}K");
        }
    }
    if !(presets.night <= presets.evening && presets.evening <= presets.daylight) {
        bail!("presets must satisfy --night <= --evening <= --daylight");
    }
    if opts.table_size == 0 {
        bail!("--table-size must be at least 1");
    }
    Ok(Settings {
        mode: opts.mode(),
        schedule: ScheduleConfig {
            wake: opts.wake,
            bed: opts.bed,
            enabled: !opts.no_schedule,
            timezone: opts.timezone,
        },
        presets,
        offsets,
        table_size: opts.table_size,
    })
}

fn print_curve(settings: &Settings, opts: &Opts) {
    let options = CurveOptions {
        presets: settings.presets,
        half_width: opts.curve_transition,
        step: opts.curve_step,
    };
    println!("minute,kelvin");
    for (minute, kelvin) in scheduling::temperature_curve(
        settings.schedule.wake.minute_of_day(),
        settings.schedule.bed.minute_of_day(),
        settings.offsets,
        options,
    ) {
        println!("{minute},{kelvin:.0}");
    }
}

fn connection_ready(revents: Option<PollFlags>) -> bool {
    revents.is_some_and(|flags| {
        flags.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP)
    })
}

/// Reads whatever the compositor has queued without blocking; the next
/// `dispatch_pending` handles it.
fn read_display_events(event_queue: &EventQueue<Displays>) -> Result<()> {
    let Some(guard) = event_queue.prepare_read() else {
        return Ok(());
    };
    let mut fds = [PollFd::new(
        guard.connection_fd(),
        PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP,
    )];
    match poll(&mut fds, PollTimeout::ZERO) {
        Ok(0) => {
            // no events, drop guard to cancel read
        }
        Ok(_) => {
            if connection_ready(fds[0].revents()) {
                if let Err(err) = guard.read() {
                    log::warn!("Failed to read wayland events: {err}");
                }
            }
        }
        Err(nix::errno::Errno::EINTR) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    if opts.interval == 0 {
        return Err(anyhow!("--interval must be > 0"));
    }
    let settings = settings_from(&opts)?;

    if opts.print_curve {
        print_curve(&settings, &opts);
        return Ok(());
    }

    let bounds = settings.schedule.boundaries(settings.offsets);
    log::info!(
        "Schedule: wake {} bed {} ({}), evening from minute {} night from minute {}",
        settings.schedule.wake,
        settings.schedule.bed,
        settings.schedule.timezone,
        bounds.evening_minute,
        bounds.night_minute
    );

    let shared_state = Arc::new(Mutex::new(SharedAppState::new(
        settings,
        opts.curve_transition,
    )));

    let (control_tx, mut control_rx) = tokio::sync::mpsc::unbounded_channel::<Control>();

    if let Some(socket_path) = &opts.socket {
        let shared_state_clone = Arc::clone(&shared_state);
        let control_tx = control_tx.clone();
        let socket_path = socket_path.clone();
        tokio::spawn(async move {
            if let Err(e) = start_socket_server(shared_state_clone, control_tx, &socket_path).await
            {
                log::error!("Socket server error: {:#}", e);
            }
        });
    }

    if opts.stdin {
        let shared_state_clone = Arc::clone(&shared_state);
        let control_tx = control_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_stdin_commands(shared_state_clone, control_tx).await {
                log::error!("Stdin command error: {:#}", e);
            }
        });
    }

    let conn = Connection::connect_to_env().context("connect wayland display")?;
    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();
    conn.display().get_registry(&qh, ());

    let mut state = Displays::default();
    event_queue
        .roundtrip(&mut state)
        .context("initial wayland roundtrip")?;
    if !state.has_gamma_control() {
        return Err(anyhow!("Compositor lacks wlr-gamma-control-unstable-v1"));
    }
    state.request_gamma_all(&qh);
    event_queue
        .roundtrip(&mut state)
        .context("gamma setup roundtrip")?;

    let mut sigusr1 = signal(SignalKind::user_defined1()).context("setup SIGUSR1 handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("setup SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("setup SIGTERM handler")?;

    let interval = Duration::from_secs(opts.interval);
    let mut last_kelvin: Option<f64> = None;

    loop {
        event_queue
            .dispatch_pending(&mut state)
            .context("dispatch pending")?;

        let settings = lock(&shared_state).settings;
        let decision = controller::resolve(&settings, Utc::now());

        {
            let mut shared = lock(&shared_state);
            shared.phase = decision.phase;
            shared.automatic_phase = decision.automatic_phase;
            shared.current_temp = decision.kelvin;
        }

        if last_kelvin != Some(decision.kelvin) {
            log::info!(
                "Mode {}: phase {}, {:.0}K",
                settings.mode,
                decision.phase.map_or("-", |p| p.label()),
                decision.kelvin
            );
            last_kelvin = Some(decision.kelvin);
        }

        let applied = match &decision.target {
            Target::Reset => state.reset_all(&opts.outputs),
            Target::Apply(table) => state.apply_all(table, &opts.outputs),
        };
        if applied == 0 {
            log::debug!("No output accepted the gamma table");
        }
        conn.flush().context("flush wayland connection")?;

        tokio::select! {
            _ = sigusr1.recv() => {
                log::debug!("SIGUSR1, re-evaluating");
            }
            _ = sigint.recv() => break,
            _ = sigterm.recv() => break,
            Some(control) = control_rx.recv() => {
                // Settings were already updated by the IPC handler
                log::info!("Received control event: {:?}", control);
            }
            _ = tokio::time::sleep(interval) => {}
        }

        read_display_events(&event_queue)?;
    }

    log::info!("Restoring display gamma");
    state.release_all();
    conn.flush().context("flush wayland connection")?;
    if let Some(socket_path) = &opts.socket {
        let _ = std::fs::remove_file(socket_path);
    }
    Ok(())
}
