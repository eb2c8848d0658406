use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc::UnboundedSender;

use blueshift::controller::{Control, Mode, Settings};
use blueshift::scheduling::{self, CurveOptions, SchedulePhase};
use blueshift::{ClockTime, ScheduleConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcCommand {
    #[serde(rename = "set_mode")]
    SetMode { mode: String },
    #[serde(rename = "get_status")]
    GetStatus,
    #[serde(rename = "set_temperature")]
    SetTemperature { kelvin: f64 },
    #[serde(rename = "set_schedule")]
    SetSchedule { wake: ClockTime, bed: ClockTime },
    #[serde(rename = "set_enabled")]
    SetEnabled { enabled: bool },
    #[serde(rename = "get_curve")]
    GetCurve {
        #[serde(default = "default_curve_step")]
        step: u16,
    },
}

fn default_curve_step() -> u16 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    #[serde(rename = "status")]
    Status {
        mode: String,
        phase: Option<SchedulePhase>,
        automatic_phase: Option<SchedulePhase>,
        temperature: f64,
        schedule: ScheduleConfig,
        evening_start: String,
        night_start: String,
    },
    #[serde(rename = "curve")]
    Curve { points: Vec<(u16, f64)> },
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct SharedAppState {
    pub settings: Settings,
    pub phase: Option<SchedulePhase>,
    pub automatic_phase: Option<SchedulePhase>,
    pub current_temp: f64,
    pub curve_half_width: u16,
}

impl SharedAppState {
    pub fn new(settings: Settings, curve_half_width: u16) -> Self {
        Self {
            settings,
            phase: None,
            automatic_phase: None,
            current_temp: settings.presets.daylight,
            curve_half_width,
        }
    }
}

pub fn lock(state: &Mutex<SharedAppState>) -> MutexGuard<'_, SharedAppState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn format_minute(minute: u16) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn format_status_response(state: &SharedAppState) -> IpcResponse {
    let bounds = state.settings.schedule.boundaries(state.settings.offsets);
    IpcResponse::Status {
        mode: state.settings.mode.to_string(),
        phase: state.phase,
        automatic_phase: state.automatic_phase,
        temperature: state.current_temp,
        schedule: state.settings.schedule,
        evening_start: format_minute(bounds.evening_minute),
        night_start: format_minute(bounds.night_minute),
    }
}

fn format_curve_response(state: &SharedAppState, step: u16) -> IpcResponse {
    let settings = &state.settings;
    let options = CurveOptions {
        presets: settings.presets,
        half_width: state.curve_half_width,
        step,
    };
    let points = scheduling::temperature_curve(
        settings.schedule.wake.minute_of_day(),
        settings.schedule.bed.minute_of_day(),
        settings.offsets,
        options,
    )
    .collect();
    IpcResponse::Curve { points }
}

fn apply_control(
    shared_state: &Mutex<SharedAppState>,
    control_tx: &UnboundedSender<Control>,
    control: Control,
) -> IpcResponse {
    let mut state = lock(shared_state);
    state.settings.apply(control);
    if let Err(e) = control_tx.send(control) {
        log::warn!("Failed to forward control event: {}", e);
    }
    format_status_response(&state)
}

pub fn handle_command(
    line: &str,
    shared_state: &Mutex<SharedAppState>,
    control_tx: &UnboundedSender<Control>,
) -> IpcResponse {
    match serde_json::from_str::<IpcCommand>(line.trim()) {
        Ok(IpcCommand::GetStatus) => format_status_response(&lock(shared_state)),
        Ok(IpcCommand::GetCurve { step }) => format_curve_response(&lock(shared_state), step),
        Ok(IpcCommand::SetMode { mode }) => match mode.parse::<Mode>() {
            Ok(mode) => {
                log::info!("Setting mode to: {}", mode);
                apply_control(shared_state, control_tx, Control::SetMode(mode))
            }
            Err(message) => IpcResponse::Error { message },
        },
        Ok(IpcCommand::SetTemperature { kelvin }) => {
            log::info!("Setting manual temperature: {}K", kelvin);
            apply_control(shared_state, control_tx, Control::SetMode(Mode::Manual(kelvin)))
        }
        Ok(IpcCommand::SetSchedule { wake, bed }) => {
            log::info!("Setting schedule: wake {} bed {}", wake, bed);
            apply_control(shared_state, control_tx, Control::SetSchedule { wake, bed })
        }
        Ok(IpcCommand::SetEnabled { enabled }) => {
            log::info!("Schedule enabled: {}", enabled);
            apply_control(shared_state, control_tx, Control::SetEnabled(enabled))
        }
        Err(e) => IpcResponse::Error {
            message: format!("Invalid command: {}", e),
        },
    }
}

/// Answers one JSON command per line until the reader hits EOF.
pub async fn serve_lines<R, W>(
    mut reader: R,
    mut writer: W,
    shared_state: Arc<Mutex<SharedAppState>>,
    control_tx: UnboundedSender<Control>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_command(&line, &shared_state, &control_tx);
        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

pub async fn handle_stdin_commands(
    shared_state: Arc<Mutex<SharedAppState>>,
    control_tx: UnboundedSender<Control>,
) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    serve_lines(reader, tokio::io::stdout(), shared_state, control_tx).await
}

pub async fn start_socket_server(
    shared_state: Arc<Mutex<SharedAppState>>,
    control_tx: UnboundedSender<Control>,
    socket_path: &Path,
) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("remove stale socket {}", socket_path.display()))?;
    }
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("bind socket {}", socket_path.display()))?;
    log::info!("Listening for commands on {}", socket_path.display());

    loop {
        let (stream, _) = listener.accept().await.context("accept socket client")?;
        let shared_state = Arc::clone(&shared_state);
        let control_tx = control_tx.clone();
        tokio::spawn(async move {
            let (read, write) = stream.into_split();
            if let Err(e) = serve_lines(BufReader::new(read), write, shared_state, control_tx).await
            {
                log::warn!("IPC client error: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn shared() -> Arc<Mutex<SharedAppState>> {
        Arc::new(Mutex::new(SharedAppState::new(Settings::default(), 20)))
    }

    async fn run(input: &str) -> (Vec<serde_json::Value>, Vec<Control>, Arc<Mutex<SharedAppState>>) {
        let state = shared();
        let (tx, mut rx) = unbounded_channel();
        let mut out = Vec::new();
        serve_lines(input.as_bytes(), &mut out, Arc::clone(&state), tx)
            .await
            .unwrap();
        let replies = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let mut controls = Vec::new();
        while let Ok(c) = rx.try_recv() {
            controls.push(c);
        }
        (replies, controls, state)
    }

    #[tokio::test]
    async fn status_reports_boundaries() {
        let (replies, controls, _) = run("{\"type\":\"get_status\"}\n").await;
        assert!(controls.is_empty());
        assert_eq!(replies[0]["type"], "status");
        assert_eq!(replies[0]["mode"], "auto");
        assert_eq!(replies[0]["evening_start"], "20:00");
        assert_eq!(replies[0]["night_start"], "22:00");
        assert_eq!(replies[0]["schedule"]["wake"], "07:00");
    }

    #[tokio::test]
    async fn set_commands_forward_controls() {
        let input = concat!(
            "{\"type\":\"set_mode\",\"mode\":\"night\"}\n",
            "\n",
            "{\"type\":\"set_schedule\",\"wake\":\"08:00\",\"bed\":\"00:00\"}\n",
            "{\"type\":\"set_enabled\",\"enabled\":false}\n",
            "{\"type\":\"set_temperature\",\"kelvin\":3000}\n",
        );
        let (replies, controls, state) = run(input).await;
        assert_eq!(replies.len(), 4);
        assert_eq!(controls.len(), 4);
        assert_eq!(controls[0], Control::SetMode(Mode::Night));
        assert_eq!(replies[1]["evening_start"], "21:00");

        let state = lock(&state);
        assert_eq!(state.settings.mode, Mode::Manual(3000.0));
        assert!(!state.settings.schedule.enabled);
        assert_eq!(state.settings.schedule.wake.minute_of_day(), 480);
    }

    #[tokio::test]
    async fn bad_input_yields_errors() {
        let input = concat!(
            "not json\n",
            "{\"type\":\"set_mode\",\"mode\":\"sunset\"}\n",
            "{\"type\":\"set_schedule\",\"wake\":\"31:00\",\"bed\":\"00:00\"}\n",
        );
        let (replies, controls, _) = run(input).await;
        assert!(controls.is_empty());
        assert!(replies.iter().all(|r| r["type"] == "error"));
    }

    #[tokio::test]
    async fn curve_has_requested_resolution() {
        let (replies, _, _) = run("{\"type\":\"get_curve\",\"step\":60}\n").await;
        let points = replies[0]["points"].as_array().unwrap();
        assert_eq!(points.len(), 24);
        assert_eq!(points[12][1], 6500.0);
    }
}
