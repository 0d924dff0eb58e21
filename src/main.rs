use actix::{Actor, ActorContext, Addr, Handler, Message, StreamHandler};
use actix_web::{dev::ServerHandle, get, post, web, App, Error, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use anyhow::Context;
use gpio::{NullOutput, SignalOutput, SysfsOutput};
use log::{error, info};
use quadsim::{
    Clock, CounterPolicy, EncoderSimulator, HostConfig, Mode, MonotonicClock, SimulationConfig,
    TimingGate, TransitionEvent,
};
use serde::{Deserialize, Serialize};
use std::{
    env,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

use crate::logs::{read_logs, write_log};

mod gpio;
mod logs;
mod metrics;

// A status snapshot is appended to the log once per second
const LOG_INTERVAL_MS: u32 = 1000;

type Listeners = Arc<Mutex<Vec<Addr<TransitionActor>>>>;

#[derive(Message, Serialize)]
#[rtype(result = "()")]
struct TransitionMessage {
    pub event: TransitionEvent,
}

/// Streams transition events to one WebSocket client
struct TransitionActor;

impl Actor for TransitionActor {
    type Context = ws::WebsocketContext<Self>;
}

impl Handler<TransitionMessage> for TransitionActor {
    type Result = ();

    fn handle(&mut self, msg: TransitionMessage, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg) {
            Ok(text) => ctx.text(text),
            Err(e) => error!("Could not serialize transition: {}", e),
        }
    }
}

/// Handler for ws::Message message
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for TransitionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => (),
        }
    }
}

struct AppState {
    simulator: Arc<Mutex<EncoderSimulator>>,
    listeners: Listeners,
    shutdown: Arc<AtomicBool>,
    server: Arc<Mutex<Option<ServerHandle>>>,
    log_dir: String,
}

impl AppState {
    fn simulator(&self) -> MutexGuard<'_, EncoderSimulator> {
        self.simulator.lock().expect("simulator lock poisoned")
    }
}

/// Partial configuration change, absent fields keep their value
#[derive(Debug, Default, Deserialize)]
struct ConfigUpdate {
    number_of_teeth: Option<u32>,
    quarter_period_ms: Option<u32>,
    mode: Option<Mode>,
    enforce_tick_limit: Option<bool>,
    counter_policy: Option<CounterPolicy>,
}

impl ConfigUpdate {
    fn apply_to(&self, mut config: SimulationConfig) -> SimulationConfig {
        if let Some(teeth) = self.number_of_teeth {
            config.number_of_teeth = teeth;
        }
        if let Some(quarter_period_ms) = self.quarter_period_ms {
            config.quarter_period_ms = quarter_period_ms;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(enforce) = self.enforce_tick_limit {
            config.enforce_tick_limit = enforce;
        }
        if let Some(policy) = self.counter_policy {
            config.counter_policy = policy;
        }
        config
    }
}

#[get("/api/status")]
async fn status(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.simulator().snapshot())
}

// Start or stop the encoder
#[post("/api/pause")]
async fn toggle_pause(data: web::Data<AppState>) -> HttpResponse {
    let mut simulator = data.simulator();
    simulator.toggle_paused();
    HttpResponse::Ok().json(simulator.snapshot())
}

#[post("/api/direction")]
async fn toggle_direction(data: web::Data<AppState>) -> HttpResponse {
    let mut simulator = data.simulator();
    simulator.toggle_direction();
    HttpResponse::Ok().json(simulator.snapshot())
}

// Reconfigure the wheel, rejected as a whole when any value is invalid
#[post("/api/config")]
async fn update_config(
    data: web::Data<AppState>,
    update: web::Json<ConfigUpdate>,
) -> HttpResponse {
    let mut simulator = data.simulator();
    let config = update.apply_to(*simulator.config());
    match simulator.reconfigure(config) {
        Ok(()) => {
            info!("Configuration updated {:?}", config);
            HttpResponse::Ok().json(simulator.snapshot())
        }
        Err(e) => {
            info!("Configuration rejected: {}", e);
            HttpResponse::BadRequest().body(e.to_string())
        }
    }
}

#[post("/api/shutdown")]
async fn shutdown(data: web::Data<AppState>) -> HttpResponse {
    info!("Shutdown requested");
    data.shutdown.store(true, Ordering::SeqCst);
    let handle = data.server.lock().expect("server lock poisoned").clone();
    if let Some(handle) = handle {
        // Graceful stop waits for this request, so it cannot be awaited here
        actix_web::rt::spawn(async move { handle.stop(true).await });
    }
    HttpResponse::Accepted().finish()
}

// Upgrades connection to a Websocket and registers a listener
// Transition events are sent to all listeners
#[get("/api/ws")]
async fn transitions(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (actor, resp) = ws::start_with_addr(TransitionActor {}, &req, stream)?;
    data.listeners.lock().expect("listener lock poisoned").push(actor);
    info!("Listener connected");
    Ok(resp)
}

// Get the log for a certain date and hour
#[get("/api/logs/{date}/{hour}")]
async fn get_log(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> actix_web::Result<HttpResponse> {
    let (date, hour) = path.into_inner();
    let logs = read_logs(&data.log_dir, &date, &hour).map_err(actix_web::error::ErrorNotFound)?;
    Ok(HttpResponse::Ok().json(logs))
}

#[get("/metrics")]
async fn metrics_endpoint() -> actix_web::Result<HttpResponse> {
    let body = metrics::gather().map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Polling loop that owns the clock and the signal output
struct Driver {
    simulator: Arc<Mutex<EncoderSimulator>>,
    listeners: Listeners,
    shutdown: Arc<AtomicBool>,
    output: Box<dyn SignalOutput>,
    clock: MonotonicClock,
    poll_interval: Duration,
    log_dir: String,
}

impl Driver {
    fn run(mut self) {
        let mut log_gate = TimingGate::new(LOG_INTERVAL_MS, self.clock.now_ms());
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = self.clock.now_ms();

            // Scoped block to tick and release the lock quickly
            let (event, snapshot) = {
                let mut simulator = self.simulator.lock().expect("simulator lock poisoned");
                (simulator.tick(now), simulator.snapshot())
            };

            if let Some(event) = event {
                if let Err(e) = self.output.emit(event.pins) {
                    error!("Could not drive {:?}: {:#}", event.pins, e);
                }
                self.broadcast(event);
            }
            metrics::update(&snapshot);

            if log_gate.is_due(now) {
                log_gate.arm(now);
                if let Err(e) = write_log(&self.log_dir, &snapshot) {
                    error!("Could not write log: {:#}", e);
                }
            }

            thread::sleep(self.poll_interval);
        }
        info!("Driver stopped");
    }

    fn broadcast(&self, event: TransitionEvent) {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.retain(|listener| listener.connected());
        for listener in listeners.iter() {
            listener.do_send(TransitionMessage { event });
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let mut config = match env::var("QUADSIM_CONFIG") {
        Ok(path) => HostConfig::load_from_path(&path)?,
        Err(_) => {
            info!("QUADSIM_CONFIG not set, using defaults");
            HostConfig::default()
        }
    };
    if let Ok(bind) = env::var("QUADSIM_BIND") {
        config.bind = bind;
    }

    let clock = MonotonicClock::new();
    let simulator = EncoderSimulator::new(config.simulation, clock.now_ms())?;
    info!(
        "{} teeth, {} ms quarter period, {:.4} rev/s",
        config.simulation.number_of_teeth,
        config.simulation.quarter_period_ms,
        simulator.revolutions_per_second()
    );

    let output: Box<dyn SignalOutput> = if config.gpio_enabled {
        Box::new(
            SysfsOutput::open(config.pin_a, config.pin_b, simulator.pins())
                .context("could not set up encoder pins")?,
        )
    } else {
        Box::new(NullOutput)
    };

    let simulator = Arc::new(Mutex::new(simulator));
    let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));
    let shutdown_flag = Arc::new(AtomicBool::new(false));

    let driver = Driver {
        simulator: simulator.clone(),
        listeners: listeners.clone(),
        shutdown: shutdown_flag.clone(),
        output,
        clock,
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        log_dir: config.log_dir.clone(),
    };
    let driver = thread::spawn(move || driver.run());

    let server_handle = Arc::new(Mutex::new(None));
    let state = web::Data::new(AppState {
        simulator,
        listeners,
        shutdown: shutdown_flag.clone(),
        server: server_handle.clone(),
        log_dir: config.log_dir.clone(),
    });
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(status)
            .service(toggle_pause)
            .service(toggle_direction)
            .service(update_config)
            .service(shutdown)
            .service(transitions)
            .service(get_log)
            .service(metrics_endpoint)
    })
    .bind(config.bind.as_str())
    .with_context(|| format!("could not bind {}", config.bind))?
    .run();
    *server_handle.lock().expect("server lock poisoned") = Some(server.handle());

    info!("Listening on {}", config.bind);
    server.await?;

    shutdown_flag.store(true, Ordering::SeqCst);
    if driver.join().is_err() {
        error!("Driver thread panicked");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_update_keeps_absent_fields() {
        let update: ConfigUpdate = serde_json::from_str(r#"{ "number_of_teeth": 40 }"#).unwrap();
        let config = update.apply_to(SimulationConfig::default());
        assert_eq!(config.number_of_teeth, 40);
        assert_eq!(config.quarter_period_ms, 10);
        assert_eq!(config.mode, Mode::FreeRun);
    }

    #[test]
    fn config_update_with_zero_period_is_rejected() {
        let mut simulator = EncoderSimulator::new(SimulationConfig::default(), 0).unwrap();
        let update: ConfigUpdate =
            serde_json::from_str(r#"{ "number_of_teeth": 40, "quarter_period_ms": 0 }"#).unwrap();
        assert!(simulator.reconfigure(update.apply_to(*simulator.config())).is_err());
        assert_eq!(simulator.config().number_of_teeth, 25);
    }
}
