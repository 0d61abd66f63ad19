//! Piano Video control host
//!
//! Reads one JSON request per stdin line and writes one JSON response per
//! stdout line. Logs go to stderr.
//!
//! Methods:
//! - describe: groups, data groups and operators of the session video
//! - get {path}: value at "group.prop"
//! - set {path, value}: write a value
//! - call {path}: run operator "group.idname"
//! - export: current settings document
//! - apply {settings}: apply a settings document
//! - reset: restore every property default
//! - addons: loader report and catalog
//!
//! Environment: PV_CONFIG, PV_ADDON_PATHS, PV_AUTOLOAD, RUST_LOG.

use pv_core::{PvError, Value};
use pv_plugin::{SettingsDoc, Video};
use pvkernel::{AddonReport, Kernel, KernelConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<JsonValue>,
    method: String,
    #[serde(default)]
    params: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<PvError>,
}

impl Response {
    fn new(id: Option<JsonValue>, result: Result<JsonValue, PvError>) -> Self {
        match result {
            Ok(r) => Self { id, result: Some(r), error: None },
            Err(e) => Self { id, result: None, error: Some(e) },
        }
    }
}

/// Kernel plus the one video the host drives
struct Session {
    kernel: Kernel,
    video: Video,
    report: AddonReport,
}

impl Session {
    fn start(config: KernelConfig) -> Result<Self, PvError> {
        let mut kernel = Kernel::with_builtin_addons(config);
        let report = kernel.register_addons();
        let video = kernel.create_video()?;
        Ok(Self { kernel, video, report })
    }

    fn handle(&mut self, request: &Request) -> Response {
        debug!(method = %request.method, "handling request");
        let result = match request.method.as_str() {
            "describe" => to_json(&self.video.describe()),
            "get" => self.handle_get(&request.params),
            "set" => self.handle_set(&request.params),
            "call" => self.handle_call(&request.params),
            "export" => to_json(&self.video.export_settings()),
            "apply" => self.handle_apply(&request.params),
            "reset" => {
                self.video.reset_all();
                Ok(JsonValue::Null)
            }
            "addons" => Ok(json!({
                "catalog": self.kernel.catalog().iter().collect::<Vec<_>>(),
                "loaded": self.kernel.loaded_addons(),
                "report": self.report,
            })),
            other => Err(PvError::invalid_value(format!("unknown method '{}'", other))
                .with_suggestion("one of describe, get, set, call, export, apply, reset, addons")),
        };
        if let Err(e) = &result {
            warn!(method = %request.method, error = %e, "request failed");
        }
        Response::new(request.id.clone(), result)
    }

    fn handle_get(&self, params: &Option<JsonValue>) -> Result<JsonValue, PvError> {
        let path = str_param(params, "path")?;
        Ok(self.video.get(path)?.to_json())
    }

    fn handle_set(&self, params: &Option<JsonValue>) -> Result<JsonValue, PvError> {
        let path = str_param(params, "path")?;
        let raw = param(params, "value")?;
        let value = Value::from_json(raw).ok_or_else(|| {
            PvError::invalid_value(format!("'{}' cannot hold a property value", raw))
        })?;
        self.video.set(path, value)?;
        Ok(JsonValue::Null)
    }

    fn handle_call(&self, params: &Option<JsonValue>) -> Result<JsonValue, PvError> {
        let path = str_param(params, "path")?;
        self.video.ops().call(path)?;
        Ok(JsonValue::Null)
    }

    fn handle_apply(&mut self, params: &Option<JsonValue>) -> Result<JsonValue, PvError> {
        let doc: SettingsDoc = serde_json::from_value(param(params, "settings")?.clone())
            .map_err(|e| PvError::invalid_value(format!("malformed settings: {}", e)))?;
        self.video.apply_settings(&doc)?;
        Ok(JsonValue::Null)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<JsonValue, PvError> {
    serde_json::to_value(value).map_err(|e| PvError::internal(e.to_string()))
}

fn param<'a>(params: &'a Option<JsonValue>, name: &str) -> Result<&'a JsonValue, PvError> {
    params
        .as_ref()
        .and_then(|p| p.get(name))
        .ok_or_else(|| PvError::invalid_value(format!("missing parameter '{}'", name)))
}

fn str_param<'a>(params: &'a Option<JsonValue>, name: &str) -> Result<&'a str, PvError> {
    param(params, name)?
        .as_str()
        .ok_or_else(|| PvError::type_mismatch("Text", "non-string JSON").with_note(format!("parameter '{}'", name)))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn write_line(out: &mut impl Write, response: &Response) -> io::Result<()> {
    let text = serde_json::to_string(response).map_err(io::Error::other)?;
    writeln!(out, "{}", text)?;
    out.flush()
}

fn main() -> ExitCode {
    init_logging();

    let config = match KernelConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let mut session = match Session::start(config) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "cannot create video");
            return ExitCode::FAILURE;
        }
    };
    info!(
        version = SERVER_VERSION,
        addons = ?session.report.loaded_names(),
        failures = session.report.failures.len(),
        "pv-cli ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "cannot read stdin");
                return ExitCode::FAILURE;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => session.handle(&request),
            Err(e) => {
                warn!(error = %e, "malformed request");
                Response::new(None, Err(PvError::invalid_value(format!("malformed request: {}", e))))
            }
        };
        if let Err(e) = write_line(&mut stdout, &response) {
            error!(error = %e, "cannot write response");
            return ExitCode::FAILURE;
        }
    }

    info!("stdin closed, shutting down");
    ExitCode::SUCCESS
}
