//! WASM bindings for constellation-core.
//!
//! All functions exposed to JavaScript via wasm-bindgen are defined here.
//! They take and return JSON strings; failures come back as
//! `{"error": {"message": ...}}` and are also logged to the console.

use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::output::{self, LayoutOutput, LayoutSession};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    pub fn console_log(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = warn)]
    pub fn console_warn(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = error)]
    pub fn console_error(s: &str);
}

const SERIALIZE_FAILED: &str = r#"{"error":{"message":"failed to serialize output"}}"#;

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        console_error(&format!("Error serializing output: {}", e));
        SERIALIZE_FAILED.to_string()
    })
}

/// Lay out a manifest. `request_json` may be empty.
#[wasm_bindgen]
pub fn compute_layout(manifest_json: &str, request_json: &str) -> String {
    let output = match output::build_layout(manifest_json, request_json) {
        Ok(output) => output,
        Err(e) => {
            console_error(&format!("Error computing layout: {}", e));
            LayoutOutput::from_error(&e)
        }
    };
    to_json(&output)
}

/// Label ring for the manifest's axes, as a JSON array.
#[wasm_bindgen]
pub fn axis_ring(manifest_json: &str) -> String {
    match output::build_axis_ring(manifest_json) {
        Ok(ring) => to_json(&ring),
        Err(e) => {
            console_error(&format!("Error reading axes: {}", e));
            to_json(&LayoutOutput::from_error(&e))
        }
    }
}

/// Long-lived layout state for a page: one manifest, many views.
#[wasm_bindgen]
pub struct ConstellationSession {
    inner: LayoutSession,
}

#[wasm_bindgen]
impl ConstellationSession {
    #[wasm_bindgen(constructor)]
    pub fn new(cache_capacity: usize) -> Self {
        Self { inner: LayoutSession::new(cache_capacity) }
    }

    /// Returns false (and keeps the previous manifest) if loading fails.
    #[wasm_bindgen(js_name = loadManifest)]
    pub fn load_manifest(&mut self, manifest_json: &str) -> bool {
        match self.inner.load(manifest_json) {
            Ok(()) => true,
            Err(e) => {
                console_error(&format!("Error loading manifest: {}", e));
                false
            }
        }
    }

    pub fn layout(&mut self, request_json: &str) -> String {
        let output = match self.inner.layout(request_json) {
            Ok(output) => output,
            Err(e) => {
                console_error(&format!("Error computing layout: {}", e));
                LayoutOutput::from_error(&e)
            }
        };
        to_json(&output)
    }
}

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        match record.level() {
            Level::Error => console_error(&line),
            Level::Warn => console_warn(&line),
            _ => console_log(&line),
        }
    }

    fn flush(&self) {}
}

/// Route `log` records to the browser console. `level` is "off", "error",
/// "warn", "info", "debug" or "trace"; anything else means "info".
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    let filter = level.parse().unwrap_or(LevelFilter::Info);
    // already installed: only the level changes
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
}
