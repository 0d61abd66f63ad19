//! Render addon
//!
//! `render.start` turns the current settings into a [`RenderJob`] and queues
//! it in the `render_state` data group for the host's export pipeline.

use pv_core::{Property, PvError};
use pv_plugin::{DataGroupMeta, GroupMeta, OperatorMeta, OperatorPlugin, PluginRegistry, PropertyGroupPlugin, Video};
use tracing::info;

pub const STATE: DataGroupMeta = DataGroupMeta::new("render_state", "Queued render jobs");

/// Slot in [`STATE`] holding the `Vec<RenderJob>` queued so far
pub const JOBS_SLOT: &str = "jobs";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub output: String,
    pub resolution: (u32, u32),
    /// Whole frames per second; fractional rates are rounded down
    pub fps: u32,
    pub start: f64,
    pub end: f64,
}

impl RenderJob {
    pub fn frame_count(&self) -> u64 {
        ((self.end - self.start) * f64::from(self.fps)).floor() as u64
    }
}

// ============ render ============

pub struct RenderSettings;

impl PropertyGroupPlugin for RenderSettings {
    fn meta(&self) -> GroupMeta {
        GroupMeta {
            idname: "render",
            label: "Render",
            description: "Export range and destination",
        }
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("output", Property::text("output.mp4").with_label("Output file")),
            (
                "start",
                Property::float_range(0.0, 0.0, f64::MAX)
                    .with_label("Start")
                    .with_description("Seconds into the song where the export begins"),
            ),
            (
                "end",
                Property::float_range(10.0, 0.0, f64::MAX)
                    .with_label("End")
                    .with_description("Seconds into the song where the export stops"),
            ),
        ]
    }
}

// ============ render.start ============

pub struct StartRender;

impl OperatorPlugin for StartRender {
    fn meta(&self) -> OperatorMeta {
        OperatorMeta {
            group: "render",
            idname: "start",
            label: "Render",
            description: "Queue an export of the current video",
        }
    }

    fn execute(&self, video: &Video) -> Result<(), PvError> {
        let job = {
            let group = video.group("render")?;
            let settings = group.read();
            let output = settings.get("output")?;
            let start = settings.get("start")?;
            let end = settings.get("end")?;
            RenderJob {
                output: output.as_text().unwrap_or_default().to_string(),
                resolution: video.resolution(),
                fps: video.fps().floor() as u32,
                start: start.as_float().unwrap_or_default(),
                end: end.as_float().unwrap_or_default(),
            }
        };
        if job.output.is_empty() {
            return Err(PvError::invalid_value("render output path is empty"));
        }
        if job.end <= job.start {
            return Err(PvError::invalid_value(format!(
                "render end ({}) must be after start ({})",
                job.end, job.start
            )));
        }
        if job.fps == 0 {
            return Err(PvError::invalid_value(format!("cannot render at {} fps", video.fps())));
        }

        let state = video.data(STATE.idname)?;
        let mut jobs = match state.get::<Vec<RenderJob>>(JOBS_SLOT) {
            Ok(jobs) => jobs.to_vec(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        info!(output = %job.output, frames = job.frame_count(), "render queued");
        jobs.push(job);
        state.set(JOBS_SLOT, jobs)
    }
}

pub fn register(registry: &PluginRegistry) -> Result<(), PvError> {
    registry.register_property_group(RenderSettings)?;
    registry.register_data_group(STATE)?;
    registry.register_operator(StartRender)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::ErrorKind;

    fn setup() -> (PluginRegistry, Video) {
        let registry = PluginRegistry::new();
        register(&registry).unwrap();
        let video = Video::with_settings(&registry, (1280, 720), 29.97).unwrap();
        (registry, video)
    }

    #[test]
    fn test_start_queues_job() {
        let (_registry, video) = setup();
        video.set("render.end", 2.0).unwrap();
        video.ops().group("render").unwrap().get("start").unwrap().call().unwrap();

        let jobs = video.data("render_state").unwrap().get::<Vec<RenderJob>>(JOBS_SLOT).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].resolution, (1280, 720));
        assert_eq!(jobs[0].fps, 29);
        assert_eq!(jobs[0].frame_count(), 58);
        assert_eq!(jobs[0].output, "output.mp4");
    }

    #[test]
    fn test_each_call_queues_once() {
        let (_registry, video) = setup();
        video.ops().call("render.start").unwrap();
        video.ops().call("render.start").unwrap();
        let jobs = video.data("render_state").unwrap().get::<Vec<RenderJob>>(JOBS_SLOT).unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let (_registry, video) = setup();
        video.set("render.start", 5.0).unwrap();
        video.set("render.end", 5.0).unwrap();
        let err = video.ops().call("render.start").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(!video.data("render_state").unwrap().contains(JOBS_SLOT));
    }

    #[test]
    fn test_no_stop_operator() {
        let (_registry, video) = setup();
        let err = video.ops().call("render.stop").unwrap_err();
        assert_eq!(err.code, pv_core::codes::OPERATOR_NOT_FOUND);
    }
}
