//! Operator dispatch
//!
//! Operators are looked up by group and idname through a video's
//! [`Ops`] view. A looked-up [`Operator`] is bound to that video and runs
//! its `execute` once per [`Operator::call`].

use crate::{OperatorMeta, OperatorPlugin, Video};
use pv_core::PvError;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// An operator bound to a video
pub struct Operator<'v> {
    plugin: Arc<dyn OperatorPlugin>,
    video: &'v Video,
}

impl<'v> Operator<'v> {
    pub fn bind(plugin: Arc<dyn OperatorPlugin>, video: &'v Video) -> Self {
        Self { plugin, video }
    }

    pub fn meta(&self) -> OperatorMeta {
        self.plugin.meta()
    }

    pub fn video(&self) -> &'v Video {
        self.video
    }

    /// Run the operator against its video.
    pub fn call(&self) -> Result<(), PvError> {
        let meta = self.plugin.meta();
        debug!(group = meta.group, idname = meta.idname, "calling operator");
        self.plugin.execute(self.video)
    }
}

impl std::fmt::Debug for Operator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let meta = self.plugin.meta();
        f.debug_struct("Operator")
            .field("group", &meta.group)
            .field("idname", &meta.idname)
            .finish()
    }
}

/// Operators sharing a group name, bound to one video
#[derive(Debug)]
pub struct OpGroup<'v> {
    idname: String,
    operators: Vec<Operator<'v>>,
}

impl<'v> OpGroup<'v> {
    pub fn idname(&self) -> &str {
        &self.idname
    }

    pub fn get(&self, idname: &str) -> Result<&Operator<'v>, PvError> {
        self.operators
            .iter()
            .find(|op| op.meta().idname == idname)
            .ok_or_else(|| PvError::operator_not_found(&self.idname, idname))
    }

    /// Operator idnames in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.operators.iter().map(|op| op.meta().idname).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator<'v>> {
        self.operators.iter()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Entry point to a video's operators (`video.ops()`).
///
/// Groups are resolved against the registry at lookup time, so operators
/// registered after the video was created are visible.
#[derive(Clone, Copy)]
pub struct Ops<'v> {
    video: &'v Video,
}

impl<'v> Ops<'v> {
    pub(crate) fn new(video: &'v Video) -> Self {
        Self { video }
    }

    pub fn group(&self, idname: &str) -> Result<OpGroup<'v>, PvError> {
        let operators: Vec<Operator<'v>> = self
            .video
            .registry()
            .operators_in(idname)
            .into_iter()
            .map(|plugin| Operator::bind(plugin, self.video))
            .collect();
        if operators.is_empty() {
            return Err(PvError::op_group_not_found(idname));
        }
        Ok(OpGroup { idname: idname.to_string(), operators })
    }

    pub fn group_names(&self) -> Vec<&'static str> {
        self.video.registry().op_group_names()
    }

    /// Call `"group.idname"`.
    pub fn call(&self, path: &str) -> Result<(), PvError> {
        let (group, idname) = crate::video::split_path(path)?;
        self.group(group)?.get(idname)?.call()
    }

    pub fn describe(&self) -> Vec<OpGroupDescription> {
        self.group_names()
            .into_iter()
            .filter_map(|name| self.group(name).ok())
            .map(|group| OpGroupDescription {
                operators: group.iter().map(Operator::meta).collect(),
                idname: group.idname,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpGroupDescription {
    pub idname: String,
    pub operators: Vec<OperatorMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PluginRegistry;
    use pv_core::ErrorKind;
    use std::sync::Mutex;

    /// Records the address of every video it runs against.
    struct Recorder {
        idname: &'static str,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    impl OperatorPlugin for Recorder {
        fn meta(&self) -> OperatorMeta {
            OperatorMeta {
                group: "render",
                idname: self.idname,
                label: "Record",
                description: "Remember the video",
            }
        }

        fn execute(&self, video: &Video) -> Result<(), PvError> {
            self.calls.lock().unwrap().push(video as *const Video as usize);
            Ok(())
        }
    }

    struct Failing;

    impl OperatorPlugin for Failing {
        fn meta(&self) -> OperatorMeta {
            OperatorMeta { group: "render", idname: "fail", label: "", description: "" }
        }

        fn execute(&self, _video: &Video) -> Result<(), PvError> {
            Err(PvError::invalid_value("nothing to render"))
        }
    }

    fn setup() -> (PluginRegistry, Arc<Mutex<Vec<usize>>>) {
        let registry = PluginRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        registry
            .register_operator(Recorder { idname: "start", calls: Arc::clone(&calls) })
            .unwrap();
        registry.register_operator(Failing).unwrap();
        (registry, calls)
    }

    #[test]
    fn test_call_executes_once_with_bound_video() {
        let (registry, calls) = setup();
        let video = Video::new(&registry);

        let group = video.ops().group("render").unwrap();
        let op = group.get("start").unwrap();
        assert!(calls.lock().unwrap().is_empty());

        op.call().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![&video as *const Video as usize]);
        assert!(std::ptr::eq(op.video(), &video));
    }

    #[test]
    fn test_lookup_errors() {
        let (registry, _) = setup();
        let video = Video::new(&registry);

        let err = video.ops().group("export").unwrap_err();
        assert_eq!(err.code, pv_core::codes::OP_GROUP_NOT_FOUND);

        let group = video.ops().group("render").unwrap();
        let err = group.get("stop").unwrap_err();
        assert_eq!(err.code, pv_core::codes::OPERATOR_NOT_FOUND);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_execute_errors_propagate() {
        let (registry, _) = setup();
        let video = Video::new(&registry);
        let err = video.ops().call("render.fail").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_late_operator_visible() {
        let (registry, calls) = setup();
        let video = Video::new(&registry);
        registry
            .register_operator(Recorder { idname: "again", calls: Arc::clone(&calls) })
            .unwrap();

        video.ops().call("render.again").unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(video.ops().group("render").unwrap().names(), vec!["start", "fail", "again"]);
    }

    #[test]
    fn test_describe() {
        let (registry, _) = setup();
        let video = Video::new(&registry);
        let groups = video.ops().describe();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].idname, "render");
        assert_eq!(groups[0].operators.len(), 2);
        assert!(video.ops().call("render").is_err());
    }
}
