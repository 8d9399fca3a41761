//! Observable session state.

use crate::capture::{InputMode, UploadType};
use serde::Serialize;

/// What the operator sees of the loop.
///
/// `is_auto_monitoring` is only ever true while the selected source can
/// produce fresh frames. `is_loading` is true exactly while one analysis
/// request is outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSession {
    /// Selected input surface.
    pub input_mode: InputMode,
    /// Kind of the loaded upload.
    pub upload_type: Option<UploadType>,
    /// Whether the recurring loop is armed.
    pub is_auto_monitoring: bool,
    /// Whether an analysis is in flight.
    pub is_loading: bool,
}
