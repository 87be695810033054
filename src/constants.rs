//! Application constants
//!
//! Window sizes, UI dimensions and protocol defaults used throughout the crate.

/// Default number of recent headers retained (and frozen on pause)
pub const MAX_HEADERS: usize = 75;

/// Default number of aggregated events retained
pub const MAX_EVENTS: usize = 75;

/// UI layout and display constants
pub mod ui {
    /// Minimum terminal width in columns for usable display
    pub const MIN_WIDTH: u16 = 60;

    /// Minimum terminal height in rows for usable display
    pub const MIN_HEIGHT: u16 = 15;

    /// Width threshold for stacking the headers and events panes vertically
    pub const NARROW_THRESHOLD: u16 = 100;
}

/// Node protocol defaults
pub mod rpc {
    /// Runtime API call returning `(authorities, session_length)`
    pub const AUX_DATA_METHOD: &str = "SpinApi_aux_data";

    /// Runtime API call returning `Vec<(authority, points)>` for the current era
    pub const ERA_POINTS_METHOD: &str = "SpinApi_era_points";

    /// JSON-RPC request id used for every call we make
    pub const REQUEST_ID: &str = "headwatch";
}
