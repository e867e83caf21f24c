pub(crate) mod csv_import;
pub(crate) mod gemini;
pub(crate) mod practice;
pub(crate) mod progress;
pub(crate) mod recognition;
pub(crate) mod scopes;
pub(crate) mod stats;
pub(crate) mod views;
