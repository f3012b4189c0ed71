// Library root
// -----------
// The binary (`main.rs`) is a thin shell around these modules so the upload
// flow can be driven from tests with a scripted API.
//
// Module responsibilities:
// - `plugin`: the upload command itself (argument parsing, file checks,
//   status handling, exit codes).
// - `api`: the `Operations` capability and its blocking reqwest client.
// - `config`: defaults, config file and environment overrides.
// - `error`: user-facing failure messages and their exit codes.
pub mod api;
pub mod config;
pub mod error;
pub mod plugin;
