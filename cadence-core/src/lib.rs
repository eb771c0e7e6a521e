pub mod app;
pub mod documents;
pub mod events;
pub mod instance;
pub mod ipc;
pub mod platform;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod translations;
pub mod util;
