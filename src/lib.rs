pub mod app;
pub mod client;
pub mod config;
pub mod controller;
pub mod handler;
pub mod markdown;
pub mod message;
pub mod preview;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use client::{CallError, ChatBackend, Classification, HttpBackend, UploadRequest};
pub use config::{Config, Endpoints};
pub use controller::{ChatController, FileSelection, Persona, TextInput};
pub use message::{Message, Sender, Transcript};
pub use preview::{PreviewGuard, PreviewInfo, PreviewStore};
