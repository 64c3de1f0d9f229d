//! Gopher request handling.
//!
//! One request per connection, processed strictly in order:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← single read, at most 255 bytes
//!        └──────┬──────┘
//!               │ Selector parsed
//!               ▼
//!        ┌──────────────────┐
//!        │    Resolving     │ ← root index / directory index / file / not found
//!        └──────┬───────────┘
//!               │ Resolution
//!               ▼
//!        ┌──────────────────┐
//!        │    Streaming     │ ← CRLF lines, then ".\r\n"
//!        └──────┬───────────┘
//!               ▼
//!            Closed
//! ```
//!
//! - **`selector`**: raw request bytes to [`selector::Selector`]
//! - **`resolver`**: selector to [`resolver::Resolution`] inside the served root
//! - **`response`**: writes the body and terminator
//! - **`connection`**: drives the three for one stream

pub mod connection;
pub mod resolver;
pub mod response;
pub mod selector;
