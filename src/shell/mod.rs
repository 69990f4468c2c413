// Composition root for the event_streams store.
//
// Responsibilities
// - Read config from environment.
// - Open the durable store lazily, once per process, and share it between sessions.
// - Give every session its own handlers and its own membership in the change broadcast.
// - Carry host commands and messages over stdin/stdout.

pub mod config;
pub mod session;
pub mod stdio;
