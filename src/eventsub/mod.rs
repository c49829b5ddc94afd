//! Twitch EventSub webhook messages and their signatures.
pub mod data;
pub mod error;
pub mod event;
pub mod verify;
