pub mod ai;
pub mod auth;
pub mod cache;
pub mod commerce;
pub mod optimistic;
pub mod prefs;
pub mod search;
pub mod session;
pub mod storage;
