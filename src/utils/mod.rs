pub mod clipboard;
pub mod debounce;
pub mod http;
pub mod image;
