pub mod captcha;
pub mod debounce;
pub mod device;
pub mod fleet;
pub mod state;
