mod lifecycle;

pub use lifecycle::RequestLifecycle;
