pub mod app;
pub mod sample;
pub mod shutdown;

pub use app::Application;
pub use sample::SampleTaskHandler;
pub use shutdown::ShutdownManager;
