//! Small utilities shared by the containers and the tuning code.

mod timer;
pub use self::timer::Timer;
