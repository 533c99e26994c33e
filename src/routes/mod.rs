pub mod channels;
pub mod health;
pub mod recordings;
pub mod timers;
