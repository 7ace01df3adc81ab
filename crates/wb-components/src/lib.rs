//! Window Buddy Built-in Components
//!
//! - [`sun`] publishes `sun.sun` from the home location
//! - [`window_buddy`] turns window config entries into exposure sensors

pub mod sun;
pub mod window_buddy;

pub use sun::{solar_position, SolarPosition, Sun};
pub use window_buddy::{
    import_from_yaml, register, SetupError, WindowBuddy, WindowBuddyFlow, WindowBuddySensor,
    WindowEntryData,
};
