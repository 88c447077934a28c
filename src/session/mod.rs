//! Session state: prompt, active image, history, advice and busy flags.

mod machine;
mod record;

pub use machine::{Session, SessionEvent, UPLOAD_HINT};
pub use record::{ImageId, ImageOrigin, ImageRecord, UPLOAD_PROMPT};
