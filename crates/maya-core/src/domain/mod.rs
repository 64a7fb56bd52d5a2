//! Domain types shared by the practice loop and its adapters.

mod attempt;
mod cache_key;
mod phrase;
mod recording;

pub use attempt::AttemptResult;
pub use cache_key::CacheKey;
pub use phrase::Phrase;
pub use recording::RecordedAudio;
