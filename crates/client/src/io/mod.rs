mod chunks;
mod lines;

pub use chunks::Chunks;
pub use lines::{Error as LinesError, JsonLines, MAX_LINE_SIZE};
