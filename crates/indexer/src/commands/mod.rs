pub mod reader;
pub mod replay;

pub use reader::{handle_reader_command, ReaderCommand};
pub use replay::handle_replay;
