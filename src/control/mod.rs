mod controller;
mod protocol;
mod server;

pub use controller::WatchController;
pub use protocol::{
    parse_command, ControlCommand, ControlError, ControlResponse, ResponseStatus, SET_WATCH_PATH,
};
pub use server::serve;
