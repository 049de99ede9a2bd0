//! Live session channel.
//!
//! | Module       | Purpose                                               |
//! |--------------|-------------------------------------------------------|
//! | `event`      | Session identifier and the typed event union          |
//! | `decoder`    | Inbound frame → [`Event`] or [`MalformedFrame`]       |
//! | `reducer`    | Folds events into the [`SessionViewModel`]            |
//! | `state`      | [`ConnectionState`] machine                           |
//! | `subscriber` | [`SessionSubscriber`] callbacks and closure builder   |
//! | `connector`  | Network seam, WebSocket implementation                |
//! | `transport`  | [`LiveChannel`] registry and per-channel driver task  |

pub mod connector;
pub mod decoder;
pub mod event;
pub mod reducer;
pub mod state;
pub mod subscriber;
pub mod transport;

pub use connector::{Connection, Connector, Inbound, WsConnector, expand_endpoint};
pub use decoder::{Decoded, MalformedFrame, decode_frame, decode_value};
pub use event::{
    CompletionEvent, ErrorEvent, Event, LogEvent, LogLevel, ProgressEvent, SessionId,
};
pub use reducer::{Applied, SessionViewModel, Terminal, reduce};
pub use state::ConnectionState;
pub use subscriber::{SessionSubscriber, Subscriptions};
pub use transport::{ChannelHandle, ConnectionSettings, LiveChannel, ReconnectPolicy};
