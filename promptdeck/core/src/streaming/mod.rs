//! Streaming Infrastructure
//!
//! Decoding of the `/v1/query` event stream and accumulation of the text it
//! carries. Neither piece knows about sessions; the session state machine
//! drives them.
//!
//! # Architecture
//!
//! ```text
//!   bytes fragments (transport)
//!            │
//!            ▼
//!   ┌──────────────────┐   StreamEvent::Text    ┌─────────────────────┐
//!   │  StreamDecoder   │ ─────────────────────▶ │ ResponseAccumulator │
//!   │  [carry-over]    │                        │   text ++ content   │
//!   └────────┬─────────┘                        └─────────────────────┘
//!            │ StreamEvent::Done / Error
//!            ▼
//!      RequestSession (terminal transition)
//! ```
//!
//! # Example
//!
//! ```
//! use promptdeck_core::streaming::{ResponseAccumulator, StreamDecoder};
//!
//! let mut decoder = StreamDecoder::new();
//! let mut events = decoder.push(b"data: {\"type\":\"text\",\"content\":\"Hel");
//! events.extend(decoder.push(b"lo\"}\n"));
//!
//! let acc = ResponseAccumulator::fold(&events);
//! assert_eq!(acc.as_str(), "Hello");
//! ```

mod accumulator;
mod decoder;

pub use accumulator::ResponseAccumulator;
pub use decoder::{decode_line, DoneEvent, StreamDecoder, StreamEvent, DATA_PREFIX};
