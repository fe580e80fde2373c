//! Per-connection input throttling

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

use crate::ws::protocol::ClientMsg;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Transform streams (movement, aim target, vehicle) arrive every client frame
pub const STREAM_RATE_LIMIT: u32 = 90;

/// Discrete intents: fire, reload, state changes, seat requests
pub const INTENT_RATE_LIMIT: u32 = 30;

fn limiter(per_second: u32) -> Limiter {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// Two buckets per connection so a chatty transform stream never starves
/// the player's intents.
pub struct InputThrottle {
    stream: Limiter,
    intents: Limiter,
}

impl InputThrottle {
    pub fn new(stream_per_second: u32, intents_per_second: u32) -> Self {
        Self {
            stream: limiter(stream_per_second),
            intents: limiter(intents_per_second),
        }
    }

    /// Whether `msg` may be forwarded to the match loop now.
    /// `Leave` is never throttled.
    pub fn admit(&self, msg: &ClientMsg) -> bool {
        match msg {
            ClientMsg::Leave => true,
            ClientMsg::Movement { .. }
            | ClientMsg::SetAimTarget { .. }
            | ClientMsg::VehicleMovement { .. } => self.stream.check().is_ok(),
            _ => self.intents.check().is_ok(),
        }
    }
}

impl Default for InputThrottle {
    fn default() -> Self {
        Self::new(STREAM_RATE_LIMIT, INTENT_RATE_LIMIT)
    }
}
